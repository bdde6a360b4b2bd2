use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "xlbundle")]
#[command(version)]
#[command(about = "Extract troubleshooting data from launcher log bundles", long_about = None)]
#[command(after_help = "Examples:\n  \
  xlbundle logs.zip                 summarize launcher and plugin host state\n  \
  xlbundle --json logs.zip > out    dump everything as JSON\n  \
  xlbundle -p dalamud.log logs.zip  print one log\n  \
  cat logs.zip | xlbundle -l -      list logs in a bundle read from stdin")]
pub struct Cli {
    /// Log bundle path, or `-` for stdin
    #[arg(value_name = "FILE")]
    pub file: String,

    /// List log entries
    #[arg(short = 'l')]
    pub list: bool,

    /// Print the text of one entry to stdout
    #[arg(short = 'p', value_name = "NAME", conflicts_with = "list")]
    pub print: Option<String>,

    /// Print the full parsed bundle as JSON
    #[arg(long, conflicts_with_all = ["list", "print"])]
    pub json: bool,

    /// Quiet mode, only errors are logged
    #[arg(short = 'q', conflicts_with = "verbose")]
    pub quiet: bool,

    /// Verbose logging (-vv for trace)
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn is_stdin(&self) -> bool {
        self.file == "-"
    }

    /// Default log filter when `RUST_LOG` is not set
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "error";
        }
        match self.verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    }
}
