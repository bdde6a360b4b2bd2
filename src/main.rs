//! Main entry point for the xlbundle CLI application.
//!
//! Reads a log bundle from a local path or stdin and prints a summary of the
//! troubleshooting state, the full result as JSON, the list of logs, or one
//! log's text.

use anyhow::{Result, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::EnvFilter;

use xlbundle::bundle::{DalamudTroubleshooting, ExceptionTroubleshooting, XlTroubleshooting};
use xlbundle::{BundleReader, Cli, LocalFileReader, LogBundle, LogFile, MemoryReader, ReadAt};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if cli.is_stdin() {
        let mut data = Vec::new();
        tokio::io::stdin().read_to_end(&mut data).await?;
        tracing::debug!(bytes = data.len(), "bundle read from stdin");
        run(Arc::new(MemoryReader::new(data)), &cli).await
    } else {
        let reader = LocalFileReader::new(Path::new(&cli.file))?;
        run(Arc::new(reader), &cli).await
    }
}

/// Dispatch on the selected output mode.
async fn run<R: ReadAt + 'static>(reader: Arc<R>, cli: &Cli) -> Result<()> {
    let bundle = BundleReader::open(reader).await?;

    if cli.list {
        for entry in bundle.log_entries() {
            println!("{:>10}  {}", entry.uncompressed_size, entry.file_name);
        }
        return Ok(());
    }

    if let Some(name) = &cli.print {
        let Some(text) = bundle.entry_text(name).await? else {
            bail!("{} is not in the bundle", name);
        };
        let mut stdout = tokio::io::stdout();
        stdout.write_all(text.as_bytes()).await?;
        stdout.flush().await?;
        return Ok(());
    }

    let log = bundle.parse().await?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&log)?);
    } else {
        print_summary(&log);
    }

    Ok(())
}

fn print_summary(log: &LogBundle) {
    match &log.launcher_log {
        Some(file) => print_launcher(file),
        None => println!("No launcher log in bundle"),
    }
    println!();
    match &log.plugin_host_log {
        Some(file) => print_plugin_host(file),
        None => println!("No plugin host log in bundle"),
    }
    println!();
    println!("{} log file(s)", log.files.len());
}

fn print_launcher(file: &LogFile<XlTroubleshooting>) {
    println!("== {} ==", file.name);
    match &file.troubleshooting {
        Some(t) => {
            field("When", t.when.as_deref());
            field("Launcher", t.launcher_version.as_deref());
            field("Launcher hash", t.launcher_hash.as_deref());
            field("Official", t.official.map(yes_no));
            field("Platform", t.platform.as_ref().map(ToString::to_string).as_deref());
            field("Game", t.observed_game_version.as_deref());
            field("Dalamud enabled", t.dalamud_enabled.map(yes_no));
            field("Auto login", t.is_auto_login.map(yes_no));
            field("Index integrity", t.index_integrity.as_ref().map(ToString::to_string).as_deref());
        }
        None => println!("  no troubleshooting marker"),
    }
    print_exception(file.exception.as_ref());
}

fn print_plugin_host(file: &LogFile<DalamudTroubleshooting>) {
    println!("== {} ==", file.name);
    match &file.troubleshooting {
        Some(t) => {
            field("Dalamud", t.dalamud_version.as_deref());
            field("Git hash", t.dalamud_git_hash.as_deref());
            field("Game", t.game_version.as_deref());
            field("Beta key", t.beta_key.as_deref());
            field("Interface loaded", t.interface_loaded.map(yes_no));
            field("Third-party repos", t.has_third_repo.map(yes_no));

            let plugins = t.plugins();
            println!("  {:<18} {}", "Plugins", plugins.len());
            for plugin in plugins {
                let name = plugin
                    .internal_name
                    .as_deref()
                    .or(plugin.name.as_deref())
                    .unwrap_or("?");
                let version = plugin.assembly_version.as_deref().unwrap_or("?");
                let origin = if plugin.is_third_party == Some(true) { " (3rd party)" } else { "" };
                println!("    {name} {version}{origin}");
            }
        }
        None => println!("  no troubleshooting marker"),
    }
    print_exception(file.exception.as_ref());
}

fn print_exception(exception: Option<&ExceptionTroubleshooting>) {
    let Some(exception) = exception else {
        return;
    };
    println!("  Last exception:");
    field("  When", exception.when.as_deref());
    field("  Context", exception.context.as_deref());
    if let Some(info) = &exception.info {
        for line in info.lines().take(8) {
            println!("      {line}");
        }
    }
}

fn field(label: &str, value: Option<&str>) {
    if let Some(value) = value {
        println!("  {label:<18} {value}");
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}
