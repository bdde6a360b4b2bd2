//! # xlbundle
//!
//! Extract troubleshooting data from zipped launcher log bundles.
//!
//! A bundle is a ZIP of the launcher's log directory. The launcher and its
//! plugin host periodically write their state into the logs as base64 JSON
//! on marker lines; this crate opens the archive, finds the right logs and
//! decodes the most recent marker of each kind.
//!
//! ## Features
//!
//! - Read bundles from memory or from a local file
//! - Own ZIP reader with ZIP64, STORED and DEFLATE support and CRC checks
//! - Typed payloads that keep unknown fields
//! - Every `*.log` entry returned alongside the decoded state
//!
//! ## Example
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let data = std::fs::read("logs.zip")?;
//!     let bundle = xlbundle::parse_log(data).await?;
//!
//!     if let Some(log) = &bundle.launcher_log {
//!         let version = log
//!             .troubleshooting
//!             .as_ref()
//!             .and_then(|t| t.launcher_version.as_deref());
//!         println!("{}: launcher {:?}", log.name, version);
//!     }
//!     for file in &bundle.files {
//!         println!("{} ({} bytes)", file.name, file.data.len());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

#[cfg(test)]
mod test_utils;

pub use bundle::{BundleReader, LogBundle, LogFile, Marker, ZipLogFile, parse_log};
pub use cli::Cli;
pub use error::{BundleError, BundleResult, PayloadError};
pub use io::{LocalFileReader, MemoryReader, ReadAt};
pub use crate::zip::{ZipExtractor, ZipFileEntry};
