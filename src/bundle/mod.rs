//! Troubleshooting extraction from log bundles.
//!
//! A bundle is a ZIP of the launcher's log directory. Two logs carry
//! base64 JSON markers:
//!
//! | Log | Marker | Payload |
//! |-----|--------|---------|
//! | `output.log` (or `launcher.log`) | `TROUBLESHXLTING:` | [`XlTroubleshooting`] |
//! | `dalamud.log` | `TROUBLESHOOTING:` | [`DalamudTroubleshooting`] |
//! | either | `LASTEXCEPTION:` | [`ExceptionTroubleshooting`] |
//!
//! The last marker of each kind wins. A missing log or marker yields `None`;
//! a marker that does not decode fails the whole extraction.

pub mod marker;
pub mod payload;
mod reader;
mod types;

pub use marker::{Marker, decode_payload};
pub use payload::{
    DalamudTroubleshooting, EnumValue, ExceptionTroubleshooting, PluginManifest,
    XlTroubleshooting,
};
pub use reader::{
    BundleReader, LAUNCHER_LOG, LOG_SUFFIX, OUTPUT_LOG, PLUGIN_HOST_LOG, parse_log,
};
pub use types::{LogBundle, LogFile, ZipLogFile};
