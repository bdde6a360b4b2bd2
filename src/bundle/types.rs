//! Result types of log bundle extraction.

use serde::{Deserialize, Serialize};

use super::payload::{DalamudTroubleshooting, ExceptionTroubleshooting, XlTroubleshooting};

/// Everything extracted from one log bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogBundle {
    /// `output.log`, or `launcher.log` when the former is missing.
    pub launcher_log: Option<LogFile<XlTroubleshooting>>,
    /// `dalamud.log`.
    pub plugin_host_log: Option<LogFile<DalamudTroubleshooting>>,
    /// Every `*.log` entry, in archive order.
    pub files: Vec<ZipLogFile>,
}

/// A well-known log with its decoded markers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogFile<T> {
    /// Entry name inside the archive.
    pub name: String,
    /// Full text of the entry.
    pub data: String,
    pub troubleshooting: Option<T>,
    pub exception: Option<ExceptionTroubleshooting>,
}

/// A plain log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZipLogFile {
    pub name: String,
    pub data: String,
}

impl LogBundle {
    pub fn file(&self, name: &str) -> Option<&ZipLogFile> {
        self.files.iter().rev().find(|f| f.name == name)
    }
}
