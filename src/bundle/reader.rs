use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{BundleError, BundleResult, PayloadError};
use crate::io::{MemoryReader, ReadAt};
use crate::zip::{ZipExtractor, ZipFileEntry};

use super::marker::Marker;
use super::payload::{DalamudTroubleshooting, XlTroubleshooting};
use super::types::{LogBundle, LogFile, ZipLogFile};

/// Launcher log written by current launcher versions.
pub const OUTPUT_LOG: &str = "output.log";
/// Launcher log name used when `output.log` is absent.
pub const LAUNCHER_LOG: &str = "launcher.log";
/// Plugin host log.
pub const PLUGIN_HOST_LOG: &str = "dalamud.log";
/// Entries collected into [`LogBundle::files`] end with this (case-sensitive).
pub const LOG_SUFFIX: &str = ".log";

/// Log bundle opened for extraction.
///
/// Opening reads the archive directory; each accessor then reads only the
/// entries it needs, so callers can do partial work. [`BundleReader::parse`]
/// does all of it.
pub struct BundleReader<R: ReadAt> {
    archive: ZipExtractor<R>,
}

impl<R: ReadAt> BundleReader<R> {
    pub async fn open(reader: Arc<R>) -> BundleResult<Self> {
        let archive = ZipExtractor::open(reader)
            .await
            .map_err(BundleError::Archive)?;
        Ok(Self { archive })
    }

    /// Entries that belong in [`LogBundle::files`], in archive order.
    ///
    /// A name recorded more than once appears at its first position but
    /// resolves to its last record, the same entry [`Self::entry_text`] reads.
    pub fn log_entries(&self) -> impl Iterator<Item = &ZipFileEntry> {
        let mut seen = HashSet::new();
        self.archive
            .entries()
            .iter()
            .filter(|e| e.file_name.ends_with(LOG_SUFFIX))
            .filter(move |e| seen.insert(e.file_name.clone()))
            .filter_map(move |e| self.archive.by_name(&e.file_name))
    }

    /// Text of the entry called `name`, `None` if the archive has none.
    pub async fn entry_text(&self, name: &str) -> BundleResult<Option<String>> {
        let Some(entry) = self.archive.by_name(name) else {
            return Ok(None);
        };
        self.read_entry(entry).await.map(Some)
    }

    async fn read_entry(&self, entry: &ZipFileEntry) -> BundleResult<String> {
        self.archive
            .read_to_string(entry)
            .await
            .map_err(|cause| BundleError::Entry {
                name: entry.file_name.clone(),
                cause,
            })
    }

    /// Every `*.log` entry with its full text.
    pub async fn log_files(&self) -> BundleResult<Vec<ZipLogFile>> {
        let mut files = Vec::new();
        for entry in self.log_entries() {
            let data = self.read_entry(entry).await?;
            files.push(ZipLogFile {
                name: entry.file_name.clone(),
                data,
            });
        }
        Ok(files)
    }

    /// `output.log` when the archive has it, `launcher.log` otherwise.
    pub fn launcher_log_name(&self) -> &'static str {
        if self.archive.contains(OUTPUT_LOG) {
            OUTPUT_LOG
        } else {
            LAUNCHER_LOG
        }
    }

    pub async fn launcher_log(&self) -> BundleResult<Option<LogFile<XlTroubleshooting>>> {
        self.log_file(self.launcher_log_name(), Marker::Launcher)
            .await
    }

    pub async fn plugin_host_log(&self) -> BundleResult<Option<LogFile<DalamudTroubleshooting>>> {
        self.log_file(PLUGIN_HOST_LOG, Marker::PluginHost).await
    }

    /// Read `name` once and decode its own marker plus the exception marker.
    async fn log_file<T: DeserializeOwned>(
        &self,
        name: &str,
        marker: Marker,
    ) -> BundleResult<Option<LogFile<T>>> {
        let Some(data) = self.entry_text(name).await? else {
            tracing::debug!(name, "log not in bundle");
            return Ok(None);
        };

        let invalid = |marker: Marker, source: PayloadError| BundleError::Payload {
            file: name.to_string(),
            marker,
            source,
        };
        let troubleshooting = marker
            .decode::<T>(&data)
            .map_err(|source| invalid(marker, source))?;
        let exception = Marker::Exception
            .decode(&data)
            .map_err(|source| invalid(Marker::Exception, source))?;

        tracing::debug!(
            name,
            troubleshooting = troubleshooting.is_some(),
            exception = exception.is_some(),
            "log scanned"
        );

        Ok(Some(LogFile {
            name: name.to_string(),
            data,
            troubleshooting,
            exception,
        }))
    }

    /// Extract everything: the flat log list and both troubleshooting logs.
    pub async fn parse(&self) -> BundleResult<LogBundle> {
        let (files, launcher_log, plugin_host_log) = tokio::try_join!(
            self.log_files(),
            self.launcher_log(),
            self.plugin_host_log()
        )?;

        Ok(LogBundle {
            launcher_log,
            plugin_host_log,
            files,
        })
    }
}

/// Extract a log bundle held in memory.
pub async fn parse_log(data: impl Into<Vec<u8>>) -> BundleResult<LogBundle> {
    let reader = Arc::new(MemoryReader::new(data));
    BundleReader::open(reader).await?.parse().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{build_text_zip, build_zip, marker_line, rename_entry};
    use serde_json::json;

    #[tokio::test]
    async fn launcher_log_name_prefers_output() {
        let both = build_text_zip(&[(LAUNCHER_LOG, "old"), (OUTPUT_LOG, "new")]);
        let reader = BundleReader::open(Arc::new(MemoryReader::new(both))).await.unwrap();
        assert_eq!(reader.launcher_log_name(), OUTPUT_LOG);

        let fallback = build_text_zip(&[(LAUNCHER_LOG, "old")]);
        let reader = BundleReader::open(Arc::new(MemoryReader::new(fallback))).await.unwrap();
        assert_eq!(reader.launcher_log_name(), LAUNCHER_LOG);
    }

    #[tokio::test]
    async fn log_entries_filter_by_suffix() {
        let data = build_text_zip(&[
            ("output.log", ""),
            ("output.log.1", ""),
            ("notes.LOG", ""),
            ("crash/dalamud.log", ""),
            ("config.json", "{}"),
        ]);
        let reader = BundleReader::open(Arc::new(MemoryReader::new(data))).await.unwrap();
        let names: Vec<_> = reader.log_entries().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["output.log", "crash/dalamud.log"]);
    }

    #[tokio::test]
    async fn plugin_host_log_decodes_both_markers() {
        let text = format!(
            "{}\n{}\n",
            marker_line("TROUBLESHOOTING", &json!({"DalamudVersion": "9.1.0.5"})),
            marker_line("LASTEXCEPTION", &json!({"Info": "NullReference"})),
        );
        let data = build_text_zip(&[(PLUGIN_HOST_LOG, text.as_str())]);
        let reader = BundleReader::open(Arc::new(MemoryReader::new(data))).await.unwrap();

        let log = reader.plugin_host_log().await.unwrap().unwrap();
        assert_eq!(log.name, PLUGIN_HOST_LOG);
        assert_eq!(log.data, text);
        assert_eq!(
            log.troubleshooting.unwrap().dalamud_version.as_deref(),
            Some("9.1.0.5")
        );
        assert_eq!(log.exception.unwrap().info.as_deref(), Some("NullReference"));

        assert!(reader.launcher_log().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn invalid_exception_marker_names_file() {
        let data = build_text_zip(&[(OUTPUT_LOG, "LASTEXCEPTION:bm90IGpzb24=\n")]);
        let err = parse_log(data).await.unwrap_err();
        match err {
            BundleError::Payload { file, marker, .. } => {
                assert_eq!(file, OUTPUT_LOG);
                assert_eq!(marker, Marker::Exception);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn duplicate_names_collapse_to_last_record() {
        let mut data = build_zip(
            &[
                (PLUGIN_HOST_LOG, "first"),
                ("output.log", "o"),
                ("dalamux.log", "second"),
            ],
            ::zip::CompressionMethod::Stored,
        );
        rename_entry(&mut data, "dalamux.log", PLUGIN_HOST_LOG);

        let log = parse_log(data).await.unwrap();
        let files: Vec<_> = log
            .files
            .iter()
            .map(|f| (f.name.as_str(), f.data.as_str()))
            .collect();
        assert_eq!(files, [(PLUGIN_HOST_LOG, "second"), (OUTPUT_LOG, "o")]);
        assert_eq!(log.plugin_host_log.unwrap().data, "second");
    }

    #[tokio::test]
    async fn entry_text_missing_is_none() {
        let data = build_text_zip(&[(OUTPUT_LOG, "x")]);
        let reader = BundleReader::open(Arc::new(MemoryReader::new(data))).await.unwrap();
        assert!(reader.entry_text("missing.log").await.unwrap().is_none());
        assert_eq!(reader.entry_text(OUTPUT_LOG).await.unwrap().as_deref(), Some("x"));
    }
}
