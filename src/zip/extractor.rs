use flate2::Crc;
use flate2::read::DeflateDecoder;
use std::io::Read;
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::parser::ZipParser;
use super::structures::{CompressionMethod, ZipFileEntry};

/// Cap on up-front buffer reservation; the declared size is untrusted.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;

/// ZIP archive opened for reading.
///
/// The Central Directory is parsed once in [`ZipExtractor::open`]; entry
/// data is read on demand.
pub struct ZipExtractor<R: ReadAt> {
    parser: ZipParser<R>,
    entries: Vec<ZipFileEntry>,
}

impl<R: ReadAt> ZipExtractor<R> {
    pub async fn open(reader: Arc<R>) -> Result<Self> {
        let parser = ZipParser::new(reader);
        let entries = parser.list_files().await?;
        tracing::debug!(entries = entries.len(), "archive opened");
        Ok(Self { parser, entries })
    }

    /// All entries in Central Directory order
    pub fn entries(&self) -> &[ZipFileEntry] {
        &self.entries
    }

    /// Look up an entry by exact name.
    ///
    /// When a name is recorded more than once the last record wins.
    pub fn by_name(&self, name: &str) -> Option<&ZipFileEntry> {
        self.entries.iter().rev().find(|e| e.file_name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name(name).is_some()
    }

    /// Extract file data to memory, verifying size and CRC-32
    pub async fn extract_to_memory(&self, entry: &ZipFileEntry) -> Result<Vec<u8>> {
        if entry.is_encrypted() {
            bail!("{} is encrypted", entry.file_name);
        }

        let data_offset = self.parser.get_data_offset(entry).await?;
        let end = data_offset.checked_add(entry.compressed_size);
        if end.is_none_or(|end| end > self.parser.reader().size()) {
            bail!(
                "{} data runs past the end of the archive ({} bytes at offset {})",
                entry.file_name,
                entry.compressed_size,
                data_offset
            );
        }

        let mut raw = vec![0u8; entry.compressed_size as usize];
        self.parser
            .reader()
            .read_exact_at(data_offset, &mut raw)
            .await?;

        let data = match entry.compression_method {
            CompressionMethod::Stored => raw,
            CompressionMethod::Deflate => {
                let capacity = entry.uncompressed_size.min(MAX_PREALLOC) as usize;
                let mut out = Vec::with_capacity(capacity);
                DeflateDecoder::new(raw.as_slice())
                    .take(entry.uncompressed_size.saturating_add(1))
                    .read_to_end(&mut out)
                    .with_context(|| format!("Cannot inflate {}", entry.file_name))?;
                out
            }
            CompressionMethod::Unknown(method) => {
                bail!(
                    "Unsupported compression method {} for {} (only STORED and DEFLATE are supported)",
                    method,
                    entry.file_name
                );
            }
        };

        if data.len() as u64 != entry.uncompressed_size {
            bail!(
                "{} decompressed to {} bytes, expected {}",
                entry.file_name,
                data.len(),
                entry.uncompressed_size
            );
        }

        let mut crc = Crc::new();
        crc.update(&data);
        if crc.sum() != entry.crc32 {
            bail!(
                "CRC mismatch for {} (expected {:08x}, got {:08x})",
                entry.file_name,
                entry.crc32,
                crc.sum()
            );
        }

        tracing::debug!(
            name = %entry.file_name,
            bytes = data.len(),
            method = entry.compression_method.as_u16(),
            "entry extracted"
        );

        Ok(data)
    }

    /// Extract an entry and decode it as UTF-8 text.
    ///
    /// Invalid sequences become U+FFFD rather than failing the read.
    pub async fn read_to_string(&self, entry: &ZipFileEntry) -> Result<String> {
        let data = self.extract_to_memory(entry).await?;
        match String::from_utf8(data) {
            Ok(text) => Ok(text),
            Err(e) => {
                tracing::warn!(name = %entry.file_name, "entry is not valid UTF-8, replacing invalid bytes");
                Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
            }
        }
    }
}
