//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures,
//! reading from any source that implements the [`ReadAt`] trait.
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) at the file's end
//! 2. If ZIP64, read the ZIP64 EOCD for large file support
//! 3. Read the Central Directory to get metadata for all files
//! 4. For extraction, read each file's Local File Header and data
//!
//! Entries come back in Central Directory order, which is the order
//! log bundles are enumerated in.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::sync::Arc;

use crate::io::ReadAt;
use anyhow::{Context, Result, bail};

use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: u64 = 65535;

/// Low-level ZIP file parser.
///
/// Generic over the reader type so the same code serves in-memory
/// bundles and files on disk. Typically used through
/// [`ZipExtractor`](super::ZipExtractor) rather than directly.
pub struct ZipParser<R: ReadAt> {
    /// The underlying data source
    reader: Arc<R>,
    /// Total size of the archive in bytes
    size: u64,
}

impl<R: ReadAt> ZipParser<R> {
    pub fn new(reader: Arc<R>) -> Self {
        let size = reader.size();
        Self { reader, size }
    }

    /// Find and parse the End of Central Directory record.
    ///
    /// Tries the no-comment layout first, then searches backwards through
    /// the comment window for a signature whose comment length matches.
    /// If none matches, the last signature in the window is used, which
    /// accepts archives with bytes appended after the record.
    ///
    /// Returns the record and its offset in the archive.
    pub async fn find_eocd(&self) -> Result<(EndOfCentralDirectory, u64)> {
        let eocd_size = EndOfCentralDirectory::SIZE as u64;
        if self.size < eocd_size {
            bail!("Not a valid ZIP file (only {} bytes)", self.size);
        }

        let offset = self.size - eocd_size;
        let mut buf = vec![0u8; EndOfCentralDirectory::SIZE];
        self.reader.read_exact_at(offset, &mut buf).await?;

        if &buf[0..4] == EndOfCentralDirectory::SIGNATURE && &buf[20..22] == b"\x00\x00" {
            let eocd = EndOfCentralDirectory::from_bytes(&buf)?;
            return Ok((eocd, offset));
        }

        let search_size = (MAX_COMMENT_SIZE + eocd_size).min(self.size);
        let search_start = self.size - search_size;

        let mut buf = vec![0u8; search_size as usize];
        self.reader.read_exact_at(search_start, &mut buf).await?;

        let mut last_signature = None;
        for i in (0..=buf.len() - EndOfCentralDirectory::SIZE).rev() {
            if &buf[i..i + 4] != EndOfCentralDirectory::SIGNATURE {
                continue;
            }
            let comment_len = u16::from_le_bytes([buf[i + 20], buf[i + 21]]) as usize;
            let tail = buf.len() - i - EndOfCentralDirectory::SIZE;
            if comment_len == tail {
                let eocd =
                    EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
                return Ok((eocd, search_start + i as u64));
            }
            last_signature.get_or_insert((i, tail.saturating_sub(comment_len)));
        }

        let Some((i, trailing)) = last_signature else {
            bail!("Not a valid ZIP file");
        };
        tracing::warn!(trailing, "unexpected data after End of Central Directory");
        let eocd = EndOfCentralDirectory::from_bytes(&buf[i..i + EndOfCentralDirectory::SIZE])?;
        Ok((eocd, search_start + i as u64))
    }

    /// Read the ZIP64 End of Central Directory record.
    ///
    /// Called when the regular EOCD has saturated fields. The locator sits
    /// immediately before the regular EOCD.
    pub async fn read_zip64_eocd(&self, eocd_offset: u64) -> Result<Zip64EOCD> {
        let locator_offset = eocd_offset
            .checked_sub(Zip64EOCDLocator::SIZE as u64)
            .context("Missing ZIP64 locator")?;
        let mut locator_buf = vec![0u8; Zip64EOCDLocator::SIZE];
        self.reader
            .read_exact_at(locator_offset, &mut locator_buf)
            .await?;

        let locator = Zip64EOCDLocator::from_bytes(&locator_buf)?;

        let mut eocd64_buf = vec![0u8; Zip64EOCD::MIN_SIZE];
        self.reader
            .read_exact_at(locator.eocd64_offset, &mut eocd64_buf)
            .await?;

        Zip64EOCD::from_bytes(&eocd64_buf)
    }

    /// List all entries in Central Directory order.
    ///
    /// The whole Central Directory is fetched with a single read and then
    /// parsed header by header. Recorded offsets are relative to the start
    /// of the archive, so when bytes precede it (a self-extractor stub, for
    /// one) every offset is shifted by the gap between where the directory
    /// should end and where its end record actually is.
    pub async fn list_files(&self) -> Result<Vec<ZipFileEntry>> {
        let (eocd, eocd_offset) = self.find_eocd().await?;

        let (cd_offset, cd_size, total_entries, trailer_len) = if eocd.is_zip64() {
            let eocd64 = self.read_zip64_eocd(eocd_offset).await?;
            let trailer_len = eocd64
                .trailer_len()
                .context("ZIP64 End of Central Directory size out of range")?;
            (eocd64.cd_offset, eocd64.cd_size, eocd64.total_entries, trailer_len)
        } else {
            (
                eocd.cd_offset as u64,
                eocd.cd_size as u64,
                eocd.total_entries as u64,
                0,
            )
        };

        let expected_eocd = cd_offset
            .checked_add(cd_size)
            .and_then(|end| end.checked_add(trailer_len));
        let Some(extra) = expected_eocd.and_then(|end| eocd_offset.checked_sub(end)) else {
            bail!(
                "Central Directory out of range (offset {}, size {}, end record at {})",
                cd_offset,
                cd_size,
                eocd_offset
            );
        };
        // A directory header at the recorded offset means the gap is padding
        // between directory and end record, not a prefix.
        let shift = if extra > 0 && !self.has_signature(cd_offset, CDFH_SIGNATURE).await {
            tracing::warn!(prefix = extra, "data before the archive, shifting offsets");
            extra
        } else {
            0
        };
        let cd_offset = cd_offset + shift;

        // Bound the allocation by what the source can actually hold
        if cd_offset
            .checked_add(cd_size)
            .is_none_or(|end| end > self.size)
        {
            bail!(
                "Central Directory out of range (offset {}, size {}, archive {})",
                cd_offset,
                cd_size,
                self.size
            );
        }
        if total_entries > cd_size / CDFH_MIN_SIZE as u64 {
            bail!(
                "Central Directory too small for {} entries ({} bytes)",
                total_entries,
                cd_size
            );
        }

        let mut cd_data = vec![0u8; cd_size as usize];
        self.reader.read_exact_at(cd_offset, &mut cd_data).await?;

        let mut entries = Vec::with_capacity(total_entries as usize);
        let mut cursor = Cursor::new(cd_data.as_slice());

        for index in 0..total_entries {
            let mut entry = Self::parse_cdfh(&mut cursor)
                .with_context(|| format!("Central Directory entry {index}"))?;
            let Some(lfh_offset) = entry.lfh_offset.checked_add(shift) else {
                bail!("Local File Header offset of {} out of range", entry.file_name);
            };
            entry.lfh_offset = lfh_offset;
            entries.push(entry);
        }

        Ok(entries)
    }

    async fn has_signature(&self, offset: u64, signature: &[u8]) -> bool {
        let mut buf = [0u8; 4];
        self.reader.read_exact_at(offset, &mut buf).await.is_ok() && buf[..] == *signature
    }

    /// Parse a Central Directory File Header from a cursor, leaving the
    /// cursor at the start of the next header.
    fn parse_cdfh(cursor: &mut Cursor<&[u8]>) -> Result<ZipFileEntry> {
        let mut sig = [0u8; 4];
        cursor.read_exact(&mut sig)?;
        if sig != CDFH_SIGNATURE {
            bail!("Invalid Central Directory File Header");
        }

        let _version_made_by = cursor.read_u16::<LittleEndian>()?;
        let _version_needed = cursor.read_u16::<LittleEndian>()?;
        let flags = cursor.read_u16::<LittleEndian>()?;
        let compression_method = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_time = cursor.read_u16::<LittleEndian>()?;
        let _last_mod_date = cursor.read_u16::<LittleEndian>()?;
        let crc32 = cursor.read_u32::<LittleEndian>()?;
        let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
        let file_name_length = cursor.read_u16::<LittleEndian>()?;
        let extra_field_length = cursor.read_u16::<LittleEndian>()?;
        let file_comment_length = cursor.read_u16::<LittleEndian>()?;
        let _disk_number_start = cursor.read_u16::<LittleEndian>()?;
        let _internal_attrs = cursor.read_u16::<LittleEndian>()?;
        let _external_attrs = cursor.read_u32::<LittleEndian>()?;
        let mut lfh_offset = cursor.read_u32::<LittleEndian>()? as u64;

        let mut file_name_bytes = vec![0u8; file_name_length as usize];
        cursor.read_exact(&mut file_name_bytes)?;
        let file_name = String::from_utf8_lossy(&file_name_bytes).into_owned();

        let is_directory = file_name.ends_with('/');

        // ZIP64 extended information lives in extra field 0x0001; each value
        // is present only when the matching header field is saturated.
        let extra_field_end = cursor.position() + extra_field_length as u64;

        while cursor.position() + 4 <= extra_field_end {
            let header_id = cursor.read_u16::<LittleEndian>()?;
            let field_size = cursor.read_u16::<LittleEndian>()? as u64;
            let field_end = (cursor.position() + field_size).min(extra_field_end);

            if header_id == 0x0001 {
                if uncompressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    uncompressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if compressed_size == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    compressed_size = cursor.read_u64::<LittleEndian>()?;
                }
                if lfh_offset == 0xFFFFFFFF && cursor.position() + 8 <= field_end {
                    lfh_offset = cursor.read_u64::<LittleEndian>()?;
                }
            }

            cursor.set_position(field_end);
        }

        cursor.set_position(extra_field_end + file_comment_length as u64);
        if cursor.position() > cursor.get_ref().len() as u64 {
            bail!("Central Directory File Header for {} is truncated", file_name);
        }

        Ok(ZipFileEntry {
            file_name,
            compression_method: CompressionMethod::from_u16(compression_method),
            flags,
            compressed_size,
            uncompressed_size,
            crc32,
            lfh_offset,
            is_directory,
        })
    }

    /// Get the offset where an entry's compressed data begins.
    ///
    /// The Local File Header's name and extra field may differ in length
    /// from the Central Directory copy, so the LFH itself is consulted.
    pub async fn get_data_offset(&self, entry: &ZipFileEntry) -> Result<u64> {
        let mut lfh_buf = vec![0u8; LFH_SIZE];
        self.reader
            .read_exact_at(entry.lfh_offset, &mut lfh_buf)
            .await?;

        if &lfh_buf[0..4] != LFH_SIGNATURE {
            bail!("Invalid Local File Header for {}", entry.file_name);
        }

        let mut cursor = Cursor::new(&lfh_buf);
        cursor.set_position(26); // Offset to filename length field

        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        Ok(entry.lfh_offset + LFH_SIZE as u64 + file_name_length + extra_field_length)
    }

    pub fn reader(&self) -> &Arc<R> {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemoryReader;
    use crate::test_utils::build_zip;
    use crate::zip::ZipExtractor;
    use std::io::Write;

    fn parser(data: Vec<u8>) -> ZipParser<MemoryReader> {
        ZipParser::new(Arc::new(MemoryReader::new(data)))
    }

    #[tokio::test]
    async fn lists_entries_in_directory_order() {
        let data = build_zip(
            &[
                ("output.log", "a"),
                ("notes.txt", "bb"),
                ("dalamud.log", "ccc"),
            ],
            ::zip::CompressionMethod::Deflated,
        );

        let entries = parser(data).list_files().await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.file_name.as_str()).collect();
        assert_eq!(names, ["output.log", "notes.txt", "dalamud.log"]);
        assert_eq!(entries[2].uncompressed_size, 3);
        assert_eq!(entries[0].compression_method, CompressionMethod::Deflate);
        assert!(!entries[0].is_encrypted());
    }

    #[tokio::test]
    async fn finds_eocd_behind_comment() {
        let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer.set_comment("exported by the launcher");
        writer
            .start_file("launcher.log", ::zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"hello").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let parser = parser(data);
        let (eocd, _) = parser.find_eocd().await.unwrap();
        assert_eq!(eocd.comment_len as usize, "exported by the launcher".len());

        let entries = parser.list_files().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "launcher.log");
    }

    #[tokio::test]
    async fn marks_directories() {
        let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        writer
            .add_directory("logs/", ::zip::write::SimpleFileOptions::default())
            .unwrap();
        let data = writer.finish().unwrap().into_inner();

        let entries = parser(data).list_files().await.unwrap();
        assert!(entries[0].is_directory);
    }

    #[tokio::test]
    async fn empty_archive_has_no_entries() {
        let data = build_zip(&[], ::zip::CompressionMethod::Stored);
        assert!(parser(data).list_files().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_zip_input() {
        let err = parser(b"this is not an archive at all, just text".to_vec())
            .list_files()
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Not a valid ZIP file"));

        assert!(parser(b"PK".to_vec()).list_files().await.is_err());
        assert!(parser(Vec::new()).list_files().await.is_err());
    }

    #[tokio::test]
    async fn rejects_truncated_archive() {
        let mut data = build_zip(&[("output.log", "payload")], ::zip::CompressionMethod::Stored);
        // Keep the EOCD but drop the Central Directory in front of it
        let truncated = data.split_off(data.len() - EndOfCentralDirectory::SIZE);

        let err = parser(truncated).list_files().await.unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn tolerates_bytes_after_end_record() {
        let mut data = build_zip(&[("output.log", "payload")], ::zip::CompressionMethod::Stored);
        let eocd_offset = (data.len() - EndOfCentralDirectory::SIZE) as u64;
        data.extend_from_slice(b"\r\n");

        let parser = parser(data);
        let (_, offset) = parser.find_eocd().await.unwrap();
        assert_eq!(offset, eocd_offset);

        let entries = parser.list_files().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].file_name, "output.log");
    }

    #[tokio::test]
    async fn shifts_offsets_past_leading_bytes() {
        let stub = b"#!/bin/sh\nexec unzip \"$0\"\n";
        let archive = build_zip(
            &[("launcher.log", "first"), ("output.log", "stored body")],
            ::zip::CompressionMethod::Stored,
        );
        let data = [stub.as_slice(), archive.as_slice()].concat();

        let parser = parser(data.clone());
        let entries = parser.list_files().await.unwrap();
        assert_eq!(entries[0].lfh_offset, stub.len() as u64);

        let offset = parser.get_data_offset(&entries[1]).await.unwrap() as usize;
        assert_eq!(&data[offset..offset + 11], b"stored body");
    }

    #[tokio::test]
    async fn reads_zip64_end_record_for_many_entries() {
        let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = ::zip::write::SimpleFileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored);
        for i in 0..70_000 {
            writer.start_file(format!("crash/{i}.txt"), options).unwrap();
        }
        writer.start_file("output.log", options).unwrap();
        writer.write_all(b"last").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let parser = parser(data);
        let (eocd, eocd_offset) = parser.find_eocd().await.unwrap();
        assert!(eocd.is_zip64());
        let eocd64 = parser.read_zip64_eocd(eocd_offset).await.unwrap();
        assert_eq!(eocd64.total_entries, 70_001);

        let entries = parser.list_files().await.unwrap();
        assert_eq!(entries.len(), 70_001);
        let last = entries.last().unwrap();
        assert_eq!(last.file_name, "output.log");

        let offset = parser.get_data_offset(last).await.unwrap();
        let mut body = [0u8; 4];
        parser.reader().read_exact_at(offset, &mut body).await.unwrap();
        assert_eq!(&body, b"last");
    }

    #[tokio::test]
    async fn reads_zip64_extra_fields() {
        let mut writer = ::zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = ::zip::write::SimpleFileOptions::default()
            .compression_method(::zip::CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("output.log", options).unwrap();
        writer.write_all(b"hello\n").unwrap();
        let data = writer.finish().unwrap().into_inner();

        let archive = ZipExtractor::open(Arc::new(MemoryReader::new(data))).await.unwrap();
        let entry = archive.by_name("output.log").unwrap();
        assert_eq!(entry.uncompressed_size, 6);
        assert_eq!(entry.compressed_size, 6);
        assert_eq!(archive.read_to_string(entry).await.unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn data_offset_skips_local_header() {
        let data = build_zip(&[("output.log", "stored body")], ::zip::CompressionMethod::Stored);
        let parser = parser(data.clone());
        let entries = parser.list_files().await.unwrap();

        let offset = parser.get_data_offset(&entries[0]).await.unwrap() as usize;
        assert_eq!(&data[offset..offset + 11], b"stored body");
    }
}
