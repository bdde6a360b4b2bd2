//! ZIP archive parsing and extraction.
//!
//! Log bundles are plain ZIP files. This module reads them from any
//! [`ReadAt`](crate::io::ReadAt) source, supporting both the standard
//! format and ZIP64 extensions.
//!
//! ## Architecture
//!
//! - [`structures`]: Data structures representing ZIP format elements (EOCD, file headers, etc.)
//! - [`parser`]: Low-level parsing of ZIP structures from raw bytes
//! - [`extractor`]: Opened archive with name lookup and verified entry reads
//!
//! The EOCD is read first (from the end of the source), then the Central
//! Directory, so listing an archive never touches entry data.
//!
//! ## Supported Features
//!
//! - Standard ZIP format (PKZIP APPNOTE 6.3.x compatible)
//! - ZIP64 extensions for files > 4GB
//! - STORED and DEFLATE compression methods
//! - CRC-32 and size verification of every extracted entry
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

mod extractor;
mod parser;
mod structures;

pub use extractor::ZipExtractor;
pub use parser::ZipParser;
pub use structures::*;
