//! Archive fixtures shared by the unit tests.

use std::io::{Cursor, Write};

use ::zip::CompressionMethod;
use ::zip::write::SimpleFileOptions;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Build an in-memory ZIP with the given text entries, in order.
pub fn build_zip(entries: &[(&str, &str)], method: CompressionMethod) -> Vec<u8> {
    let mut writer = ::zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(method);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Build a DEFLATE archive, the layout bundles are normally exported with.
pub fn build_text_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    build_zip(entries, CompressionMethod::Deflated)
}

/// Rewrite every occurrence of an entry name in both the local and central
/// headers. The writer refuses duplicate names, so tests that need them
/// rename one entry after the fact.
pub fn rename_entry(data: &mut [u8], from: &str, to: &str) {
    assert_eq!(from.len(), to.len());
    let (from, to) = (from.as_bytes(), to.as_bytes());
    let mut i = 0;
    while i + from.len() <= data.len() {
        if &data[i..i + from.len()] == from {
            data[i..i + from.len()].copy_from_slice(to);
            i += from.len();
        } else {
            i += 1;
        }
    }
}

/// Format one marker line the way the producing application does.
pub fn marker_line(token: &str, json: &serde_json::Value) -> String {
    format!("{token}:{}", STANDARD.encode(json.to_string()))
}
