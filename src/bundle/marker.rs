//! Base64 JSON markers embedded in log lines.
//!
//! The producing application writes diagnostic state as
//! `<TOKEN>:<base64 of a JSON document>` somewhere on a line, usually after a
//! timestamp/level prefix. Logs are append-only, so the last marker of a kind
//! is the current one.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::LazyLock;

use crate::error::PayloadError;

// Capture stops at any line terminator, including CR and U+2028/U+2029
static RE_LAUNCHER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TROUBLESHXLTING:([^\r\n\x{2028}\x{2029}]*)").unwrap());

static RE_PLUGIN_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"TROUBLESHOOTING:([^\r\n\x{2028}\x{2029}]*)").unwrap());

static RE_EXCEPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LASTEXCEPTION:([^\r\n\x{2028}\x{2029}]*)").unwrap());

/// Standard alphabet, padding optional.
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Kind of marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    /// Launcher state, found in `output.log` / `launcher.log`.
    Launcher,
    /// Plugin host state, found in `dalamud.log`.
    PluginHost,
    /// Last unhandled exception, found in either.
    Exception,
}

impl Marker {
    pub fn token(self) -> &'static str {
        match self {
            Self::Launcher => "TROUBLESHXLTING",
            Self::PluginHost => "TROUBLESHOOTING",
            Self::Exception => "LASTEXCEPTION",
        }
    }

    fn regex(self) -> &'static Regex {
        match self {
            Self::Launcher => &RE_LAUNCHER,
            Self::PluginHost => &RE_PLUGIN_HOST,
            Self::Exception => &RE_EXCEPTION,
        }
    }

    /// Raw capture of the last marker of this kind in `text`.
    pub fn find_last(self, text: &str) -> Option<&str> {
        self.regex()
            .captures_iter(text)
            .last()
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    }

    /// Decode the last marker of this kind, `None` if there is none.
    pub fn decode<T: DeserializeOwned>(self, text: &str) -> Result<Option<T>, PayloadError> {
        self.find_last(text).map(decode_payload::<T>).transpose()
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Decode one marker capture: base64, then UTF-8, then JSON into `T`.
pub fn decode_payload<T: DeserializeOwned>(encoded: &str) -> Result<T, PayloadError> {
    let bytes = PAYLOAD_ENGINE.decode(encoded.trim())?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&json)?)
}
