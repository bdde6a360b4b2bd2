//! Log bundle error types.

use thiserror::Error;

use crate::bundle::Marker;

/// Errors that abort extraction of a log bundle.
///
/// Missing log files and missing markers are not errors; they surface as
/// `None` in the result.
#[derive(Debug, Error)]
pub enum BundleError {
    #[error("cannot open archive: {0:#}")]
    Archive(anyhow::Error),

    #[error("cannot read {name}: {cause:#}")]
    Entry { name: String, cause: anyhow::Error },

    #[error("invalid {marker} marker in {file}: {source}")]
    Payload {
        file: String,
        marker: Marker,
        #[source]
        source: PayloadError,
    },
}

/// Reasons a matched marker payload fails to decode.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Convenience alias for log bundle results.
pub type BundleResult<T> = Result<T, BundleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_error_names_marker_and_file() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = BundleError::Payload {
            file: "dalamud.log".into(),
            marker: Marker::Exception,
            source: source.into(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("invalid LASTEXCEPTION marker in dalamud.log: invalid JSON"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn archive_error_keeps_context_chain() {
        let cause = anyhow::anyhow!("Not a valid ZIP file").context("opening bundle");
        let msg = BundleError::Archive(cause).to_string();
        assert_eq!(msg, "cannot open archive: opening bundle: Not a valid ZIP file");
    }
}
