//! Error types for the extractor.

use thiserror::Error;

/// Main error type for the extractor library.
#[derive(Debug, Error)]
pub enum ExtractorError {
    /// The document could not be tokenized, or ended before its root closed.
    ///
    /// Fatal to the parse call: no partial dataset is returned.
    #[error("Malformed document at byte {position}: {message}")]
    MalformedDocument { position: u64, message: String },

    /// The extraction configuration cannot describe any table.
    #[error("Invalid extraction configuration: {0}")]
    InvalidConfig(String),
}

impl ExtractorError {
    /// Build a `MalformedDocument` error.
    pub(crate) fn malformed(position: u64, message: impl Into<String>) -> Self {
        Self::MalformedDocument {
            position,
            message: message.into(),
        }
    }
}

/// Result type alias for extractor operations.
pub type Result<T> = std::result::Result<T, ExtractorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_display() {
        let err = ExtractorError::malformed(42, "unexpected end of file");
        assert_eq!(
            err.to_string(),
            "Malformed document at byte 42: unexpected end of file"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let err = ExtractorError::InvalidConfig("row element is empty".to_string());
        assert!(err.to_string().contains("row element is empty"));
    }
}
