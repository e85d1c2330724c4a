//! Error types for the poller.

use sempwatch_extractor::ExtractorError;
use thiserror::Error;

/// Main error type for the poller library.
#[derive(Debug, Error)]
pub enum PollerError {
    /// The reply could not be turned into a table.
    #[error(transparent)]
    Extract(#[from] ExtractorError),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Transient failures persisted through every retry.
    #[error("Request failed after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    /// The broker answered with a status other than 200.
    #[error("Broker returned HTTP {status}: {reason}")]
    UnexpectedStatus { status: u16, reason: String },

    /// The broker understood the request but refused to execute it.
    #[error("SEMP request rejected with code '{code}'{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    SempRejected {
        code: String,
        reason: Option<String>,
    },

    /// XML parsing failed.
    #[error("XML parsing failed: {0}")]
    XmlParse(#[from] quick_xml::Error),

    /// YAML parsing or serialization failed.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Broker host is not a hostname or IPv4 address.
    #[error("Invalid broker host: '{0}'. Expected a hostname or IPv4 address")]
    InvalidHost(String),

    /// Broker port is out of range.
    #[error("Invalid broker port: {0}")]
    InvalidPort(u16),

    /// No preset or custom monitor has this name.
    #[error("Unknown monitor '{0}'. Run `sempwatch monitors` to list them")]
    UnknownMonitor(String),

    /// Some rounds of a multi-round poll failed.
    #[error("{failed} of {total} polls failed")]
    PollsFailed { failed: u32, total: u32 },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for poller operations.
pub type Result<T> = std::result::Result<T, PollerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semp_rejected_with_reason() {
        let err = PollerError::SempRejected {
            code: "invalid-session".to_string(),
            reason: Some("not authorized".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "SEMP request rejected with code 'invalid-session': not authorized"
        );
    }

    #[test]
    fn test_semp_rejected_without_reason() {
        let err = PollerError::SempRejected {
            code: "fail".to_string(),
            reason: None,
        };
        assert_eq!(err.to_string(), "SEMP request rejected with code 'fail'");
    }

    #[test]
    fn test_extract_error_is_transparent() {
        let err: PollerError = ExtractorError::InvalidConfig("row element is empty".into()).into();
        assert_eq!(
            err.to_string(),
            "Invalid extraction configuration: row element is empty"
        );
    }

    #[test]
    fn test_unknown_monitor_display() {
        let err = PollerError::UnknownMonitor("qeueus".to_string());
        assert!(err.to_string().contains("qeueus"));
    }
}
