//! Error types for the search and extraction pipelines

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl Error {
    /// Request-level failures that a retry may cure.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Http(_) | Error::Timeout(_))
    }

    /// Caller-visible validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidQuery(_) | Error::InvalidInput(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout(err.to_string())
        } else if let Some(status) = err.status() {
            Error::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            Error::Http(err.to_string())
        }
    }
}

impl From<tokio::time::error::Elapsed> for Error {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        Error::Timeout(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_query() {
        let err = Error::InvalidQuery("clauses cannot be empty".to_string());
        assert!(err.to_string().contains("Invalid query"));
        assert!(err.to_string().contains("clauses cannot be empty"));
    }

    #[test]
    fn test_error_display_not_configured() {
        let err = Error::NotConfigured("GOOGLE_API_KEY".to_string());
        let msg = err.to_string();
        assert!(msg.contains("not configured"));
        assert!(msg.contains("GOOGLE_API_KEY"));
    }

    #[test]
    fn test_error_display_status() {
        let err = Error::Status {
            status: 503,
            body: "unavailable".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("503"));
        assert!(msg.contains("unavailable"));
    }

    #[test]
    fn test_transient_classification() {
        assert!(Error::Http("reset".into()).is_transient());
        assert!(Error::Timeout("30s".into()).is_transient());
        assert!(!Error::Status {
            status: 500,
            body: String::new()
        }
        .is_transient());
        assert!(!Error::Parse("bad xml".into()).is_transient());
        assert!(!Error::InvalidQuery("empty".into()).is_transient());
    }

    #[test]
    fn test_validation_classification() {
        assert!(Error::InvalidQuery("x".into()).is_validation());
        assert!(Error::InvalidInput("x".into()).is_validation());
        assert!(!Error::NotConfigured("x".into()).is_validation());
        assert!(!Error::Embedding("x".into()).is_validation());
    }

    #[test]
    fn test_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::IoError(_)));
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();

        assert!(matches!(err, Error::SerializationError(_)));
        assert!(err.to_string().contains("Serialization error"));
    }

    #[tokio::test]
    async fn test_error_from_elapsed_is_timeout() {
        let elapsed = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            tokio::time::sleep(std::time::Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
        let err: Error = elapsed.into();
        assert!(matches!(err, Error::Timeout(_)));
        assert!(err.is_transient());
    }
}
