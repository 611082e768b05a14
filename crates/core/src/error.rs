//! Unified error types for quire.

use tokio_rusqlite::rusqlite;

/// Unified error types for the quire core crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty script body).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Registry database operation failed.
    #[error("REGISTRY_ERROR: {0}")]
    Registry(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("REGISTRY_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored row failed to decode.
    #[error("REGISTRY_ERROR: malformed record: {0}")]
    MalformedRecord(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// A manifest entry references a script file that could not be read.
    #[error("MANIFEST_ERROR: {id}: {reason}")]
    ManifestScript { id: String, reason: String },
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => {
                Error::Registry(tokio_rusqlite::Error::ConnectionClosed)
            }
            tokio_rusqlite::Error::Close(c) => Error::Registry(tokio_rusqlite::Error::Close(c)),
            _ => Error::Registry(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Registry(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Registry(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl("not-a-url".to_string());
        assert!(err.to_string().contains("INVALID_URL"));
        assert!(err.to_string().contains("not-a-url"));
    }

    #[test]
    fn test_manifest_error_display() {
        let err = Error::ManifestScript {
            id: "ExampleParser.js".to_string(),
            reason: "file not found".to_string(),
        };
        assert!(err.to_string().contains("MANIFEST_ERROR"));
        assert!(err.to_string().contains("ExampleParser.js"));
    }
}
