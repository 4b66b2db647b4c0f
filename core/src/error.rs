use std::time::Duration;
use thiserror::Error;

/// Failure kinds of a scan run.
#[derive(Debug, Error)]
pub enum ZapError {
    /// The engine's control port never accepted a connection within the budget.
    #[error("unable to connect to the engine at {host}:{port} after {waited:?}")]
    ConnectionTimeout {
        host: String,
        port: u16,
        waited: Duration,
    },

    /// A call to the engine's control API failed.
    #[error("engine API call {operation} failed: {message}")]
    RemoteApi { operation: String, message: String },

    /// A required setup value is missing or invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A crawl or scan job did not finish within the configured bound.
    #[error("{job} for {target} did not finish within {waited:?}")]
    PollTimeout {
        job: &'static str,
        target: String,
        waited: Duration,
    },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ZapError {
    pub fn remote(operation: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ZapError::RemoteApi {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        ZapError::Configuration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ZapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_names_the_operation() {
        let e = ZapError::remote("context/action/newContext", "bad_view");
        assert_eq!(e.to_string(), "engine API call context/action/newContext failed: bad_view");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "zap.sh");
        let e: ZapError = io.into();
        assert!(matches!(e, ZapError::Io(_)));
    }
}
