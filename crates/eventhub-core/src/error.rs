//! Error handling for eventhub
//!
//! The bus itself absorbs almost every irregular condition (duplicate
//! registrations, repeated revocations, dispatches nobody hears). What is
//! left ends up here:
//! - Runtime errors (subscribing without a Tokio runtime)
//! - Configuration errors (invalid values, unreadable or malformed files)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Configuration error type
///
/// Represents errors raised while loading, saving or validating an
/// [`EventBusConfig`](crate::config::EventBusConfig).
#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    /// A configuration value is out of range
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field name.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The configuration file could not be parsed
    #[error("Invalid {format} config: {reason}")]
    Parse {
        /// The file format that was being parsed ("json" or "toml").
        format: String,
        /// The parser's error message.
        reason: String,
    },

    /// The configuration could not be serialized
    #[error("Failed to serialize {format} config: {reason}")]
    Serialize {
        /// The target file format.
        format: String,
        /// The serializer's error message.
        reason: String,
    },

    /// The file extension is neither `.json` nor `.toml`
    #[error("Config file must be .json or .toml, got '{path}'")]
    UnsupportedFormat {
        /// The rejected path.
        path: String,
    },
}

/// Main error type for eventhub
#[derive(Error, Debug)]
pub enum Error {
    /// A subscription needs a Tokio runtime to drive the merged output
    #[error("No Tokio runtime available to drive the output of '{event_type}'")]
    NoRuntime {
        /// The event type name whose output was subscribed.
        event_type: &'static str,
    },

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an error from a string message
    pub fn other(msg: impl Into<String>) -> Self {
        Error::Other(msg.into())
    }

    /// Check if this is a missing-runtime error
    pub fn is_no_runtime(&self) -> bool {
        matches!(self, Error::NoRuntime { .. })
    }

    /// Check if this is a configuration error
    pub fn is_config_error(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}

/// Result type using Error
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let err = Error::NoRuntime {
            event_type: "CartChanged",
        };
        assert!(err.is_no_runtime());
        assert!(!err.is_config_error());

        let err: Error = ConfigError::UnsupportedFormat {
            path: "bus.yaml".to_string(),
        }
        .into();
        assert!(err.is_config_error());
        assert_eq!(
            err.to_string(),
            "Config file must be .json or .toml, got 'bus.yaml'"
        );
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
        assert_eq!(err.to_string(), "I/O error: missing");
    }
}
