//! ═══════════════════════════════════════════════════════════════════════════════
//! ERROR — Unified Error Type for Butterfly
//! ═══════════════════════════════════════════════════════════════════════════════
//! Centralized error handling. The metric engine itself is almost total; the
//! only engine failures are degenerate Kaplan-Yorke inputs. Everything else
//! here belongs to configuration, fetching, and persistence.
//! ═══════════════════════════════════════════════════════════════════════════════

use thiserror::Error;

/// The unified error type for the Butterfly crate
#[derive(Debug, Error)]
pub enum ButterflyError {
    /// I/O error (checkpoint files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Response source error (only surfaced by health checks; generation
    /// failures are mapped to empty responses)
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Kaplan-Yorke remainder would divide by an exactly-zero exponent
    #[error("Degenerate dimension: exponent at index {index} is exactly zero")]
    DegenerateDimension { index: usize },

    /// Kaplan-Yorke input contained NaN or an infinity
    #[error("Non-finite exponent {value} at index {index}")]
    NonFiniteExponent { index: usize, value: f64 },
}

/// Configuration-specific errors
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Unknown noise category name
    #[error("Unknown noise category: {0}")]
    UnknownNoiseCategory(String),
}

/// Errors talking to the language-model service
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("HTTP error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP {0}")]
    Status(u16),

    /// Body was not the expected JSON shape
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// Type alias for Result with ButterflyError
pub type ButterflyResult<T> = Result<T, ButterflyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ButterflyError::DegenerateDimension { index: 2 };
        assert!(err.to_string().contains("index 2"));

        let err: ButterflyError = ConfigError::InvalidValue {
            field: "runs_per_prompt".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into();
        assert!(err.to_string().contains("runs_per_prompt"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: ButterflyError = io_err.into();
        assert!(matches!(err, ButterflyError::Io(_)));
    }

    #[test]
    fn test_fetch_error_wraps() {
        let err: ButterflyError = FetchError::Status(503).into();
        assert_eq!(err.to_string(), "Fetch error: HTTP 503");
    }
}
