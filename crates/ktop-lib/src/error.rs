//! Error types for the ktop core

use thiserror::Error;

/// Failure to retrieve inventory or metrics from the cluster
#[derive(Debug, Clone, Error)]
pub enum RetrievalError {
    /// Listing the entity inventory failed
    #[error("inventory listing failed: {0}")]
    Inventory(String),

    /// Fetching metrics for a single entity failed
    #[error("metric fetch for {entity} failed: {message}")]
    Metric { entity: String, message: String },

    /// A resource quantity could not be parsed
    #[error("malformed quantity {0:?}")]
    Quantity(String),
}

/// Invalid session configuration, raised before any fetch starts
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid metric key {0:?}, expected \"cpu\" or \"memory\"")]
    InvalidMetricKey(String),

    #[error("invalid display mode {0:?}, expected \"nodes\" or \"pods\"")]
    InvalidDisplayMode(String),

    #[error("top-k must be greater than zero")]
    NonPositiveTopK,

    #[error("{field} must be greater than zero")]
    ZeroPeriod { field: &'static str },

    #[error("bar width must be greater than zero")]
    ZeroBarWidth,

    #[error("bar width {width} exceeds the maximum of {max}")]
    BarWidthTooLarge { width: usize, max: usize },

    #[error("{field} must be a finite, non-negative number")]
    InvalidCeiling { field: &'static str },
}

/// The render sink could not draw a frame
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level error for a display session
#[derive(Debug, Error)]
pub enum TopError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("session component missing: {0}")]
    Incomplete(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = RetrievalError::Metric {
            entity: "kube-system/coredns".to_string(),
            message: "not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "metric fetch for kube-system/coredns failed: not found"
        );

        let err = ConfigError::ZeroPeriod {
            field: "refresh_period",
        };
        assert_eq!(err.to_string(), "refresh_period must be greater than zero");
    }

    #[test]
    fn test_top_error_is_transparent() {
        let err: TopError = ConfigError::NonPositiveTopK.into();
        assert_eq!(err.to_string(), "top-k must be greater than zero");
    }
}
