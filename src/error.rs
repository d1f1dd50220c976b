// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Error types for the decoder.
//!
//! Only programming errors surface here: an invalid skeleton topology, fields whose
//! shape does not match the topology or their stride, and out-of-range configuration.
//! Data-driven rejections during decoding are never errors.

use std::fmt;

/// Result type alias for decoder operations.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Main error type for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Skeleton topology references an invalid joint type.
    TopologyError(String),
    /// Input field shape does not match the topology or the stated stride.
    FieldShapeError(String),
    /// Invalid configuration provided.
    ConfigError(String),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TopologyError(msg) => write!(f, "Topology error: {msg}"),
            Self::FieldShapeError(msg) => write!(f, "Field shape error: {msg}"),
            Self::ConfigError(msg) => write!(f, "Config error: {msg}"),
        }
    }
}

impl std::error::Error for DecodeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecodeError::TopologyError("limb 3 references joint 17".to_string());
        assert_eq!(err.to_string(), "Topology error: limb 3 references joint 17");

        let err = DecodeError::FieldShapeError("test".to_string());
        assert_eq!(err.to_string(), "Field shape error: test");

        let err = DecodeError::ConfigError("test".to_string());
        assert_eq!(err.to_string(), "Config error: test");
    }
}
