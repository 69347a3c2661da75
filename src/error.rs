//! Error types for QuantumEmit
//!
//! This module defines the error types used throughout the flush pipeline.
//! Configuration problems surface from `init`, everything else is mapped to a
//! [`FlushOutcome`](crate::sinks::traits::FlushOutcome) at the plugin boundary.

use crate::core::decoder::DecodeError;
use thiserror::Error;

/// Main error type for QuantumEmit operations
#[derive(Error, Debug)]
pub enum QuantumEmitError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// Initialization errors
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// I/O errors (file operations, network, etc.)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// JSON rendering errors
    #[error("Serialization error: {source}")]
    SerializationError {
        #[from]
        source: serde_json::Error,
    },

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// 二进制记录解码错误
    #[error("Decode error: {source}")]
    DecodeError {
        #[from]
        source: DecodeError,
    },

    /// Metrics encoding errors
    #[error("Encode error: {0}")]
    EncodeError(String),

    /// Payload compression errors
    #[error("Compression error: {0}")]
    CompressionError(String),

    /// HTTP transport errors
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// Result type alias for QuantumEmit operations
pub type Result<T> = std::result::Result<T, QuantumEmitError>;

impl QuantumEmitError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::EncodeError(msg.into())
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(msg: S) -> Self {
        Self::CompressionError(msg.into())
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::NetworkError(msg.into())
    }

    /// Check if this error is recoverable
    ///
    /// 可恢复的错误意味着同一批次稍后重试可能成功。
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::SerializationError { .. } => true,
            Self::NetworkError(_) => true,
            Self::ConfigError(_)
            | Self::ConfigFileMissing(_)
            | Self::InitializationError(_)
            | Self::TomlError { .. }
            | Self::DecodeError { .. }
            | Self::EncodeError(_)
            | Self::CompressionError(_) => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_) | Self::ConfigFileMissing(_) => "config",
            Self::InitializationError(_) => "initialization",
            Self::IoError { .. } => "io",
            Self::SerializationError { .. } => "serialization",
            Self::TomlError { .. } => "toml",
            Self::DecodeError { .. } => "decode",
            Self::EncodeError(_) => "encode",
            Self::CompressionError(_) => "compression",
            Self::NetworkError(_) => "network",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let config_err = QuantumEmitError::config("unknown format xml");
        assert!(matches!(config_err, QuantumEmitError::ConfigError(_)));
        assert_eq!(
            config_err.to_string(),
            "Configuration error: unknown format xml"
        );

        let net_err = QuantumEmitError::network("connection refused");
        assert!(matches!(net_err, QuantumEmitError::NetworkError(_)));
        assert_eq!(net_err.to_string(), "Network error: connection refused");
    }

    #[test]
    fn test_error_from_conversions() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let emit_error: QuantumEmitError = io_error.into();
        assert!(matches!(emit_error, QuantumEmitError::IoError { .. }));

        let decode_error = DecodeError::Truncated { offset: 3 };
        let emit_error: QuantumEmitError = decode_error.into();
        assert!(matches!(emit_error, QuantumEmitError::DecodeError { .. }));
        assert_eq!(emit_error.category(), "decode");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(QuantumEmitError::network("timeout").is_recoverable());
        assert!(QuantumEmitError::from(io::Error::other("disk full")).is_recoverable());
        assert!(!QuantumEmitError::config("invalid config").is_recoverable());
        assert!(!QuantumEmitError::compression("too large").is_recoverable());
        assert!(!QuantumEmitError::encode("label mismatch").is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(QuantumEmitError::config("test").category(), "config");
        assert_eq!(QuantumEmitError::encode("test").category(), "encode");
        assert_eq!(QuantumEmitError::compression("test").category(), "compression");
        assert_eq!(QuantumEmitError::network("test").category(), "network");
    }

    #[test]
    fn test_unicode_error_message() {
        let unicode_msg = "配置错误: 无效的分隔符 🚫";
        let err = QuantumEmitError::config(unicode_msg);
        assert!(err.to_string().contains(unicode_msg));
    }
}
