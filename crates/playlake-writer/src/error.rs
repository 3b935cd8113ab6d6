//! Error types for the storage crate

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Source files missing, unreadable or not valid JSON
    E001SourceRead,
    /// E004: Configuration missing or invalid
    E004InvalidConfig,
    /// E005: Write operation failed
    E005WriteFailure,
    /// E006: Reading written output back failed
    E006ReadBack,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001SourceRead => "E001",
            Self::E004InvalidConfig => "E004",
            Self::E005WriteFailure => "E005",
            Self::E006ReadBack => "E006",
        }
    }
}

/// Errors that can occur while loading sources or persisting tables
#[derive(Debug, Error)]
pub enum WriterError {
    /// Raw input could not be listed, read or decoded
    #[error("[{code}] Failed to read source '{location}': {reason}")]
    SourceRead {
        code: &'static str,
        location: String,
        reason: String,
    },

    /// Invalid configuration provided
    #[error("[{code}] Invalid configuration: {message}")]
    InvalidConfig { code: &'static str, message: String },

    /// Write operation failed
    #[error("[{code}] Write operation failed for '{location}': {message}")]
    WriteFailure {
        code: &'static str,
        location: String,
        message: String,
    },

    /// Written table could not be read back
    #[error("[{code}] Failed to read table '{location}': {message}")]
    ReadBack {
        code: &'static str,
        location: String,
        message: String,
    },
}

impl WriterError {
    /// Create a source read error with error code
    pub fn source_read(location: impl Into<String>, reason: impl ToString) -> Self {
        Self::SourceRead {
            code: ErrorCode::E001SourceRead.as_str(),
            location: location.into(),
            reason: reason.to_string(),
        }
    }

    /// Create an invalid config error with error code
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            code: ErrorCode::E004InvalidConfig.as_str(),
            message: message.into(),
        }
    }

    /// Create a write failure error with error code
    pub fn write_failure(location: impl Into<String>, message: impl ToString) -> Self {
        Self::WriteFailure {
            code: ErrorCode::E005WriteFailure.as_str(),
            location: location.into(),
            message: message.to_string(),
        }
    }

    /// Create a read-back error with error code
    pub fn read_back(location: impl Into<String>, message: impl ToString) -> Self {
        Self::ReadBack {
            code: ErrorCode::E006ReadBack.as_str(),
            location: location.into(),
            message: message.to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceRead { code, .. }
            | Self::InvalidConfig { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::ReadBack { code, .. } => code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
