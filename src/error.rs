//! Error types for fanlog
//!
//! This module defines all error types used by the output router and its sinks.
//! Errors fall into three groups: configuration errors (always fatal),
//! connectivity errors (eligible for the disable-and-warn policy) and
//! everything else, which is propagated unchanged.

use thiserror::Error;

/// Main error type for fanlog operations
#[derive(Error, Debug)]
pub enum FanlogError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Configuration file not found
    #[error("Configuration file not found: {0}")]
    ConfigFileMissing(String),

    /// TOML parsing errors
    #[error("TOML parsing error: {source}")]
    TomlError {
        #[from]
        source: toml::de::Error,
    },

    /// Layered configuration (file + environment) errors
    #[error("Configuration source error: {source}")]
    ConfigSourceError {
        #[from]
        source: ::config::ConfigError,
    },

    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },

    /// SMTP transport errors
    #[error("SMTP error: {0}")]
    SmtpError(String),

    /// SMTP server answered with an unexpected reply code
    #[error("SMTP server replied {code}: {message}")]
    SmtpReply { code: u16, message: String },

    /// Database operation errors
    #[error("Database error: {0}")]
    DatabaseError(String),

    /// 数据库连接错误
    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    /// Sink-related errors
    #[error("Sink error: {0}")]
    SinkError(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Result type alias for fanlog operations
pub type Result<T> = std::result::Result<T, FanlogError>;

impl FanlogError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Create a new SMTP error
    pub fn smtp<S: Into<String>>(msg: S) -> Self {
        Self::SmtpError(msg.into())
    }

    /// Create a new database error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseError(msg.into())
    }

    /// Create a new database connection error
    pub fn database_connection<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseConnection {
            message: msg.into(),
        }
    }

    /// Create a new sink error
    pub fn sink<S: Into<String>>(msg: S) -> Self {
        Self::SinkError(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::InternalError(msg.into())
    }

    /// Configuration errors are never swallowed by a sink.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            Self::ConfigError(_)
                | Self::ConfigFileMissing(_)
                | Self::TomlError { .. }
                | Self::ConfigSourceError { .. }
        )
    }

    /// Check if this error is recoverable by disabling the failing sink
    ///
    /// Only connectivity failures qualify; a missing table or a rejected
    /// statement is a `DatabaseError` and always reaches the caller.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::IoError { .. } => true,
            Self::SmtpError(_) => true,
            Self::SmtpReply { .. } => true,
            Self::DatabaseConnection { .. } => true,
            _ => false,
        }
    }

    /// Get the error category for logging purposes
    pub fn category(&self) -> &'static str {
        match self {
            Self::ConfigError(_)
            | Self::ConfigFileMissing(_)
            | Self::TomlError { .. }
            | Self::ConfigSourceError { .. } => "config",
            Self::IoError { .. } => "io",
            Self::SmtpError(_) | Self::SmtpReply { .. } => "smtp",
            Self::DatabaseError(_) | Self::DatabaseConnection { .. } => "database",
            Self::SinkError(_) => "sink",
            Self::InternalError(_) => "internal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_error_creation() {
        let config_err = FanlogError::config("incorrect port");
        assert!(matches!(config_err, FanlogError::ConfigError(_)));
        assert_eq!(config_err.to_string(), "Configuration error: incorrect port");

        let db_err = FanlogError::database("Connection failed");
        assert!(matches!(db_err, FanlogError::DatabaseError(_)));
        assert_eq!(db_err.to_string(), "Database error: Connection failed");
    }

    #[test]
    fn test_smtp_reply_display() {
        let err = FanlogError::SmtpReply {
            code: 535,
            message: "5.7.8 Authentication failed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "SMTP server replied 535: 5.7.8 Authentication failed"
        );
        assert_eq!(err.category(), "smtp");
    }

    #[test]
    fn test_error_from_conversions() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let fanlog_error: FanlogError = io_error.into();
        assert!(matches!(fanlog_error, FanlogError::IoError { .. }));

        let toml_error = toml::from_str::<toml::Value>("key = ").unwrap_err();
        let fanlog_error: FanlogError = toml_error.into();
        assert!(fanlog_error.is_config());
    }

    #[test]
    fn test_config_errors_are_not_recoverable() {
        assert!(!FanlogError::config("missing password").is_recoverable());
        assert!(FanlogError::config("missing password").is_config());
        assert!(FanlogError::smtp("connection reset").is_recoverable());
        assert!(FanlogError::database_connection("refused").is_recoverable());
        assert!(!FanlogError::database("no such table: job_lgo").is_recoverable());
        assert!(!FanlogError::internal("poisoned").is_recoverable());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(FanlogError::config("test").category(), "config");
        assert_eq!(FanlogError::database("test").category(), "database");
        assert_eq!(FanlogError::smtp("test").category(), "smtp");
        assert_eq!(FanlogError::sink("test").category(), "sink");
        assert_eq!(FanlogError::internal("test").category(), "internal");
    }

    #[test]
    fn test_error_chain() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "Access denied");
        let fanlog_error: FanlogError = io_error.into();

        let error_string = fanlog_error.to_string();
        assert!(error_string.contains("Access denied"));
    }
}
