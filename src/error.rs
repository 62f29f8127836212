//! Error types for the PFC client
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for the CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Connection errors (3xx)
    DialFailed = 300,
    ConnectionLost = 303,

    // Protocol errors (4xx)
    ProtocolVersion = 400,
    ProtocolMalformed = 401,
    HandshakeIo = 402,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E300")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────
// Handshake Errors
// ─────────────────────────────────────────────────────────────────

/// Coarse classification of a handshake failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeErrorKind {
    VersionMismatch,
    InvalidMarker,
    Io,
}

/// Failure while negotiating the 3-byte handshake
#[derive(Error, Debug)]
pub enum HandshakeError {
    /// Server speaks a different protocol version
    #[error("handshake error, expected protocol version {expected}, got {actual}")]
    VersionMismatch { expected: u16, actual: u16 },

    /// Request marker byte is not the handshake request byte
    #[error("handshake error, invalid request byte {actual:#04x} (expected {expected:#04x})")]
    InvalidMarker { expected: u8, actual: u8 },

    /// Read or write failed during the exchange
    #[error("handshake I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HandshakeError {
    pub fn kind(&self) -> HandshakeErrorKind {
        match self {
            HandshakeError::VersionMismatch { .. } => HandshakeErrorKind::VersionMismatch,
            HandshakeError::InvalidMarker { .. } => HandshakeErrorKind::InvalidMarker,
            HandshakeError::Io(_) => HandshakeErrorKind::Io,
        }
    }
}

/// Main error type for the client
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Every dial attempt failed
    #[error("error, too many dial attempts to {addr}: {attempts}")]
    Dial { addr: String, attempts: u32 },

    /// The server closed the connection or a read failed mid-session
    #[error("Lost connection to {addr}: {message}")]
    ConnectionLost { addr: String, message: String },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Handshake negotiation failed
    #[error(transparent)]
    Handshake(#[from] HandshakeError),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::Dial { .. } => ErrorCode::DialFailed,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,

            Error::Handshake(e) => match e.kind() {
                HandshakeErrorKind::VersionMismatch => ErrorCode::ProtocolVersion,
                HandshakeErrorKind::InvalidMarker => ErrorCode::ProtocolMalformed,
                HandshakeErrorKind::Io => ErrorCode::HandshakeIo,
            },

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if restarting the client could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Dial { .. } | Error::ConnectionLost { .. } | Error::Io(_)
        ) || matches!(self, Error::Handshake(e) if e.kind() == HandshakeErrorKind::Io)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'pfc-client config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'pfc-client config validate' to see details."
            ),
            Error::ConfigValidation { .. } | Error::Config(_) => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::Dial { .. } => Some(
                "Check that the server is running and 'client.remote_addr' is correct, or raise 'client.max_dial_attempts'."
            ),
            Error::ConnectionLost { .. } => Some(
                "The server closed the connection. Restart the client to dial again."
            ),
            Error::Handshake(e) => match e.kind() {
                HandshakeErrorKind::VersionMismatch => Some(
                    "The server speaks a different protocol version. Upgrade the client or the server."
                ),
                HandshakeErrorKind::InvalidMarker => Some(
                    "The remote endpoint does not look like a PFC server. Check 'client.remote_addr'."
                ),
                HandshakeErrorKind::Io => None,
            },
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Error::ConfigValidation { field: Some(field), .. } = self {
            output.push_str(&format!("  Field: {}\n", field));
        }

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    pub fn config_parse(message: impl Into<String>, source: toml::de::Error) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn connection_lost(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConnectionLost {
            addr: addr.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::ConfigNotFound.as_str(), "E100");
        assert_eq!(ErrorCode::DialFailed.as_str(), "E300");
        assert_eq!(ErrorCode::InternalError.as_str(), "E900");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::ConfigValidation.exit_code(), 10);
        assert_eq!(ErrorCode::IoRead.exit_code(), 20);
        assert_eq!(ErrorCode::DialFailed.exit_code(), 30);
        assert_eq!(ErrorCode::ProtocolVersion.exit_code(), 40);
        assert_eq!(ErrorCode::InternalError.exit_code(), 90);
    }

    #[test]
    fn test_dial_error_is_retryable() {
        let err = Error::Dial { addr: "127.0.0.1:3000".into(), attempts: 26 };
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), 30);
        assert!(err.to_string().contains("26"));
    }

    #[test]
    fn test_handshake_kinds() {
        let err = HandshakeError::VersionMismatch { expected: 1, actual: 2 };
        assert_eq!(err.kind(), HandshakeErrorKind::VersionMismatch);

        let err = HandshakeError::InvalidMarker { expected: 5, actual: 7 };
        assert_eq!(err.kind(), HandshakeErrorKind::InvalidMarker);
        assert!(err.to_string().contains("0x07"));

        let err: HandshakeError =
            std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(err.kind(), HandshakeErrorKind::Io);
    }

    #[test]
    fn test_handshake_error_codes() {
        let err: Error = HandshakeError::VersionMismatch { expected: 1, actual: 9 }.into();
        assert_eq!(err.code(), ErrorCode::ProtocolVersion);
        assert!(!err.is_retryable());

        let err: Error = HandshakeError::Io(std::io::ErrorKind::BrokenPipe.into()).into();
        assert_eq!(err.code(), ErrorCode::HandshakeIo);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::config_not_found("/test/client.toml");
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E100"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_terminal_names_field() {
        let err = Error::config_field_invalid("session.write_interval_ms", "must be positive");
        assert!(err.format_for_terminal().contains("Field: session.write_interval_ms"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::connection_lost("127.0.0.1:3000", "end of stream");
        let formatted = err.format_for_log();

        assert!(formatted.contains("[E303]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::IoNotFound);
    }
}
