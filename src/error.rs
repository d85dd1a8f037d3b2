//! Error types for the TaskBridge worker
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for worker operations
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
    ConnectionFailed = 300,
    ConnectionLost = 301,
    HandshakeFailed = 302,

    // Protocol errors (4xx)
    ProtocolViolation = 400,
    ProtocolMalformed = 401,

    // Execution errors (5xx)
    ExecutionFailed = 500,
    TaskNotFound = 501,
    MissingCapability = 502,
    PackageUnavailable = 503,

    // State errors (6xx)
    StateEncode = 600,
    StateDecode = 601,
    StateVersion = 602,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Connection errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Execution errors
            600..=699 => 60, // State errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the worker
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
    ConfigParse { message: String },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation {
        message: String,
        field: Option<String>,
    },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Connection to the task manager failed
    #[error("Failed to connect to {addr}: {message}")]
    ConnectionFailed { addr: String, message: String },

    /// Connection lost mid-session (write failure, peer reset)
    #[error("Lost connection to task manager: {message}")]
    ConnectionLost { message: String },

    /// Handshake could not be completed
    #[error("Handshake failed: {message}")]
    HandshakeFailed { message: String },

    /// Generic connection error
    #[error("Connection error: {0}")]
    Connection(String),

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Unrecognized op code on the wire
    #[error("Protocol violation: unrecognized op code 0x{op_code:02x}")]
    ProtocolViolation { op_code: u8 },

    /// Malformed frame payload
    #[error("Malformed protocol payload: {message}")]
    ProtocolMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// Task execution raised an error
    #[error("Task execution failed: {message}")]
    ExecutionFailed {
        task_id: Option<i64>,
        message: String,
    },

    /// Entry point could not be resolved to a task
    #[error("Unknown task entry point: {entry_point}")]
    TaskNotFound { entry_point: String },

    /// Requested lifecycle action not implemented by the task
    #[error("Task {entry_point} does not implement action '{action}'")]
    MissingCapability { entry_point: String, action: String },

    /// Declared package location could not be prepared
    #[error("Package location unavailable: {location}")]
    PackageUnavailable { location: String },

    // ─────────────────────────────────────────────────────────────
    // State Errors
    // ─────────────────────────────────────────────────────────────

    /// Task state could not be serialized
    #[error("Failed to encode task state: {message}")]
    StateEncode { message: String },

    /// Task state blob could not be deserialized
    #[error("Failed to decode task state: {message}")]
    StateDecode { message: String },

    /// State blob format version is not supported
    #[error("Unsupported state format version {found} (expected {expected})")]
    StateVersion { expected: u32, found: u32 },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::ConnectionLost { .. } => ErrorCode::ConnectionLost,
            Error::HandshakeFailed { .. } => ErrorCode::HandshakeFailed,
            Error::Connection(_) => ErrorCode::ConnectionFailed,

            Error::ProtocolViolation { .. } => ErrorCode::ProtocolViolation,
            Error::ProtocolMalformed { .. } => ErrorCode::ProtocolMalformed,

            Error::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
            Error::TaskNotFound { .. } => ErrorCode::TaskNotFound,
            Error::MissingCapability { .. } => ErrorCode::MissingCapability,
            Error::PackageUnavailable { .. } => ErrorCode::PackageUnavailable,

            Error::StateEncode { .. } => ErrorCode::StateEncode,
            Error::StateDecode { .. } => ErrorCode::StateDecode,
            Error::StateVersion { .. } => ErrorCode::StateVersion,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is fatal (worker should exit without reporting)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::HandshakeFailed { .. }
                | Error::ConnectionLost { .. }
                | Error::ProtocolViolation { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'taskbridge-worker config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'taskbridge-worker config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values. See documentation for valid options.",
            ),

            Error::ConnectionFailed { .. } => Some(
                "Check your network connection and verify the task manager host and port are correct.",
            ),
            Error::ConnectionLost { .. } => Some(
                "The task manager went away. It will re-launch the worker if the task is retried.",
            ),
            Error::HandshakeFailed { .. } => Some(
                "Verify the task manager is listening and speaks the same protocol version.",
            ),

            Error::TaskNotFound { .. } => Some(
                "The entry point is not registered. Check the qualified task name and the declared packages.",
            ),
            Error::MissingCapability { .. } => Some(
                "The task type does not declare this lifecycle action. Check the task's capability set.",
            ),
            Error::PackageUnavailable { .. } => Some(
                "Ensure the declared package locations exist and are readable by the worker.",
            ),

            Error::StateVersion { .. } => Some(
                "The state blob was produced by an incompatible worker version. Re-run the 'init' action.",
            ),

            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", code.as_str(), self);

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        let code = self.code();
        format!("[{}] {}", code.as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors (for ergonomic error creation)
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config not found error
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Error::ConfigNotFound { path: path.into() }
    }

    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a connection failed error
    pub fn connection_failed(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConnectionFailed {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Create a connection lost error
    pub fn connection_lost(message: impl Into<String>) -> Self {
        Error::ConnectionLost {
            message: message.into(),
        }
    }

    /// Create a handshake failed error
    pub fn handshake_failed(message: impl Into<String>) -> Self {
        Error::HandshakeFailed {
            message: message.into(),
        }
    }

    /// Create an execution failed error
    pub fn execution_failed(task_id: Option<i64>, message: impl Into<String>) -> Self {
        Error::ExecutionFailed {
            task_id,
            message: message.into(),
        }
    }

    /// Create a missing capability error
    pub fn missing_capability(entry_point: impl Into<String>, action: impl Into<String>) -> Self {
        Error::MissingCapability {
            entry_point: entry_point.into(),
            action: action.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
