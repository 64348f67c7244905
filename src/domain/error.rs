use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Serialize, Deserialize)]
pub enum BridgeError {
    /// The engine subprocess could not be started at all (missing binary,
    /// permission denied). Distinct from a process that ran and exited non-zero.
    LaunchFailed(String),
    /// The engine ran and reported failure. `code`/`details` are present when
    /// stderr carried a structured error envelope.
    EngineFailure {
        code: Option<String>,
        message: String,
        details: Option<serde_json::Value>,
        exit: Option<i32>,
    },
    /// The engine claimed success (zero exit) but the required payload was
    /// missing or undecodable.
    ProtocolViolation(String),
    /// The caller cancelled the operation before the engine exited.
    Cancelled,
    NotFound(String),
    InvalidQuery(String),
    DatabaseError(String),
    IoError(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::LaunchFailed(msg) => write!(f, "Engine launch failed: {}", msg),
            BridgeError::EngineFailure { code, message, exit, .. } => match (code, exit) {
                (Some(code), Some(exit)) => {
                    write!(f, "Engine failure [{}] (exit {}): {}", code, exit, message)
                }
                (Some(code), None) => write!(f, "Engine failure [{}]: {}", code, message),
                (None, Some(exit)) => write!(f, "Engine failure (exit {}): {}", exit, message),
                (None, None) => write!(f, "Engine failure: {}", message),
            },
            BridgeError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            BridgeError::Cancelled => write!(f, "Operation cancelled"),
            BridgeError::NotFound(msg) => write!(f, "Not found: {}", msg),
            BridgeError::InvalidQuery(msg) => write!(f, "Invalid query: {}", msg),
            BridgeError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            BridgeError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(err: std::io::Error) -> Self {
        BridgeError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
