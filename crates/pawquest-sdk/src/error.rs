use std::fmt;
use rusqlite;

#[derive(Debug)]
pub enum PawquestSDKError {
    SqliteError(rusqlite::Error),
    JsonError(String),
    IO(String),
    Database(String),
    Migration(String),
    Transport(String),      // 远端请求失败（网络不可达、非 2xx 等）
    NotFound(String),
    AlreadyExists(String),
    InvalidInput(String),
    InvalidOperation(String),
    NotInitialized(String),
    Other(String),
}

impl fmt::Display for PawquestSDKError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PawquestSDKError::SqliteError(e) => write!(f, "SQLite error: {}", e),
            PawquestSDKError::JsonError(e) => write!(f, "JSON error: {}", e),
            PawquestSDKError::IO(e) => write!(f, "IO error: {}", e),
            PawquestSDKError::Database(e) => write!(f, "Database error: {}", e),
            PawquestSDKError::Migration(e) => write!(f, "Migration error: {}", e),
            PawquestSDKError::Transport(e) => write!(f, "Transport error: {}", e),
            PawquestSDKError::NotFound(e) => write!(f, "Not found: {}", e),
            PawquestSDKError::AlreadyExists(e) => write!(f, "Already exists: {}", e),
            PawquestSDKError::InvalidInput(e) => write!(f, "Invalid input: {}", e),
            PawquestSDKError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            PawquestSDKError::NotInitialized(e) => write!(f, "Not initialized: {}", e),
            PawquestSDKError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for PawquestSDKError {}

impl From<rusqlite::Error> for PawquestSDKError {
    fn from(error: rusqlite::Error) -> Self {
        PawquestSDKError::SqliteError(error)
    }
}

impl From<serde_json::Error> for PawquestSDKError {
    fn from(error: serde_json::Error) -> Self {
        PawquestSDKError::JsonError(error.to_string())
    }
}

impl From<std::io::Error> for PawquestSDKError {
    fn from(error: std::io::Error) -> Self {
        PawquestSDKError::IO(error.to_string())
    }
}

impl From<reqwest::Error> for PawquestSDKError {
    fn from(error: reqwest::Error) -> Self {
        PawquestSDKError::Transport(error.to_string())
    }
}

impl PawquestSDKError {
    /// 判断是否是瞬态远端错误（可留待下个同步周期重试）
    pub fn is_transient(&self) -> bool {
        matches!(self, PawquestSDKError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, PawquestSDKError>;
