//! # Bot Error Types Module
//!
//! Structured error types shared by the upstream API client, the settings
//! store and the filter flow. The caller decides per variant whether to
//! log-and-continue (polling sweeps, persistence) or surface to the user
//! (interactive requests).

/// Custom error types for bot operations
#[derive(Debug)]
pub enum BotError {
    /// Upstream API request failed or returned a non-success status
    Upstream(String),
    /// Settings file could not be read or written
    Persistence(String),
    /// Unexpected failure while processing a flow step
    Flow(String),
}

impl std::fmt::Display for BotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotError::Upstream(msg) => write!(f, "Upstream error: {msg}"),
            BotError::Persistence(msg) => write!(f, "Persistence error: {msg}"),
            BotError::Flow(msg) => write!(f, "Flow error: {msg}"),
        }
    }
}

impl std::error::Error for BotError {}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Upstream(err.to_string())
    }
}

impl From<std::io::Error> for BotError {
    fn from(err: std::io::Error) -> Self {
        BotError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for BotError {
    fn from(err: serde_json::Error) -> Self {
        BotError::Persistence(err.to_string())
    }
}
