//! Error types for mcp-bridge.

use thiserror::Error;

/// Primary error type for all bridge operations.
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Connection to {server} failed: {message}")]
    Connection { server: String, message: String },

    #[error("Session not ready: {0}")]
    NotReady(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Tool {tool_name} returned unsupported content type '{content_type}'")]
    UnsupportedContent {
        tool_name: String,
        content_type: String,
    },

    #[error("Tool {tool_name} returned invalid content: {message}")]
    InvalidContent { tool_name: String, message: String },

    #[error("Tool {tool_name} returned an empty content list")]
    EmptyContent { tool_name: String },

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Session error: {0}")]
    Session(String),

    #[error("Session closed")]
    Closed,

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Tool call cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

/// Coarse classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Connection,
    Schema,
    Content,
    ToolExecution,
    Lifecycle,
    Timeout,
    Configuration,
    Io,
}

impl BridgeError {
    /// Build a connection error for the given server label.
    pub fn connection(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Re-label any error raised while opening a server as a connection error.
    pub fn into_connection(self, server: &str) -> Self {
        match self {
            Self::Connection { .. } => self,
            other => Self::connection(server, other.to_string()),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Network(_) => ErrorCategory::Connection,
            Self::Schema(_) => ErrorCategory::Schema,
            Self::UnsupportedContent { .. }
            | Self::InvalidContent { .. }
            | Self::EmptyContent { .. }
            | Self::Serialization(_) => ErrorCategory::Content,
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::NotReady(_)
            | Self::NotSupported(_)
            | Self::Session(_)
            | Self::Closed
            | Self::Cancelled(_) => ErrorCategory::Lifecycle,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) => ErrorCategory::Configuration,
            Self::Io(_) => ErrorCategory::Io,
        }
    }

    /// Whether retrying the same operation could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Connection | ErrorCategory::Timeout
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BridgeError>;
