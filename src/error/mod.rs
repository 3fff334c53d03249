//! Error types for parley.

use thiserror::Error;

/// Primary error type for all parley operations.
#[derive(Error, Debug)]
pub enum ParleyError {
    /// Transport or decode failure while talking to a backend.
    /// The only error family that aborts a turn.
    #[error("Adapter error: {message}")]
    Adapter {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The model produced arguments that do not parse even leniently.
    #[error("Tool argument error for '{name}': {message}")]
    ToolArguments { name: String, message: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// A tool body failed. Captured into the tool message content by the
    /// orchestrator, never propagated across the turn boundary.
    #[error("Tool execution error: {name}: {message}")]
    ToolExecution { name: String, message: String },

    /// Non-fatal; the session continues after reporting.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ParleyError {
    /// Create an adapter error without an underlying cause.
    pub fn adapter(message: impl Into<String>) -> Self {
        Self::Adapter {
            message: message.into(),
            source: None,
        }
    }

    /// Create an adapter error wrapping the underlying cause.
    pub fn adapter_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Adapter {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Short kind tag used in notifications.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Adapter { .. } => "adapter",
            Self::Api { .. } => "api",
            Self::Authentication(_) => "authentication",
            Self::RateLimited { .. } => "rate_limited",
            Self::Configuration(_) => "configuration",
            Self::ToolArguments { .. } => "tool_arguments",
            Self::UnknownTool(_) => "unknown_tool",
            Self::ToolExecution { .. } => "tool_execution",
            Self::Persistence(_) => "persistence",
            Self::Io(_) => "io",
        }
    }

    /// Whether this error ends the current turn. Per-call errors
    /// (arguments, dispatch, execution) and persistence failures do not.
    pub fn aborts_turn(&self) -> bool {
        matches!(
            self,
            Self::Adapter { .. }
                | Self::Api { .. }
                | Self::Authentication(_)
                | Self::RateLimited { .. }
        )
    }
}

impl From<reqwest::Error> for ParleyError {
    fn from(err: reqwest::Error) -> Self {
        Self::adapter_with_source("network failure", err)
    }
}

impl From<serde_json::Error> for ParleyError {
    fn from(err: serde_json::Error) -> Self {
        Self::adapter_with_source("decode failure", err)
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ParleyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_adapter_family_aborts_turn() {
        assert!(ParleyError::adapter("boom").aborts_turn());
        assert!(ParleyError::Authentication("no key".into()).aborts_turn());
        assert!(!ParleyError::UnknownTool("nope".into()).aborts_turn());
        assert!(!ParleyError::ToolArguments {
            name: "read_file".into(),
            message: "bad json".into(),
        }
        .aborts_turn());
        assert!(!ParleyError::Persistence("disk full".into()).aborts_turn());
    }

    #[test]
    fn network_errors_fold_into_adapter() {
        let err = ParleyError::adapter_with_source(
            "network failure",
            std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"),
        );
        assert_eq!(err.kind(), "adapter");
        assert!(std::error::Error::source(&err).is_some());
    }
}
