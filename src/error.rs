//! Error types for the TechHub support core.

use std::time::Duration;

/// Text shown to a customer when a turn fails for infrastructure reasons.
pub const TRY_AGAIN_MESSAGE: &str =
    "Sorry, I'm having trouble right now. Please try again in a moment.";

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),
}

impl Error {
    /// Whether the host may retry the same turn unchanged.
    ///
    /// Oracle failures are transient; store and configuration failures are not
    /// fixed by resending the message.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Oracle(_) => true,
            Self::Llm(e) => e.is_transient(),
            Self::Config(_) | Self::Database(_) => false,
        }
    }

    /// Customer-facing text for a failed turn.
    pub fn user_message(&self) -> &'static str {
        TRY_AGAIN_MESSAGE
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Pool(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LlmError {
    /// Whether a retry has a chance of succeeding.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::RequestFailed { .. } | Self::RateLimited { .. } | Self::InvalidResponse { .. }
        )
    }
}

/// Which external oracle failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleKind {
    Classifier,
    Extractor,
    Responder,
    Evaluator,
}

impl std::fmt::Display for OracleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Classifier => "classifier",
            Self::Extractor => "extractor",
            Self::Responder => "responder",
            Self::Evaluator => "evaluator",
        };
        write!(f, "{s}")
    }
}

/// An oracle call that failed, possibly after retries.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("{oracle} call failed: {source}")]
    Call {
        oracle: OracleKind,
        #[source]
        source: LlmError,
    },

    #[error("{oracle} returned malformed output: {reason}")]
    Malformed { oracle: OracleKind, reason: String },

    #[error("{oracle} unavailable after {attempts} attempts: {last}")]
    Exhausted {
        oracle: OracleKind,
        attempts: u32,
        last: String,
    },
}

impl OracleError {
    /// The oracle this error came from.
    pub fn oracle(&self) -> OracleKind {
        match self {
            Self::Call { oracle, .. } | Self::Malformed { oracle, .. } | Self::Exhausted { oracle, .. } => {
                *oracle
            }
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
