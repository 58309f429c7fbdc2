//! Configuration types.
//!
//! Everything can be overridden through `TECHHUB_*` environment variables;
//! unset variables fall back to the defaults below.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// What the router does when the classifier stays unavailable after retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierFallback {
    /// Fail the turn with a retryable error.
    #[default]
    Fail,
    /// Treat the query as needing verification.
    RequireVerification,
}

impl FromStr for ClassifierFallback {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "require_verification" | "verify" => Ok(Self::RequireVerification),
            other => Err(ConfigError::InvalidValue {
                key: "TECHHUB_CLASSIFIER_FALLBACK".into(),
                message: format!("expected 'fail' or 'require_verification', got '{other}'"),
            }),
        }
    }
}

/// Retry settings for oracle calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// Verification flow configuration.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    /// Idle lifetime of a stored conversation, suspended or not.
    pub conversation_ttl: Duration,
    /// Oracle retry policy.
    pub retry: RetryConfig,
    /// Router behaviour when classification is unavailable.
    pub classifier_fallback: ClassifierFallback,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            conversation_ttl: Duration::from_secs(24 * 3600),
            retry: RetryConfig::default(),
            classifier_fallback: ClassifierFallback::Fail,
        }
    }
}

/// Service configuration.
#[derive(Debug, Clone)]
pub struct SupportConfig {
    /// Anthropic API key. `None` runs the offline oracles.
    pub api_key: Option<SecretString>,
    /// Model used by every LLM-backed component.
    pub model: String,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// HTTP port for `serve`.
    pub http_port: u16,
    /// Flow settings.
    pub flow: FlowConfig,
}

impl Default for SupportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-haiku-4-5".to_string(),
            db_path: PathBuf::from("./data/techhub.db"),
            http_port: 8080,
            flow: FlowConfig::default(),
        }
    }
}

impl SupportConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.api_key = lookup("ANTHROPIC_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        if let Some(model) = lookup("TECHHUB_MODEL") {
            config.model = model;
        }
        if let Some(path) = lookup("TECHHUB_DB_PATH") {
            config.db_path = PathBuf::from(path);
        }
        if let Some(port) = lookup("TECHHUB_HTTP_PORT") {
            config.http_port = parse_value("TECHHUB_HTTP_PORT", &port)?;
        }
        if let Some(ttl) = lookup("TECHHUB_CONVERSATION_TTL_SECS") {
            let secs: u64 = parse_value("TECHHUB_CONVERSATION_TTL_SECS", &ttl)?;
            config.flow.conversation_ttl = Duration::from_secs(secs);
        }
        if let Some(retries) = lookup("TECHHUB_ORACLE_MAX_RETRIES") {
            config.flow.retry.max_retries = parse_value("TECHHUB_ORACLE_MAX_RETRIES", &retries)?;
        }
        if let Some(delay) = lookup("TECHHUB_ORACLE_RETRY_DELAY_MS") {
            let ms: u64 = parse_value("TECHHUB_ORACLE_RETRY_DELAY_MS", &delay)?;
            config.flow.retry.base_delay = Duration::from_millis(ms);
        }
        if let Some(fallback) = lookup("TECHHUB_CLASSIFIER_FALLBACK") {
            config.flow.classifier_fallback = fallback.parse()?;
        }

        Ok(config)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
