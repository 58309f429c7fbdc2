//! Email extraction from free-form customer text.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OracleError, OracleKind};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object};

const EXTRACT_MAX_TOKENS: u32 = 128;

/// Email pulled from a message. Empty when none was found.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailExtraction {
    #[serde(default)]
    pub email: String,
}

impl EmailExtraction {
    pub fn found(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.email.is_empty()
    }
}

/// Pulls a suspected email address out of a message.
#[async_trait]
pub trait EmailExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<EmailExtraction, OracleError>;
}

/// LLM-backed extractor.
pub struct LlmEmailExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmEmailExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

fn extraction_system_prompt() -> &'static str {
    r#"Extract the email address from the user's message.

Respond with ONLY a JSON object:
{"email": "<address>"}
Use an empty string if the message contains no email address."#
}

pub(crate) fn parse_extraction(raw: &str) -> Result<EmailExtraction, String> {
    let json_str = extract_json_object(raw);
    let mut extraction: EmailExtraction =
        serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))?;
    extraction.email = extraction.email.trim().to_string();
    Ok(extraction)
}

#[async_trait]
impl EmailExtractor for LlmEmailExtractor {
    async fn extract(&self, text: &str) -> Result<EmailExtraction, OracleError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(extraction_system_prompt()),
            ChatMessage::user(text),
        ])
        .with_temperature(0.0)
        .with_max_tokens(EXTRACT_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|source| OracleError::Call {
                oracle: OracleKind::Extractor,
                source,
            })?;

        parse_extraction(&response.content).map_err(|reason| {
            debug!(raw_response = %response.content, "Unparseable extraction");
            OracleError::Malformed {
                oracle: OracleKind::Extractor,
                reason,
            }
        })
    }
}

/// Offline extractor: first address-shaped token in the text.
pub struct RegexEmailExtractor {
    pattern: Regex,
}

impl RegexEmailExtractor {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}")?,
        })
    }
}

#[async_trait]
impl EmailExtractor for RegexEmailExtractor {
    async fn extract(&self, text: &str) -> Result<EmailExtraction, OracleError> {
        Ok(self
            .pattern
            .find(text)
            .map(|m| EmailExtraction::found(m.as_str()))
            .unwrap_or_default())
    }
}
