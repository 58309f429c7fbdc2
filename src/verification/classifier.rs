//! Query classification: does answering this need the customer's identity?
//!
//! Two implementations:
//! - `LlmQueryClassifier` asks the model for a JSON verdict.
//! - `KeywordClassifier` matches account-specific phrasing with regexes and
//!   is used when no API key is configured.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OracleError, OracleKind};
use crate::llm::{ChatMessage, CompletionRequest, LlmProvider, extract_json_object};

const CLASSIFY_MAX_TOKENS: u32 = 256;
const CLASSIFY_TEMPERATURE: f32 = 0.0;

/// Verdict of the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryClassification {
    /// Brief explanation of the verdict.
    #[serde(default)]
    pub reasoning: String,
    pub requires_verification: bool,
}

/// Decides whether a query requires knowing who the customer is.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    async fn classify(&self, query: &str) -> Result<QueryClassification, OracleError>;
}

/// LLM-backed classifier.
pub struct LlmQueryClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmQueryClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

fn classification_system_prompt() -> &'static str {
    r#"Analyze the user's query to determine if it requires knowing their customer identity in order to answer the question.

Queries about "my orders", "my account", or "my purchases" require verification.
General questions (product info, policies, how-to) do not.

Respond with ONLY a JSON object:
{"reasoning": "<one sentence>", "requires_verification": true|false}"#
}

/// Parse the classifier's reply, tolerating markdown wrapping.
pub(crate) fn parse_classification(raw: &str) -> Result<QueryClassification, String> {
    let json_str = extract_json_object(raw);
    serde_json::from_str(&json_str).map_err(|e| format!("JSON parse error: {e}"))
}

#[async_trait]
impl QueryClassifier for LlmQueryClassifier {
    async fn classify(&self, query: &str) -> Result<QueryClassification, OracleError> {
        let request = CompletionRequest::new(vec![
            ChatMessage::system(classification_system_prompt()),
            ChatMessage::user(format!("Query: {query}")),
        ])
        .with_temperature(CLASSIFY_TEMPERATURE)
        .with_max_tokens(CLASSIFY_MAX_TOKENS);

        let response = self
            .llm
            .complete(request)
            .await
            .map_err(|source| OracleError::Call {
                oracle: OracleKind::Classifier,
                source,
            })?;

        parse_classification(&response.content).map_err(|reason| {
            debug!(raw_response = %response.content, "Unparseable classification");
            OracleError::Malformed {
                oracle: OracleKind::Classifier,
                reason,
            }
        })
    }
}

/// A phrase pattern that marks a query as account-specific.
#[derive(Debug, Clone)]
struct AccountRule {
    regex: Regex,
    reason: &'static str,
}

/// Offline classifier: regex rules over the query text.
pub struct KeywordClassifier {
    rules: Vec<AccountRule>,
}

impl KeywordClassifier {
    /// Rules for order, account, and purchase questions.
    pub fn default_rules() -> Result<Self, regex::Error> {
        let specs: &[(&str, &str)] = &[
            (
                r"(?i)\bmy\s+(last\s+|latest\s+|recent\s+)?(orders?|purchases?|account|package|delivery|shipment|refund|return|invoice|subscription)\b",
                "mentions the customer's own orders or account",
            ),
            (
                r"(?i)\b(i|we)\s+(ordered|bought|purchased|paid)\b",
                "refers to something the customer bought",
            ),
            (
                r"(?i)\bwhere\s+is\s+my\b",
                "asks where the customer's item is",
            ),
            (r"(?i)\bORD-\d{4}-\d+\b", "references a specific order number"),
            (
                r"(?i)\b(track|cancel|change)\s+(my|an?|the)\s+order\b",
                "asks to act on an order",
            ),
        ];

        let rules = specs
            .iter()
            .map(|&(pattern, reason)| {
                Ok(AccountRule {
                    regex: Regex::new(pattern)?,
                    reason,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { rules })
    }
}

#[async_trait]
impl QueryClassifier for KeywordClassifier {
    async fn classify(&self, query: &str) -> Result<QueryClassification, OracleError> {
        let hit = self.rules.iter().find(|rule| rule.regex.is_match(query));
        Ok(match hit {
            Some(rule) => QueryClassification {
                reasoning: format!("Query {}.", rule.reason),
                requires_verification: true,
            },
            None => QueryClassification {
                reasoning: "General question; no customer data needed.".into(),
                requires_verification: false,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::ScriptedLlm;

    #[test]
    fn parse_plain_json() {
        let c = parse_classification(
            r#"{"reasoning": "asks about their order", "requires_verification": true}"#,
        )
        .unwrap();
        assert!(c.requires_verification);
        assert_eq!(c.reasoning, "asks about their order");
    }

    #[test]
    fn parse_fenced_json() {
        let raw = "```json\n{\"reasoning\": \"policy\", \"requires_verification\": false}\n```";
        assert!(!parse_classification(raw).unwrap().requires_verification);
    }

    #[test]
    fn parse_embedded_json_without_reasoning() {
        let raw = "Here you go: {\"requires_verification\": true} hope that helps";
        let c = parse_classification(raw).unwrap();
        assert!(c.requires_verification);
        assert!(c.reasoning.is_empty());
    }

    #[test]
    fn parse_rejects_missing_verdict() {
        assert!(parse_classification(r#"{"reasoning": "dunno"}"#).is_err());
        assert!(parse_classification("yes").is_err());
    }

    #[tokio::test]
    async fn llm_classifier_sends_query() {
        let llm = Arc::new(ScriptedLlm::replying(
            r#"{"reasoning": "order status", "requires_verification": true}"#,
        ));
        let classifier = LlmQueryClassifier::new(llm.clone());
        let c = classifier
            .classify("What's the status of my last order?")
            .await
            .unwrap();
        assert!(c.requires_verification);
        assert_eq!(llm.calls(), 1);

        let request = llm.last_request().unwrap();
        assert_eq!(
            request.messages[1].content,
            "Query: What's the status of my last order?"
        );
    }

    #[tokio::test]
    async fn llm_classifier_malformed_reply() {
        let classifier = LlmQueryClassifier::new(Arc::new(ScriptedLlm::replying("maybe?")));
        let err = classifier.classify("hello").await.unwrap_err();
        assert!(matches!(err, OracleError::Malformed { .. }));
    }

    #[tokio::test]
    async fn llm_classifier_provider_failure() {
        let classifier = LlmQueryClassifier::new(Arc::new(ScriptedLlm::failing()));
        let err = classifier.classify("hello").await.unwrap_err();
        assert_eq!(err.oracle(), OracleKind::Classifier);
        assert!(matches!(err, OracleError::Call { .. }));
    }

    #[tokio::test]
    async fn keyword_rules() {
        let classifier = KeywordClassifier::default_rules().unwrap();
        for query in [
            "What's the status of my last order?",
            "Where is my package?",
            "I ordered a monitor last week",
            "Can you check ORD-2024-0002?",
            "Please cancel my order",
        ] {
            assert!(
                classifier.classify(query).await.unwrap().requires_verification,
                "{query}"
            );
        }
        for query in [
            "What's your return policy?",
            "Do you sell USB-C hubs?",
            "How do I reset my keyboard's Bluetooth pairing?",
        ] {
            assert!(
                !classifier.classify(query).await.unwrap().requires_verification,
                "{query}"
            );
        }
    }
}
