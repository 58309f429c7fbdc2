//! LLM integration.
//!
//! Every LLM-backed component (classifier, extractor, supervisor, evaluator)
//! talks to an `Arc<dyn LlmProvider>`. The only concrete backend is the
//! Anthropic Messages API; tests substitute scripted providers.

mod anthropic;
#[cfg(test)]
pub(crate) mod mock;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use provider::*;

use std::sync::Arc;

use crate::config::SupportConfig;
use crate::error::LlmError;

/// Create the configured provider, or `None` when no API key is set.
pub fn create_provider(config: &SupportConfig) -> Result<Option<Arc<dyn LlmProvider>>, LlmError> {
    let Some(api_key) = config.api_key.clone() else {
        return Ok(None);
    };
    let provider = AnthropicProvider::new(api_key, &config.model)?;
    tracing::info!("Using Anthropic (model: {})", config.model);
    Ok(Some(Arc::new(provider)))
}

/// Extract a JSON object from LLM output (handles markdown wrapping).
pub(crate) fn extract_json_object(text: &str) -> String {
    let trimmed = text.trim();

    if trimmed.starts_with('{') {
        return trimmed.to_string();
    }

    if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        if let Some(end) = after.find("```") {
            return after[..end].trim().to_string();
        }
    }

    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        if let Some(end) = after.find("```") {
            let inner = after[..end].trim();
            if inner.starts_with('{') {
                return inner.to_string();
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}'))
        && end > start
    {
        return trimmed[start..=end].to_string();
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_api_key_means_offline() {
        let config = SupportConfig::default();
        assert!(create_provider(&config).unwrap().is_none());
    }

    #[test]
    fn api_key_builds_anthropic() {
        let config = SupportConfig {
            api_key: Some(secrecy::SecretString::from("sk-ant-test")),
            model: "claude-haiku-4-5".into(),
            ..Default::default()
        };
        let provider = create_provider(&config).unwrap().unwrap();
        assert_eq!(provider.model_name(), "claude-haiku-4-5");
    }

    #[test]
    fn extract_json_direct_object() {
        let input = r#"{"email": "a@b.com"}"#;
        assert_eq!(extract_json_object(input), input);
    }

    #[test]
    fn extract_json_from_markdown_block() {
        let input = "```json\n{\"requires_verification\": true}\n```";
        let result = extract_json_object(input);
        assert!(result.starts_with('{'));
        assert!(result.contains("requires_verification"));
    }

    #[test]
    fn extract_json_embedded_in_text() {
        let input = "Sure: {\"email\": \"\"} hope that helps.";
        let result = extract_json_object(input);
        assert_eq!(result, "{\"email\": \"\"}");
    }
}
