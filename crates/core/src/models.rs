//! # Models
//!
//! LLM provider selection for the worker nodes. Each node can run against a
//! different provider/model; everything not overridden falls back to the
//! global setting.

use serde::{Deserialize, Serialize};

/// Supported LLM providers
///
/// - Anthropic (Claude) - `ANTHROPIC_API_KEY`
/// - OpenAI (GPT) - `OPENAI_API_KEY`
/// - Gemini (Google) - `GEMINI_API_KEY`
/// - OpenRouter (Gateway) - `OPENROUTER_API_KEY`
/// - Grok (xAI) - `XAI_API_KEY`
/// - DeepSeek - `DEEPSEEK_API_KEY`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Anthropic,
    #[default]
    #[serde(rename = "openai")]
    OpenAI,
    Gemini,
    OpenRouter,
    Grok,
    DeepSeek,
}

impl LlmProvider {
    /// Parse a provider id as used in config files and env vars
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAI),
            "gemini" => Some(Self::Gemini),
            "openrouter" => Some(Self::OpenRouter),
            "grok" => Some(Self::Grok),
            "deepseek" => Some(Self::DeepSeek),
            _ => None,
        }
    }

    /// Model used when nothing more specific is configured
    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => "claude-sonnet-4-20250514",
            Self::OpenAI => "gpt-4o-mini",
            Self::Gemini => "gemini-2.0-flash-exp",
            Self::OpenRouter => "openai/gpt-4o-mini",
            Self::Grok => "grok-2",
            Self::DeepSeek => "deepseek-chat",
        }
    }

    /// Whether this provider supports custom base URL
    pub fn supports_base_url(&self) -> bool {
        matches!(self, LlmProvider::OpenAI)
    }
}

/// Which provider and model a node talks to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    pub model: String,
    /// Optional base URL override for OpenAI-compatible APIs
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::for_provider(LlmProvider::default())
    }
}

impl ModelConfig {
    /// Config for a provider using its default model
    pub fn for_provider(provider: LlmProvider) -> Self {
        Self {
            model: provider.default_model().to_string(),
            provider,
            base_url: None,
        }
    }

    pub fn with_provider(provider: LlmProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
        }
    }

    /// Set base URL (ignored by providers that do not support it)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        if self.provider.supports_base_url() {
            self.base_url = Some(url.into());
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_openai_mini() {
        let config = ModelConfig::default();
        assert_eq!(config.provider, LlmProvider::OpenAI);
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn test_base_url_only_for_openai() {
        let openai = ModelConfig::for_provider(LlmProvider::OpenAI).with_base_url("http://x");
        assert_eq!(openai.base_url.as_deref(), Some("http://x"));

        let claude = ModelConfig::for_provider(LlmProvider::Anthropic).with_base_url("http://x");
        assert!(claude.base_url.is_none());
    }

    #[test]
    fn test_provider_parse_roundtrip() {
        for p in ["anthropic", "OpenAI", "gemini", "openrouter", "grok", "deepseek"] {
            assert!(LlmProvider::parse(p).is_some(), "{p} should parse");
        }
        assert!(LlmProvider::parse("mistral").is_none());
        let json = serde_json::to_string(&LlmProvider::OpenAI).unwrap();
        assert_eq!(json, "\"openai\"");
    }
}
