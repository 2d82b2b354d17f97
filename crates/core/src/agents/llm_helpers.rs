//! # LLM Helpers
//!
//! One structured call per node, dispatched on the configured provider.

/// Run a radkit `LlmFunction` producing `$output_type` against the provider
/// named in a [`ModelConfig`](crate::models::ModelConfig).
///
/// Evaluates to `anyhow::Result<$output_type>`. Client construction uses `?`,
/// so the caller must itself return `anyhow::Result`.
#[macro_export]
macro_rules! run_llm_function {
    ($config:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {{
        use anyhow::Context as _;
        use radkit::models::providers::{
            AnthropicLlm, DeepSeekLlm, GeminiLlm, GrokLlm, OpenAILlm, OpenRouterLlm,
        };
        use $crate::models::LlmProvider;

        let config: &$crate::models::ModelConfig = $config;
        let input: String = $input;
        let model = config.model.as_str();
        let result: anyhow::Result<$output_type> = match config.provider {
            LlmProvider::Anthropic => {
                $crate::__structured_call!(AnthropicLlm::from_env(model)?, $output_type, $system_prompt, input)
            }
            LlmProvider::OpenAI => {
                let llm = OpenAILlm::from_env(model)?;
                let llm = match &config.base_url {
                    Some(url) => llm.with_base_url(url),
                    None => llm,
                };
                $crate::__structured_call!(llm, $output_type, $system_prompt, input)
            }
            LlmProvider::Gemini => {
                $crate::__structured_call!(GeminiLlm::from_env(model)?, $output_type, $system_prompt, input)
            }
            LlmProvider::OpenRouter => {
                $crate::__structured_call!(OpenRouterLlm::from_env(model)?, $output_type, $system_prompt, input)
            }
            LlmProvider::Grok => {
                $crate::__structured_call!(GrokLlm::from_env(model)?, $output_type, $system_prompt, input)
            }
            LlmProvider::DeepSeek => {
                $crate::__structured_call!(DeepSeekLlm::from_env(model)?, $output_type, $system_prompt, input)
            }
        };
        result.with_context(|| format!("{:?} model '{}'", config.provider, config.model))
    }};
}

#[doc(hidden)]
#[macro_export]
macro_rules! __structured_call {
    ($llm:expr, $output_type:ty, $system_prompt:expr, $input:expr) => {
        radkit::agent::LlmFunction::<$output_type>::new_with_system_instructions(
            $llm,
            $system_prompt,
        )
        .run($input)
        .await
        .map_err(anyhow::Error::from)
    };
}

pub use run_llm_function;
