use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use thiserror::Error;

use shopkeep_core::config::{LlmConfig, LlmProvider};

use crate::gemini::{GeminiClient, GeminiClientConfig};
use crate::openai::{OpenAiCompatibleClient, OpenAiCompatibleConfig};

pub(crate) const MAX_PROMPT_LOG_CHARS: usize = 4_000;
pub(crate) const MAX_LLM_OUTPUT_LOG_CHARS: usize = 2_000;

/// Output format the caller expects back from the model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single JSON object; providers that support it are put in JSON mode.
    Json,
    FreeText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LlmRequest {
    pub system: String,
    pub user: String,
    pub shape: ResponseShape,
}

/// One request, one completion. No retries at this layer.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: LlmRequest) -> Result<String, LlmError>;
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(String),
    #[error("response error: {0}")]
    Response(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("llm client configuration error: {0}")]
    Configuration(String),
}

impl LlmError {
    // reqwest errors embed the request URL, and Gemini carries the key in the query.
    pub(crate) fn http(error: reqwest::Error) -> Self {
        Self::Http(error.without_url().to_string())
    }
}

/// Builds the provider client selected by `[llm]` config.
pub fn client_from_config(config: &LlmConfig) -> Result<Arc<dyn LlmClient>, LlmError> {
    let api_key = config.api_key.as_ref().map(|key| key.expose_secret().to_string());

    match config.provider {
        LlmProvider::Gemini => {
            let api_key = api_key.ok_or_else(|| {
                LlmError::Configuration("gemini provider requires llm.api_key".to_string())
            })?;
            let mut gemini = GeminiClientConfig {
                api_key,
                model: config.model.clone(),
                temperature: config.temperature,
                timeout_secs: config.timeout_secs,
                ..GeminiClientConfig::default()
            };
            if let Some(base_url) = &config.base_url {
                gemini.endpoint = base_url.trim_end_matches('/').to_string();
            }
            Ok(Arc::new(GeminiClient::new(gemini)?))
        }
        LlmProvider::OpenAi | LlmProvider::Ollama => {
            let endpoint = chat_completions_url(config.provider, config.base_url.as_deref())?;
            let client = OpenAiCompatibleClient::new(OpenAiCompatibleConfig {
                endpoint,
                api_key,
                model: config.model.clone(),
                temperature: config.temperature,
                timeout_secs: config.timeout_secs,
                // Ollama's OpenAI-compatible endpoint ignores `response_format` on older builds.
                json_mode: config.provider == LlmProvider::OpenAi,
            })?;
            Ok(Arc::new(client))
        }
    }
}

fn chat_completions_url(provider: LlmProvider, base_url: Option<&str>) -> Result<String, LlmError> {
    let base = match (provider, base_url) {
        (_, Some(base)) => base.trim_end_matches('/').to_string(),
        (LlmProvider::OpenAi, None) => "https://api.openai.com/v1".to_string(),
        (_, None) => {
            return Err(LlmError::Configuration(
                "ollama provider requires llm.base_url".to_string(),
            ))
        }
    };

    if base.ends_with("/chat/completions") {
        return Ok(base);
    }
    if provider == LlmProvider::Ollama && !base.ends_with("/v1") {
        return Ok(format!("{base}/v1/chat/completions"));
    }
    Ok(format!("{base}/chat/completions"))
}

pub(crate) fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [truncated, total_chars={char_count}]"));
    preview
}
