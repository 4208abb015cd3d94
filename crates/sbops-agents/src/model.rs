use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sbops_models::{ModelConfig, ModelRequest, ModelResponse};
use secrecy::SecretString;
use tracing::debug;

use crate::error::AgentError;
use crate::gemini::GeminiModel;
use crate::openai::OpenAiModel;

/// A language model endpoint. Mockable for testing.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model name sent to the provider (without the provider prefix).
    fn name(&self) -> &str;

    async fn request(&self, request: &ModelRequest) -> Result<ModelResponse, AgentError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    /// Gemini through the Generative Language API.
    GoogleGla,
    /// Any endpoint speaking the OpenAI chat-completions format.
    OpenAi,
}

/// A parsed `provider:name` model identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    pub provider: Provider,
    pub name: String,
}

impl ModelId {
    /// Parse `google-gla:gemini-2.0-flash`, `openai:llama3.1`, or a bare
    /// model name (treated as Gemini).
    pub fn parse(id: &str) -> Result<Self, AgentError> {
        let id = id.trim();
        let (provider, name) = match id.split_once(':') {
            Some((provider, name)) => (provider, name),
            None => ("google-gla", id),
        };

        let provider = match provider {
            "google-gla" | "gemini" => Provider::GoogleGla,
            "openai" => Provider::OpenAi,
            other => return Err(AgentError::UnknownProvider(other.to_string())),
        };

        if name.is_empty() {
            return Err(AgentError::Model(format!("empty model name in '{id}'")));
        }

        Ok(Self {
            provider,
            name: name.to_string(),
        })
    }
}

/// Build a model client from an identifier and the shared endpoint config.
pub fn build_model(id: &str, config: &ModelConfig) -> Result<Arc<dyn ModelClient>, AgentError> {
    let model_id = ModelId::parse(id)?;
    let timeout = Duration::from_secs(config.timeout_seconds);
    let api_key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.is_empty())
        .map(SecretString::new);

    debug!(provider = ?model_id.provider, model = %model_id.name, "Building model client");

    match model_id.provider {
        Provider::GoogleGla => {
            let api_key =
                api_key.ok_or_else(|| AgentError::MissingApiKey(config.api_key_env.clone()))?;
            let mut model = GeminiModel::new(api_key, model_id.name, timeout)?;
            if let Some(base_url) = &config.base_url {
                model = model.with_base_url(base_url.clone());
            }
            Ok(Arc::new(model))
        }
        Provider::OpenAi => {
            let mut model = OpenAiModel::new(api_key, model_id.name, timeout)?;
            if let Some(base_url) = &config.base_url {
                model = model.with_base_url(base_url.clone());
            }
            Ok(Arc::new(model))
        }
    }
}
