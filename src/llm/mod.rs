pub mod models;
pub mod providers;

use crate::config::LlmConfig;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use self::models::StructuredRequest;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM connection error: {0}")]
    ConnectionError(String),
    #[error("LLM response error: {0}")]
    ResponseError(String),
    #[error("LLM configuration error: {0}")]
    ConfigError(String),
}

/// Black-box structured generation: given instructions and an output schema,
/// return a JSON value conforming to it or fail.
#[async_trait]
pub trait StructuredGenerator: Send + Sync {
    async fn generate(&self, request: &StructuredRequest) -> Result<Value, LlmError>;

    fn backend(&self) -> &str;
}

pub struct LlmManager {
    generator: Box<dyn StructuredGenerator>,
}

impl LlmManager {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let generator: Box<dyn StructuredGenerator> = match config.backend.as_str() {
            "remote" => Box::new(providers::remote::RemoteLlmProvider::new(config)?),
            "ollama" => Box::new(providers::ollama::OllamaProvider::new(config)?),
            _ => {
                return Err(LlmError::ConfigError(format!(
                    "Unsupported LLM backend: {}",
                    config.backend
                )))
            }
        };

        Ok(Self { generator })
    }

    pub fn with_generator(generator: Box<dyn StructuredGenerator>) -> Self {
        Self { generator }
    }

    pub fn backend(&self) -> &str {
        self.generator.backend()
    }

    pub async fn generate(&self, request: &StructuredRequest) -> Result<Value, LlmError> {
        debug!("Structured generation request: {:?}", request.summary());
        self.generator.generate(request).await
    }

    /// Generates and deserializes into `T`.
    pub async fn generate_object<T: DeserializeOwned>(
        &self,
        request: &StructuredRequest,
    ) -> Result<T, LlmError> {
        let value = self.generate(request).await?;
        serde_json::from_value(value).map_err(|e| {
            LlmError::ResponseError(format!(
                "Response does not match schema {}: {}",
                request.schema.name, e
            ))
        })
    }
}
