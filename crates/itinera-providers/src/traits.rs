//! Model client traits

use async_trait::async_trait;

use crate::ProviderError;

pub type ProviderResult<T> = Result<T, ProviderError>;

/// One single-shot text generation call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// JSON schema the reply must follow. `None` asks for plain text.
    pub response_schema: Option<serde_json::Value>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A model that turns a prompt into text.
#[async_trait]
pub trait TextModel: Send + Sync {
    async fn generate(&self, request: &GenerateRequest) -> ProviderResult<String>;

    /// Get the model identifier
    fn model(&self) -> &str;
}
