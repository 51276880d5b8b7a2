pub mod gemini;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;

use crate::models::conversation::ConversationTurn;
use self::gemini::GeminiClient;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

/// Everything one `generateContent` call carries, independent of the wire format.
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub contents: Vec<ConversationTurn>,
    pub system_instruction: Option<String>,
    /// When set the model is asked for `application/json` following this schema.
    pub response_schema: Option<JsonValue>,
}

/// Raw failure from the model service, before it is classified for the caller.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("API key is not configured")]
    MissingCredential,
    #[error("upstream returned {status} {code}: {message}")]
    Http {
        status: u16,
        code: String,
        message: String,
    },
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("could not decode upstream response: {0}")]
    Decode(String),
    #[error("upstream response contained no text")]
    EmptyResponse,
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Returns the text of the first candidate.
    async fn generate(&self, request: GenerateRequest) -> Result<String, UpstreamError>;

    fn model_name(&self) -> String;
}

pub fn new_client(config: &LlmConfig) -> Arc<dyn GenerativeModel> {
    Arc::new(GeminiClient::from_config(config))
}
