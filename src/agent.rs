use async_trait::async_trait;
use log::{ info, warn };
use serde_json::{ json, Value as JsonValue };
use std::error::Error;
use std::sync::Arc;

use crate::cli::Args;
use crate::config::prompt::{ self, PromptConfig };
use crate::error::{ classify, AnalysisError, ExchangeError };
use crate::history::ChatResponder;
use crate::llm::{ new_client, GenerateRequest, GenerativeModel, LlmConfig };
use crate::models::analysis::RoomAnalysis;
use crate::models::conversation::{ ConversationTurn, Part };
use crate::text::extract_json;

/// Structured-output schema mirroring the shape requested in the analysis prompt.
fn analysis_schema() -> JsonValue {
    json!({
        "type": "OBJECT",
        "properties": {
            "roomType": { "type": "STRING" },
            "clutterLevel": { "type": "INTEGER" },
            "summary": { "type": "STRING" },
            "spaceUtilization": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "value": { "type": "INTEGER" }
                    },
                    "required": ["name", "value"]
                }
            },
            "actionItems": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "id": { "type": "STRING" },
                        "title": { "type": "STRING" },
                        "description": { "type": "STRING" },
                        "difficulty": { "type": "STRING", "enum": ["Easy", "Medium", "Hard"] },
                        "category": { "type": "STRING", "enum": ["Discard", "Organize", "Buy"] }
                    },
                    "required": ["id", "title", "description", "difficulty", "category"]
                }
            },
            "aestheticSuggestions": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": [
            "roomType",
            "clutterLevel",
            "summary",
            "spaceUtilization",
            "actionItems",
            "aestheticSuggestions"
        ]
    })
}

#[derive(Clone)]
pub struct DeclutterAgent {
    model: Arc<dyn GenerativeModel>,
    prompt_config: Arc<PromptConfig>,
}

impl DeclutterAgent {
    pub fn new(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let llm_config = LlmConfig {
            api_key: Some(args.api_key.clone()).filter(|k| !k.is_empty()),
            model: args.model.clone(),
            base_url: args.base_url.clone(),
        };
        let model = new_client(&llm_config);
        info!(
            "Model client configured: Model={}, BaseURL={}",
            model.model_name(),
            llm_config.base_url.as_deref().unwrap_or("adapter default")
        );
        let prompt_config = prompt::load_prompts(args.prompts_path.as_deref())?;
        Ok(Self::with_model(model, prompt_config))
    }

    pub fn with_model(model: Arc<dyn GenerativeModel>, prompt_config: Arc<PromptConfig>) -> Self {
        Self { model, prompt_config }
    }

    pub fn prompts(&self) -> &Arc<PromptConfig> {
        &self.prompt_config
    }

    /// Sends one image with the instruction prompt and returns the sanitized analysis.
    /// Nothing is retried and no partial result is ever returned.
    pub async fn analyze_room(&self, image_base64: &str) -> Result<RoomAnalysis, AnalysisError> {
        let request = GenerateRequest {
            contents: vec![
                ConversationTurn::user(vec![
                    Part::jpeg(image_base64),
                    Part::text(self.prompt_config.analysis_prompt())
                ])
            ],
            system_instruction: None,
            response_schema: Some(analysis_schema()),
        };

        let raw = self.model.generate(request).await.map_err(classify)?;
        let json = extract_json(&raw);
        let analysis = RoomAnalysis::from_json(&json).map_err(|e| {
            warn!("Analysis response did not parse: {} (raw length {})", e, raw.len());
            AnalysisError::from(e)
        })?;
        let analysis = analysis.sanitized();
        info!(
            "Analysis complete: room='{}' clutter={} items={}",
            analysis.room_type,
            analysis.clutter_level,
            analysis.action_items.len()
        );
        Ok(analysis)
    }

    /// Replays `history` plus one new user turn and returns the reply. Failures never
    /// reach the caller; they come back as the configured fallback text. `history` is
    /// not modified.
    pub async fn send_chat_message(
        &self,
        history: &[ConversationTurn],
        text: &str,
        image_base64: Option<&str>
    ) -> String {
        let mut parts = Vec::with_capacity(2);
        if let Some(image) = image_base64 {
            parts.push(Part::jpeg(image));
        }
        parts.push(Part::text(text));

        let mut contents = history.to_vec();
        contents.push(ConversationTurn::user(parts));

        let request = GenerateRequest {
            contents,
            system_instruction: Some(self.prompt_config.chat_instruction()),
            response_schema: None,
        };

        match self.model.generate(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat request failed, replying with fallback: {}", e);
                self.prompt_config.chat_fallback.clone()
            }
        }
    }
}

#[async_trait]
impl ChatResponder for DeclutterAgent {
    async fn reply(
        &self,
        history: &[ConversationTurn],
        text: &str
    ) -> Result<String, ExchangeError> {
        Ok(self.send_chat_message(history, text, None).await)
    }
}
