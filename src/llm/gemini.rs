use async_trait::async_trait;
use log::{ debug, info };
use reqwest::Client;
use serde::{ Deserialize, Serialize };
use serde_json::Value as JsonValue;

use super::{ GenerateRequest, GenerativeModel, LlmConfig, UpstreamError, DEFAULT_BASE_URL, DEFAULT_MODEL };
use crate::models::conversation::{ ConversationTurn, Part };

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: String,
    response_schema: JsonValue,
}

#[derive(Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    candidates: Vec<GoogleCandidate>,
}

#[derive(Deserialize)]
struct GoogleCandidate {
    content: Option<GoogleContent>,
}

#[derive(Deserialize)]
struct GoogleContent {
    #[serde(default)]
    parts: Vec<GooglePart>,
}

#[derive(Deserialize)]
struct GooglePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct GoogleErrorEnvelope {
    error: GoogleError,
}

#[derive(Deserialize)]
struct GoogleError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl From<&Part> for GeminiPart {
    fn from(part: &Part) -> Self {
        match part {
            Part::Text(text) => GeminiPart::Text { text: text.clone() },
            Part::InlineData { mime_type, data } =>
                GeminiPart::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.clone(),
                        data: data.clone(),
                    },
                },
        }
    }
}

impl From<&ConversationTurn> for GeminiContent {
    fn from(turn: &ConversationTurn) -> Self {
        GeminiContent {
            role: Some(turn.role.to_string()),
            parts: turn.parts.iter().map(GeminiPart::from).collect(),
        }
    }
}

fn to_wire(request: &GenerateRequest) -> GeminiRequest {
    GeminiRequest {
        contents: request.contents.iter().map(GeminiContent::from).collect(),
        system_instruction: request.system_instruction.as_ref().map(|text| GeminiContent {
            role: None,
            parts: vec![GeminiPart::Text { text: text.clone() }],
        }),
        generation_config: request.response_schema.as_ref().map(|schema| GenerationConfig {
            response_mime_type: "application/json".to_string(),
            response_schema: schema.clone(),
        }),
    }
}

fn error_from_body(status: u16, body: &str) -> UpstreamError {
    match serde_json::from_str::<GoogleErrorEnvelope>(body) {
        Ok(envelope) =>
            UpstreamError::Http {
                status,
                code: envelope.error.status,
                message: envelope.error.message,
            },
        Err(_) =>
            UpstreamError::Http {
                status,
                code: String::new(),
                message: body.trim().to_string(),
            },
    }
}

fn response_text(body: &str) -> Result<String, UpstreamError> {
    let response: GoogleResponse = serde_json
        ::from_str(body)
        .map_err(|e| UpstreamError::Decode(e.to_string()))?;
    let text: String = response.candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(UpstreamError::EmptyResponse);
    }
    Ok(text)
}

pub struct GeminiClient {
    http: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// A missing key is not an error here; it surfaces on the first request.
    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(config.api_key.clone(), config.model.clone(), config.base_url.clone())
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, UpstreamError> {
        let api_key = self.api_key.as_deref().ok_or(UpstreamError::MissingCredential)?;
        let payload = to_wire(&request);
        info!(
            "GeminiClient::generate() → model={} turns={} json={}",
            self.model,
            payload.contents.len(),
            payload.generation_config.is_some()
        );

        let response = self.http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&payload)
            .send().await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(error_from_body(status.as_u16(), &body));
        }
        debug!("Gemini response (truncated): {}", body.chars().take(500).collect::<String>());
        response_text(&body)
    }

    fn model_name(&self) -> String {
        self.model.clone()
    }
}
