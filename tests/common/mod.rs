#![allow(dead_code)]

use async_trait::async_trait;
use declutter_agent::llm::{ GenerateRequest, GenerativeModel, UpstreamError };
use std::collections::VecDeque;
use std::sync::{ Arc, Mutex };
use tokio::sync::Notify;

pub const KITCHEN_JSON: &str = r#"```json
{
  "roomType": "Кухня (Kitchen)",
  "clutterLevel": 85,
  "summary": "**Столешницы** заставлены посудой.",
  "spaceUtilization": [
    {"name": "Хранение (Storage)", "value": 50},
    {"name": "Рабочая зона", "value": 30},
    {"name": "Свободно", "value": 20}
  ],
  "actionItems": [
    {"id": "1", "title": "Выбросить старые банки", "description": "Note: пустые банки под раковиной", "difficulty": "Easy", "category": "Discard"},
    {"id": "2", "title": "Купить органайзер", "description": "Для специй", "difficulty": "Medium", "category": "Buy"},
    {"id": "3", "title": "Убрать сломанный тостер", "description": "Сдать в переработку. Wait, it might be fine", "difficulty": "Easy", "category": "Discard"}
  ],
  "aestheticSuggestions": ["Добавить **растения** на подоконник"]
}
```"#;

/// Answers from a queue and records every request it receives.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, UpstreamError>>>,
    pub requests: Mutex<Vec<GenerateRequest>>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, UpstreamError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    /// Every request signals `started` and then waits for `release` before answering.
    pub fn gated(
        replies: Vec<Result<String, UpstreamError>>,
        started: Arc<Notify>,
        release: Arc<Notify>
    ) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
            gate: Some((started, release)),
        })
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> GenerateRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String, UpstreamError> {
        self.requests.lock().unwrap().push(request);
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(UpstreamError::EmptyResponse))
    }

    fn model_name(&self) -> String {
        "scripted".to_string()
    }
}
