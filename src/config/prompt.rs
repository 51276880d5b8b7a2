use serde::Deserialize;
use std::fs;
use std::sync::Arc;
use log::info;
use thiserror::Error;

use crate::error::ErrorKind;

const DEFAULT_ANALYSIS_PROMPT: &str = "\
You are a professional home organizer. Analyze the attached photo of a room.
Answer in {language}. Return ONLY a JSON object, without markdown code fences and without any text around it, with exactly this shape:
{
  \"roomType\": short room label,
  \"clutterLevel\": integer from 0 (perfectly tidy) to 100 (extremely cluttered),
  \"summary\": one or two sentences about the room's current state,
  \"spaceUtilization\": [{\"name\": category of use such as storage, furniture, free floor, clutter, \"value\": integer share}],
  \"actionItems\": [{\"id\": unique string, \"title\": short task, \"description\": one sentence, \"difficulty\": \"Easy\" | \"Medium\" | \"Hard\", \"category\": \"Discard\" | \"Organize\" | \"Buy\"}],
  \"aestheticSuggestions\": [short styling tips]
}
The spaceUtilization values together describe the whole room. \"difficulty\" and \"category\" must use exactly the English values listed. All other text must be in {language} only, with no translations in parentheses.";

const DEFAULT_CHAT_INSTRUCTION: &str = "\
You are Declutter, a friendly home organization assistant. The user has shared a photo of their room earlier in this conversation.
Answer briefly and practically, in {language} only. Do not use markdown formatting.";

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("Prompt file IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Prompt JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Localized banners shown when an analysis fails.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ErrorMessages {
    pub config: String,
    pub region_unsupported: String,
    pub rate_limit: String,
    pub parse: String,
    pub generic: String,
}

impl Default for ErrorMessages {
    fn default() -> Self {
        Self {
            config: "Ключ API не настроен или недействителен. Проверьте конфигурацию сервиса.".into(),
            region_unsupported: "Сервис анализа недоступен в вашем регионе.".into(),
            rate_limit: "Слишком много запросов. Подождите немного и попробуйте снова.".into(),
            parse: "Не удалось разобрать ответ модели. Попробуйте другое фото.".into(),
            generic: "Не удалось проанализировать фото. Попробуйте ещё раз.".into(),
        }
    }
}

/// Every fixed text sent to the model or shown to the user. Any subset can be overridden
/// from a JSON file; missing keys keep their defaults.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct PromptConfig {
    pub language: String,
    pub analysis_prompt: String,
    pub chat_instruction: String,
    pub seed_caption: String,
    pub seed_acknowledgment: String,
    pub chat_fallback: String,
    pub chat_apology: String,
    pub errors: ErrorMessages,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            language: "Russian".into(),
            analysis_prompt: DEFAULT_ANALYSIS_PROMPT.into(),
            chat_instruction: DEFAULT_CHAT_INSTRUCTION.into(),
            seed_caption: "Вот фотография моей комнаты. Помоги мне навести в ней порядок.".into(),
            seed_acknowledgment: "Я вижу вашу комнату. Спрашивайте, что угодно об организации пространства!".into(),
            chat_fallback: "Извините, сейчас я не могу ответить. Попробуйте спросить ещё раз чуть позже.".into(),
            chat_apology: "Извините, произошла ошибка связи. Сообщение не отправлено, попробуйте ещё раз.".into(),
            errors: ErrorMessages::default(),
        }
    }
}

impl PromptConfig {
    pub fn analysis_prompt(&self) -> String {
        self.analysis_prompt.replace("{language}", &self.language)
    }

    pub fn chat_instruction(&self) -> String {
        self.chat_instruction.replace("{language}", &self.language)
    }

    pub fn error_message(&self, kind: ErrorKind) -> &str {
        match kind {
            ErrorKind::Config => &self.errors.config,
            ErrorKind::RegionUnsupported => &self.errors.region_unsupported,
            ErrorKind::RateLimit => &self.errors.rate_limit,
            ErrorKind::Parse => &self.errors.parse,
            ErrorKind::Generic => &self.errors.generic,
        }
    }
}

pub fn parse_prompts(json: &str) -> Result<PromptConfig, PromptError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_prompts(path: Option<&str>) -> Result<Arc<PromptConfig>, PromptError> {
    match path {
        Some(path) => {
            let file_content = fs::read_to_string(path)?;
            let config = parse_prompts(&file_content)?;
            info!("Loaded prompts from '{}' (language: {})", path, config.language);
            Ok(Arc::new(config))
        }
        None => {
            info!("Using built-in prompts");
            Ok(Arc::new(PromptConfig::default()))
        }
    }
}
