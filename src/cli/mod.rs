use clap::Parser;

pub const DEFAULT_MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_SESSION_TTL_SECS: u64 = 60 * 60;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    // --- Model Provider Args ---
    /// API key for the Gemini API. Left empty, every analysis fails with a configuration error.
    #[arg(long, env = "API_KEY", default_value = "", hide_env_values = true)]
    pub api_key: String,

    /// Model identifier (e.g., gemini-2.5-flash)
    #[arg(long, env = "GEMINI_MODEL")] // No default, rely on adapter defaults if None
    pub model: Option<String>,

    /// Base URL of the Gemini API (e.g., https://generativelanguage.googleapis.com/v1beta)
    #[arg(long, env = "GEMINI_BASE_URL")]
    pub base_url: Option<String>,

    // --- General App Args ---
    /// Optional JSON file overriding the built-in prompts and user-facing messages.
    #[arg(long, env = "PROMPTS_PATH")]
    pub prompts_path: Option<String>,

    /// Largest accepted upload, in decoded bytes.
    #[arg(long, env = "MAX_IMAGE_BYTES", default_value_t = DEFAULT_MAX_IMAGE_BYTES)]
    pub max_image_bytes: usize,

    /// Seconds a session may sit untouched before it is evicted with its image and chat.
    #[arg(long, env = "SESSION_TTL_SECS", default_value_t = DEFAULT_SESSION_TTL_SECS)]
    pub session_ttl_secs: u64,

    /// Host address and port for the HTTP server to listen on.
    #[arg(long, env = "SERVER_ADDR", default_value = "127.0.0.1:4000")]
    pub server_addr: String,

    /// Enable debug logging/output
    #[arg(long, env = "DEBUG", default_value = "false")]
    pub debug: bool,
}

impl Args {
    pub fn masked_api_key(&self) -> String {
        if self.api_key.is_empty() {
            return "<not set>".to_string();
        }
        let tail: String = self.api_key
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        format!("****{}", tail)
    }
}
