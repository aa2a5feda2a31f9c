use std::env;
use std::str::FromStr;

use crate::session::media::{MediaPersistence, MediaPolicy};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub openai_api_hostname: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub system_message: String,
    pub context_window: usize,
    pub max_tokens: u32,
    pub temperature: f64,
    pub request_timeout_secs: u64,
    pub media: MediaPolicy,
}

/// Read an env var and parse it, falling back to `default` when the
/// var is missing or malformed.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(val) => val.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring malformed value for {}: {}", name, val);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("IMPTECH_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/imptech.db", storage_path.trim_end_matches('/'));
        let openai_api_hostname = env::var("IMPTECH_LLM_HOST")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        // Only used to seed the volatile credential store
        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        let openai_model =
            env::var("IMPTECH_LLM_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());
        let system_message = env::var("IMPTECH_SYSTEM_MESSAGE").unwrap_or_else(|_| {
            "You are a helpful assistant inside Imptech Consolidated chat. Keep replies short and friendly."
                .to_string()
        });
        let persistence = match env::var("IMPTECH_MEDIA_PERSISTENCE") {
            Ok(val) => val.parse().unwrap_or_else(|_| {
                tracing::warn!("Unknown media persistence mode {}, using durable", val);
                MediaPersistence::Durable
            }),
            Err(_) => MediaPersistence::Durable,
        };
        let defaults = MediaPolicy::default();
        let media = MediaPolicy {
            inline_limit: env_or("IMPTECH_MEDIA_INLINE_LIMIT", defaults.inline_limit),
            max_bytes: env_or("IMPTECH_MEDIA_MAX_BYTES", defaults.max_bytes),
            persistence,
        };

        Self {
            storage_path,
            db_path,
            openai_api_hostname,
            openai_api_key,
            openai_model,
            system_message,
            context_window: env_or("IMPTECH_CONTEXT_WINDOW", 8),
            max_tokens: env_or("IMPTECH_MAX_TOKENS", 250),
            temperature: env_or("IMPTECH_TEMPERATURE", 0.7),
            request_timeout_secs: env_or("IMPTECH_LLM_TIMEOUT_SECS", 60 * 10),
            media,
        }
    }
}
