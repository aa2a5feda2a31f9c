use std::time::Duration;

use anyhow::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

/// Raised when the API answers with a non-success status. The body is
/// kept verbatim since it is the only description of what went wrong.
#[derive(Debug, Error)]
#[error("OpenAI error: {status} {body}")]
pub struct CompletionError {
    pub status: u16,
    pub body: String,
}

/// Sampling and transport settings sent along with every request.
#[derive(Clone, Debug)]
pub struct CompletionOptions {
    pub model: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
    pub timeout: Duration,
}

impl CompletionOptions {
    pub fn new(model: &str) -> Self {
        Self {
            model: model.to_string(),
            max_tokens: None,
            temperature: None,
            timeout: Duration::from_secs(60 * 10),
        }
    }
}

pub fn completion_payload(messages: &[Message], options: &CompletionOptions) -> Value {
    let mut payload = json!({
        "model": options.model,
        "messages": messages,
    });
    if let Some(max_tokens) = options.max_tokens {
        payload["max_tokens"] = json!(max_tokens);
    }
    if let Some(temperature) = options.temperature {
        payload["temperature"] = json!(temperature);
    }
    payload
}

pub async fn completion(
    messages: &[Message],
    options: &CompletionOptions,
    api_hostname: &str,
    api_key: &str,
) -> Result<Value, Error> {
    let payload = completion_payload(messages, options);
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(options.timeout)
        .json(&payload)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CompletionError {
            status: status.as_u16(),
            body,
        }
        .into());
    }

    Ok(response.json().await?)
}

/// Text of the first completion choice, if the response has one.
pub fn first_choice_content(resp: &Value) -> Option<&str> {
    resp["choices"][0]["message"]["content"].as_str()
}
