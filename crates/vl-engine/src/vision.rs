use std::time::Duration;

use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use vl_contracts::{FocusArea, Settings, VisionError};

use crate::normalize::CanonicalImage;

const ERROR_BODY_CHARS: usize = 512;

/// A multimodal model that can describe an image.
pub trait VisionModel: Send + Sync {
    fn name(&self) -> &str;

    /// Fails fast on missing credentials, before any image is acquired.
    fn check_ready(&self) -> Result<(), VisionError> {
        Ok(())
    }

    /// Returns the model's reply text verbatim.
    fn analyze(&self, image: &CanonicalImage, focus: FocusArea) -> Result<String, VisionError>;
}

/// Per-call overrides; `None` falls back to [`Settings`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

/// OpenAI-compatible `chat/completions` client (Zhipu GLM vision by default).
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    settings: Settings,
    http: HttpClient,
}

impl ChatCompletionsClient {
    pub fn new(settings: Settings) -> Result<Self, VisionError> {
        // Vision replies can take well over reqwest's default 30 s.
        let http = HttpClient::builder()
            .timeout(None::<Duration>)
            .user_agent(crate::fetch::USER_AGENT)
            .build()
            .map_err(|err| {
                VisionError::Configuration(format!("failed to build HTTP client: {err}"))
            })?;
        Ok(Self::with_client(settings, http))
    }

    pub fn with_client(settings: Settings, http: HttpClient) -> Self {
        Self { settings, http }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn send_messages(
        &self,
        messages: Vec<Value>,
        options: CompletionOptions,
    ) -> Result<Value, VisionError> {
        let api_key = self.settings.require_api_key()?;
        let endpoint = self.settings.chat_completions_endpoint();
        let payload = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(self.settings.temperature),
            "max_tokens": options.max_tokens.unwrap_or(self.settings.max_tokens),
        });

        log::debug!("POST {endpoint} model={}", self.settings.model);
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .map_err(|err| VisionError::remote(None, format!("request to {endpoint} failed: {err}")))?;
        let parsed = response_json_or_error(response)?;

        log::info!(
            "completion {} from {} (usage: {})",
            parsed.get("id").and_then(Value::as_str).unwrap_or("-"),
            self.settings.model,
            parsed.get("usage").map(Value::to_string).unwrap_or_else(|| "n/a".to_string())
        );
        Ok(parsed)
    }

    /// Text-only round trip, used to verify credentials and connectivity.
    pub fn send_text(&self, prompt: &str) -> Result<String, VisionError> {
        let messages = vec![json!({ "role": "user", "content": prompt })];
        let response = self.send_messages(messages, CompletionOptions::default())?;
        extract_message_content(&response)
    }
}

impl VisionModel for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.settings.model
    }

    fn check_ready(&self) -> Result<(), VisionError> {
        self.settings.require_api_key().map(|_| ())
    }

    fn analyze(&self, image: &CanonicalImage, focus: FocusArea) -> Result<String, VisionError> {
        let message = build_image_message(image, focus);
        let response = self.send_messages(vec![message], CompletionOptions::default())?;
        extract_message_content(&response)
    }
}

pub fn build_image_message(image: &CanonicalImage, focus: FocusArea) -> Value {
    json!({
        "role": "user",
        "content": [
            { "type": "text", "text": focus.instruction() },
            { "type": "image_url", "image_url": { "url": image.data_url() } },
        ],
    })
}

/// `choices[0].message.content`, either a string or an array of text parts.
pub fn extract_message_content(response: &Value) -> Result<String, VisionError> {
    let content = response
        .pointer("/choices/0/message/content")
        .map(|content| match content {
            Value::String(text) => text.clone(),
            Value::Array(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    Value::String(text) => Some(text.as_str()),
                    other => other.get("text").and_then(Value::as_str),
                })
                .collect::<Vec<_>>()
                .join(""),
            _ => String::new(),
        })
        .unwrap_or_default();
    if content.trim().is_empty() {
        return Err(VisionError::remote(
            None,
            "the model returned an empty reply",
        ));
    }
    Ok(content)
}

fn response_json_or_error(response: HttpResponse) -> Result<Value, VisionError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| VisionError::remote(Some(code), format!("failed reading response body: {err}")))?;
    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|value| {
                value
                    .pointer("/error/message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| truncate_text(&body, ERROR_BODY_CHARS));
        return Err(VisionError::remote(Some(code), message));
    }
    serde_json::from_str(&body)
        .map_err(|err| VisionError::remote(Some(code), format!("invalid JSON payload: {err}")))
}

fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
