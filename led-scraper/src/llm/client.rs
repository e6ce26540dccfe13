//! Chat-completion client for the enrichment backend.
//!
//! The backend speaks the common chat-completions shape: bearer auth, a JSON
//! body of `{model, messages, temperature}`, and the generated text at
//! `choices[0].message.content`. The trait exists so the enrichment engine
//! can be driven by a scripted backend in tests.

use std::time::Duration;

use async_trait::async_trait;
use led_core::common::error::{Result, ScraperError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "https://api.cerebras.ai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-oss-120b";

/// Low temperature keeps the structured output deterministic-leaning.
const TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("CEREBRAS_API_KEY")?;
        Ok(Self {
            api_url: std::env::var("LED_LLM_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            model: std::env::var("LED_LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            api_key,
            timeout: Duration::from_secs(90),
        })
    }
}

/// Outcome of one completion attempt. Rate limiting is surfaced as a value
/// rather than an error so the caller owns the backoff policy.
#[derive(Debug, Clone)]
pub enum ChatReply {
    Completed(String),
    RateLimited,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Clone)]
pub struct ReqwestChatBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl ReqwestChatBackend {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(LlmConfig::from_env()?))
    }
}

#[async_trait]
impl ChatBackend for ReqwestChatBackend {
    async fn complete(&self, system: &str, user: &str) -> Result<ChatReply> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
            temperature: TEMPERATURE,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .timeout(self.config.timeout)
            .json(&request)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Ok(ChatReply::RateLimited);
        }

        let body: ChatResponse = response.error_for_status()?.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::Api {
                message: "chat completion response had no choices".to_string(),
            })?
            .message
            .content;

        Ok(ChatReply::Completed(content.trim().to_string()))
    }
}
