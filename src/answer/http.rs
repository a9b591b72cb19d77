//! HTTP client for the answer-generation model.

use crate::answer::{AnswerGenerator, GenerationError};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Chat-completions client used to turn retrieved context into an answer.
pub struct HttpAnswerClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

impl HttpAnswerClient {
    /// Construct a new client for the given chat endpoint and model.
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .user_agent("docstash/0.2")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    /// Construct a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, GenerationError> {
        Self::new(
            &config.answer_url,
            config.answer_api_key.clone(),
            config.answer_model.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }
}

#[async_trait]
impl AnswerGenerator for HttpAnswerClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(api_key) = self.api_key.as_deref().filter(|key| !key.is_empty()) {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = GenerationError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Answer generation failed");
            return Err(error);
        }

        let payload: ChatResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or(GenerationError::MalformedResponse)
    }
}
