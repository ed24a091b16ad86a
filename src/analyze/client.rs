//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::error::AnalyzeError;
use super::prompt::{DEFAULT_MAX_CONTENT_CHARS, build_prompt, truncate_chars};
use super::schema::{StructuredRecord, validate_response};
use super::StructuredAnalyzer;
use crate::extract::RawContent;
use crate::http::{LLM_TIMEOUT, build_client};
use crate::source::SourceDescriptor;
use crate::user_agent::default_api_user_agent;

/// Environment variables consulted for the API key, in priority order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["CONCALL_LLM_API_KEY", "GROQ_API_KEY"];

/// Longest error-body excerpt kept in a transport error.
const BODY_EXCERPT_CHARS: usize = 200;

/// Configuration for the LLM endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Characters of source text sent to the model.
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
    /// Bearer token. Never written back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

fn default_endpoint() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_model() -> String {
    "deepseek-r1-distill-llama-70b".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_content_chars() -> usize {
    DEFAULT_MAX_CONTENT_CHARS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            temperature: default_temperature(),
            max_content_chars: default_max_content_chars(),
            api_key: None,
        }
    }
}

impl LlmConfig {
    /// Fills a missing API key from the environment.
    #[must_use]
    pub fn with_env_api_key(mut self) -> Self {
        if self.api_key.is_none() {
            self.api_key = API_KEY_ENV_VARS
                .iter()
                .find_map(|var| std::env::var(var).ok())
                .filter(|key| !key.trim().is_empty());
        }
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Analyzer backed by one chat-completions call per attempt.
#[derive(Debug, Clone)]
pub struct LlmAnalyzer {
    client: Client,
    config: LlmConfig,
}

impl LlmAnalyzer {
    /// Creates an analyzer with the 30 s LLM timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest builder error if the HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(LLM_TIMEOUT, &default_api_user_agent(), None)?,
            config,
        })
    }

    async fn complete(&self, prompt: &str) -> Result<String, AnalyzeError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut request = self.client.post(self.config.completions_url()).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AnalyzeError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let excerpt = truncate_chars(text.trim(), BODY_EXCERPT_CHARS);
            return Err(AnalyzeError::http_status(status.as_u16(), excerpt));
        }

        let envelope: ChatResponse = response
            .json()
            .await
            .map_err(|e| AnalyzeError::from_reqwest(&e))?;

        envelope
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AnalyzeError::transport("response envelope has no message content"))
    }
}

#[async_trait]
impl StructuredAnalyzer for LlmAnalyzer {
    #[instrument(skip(self, content), fields(identity = %source.identity(), chars = content.length))]
    async fn try_analyze(
        &self,
        source: &SourceDescriptor,
        content: &RawContent,
    ) -> Result<StructuredRecord, AnalyzeError> {
        let truncated = truncate_chars(&content.text, self.config.max_content_chars);
        if truncated.len() < content.text.len() {
            debug!(
                limit = self.config.max_content_chars,
                "content truncated for analysis"
            );
        }

        let reply = self.complete(&build_prompt(truncated)).await?;
        let analysis = validate_response(&reply).map_err(AnalyzeError::schema)?;
        if !analysis.dropped_events.is_empty() {
            debug!(dropped = ?analysis.dropped_events, "unknown event tags dropped");
        }

        let record = StructuredRecord::from_analysis(source, analysis);
        info!(
            outlook = %record.outlook,
            events = record.events.len(),
            "analysis complete"
        );
        Ok(record)
    }
}
