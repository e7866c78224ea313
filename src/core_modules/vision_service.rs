// THEORY:
// The vision service is the single outbound dependency of the monitor: a hosted
// multimodal model that looks at the newest thermal image and answers in free
// text. This module owns the request/response contract and nothing else.
//
// Key architectural principles:
// 1.  **Trait Seam**: The cycle driver and scene analyzer only ever see the
//     `VisionService` trait, so tests can script replies and the binary can plug
//     in the HTTP client.
// 2.  **One Call, No Retries**: `complete` makes exactly one request. Failures
//     surface as `AnalysisServiceError` and the caller decides what a failed cycle
//     means. There is no backoff state.
// 3.  **Contract, Not Transport**: The request is a chat completion carrying the
//     fixed instruction prompt and a base64 JPEG data URL. Timeouts are whatever
//     the HTTP client defaults to.

use crate::config::AnalysisConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// The fixed instruction sent with every image. The reply is expected to contain
/// this object inside a ```json fence; the last key's first array slot is ignored.
pub const ANALYSIS_PROMPT: &str = r#"
 Do the following analysis for the image and return the following JSON:
 {
    "presence of figures that look like a homo sapien or their body parts in the series of the images": <bool>,
    "description of what you see (arms, legs, face, torso, etc.)": <str>,
    "description of the overall temperature range and if there is any chance of a fire": <str>,
    "summary of above key points in array format within square brackets": [...]
  }
"#;

#[derive(Error, Debug)]
pub enum AnalysisServiceError {
    #[error("failed to load artifact {path} for analysis")]
    Artifact {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("environment variable {0} holding the analysis API key is not set")]
    MissingApiKey(String),

    #[error("request to the analysis service failed")]
    Transport(#[from] reqwest::Error),

    #[error("analysis service responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("analysis service reply carried no message content")]
    EmptyReply,
}

/// Everything the service needs for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionRequest {
    pub prompt: String,
    /// Base64 (standard alphabet) JPEG bytes.
    pub image_base64: String,
}

impl VisionRequest {
    pub fn data_url(&self) -> String {
        format!("data:image/jpeg;base64,{}", self.image_base64)
    }
}

#[async_trait]
pub trait VisionService: Send + Sync {
    /// Sends one request and returns the raw reply text.
    async fn complete(&self, request: &VisionRequest) -> Result<String, AnalysisServiceError>;
}

// --- Wire Types ---

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

fn chat_request<'a>(model: &'a str, max_tokens: u32, request: &'a VisionRequest) -> ChatRequest<'a> {
    ChatRequest {
        model,
        max_tokens,
        messages: vec![ChatMessage {
            role: "user",
            content: vec![
                ContentPart::Text {
                    text: &request.prompt,
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: request.data_url(),
                    },
                },
            ],
        }],
    }
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiVisionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl OpenAiVisionClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, max_tokens: u32, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            max_tokens,
            api_key: api_key.into(),
        }
    }

    /// Builds a client from config, reading the key from `api_key_env`.
    pub fn from_config(config: &AnalysisConfig) -> Result<Self, AnalysisServiceError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .ok_or_else(|| AnalysisServiceError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.max_tokens,
            api_key,
        ))
    }
}

#[async_trait]
impl VisionService for OpenAiVisionClient {
    async fn complete(&self, request: &VisionRequest) -> Result<String, AnalysisServiceError> {
        let body = chat_request(&self.model, self.max_tokens, request);
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AnalysisServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(AnalysisServiceError::EmptyReply)
    }
}
