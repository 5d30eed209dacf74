//! Vision-language model access.
//!
//! [`OllamaVision`] talks to a local [Ollama](https://ollama.com) server via
//! its native `/api/generate` endpoint. Decoding is pinned to temperature 0
//! and a handful of tokens: the pilot only needs one letter back.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the pilot service and its model backend.
#[derive(Error, Debug)]
pub enum PilotError {
    /// The request to the model server failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The model server answered with an unexpected shape.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A model that can answer a text prompt about an image.
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Ask `prompt` about `image_b64` (base64 JPEG) and return the raw answer.
    async fn ask(&self, prompt: &str, image_b64: &str) -> Result<String, PilotError>;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    images: [&'a str; 1],
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: Option<String>,
}

/// [`VisionModel`] backed by Ollama's `/api/generate`.
pub struct OllamaVision {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OllamaVision {
    /// Client for `model` on the Ollama server at `base_url`
    /// (e.g. `"http://localhost:11434"`).
    ///
    /// # Errors
    ///
    /// [`PilotError::Http`] if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PilotError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            base_url: base_url.into(),
            model: model.into(),
            client: builder.build()?,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl VisionModel for OllamaVision {
    async fn ask(&self, prompt: &str, image_b64: &str) -> Result<String, PilotError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            images: [image_b64],
            stream: false,
            options: GenerateOptions {
                temperature: 0.0,
                num_predict: 5,
            },
        };

        let reply: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        reply
            .response
            .ok_or_else(|| PilotError::BadResponse("missing `response` field".into()))
    }
}
