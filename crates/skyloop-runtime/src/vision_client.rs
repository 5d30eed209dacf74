//! [`VisionClient`] – HTTP transport to the external decision service.
//!
//! One request per perception cycle:
//!
//! ```text
//! POST <endpoint>
//! Content-Type: application/json
//!
//! {"image": "<base64 JPEG>"}
//! ```
//!
//! The answer may be a JSON string literal (`"HOVER"`), a JSON object with a
//! `command` field (`{"command": "LAND"}`) or bare text. [`decode_command`]
//! reduces all three to a clean keyword string.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use skyloop_runtime::vision_client::{DecisionService, VisionClient};
//!
//! # async fn demo() -> Result<(), skyloop_runtime::PerceptionError> {
//! let client = VisionClient::new("http://127.0.0.1:5000/pilot", Some(Duration::from_secs(30)))?;
//! // Requires a running decision service.
//! let _command = client.decide("/9j/4AAQ...".to_string()).await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use skyloop_types::FlightCommand;
use tracing::debug;

use crate::perception_loop::PerceptionError;

/// Anything that can turn an encoded frame into a command string.
#[async_trait]
pub trait DecisionService: Send + Sync {
    /// Ask for a decision on `image_b64` (base64 JPEG) and return the
    /// cleaned command text.
    async fn decide(&self, image_b64: String) -> Result<String, PerceptionError>;
}

/// Request body sent to the decision service.
#[derive(Debug, Serialize)]
pub struct PilotRequest<'a> {
    pub image: &'a str,
}

/// `reqwest`-backed [`DecisionService`].
#[derive(Debug, Clone)]
pub struct VisionClient {
    endpoint: String,
    client: reqwest::Client,
}

impl VisionClient {
    /// Client posting to `endpoint` (e.g. `"http://127.0.0.1:5000/pilot"`).
    ///
    /// `timeout` bounds each whole request; `None` waits as long as the
    /// service takes.
    ///
    /// # Errors
    ///
    /// Returns [`PerceptionError::Http`] if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PerceptionError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            endpoint: endpoint.into(),
            client: builder.build()?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DecisionService for VisionClient {
    async fn decide(&self, image_b64: String) -> Result<String, PerceptionError> {
        let body = self
            .client
            .post(&self.endpoint)
            .json(&PilotRequest { image: &image_b64 })
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        debug!(body = %body, "decision service replied");
        decode_command(&body)
    }
}

/// Reduce a response body to a command string.
///
/// JSON string literals yield their content, JSON objects their `command`
/// field; anything else has its `"` characters stripped. The result is
/// trimmed.
///
/// # Errors
///
/// [`PerceptionError::UnrecognizedCommand`] when the cleaned text contains no
/// command keyword.
pub fn decode_command(body: &str) -> Result<String, PerceptionError> {
    let raw = match serde_json::from_str::<Value>(body) {
        Ok(Value::String(text)) => text,
        Ok(Value::Object(map)) => match map.get("command").and_then(Value::as_str) {
            Some(command) => command.to_string(),
            None => body.to_string(),
        },
        _ => body.to_string(),
    };
    let command = raw.replace('"', "").trim().to_string();
    if FlightCommand::parse(&command).is_none() {
        return Err(PerceptionError::UnrecognizedCommand(command));
    }
    Ok(command)
}
