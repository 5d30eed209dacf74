//! Pilot service settings.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::server::{DEFAULT_PORT, PilotServer};
use crate::vlm::{OllamaVision, PilotError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PilotConfig {
    /// Port the `/pilot` endpoint listens on.
    pub port: u16,
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Vision-language model to query.
    pub model: String,
    /// Model request timeout in seconds. `0` waits indefinitely.
    pub model_timeout_secs: u64,
    /// Where to dump the last received frame, if anywhere.
    pub debug_image_path: Option<String>,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            ollama_url: "http://localhost:11434".to_string(),
            model: "smolvlm256m".to_string(),
            model_timeout_secs: 60,
            debug_image_path: None,
        }
    }
}

impl PilotConfig {
    pub fn model_timeout(&self) -> Option<Duration> {
        (self.model_timeout_secs > 0).then(|| Duration::from_secs(self.model_timeout_secs))
    }

    /// Build a server backed by [`OllamaVision`].
    ///
    /// # Errors
    ///
    /// [`PilotError::Http`] if the model client cannot be built.
    pub fn build_server(&self) -> Result<PilotServer, PilotError> {
        let model = OllamaVision::new(&self.ollama_url, &self.model, self.model_timeout())?;
        info!(model = model.model(), ollama_url = %self.ollama_url, "vision model configured");
        let mut server = PilotServer::new(Arc::new(model)).with_port(self.port);
        if let Some(path) = &self.debug_image_path {
            server = server.with_debug_image(path);
        }
        Ok(server)
    }
}
