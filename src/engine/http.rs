//! Network-backed narration engine: posts the final text to a TTS service
//! endpoint and expects audio bytes back.

use reqwest::Client;
use std::time::Duration;

use crate::engine::{estimate_duration_secs, SynthesisRequest, SynthesizedAudio};
use crate::error::NarratorError;

pub struct HttpEngine {
    client: Client,
    endpoint: String,
}

impl HttpEngine {
    /// The client-level timeout is a floor guard; the orchestrator wraps
    /// calls in its own deadline as well.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, NarratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NarratorError::Engine(format!("building http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, NarratorError> {
        if request.text.trim().is_empty() {
            return Err(NarratorError::Engine("empty narration text".into()));
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| NarratorError::Engine(format!("tts request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NarratorError::Engine(format!(
                "tts endpoint returned {status}"
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NarratorError::Engine(format!("reading tts response: {e}")))?
            .to_vec();
        if bytes.is_empty() {
            return Err(NarratorError::Engine("tts endpoint returned no audio".into()));
        }

        tracing::debug!(
            chars = request.text.chars().count(),
            bytes = bytes.len(),
            "synthesis complete"
        );

        Ok(SynthesizedAudio {
            duration_seconds: estimate_duration_secs(&request.text, request.speed),
            bytes,
        })
    }
}
