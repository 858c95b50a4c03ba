//! Narration engine adapter: the abstraction boundary around the actual
//! text-to-speech backend.
//!
//! Engines form a closed set dispatched through one `synthesize` surface;
//! adding an engine means adding a variant here, not registering a string
//! key somewhere.

pub mod http;
pub mod mock;

use serde::{Deserialize, Serialize};

use crate::error::NarratorError;
pub use http::HttpEngine;
pub use mock::MockEngine;

/// Input to one synthesis call: final narration text plus voice parameters.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice: String,
    pub speed: f64,
    pub language: String,
}

/// A synthesized audio artifact, before it is written to storage.
#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Http,
    Mock,
}

pub enum NarrationEngine {
    Http(HttpEngine),
    Mock(MockEngine),
}

impl NarrationEngine {
    pub fn kind(&self) -> EngineKind {
        match self {
            NarrationEngine::Http(_) => EngineKind::Http,
            NarrationEngine::Mock(_) => EngineKind::Mock,
        }
    }

    pub fn name(&self) -> &'static str {
        match self.kind() {
            EngineKind::Http => "http",
            EngineKind::Mock => "mock",
        }
    }

    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, NarratorError> {
        match self {
            NarrationEngine::Http(engine) => engine.synthesize(request).await,
            NarrationEngine::Mock(engine) => engine.synthesize(request).await,
        }
    }
}

/// Duration estimate shared by engines that cannot measure real audio:
/// 5 chars per word, 150 words per minute, scaled by speed.
pub(crate) fn estimate_duration_secs(text: &str, speed: f64) -> f64 {
    let words = text.chars().count() as f64 / 5.0;
    let minutes = words / 150.0;
    if speed > 0.0 {
        minutes * 60.0 / speed
    } else {
        minutes * 60.0
    }
}
