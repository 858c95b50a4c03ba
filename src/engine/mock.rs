//! No-op test engine: records calls and returns a zero-byte placeholder.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::engine::{estimate_duration_secs, SynthesisRequest, SynthesizedAudio};
use crate::error::NarratorError;

#[derive(Default)]
pub struct MockEngine {
    calls: AtomicUsize,
    fail_with: Mutex<Option<String>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with the given message.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_with: Mutex::new(Some(message.into())),
        }
    }

    /// How many synthesize calls have been made.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
    ) -> Result<SynthesizedAudio, NarratorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.fail_with.lock().expect("mock mutex poisoned").clone() {
            return Err(NarratorError::Engine(message));
        }
        Ok(SynthesizedAudio {
            bytes: Vec::new(),
            duration_seconds: estimate_duration_secs(&request.text, request.speed),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn counts_calls_and_returns_placeholder() {
        let engine = MockEngine::new();
        let req = SynthesisRequest {
            text: "hello there".into(),
            voice: "en-US".into(),
            speed: 1.0,
            language: "en".into(),
        };
        let audio = engine.synthesize(&req).await.unwrap();
        assert!(audio.bytes.is_empty());
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn failing_mock_surfaces_engine_error() {
        let engine = MockEngine::failing("engine down");
        let req = SynthesisRequest {
            text: "hello there".into(),
            voice: "en-US".into(),
            speed: 1.0,
            language: "en".into(),
        };
        let err = engine.synthesize(&req).await.unwrap_err();
        assert!(matches!(err, NarratorError::Engine(_)));
        assert_eq!(engine.call_count(), 1);
    }
}
