// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod admission;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod generate;
pub mod metrics;
pub mod post;
pub mod queue;
pub mod source;
pub mod storage;
pub mod textproc;

// ---- Re-exports for stable public API ----
pub use crate::admission::{admit, ExclusionReason, FilterConfig};
pub use crate::api::{create_router, AppState};
pub use crate::config::Settings;
pub use crate::engine::{MockEngine, NarrationEngine};
pub use crate::error::NarratorError;
pub use crate::generate::{AudioGenerator, GenerateOptions};
pub use crate::post::Post;
pub use crate::queue::{AudioQueue, QueueStatus};
pub use crate::storage::AudioStorage;
pub use crate::textproc::safety::SafetyPolicy;
