use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::admission::{self, FilterConfig};
use crate::config::Settings;
use crate::error::NarratorError;
use crate::generate::{process_queue, AudioGenerator, BatchStats, GenerateOptions};
use crate::post::Post;
use crate::queue::{AudioQueue, QueueItem, QueueStats};
use crate::source::{PostSource, SortMode};
use crate::storage::{AudioArtifact, StorageStats};

#[derive(Clone)]
pub struct AppState {
    pub source: Arc<dyn PostSource>,
    pub queue: Arc<Mutex<AudioQueue>>,
    pub generator: Arc<AudioGenerator>,
    pub settings: Arc<Settings>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/posts", get(list_posts))
        .route("/generate", post(generate_audio))
        .route("/queue/add", post(queue_add))
        .route("/queue/process", post(queue_process))
        .route("/queue/stats", get(queue_stats))
        .route("/queue/retry-failed", post(queue_retry_failed))
        .route("/queue/clear-completed", post(queue_clear_completed))
        .route("/queue/clear", post(queue_clear))
        .route("/queue/{id}", get(queue_item))
        .route("/storage/stats", get(storage_stats))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Axum-facing wrapper so handlers can use `?` on core errors.
pub struct ApiError(NarratorError);

impl From<NarratorError> for ApiError {
    fn from(err: NarratorError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            NarratorError::Validation(_) => StatusCode::BAD_REQUEST,
            NarratorError::NotFound(_) => StatusCode::NOT_FOUND,
            NarratorError::ContentFiltered { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            NarratorError::Engine(_) => StatusCode::BAD_GATEWAY,
            NarratorError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = serde_json::json!({
            "error": self.0.code(),
            "message": self.0.to_string(),
        });
        (status, Json(body)).into_response()
    }
}

#[derive(serde::Deserialize)]
struct PostsQuery {
    channel: String,
    #[serde(default)]
    sort: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
    #[serde(default)]
    min_score: Option<i64>,
    #[serde(default)]
    min_char_count: Option<usize>,
    #[serde(default)]
    max_char_count: Option<usize>,
    #[serde(default)]
    exclude_adult: bool,
    #[serde(default)]
    exclude_deleted_removed: bool,
    #[serde(default)]
    exclude_image_only: bool,
    #[serde(default)]
    exclude_link_only: bool,
}

#[derive(serde::Serialize)]
struct PostsResp {
    posts: Vec<Post>,
    metadata: PostsMetadata,
}

#[derive(serde::Serialize)]
struct PostsMetadata {
    total_fetched: usize,
    total_passed_filters: usize,
    filters_applied: bool,
    filter_reasons: std::collections::BTreeMap<crate::admission::ExclusionReason, usize>,
}

async fn list_posts(
    State(state): State<AppState>,
    Query(q): Query<PostsQuery>,
) -> Result<Json<PostsResp>, ApiError> {
    let config = FilterConfig {
        min_score: q.min_score,
        min_char_count: q.min_char_count,
        max_char_count: q.max_char_count,
        exclude_adult: q.exclude_adult,
        exclude_deleted_removed: q.exclude_deleted_removed,
        exclude_image_only: q.exclude_image_only,
        exclude_link_only: q.exclude_link_only,
        ..FilterConfig::default()
    }
    .validated()?;

    let sort = SortMode::parse_lenient(q.sort.as_deref().unwrap_or("hot"));
    let limit = q.limit.unwrap_or(state.settings.default_post_limit);
    let fetched = state.source.fetch_posts(&q.channel, sort, limit).await?;

    let outcome = admission::admit(fetched, &config);
    Ok(Json(PostsResp {
        metadata: PostsMetadata {
            total_fetched: outcome.total_fetched,
            total_passed_filters: outcome.accepted.len(),
            filters_applied: outcome.filters_applied,
            filter_reasons: outcome.reasons,
        },
        posts: outcome.accepted,
    }))
}

#[derive(serde::Deserialize)]
struct GenerateReq {
    post_id: String,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    force_regenerate: bool,
}

impl GenerateReq {
    fn options(&self, settings: &Settings) -> GenerateOptions {
        GenerateOptions {
            voice: self.voice.clone().unwrap_or_else(|| settings.default_voice.clone()),
            speed: self.speed.unwrap_or(settings.speed),
            language: self.language.clone().unwrap_or_else(|| settings.language.clone()),
            force_regenerate: self.force_regenerate,
        }
    }
}

async fn generate_audio(
    State(state): State<AppState>,
    Json(req): Json<GenerateReq>,
) -> Result<Json<AudioArtifact>, ApiError> {
    let post = state
        .source
        .fetch_single_post(&req.post_id)
        .await?
        .ok_or_else(|| NarratorError::NotFound(req.post_id.clone()))?;
    let options = req.options(&state.settings);
    let artifact = state.generator.generate(&post, &options).await?;
    Ok(Json(artifact))
}

#[derive(serde::Deserialize)]
struct QueueAddReq {
    post_id: String,
    #[serde(default)]
    priority: Option<i64>,
}

#[derive(serde::Serialize)]
struct QueueAddResp {
    queue_id: String,
    priority: u8,
}

async fn queue_add(
    State(state): State<AppState>,
    Json(req): Json<QueueAddReq>,
) -> Result<Json<QueueAddResp>, ApiError> {
    let post = state
        .source
        .fetch_single_post(&req.post_id)
        .await?
        .ok_or_else(|| NarratorError::NotFound(req.post_id.clone()))?;

    let priority = req
        .priority
        .unwrap_or_else(|| AudioQueue::priority_for_score(post.score));
    let mut queue = state.queue.lock().expect("queue mutex poisoned");
    let queue_id = queue.enqueue(post, priority)?;
    let priority = queue.get(&queue_id).map(|i| i.priority).unwrap_or(1);
    Ok(Json(QueueAddResp { queue_id, priority }))
}

#[derive(serde::Deserialize, Default)]
struct QueueProcessReq {
    #[serde(default)]
    max_items: Option<usize>,
    #[serde(default)]
    voice: Option<String>,
    #[serde(default)]
    speed: Option<f64>,
    #[serde(default)]
    language: Option<String>,
}

async fn queue_process(
    State(state): State<AppState>,
    body: Option<Json<QueueProcessReq>>,
) -> Result<Json<BatchStats>, ApiError> {
    let req = body.map(|Json(r)| r).unwrap_or_default();
    let options = GenerateOptions {
        voice: req.voice.unwrap_or_else(|| state.settings.default_voice.clone()),
        speed: req.speed.unwrap_or(state.settings.speed),
        language: req.language.unwrap_or_else(|| state.settings.language.clone()),
        force_regenerate: false,
    };
    let max_items = req.max_items.unwrap_or(state.settings.batch_size);
    let stats = process_queue(&state.queue, &state.generator, max_items, &options).await?;
    Ok(Json(stats))
}

async fn queue_stats(State(state): State<AppState>) -> Json<QueueStats> {
    Json(state.queue.lock().expect("queue mutex poisoned").stats())
}

async fn queue_item(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<QueueItem>, ApiError> {
    let queue = state.queue.lock().expect("queue mutex poisoned");
    queue
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError(NarratorError::NotFound(id)))
}

#[derive(serde::Serialize)]
struct RetryResp {
    reset: Vec<String>,
}

async fn queue_retry_failed(State(state): State<AppState>) -> Result<Json<RetryResp>, ApiError> {
    let reset = state
        .queue
        .lock()
        .expect("queue mutex poisoned")
        .retry_failed()?;
    Ok(Json(RetryResp { reset }))
}

#[derive(serde::Serialize)]
struct ClearResp {
    removed: usize,
}

async fn queue_clear_completed(State(state): State<AppState>) -> Result<Json<ClearResp>, ApiError> {
    let removed = state
        .queue
        .lock()
        .expect("queue mutex poisoned")
        .clear_completed()?;
    Ok(Json(ClearResp { removed }))
}

async fn queue_clear(State(state): State<AppState>) -> Result<Json<ClearResp>, ApiError> {
    let removed = state
        .queue
        .lock()
        .expect("queue mutex poisoned")
        .clear_all()?;
    Ok(Json(ClearResp { removed }))
}

async fn storage_stats(State(state): State<AppState>) -> Json<StorageStats> {
    Json(state.generator.storage().stats())
}
