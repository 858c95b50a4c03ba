//! Reddit Narrator — Binary Entrypoint
//! Boots the Axum HTTP server, wiring the post source, queue, generator,
//! and metrics exporter behind one router.

use std::sync::{Arc, Mutex};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reddit_narrator::api::{create_router, AppState};
use reddit_narrator::config::Settings;
use reddit_narrator::engine::{EngineKind, HttpEngine, MockEngine, NarrationEngine};
use reddit_narrator::generate::AudioGenerator;
use reddit_narrator::metrics::Metrics;
use reddit_narrator::queue::store::FileStore;
use reddit_narrator::queue::AudioQueue;
use reddit_narrator::source::RedditClient;
use reddit_narrator::storage::AudioStorage;
use reddit_narrator::textproc::safety::SafetyPolicy;

const CONFIG_PATH: &str = "config/narrator.toml";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("reddit_narrator=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let settings = Settings::load(CONFIG_PATH)?;
    tracing::info!(
        engine = ?settings.engine,
        data_dir = %settings.data_dir.display(),
        "starting reddit narrator"
    );

    // Metrics recorder must install before any counter is touched.
    let metrics = Metrics::init(settings.batch_size);

    let engine = match settings.engine {
        EngineKind::Http => {
            let endpoint = settings
                .tts_endpoint
                .clone()
                .expect("validated: http engine has an endpoint");
            NarrationEngine::Http(HttpEngine::new(endpoint, settings.engine_timeout())?)
        }
        EngineKind::Mock => NarrationEngine::Mock(MockEngine::new()),
    };

    let storage = Arc::new(AudioStorage::open(settings.audio_dir())?);
    let queue = AudioQueue::open(Box::new(FileStore::new(settings.queue_path())))?;
    let generator = Arc::new(AudioGenerator::new(
        engine,
        Arc::clone(&storage),
        SafetyPolicy::default(),
        settings.engine_timeout(),
    ));
    let source = Arc::new(RedditClient::new(
        &settings.user_agent,
        settings.engine_timeout(),
    )?);

    let state = AppState {
        source,
        queue: Arc::new(Mutex::new(queue)),
        generator,
        settings: Arc::new(settings.clone()),
    };

    let app = create_router(state).merge(metrics.router());

    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!(addr = %settings.bind_addr(), "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
