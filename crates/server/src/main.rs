use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pdfpipe_core::{
    load_config, validate_config, Config, EngineBackend, FsArtifactStore, HttpEngine,
    HttpFetcher, JobQueue, LocalEngine, OrchestrationEngine, PdfTextExtractor, SqliteJobQueue,
    StageRunner, SubmissionGateway, UuidIdGenerator, WorkerPool,
};

use pdfpipe_server::api::create_router;
use pdfpipe_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PDFPIPE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "pdfpipe {} starting (config {})",
        VERSION,
        &config_hash[..16]
    );
    info!("Database path: {:?}", config.database.path);
    info!("Output directory: {:?}", config.pipeline.output_dir);

    // Create the durable job queue
    let queue: Arc<dyn JobQueue> = Arc::new(
        SqliteJobQueue::new(&config.database.path, config.queue.clone())
            .context("Failed to open job queue")?,
    );
    info!("Job queue initialized");

    let engine = create_engine(&config)?;
    info!("Using orchestration engine: {}", engine.name());

    let gateway = SubmissionGateway::new(Arc::clone(&queue), Arc::new(UuidIdGenerator));

    // Start workers unless disabled
    let pool = if config.worker.enabled {
        let pool = Arc::new(WorkerPool::new(
            config.worker.clone(),
            Arc::clone(&queue),
            engine,
        ));
        pool.start().await;
        Some(pool)
    } else {
        info!("Workers disabled in config, jobs will be queued but not run");
        None
    };

    let state = Arc::new(AppState::new(
        config.clone(),
        gateway,
        Arc::clone(&queue),
        pool.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    if let Some(ref pool) = pool {
        info!("Stopping worker pool...");
        pool.stop().await;
    }
    queue.close();
    info!("Job queue closed");

    Ok(())
}

/// Build the engine selected by `engine.backend`.
fn create_engine(config: &Config) -> Result<Arc<dyn OrchestrationEngine>> {
    match config.engine.backend {
        EngineBackend::Local => {
            let fetcher = HttpFetcher::new(config.pipeline.download_timeout_secs)
                .context("Failed to create HTTP fetcher")?;
            let runner = StageRunner::new(
                Arc::new(fetcher),
                Arc::new(PdfTextExtractor::new()),
                Arc::new(FsArtifactStore::new(config.pipeline.output_dir.clone())),
            );
            info!(
                "Initializing local engine (max {} concurrent runs)",
                config.engine.local.max_concurrent_runs
            );
            Ok(Arc::new(LocalEngine::new(&config.engine.local, runner)))
        }
        EngineBackend::Http => {
            info!(
                "Initializing HTTP engine at {} (dag {})",
                config.engine.http.base_url, config.engine.http.dag_id
            );
            let engine = HttpEngine::new(config.engine.http.clone())
                .context("Failed to create HTTP engine client")?;
            Ok(Arc::new(engine))
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
