use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use sgpi_pipeline::extract::RedirectPatternExtractor;
use sgpi_pipeline::ledger::{DocumentLedger, PgLedger};
use sgpi_pipeline::queue::UploadQueue;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sgpi_api::background;
use sgpi_api::config::{PipelineConfig, ServerConfig, StorageConfig};
use sgpi_api::router::build_app_router;
use sgpi_api::state::AppState;
use sgpi_api::storage::build_storage;

const DEFAULT_LOG_FILTER: &str = "sgpi_api=debug,sgpi_pipeline=debug,sgpi_cloud=info,tower_http=debug";

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Connect, verify and migrate. Any failure aborts startup.
async fn prepare_database() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = sgpi_db::create_pool(&url)
        .await
        .expect("Failed to connect to database");
    sgpi_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    sgpi_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database ready (pool created, health checked, migrations applied)");
    pool
}

/// Handles of the periodic jobs, awaited after the server stops.
struct ScheduledJobs {
    staging_cleanup: JoinHandle<()>,
    semester_rotation: JoinHandle<()>,
}

fn spawn_scheduled_jobs(
    state: &AppState,
    pipeline: &PipelineConfig,
    cancel: &CancellationToken,
) -> ScheduledJobs {
    ScheduledJobs {
        staging_cleanup: tokio::spawn(background::staging_cleanup::run(
            state.pool.clone(),
            pipeline.staging_dir.clone(),
            pipeline.staging_max_age(),
            Duration::from_secs(pipeline.staging_sweep_interval_secs),
            cancel.clone(),
        )),
        semester_rotation: tokio::spawn(background::semester_rotation::run(
            state.pool.clone(),
            state.resolver.clone(),
            Duration::from_secs(pipeline.semester_check_interval_secs),
            cancel.clone(),
        )),
    }
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ServerConfig::from_env();
    let storage_config = StorageConfig::from_env();
    let pipeline = PipelineConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = config.port,
        staging_dir = %pipeline.staging_dir.display(),
        "Configuration loaded"
    );

    let pool = prepare_database().await;
    let storage = build_storage(&storage_config)
        .await
        .expect("Failed to initialise remote storage");

    // The worker's first drain pass also requeues uploads interrupted by a
    // previous crash.
    let cancel = CancellationToken::new();
    let ledger: Arc<dyn DocumentLedger> = Arc::new(PgLedger::new(pool.clone()));
    let (uploads, upload_worker) = UploadQueue::new(
        Arc::clone(&ledger),
        Arc::clone(&storage),
        Arc::new(RedirectPatternExtractor),
    )
    .spawn(pipeline.stale_upload_after(), cancel.clone());

    let state = AppState::new(
        pool,
        config.clone(),
        pipeline.clone(),
        storage,
        storage_config.academic_root.clone(),
        ledger,
        uploads,
    );
    let jobs = spawn_scheduled_jobs(&state, &pipeline, &cancel);

    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");
    tracing::info!(%addr, "Listening");

    axum::serve(listener, build_app_router(state, &config))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Server stopped accepting connections, stopping background services");
    cancel.cancel();

    // The worker finishes the document in flight before returning.
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, upload_worker).await.is_err() {
        tracing::warn!("Upload worker did not stop in time; the in-flight upload is requeued once it goes stale");
    }
    for (name, handle) in [
        ("staging cleanup", jobs.staging_cleanup),
        ("semester rotation", jobs.semester_rotation),
    ] {
        if tokio::time::timeout(Duration::from_secs(5), handle).await.is_err() {
            tracing::warn!(job = name, "Scheduled job did not stop in time");
        }
    }

    tracing::info!("Shutdown complete");
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let interrupt = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let signal = tokio::select! {
        () = interrupt => "SIGINT",
        () = terminate => "SIGTERM",
    };
    tracing::info!(signal, "Shutdown requested");
}
