use std::sync::Arc;

use anyhow::Context;
use atelier_db::SqliteStore;
use atelier_events::{EventBus, EventLogger};
use atelier_imagegen::credential::API_KEY_ENV;
use atelier_imagegen::{ApiKeyCredential, ClientConfig, GeminiClient};
use atelier_pipeline::{Studio, StudioParts};
use atelier_worker::config::WorkerConfig;
use atelier_worker::{export, ingest};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_worker=debug,atelier_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkerConfig::from_env()?;
    tracing::info!(
        input = %config.input_dir.display(),
        output = %config.output_dir.display(),
        model = %config.model,
        capacity = config.queue.capacity,
        "Worker starting",
    );

    // --- Persistence ---
    let pool = atelier_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    atelier_db::health_check(&pool).await?;
    atelier_db::run_migrations(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Database ready");

    // --- Studio ---
    let events = Arc::new(EventBus::default());
    tokio::spawn(EventLogger::run(events.subscribe()));

    let credential = Arc::new(ApiKeyCredential::from_env(API_KEY_ENV));
    let client = GeminiClient::new(
        ClientConfig {
            api_url: config.api_url.clone(),
            model: config.model.clone(),
        },
        credential.clone(),
    );
    let studio = Studio::open(StudioParts {
        persistence: Arc::new(SqliteStore::new(pool.clone())),
        generator: Arc::new(client),
        credentials: credential,
        events,
        queue: config.queue,
    })
    .await?;

    let cancel = CancellationToken::new();
    let controller = studio.spawn(cancel.clone());

    if let Some(name) = &config.preset {
        studio
            .apply_preset_named(name)
            .await
            .with_context(|| format!("Cannot apply preset '{name}'"))?;
    }

    // --- Batch ---
    let files = ingest::scan_dir(&config.input_dir)
        .await
        .with_context(|| format!("Cannot read {}", config.input_dir.display()))?;
    tracing::info!(count = files.len(), "Files accepted");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let mut remaining = files.into_iter().peekable();
    while remaining.peek().is_some() {
        let batch: Vec<_> = remaining.by_ref().take(config.queue.capacity).collect();
        studio.submit_files(batch).await?;

        if let Err(e) = studio.start().await {
            tracing::error!(error = %e, "Cannot start queue");
            break;
        }
        tokio::select! {
            () = studio.wait_until_idle() => {}
            () = &mut shutdown => {
                studio.pause();
                studio.wait_until_idle().await;
                break;
            }
        }

        // Jobs left queued after an idle pause mean the queue was stopped
        // for a credential problem.
        let stats = studio.stats().await;
        if stats.queued > 0 {
            tracing::warn!(queued = stats.queued, "Queue stopped with work remaining");
            break;
        }
    }

    cancel.cancel();
    controller.await?;

    // --- Export ---
    let jobs = studio.jobs().await;
    let written = export::write_results(&config.output_dir, &jobs)
        .await
        .with_context(|| format!("Cannot write to {}", config.output_dir.display()))?;

    let stats = studio.stats().await;
    tracing::info!(
        written = written.len(),
        completed = stats.completed,
        failed = stats.failed,
        queued = stats.queued,
        "Worker finished",
    );

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), stopping after the current job");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, stopping after the current job");
        }
    }
}
