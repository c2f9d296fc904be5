//! Worker process entry point.
//!
//! Loads settings, wires the store, queue, generator and service together,
//! re-enqueues jobs that were in flight when the previous process died,
//! then runs the worker loop until SIGINT/SIGTERM.

use std::process::ExitCode;
use std::sync::Arc;

use styleforge_core::config::Settings;
use styleforge_core::storage::Storage;
use styleforge_core::styles::StyleRegistry;
use styleforge_generator::build_generator;
use styleforge_pipeline::{JobService, LocalQueue, Worker};
use styleforge_store::JobStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "styleforge_worker=debug,styleforge_pipeline=debug,\
                     styleforge_store=debug,styleforge_generator=debug"
                        .into()
                }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = settings.ensure_directories() {
        tracing::error!(error = %e, "Failed to create storage directories");
        return ExitCode::FAILURE;
    }
    tracing::info!(
        upload_dir = %settings.upload_dir.display(),
        output_dir = %settings.output_dir.display(),
        metadata_dir = %settings.metadata_dir.display(),
        "Loaded worker configuration",
    );

    // --- Generator strategy (resolved once, process-wide) ---
    let generator = match build_generator(&settings) {
        Ok(generator) => generator,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build generator");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(generator = generator.name(), "Generator selected");

    // --- Store and queue ---
    let store = match JobStore::open(&settings.metadata_dir) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::error!(error = %e, "Failed to open job store");
            return ExitCode::FAILURE;
        }
    };
    let queue = Arc::new(LocalQueue::new());
    let storage = Storage::new(&settings);
    let styles = Arc::new(StyleRegistry::with_defaults());
    let service = Arc::new(JobService::new(
        store,
        queue.clone(),
        storage,
        styles,
    ));

    // --- Startup recovery ---
    // Jobs that never reached a terminal state were in flight (or still
    // queued) when the previous process died; put them back on the queue.
    match service.recoverable_ids().await {
        Ok(ids) => {
            if !ids.is_empty() {
                tracing::info!(count = ids.len(), "Re-enqueueing unfinished jobs");
            }
            for job_id in ids {
                if let Err(e) = service.enqueue(job_id).await {
                    tracing::error!(job_id = %job_id, error = %e, "Failed to re-enqueue job");
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "Startup recovery scan failed");
        }
    }

    // --- Worker loop ---
    let worker = Worker::new(service, queue, generator, settings.job_timeout);
    let cancel = tokio_util::sync::CancellationToken::new();

    let shutdown = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel();
        })
    };

    worker.run(cancel).await;

    shutdown.abort();
    tracing::info!("Graceful shutdown complete");
    ExitCode::SUCCESS
}

/// Wait for SIGINT (Ctrl-C) or SIGTERM (on Unix) so the worker stops
/// cleanly whether interrupted interactively or by a process manager.
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
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
