//! payment-queue server entry point.
//!
//! Starts the HTTP server, the queue processor, and the rate-limiter
//! sweeper, and shuts all of them down on Ctrl-C or SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use payment_queue::api;
use payment_queue::app_state::AppState;
use payment_queue::config::{AppConfig, LogFormat};
use payment_queue::domain::RateLimiter;
use payment_queue::persistence::PaymentStore;
use payment_queue::service::{
    PaymentService, ProcessorConfig, QueueProcessor, SimulatedSettlement,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config =
        AppConfig::from_env().map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting payment-queue");

    // Build persistence layer
    let store = PaymentStore::connect(&config)
        .await
        .context("failed to open payment store")?;
    tracing::info!(backend = store.backend_name(), "payment store ready");

    let shutdown = CancellationToken::new();

    // Queue processor
    let processor_task = config.queue_enabled.then(|| {
        let processor = QueueProcessor::new(
            store.clone(),
            SimulatedSettlement::new(Duration::from_millis(config.queue_settlement_ms)),
            ProcessorConfig::from(&config),
        );
        tokio::spawn(processor.run(shutdown.clone()))
    });

    // Admission control
    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_requests,
        config.rate_limit_window(),
    ));
    let sweeper_task = tokio::spawn(sweep_idle_clients(
        Arc::clone(&rate_limiter),
        shutdown.clone(),
    ));

    // Build application state
    let app_state = AppState {
        payment_service: Arc::new(PaymentService::new(store)),
        rate_limiter,
        trust_forwarded_for: config.rate_limit_trust_forwarded,
    };
    let app = api::app(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    let server_shutdown = shutdown.clone();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received");
        server_shutdown.cancel();
    })
    .await
    .context("server error")?;

    // The server may also stop on its own; make sure the workers follow.
    shutdown.cancel();
    if let Some(task) = processor_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "queue processor task panicked");
    }
    if let Err(e) = sweeper_task.await {
        tracing::error!(error = %e, "rate limiter sweeper task panicked");
    }

    tracing::info!("payment-queue stopped");
    Ok(())
}

/// Drops idle rate-limit entries once per window.
async fn sweep_idle_clients(limiter: Arc<RateLimiter>, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(limiter.window());
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let purged = limiter.purge_idle(Instant::now());
                if purged > 0 {
                    tracing::debug!(purged, remaining = limiter.tracked_keys(), "purged idle rate-limit entries");
                }
            }
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
