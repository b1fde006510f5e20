use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use login_notification_service::config::Settings;
use login_notification_service::email::create_email_sender;
use login_notification_service::metrics::Metrics;
use login_notification_service::queue::create_dispatch_queue;
use login_notification_service::redis::RedisPool;
use login_notification_service::resilience::{BackoffConfig, CircuitBreaker, CircuitBreakerConfig};
use login_notification_service::server::create_metrics_app;
use login_notification_service::shutdown::{self, Shutdown};
use login_notification_service::telemetry::init_telemetry;
use login_notification_service::worker::EmailWorker;

#[tokio::main]
async fn main() -> Result<()> {
    let mut settings = Settings::new().context("failed to load configuration")?;
    settings.telemetry.service_name = format!("{}-worker", settings.telemetry.service_name);

    let _telemetry = init_telemetry(&settings.telemetry)?;
    tracing::info!("Configuration loaded");

    let metrics = Arc::new(Metrics::for_worker()?);

    let redis_pool = if settings.queue.backend == "redis" {
        let breaker = Arc::new(CircuitBreaker::with_config(
            "redis",
            CircuitBreakerConfig::from(&settings.redis),
        ));
        Some(Arc::new(RedisPool::new(&settings.redis, breaker)?))
    } else {
        tracing::warn!("Memory queue selected, the worker will only see messages it published itself");
        None
    };

    let consumer = settings
        .worker
        .consumer_name
        .clone()
        .unwrap_or_else(|| format!("worker-{}", uuid::Uuid::new_v4()));
    let queue = create_dispatch_queue(&settings.queue, redis_pool, consumer);

    let sender = create_email_sender(&settings.email).context("failed to build email sender")?;

    let worker = EmailWorker::new(queue, sender, metrics.clone(), &settings.worker)
        .with_backoff(BackoffConfig::from(&settings.redis));

    let shutdown = Arc::new(Shutdown::new());
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.listen_for_signals().await });

    // Metrics listener
    let metrics_addr = settings.worker_metrics_addr();
    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    tracing::info!("Worker metrics listening on {}", metrics_addr);
    let metrics_shutdown = shutdown.subscribe();
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, create_metrics_app(metrics))
            .with_graceful_shutdown(shutdown::wait_for(metrics_shutdown))
            .await
        {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    worker.run(shutdown.subscribe()).await;

    shutdown.trigger();
    let _ = metrics_handle.await;

    tracing::info!("Worker shutdown complete");
    Ok(())
}
