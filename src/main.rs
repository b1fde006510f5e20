use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;

use login_notification_service::attempts::create_attempt_store;
use login_notification_service::config::Settings;
use login_notification_service::metrics::Metrics;
use login_notification_service::postgres::PostgresPool;
use login_notification_service::queue::create_dispatch_queue;
use login_notification_service::redis::RedisPool;
use login_notification_service::resilience::{CircuitBreaker, CircuitBreakerConfig};
use login_notification_service::server::{create_app, create_metrics_app, AppState};
use login_notification_service::shutdown::{self, Shutdown};
use login_notification_service::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::new().context("failed to load configuration")?;

    // Initialize tracing
    let _telemetry = init_telemetry(&settings.telemetry)?;
    tracing::info!("Configuration loaded");

    let metrics = Arc::new(Metrics::for_api()?);

    // Attempt store
    let postgres_pool = if settings.database.backend == "postgres" {
        let breaker = Arc::new(CircuitBreaker::with_config(
            "postgres",
            CircuitBreakerConfig::from(&settings.database),
        ));
        let pool = PostgresPool::connect(&settings.database, breaker)
            .await
            .context("failed to connect to PostgreSQL")?;
        Some(Arc::new(pool))
    } else {
        None
    };
    let store = create_attempt_store(&settings.database, postgres_pool.clone());
    store
        .ensure_schema()
        .await
        .context("failed to prepare attempt store schema")?;

    // Dispatch queue (publish side only)
    let redis_pool = if settings.queue.backend == "redis" {
        let breaker = Arc::new(CircuitBreaker::with_config(
            "redis",
            CircuitBreakerConfig::from(&settings.redis),
        ));
        Some(Arc::new(RedisPool::new(&settings.redis, breaker)?))
    } else {
        None
    };
    let queue = create_dispatch_queue(&settings.queue, redis_pool, "api".to_string());

    let state = AppState::new(settings.clone(), store, queue, metrics.clone())?;
    tracing::info!("Application state initialized");

    let shutdown = Arc::new(Shutdown::new());
    let signals = shutdown.clone();
    tokio::spawn(async move { signals.listen_for_signals().await });

    // Metrics listener
    let metrics_addr = settings.metrics_addr();
    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    tracing::info!("Metrics listening on {}", metrics_addr);
    let metrics_shutdown = shutdown.subscribe();
    let metrics_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, create_metrics_app(metrics))
            .with_graceful_shutdown(shutdown::wait_for(metrics_shutdown))
            .await
        {
            tracing::error!(error = %e, "Metrics server failed");
        }
    });

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown::wait_for(shutdown.subscribe()))
        .await?;

    // The API may have stopped on its own; make sure the metrics listener follows
    shutdown.trigger();
    let _ = metrics_handle.await;

    if let Some(pool) = postgres_pool {
        pool.close().await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
