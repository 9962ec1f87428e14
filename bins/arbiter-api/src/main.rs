mod handlers;
mod metrics;
mod routes;
mod store;


use anyhow::{Context, Result};
use arbiter_common::config::Config;
use arbiter_judge::Judge;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use store::{RedisRunStore, RunStore};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RunStore>,
    pub judge: Judge,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Arbiter API booting...");

    let config = Config::from_env().context("Invalid configuration")?;

    let client = redis::Client::open(config.redis_url.as_str())
        .context("Failed to create Redis client")?;
    let redis_conn = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    info!(redis_url = %config.redis_url, "Connected to Redis");

    let judge = Judge::from_config(&config).context("Failed to build engine client")?;
    info!(
        engine_url = %config.engine_url,
        poll_interval_ms = config.poll.interval.as_millis() as u64,
        deadline_ms = config.poll.deadline.as_millis() as u64,
        "Execution engine configured"
    );

    let state = Arc::new(AppState {
        store: Arc::new(RedisRunStore::new(redis_conn, config.result_ttl_seconds)),
        judge,
    });

    let app = routes::app(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    info!(addr = %config.bind_addr, "HTTP server listening");

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
