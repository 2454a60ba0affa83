//! catalog-relay: Outbox relay process
//!
//! Drains the catalog outbox into the configured broker on a fixed interval.
//!
//! ## Architecture
//! ```text
//! [outbox table] --(fetch, ascending id)--> [catalog-relay] --(publish)--> [broker]
//!        ^                                         |
//!        +----------------(delete on ack)----------+
//! ```
//!
//! ## Configuration
//! - First argument or CATALOG_CONFIG: config file path (YAML)
//! - CATALOG_LOG: tracing filter (default: info)
//! - CATALOG_* env vars override file settings (`__` separates nesting)

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tracing::{info, warn};

use catalog_cqrs::bus::{init_transport, BrokerPublisher, Transport};
use catalog_cqrs::config::Config;
use catalog_cqrs::outbox::{spawn_relay_task, RelayEngine};
use catalog_cqrs::storage::init_storage;
use catalog_cqrs::utils::bootstrap::init_tracing;
use catalog_cqrs::utils::retry::connection_backoff;

/// How long shutdown waits for queued broker deliveries.
const SHUTDOWN_FLUSH_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    let storage_config = config.storage.clone();
    let (_, outbox) = (|| {
        let storage_config = storage_config.clone();
        async move { init_storage(&storage_config).await.map_err(|e| e.to_string()) }
    })
    .retry(connection_backoff())
    .notify(|err: &String, dur: Duration| {
        warn!(service = "storage", error = %err, delay = ?dur, "Connection failed, retrying");
    })
    .await?;

    let transport = init_transport(&config.messaging).await?;
    let publisher = Arc::new(BrokerPublisher::new(transport.clone()));
    let engine = Arc::new(RelayEngine::new(outbox, publisher, config.relay.clone()));

    let interval = Duration::from_secs(config.relay.interval_secs.max(1));
    let handle = spawn_relay_task(engine, interval);

    info!(
        interval_secs = interval.as_secs(),
        lookback_days = config.relay.lookback_days,
        "catalog-relay started"
    );

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");

    handle.stop();
    handle.join().await;

    if let Err(e) = transport.flush(SHUTDOWN_FLUSH_TIMEOUT).await {
        warn!(error = %e, "Pending deliveries not flushed before exit");
    }

    Ok(())
}
