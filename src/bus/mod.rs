//! Broker publishing.
//!
//! This module contains:
//! - `Transport` trait: dispatches one message and hands back its acknowledgement
//! - `EventPublisher` trait: what the relay publishes through
//! - `BrokerPublisher`: waits for the acknowledgement or cancellation
//! - Implementations: Kafka, Log, Mock

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{MessagingConfig, MessagingType};

// Implementation modules
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod log;
pub mod mock;

// Re-exports
#[cfg(feature = "kafka")]
pub use kafka::KafkaTransport;
pub use log::LogTransport;
pub use mock::MockTransport;

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur during bus operations.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("producer is nil, cannot send messages")]
    NoTransport,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("context canceled while publishing message")]
    Cancelled,

    #[error("Acknowledgement dropped before completion")]
    AckDropped,
}

/// Completion of a dispatched send. Resolves once the broker accepts or
/// rejects the message.
pub type Acknowledgement = BoxFuture<'static, Result<()>>;

/// One message bound for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub event_type: String,
    pub key: String,
    pub payload: Vec<u8>,
}

/// A broker connection.
///
/// Implementations:
/// - `KafkaTransport`: rdkafka producer
/// - `LogTransport`: logs and acknowledges immediately
/// - `MockTransport`: in-memory, for testing
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dispatch a message. Returns once the send is queued; the returned
    /// future completes when the broker acknowledges.
    async fn send(&self, message: OutboundMessage) -> Result<Acknowledgement>;

    /// Wait up to `timeout` for dispatched messages to leave the client.
    /// Transports without a local queue have nothing to do.
    async fn flush(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Publishes relay output to a broker.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one message and wait for its acknowledgement.
    ///
    /// Firing `cancel` abandons the wait; a send already dispatched is not
    /// retracted.
    async fn publish(
        &self,
        cancel: &CancellationToken,
        event_type: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<()>;
}

/// Single-attempt publisher over a [`Transport`].
pub struct BrokerPublisher {
    transport: Option<Arc<dyn Transport>>,
}

impl BrokerPublisher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport: Some(transport),
        }
    }

    /// A publisher with no broker behind it. Every publish fails.
    pub fn disconnected() -> Self {
        Self { transport: None }
    }
}

#[async_trait]
impl EventPublisher for BrokerPublisher {
    async fn publish(
        &self,
        cancel: &CancellationToken,
        event_type: &str,
        key: &str,
        payload: Vec<u8>,
    ) -> Result<()> {
        let transport = self.transport.as_ref().ok_or(BusError::NoTransport)?;

        let ack = transport
            .send(OutboundMessage {
                event_type: event_type.to_string(),
                key: key.to_string(),
                payload,
            })
            .await?;

        tokio::select! {
            result = ack => {
                if result.is_ok() {
                    debug!(key = %key, "Message acknowledged");
                }
                result
            }
            _ = cancel.cancelled() => Err(BusError::Cancelled),
        }
    }
}

/// Initialize the broker transport based on configuration.
pub async fn init_transport(
    config: &MessagingConfig,
) -> std::result::Result<Arc<dyn Transport>, Box<dyn std::error::Error>> {
    match config.messaging_type {
        MessagingType::Log => {
            info!(messaging_type = "log", "Transport initialized");
            Ok(Arc::new(LogTransport::new()))
        }
        MessagingType::Kafka => {
            #[cfg(feature = "kafka")]
            {
                let transport = KafkaTransport::new(&config.kafka)?;
                info!(
                    messaging_type = "kafka",
                    bootstrap_servers = %config.kafka.bootstrap_servers,
                    topic = %config.kafka.topic,
                    "Transport initialized"
                );
                Ok(Arc::new(transport))
            }

            #[cfg(not(feature = "kafka"))]
            {
                Err("Kafka support requires the 'kafka' feature. Rebuild with --features kafka".into())
            }
        }
    }
}
