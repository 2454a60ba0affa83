//! Kafka transport.
//!
//! Every event goes to one configured topic. The message key is the routing
//! key, and the event type travels in the `event_type` header so consumers can
//! dispatch without parsing the body.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::ClientConfig;
use tracing::{debug, info};

use super::{Acknowledgement, BusError, OutboundMessage, Result, Transport};
use crate::config::KafkaConfig;

/// Header carrying the event type.
pub const EVENT_TYPE_HEADER: &str = "event_type";

/// Build a ClientConfig for the producer.
fn build_producer_config(config: &KafkaConfig) -> ClientConfig {
    let mut client = ClientConfig::new();
    client.set("bootstrap.servers", &config.bootstrap_servers);
    client.set("message.timeout.ms", config.message_timeout_ms.to_string());
    client.set("acks", "all");
    client.set("enable.idempotence", "true");

    apply_security_config(config, &mut client);
    client
}

/// Apply security settings to a ClientConfig.
fn apply_security_config(config: &KafkaConfig, client: &mut ClientConfig) {
    if let Some(ref protocol) = config.security_protocol {
        client.set("security.protocol", protocol);
    }

    if let Some(ref mechanism) = config.sasl_mechanism {
        client.set("sasl.mechanism", mechanism);
    }

    if let Some(ref username) = config.sasl_username {
        client.set("sasl.username", username);
    }

    if let Some(ref password) = config.sasl_password {
        client.set("sasl.password", password);
    }
}

/// Kafka transport over an rdkafka `FutureProducer`.
///
/// `send` enqueues the record and returns its `DeliveryFuture` as the
/// acknowledgement, so the caller decides how long to wait.
pub struct KafkaTransport {
    producer: FutureProducer,
    topic: String,
}

impl KafkaTransport {
    /// Create a producer for the configured cluster.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = build_producer_config(config)
            .create()
            .map_err(|e| BusError::Connection(format!("Failed to create producer: {}", e)))?;

        info!(
            bootstrap_servers = %config.bootstrap_servers,
            topic = %config.topic,
            "Kafka producer created"
        );

        Ok(Self {
            producer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl Transport for KafkaTransport {
    async fn send(&self, message: OutboundMessage) -> Result<Acknowledgement> {
        let headers = OwnedHeaders::new().insert(Header {
            key: EVENT_TYPE_HEADER,
            value: Some(message.event_type.as_str()),
        });
        let record = FutureRecord::to(&self.topic)
            .key(message.key.as_str())
            .payload(message.payload.as_slice())
            .headers(headers);

        let delivery = self
            .producer
            .send_result(record)
            .map_err(|(e, _)| BusError::Publish(format!("Failed to enqueue: {}", e)))?;

        debug!(topic = %self.topic, key = %message.key, "Message enqueued");

        Ok(Box::pin(async move {
            match delivery.await {
                Ok(Ok(_)) => Ok(()),
                Ok(Err((e, _))) => Err(BusError::Publish(e.to_string())),
                Err(_) => Err(BusError::AckDropped),
            }
        }))
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        // librdkafka's flush blocks the calling thread.
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(timeout))
            .await
            .map_err(|e| BusError::Publish(format!("Flush task failed: {}", e)))?
            .map_err(|e| BusError::Publish(format!("Flush failed: {}", e)))
    }
}
