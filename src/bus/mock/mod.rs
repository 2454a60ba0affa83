//! Mock transport implementation for testing.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, RwLock};

use super::{Acknowledgement, BusError, OutboundMessage, Result, Transport};

type AckSender = oneshot::Sender<Result<()>>;

/// Mock transport for testing.
///
/// Records every message it is handed. Acknowledgements resolve immediately
/// unless manual mode is on, in which case each one waits for
/// [`MockTransport::complete_next`].
#[derive(Default)]
pub struct MockTransport {
    sent: RwLock<Vec<OutboundMessage>>,
    pending: RwLock<Vec<AckSender>>,
    fail_on_send: RwLock<bool>,
    fail_on_ack: RwLock<bool>,
    manual_ack: RwLock<bool>,
    flushes: RwLock<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse sends outright (connection-level failure).
    pub async fn set_fail_on_send(&self, fail: bool) {
        *self.fail_on_send.write().await = fail;
    }

    /// Accept sends but resolve their acknowledgement with an error.
    pub async fn set_fail_on_ack(&self, fail: bool) {
        *self.fail_on_ack.write().await = fail;
    }

    pub async fn set_manual_ack(&self, manual: bool) {
        *self.manual_ack.write().await = manual;
    }

    pub async fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn take_sent(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.write().await)
    }

    /// Number of `flush` calls so far.
    pub async fn flush_count(&self) -> usize {
        *self.flushes.read().await
    }

    /// Acknowledgements still waiting in manual mode.
    pub async fn pending_acks(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Resolve the oldest pending acknowledgement. Returns false when there
    /// is none or nobody is waiting on it any more.
    pub async fn complete_next(&self, result: Result<()>) -> bool {
        let mut pending = self.pending.write().await;
        if pending.is_empty() {
            return false;
        }
        pending.remove(0).send(result).is_ok()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, message: OutboundMessage) -> Result<Acknowledgement> {
        if *self.fail_on_send.read().await {
            return Err(BusError::Connection("Mock send failure".to_string()));
        }
        self.sent.write().await.push(message);

        if *self.manual_ack.read().await {
            let (tx, rx) = oneshot::channel();
            self.pending.write().await.push(tx);
            return Ok(Box::pin(async move {
                match rx.await {
                    Ok(result) => result,
                    Err(_) => Err(BusError::AckDropped),
                }
            }));
        }

        let result = if *self.fail_on_ack.read().await {
            Err(BusError::Publish("Mock negative acknowledgement".to_string()))
        } else {
            Ok(())
        };
        Ok(Box::pin(futures::future::ready(result)))
    }

    async fn flush(&self, _timeout: Duration) -> Result<()> {
        *self.flushes.write().await += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(key: &str) -> OutboundMessage {
        OutboundMessage {
            event_type: "product.created".to_string(),
            key: key.to_string(),
            payload: b"{}".to_vec(),
        }
    }

    #[tokio::test]
    async fn test_mock_transport_records_sends() {
        let transport = MockTransport::new();

        transport.send(message("a")).await.unwrap().await.unwrap();
        transport.send(message("b")).await.unwrap().await.unwrap();

        assert_eq!(transport.sent_count().await, 2);
        let taken = transport.take_sent().await;
        assert_eq!(taken[1].key, "b");
        assert_eq!(transport.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_mock_transport_dropped_sender_resolves_ack() {
        let transport = MockTransport::new();
        transport.set_manual_ack(true).await;

        let ack = transport.send(message("a")).await.unwrap();
        transport.pending.write().await.clear();

        assert!(matches!(ack.await, Err(BusError::AckDropped)));
    }

    #[tokio::test]
    async fn test_complete_next_without_pending() {
        let transport = MockTransport::new();
        assert!(!transport.complete_next(Ok(())).await);
    }

    #[tokio::test]
    async fn test_flush_is_recorded() {
        let transport = MockTransport::new();
        transport.flush(Duration::from_secs(1)).await.unwrap();
        assert_eq!(transport.flush_count().await, 1);
    }
}
