//! Transport that writes each message to the log.
//!
//! Stands in for a broker in standalone deployments: every send is logged at
//! info level and acknowledged immediately.

use async_trait::async_trait;
use tracing::info;

use super::{Acknowledgement, OutboundMessage, Result, Transport};

#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

impl LogTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LogTransport {
    async fn send(&self, message: OutboundMessage) -> Result<Acknowledgement> {
        info!(
            event_type = %message.event_type,
            key = %message.key,
            payload = %String::from_utf8_lossy(&message.payload),
            "Published event"
        );
        Ok(Box::pin(futures::future::ready(Ok(()))))
    }
}
