//! Synthetic heartbeat link used while no device is reachable.

use super::DeviceLink;
use async_trait::async_trait;
use serialcast_core::{ConnectionError, LinkKind};
use std::time::Duration;

/// Emits one constant line per interval; never fails.
#[derive(Debug, Clone)]
pub struct DummyLink {
    payload: Vec<u8>,
    interval: Duration,
}

impl DummyLink {
    /// Create a link that yields `line` every `interval`
    pub fn new(line: impl Into<String>, interval: Duration) -> Self {
        let mut payload = line.into().into_bytes();
        payload.push(b'\n');
        Self { payload, interval }
    }
}

#[async_trait]
impl DeviceLink for DummyLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Dummy
    }

    // Cancel-safe: dropping the future mid-sleep loses nothing.
    async fn read_chunk(&mut self, _max_bytes: usize) -> Result<Vec<u8>, ConnectionError> {
        tokio::time::sleep(self.interval).await;
        Ok(self.payload.clone())
    }

    async fn close(&mut self) {}
}
