//! Reconnect supervisor
//!
//! Owns the single active [`DeviceLink`] and the line pipeline it feeds.
//! Opening the real device is tried once at startup; any failure, then or
//! later, swaps in the dummy link and schedules reopen attempts with capped
//! exponential backoff while dummy lines keep flowing.

use crate::backoff::Backoff;
use crate::broadcast::Broadcaster;
use crate::device::{DeviceLink, LinkFactory};
use crate::framer::LineFramer;
use serialcast_core::constants::{
    DEFAULT_BASE_BACKOFF_MS, DEFAULT_MAX_BACKOFF_MS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_READ_CHUNK_SIZE,
};
use serialcast_core::{BridgeEvent, ConnectionState, EventDispatcher, LinkKind};
use serialcast_settings::{ReconnectSettings, SerialSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Framer plus broadcaster; whatever link is active pushes bytes through here.
///
/// Each broadcast is awaited before the next line so clients see lines in
/// device order. A stalled client therefore holds up reading for at most the
/// broadcaster's send timeout, after which it is evicted.
struct LinePipeline {
    framer: LineFramer,
    broadcaster: Broadcaster,
}

impl LinePipeline {
    async fn push(&mut self, bytes: &[u8]) {
        for line in self.framer.feed(bytes) {
            tracing::debug!("Line: {}", line);
            self.broadcaster.broadcast(&line).await;
        }
    }
}

/// State machine keeping exactly one device link active
pub struct ReconnectSupervisor {
    factory: Arc<dyn LinkFactory>,
    link: Option<Box<dyn DeviceLink>>,
    state: ConnectionState,
    backoff: Backoff,
    pipeline: LinePipeline,
    events: EventDispatcher,
    read_chunk_size: usize,
    poll_interval: Duration,
    init_due: Option<Instant>,
}

impl ReconnectSupervisor {
    /// Create a supervisor in the `Disconnected` state
    pub fn new(factory: Arc<dyn LinkFactory>, broadcaster: Broadcaster) -> Self {
        Self {
            factory,
            link: None,
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(
                Duration::from_millis(DEFAULT_BASE_BACKOFF_MS),
                Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
            ),
            pipeline: LinePipeline {
                framer: LineFramer::new(),
                broadcaster,
            },
            events: EventDispatcher::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            init_due: None,
        }
    }

    /// Apply read and backoff settings
    pub fn with_settings(mut self, serial: &SerialSettings, reconnect: &ReconnectSettings) -> Self {
        self.pipeline.framer = LineFramer::with_max_line_length(serial.max_line_length);
        self.read_chunk_size = serial.read_chunk_size.max(1);
        self.poll_interval = serial.poll_interval();
        self.with_backoff(reconnect.base_backoff(), reconnect.max_backoff())
    }

    /// Set the reconnect backoff range
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.backoff = Backoff::new(base, max);
        self
    }

    /// Publish transitions on `events`
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Variant of the active link, if any
    pub fn link_kind(&self) -> Option<LinkKind> {
        self.link.as_ref().map(|link| link.kind())
    }

    /// Delay before the next reconnect attempt
    pub fn current_backoff(&self) -> Duration {
        self.backoff.current()
    }

    /// Perform one transition and return the resulting state.
    ///
    /// In `Live` this reads until the link fails; in `DummyFallback` it feeds
    /// dummy lines for one backoff period and then tries the device once.
    pub async fn step(&mut self) -> ConnectionState {
        match self.state {
            ConnectionState::Disconnected => self.transition(ConnectionState::Connecting),
            ConnectionState::Connecting => self.connect().await,
            ConnectionState::Live => self.pump_live().await,
            ConnectionState::DummyFallback => self.pump_dummy().await,
        }
        self.state
    }

    /// Drive the state machine for the life of the process
    pub async fn run(&mut self) {
        loop {
            self.step().await;
        }
    }

    /// Close the active link
    pub async fn shutdown(&mut self) {
        self.init_due = None;
        if let Some(mut link) = self.link.take() {
            link.close().await;
        }
        self.pipeline.framer.reset();
    }

    async fn connect(&mut self) {
        match self.factory.open_live().await {
            Ok(link) => self.go_live(link).await,
            Err(e) => {
                tracing::warn!("{}. Falling back to dummy feed.", e);
                self.fall_back().await;
            }
        }
    }

    async fn pump_live(&mut self) {
        let failure = loop {
            let Some(link) = self.link.as_mut() else {
                break None;
            };
            // The init command goes out between reads once the link has settled.
            if self.init_due.is_some_and(|due| Instant::now() >= due) {
                self.init_due = None;
                if let Err(e) = link.initialize().await {
                    tracing::warn!("{}", e);
                }
            }
            match link.read_chunk(self.read_chunk_size).await {
                Ok(bytes) if bytes.is_empty() => tokio::time::sleep(self.poll_interval).await,
                Ok(bytes) => self.pipeline.push(&bytes).await,
                Err(e) => break Some(e),
            }
        };

        if let Some(e) = failure {
            tracing::warn!("{}. Switching to dummy feed.", e);
        }
        self.fall_back().await;
    }

    async fn pump_dummy(&mut self) {
        let deadline = Instant::now() + self.backoff.current();
        loop {
            let Some(link) = self.link.as_mut() else {
                break;
            };
            let chunk = tokio::select! {
                biased;
                chunk = link.read_chunk(self.read_chunk_size) => chunk,
                _ = tokio::time::sleep_until(deadline) => break,
            };
            match chunk {
                Ok(bytes) => self.pipeline.push(&bytes).await,
                Err(e) => tracing::warn!("Dummy feed error: {}", e),
            }
        }

        match self.factory.open_live().await {
            Ok(link) => {
                tracing::info!("Device available again after {} retries", self.backoff.failures());
                self.go_live(link).await;
            }
            Err(e) => {
                let delay = self.backoff.advance();
                let attempt = self.backoff.failures();
                tracing::info!(
                    "Reconnect attempt {} failed: {}. Retrying in {:?}.",
                    attempt,
                    e,
                    delay
                );
                self.events
                    .publish(BridgeEvent::ReconnectScheduled { attempt, delay });
            }
        }
    }

    async fn go_live(&mut self, link: Box<dyn DeviceLink>) {
        let settle = link.settle_delay();
        self.install(link).await;
        self.init_due = Some(Instant::now() + settle);
        self.backoff.reset();
        self.transition(ConnectionState::Live);
    }

    async fn fall_back(&mut self) {
        let dummy = self.factory.dummy();
        self.install(dummy).await;
        self.transition(ConnectionState::DummyFallback);
    }

    // Bytes from the outgoing link never join a line from the incoming one.
    async fn install(&mut self, link: Box<dyn DeviceLink>) {
        self.init_due = None;
        if let Some(mut previous) = self.link.replace(link) {
            previous.close().await;
        }
        let dropped = self.pipeline.framer.reset();
        if dropped > 0 {
            tracing::debug!("Discarded {} buffered bytes from previous link", dropped);
        }
    }

    fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            return;
        }
        debug_assert!(from.can_transition_to(to), "{from} -> {to}");
        tracing::info!("Bridge state: {} -> {}", from, to);
        self.state = to;
        self.events.publish(BridgeEvent::StateChanged { from, to });
    }
}
