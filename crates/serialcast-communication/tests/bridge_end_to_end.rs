//! Device lines flowing to WebSocket clients through failure and recovery.

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use serialcast_communication::{
    Broadcaster, ClientRegistry, ConnectionAcceptor, DeviceLink, DummyLink, LinkFactory,
    ReconnectSupervisor,
};
use serialcast_core::{BridgeEvent, ConnectionError, ConnectionState, EventDispatcher, LinkKind};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

const TIMEOUT: Duration = Duration::from_secs(10);

/// Live link that replays canned reads; `None` is a transport failure.
struct ReplayLink {
    reads: VecDeque<Option<&'static [u8]>>,
}

#[async_trait]
impl DeviceLink for ReplayLink {
    fn kind(&self) -> LinkKind {
        LinkKind::Live
    }

    async fn read_chunk(&mut self, _max_bytes: usize) -> Result<Vec<u8>, ConnectionError> {
        match self.reads.pop_front() {
            Some(Some(bytes)) => Ok(bytes.to_vec()),
            Some(None) => Err(ConnectionError::TransportReadFailure {
                port: "/dev/replay".to_string(),
                reason: "device unplugged".to_string(),
            }),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&mut self) {}
}

/// Hands out one scripted open result per attempt.
struct ReplayFactory {
    opens: Mutex<VecDeque<Option<Vec<Option<&'static [u8]>>>>>,
}

#[async_trait]
impl LinkFactory for ReplayFactory {
    async fn open_live(&self) -> Result<Box<dyn DeviceLink>, ConnectionError> {
        match self.opens.lock().pop_front().flatten() {
            Some(reads) => Ok(Box::new(ReplayLink {
                reads: reads.into(),
            })),
            None => Err(ConnectionError::ConnectFailure {
                port: "/dev/replay".to_string(),
                reason: "not present".to_string(),
            }),
        }
    }

    fn dummy(&self) -> Box<dyn DeviceLink> {
        Box::new(DummyLink::new("DUMMY", Duration::from_millis(40)))
    }
}

#[tokio::test]
async fn two_clients_see_device_line_then_dummy_then_recovery() {
    let registry = Arc::new(ClientRegistry::new());
    let events = EventDispatcher::default();
    let mut rx = events.subscribe();

    let acceptor = ConnectionAcceptor::bind("127.0.0.1:0", Arc::clone(&registry))
        .await
        .unwrap();
    let url = format!("ws://{}", acceptor.local_addr().unwrap());
    tokio::spawn(acceptor.run());

    let (mut a, _) = connect_async(url.as_str()).await.unwrap();
    let (mut b, _) = connect_async(url.as_str()).await.unwrap();
    timeout(TIMEOUT, async {
        while registry.len() < 2 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();

    let factory = Arc::new(ReplayFactory {
        opens: Mutex::new(VecDeque::from(vec![
            Some(vec![Some(&b"X=1\n"[..]), None]),
            None,
            None,
            Some(vec![Some(&b"X=2\n"[..])]),
        ])),
    });
    let mut supervisor = ReconnectSupervisor::new(factory, Broadcaster::new(Arc::clone(&registry)))
        .with_backoff(Duration::from_millis(100), Duration::from_millis(400))
        .with_events(events);
    let bridge = tokio::spawn(async move { supervisor.run().await });

    for ws in [&mut a, &mut b] {
        let mut lines = Vec::new();
        timeout(TIMEOUT, async {
            while let Some(Ok(message)) = ws.next().await {
                if let Message::Text(text) = message {
                    let done = text.as_str() == "X=2";
                    lines.push(text.as_str().to_owned());
                    if done {
                        break;
                    }
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(lines.first().map(String::as_str), Some("X=1"));
        assert_eq!(lines.last().map(String::as_str), Some("X=2"));
        let middle = &lines[1..lines.len() - 1];
        assert!(!middle.is_empty());
        assert!(middle.iter().all(|line| line == "DUMMY"));
    }

    let mut states = Vec::new();
    let mut retries = Vec::new();
    while let Ok(event) = rx.try_recv() {
        match event {
            BridgeEvent::StateChanged { to, .. } => states.push(to),
            BridgeEvent::ReconnectScheduled { delay, .. } => retries.push(delay),
            _ => {}
        }
    }
    assert_eq!(
        states,
        vec![
            ConnectionState::Connecting,
            ConnectionState::Live,
            ConnectionState::DummyFallback,
            ConnectionState::Live,
        ]
    );
    assert_eq!(
        retries,
        vec![Duration::from_millis(200), Duration::from_millis(400)]
    );

    bridge.abort();
}
