//! WebSocket accept loop.
//!
//! Each accepted connection gets its own task, owned by the accept loop so
//! that stopping the loop also drops every client. The task registers the
//! client right after the handshake and then only reads, so it notices the
//! close; outbound lines are written by the broadcaster through [`WsClientSink`].

use crate::registry::{ClientHandle, ClientRegistry, ClientSink, Registration};
use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serialcast_core::constants::DEFAULT_HANDSHAKE_TIMEOUT_MS;
use serialcast_core::{BridgeEvent, ConnectionError, EventDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

type WsWriter = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Outbound half of a WebSocket connection
pub struct WsClientSink {
    peer: SocketAddr,
    writer: tokio::sync::Mutex<WsWriter>,
}

#[async_trait]
impl ClientSink for WsClientSink {
    async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        self.writer
            .lock()
            .await
            .send(Message::Text(line.to_owned().into()))
            .await
            .map_err(|e| ConnectionError::SendFailure {
                client: self.peer.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Listens for clients and keeps the registry in sync with live connections
pub struct ConnectionAcceptor {
    listener: TcpListener,
    registry: Arc<ClientRegistry>,
    events: EventDispatcher,
    handshake_timeout: Duration,
}

impl ConnectionAcceptor {
    /// Bind the listen socket at `addr` (`host:port`)
    pub async fn bind(addr: &str, registry: Arc<ClientRegistry>) -> Result<Self, ConnectionError> {
        let listener =
            TcpListener::bind(addr)
                .await
                .map_err(|e| ConnectionError::BindFailure {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                })?;
        Ok(Self {
            listener,
            registry,
            events: EventDispatcher::default(),
            handshake_timeout: Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS),
        })
    }

    /// Drop connections that have not completed the handshake within `timeout`
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Publish client churn on `events`
    pub fn with_events(mut self, events: EventDispatcher) -> Self {
        self.events = events;
        self
    }

    /// Address actually bound; useful when binding port 0
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept clients until the returned future is dropped.
    ///
    /// Client tasks live in a [`JoinSet`] owned by this future, so dropping
    /// or aborting it disconnects every client and empties the registry.
    pub async fn run(self) {
        if let Ok(addr) = self.local_addr() {
            tracing::info!("Listening for WebSocket clients on ws://{}", addr);
        }
        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        clients.spawn(serve_client(
                            stream,
                            peer,
                            Arc::clone(&self.registry),
                            self.events.clone(),
                            self.handshake_timeout,
                        ));
                    }
                    Err(e) => {
                        tracing::warn!("Accept failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(finished) = clients.join_next(), if !clients.is_empty() => {
                    if let Err(e) = finished {
                        tracing::warn!("Client task failed: {}", e);
                    }
                }
            }
        }
    }
}

async fn serve_client(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<ClientRegistry>,
    events: EventDispatcher,
    handshake_timeout: Duration,
) {
    let handshake = tokio_tungstenite::accept_async(stream);
    let ws = match tokio::time::timeout(handshake_timeout, handshake).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => return handshake_failed(peer, e.to_string()),
        Err(_) => return handshake_failed(peer, format!("timed out after {handshake_timeout:?}")),
    };

    let (writer, mut inbound) = ws.split();
    let sink = Arc::new(WsClientSink {
        peer,
        writer: tokio::sync::Mutex::new(writer),
    });
    let registration = Registration::new(registry, ClientHandle::new(Some(peer), sink));
    let id = registration.id();
    tracing::info!("Client {} connected from {}", id, peer);
    events.publish(BridgeEvent::ClientConnected { id, peer });

    // Inbound messages are discarded; only the close matters.
    while let Some(message) = inbound.next().await {
        match message {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Client {} read error: {}", id, e);
                break;
            }
        }
    }

    drop(registration);
    tracing::info!("Client {} disconnected", id);
    events.publish(BridgeEvent::ClientDisconnected { id });
}

fn handshake_failed(peer: SocketAddr, reason: String) {
    let err = ConnectionError::HandshakeFailure {
        peer: peer.to_string(),
        reason,
    };
    tracing::warn!("{}", err);
}
