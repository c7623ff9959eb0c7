// src/infrastructure/realtime/mod.rs
// WebSocket transport for the realtime metrics stream

use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::domain::repository::{RealtimeConnector, TransportEvent, TransportHandle};

const EVENT_BUFFER: usize = 100;
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens `ws://` and `wss://` (native TLS) transports. The TCP connect, TLS
/// and upgrade handshake together must finish within the handshake timeout,
/// otherwise the attempt is reported as a transport error.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    url: Url,
    handshake_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
        }
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn run(
        url: Url,
        handshake_timeout: Duration,
        events: mpsc::Sender<TransportEvent>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let connecting = tokio::select! {
            result = tokio::time::timeout(handshake_timeout, connect_async(url.as_str())) => result,
            _ = &mut shutdown => return,
        };

        let (mut ws, _) = match connecting {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => {
                log::error!("Failed to connect to WebSocket {}: {:?}", url, e);
                let _ = events.send(TransportEvent::Error(e.to_string())).await;
                return;
            }
            Err(_) => {
                log::error!(
                    "WebSocket handshake with {} timed out after {:?}",
                    url,
                    handshake_timeout
                );
                let reason = format!("handshake timed out after {:?}", handshake_timeout);
                let _ = events.send(TransportEvent::Error(reason)).await;
                return;
            }
        };

        log::debug!("WebSocket connected to {}", url);
        if events.send(TransportEvent::Opened).await.is_err() {
            let _ = ws.close(None).await;
            return;
        }

        loop {
            tokio::select! {
                // A dropped sender means the owner went away as well
                _ = &mut shutdown => {
                    if let Err(e) = ws.close(None).await {
                        log::debug!("Error closing WebSocket: {}", e);
                    }
                    return;
                }
                message = ws.next() => {
                    let event = match message {
                        Some(Ok(Message::Text(text))) => TransportEvent::Frame(text.into_bytes()),
                        Some(Ok(Message::Binary(data))) => TransportEvent::Frame(data),
                        Some(Ok(Message::Close(_))) | None => TransportEvent::Closed,
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => TransportEvent::Error(e.to_string()),
                    };
                    let terminal = !matches!(event, TransportEvent::Frame(_));
                    if events.send(event).await.is_err() || terminal {
                        return;
                    }
                }
            }
        }
    }
}

impl RealtimeConnector for WebSocketConnector {
    fn open(&self) -> TransportHandle {
        let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(Self::run(
            self.url.clone(),
            self.handshake_timeout,
            event_tx,
            shutdown_rx,
        ));

        TransportHandle::new(event_rx, shutdown_tx)
    }
}
