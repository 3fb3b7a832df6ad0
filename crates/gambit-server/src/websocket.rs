//! WebSocket transport adapter
//!
//! Accepts WebSocket connections and bridges each one to the relay: inbound
//! text frames go to [`SessionRelay::handle_text`], outbound events are drained
//! from the connection's hub queue by a dedicated writer task.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use gambit_core::{GambitError, TransportError};
use gambit_runtime::{ConnectionHub, ConnectionSession, RelayHandle, SessionRelay};

use crate::error::Result;

// ----------------------------------------------------------------------------
// WebSocket Server
// ----------------------------------------------------------------------------

/// Listener that feeds accepted connections into the relay
pub struct WebSocketServer {
    listener: TcpListener,
    relay: Arc<SessionRelay>,
    hub: Arc<ConnectionHub>,
    max_message_bytes: usize,
}

impl WebSocketServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, handle: &RelayHandle, max_message_bytes: usize) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            relay: handle.relay(),
            hub: handle.hub(),
            max_message_bytes,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if let Ok(addr) = self.listener.local_addr() {
            info!(address = %addr, "WebSocket server listening");
        }

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let relay = Arc::clone(&self.relay);
                        let hub = Arc::clone(&self.hub);
                        let max = self.max_message_bytes;
                        tokio::spawn(async move {
                            if let Err(err) = serve_connection(stream, peer, relay, hub, max).await {
                                debug!(peer = %peer, error = %err, "Connection ended with error");
                            }
                        });
                    }
                    Err(err) => warn!(error = %err, "Failed to accept connection"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("WebSocket server stopping");
                        break;
                    }
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Connection Handling
// ----------------------------------------------------------------------------

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    relay: Arc<SessionRelay>,
    hub: Arc<ConnectionHub>,
    max_message_bytes: usize,
) -> Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut frames) = ws.split();

    let (connection, mut events) = hub.register();
    let mut session = ConnectionSession::new(connection);
    info!(connection = %connection, peer = %peer, "Client connected");

    let mut writer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let text = match event.to_json() {
                Ok(text) => text,
                Err(err) => {
                    warn!(connection = %connection, error = %err, "Dropping unencodable event");
                    continue;
                }
            };
            if let Err(err) = sink.send(Message::Text(text)).await {
                debug!(connection = %connection, error = %err, "Outbound send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    // A writer that stops early means the peer is unreachable; treat it as a disconnect.
    let writer_finished = loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.len() > max_message_bytes {
                        let err = GambitError::from(TransportError::MessageTooLarge {
                            size: text.len(),
                            max: max_message_bytes,
                        });
                        relay.reject(&session, &err);
                        continue;
                    }
                    relay.handle_text(&mut session, &text).await;
                }
                Some(Ok(Message::Binary(_))) => {
                    relay.reject(&session, &GambitError::malformed_event("binary frames are not supported"));
                }
                Some(Ok(Message::Close(_))) | None => break false,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(connection = %connection, error = %err, "Read failed");
                    break false;
                }
            },
            _ = &mut writer => break true,
        }
    };

    relay.disconnect(&mut session).await;
    hub.unregister(connection);
    if !writer_finished {
        if let Err(err) = writer.await {
            warn!(connection = %connection, error = %err, "Writer task ended abnormally");
        }
    }
    info!(connection = %connection, peer = %peer, "Client disconnected");
    Ok(())
}
