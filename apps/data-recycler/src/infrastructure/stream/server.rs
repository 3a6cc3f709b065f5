//! Stream Server
//!
//! Network-facing half of the recycler. Accepts WebSocket connections,
//! performs the feed handshake (connected → auth → authenticated →
//! subscribe → subscription ack), then relays every sequencer tick to the
//! client from the shared broadcast hub.
//!
//! # Connection lifecycle
//!
//! accept → handshake → relay loop → (client disconnect, slow-client drop,
//! or session Closing) → close.
//!
//! Each connection is serviced by its own task. Per-connection failures are
//! logged and close that connection only; they never reach the sequencer or
//! other clients. A client that falls behind the broadcast channel capacity
//! is dropped rather than allowed to stall the producer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::messages::{
    CODE_AUTH_TIMEOUT, CODE_INVALID_SYNTAX, CODE_NOT_AUTHENTICATED, ClientRequest, EmissionError,
    ErrorMessage, SubscriptionAck, SuccessKind, SuccessMessage, control_frame,
};
use crate::infrastructure::broadcast::SharedTickHub;

/// Maximum time a client has to complete the auth/subscribe handshake.
/// Matches the real feed's behavior of dropping silent connections.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsSource = SplitStream<WebSocketStream<TcpStream>>;

// =============================================================================
// Error Types
// =============================================================================

/// Server-level errors (bind/listen failures).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind or accept on the configured address.
    #[error("server IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-connection errors. Recovered locally: the offending connection is
/// dropped and logged; the server and other connections continue.
#[derive(Debug, thiserror::Error)]
enum ConnectionError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error(transparent)]
    Encode(#[from] EmissionError),
}

/// Why a connection ended, for operator logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CloseReason {
    ClientClosed,
    SessionClosed,
    TooSlow,
    HandshakeTimeout,
}

impl CloseReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::ClientClosed => "client closed",
            Self::SessionClosed => "session closed",
            Self::TooSlow => "client too slow",
            Self::HandshakeTimeout => "handshake timeout",
        }
    }
}

// =============================================================================
// Server Stats
// =============================================================================

/// Connection accounting for operator visibility.
#[derive(Debug, Default)]
pub struct ServerStats {
    connected: AtomicUsize,
    served: AtomicU64,
}

impl ServerStats {
    fn on_connect(&self) {
        self.connected.fetch_add(1, Ordering::Relaxed);
        self.served.fetch_add(1, Ordering::Relaxed);
    }

    fn on_disconnect(&self) {
        self.connected.fetch_sub(1, Ordering::Relaxed);
    }

    /// Clients connected right now.
    #[must_use]
    pub fn connected(&self) -> usize {
        self.connected.load(Ordering::Relaxed)
    }

    /// Total clients served over the session.
    #[must_use]
    pub fn served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }
}

// =============================================================================
// Stream Server
// =============================================================================

/// WebSocket stream server fed by the sequencer's broadcast hub.
#[derive(Debug)]
pub struct StreamServer {
    listener: TcpListener,
    addr: SocketAddr,
    hub: SharedTickHub,
    cancel: CancellationToken,
    stats: Arc<ServerStats>,
}

impl StreamServer {
    /// Bind the server to an address.
    ///
    /// Binding to port 0 picks a free port; use [`Self::local_addr`] to
    /// discover it (the integration tests rely on this).
    ///
    /// # Errors
    ///
    /// Returns a `ServerError` if the address cannot be bound.
    pub async fn bind(
        addr: &str,
        hub: SharedTickHub,
        cancel: CancellationToken,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            hub,
            cancel,
            stats: Arc::new(ServerStats::default()),
        })
    }

    /// The bound socket address.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Shared connection stats.
    #[must_use]
    pub fn stats(&self) -> Arc<ServerStats> {
        Arc::clone(&self.stats)
    }

    /// Accept connections until the session token is cancelled.
    ///
    /// # Errors
    ///
    /// Individual accept failures are logged and skipped; only listener-level
    /// IO problems surface as `ServerError`.
    pub async fn run(self) -> Result<(), ServerError> {
        info!(addr = %self.addr, "stream server listening");
        let mut next_conn: u64 = 0;

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_conn += 1;
                        let conn = next_conn;
                        let hub = Arc::clone(&self.hub);
                        let cancel = self.cancel.clone();
                        let stats = Arc::clone(&self.stats);
                        tokio::spawn(async move {
                            handle_connection(stream, peer, conn, hub, cancel, stats).await;
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        info!(served = self.stats.served(), "stream server stopped");
        Ok(())
    }
}

// =============================================================================
// Connection Handling
// =============================================================================

/// Service one client connection from accept to close.
async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    conn: u64,
    hub: SharedTickHub,
    cancel: CancellationToken,
    stats: Arc<ServerStats>,
) {
    stats.on_connect();
    info!(conn, %peer, "client connected");

    match serve_connection(stream, conn, hub, cancel).await {
        Ok(reason) => info!(conn, %peer, reason = reason.as_str(), "client disconnected"),
        Err(e) => warn!(conn, %peer, error = %e, "client connection failed"),
    }

    stats.on_disconnect();
}

async fn serve_connection(
    stream: TcpStream,
    conn: u64,
    hub: SharedTickHub,
    cancel: CancellationToken,
) -> Result<CloseReason, ConnectionError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut write, mut read) = ws_stream.split();

    send_control(&mut write, &SuccessMessage::new(SuccessKind::Connected)).await?;

    let mut subscribed =
        match tokio::time::timeout(HANDSHAKE_TIMEOUT, handshake(&mut write, &mut read)).await {
            Ok(Ok(Some(bars))) => bars,
            Ok(Ok(None)) => return Ok(CloseReason::ClientClosed),
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                let _ = send_control(
                    &mut write,
                    &ErrorMessage::new(CODE_AUTH_TIMEOUT, "auth timeout"),
                )
                .await;
                return Ok(CloseReason::HandshakeTimeout);
            }
        };

    debug!(conn, bars = ?subscribed, "client subscribed, relaying ticks");

    // Subscribing here, after the handshake, means a mid-session client only
    // sees ticks from this point onward.
    let mut rx = hub.subscribe();

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(CloseReason::SessionClosed);
            }
            frame = rx.recv() => match frame {
                Ok(tick) => {
                    write
                        .send(Message::Text(tick.payload.to_string().into()))
                        .await?;
                }
                Err(RecvError::Lagged(missed)) => {
                    warn!(conn, missed, "client fell behind, dropping");
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(CloseReason::TooSlow);
                }
                Err(RecvError::Closed) => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(CloseReason::SessionClosed);
                }
            },
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    handle_client_request(&text, &mut write, &mut subscribed).await?;
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await?;
                }
                Some(Ok(Message::Close(_))) | None => return Ok(CloseReason::ClientClosed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }
}

/// Drive the auth/subscribe handshake.
///
/// Returns the subscribed bar symbols, or `None` if the client went away
/// before completing the handshake.
async fn handshake(
    write: &mut WsSink,
    read: &mut WsSource,
) -> Result<Option<Vec<String>>, ConnectionError> {
    let mut authenticated = false;

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match serde_json::from_str::<ClientRequest>(&text) {
                Ok(ClientRequest::Auth { .. }) => {
                    authenticated = true;
                    send_control(write, &SuccessMessage::new(SuccessKind::Authenticated)).await?;
                }
                Ok(ClientRequest::Subscribe { bars }) if authenticated => {
                    send_control(write, &SubscriptionAck::new(bars.clone())).await?;
                    return Ok(Some(bars));
                }
                Ok(ClientRequest::Subscribe { .. } | ClientRequest::Unsubscribe { .. }) => {
                    send_control(
                        write,
                        &ErrorMessage::new(CODE_NOT_AUTHENTICATED, "not authenticated"),
                    )
                    .await?;
                }
                Err(e) => {
                    debug!(error = %e, "unparseable handshake message");
                    send_control(
                        write,
                        &ErrorMessage::new(CODE_INVALID_SYNTAX, "invalid syntax"),
                    )
                    .await?;
                }
            },
            Message::Ping(data) => write.send(Message::Pong(data)).await?,
            Message::Close(_) => return Ok(None),
            _ => {}
        }
    }

    Ok(None)
}

/// Handle a post-handshake client request.
///
/// Subscription changes are acknowledged with the updated set, but the feed
/// itself stays session-scoped: every connected client receives all symbols
/// the session carries.
async fn handle_client_request(
    text: &str,
    write: &mut WsSink,
    subscribed: &mut Vec<String>,
) -> Result<(), ConnectionError> {
    match serde_json::from_str::<ClientRequest>(text) {
        Ok(ClientRequest::Subscribe { bars }) => {
            for sym in bars {
                if !subscribed.contains(&sym) {
                    subscribed.push(sym);
                }
            }
            send_control(write, &SubscriptionAck::new(subscribed.clone())).await?;
        }
        Ok(ClientRequest::Unsubscribe { bars }) => {
            subscribed.retain(|sym| !bars.contains(sym));
            send_control(write, &SubscriptionAck::new(subscribed.clone())).await?;
        }
        Ok(ClientRequest::Auth { .. }) => {
            send_control(write, &SuccessMessage::new(SuccessKind::Authenticated)).await?;
        }
        Err(e) => {
            debug!(error = %e, "unparseable client message");
            send_control(
                write,
                &ErrorMessage::new(CODE_INVALID_SYNTAX, "invalid syntax"),
            )
            .await?;
        }
    }

    Ok(())
}

async fn send_control<T: serde::Serialize>(
    write: &mut WsSink,
    msg: &T,
) -> Result<(), ConnectionError> {
    let frame = control_frame(msg)?;
    write.send(Message::Text(frame.into())).await?;
    Ok(())
}
