//! [`FruServer`] – WebSocket transport for the [`Dispatcher`].
//!
//! Each text frame carries one JSON call; the server answers it with exactly
//! one text frame before reading the next. Connections are served
//! concurrently, one Tokio task each, and all of them share the same
//! dispatcher and tree.
//!
//! | Frame | Handling |
//! |---|---|
//! | Text | [`Dispatcher::handle_text`], reply sent back |
//! | Binary | `InvalidDescription` fault |
//! | Ping / Pong | answered by tungstenite |
//! | Close | connection ends |

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use frusvc_types::FruError;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::dispatcher::{Dispatcher, Response};

/// Default TCP port of the call endpoint.
pub const DEFAULT_PORT: u16 = 9100;

/// Transport failures. Call-level failures never surface here; they are
/// sent to the caller as fault replies.
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("cannot bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("websocket handshake with {peer} failed: {source}")]
    Handshake {
        peer: SocketAddr,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// ─────────────────────────────────────────────────────────────────────────────
// FruServer
// ─────────────────────────────────────────────────────────────────────────────

/// Listener configuration.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use frusvc_description::JsonDescriptionParser;
/// use frusvc_service::{Dispatcher, FruServer, FruService};
///
/// #[tokio::main]
/// async fn main() {
///     let service = Arc::new(FruService::with_roots(["/system"]).unwrap());
///     let dispatcher = Arc::new(Dispatcher::new(service, Arc::new(JsonDescriptionParser::new())));
///     let (_stop, shutdown) = tokio::sync::watch::channel(false);
///     FruServer::new(dispatcher).run(shutdown).await.unwrap();
/// }
/// ```
pub struct FruServer {
    dispatcher: Arc<Dispatcher>,
    bind_address: IpAddr,
    port: u16,
}

impl FruServer {
    /// Server on `127.0.0.1:`[`DEFAULT_PORT`].
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: DEFAULT_PORT,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn bind_address(&self) -> IpAddr {
        self.bind_address
    }

    /// Open the listening socket.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        let addr = SocketAddr::new(self.bind_address, self.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local = listener.local_addr()?;
        info!(addr = %local, "FRU service listening");
        Ok(BoundServer {
            listener,
            dispatcher: self.dispatcher,
        })
    }

    /// Bind and serve until `shutdown` turns `true`.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown).await
    }
}

/// A listening server, ready to accept connections.
pub struct BoundServer {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
}

impl BoundServer {
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until `shutdown` turns `true` (or its sender is
    /// dropped). Connections already open keep running on their own tasks.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), ServerError> {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let dispatcher = Arc::clone(&self.dispatcher);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer, dispatcher).await {
                                    warn!(%peer, error = %e, "connection closed with error");
                                }
                            });
                        }
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }
        info!("FRU service listener stopped");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-connection handler
// ─────────────────────────────────────────────────────────────────────────────

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: Arc<Dispatcher>,
) -> Result<(), ServerError> {
    let ws = accept_async(stream)
        .await
        .map_err(|source| ServerError::Handshake { peer, source })?;
    debug!(%peer, "caller connected");

    let (mut tx, mut rx) = ws.split();
    while let Some(msg) = rx.next().await {
        let reply = match msg? {
            Message::Text(text) => dispatcher.handle_text(text.as_str()),
            Message::Binary(_) => Response::fault(
                None,
                &FruError::InvalidDescription("binary frames are not accepted".into()),
            )
            .to_text(),
            Message::Close(_) => break,
            _ => continue,
        };
        tx.send(Message::Text(reply.into())).await?;
    }

    debug!(%peer, "caller disconnected");
    Ok(())
}
