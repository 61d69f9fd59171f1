//! TCP server hosting a document store
//!
//! Clients authenticate with the shared access token in their first frame,
//! then send store requests one at a time. Each connection runs in its own
//! task against the shared store.

use std::net::SocketAddr;
use std::sync::Arc;

use commons_core::DocumentStore;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Semaphore};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Maximum number of concurrent client connections
const MAX_CONNECTIONS: usize = 64;

/// Store server handle
pub struct StoreServer {
    addr: SocketAddr,
    shutdown_tx: broadcast::Sender<()>,
}

impl StoreServer {
    /// Bind `listen` and start serving `store`
    pub async fn start<S>(listen: &str, store: Arc<S>, token: String) -> Result<Self>
    where
        S: DocumentStore + 'static,
    {
        let listener = TcpListener::bind(listen).await?;
        let bound_addr = listener.local_addr()?;

        info!(addr = %bound_addr, "Store server started");

        let (shutdown_tx, _) = broadcast::channel(1);
        let shutdown_rx = shutdown_tx.subscribe();
        let token: Arc<str> = Arc::from(token);

        // Spawn accept loop
        tokio::spawn(accept_loop(
            listener,
            store,
            token,
            shutdown_tx.clone(),
            shutdown_rx,
        ));

        Ok(StoreServer {
            addr: bound_addr,
            shutdown_tx,
        })
    }

    /// Get the server's bound address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Receiver that fires when the server shuts down
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        info!("Store server shutdown initiated");
    }
}

/// Accept incoming connections
async fn accept_loop<S>(
    listener: TcpListener,
    store: Arc<S>,
    token: Arc<str>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: DocumentStore + 'static,
{
    let slots = Arc::new(Semaphore::new(MAX_CONNECTIONS));

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((mut stream, addr)) => {
                        // Check capacity
                        let Ok(permit) = slots.clone().try_acquire_owned() else {
                            warn!(addr = %addr, "Connection refused, server full");
                            let refusal = Response::Rejected { reason: Error::ServerFull.to_string() };
                            let _ = write_frame(&mut stream, &refusal).await;
                            continue;
                        };
                        debug!(addr = %addr, "New connection");
                        let store = store.clone();
                        let token = token.clone();
                        let shutdown_rx = shutdown_tx.subscribe();
                        tokio::spawn(async move {
                            handle_connection(stream, addr, store, token, shutdown_rx).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                    }
                }
            }
            _ = shutdown_rx.recv() => {
                info!("Accept loop shutting down");
                break;
            }
        }
    }
}

/// Handle a single client connection
async fn handle_connection<S>(
    mut stream: TcpStream,
    addr: SocketAddr,
    store: Arc<S>,
    token: Arc<str>,
    mut shutdown_rx: broadcast::Receiver<()>,
) where
    S: DocumentStore,
{
    // First message must be Hello
    if let Err(e) = handshake(&mut stream, &token).await {
        warn!(addr = %addr, error = %e, "Handshake failed");
        return;
    }
    info!(addr = %addr, "Client authenticated");

    // Request loop
    loop {
        let request = tokio::select! {
            frame = read_frame::<Request, _>(&mut stream) => frame,
            _ = shutdown_rx.recv() => {
                debug!(addr = %addr, "Closing connection for shutdown");
                break;
            }
        };

        let response = match request {
            Ok(request) => dispatch(store.as_ref(), request).await,
            Err(Error::ConnectionClosed) => {
                debug!(addr = %addr, "Connection closed");
                break;
            }
            Err(Error::Protocol(reason)) => {
                warn!(addr = %addr, reason = %reason, "Malformed request");
                Response::Error {
                    kind: crate::protocol::ErrorKind::Protocol,
                    message: reason,
                }
            }
            Err(e) => {
                warn!(addr = %addr, error = %e, "Read error");
                break;
            }
        };

        debug!(addr = %addr, response = response.label(), "Responding");
        if let Err(e) = write_frame(&mut stream, &response).await {
            debug!(addr = %addr, error = %e, "Write failed");
            break;
        }
    }

    info!(addr = %addr, "Client disconnected");
}

/// First frame must be a Hello carrying the access token
async fn handshake(stream: &mut TcpStream, token: &str) -> Result<()> {
    match read_frame::<Request, _>(stream).await? {
        // Validate token
        Request::Hello { token: offered } if offered == token => {
            let welcome = Response::Welcome {
                server_version: env!("CARGO_PKG_VERSION").to_string(),
            };
            write_frame(stream, &welcome).await
        }
        Request::Hello { .. } => {
            let reason = "Invalid token".to_string();
            write_frame(stream, &Response::Rejected { reason: reason.clone() }).await?;
            Err(Error::Rejected(reason))
        }
        _ => {
            let reason = "Expected Hello".to_string();
            write_frame(stream, &Response::Rejected { reason: reason.clone() }).await?;
            Err(Error::Protocol(reason))
        }
    }
}

/// Run one request against the store
async fn dispatch<S: DocumentStore>(store: &S, request: Request) -> Response {
    let result = match request {
        Request::Create { collection, fields } => store
            .create(collection, fields)
            .await
            .map(|document| Response::Created { document }),
        Request::Put {
            collection,
            id,
            fields,
        } => store
            .put(collection, &id, fields)
            .await
            .map(|document| Response::Created { document }),
        Request::Get { collection, id } => store
            .get(collection, &id)
            .await
            .map(|document| Response::Document { document }),
        Request::Update {
            collection,
            id,
            mutation,
        } => store
            .update(collection, &id, mutation)
            .await
            .map(|outcome| Response::Updated { outcome }),
        Request::Delete { collection, id } => store
            .delete(collection, &id)
            .await
            .map(|existed| Response::Deleted { existed }),
        Request::Query { query } => store
            .query(query)
            .await
            .map(|documents| Response::Documents { documents }),
        Request::Ping => Ok(Response::Pong),
        Request::Hello { .. } => Ok(Response::Error {
            kind: crate::protocol::ErrorKind::Protocol,
            message: "Already authenticated".into(),
        }),
    };

    result.unwrap_or_else(|e| {
        if e.is_store_failure() {
            error!(error = %e, "Store request failed");
        }
        Response::error(&e)
    })
}
