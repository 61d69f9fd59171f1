//! TCP client for a remote document store
//!
//! `RemoteStore` implements `DocumentStore`, so the engine runs unchanged
//! against a store served by `StoreServer`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use commons_core::{Collection, Document, DocumentStore, Mutation, Query, UpdateOutcome};
use serde_json::{Map, Value};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::frame::{read_frame, write_frame};
use crate::protocol::{Request, Response};

/// Connection to a store server.
///
/// Requests on one connection are strictly sequential; concurrent callers
/// queue on the stream lock. A request abandoned mid-flight leaves its reply
/// unread, so the connection is marked out of sync and refuses further use.
pub struct RemoteStore {
    addr: SocketAddr,
    stream: Mutex<TcpStream>,
    desynced: AtomicBool,
}

/// Marks the connection out of sync unless the round trip finished
struct InFlight<'a> {
    desynced: &'a AtomicBool,
    finished: bool,
}

impl InFlight<'_> {
    fn finish(mut self) {
        self.finished = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.finished {
            warn!("Request abandoned mid-flight, connection is out of sync");
            self.desynced.store(true, Ordering::Release);
        }
    }
}

impl RemoteStore {
    /// Connect and authenticate with the access token
    #[instrument(skip(token))]
    pub async fn connect(addr: SocketAddr, token: &str) -> Result<Self> {
        info!(addr = %addr, "Connecting to store server");

        let mut stream = TcpStream::connect(addr).await?;
        write_frame(
            &mut stream,
            &Request::Hello {
                token: token.to_string(),
            },
        )
        .await?;

        match read_frame::<Response, _>(&mut stream).await? {
            Response::Welcome { server_version } => {
                debug!(server_version = %server_version, "Store server accepted connection");
            }
            Response::Rejected { reason } => return Err(Error::Rejected(reason)),
            other => {
                return Err(Error::Protocol(format!(
                    "Expected Welcome, got {}",
                    other.label()
                )))
            }
        }

        Ok(Self {
            addr,
            stream: Mutex::new(stream),
            desynced: AtomicBool::new(false),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Round-trip a keepalive
    pub async fn ping(&self) -> Result<()> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected(&other)),
        }
    }

    async fn call(&self, request: Request) -> Result<Response> {
        let mut stream = self.stream.lock().await;
        if self.desynced.load(Ordering::Acquire) {
            return Err(Error::OutOfSync);
        }

        let in_flight = InFlight {
            desynced: &self.desynced,
            finished: false,
        };
        write_frame(&mut *stream, &request).await?;
        let response = read_frame(&mut *stream).await?;
        in_flight.finish();

        Ok(response)
    }

    /// Send a request, turning a server-side error into the engine's error
    async fn request(&self, request: Request) -> commons_core::Result<Response> {
        match self.call(request).await? {
            Response::Error { kind, message } => Err(kind.into_core(message)),
            response => Ok(response),
        }
    }
}

fn unexpected(response: &Response) -> Error {
    Error::Protocol(format!("Unexpected response: {}", response.label()))
}

impl DocumentStore for RemoteStore {
    async fn create(
        &self,
        collection: Collection,
        fields: Map<String, Value>,
    ) -> commons_core::Result<Document> {
        match self.request(Request::Create { collection, fields }).await? {
            Response::Created { document } => Ok(document),
            other => Err(unexpected(&other).into()),
        }
    }

    async fn put(
        &self,
        collection: Collection,
        id: &str,
        fields: Map<String, Value>,
    ) -> commons_core::Result<Document> {
        let request = Request::Put {
            collection,
            id: id.to_string(),
            fields,
        };
        match self.request(request).await? {
            Response::Created { document } => Ok(document),
            other => Err(unexpected(&other).into()),
        }
    }

    async fn get(&self, collection: Collection, id: &str) -> commons_core::Result<Option<Document>> {
        let request = Request::Get {
            collection,
            id: id.to_string(),
        };
        match self.request(request).await? {
            Response::Document { document } => Ok(document),
            other => Err(unexpected(&other).into()),
        }
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        mutation: Mutation,
    ) -> commons_core::Result<UpdateOutcome> {
        let request = Request::Update {
            collection,
            id: id.to_string(),
            mutation,
        };
        match self.request(request).await? {
            Response::Updated { outcome } => Ok(outcome),
            other => Err(unexpected(&other).into()),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> commons_core::Result<bool> {
        let request = Request::Delete {
            collection,
            id: id.to_string(),
        };
        match self.request(request).await? {
            Response::Deleted { existed } => Ok(existed),
            other => Err(unexpected(&other).into()),
        }
    }

    async fn query(&self, query: Query) -> commons_core::Result<Vec<Document>> {
        match self.request(Request::Query { query }).await? {
            Response::Documents { documents } => Ok(documents),
            other => Err(unexpected(&other).into()),
        }
    }
}
