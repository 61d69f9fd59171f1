//! Commons Network Library
//!
//! Serves a document store over TCP and connects to one.
//!
//! # Architecture
//!
//! - **StoreServer**: hosts a local store, authenticates clients by token
//! - **RemoteStore**: a `DocumentStore` backed by a server connection
//! - **Protocol**: Length-prefixed JSON request/response frames
//!
//! # Usage
//!
//! ```ignore
//! let server = StoreServer::start("127.0.0.1:7420", store, token.clone()).await?;
//!
//! let remote = Arc::new(RemoteStore::connect(server.addr(), &token).await?);
//! let commons = Commons::new(remote, identity);
//! commons.vote_up(&post_id).await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod protocol;
pub mod server;

pub use client::RemoteStore;
pub use error::{Error, Result};
pub use protocol::{ErrorKind, Request, Response};
pub use server::StoreServer;
