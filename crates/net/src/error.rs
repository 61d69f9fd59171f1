//! Network error types

use std::io;

/// Network result type
pub type Result<T> = std::result::Result<T, Error>;

/// Network errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Connection rejected: {0}")]
    Rejected(String),

    #[error("Server full")]
    ServerFull,

    #[error("Connection out of sync after an interrupted request, reconnect")]
    OutOfSync,
}

/// Transport failures reach the engine as an unavailable store
impl From<Error> for commons_core::Error {
    fn from(err: Error) -> Self {
        commons_core::Error::StoreUnavailable(err.to_string())
    }
}
