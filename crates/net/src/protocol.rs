//! Store protocol message types
//!
//! All messages are JSON-serialized and length-prefixed on the wire. A
//! connection opens with `Hello`, after which every request gets exactly one
//! response, in order.

use commons_core::{Collection, Document, Mutation, Query, UpdateOutcome};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// First frame of every connection
    Hello { token: String },

    Create {
        collection: Collection,
        fields: Map<String, Value>,
    },

    Put {
        collection: Collection,
        id: String,
        fields: Map<String, Value>,
    },

    Get { collection: Collection, id: String },

    Update {
        collection: Collection,
        id: String,
        mutation: Mutation,
    },

    Delete { collection: Collection, id: String },

    Query { query: Query },

    /// Keepalive
    Ping,
}

/// Server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    /// Hello accepted
    Welcome { server_version: String },

    /// Hello refused; the server closes the connection
    Rejected { reason: String },

    Created { document: Document },

    Document { document: Option<Document> },

    Updated { outcome: UpdateOutcome },

    Deleted { existed: bool },

    Documents { documents: Vec<Document> },

    Pong,

    /// The store refused or failed the request
    Error { kind: ErrorKind, message: String },
}

/// Error classes that survive the round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Validation,
    Conflict,
    Store,
    Protocol,
}

impl Response {
    pub fn error(err: &commons_core::Error) -> Self {
        use commons_core::Error as E;
        let (kind, message) = match err {
            E::NotFound(m) => (ErrorKind::NotFound, m.clone()),
            E::Forbidden(m) => (ErrorKind::Forbidden, m.clone()),
            E::ValidationFailed(m) => (ErrorKind::Validation, m.clone()),
            E::Conflict(m) => (ErrorKind::Conflict, m.clone()),
            other => (ErrorKind::Store, other.to_string()),
        };
        Response::Error { kind, message }
    }

    /// Short name for logs
    pub fn label(&self) -> &'static str {
        match self {
            Response::Welcome { .. } => "welcome",
            Response::Rejected { .. } => "rejected",
            Response::Created { .. } => "created",
            Response::Document { .. } => "document",
            Response::Updated { .. } => "updated",
            Response::Deleted { .. } => "deleted",
            Response::Documents { .. } => "documents",
            Response::Pong => "pong",
            Response::Error { .. } => "error",
        }
    }
}

impl ErrorKind {
    /// Rebuild the engine error on the client side
    pub fn into_core(self, message: String) -> commons_core::Error {
        use commons_core::Error as E;
        match self {
            ErrorKind::NotFound => E::NotFound(message),
            ErrorKind::Forbidden => E::Forbidden(message),
            ErrorKind::Validation => E::ValidationFailed(message),
            ErrorKind::Conflict => E::Conflict(message),
            ErrorKind::Store | ErrorKind::Protocol => E::StoreUnavailable(message),
        }
    }
}
