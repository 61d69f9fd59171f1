//! Commons Core Library
//!
//! Models, permissions, document storage and the engagement and moderation
//! engine for the Commons campus platform.

pub mod config;
pub mod engine;
pub mod error;
pub mod invariants;
pub mod models;
pub mod permissions;
pub mod storage;

pub use config::{CommonsConfig, EngineSettings};
pub use engine::{
    Commons, CurrentUser, Direction, ExpirySweeper, IdentityProvider, SweepReport, VoteDebouncer,
    VoteOutcome,
};
pub use error::{Error, Result};
pub use models::*;
pub use permissions::{Action, PermissionMatrix, Session};
pub use storage::{
    Collection, Document, DocumentStore, FieldOp, Mutation, Precondition, Query, SqliteStore,
    UpdateOutcome,
};
