//! Error types for Commons Core

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Only activities can be joined")]
    NotAnActivity,

    #[error("Already joined this activity")]
    AlreadyJoined,

    #[error("This activity is full")]
    ActivityFull,

    #[error("Voting too fast")]
    RateLimited,

    #[error("Invalid input: {0}")]
    ValidationFailed(String),

    #[error("Concurrent update conflict: {0}")]
    Conflict(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl Error {
    /// Message suitable for showing to the person who triggered the action.
    ///
    /// Capacity and authorization failures describe a valid concurrent state,
    /// so they get specific wording; backend failures stay generic.
    pub fn user_message(&self) -> String {
        match self {
            Error::NotAuthenticated => "Please sign in to continue.".to_string(),
            Error::NotFound(_) => "This item no longer exists.".to_string(),
            Error::Forbidden(_) => "You don't have permission to do that.".to_string(),
            Error::NotAnActivity => "Only activities can be joined.".to_string(),
            Error::AlreadyJoined => "You have already joined this activity.".to_string(),
            Error::ActivityFull => "This activity is full.".to_string(),
            Error::RateLimited => "You're voting too fast. Please wait a moment.".to_string(),
            Error::ValidationFailed(reason) => reason.clone(),
            Error::Conflict(_) => "Someone else just changed this. Please try again.".to_string(),
            _ => "Something went wrong. Please try again later.".to_string(),
        }
    }

    /// True for failures of the backing store rather than of the request
    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            Error::StoreUnavailable(_) | Error::Io(_) | Error::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
