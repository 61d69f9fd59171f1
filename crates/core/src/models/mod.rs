//! Data models for Commons

mod comment;
mod complaint;
mod identity;
mod mindwall;
mod post;

pub use comment::*;
pub use complaint::*;
pub use identity::*;
pub use mindwall::*;
pub use post::*;
