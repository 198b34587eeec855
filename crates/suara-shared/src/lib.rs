//! # suara-shared
//!
//! Domain model for the Suara school portal client: typed entities, the
//! derivations every client must agree on (private-chat identifiers, the
//! login-email convention, display codes), wire-row mapping for the hosted
//! row store, and input validation.
//!
//! The hosted backend owns the schema; this crate only mirrors it. Wire
//! table and column names are therefore fixed and must not be renamed.

pub mod auth;
pub mod chat;
pub mod constants;
pub mod models;
pub mod records;
pub mod validate;

mod error;
mod ids;

pub use error::{RecordError, ValidationError};
pub use ids::{ChatId, GroupId, UserId};
pub use models::*;
