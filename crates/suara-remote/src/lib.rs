//! # suara-remote
//!
//! Provider-agnostic contract for the hosted backend (managed auth, managed
//! relational rows, managed realtime change feed), plus the HTTP/websocket
//! implementation used in production.
//!
//! The hosted platform is an external collaborator: nothing here implements
//! auth, storage or fan-out, only the client side of their protocols. The
//! [`Remote`] trait is the seam the service layer is written against, which
//! also lets tests run against an in-process fake.

pub mod change;
pub mod config;
pub mod http;
pub mod query;
pub mod remote;

mod error;
mod feed;

pub use change::{ChangeKind, RowChange, SubscriptionSpec};
pub use config::RemoteConfig;
pub use error::{RemoteError, Result, RetryClass};
pub use http::HttpRemote;
pub use query::{Filter, Order, Query, Row};
pub use remote::{AuthSession, Remote};
