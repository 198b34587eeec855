//! The provider-agnostic backend contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::change::{RowChange, SubscriptionSpec};
use crate::error::Result;
use crate::query::{Filter, Query, Row};

/// An authenticated session with the managed auth provider.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Identity assigned by the provider (also the `users` row key).
    pub user_id: String,
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When the access token lapses, if known.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Everything the portal needs from the hosted platform.
///
/// One implementation talks HTTP/websocket to the real backend
/// ([`crate::HttpRemote`]); tests substitute an in-memory fake. The service
/// layer only ever sees `Arc<dyn Remote>`.
#[async_trait]
pub trait Remote: Send + Sync {
    // -- Auth ------------------------------------------------------------

    /// Authenticate with email + password. Credential rejections come back
    /// as errors for which [`crate::RemoteError::is_credential_failure`]
    /// is true.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession>;

    /// Create an identity. `metadata` is attached to the auth record
    /// (name, NIK/NIS, role, class).
    async fn sign_up(&self, email: &str, password: &str, metadata: Row) -> Result<AuthSession>;

    async fn sign_out(&self) -> Result<()>;

    /// Change the signed-in identity's password.
    async fn change_password(&self, new_password: &str) -> Result<()>;

    // -- Rows ------------------------------------------------------------

    async fn select(&self, table: &str, query: Query) -> Result<Vec<Row>>;

    /// Insert one row; returns the stored row including backend-assigned
    /// columns (id, created_at).
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Patch every row matching the filters; returns the affected count.
    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<u64>;

    /// Invoke a stored procedure (leaderboard counters).
    async fn call(&self, function: &str, args: Row) -> Result<Value>;

    // -- Change feed -----------------------------------------------------

    /// Open a change subscription. The receiver closes when the feed is
    /// lost; re-subscribing re-establishes it.
    async fn subscribe(&self, spec: SubscriptionSpec) -> Result<mpsc::Receiver<RowChange>>;
}
