//! HTTP/websocket implementation of [`Remote`] for the hosted platform.
//!
//! Rows go over the platform's REST surface (`/rest/v1`), auth over its
//! token endpoints (`/auth/v1`), and change feeds over the realtime
//! websocket, which is owned by a background task in [`crate::feed`].

use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::change::{RowChange, SubscriptionSpec};
use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use crate::feed::FeedHandle;
use crate::query::{Filter, Query, Row};
use crate::remote::{AuthSession, Remote};

/// Default timeout for REST and auth requests.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Refresh the access token when it is this close to lapsing.
const TOKEN_SLACK_SECS: i64 = 30;

const MAX_LOG_BODY_CHARS: usize = 256;

#[derive(Debug, Clone)]
struct Tokens {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Client for the hosted backend.
pub struct HttpRemote {
    http: reqwest::Client,
    config: RemoteConfig,
    tokens: RwLock<Option<Tokens>>,
    feed: Mutex<Option<FeedHandle>>,
    cancel: CancellationToken,
}

impl HttpRemote {
    pub fn new(config: RemoteConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            config,
            tokens: RwLock::new(None),
            feed: Mutex::new(None),
            cancel: CancellationToken::new(),
        })
    }

    /// Bearer value for the next request: the session's access token when
    /// signed in, the anonymous key otherwise.
    async fn bearer(&self) -> String {
        match self.tokens.read().await.as_ref() {
            Some(tokens) => tokens.access_token.clone(),
            None => self.config.anon_key.clone(),
        }
    }

    /// Refresh the session if the access token is about to lapse.
    async fn ensure_fresh(&self) {
        let needs_refresh = {
            let guard = self.tokens.read().await;
            match guard.as_ref() {
                Some(Tokens {
                    refresh_token: Some(_),
                    expires_at: Some(expires_at),
                    ..
                }) => (*expires_at - Utc::now()).num_seconds() < TOKEN_SLACK_SECS,
                _ => false,
            }
        };
        if !needs_refresh {
            return;
        }

        if let Err(e) = self.refresh_session().await {
            // The next request will fail with 401 and surface the problem.
            warn!(error = %e, "token refresh failed");
        }
    }

    async fn refresh_session(&self) -> Result<()> {
        let refresh_token = {
            let guard = self.tokens.read().await;
            guard
                .as_ref()
                .and_then(|t| t.refresh_token.clone())
                .ok_or_else(|| RemoteError::Auth("no refresh token".into()))?
        };

        let response = self
            .http
            .post(self.config.auth_url("token?grant_type=refresh_token"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let value: Value = Self::check(response).await?.json().await?;

        let (tokens, _) = parse_session(&value)?;
        debug!("access token refreshed");
        *self.tokens.write().await = Some(tokens);
        Ok(())
    }

    /// Map an error response to [`RemoteError`], draining the body for the
    /// platform's message field.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        let preview: String = message.chars().take(MAX_LOG_BODY_CHARS).collect();
        debug!(status = status.as_u16(), message = %preview, "API error");

        if status.as_u16() == 404 || status.as_u16() == 406 {
            return Err(RemoteError::NotFound);
        }
        Err(RemoteError::api(status.as_u16(), message))
    }
}

#[async_trait]
impl Remote for HttpRemote {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession> {
        let response = self
            .http
            .post(self.config.auth_url("token?grant_type=password"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let value: Value = Self::check(response).await?.json().await?;

        let (tokens, session) = parse_session(&value)?;
        *self.tokens.write().await = Some(tokens);
        Ok(session)
    }

    async fn sign_up(&self, email: &str, password: &str, metadata: Row) -> Result<AuthSession> {
        let response = self
            .http
            .post(self.config.auth_url("signup"))
            .header("apikey", &self.config.anon_key)
            .json(&json!({ "email": email, "password": password, "data": metadata }))
            .send()
            .await?;
        let value: Value = Self::check(response).await?.json().await?;

        if value.get("access_token").is_some() {
            let (tokens, session) = parse_session(&value)?;
            *self.tokens.write().await = Some(tokens);
            return Ok(session);
        }

        // Deployments with confirmation disabled return a session directly;
        // otherwise fall back to an immediate password sign-in.
        self.sign_in(email, password).await
    }

    async fn sign_out(&self) -> Result<()> {
        let tokens = self.tokens.write().await.take();

        if let Some(tokens) = tokens {
            let result = self
                .http
                .post(self.config.auth_url("logout"))
                .header("apikey", &self.config.anon_key)
                .bearer_auth(&tokens.access_token)
                .send()
                .await;
            match result {
                Ok(response) => {
                    if let Err(e) = Self::check(response).await {
                        warn!(error = %e, "remote sign-out failed; session cleared locally");
                    }
                }
                Err(e) => warn!(error = %e, "remote sign-out failed; session cleared locally"),
            }
        }
        Ok(())
    }

    async fn change_password(&self, new_password: &str) -> Result<()> {
        self.ensure_fresh().await;
        let access_token = {
            let guard = self.tokens.read().await;
            guard
                .as_ref()
                .map(|t| t.access_token.clone())
                .ok_or_else(|| RemoteError::Auth("not signed in".into()))?
        };

        let response = self
            .http
            .put(self.config.auth_url("user"))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token)
            .json(&json!({ "password": new_password }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select(&self, table: &str, query: Query) -> Result<Vec<Row>> {
        self.ensure_fresh().await;
        let response = self
            .http
            .get(self.config.rest_url(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .query(&query_params(&query))
            .send()
            .await?;
        let rows: Vec<Row> = Self::check(response).await?.json().await?;
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        self.ensure_fresh().await;
        let response = self
            .http
            .post(self.config.rest_url(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .header("Prefer", "return=representation")
            .json(&Value::Object(row))
            .send()
            .await?;
        let rows: Vec<Row> = Self::check(response).await?.json().await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RemoteError::api(500, "insert returned no representation"))
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> Result<u64> {
        self.ensure_fresh().await;
        let response = self
            .http
            .patch(self.config.rest_url(table))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .header("Prefer", "return=representation")
            .query(&filter_params(&filters))
            .json(&Value::Object(patch))
            .send()
            .await?;
        let rows: Vec<Row> = Self::check(response).await?.json().await?;
        Ok(rows.len() as u64)
    }

    async fn call(&self, function: &str, args: Row) -> Result<Value> {
        self.ensure_fresh().await;
        let response = self
            .http
            .post(self.config.rpc_url(function))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(self.bearer().await)
            .json(&Value::Object(args))
            .send()
            .await?;
        let response = Self::check(response).await?;

        let body = response.text().await?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }

    async fn subscribe(&self, spec: SubscriptionSpec) -> Result<mpsc::Receiver<RowChange>> {
        let mut guard = self.feed.lock().await;

        let needs_spawn = match guard.as_ref() {
            Some(handle) => handle.is_closed(),
            None => true,
        };
        if needs_spawn {
            *guard = Some(FeedHandle::spawn(
                self.config.realtime_url(),
                self.cancel.child_token(),
            ));
        }

        match guard.as_ref() {
            Some(handle) => handle.subscribe(spec).await,
            None => Err(RemoteError::Feed("feed task unavailable".into())),
        }
    }
}

impl Drop for HttpRemote {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A filter as it appears inside an `or=(...)` group.
fn inline_filter(filter: &Filter) -> String {
    match filter {
        Filter::Eq(col, v) => format!("{col}.eq.{}", render(v)),
        Filter::Neq(col, v) => format!("{col}.neq.{}", render(v)),
        Filter::IsNull(col) => format!("{col}.is.null"),
        Filter::NotNull(col) => format!("{col}.not.is.null"),
        // Documented as unsupported inside Any; encode best-effort.
        Filter::In(col, vs) => {
            let joined: Vec<String> = vs.iter().map(render).collect();
            format!("{col}.in.({})", joined.join(","))
        }
        Filter::Any(members) => {
            let joined: Vec<String> = members.iter().map(inline_filter).collect();
            format!("or({})", joined.join(","))
        }
    }
}

/// Encode filters to the REST dialect's query parameters.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|filter| match filter {
            Filter::Eq(col, v) => (col.clone(), format!("eq.{}", render(v))),
            Filter::Neq(col, v) => (col.clone(), format!("neq.{}", render(v))),
            Filter::In(col, vs) => {
                let joined: Vec<String> = vs.iter().map(render).collect();
                (col.clone(), format!("in.({})", joined.join(",")))
            }
            Filter::IsNull(col) => (col.clone(), "is.null".to_string()),
            Filter::NotNull(col) => (col.clone(), "not.is.null".to_string()),
            Filter::Any(members) => {
                let joined: Vec<String> = members.iter().map(inline_filter).collect();
                ("or".to_string(), format!("({})", joined.join(",")))
            }
        })
        .collect()
}

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = filter_params(&query.filters);

    if !query.order.is_empty() {
        let joined: Vec<String> = query
            .order
            .iter()
            .map(|o| {
                format!(
                    "{}.{}",
                    o.column,
                    if o.ascending { "asc" } else { "desc" }
                )
            })
            .collect();
        params.push(("order".to_string(), joined.join(",")));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

/// Best-effort extraction of the platform's error message field.
fn error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "error_description", "msg", "error"] {
            if let Some(message) = value.get(key).and_then(Value::as_str) {
                return message.to_string();
            }
        }
    }
    body.to_string()
}

/// Read the `exp` claim from an access token. The signature is the
/// platform's concern; this is only used to schedule refreshes.
fn jwt_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.get("exp")?.as_i64()?, 0)
}

fn parse_session(value: &Value) -> Result<(Tokens, AuthSession)> {
    let access_token = value
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::Auth("response carries no access token".into()))?
        .to_string();
    let refresh_token = value
        .get("refresh_token")
        .and_then(Value::as_str)
        .map(str::to_string);

    let user = value
        .get("user")
        .ok_or_else(|| RemoteError::Auth("response carries no user".into()))?;
    let user_id = user
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| RemoteError::Auth("user record has no id".into()))?
        .to_string();
    let email = user
        .get("email")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let expires_at = jwt_expiry(&access_token).or_else(|| {
        let expires_in = value.get("expires_in")?.as_i64()?;
        Some(Utc::now() + chrono::Duration::seconds(expires_in))
    });

    let tokens = Tokens {
        access_token: access_token.clone(),
        refresh_token: refresh_token.clone(),
        expires_at,
    };
    let session = AuthSession {
        user_id,
        email,
        access_token,
        refresh_token,
        expires_at,
    };
    Ok((tokens, session))
}
