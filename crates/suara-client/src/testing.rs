//! In-process fake of the hosted platform for service tests.
//!
//! Rows live in per-table vectors, auth identities in a map, and
//! subscriptions hand back plain mpsc receivers that tests feed through
//! [`FakeRemote::push_change`]. Failures are injected per table.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::mpsc;

use suara_remote::{
    AuthSession, Filter, Query, Remote, RemoteError, Row, RowChange, SubscriptionSpec,
};

type RemoteResult<T> = suara_remote::Result<T>;

struct AuthRecord {
    password: String,
    user_id: String,
}

#[derive(Default)]
pub(crate) struct FakeRemote {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    auth: Mutex<HashMap<String, AuthRecord>>,
    signed_in: Mutex<Option<String>>,
    feeds: Mutex<Vec<(SubscriptionSpec, mpsc::Sender<RowChange>)>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<(String, Row)>>,
    auth_attempts: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_auth(&self, email: &str, password: &str, user_id: &str) {
        self.auth.lock().unwrap().insert(
            email.to_string(),
            AuthRecord {
                password: password.to_string(),
                user_id: user_id.to_string(),
            },
        );
    }

    /// Seed one row; the value must be a JSON object.
    pub fn seed_row(&self, table: &str, row: Value) {
        let Value::Object(row) = row else {
            panic!("seed_row expects an object");
        };
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn clear_table(&self, table: &str) {
        self.tables.lock().unwrap().remove(table);
    }

    /// Make every operation on `table` fail with a 503.
    pub fn fail_on(&self, table: &str) {
        self.failing.lock().unwrap().insert(table.to_string());
    }

    pub fn restore(&self, table: &str) {
        self.failing.lock().unwrap().remove(table);
    }

    pub fn auth_attempts(&self) -> usize {
        self.auth_attempts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<(String, Row)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn feed_count(&self) -> usize {
        self.feeds.lock().unwrap().len()
    }

    /// True once at least one subscription exists and every receiver has
    /// been dropped (i.e. all feed tasks are gone).
    pub fn feeds_closed(&self) -> bool {
        let feeds = self.feeds.lock().unwrap();
        !feeds.is_empty() && feeds.iter().all(|(_, tx)| tx.is_closed())
    }

    /// Deliver a change to every matching subscription.
    pub fn push_change(&self, change: RowChange) {
        let feeds = self.feeds.lock().unwrap();
        for (spec, tx) in feeds.iter() {
            if spec.table != change.table {
                continue;
            }
            if let (Some((column, value)), Some(row)) = (&spec.filter, &change.row) {
                let cell = row.get(column).map(render);
                if cell.as_deref() != Some(value.as_str()) {
                    continue;
                }
            }
            let _ = tx.try_send(change.clone());
        }
    }

    fn check_fail(&self, table: &str) -> RemoteResult<()> {
        if self.failing.lock().unwrap().contains(table) {
            return Err(RemoteError::api(503, "injected failure"));
        }
        Ok(())
    }

    fn session_for(&self, email: &str, user_id: &str) -> AuthSession {
        *self.signed_in.lock().unwrap() = Some(email.to_string());
        AuthSession {
            user_id: user_id.to_string(),
            email: email.to_string(),
            access_token: format!("tok-{user_id}"),
            refresh_token: None,
            expires_at: None,
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[async_trait]
impl Remote for FakeRemote {
    async fn sign_in(&self, email: &str, password: &str) -> RemoteResult<AuthSession> {
        self.auth_attempts.fetch_add(1, Ordering::SeqCst);

        let auth = self.auth.lock().unwrap();
        match auth.get(email) {
            Some(record) if record.password == password => {
                let user_id = record.user_id.clone();
                drop(auth);
                Ok(self.session_for(email, &user_id))
            }
            _ => Err(RemoteError::api(400, "invalid_grant")),
        }
    }

    async fn sign_up(&self, email: &str, password: &str, _metadata: Row) -> RemoteResult<AuthSession> {
        let mut auth = self.auth.lock().unwrap();
        if auth.contains_key(email) {
            return Err(RemoteError::api(422, "user already registered"));
        }
        let user_id = format!("auth-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        auth.insert(
            email.to_string(),
            AuthRecord {
                password: password.to_string(),
                user_id: user_id.clone(),
            },
        );
        drop(auth);
        Ok(self.session_for(email, &user_id))
    }

    async fn sign_out(&self) -> RemoteResult<()> {
        *self.signed_in.lock().unwrap() = None;
        Ok(())
    }

    async fn change_password(&self, new_password: &str) -> RemoteResult<()> {
        let signed_in = self.signed_in.lock().unwrap().clone();
        let email = signed_in.ok_or_else(|| RemoteError::Auth("not signed in".into()))?;
        let mut auth = self.auth.lock().unwrap();
        match auth.get_mut(&email) {
            Some(record) => {
                record.password = new_password.to_string();
                Ok(())
            }
            None => Err(RemoteError::Auth("unknown identity".into())),
        }
    }

    async fn select(&self, table: &str, query: Query) -> RemoteResult<Vec<Row>> {
        self.check_fail(table)?;

        let mut rows: Vec<Row> = self
            .rows(table)
            .into_iter()
            .filter(|row| query.filters.iter().all(|filter| filter.matches(row)))
            .collect();

        // Stable sorts applied in reverse give multi-key ordering.
        for order in query.order.iter().rev() {
            rows.sort_by(|a, b| {
                let av = a.get(&order.column).map(render).unwrap_or_default();
                let bv = b.get(&order.column).map(render).unwrap_or_default();
                if order.ascending {
                    av.cmp(&bv)
                } else {
                    bv.cmp(&av)
                }
            });
        }

        if let Some(limit) = query.limit {
            rows.truncate(limit as usize);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> RemoteResult<Row> {
        self.check_fail(table)?;

        let mut row = row;
        if !row.contains_key("id") {
            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            row.insert("id".into(), Value::String(format!("row-{n}")));
        }
        if !row.contains_key("created_at") {
            row.insert("created_at".into(), Value::String(Utc::now().to_rfc3339()));
        }

        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, filters: Vec<Filter>, patch: Row) -> RemoteResult<u64> {
        self.check_fail(table)?;

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let mut affected = 0;
        for row in rows.iter_mut() {
            if filters.iter().all(|filter| filter.matches(row)) {
                for (key, value) in &patch {
                    row.insert(key.clone(), value.clone());
                }
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn call(&self, function: &str, args: Row) -> RemoteResult<Value> {
        self.check_fail(function)?;
        self.calls
            .lock()
            .unwrap()
            .push((function.to_string(), args));
        Ok(Value::Null)
    }

    async fn subscribe(&self, spec: SubscriptionSpec) -> RemoteResult<mpsc::Receiver<RowChange>> {
        let (tx, rx) = mpsc::channel(16);
        self.feeds.lock().unwrap().push((spec, tx));
        Ok(rx)
    }
}
