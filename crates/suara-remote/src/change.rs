//! Change-feed notifications.

use serde::{Deserialize, Serialize};

use crate::query::Row;

/// What happened to a row.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "INSERT" => Some(ChangeKind::Insert),
            "UPDATE" => Some(ChangeKind::Update),
            "DELETE" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// One notification from a collection subscription.
///
/// `row` carries the changed record when the feed delivers it; `None` means
/// the consumer must fall back to reloading the collection.
#[derive(Debug, Clone)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub table: String,
    pub row: Option<Row>,
}

/// What to subscribe to: one collection, optionally narrowed server-side to
/// rows where `column = value` (used for per-user notification feeds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    pub table: String,
    pub filter: Option<(String, String)>,
}

impl SubscriptionSpec {
    /// Subscribe to every change on a collection.
    pub fn all(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: None,
        }
    }

    /// Subscribe to changes where `column` equals `value`.
    pub fn filtered(table: &str, column: &str, value: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: Some((column.to_string(), value.to_string())),
        }
    }
}
