//! Ordered, keyed collection cache.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use suara_shared::models::{
    ChatMessage, Complaint, GroupChat, NewsPost, Notification, ScheduleEntry,
};

/// A cacheable record: stable key plus a monotonic version used to guard
/// merges from the change feed.
pub trait Keyed {
    fn key(&self) -> &str;

    /// Monotonic per-record version. Collections whose rows carry no server
    /// timestamp return the epoch minimum, which lets every merge through.
    fn version(&self) -> DateTime<Utc>;
}

/// Where records that arrive via merge are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOrder {
    /// Boards and feeds: most recent record first.
    NewestFirst,
    /// Message history: chronological.
    OldestFirst,
}

/// An ordered in-memory cache of one collection.
///
/// `replace_all` is the authoritative reload path; `upsert`/`remove` apply
/// individual feed payloads; `prepend`/`append` apply a confirmed local
/// write. All paths keep at most one record per key.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    order: InsertOrder,
}

impl<T: Keyed + Clone> Collection<T> {
    pub fn new(order: InsertOrder) -> Self {
        Self {
            items: Vec::new(),
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.items.clone()
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.items.iter().find(|item| item.key() == key)
    }

    /// Identifier set, used to compare cache generations.
    pub fn ids(&self) -> HashSet<String> {
        self.items.iter().map(|item| item.key().to_string()).collect()
    }

    /// Authoritative reload: adopt the server's rows and ordering.
    pub fn replace_all(&mut self, items: Vec<T>) {
        self.items = items;
    }

    /// Apply a confirmed write at the front, replacing any stale copy.
    pub fn prepend(&mut self, item: T) {
        self.items.retain(|existing| existing.key() != item.key());
        self.items.insert(0, item);
    }

    /// Apply a confirmed write at the back, replacing any stale copy.
    pub fn append(&mut self, item: T) {
        self.items.retain(|existing| existing.key() != item.key());
        self.items.push(item);
    }

    /// Merge one record from the change feed.
    ///
    /// Known keys are updated in place unless the cached copy is strictly
    /// newer (a late-arriving event loses to what the cache already holds).
    /// Unknown keys are inserted according to the collection's order.
    /// Returns whether the cache changed.
    pub fn upsert(&mut self, item: T) -> bool {
        if let Some(existing) = self.items.iter_mut().find(|e| e.key() == item.key()) {
            if existing.version() > item.version() {
                tracing::debug!(key = %item.key(), "stale change dropped");
                return false;
            }
            *existing = item;
            return true;
        }

        let position = match self.order {
            InsertOrder::NewestFirst => self
                .items
                .iter()
                .position(|e| e.version() <= item.version())
                .unwrap_or(self.items.len()),
            InsertOrder::OldestFirst => self
                .items
                .iter()
                .position(|e| e.version() > item.version())
                .unwrap_or(self.items.len()),
        };
        self.items.insert(position, item);
        true
    }

    /// Update one record in place. Returns whether it was found.
    pub fn patch<F: FnOnce(&mut T)>(&mut self, key: &str, f: F) -> bool {
        match self.items.iter_mut().find(|item| item.key() == key) {
            Some(item) => {
                f(item);
                true
            }
            None => false,
        }
    }

    /// Remove by key (feed delete events). Returns whether it was found.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.key() != key);
        self.items.len() != before
    }
}

// ---------------------------------------------------------------------------
// Keyed implementations
// ---------------------------------------------------------------------------

impl Keyed for Complaint {
    fn key(&self) -> &str {
        &self.id
    }
    fn version(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for NewsPost {
    fn key(&self) -> &str {
        &self.id
    }
    fn version(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for ChatMessage {
    fn key(&self) -> &str {
        &self.id
    }
    fn version(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for GroupChat {
    fn key(&self) -> &str {
        self.id.as_str()
    }
    fn version(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for Notification {
    fn key(&self) -> &str {
        &self.id
    }
    fn version(&self) -> DateTime<Utc> {
        self.created_at
    }
}

impl Keyed for ScheduleEntry {
    fn key(&self) -> &str {
        &self.id
    }
    // Schedule rows carry no server timestamp; merges always apply.
    fn version(&self) -> DateTime<Utc> {
        DateTime::<Utc>::MIN_UTC
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use suara_shared::models::ComplaintStatus;

    fn complaint(id: &str, minute: u32) -> Complaint {
        Complaint {
            id: id.to_string(),
            category: "Fasilitas".into(),
            body: "isi".into(),
            status: ComplaintStatus::Received,
            author: None,
            evidence_url: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 8, minute, 0).unwrap(),
        }
    }

    #[test]
    fn reload_with_same_rows_is_idempotent_by_ids() {
        let mut cache = Collection::new(InsertOrder::NewestFirst);
        cache.replace_all(vec![complaint("a", 2), complaint("b", 1)]);
        let before = cache.ids();

        cache.replace_all(vec![complaint("b", 1), complaint("a", 2)]);
        assert_eq!(cache.ids(), before);
    }

    #[test]
    fn prepend_replaces_an_existing_copy() {
        let mut cache = Collection::new(InsertOrder::NewestFirst);
        cache.replace_all(vec![complaint("a", 1)]);

        let mut updated = complaint("a", 1);
        updated.status = ComplaintStatus::InProgress;
        cache.prepend(updated);

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("a").unwrap().status, ComplaintStatus::InProgress);
    }

    #[test]
    fn stale_merge_is_dropped() {
        let mut cache = Collection::new(InsertOrder::NewestFirst);
        cache.replace_all(vec![complaint("a", 30)]);

        // An event minted before the cached copy must not win.
        assert!(!cache.upsert(complaint("a", 10)));
        assert_eq!(cache.get("a").unwrap().created_at.minute(), 30);

        // Same-version updates do win (status changes reuse created_at).
        let mut same = complaint("a", 30);
        same.status = ComplaintStatus::Resolved;
        assert!(cache.upsert(same));
        assert_eq!(cache.get("a").unwrap().status, ComplaintStatus::Resolved);
    }

    #[test]
    fn merged_inserts_land_in_order() {
        let mut cache = Collection::new(InsertOrder::NewestFirst);
        cache.replace_all(vec![complaint("c", 30), complaint("a", 10)]);

        cache.upsert(complaint("b", 20));
        let keys: Vec<&str> = cache.items().iter().map(Keyed::key).collect();
        assert_eq!(keys, ["c", "b", "a"]);

        let mut history = Collection::new(InsertOrder::OldestFirst);
        history.replace_all(vec![complaint("a", 10), complaint("c", 30)]);
        history.upsert(complaint("b", 20));
        let keys: Vec<&str> = history.items().iter().map(Keyed::key).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn remove_deletes_by_key() {
        let mut cache = Collection::new(InsertOrder::NewestFirst);
        cache.replace_all(vec![complaint("a", 1), complaint("b", 2)]);

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.len(), 1);
    }
}
