//! User directory cache.
//!
//! Author and chat-partner display names are resolved against this cache at
//! projection time instead of joining on every query, which keeps feed
//! merges payload-only.

use std::collections::HashMap;

use suara_shared::models::DirectoryEntry;
use suara_shared::UserId;

#[derive(Debug, Clone, Default)]
pub struct Directory {
    entries: HashMap<String, DirectoryEntry>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn replace_all(&mut self, entries: Vec<DirectoryEntry>) {
        self.entries = entries
            .into_iter()
            .map(|entry| (entry.id.as_str().to_string(), entry))
            .collect();
    }

    pub fn upsert(&mut self, entry: DirectoryEntry) {
        self.entries.insert(entry.id.as_str().to_string(), entry);
    }

    pub fn get(&self, id: &UserId) -> Option<&DirectoryEntry> {
        self.entries.get(id.as_str())
    }

    pub fn name_of(&self, id: &UserId) -> Option<&str> {
        self.get(id).map(|entry| entry.name.as_str())
    }

    /// Everyone except `me`, sorted by display name. The list feeds chat
    /// creation.
    pub fn others(&self, me: &UserId) -> Vec<DirectoryEntry> {
        let mut entries: Vec<DirectoryEntry> = self
            .entries
            .values()
            .filter(|entry| entry.id != *me)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use suara_shared::models::Role;

    fn entry(id: &str, name: &str) -> DirectoryEntry {
        DirectoryEntry {
            id: UserId::from(id),
            name: name.to_string(),
            role: Role::Student,
            class_name: None,
            display_code: "AAAA1111".into(),
        }
    }

    #[test]
    fn others_excludes_me_and_sorts_by_name() {
        let mut directory = Directory::new();
        directory.replace_all(vec![entry("u-1", "Citra"), entry("u-2", "Agus"), entry("u-3", "Budi")]);

        let me = UserId::from("u-1");
        let names: Vec<String> = directory.others(&me).into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["Agus", "Budi"]);
        assert_eq!(directory.name_of(&me), Some("Citra"));
    }
}
