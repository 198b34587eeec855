use serde::{Deserialize, Serialize};

use crate::constants::{CHAT_ID_SEPARATOR, PRIVATE_CHAT_PREFIX};

// Backend-assigned identifiers are opaque strings (UUIDs in practice).
// They are wrapped in newtypes so that a user id cannot silently stand in
// for a group id, and so the chat-id derivation has a single home.

/// Identity of a user, as assigned by the hosted auth provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity of a group-chat row in the hosted store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a conversation.
///
/// Group chats use the stable group row id verbatim. Private chats have no
/// backing row: the id is derived from the two participant identities and
/// every client must derive the same value, or conversations fragment.
/// See [`ChatId::private`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ChatId(pub String);

impl ChatId {
    /// Derive the identifier of the private conversation between `a` and `b`.
    ///
    /// The two ids are ordered lexicographically before joining, so the
    /// result is independent of which participant initiates.
    pub fn private(a: &UserId, b: &UserId) -> Self {
        let (first, second) = if a.as_str() <= b.as_str() { (a, b) } else { (b, a) };
        Self(format!(
            "{PRIVATE_CHAT_PREFIX}{first}{CHAT_ID_SEPARATOR}{second}"
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id denotes a derived private conversation.
    pub fn is_private(&self) -> bool {
        self.0.starts_with(PRIVATE_CHAT_PREFIX)
    }

    /// The two participants of a private conversation, in derivation order.
    ///
    /// Returns `None` for group ids. Participant ids never contain the
    /// separator (they are UUIDs), so the split is unambiguous.
    pub fn participants(&self) -> Option<(UserId, UserId)> {
        let pair = self.0.strip_prefix(PRIVATE_CHAT_PREFIX)?;
        let (a, b) = pair.split_once(CHAT_ID_SEPARATOR)?;
        Some((UserId(a.to_string()), UserId(b.to_string())))
    }
}

impl From<&GroupId> for ChatId {
    fn from(group: &GroupId) -> Self {
        Self(group.0.clone())
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
