//! Conversation routing helpers.
//!
//! Private chats have no backing row in the hosted store. Their identity is
//! a pure function of the two participants, and the routing of an outgoing
//! message is derived back from that identity. Both derivations are shared
//! here so every caller agrees with the web clients already in the field.

use crate::ids::{ChatId, UserId};

/// Resolve the direct recipient of a message sent into a private chat.
///
/// The recipient is whichever participant of the chat id is not the sender.
/// Returns `None` when the id is a group id or is malformed.
pub fn direct_recipient(chat: &ChatId, sender: &UserId) -> Option<UserId> {
    let (a, b) = chat.participants()?;
    if a == *sender {
        Some(b)
    } else {
        Some(a)
    }
}
