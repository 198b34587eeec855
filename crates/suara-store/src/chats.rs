//! Conversation projection.
//!
//! Chats are not a stored collection: group chats come from `chat_group`
//! rows and private chats are projected out of the message history. The
//! unread counters are client-local and survive reprojection.

use std::collections::HashMap;

use suara_shared::chat::direct_recipient;
use suara_shared::models::{Chat, ChatKind, ChatMessage, GroupChat, MessageTarget};
use suara_shared::{ChatId, UserId};

use crate::directory::Directory;

#[derive(Debug, Clone, Default)]
pub struct Chats {
    chats: Vec<Chat>,
}

impl Chats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> Vec<Chat> {
        self.chats.clone()
    }

    pub fn get(&self, id: &ChatId) -> Option<&Chat> {
        self.chats.iter().find(|chat| chat.id == *id)
    }

    fn get_mut(&mut self, id: &ChatId) -> Option<&mut Chat> {
        self.chats.iter_mut().find(|chat| chat.id == *id)
    }

    /// Recompute the chat list from authoritative inputs.
    ///
    /// Unread counters and locally created (still message-less) private
    /// chats are carried over; everything else is rebuilt. `messages` is
    /// expected in chronological order.
    pub fn rebuild(
        &mut self,
        me: &UserId,
        messages: &[ChatMessage],
        groups: &[GroupChat],
        directory: &Directory,
    ) {
        let unread: HashMap<String, u32> = self
            .chats
            .iter()
            .map(|chat| (chat.id.as_str().to_string(), chat.unread))
            .collect();
        let carried = |id: &ChatId| unread.get(id.as_str()).copied().unwrap_or(0);

        let mut next: Vec<Chat> = Vec::new();

        let mut sorted_groups: Vec<&GroupChat> = groups.iter().collect();
        sorted_groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for group in sorted_groups {
            let id = ChatId::from(&group.id);
            let last_message = messages
                .iter()
                .rev()
                .find(|m| matches!(&m.target, MessageTarget::Group(g) if *g == group.id))
                .cloned();
            next.push(Chat {
                unread: carried(&id),
                id,
                name: group.name.clone(),
                kind: ChatKind::Group,
                participants: vec![group.created_by.clone()],
                last_message,
            });
        }

        // Private chats, newest conversation first.
        for message in messages.iter().rev() {
            let Some(partner) = direct_partner(message, me) else {
                continue;
            };
            let id = message.chat_id();
            if next.iter().any(|chat| chat.id == id) {
                continue;
            }
            next.push(Chat {
                unread: carried(&id),
                name: display_name(&partner, directory),
                id,
                kind: ChatKind::Private,
                participants: vec![me.clone(), partner],
                last_message: Some(message.clone()),
            });
        }

        // Locally created private chats that have no messages yet.
        for chat in &self.chats {
            if chat.kind == ChatKind::Private && next.iter().all(|c| c.id != chat.id) {
                next.push(chat.clone());
            }
        }

        self.chats = next;
    }

    /// Add a chat created locally (private) or just inserted (group).
    /// Returns false if the id is already known.
    pub fn register(&mut self, chat: Chat) -> bool {
        if self.get(&chat.id).is_some() {
            return false;
        }
        self.chats.insert(0, chat);
        true
    }

    /// Fold one message into the projection: update the last-message line
    /// and the unread counter. A direct message from a new partner opens a
    /// chat on the spot.
    pub fn note_message(&mut self, me: &UserId, message: &ChatMessage, directory: &Directory) {
        let id = message.chat_id();
        let own = message.sender == *me;

        if let Some(chat) = self.get_mut(&id) {
            chat.last_message = Some(message.clone());
            if own {
                chat.unread = 0;
            } else {
                chat.unread += 1;
            }
            return;
        }

        if let Some(partner) = direct_partner(message, me) {
            self.chats.insert(
                0,
                Chat {
                    name: display_name(&partner, directory),
                    id,
                    kind: ChatKind::Private,
                    participants: vec![me.clone(), partner],
                    last_message: Some(message.clone()),
                    unread: u32::from(!own),
                },
            );
        }
        // A message for an unknown group is left to the next group reload.
    }

    pub fn mark_read(&mut self, id: &ChatId) -> bool {
        match self.get_mut(id) {
            Some(chat) => {
                chat.unread = 0;
                true
            }
            None => false,
        }
    }
}

/// The other side of a direct message involving `me`; `None` for group
/// traffic and other users' conversations.
fn direct_partner(message: &ChatMessage, me: &UserId) -> Option<UserId> {
    match &message.target {
        MessageTarget::Direct(recipient) if message.sender == *me => Some(recipient.clone()),
        MessageTarget::Direct(recipient) if *recipient == *me => Some(message.sender.clone()),
        _ => None,
    }
}

fn display_name(partner: &UserId, directory: &Directory) -> String {
    directory
        .name_of(partner)
        .map(str::to_string)
        .unwrap_or_else(|| partner.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use suara_shared::models::{DirectoryEntry, Role};
    use suara_shared::GroupId;

    fn uid(s: &str) -> UserId {
        UserId::from(s)
    }

    fn direct(id: &str, from: &str, to: &str, minute: u32) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender: uid(from),
            target: MessageTarget::Direct(uid(to)),
            body: "halo".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, minute, 0).unwrap(),
        }
    }

    fn group_msg(id: &str, from: &str, group: &str, minute: u32) -> ChatMessage {
        ChatMessage {
            id: id.to_string(),
            sender: uid(from),
            target: MessageTarget::Group(GroupId(group.to_string())),
            body: "rapat".into(),
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, minute, 0).unwrap(),
        }
    }

    fn directory_with(entries: &[(&str, &str)]) -> Directory {
        let mut directory = Directory::new();
        directory.replace_all(
            entries
                .iter()
                .map(|(id, name)| DirectoryEntry {
                    id: uid(id),
                    name: name.to_string(),
                    role: Role::Student,
                    class_name: None,
                    display_code: "AAAA1111".into(),
                })
                .collect(),
        );
        directory
    }

    #[test]
    fn rebuild_projects_private_chats_from_messages() {
        let me = uid("me");
        let directory = directory_with(&[("me", "Saya"), ("u-2", "Budi")]);
        let messages = vec![direct("m1", "u-2", "me", 0), direct("m2", "me", "u-2", 5)];

        let mut chats = Chats::new();
        chats.rebuild(&me, &messages, &[], &directory);

        let all = chats.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].id, ChatId::private(&me, &uid("u-2")));
        assert_eq!(all[0].name, "Budi");
        assert_eq!(all[0].last_message.as_ref().unwrap().id, "m2");
    }

    #[test]
    fn rebuild_ignores_other_peoples_conversations() {
        let me = uid("me");
        let directory = directory_with(&[]);
        let messages = vec![direct("m1", "u-2", "u-3", 0)];

        let mut chats = Chats::new();
        chats.rebuild(&me, &messages, &[], &directory);
        assert!(chats.all().is_empty());
    }

    #[test]
    fn unread_counts_survive_rebuild() {
        let me = uid("me");
        let directory = directory_with(&[("u-2", "Budi")]);
        let messages = vec![direct("m1", "u-2", "me", 0)];

        let mut chats = Chats::new();
        chats.rebuild(&me, &messages, &[], &directory);
        chats.note_message(&me, &direct("m2", "u-2", "me", 5), &directory);
        assert_eq!(chats.all()[0].unread, 1);

        let messages = vec![direct("m1", "u-2", "me", 0), direct("m2", "u-2", "me", 5)];
        chats.rebuild(&me, &messages, &[], &directory);
        assert_eq!(chats.all()[0].unread, 1);
    }

    #[test]
    fn own_message_resets_unread() {
        let me = uid("me");
        let directory = directory_with(&[("u-2", "Budi")]);
        let mut chats = Chats::new();

        chats.note_message(&me, &direct("m1", "u-2", "me", 0), &directory);
        assert_eq!(chats.all()[0].unread, 1);

        chats.note_message(&me, &direct("m2", "me", "u-2", 1), &directory);
        assert_eq!(chats.all()[0].unread, 0);
    }

    #[test]
    fn group_chats_carry_their_latest_message() {
        let me = uid("me");
        let directory = directory_with(&[]);
        let group = GroupChat {
            id: GroupId("g-1".into()),
            name: "OSIS".into(),
            created_by: uid("u-9"),
            created_at: Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap(),
        };
        let messages = vec![group_msg("m1", "u-9", "g-1", 0), group_msg("m2", "u-8", "g-1", 9)];

        let mut chats = Chats::new();
        chats.rebuild(&me, &messages, &[group], &directory);

        let all = chats.all();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, ChatKind::Group);
        assert_eq!(all[0].last_message.as_ref().unwrap().id, "m2");
    }

    #[test]
    fn registered_empty_chat_survives_rebuild() {
        let me = uid("me");
        let directory = directory_with(&[("u-2", "Budi")]);

        let mut chats = Chats::new();
        chats.register(Chat {
            id: ChatId::private(&me, &uid("u-2")),
            name: "Budi".into(),
            kind: ChatKind::Private,
            participants: vec![me.clone(), uid("u-2")],
            last_message: None,
            unread: 0,
        });

        chats.rebuild(&me, &[], &[], &directory);
        assert_eq!(chats.all().len(), 1);

        // Registering the same pair again is a no-op.
        assert!(!chats.register(Chat {
            id: ChatId::private(&uid("u-2"), &me),
            name: "Budi".into(),
            kind: ChatKind::Private,
            participants: vec![me.clone(), uid("u-2")],
            last_message: None,
            unread: 0,
        }));
    }

    #[test]
    fn mark_read_clears_the_counter() {
        let me = uid("me");
        let directory = directory_with(&[("u-2", "Budi")]);
        let mut chats = Chats::new();
        chats.note_message(&me, &direct("m1", "u-2", "me", 0), &directory);

        let id = ChatId::private(&me, &uid("u-2"));
        assert!(chats.mark_read(&id));
        assert_eq!(chats.all()[0].unread, 0);
    }
}
