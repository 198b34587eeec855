//! Data service: the portal's collection caches and write intents.
//!
//! On construction (identity present) the service bulk-loads every
//! collection and the user directory. One feed task per subscribed table
//! keeps the caches current: payload-carrying events go through the keyed
//! merge, anything else falls back to a full reload of that collection.
//! Every write is confirmed-write: remote first, cache only on success.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use suara_remote::{ChangeKind, Filter, Query, Remote, Row, RowChange, SubscriptionSpec};
use suara_shared::chat::direct_recipient;
use suara_shared::models::{
    Chat, ChatKind, ChatMessage, Comment, Complaint, ComplaintStatus, DirectoryEntry, GroupChat,
    MessageTarget, NewsCategory, NewsPost, Role, ScheduleEntry, UserProfile,
};
use suara_shared::{records, validate, ChatId, GroupId, RecordError, UserId};
use suara_store::{Chats, Collection, Directory, InsertOrder};

use crate::error::{PortalError, Result};
use crate::events::{EventBus, PortalEvent};

/// Pause between reconnection attempts after a lost feed.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

struct DataState {
    complaints: Collection<Complaint>,
    posts: Collection<NewsPost>,
    messages: Collection<ChatMessage>,
    groups: Collection<GroupChat>,
    schedules: Collection<ScheduleEntry>,
    directory: Directory,
    chats: Chats,
}

pub struct DataService {
    remote: Arc<dyn Remote>,
    events: EventBus,
    me: UserProfile,
    state: RwLock<DataState>,
}

impl DataService {
    pub fn new(remote: Arc<dyn Remote>, events: EventBus, me: UserProfile) -> Self {
        Self {
            remote,
            events,
            me,
            state: RwLock::new(DataState {
                complaints: Collection::new(InsertOrder::NewestFirst),
                posts: Collection::new(InsertOrder::NewestFirst),
                messages: Collection::new(InsertOrder::OldestFirst),
                groups: Collection::new(InsertOrder::NewestFirst),
                schedules: Collection::new(InsertOrder::OldestFirst),
                directory: Directory::new(),
                chats: Chats::new(),
            }),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DataState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DataState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -- Reads -----------------------------------------------------------

    pub fn complaints(&self) -> Vec<Complaint> {
        self.read().complaints.to_vec()
    }

    pub fn posts(&self) -> Vec<NewsPost> {
        self.read().posts.to_vec()
    }

    pub fn chats(&self) -> Vec<Chat> {
        self.read().chats.all()
    }

    pub fn schedules(&self) -> Vec<ScheduleEntry> {
        self.read().schedules.to_vec()
    }

    /// Messages of one conversation, chronological.
    pub fn messages_for(&self, chat: &ChatId) -> Vec<ChatMessage> {
        self.read()
            .messages
            .items()
            .iter()
            .filter(|message| message.chat_id() == *chat)
            .cloned()
            .collect()
    }

    /// Everyone except the signed-in user, for chat creation.
    pub fn list_users(&self) -> Vec<DirectoryEntry> {
        self.read().directory.others(&self.me.id)
    }

    // -- Bulk loads -------------------------------------------------------

    /// Initial load of every collection. Called once per session, and again
    /// by [`crate::Portal`] on demand.
    pub async fn load_all(&self) -> Result<()> {
        self.load_directory().await?;
        self.load_complaints().await?;
        self.load_posts().await?;
        self.load_groups().await?;
        self.load_messages().await?;
        self.load_schedules().await?;
        Ok(())
    }

    async fn load_complaints(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                records::TABLE_COMPLAINTS,
                Query::new().order_desc("created_at"),
            )
            .await?;
        let complaints = parse_rows(&rows, records::TABLE_COMPLAINTS, records::complaint_from_row);

        self.write().complaints.replace_all(complaints);
        self.events.emit(PortalEvent::ComplaintsChanged);
        Ok(())
    }

    async fn load_posts(&self) -> Result<()> {
        let rows = self
            .remote
            .select(records::TABLE_NEWS, Query::new().order_desc("created_at"))
            .await?;
        let parsed = parse_rows(&rows, records::TABLE_NEWS, records::news_post_from_row);

        let mut state = self.write();
        // Likes and comments are client-local; carry them across reloads.
        let local: HashMap<String, (u32, Vec<Comment>)> = state
            .posts
            .items()
            .iter()
            .map(|post| (post.id.clone(), (post.likes, post.comments.clone())))
            .collect();
        let merged = parsed
            .into_iter()
            .map(|mut post| {
                if let Some((likes, comments)) = local.get(&post.id) {
                    post.likes = *likes;
                    post.comments = comments.clone();
                }
                post
            })
            .collect();
        state.posts.replace_all(merged);
        drop(state);

        self.events.emit(PortalEvent::NewsChanged);
        Ok(())
    }

    async fn load_groups(&self) -> Result<()> {
        let rows = self
            .remote
            .select(records::TABLE_GROUPS, Query::new().order_desc("created_at"))
            .await?;
        let groups = parse_rows(&rows, records::TABLE_GROUPS, records::group_from_row);

        let mut state = self.write();
        state.groups.replace_all(groups);
        self.rebuild_chats(&mut state);
        drop(state);

        self.events.emit(PortalEvent::ChatsChanged);
        Ok(())
    }

    /// All group traffic plus the user's own direct messages.
    async fn load_messages(&self) -> Result<()> {
        let my_id = Value::String(self.me.id.0.clone());
        let rows = self
            .remote
            .select(
                records::TABLE_MESSAGES,
                Query::new()
                    .any_of(vec![
                        Filter::Eq("sender_id".into(), my_id.clone()),
                        Filter::Eq("receiver_id".into(), my_id),
                        Filter::NotNull("group_id".into()),
                    ])
                    .order_asc("created_at"),
            )
            .await?;
        let messages = parse_rows(&rows, records::TABLE_MESSAGES, records::message_from_row);

        let mut state = self.write();
        state.messages.replace_all(messages);
        self.rebuild_chats(&mut state);
        drop(state);

        self.events.emit(PortalEvent::MessagesChanged);
        self.events.emit(PortalEvent::ChatsChanged);
        Ok(())
    }

    async fn load_schedules(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                records::TABLE_SCHEDULES,
                Query::new().order_asc("hari").order_asc("jam_mulai"),
            )
            .await?;
        let schedules = parse_rows(&rows, records::TABLE_SCHEDULES, records::schedule_from_row);

        self.write().schedules.replace_all(schedules);
        self.events.emit(PortalEvent::SchedulesChanged);
        Ok(())
    }

    async fn load_directory(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                records::TABLE_USERS,
                Query::new().neq("id", self.me.id.as_str()),
            )
            .await?;
        let entries = parse_rows(&rows, records::TABLE_USERS, records::directory_entry_from_row);

        self.write().directory.replace_all(entries);
        self.events.emit(PortalEvent::DirectoryChanged);
        Ok(())
    }

    fn rebuild_chats(&self, state: &mut DataState) {
        let messages = state.messages.to_vec();
        let groups = state.groups.to_vec();
        let directory = state.directory.clone();
        state
            .chats
            .rebuild(&self.me.id, &messages, &groups, &directory);
    }

    // -- Writes ----------------------------------------------------------

    /// Submit a complaint. The stored row's author is absent iff the
    /// submission is anonymous; the record starts as `Received` and is
    /// prepended to the cache once the store confirms it.
    pub async fn add_complaint(
        &self,
        category: &str,
        body: &str,
        anonymous: bool,
        evidence_url: Option<&str>,
    ) -> Result<Complaint> {
        validate::complaint(category, body)?;

        let author = if anonymous { None } else { Some(&self.me.id) };
        let row = self
            .remote
            .insert(
                records::TABLE_COMPLAINTS,
                records::new_complaint_row(author, category, body, evidence_url),
            )
            .await?;
        let complaint = records::complaint_from_row(&row)?;

        self.write().complaints.prepend(complaint.clone());
        self.events.emit(PortalEvent::ComplaintsChanged);
        info!(id = %complaint.id, anonymous, "complaint submitted");

        if !anonymous {
            self.bump_counter(records::RPC_COMPLAINT_COUNT).await;
        }
        Ok(complaint)
    }

    /// Advance a complaint's status. Admin-gated client-side (a UX check;
    /// the store's policy layer is authoritative) and forward-only: moving
    /// to the same status is a no-op, regressions are rejected.
    pub async fn update_complaint_status(&self, id: &str, status: ComplaintStatus) -> Result<()> {
        if self.me.role != Role::Admin {
            return Err(PortalError::PermissionDenied);
        }

        let current = {
            let state = self.read();
            state
                .complaints
                .get(id)
                .map(|complaint| complaint.status)
                .ok_or_else(|| PortalError::UnknownComplaint(id.to_string()))?
        };
        if current == status {
            return Ok(());
        }
        if !current.allows(status) {
            return Err(PortalError::InvalidTransition);
        }

        self.remote
            .update(
                records::TABLE_COMPLAINTS,
                vec![Filter::Eq("id".into(), Value::String(id.to_string()))],
                records::status_patch(status),
            )
            .await?;

        self.write()
            .complaints
            .patch(id, |complaint| complaint.status = status);
        self.events.emit(PortalEvent::ComplaintsChanged);
        info!(id, status = status.as_wire(), "complaint status updated");
        Ok(())
    }

    /// Publish a news post. Admin only.
    pub async fn add_news_post(
        &self,
        title: &str,
        body: &str,
        category: NewsCategory,
        media_url: Option<&str>,
    ) -> Result<NewsPost> {
        if self.me.role != Role::Admin {
            return Err(PortalError::PermissionDenied);
        }
        validate::news_post(title, body)?;

        let row = self
            .remote
            .insert(
                records::TABLE_NEWS,
                records::new_news_row(&self.me.id, title, body, category, media_url),
            )
            .await?;
        let post = records::news_post_from_row(&row)?;

        self.write().posts.prepend(post.clone());
        self.events.emit(PortalEvent::NewsChanged);
        info!(id = %post.id, "news post published");

        self.bump_counter(records::RPC_NEWS_COUNT).await;
        Ok(post)
    }

    /// Like a post. Client-local: the hosted schema has no likes table yet.
    pub fn like_post(&self, post_id: &str) -> Result<u32> {
        let mut state = self.write();
        let mut likes = 0;
        let found = state.posts.patch(post_id, |post| {
            post.likes += 1;
            likes = post.likes;
        });
        drop(state);

        if !found {
            return Err(PortalError::UnknownPost(post_id.to_string()));
        }
        self.events.emit(PortalEvent::NewsChanged);
        Ok(likes)
    }

    /// Comment on a post. Client-local, like the like counter.
    pub fn add_comment(&self, post_id: &str, body: &str) -> Result<Comment> {
        validate::message(body)?;

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            author: self.me.id.clone(),
            author_name: self.me.name.clone(),
            body: body.to_string(),
            created_at: chrono::Utc::now(),
        };

        let mut state = self.write();
        let found = state.posts.patch(post_id, |post| {
            post.comments.push(comment.clone());
        });
        drop(state);

        if !found {
            return Err(PortalError::UnknownPost(post_id.to_string()));
        }
        self.events.emit(PortalEvent::NewsChanged);
        Ok(comment)
    }

    /// Send a message into a conversation. Group ids route to the group;
    /// private ids route to whichever participant is not the sender.
    pub async fn send_message(&self, chat: &ChatId, body: &str) -> Result<ChatMessage> {
        validate::message(body)?;

        let target = if chat.is_private() {
            let recipient = direct_recipient(chat, &self.me.id)
                .ok_or_else(|| PortalError::UnknownChat(chat.as_str().to_string()))?;
            MessageTarget::Direct(recipient)
        } else {
            let state = self.read();
            let known = state.groups.get(chat.as_str()).is_some()
                || matches!(state.chats.get(chat), Some(c) if c.kind == ChatKind::Group);
            if !known {
                return Err(PortalError::UnknownChat(chat.as_str().to_string()));
            }
            MessageTarget::Group(GroupId(chat.as_str().to_string()))
        };

        let row = self
            .remote
            .insert(
                records::TABLE_MESSAGES,
                records::new_message_row(&self.me.id, &target, body),
            )
            .await?;
        let message = records::message_from_row(&row)?;

        let mut state = self.write();
        state.messages.append(message.clone());
        let directory = state.directory.clone();
        state.chats.note_message(&self.me.id, &message, &directory);
        drop(state);

        self.events.emit(PortalEvent::MessagesChanged);
        self.events.emit(PortalEvent::ChatsChanged);
        debug!(id = %message.id, chat = %chat, "message sent");
        Ok(message)
    }

    /// Open (or return) the private conversation with another user. No
    /// remote row exists for private chats; the id is derived and the chat
    /// registered locally.
    pub fn create_private_chat(&self, other: &UserId) -> ChatId {
        let id = ChatId::private(&self.me.id, other);

        let mut state = self.write();
        if state.chats.get(&id).is_some() {
            return id;
        }
        let name = state
            .directory
            .name_of(other)
            .map(str::to_string)
            .unwrap_or_else(|| other.as_str().to_string());
        state.chats.register(Chat {
            id: id.clone(),
            name,
            kind: ChatKind::Private,
            participants: vec![self.me.id.clone(), other.clone()],
            last_message: None,
            unread: 0,
        });
        drop(state);

        self.events.emit(PortalEvent::ChatsChanged);
        id
    }

    /// Create a group chat row and register the conversation.
    pub async fn create_group_chat(&self, name: &str, members: &[UserId]) -> Result<ChatId> {
        validate::group_name(name)?;

        let row = self
            .remote
            .insert(records::TABLE_GROUPS, records::new_group_row(name, &self.me.id))
            .await?;
        let group = records::group_from_row(&row)?;
        let id = ChatId::from(&group.id);

        let mut participants = vec![self.me.id.clone()];
        participants.extend(members.iter().cloned());

        let mut state = self.write();
        state.groups.prepend(group.clone());
        state.chats.register(Chat {
            id: id.clone(),
            name: group.name.clone(),
            kind: ChatKind::Group,
            participants,
            last_message: None,
            unread: 0,
        });
        drop(state);

        self.events.emit(PortalEvent::ChatsChanged);
        info!(id = %id, "group chat created");
        Ok(id)
    }

    /// Clear a conversation's client-local unread counter.
    pub fn mark_chat_read(&self, chat: &ChatId) {
        if self.write().chats.mark_read(chat) {
            self.events.emit(PortalEvent::ChatsChanged);
        }
    }

    /// Best-effort leaderboard counter bump; failures are logged, never
    /// propagated.
    async fn bump_counter(&self, function: &str) {
        let mut args = Row::new();
        args.insert("user_id".into(), Value::String(self.me.id.0.clone()));
        if let Err(e) = self.remote.call(function, args).await {
            warn!(function, error = %e, "leaderboard counter bump failed");
        }
    }

    // -- Change feed -----------------------------------------------------

    /// Spawn one feed task per subscribed collection, all scoped to the
    /// session's cancellation token.
    pub fn spawn_feeds(self: &Arc<Self>, cancel: &CancellationToken) {
        for table in [
            records::TABLE_COMPLAINTS,
            records::TABLE_NEWS,
            records::TABLE_MESSAGES,
        ] {
            let service = Arc::clone(self);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                service.run_feed(table, cancel).await;
            });
        }
    }

    async fn run_feed(&self, table: &'static str, cancel: CancellationToken) {
        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.remote.subscribe(SubscriptionSpec::all(table)) => result,
            };

            let mut rx = match subscribed {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(table, error = %e, "subscribe failed");
                    self.events.emit(PortalEvent::FeedLost {
                        table: table.to_string(),
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => continue,
                    }
                }
            };

            // Cover whatever happened while unsubscribed.
            if let Err(e) = self.reload(table).await {
                warn!(table, error = %e, "reload after subscribe failed");
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    change = rx.recv() => match change {
                        Some(change) => self.handle_change(table, change).await,
                        None => {
                            info!(table, "change feed lost");
                            self.events.emit(PortalEvent::FeedLost {
                                table: table.to_string(),
                            });
                            break;
                        }
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => {}
            }
        }
    }

    /// Apply one feed notification: merge the payload when it parses,
    /// otherwise reload the collection.
    async fn handle_change(&self, table: &'static str, change: RowChange) {
        match table {
            records::TABLE_COMPLAINTS => {
                match parse_change(&change, records::complaint_from_row) {
                    Applied::Upsert(complaint) => {
                        if self.write().complaints.upsert(complaint) {
                            self.events.emit(PortalEvent::ComplaintsChanged);
                        }
                    }
                    Applied::Remove(id) => {
                        if self.write().complaints.remove(&id) {
                            self.events.emit(PortalEvent::ComplaintsChanged);
                        }
                    }
                    Applied::Reload => {
                        if let Err(e) = self.load_complaints().await {
                            warn!(table, error = %e, "fallback reload failed");
                        }
                    }
                }
            }
            records::TABLE_NEWS => match parse_change(&change, records::news_post_from_row) {
                Applied::Upsert(mut post) => {
                    let mut state = self.write();
                    if let Some(existing) = state.posts.get(&post.id) {
                        post.likes = existing.likes;
                        post.comments = existing.comments.clone();
                    }
                    let changed = state.posts.upsert(post);
                    drop(state);
                    if changed {
                        self.events.emit(PortalEvent::NewsChanged);
                    }
                }
                Applied::Remove(id) => {
                    if self.write().posts.remove(&id) {
                        self.events.emit(PortalEvent::NewsChanged);
                    }
                }
                Applied::Reload => {
                    if let Err(e) = self.load_posts().await {
                        warn!(table, error = %e, "fallback reload failed");
                    }
                }
            },
            records::TABLE_MESSAGES => match parse_change(&change, records::message_from_row) {
                Applied::Upsert(message) if change.kind == ChangeKind::Insert => {
                    let mut state = self.write();
                    if state.messages.upsert(message.clone()) {
                        let directory = state.directory.clone();
                        state.chats.note_message(&self.me.id, &message, &directory);
                        drop(state);
                        self.events.emit(PortalEvent::MessagesChanged);
                        self.events.emit(PortalEvent::ChatsChanged);
                    }
                }
                // Edits and deletes are not part of the chat surface;
                // reload to stay convergent if the store ever emits them.
                _ => {
                    if let Err(e) = self.load_messages().await {
                        warn!(table, error = %e, "fallback reload failed");
                    }
                }
            },
            _ => debug!(table, "change for untracked table ignored"),
        }
    }

    async fn reload(&self, table: &'static str) -> Result<()> {
        match table {
            records::TABLE_COMPLAINTS => self.load_complaints().await,
            records::TABLE_NEWS => self.load_posts().await,
            records::TABLE_MESSAGES => {
                self.load_groups().await?;
                self.load_messages().await
            }
            _ => Ok(()),
        }
    }
}

/// What a feed notification amounts to once its payload is inspected.
enum Applied<T> {
    Upsert(T),
    Remove(String),
    Reload,
}

fn parse_change<T>(
    change: &RowChange,
    parse: impl Fn(&Row) -> std::result::Result<T, RecordError>,
) -> Applied<T> {
    let Some(row) = &change.row else {
        return Applied::Reload;
    };

    if change.kind == ChangeKind::Delete {
        return match row.get("id").and_then(Value::as_str) {
            Some(id) => Applied::Remove(id.to_string()),
            None => Applied::Reload,
        };
    }

    match parse(row) {
        Ok(item) => Applied::Upsert(item),
        Err(e) => {
            warn!(table = %change.table, error = %e, "undecodable change payload");
            Applied::Reload
        }
    }
}

fn parse_rows<T>(
    rows: &[Row],
    table: &str,
    parse: impl Fn(&Row) -> std::result::Result<T, RecordError>,
) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match parse(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!(table, error = %e, "skipping malformed row");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::testing::FakeRemote;

    fn profile(role: Role) -> UserProfile {
        UserProfile {
            id: UserId::from("u-1"),
            name: "Siti".into(),
            identifier: "0051234567".into(),
            display_code: "K3J9QZ1A".into(),
            role,
            points: 0,
            badges: Vec::new(),
            class_name: Some("XI-A".into()),
            email: None,
        }
    }

    fn service_with(remote: &Arc<FakeRemote>, role: Role) -> DataService {
        DataService::new(remote.clone() as Arc<dyn Remote>, EventBus::new(), profile(role))
    }

    fn complaint_row(id: &str, status: &str, minute: u32) -> serde_json::Value {
        json!({
            "id": id,
            "user_id": null,
            "jenis_pengaduan": "Fasilitas",
            "isi_pengaduan": "AC kelas rusak",
            "bukti_url": null,
            "status": status,
            "created_at": format!("2025-03-01T08:{minute:02}:00+00:00"),
        })
    }

    fn user_row(id: &str, name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "nik_nis": format!("00{id}"),
            "display_id": "BB22CC33",
            "name": name,
            "role": "siswa",
            "kelas": null,
        })
    }

    #[tokio::test]
    async fn anonymous_complaint_prepends_one_received_record() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();
        assert_eq!(data.complaints().len(), 1);

        let complaint = data
            .add_complaint("Bullying", "laporan penting", true, None)
            .await
            .unwrap();
        assert!(complaint.is_anonymous());
        assert_eq!(complaint.status, ComplaintStatus::Received);

        let cached = data.complaints();
        assert_eq!(cached.len(), 2);
        assert_eq!(cached[0].id, complaint.id);
        // Anonymous submissions earn no leaderboard credit.
        assert!(remote.calls().is_empty());
    }

    #[tokio::test]
    async fn named_complaint_carries_the_author_and_bumps_the_counter() {
        let remote = Arc::new(FakeRemote::new());
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        let complaint = data
            .add_complaint("Fasilitas", "proyektor mati", false, Some("https://cdn/bukti.jpg"))
            .await
            .unwrap();
        assert_eq!(complaint.author, Some(UserId::from("u-1")));
        assert_eq!(complaint.evidence_url.as_deref(), Some("https://cdn/bukti.jpg"));

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, records::RPC_COMPLAINT_COUNT);
    }

    #[tokio::test]
    async fn failed_submission_leaves_the_cache_untouched() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        remote.fail_on(records::TABLE_COMPLAINTS);
        let result = data.add_complaint("Bullying", "laporan", true, None).await;
        assert!(matches!(result, Err(PortalError::Remote(_))));
        assert_eq!(data.complaints().len(), 1);
    }

    #[tokio::test]
    async fn complaint_status_only_moves_forward() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        let data = service_with(&remote, Role::Admin);
        data.load_all().await.unwrap();

        data.update_complaint_status("c-1", ComplaintStatus::InProgress)
            .await
            .unwrap();
        data.update_complaint_status("c-1", ComplaintStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(data.complaints()[0].status, ComplaintStatus::Resolved);

        // Out of Resolved there is no way back.
        assert!(matches!(
            data.update_complaint_status("c-1", ComplaintStatus::InProgress).await,
            Err(PortalError::InvalidTransition)
        ));
        // Same-state is a no-op, not an error.
        data.update_complaint_status("c-1", ComplaintStatus::Resolved)
            .await
            .unwrap();

        let rows = remote.rows(records::TABLE_COMPLAINTS);
        assert_eq!(rows[0].get("status"), Some(&json!("selesai")));
    }

    #[tokio::test]
    async fn status_updates_are_admin_gated() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        let data = service_with(&remote, Role::StudentCouncil);
        data.load_all().await.unwrap();

        assert!(matches!(
            data.update_complaint_status("c-1", ComplaintStatus::InProgress).await,
            Err(PortalError::PermissionDenied)
        ));
    }

    #[tokio::test]
    async fn news_posting_is_admin_only_and_credited() {
        let remote = Arc::new(FakeRemote::new());
        let student = service_with(&remote, Role::Student);
        student.load_all().await.unwrap();
        assert!(matches!(
            student
                .add_news_post("Judul", "Isi", NewsCategory::Announcement, None)
                .await,
            Err(PortalError::PermissionDenied)
        ));

        let admin = service_with(&remote, Role::Admin);
        admin.load_all().await.unwrap();
        let post = admin
            .add_news_post("Lomba", "Pendaftaran dibuka", NewsCategory::Event, None)
            .await
            .unwrap();
        assert_eq!(admin.posts()[0].id, post.id);
        assert_eq!(remote.calls()[0].0, records::RPC_NEWS_COUNT);
    }

    #[tokio::test]
    async fn likes_and_comments_survive_a_reload() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(
            records::TABLE_NEWS,
            json!({
                "id": "p-1",
                "judul": "Pengumuman",
                "isi": "Libur",
                "kategori": "pengumuman",
                "author_id": "u-9",
                "gambar_url": null,
                "created_at": "2025-03-01T07:00:00+00:00",
            }),
        );
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        assert_eq!(data.like_post("p-1").unwrap(), 1);
        let comment = data.add_comment("p-1", "mantap").unwrap();
        assert!(matches!(
            data.like_post("p-404"),
            Err(PortalError::UnknownPost(_))
        ));

        // A full reload must not wipe the client-local state.
        data.load_posts().await.unwrap();
        let post = &data.posts()[0];
        assert_eq!(post.likes, 1);
        assert_eq!(post.comments.len(), 1);
        assert_eq!(post.comments[0].id, comment.id);
    }

    #[tokio::test]
    async fn direct_messages_route_to_the_other_participant() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_USERS, user_row("u-2", "Budi"));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        let chat = data.create_private_chat(&UserId::from("u-2"));
        assert_eq!(chat.as_str(), "private_u-1_u-2");
        // Creating it again from the other direction changes nothing.
        assert_eq!(data.create_private_chat(&UserId::from("u-2")), chat);
        assert_eq!(data.chats().len(), 1);

        let message = data.send_message(&chat, "halo Budi").await.unwrap();
        assert_eq!(message.target, MessageTarget::Direct(UserId::from("u-2")));

        let rows = remote.rows(records::TABLE_MESSAGES);
        assert_eq!(rows[0].get("receiver_id"), Some(&json!("u-2")));
        assert!(rows[0].get("group_id").is_none());

        assert_eq!(data.messages_for(&chat).len(), 1);
        let chats = data.chats();
        assert_eq!(chats[0].last_message.as_ref().unwrap().id, message.id);
        // Own messages never count as unread.
        assert_eq!(chats[0].unread, 0);
    }

    #[tokio::test]
    async fn group_messages_carry_the_group_reference() {
        let remote = Arc::new(FakeRemote::new());
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        let chat = data
            .create_group_chat("OSIS", &[UserId::from("u-2")])
            .await
            .unwrap();
        let message = data.send_message(&chat, "rapat jam 3").await.unwrap();
        assert!(matches!(message.target, MessageTarget::Group(_)));

        let rows = remote.rows(records::TABLE_MESSAGES);
        assert_eq!(rows[0].get("group_id"), Some(&json!(chat.as_str())));

        // An id that is neither private nor a known group is rejected.
        assert!(matches!(
            data.send_message(&ChatId("nonexistent".into()), "halo").await,
            Err(PortalError::UnknownChat(_))
        ));
    }

    #[tokio::test]
    async fn feed_payloads_merge_without_a_reload() {
        let remote = Arc::new(FakeRemote::new());
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();
        assert!(data.complaints().is_empty());

        // The payload alone must be enough; the table is never selected.
        remote.fail_on(records::TABLE_COMPLAINTS);
        let row = match complaint_row("c-7", "diterima", 30) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        data.handle_change(
            records::TABLE_COMPLAINTS,
            RowChange {
                kind: ChangeKind::Insert,
                table: records::TABLE_COMPLAINTS.into(),
                row: Some(row),
            },
        )
        .await;

        assert_eq!(data.complaints().len(), 1);
        assert_eq!(data.complaints()[0].id, "c-7");
    }

    #[tokio::test]
    async fn payload_less_changes_fall_back_to_a_reload() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();
        assert_eq!(data.complaints().len(), 1);

        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-2", "diterima", 5));
        data.handle_change(
            records::TABLE_COMPLAINTS,
            RowChange {
                kind: ChangeKind::Update,
                table: records::TABLE_COMPLAINTS.into(),
                row: None,
            },
        )
        .await;

        assert_eq!(data.complaints().len(), 2);
    }

    #[tokio::test]
    async fn reloading_without_writes_keeps_the_identifier_set() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-1", "diterima", 0));
        remote.seed_row(records::TABLE_COMPLAINTS, complaint_row("c-2", "diproses", 9));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        let before: std::collections::HashSet<String> =
            data.complaints().iter().map(|c| c.id.clone()).collect();
        data.load_complaints().await.unwrap();
        let after: std::collections::HashSet<String> =
            data.complaints().iter().map(|c| c.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn directory_excludes_the_signed_in_user() {
        let remote = Arc::new(FakeRemote::new());
        remote.seed_row(records::TABLE_USERS, user_row("u-1", "Siti"));
        remote.seed_row(records::TABLE_USERS, user_row("u-2", "Budi"));
        let data = service_with(&remote, Role::Student);
        data.load_all().await.unwrap();

        let users = data.list_users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].name, "Budi");
    }
}
