//! Wire-row mapping for the hosted row store.
//!
//! Rows travel as JSON objects keyed by the hosted schema's column names
//! (Indonesian, fixed). This module owns the table-name constants and the
//! fallible conversions in both directions; nothing outside it touches a
//! raw column name.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::ids::{GroupId, UserId};
use crate::models::{
    ChatMessage, Complaint, ComplaintStatus, DirectoryEntry, GroupChat, MessageTarget,
    NewAccount, NewsCategory, NewsPost, Notification, Role, ScheduleEntry, UserProfile,
};

/// A raw row from (or for) the hosted store.
pub type Row = Map<String, Value>;

// ---------------------------------------------------------------------------
// Tables and stored procedures
// ---------------------------------------------------------------------------

pub const TABLE_USERS: &str = "users";
pub const TABLE_COMPLAINTS: &str = "pengaduan";
pub const TABLE_NEWS: &str = "berita";
pub const TABLE_MESSAGES: &str = "chat_message";
pub const TABLE_GROUPS: &str = "chat_group";
pub const TABLE_NOTIFICATIONS: &str = "notifications";
pub const TABLE_SCHEDULES: &str = "schedules";
pub const TABLE_LEADERBOARD: &str = "leaderboard";

/// Leaderboard counters maintained server-side.
pub const RPC_COMPLAINT_COUNT: &str = "increment_pengaduan_count";
pub const RPC_NEWS_COUNT: &str = "increment_berita_count";

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn text(row: &Row, field: &'static str) -> Result<String, RecordError> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(RecordError::Missing(field)),
        Some(_) => Err(RecordError::Invalid(field)),
    }
}

fn opt_text(row: &Row, field: &'static str) -> Result<Option<String>, RecordError> {
    match row.get(field) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(RecordError::Invalid(field)),
    }
}

fn flag(row: &Row, field: &'static str) -> Result<bool, RecordError> {
    match row.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Err(RecordError::Missing(field)),
        Some(_) => Err(RecordError::Invalid(field)),
    }
}

fn timestamp(row: &Row, field: &'static str) -> Result<DateTime<Utc>, RecordError> {
    let raw = text(row, field)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| RecordError::Invalid(field))
}

// ---------------------------------------------------------------------------
// Users / leaderboard
// ---------------------------------------------------------------------------

/// Map a `users` row to a profile. Points, badges and email are filled in
/// by the caller (they come from the leaderboard row and the auth session).
pub fn user_profile_from_row(row: &Row) -> Result<UserProfile, RecordError> {
    let role = Role::from_wire(&text(row, "role")?).ok_or(RecordError::Invalid("role"))?;
    Ok(UserProfile {
        id: UserId(text(row, "id")?),
        name: text(row, "name")?,
        identifier: text(row, "nik_nis")?,
        display_code: text(row, "display_id")?,
        role,
        points: 0,
        badges: Vec::new(),
        class_name: opt_text(row, "kelas")?,
        email: None,
    })
}

pub fn directory_entry_from_row(row: &Row) -> Result<DirectoryEntry, RecordError> {
    let role = Role::from_wire(&text(row, "role")?).ok_or(RecordError::Invalid("role"))?;
    Ok(DirectoryEntry {
        id: UserId(text(row, "id")?),
        name: text(row, "name")?,
        role,
        class_name: opt_text(row, "kelas")?,
        display_code: text(row, "display_id")?,
    })
}

/// Profile row inserted right after the auth identity is created.
pub fn new_user_row(user_id: &str, account: &NewAccount, display_code: &str) -> Row {
    let mut row = Row::new();
    row.insert("id".into(), Value::String(user_id.to_string()));
    row.insert("nik_nis".into(), Value::String(account.identifier.clone()));
    row.insert("display_id".into(), Value::String(display_code.to_string()));
    row.insert("name".into(), Value::String(account.name.clone()));
    row.insert("role".into(), Value::String(account.role.as_wire().to_string()));
    row.insert(
        "password_hash".into(),
        Value::String(crate::constants::PASSWORD_HASH_SENTINEL.to_string()),
    );
    row.insert(
        "kelas".into(),
        account
            .class_name
            .as_ref()
            .map(|k| Value::String(k.clone()))
            .unwrap_or(Value::Null),
    );
    row
}

pub fn profile_patch(name: &str, class_name: Option<&str>) -> Row {
    let mut row = Row::new();
    row.insert("name".into(), Value::String(name.to_string()));
    row.insert(
        "kelas".into(),
        class_name.map(|k| Value::String(k.to_string())).unwrap_or(Value::Null),
    );
    row
}

/// Initial leaderboard row for a fresh account.
pub fn new_leaderboard_row(user: &UserId) -> Row {
    let mut row = Row::new();
    row.insert("user_id".into(), Value::String(user.0.clone()));
    row.insert("total_berita".into(), Value::from(0));
    row.insert("total_pengaduan".into(), Value::from(0));
    row.insert("points".into(), Value::from(0));
    row
}

/// Points column of a leaderboard row; absent or null counts as zero.
pub fn points_from_row(row: &Row) -> i64 {
    row.get("points").and_then(Value::as_i64).unwrap_or(0)
}

pub fn points_patch(points: i64) -> Row {
    let mut row = Row::new();
    row.insert("points".into(), Value::from(points));
    row
}

// ---------------------------------------------------------------------------
// Complaints
// ---------------------------------------------------------------------------

pub fn complaint_from_row(row: &Row) -> Result<Complaint, RecordError> {
    let status = ComplaintStatus::from_wire(&text(row, "status")?)
        .ok_or(RecordError::Invalid("status"))?;
    Ok(Complaint {
        id: text(row, "id")?,
        category: text(row, "jenis_pengaduan")?,
        body: text(row, "isi_pengaduan")?,
        status,
        author: opt_text(row, "user_id")?.map(UserId),
        evidence_url: opt_text(row, "bukti_url")?,
        created_at: timestamp(row, "created_at")?,
    })
}

/// Row for a fresh submission. The author column is null iff the complaint
/// is anonymous; status always starts at `diterima`.
pub fn new_complaint_row(
    author: Option<&UserId>,
    category: &str,
    body: &str,
    evidence_url: Option<&str>,
) -> Row {
    let mut row = Row::new();
    row.insert(
        "user_id".into(),
        author.map(|a| Value::String(a.0.clone())).unwrap_or(Value::Null),
    );
    row.insert("jenis_pengaduan".into(), Value::String(category.to_string()));
    row.insert("isi_pengaduan".into(), Value::String(body.to_string()));
    row.insert(
        "bukti_url".into(),
        evidence_url.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null),
    );
    row.insert(
        "status".into(),
        Value::String(ComplaintStatus::Received.as_wire().to_string()),
    );
    row
}

pub fn status_patch(status: ComplaintStatus) -> Row {
    let mut row = Row::new();
    row.insert("status".into(), Value::String(status.as_wire().to_string()));
    row
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

pub fn news_post_from_row(row: &Row) -> Result<NewsPost, RecordError> {
    let category = NewsCategory::from_wire(&text(row, "kategori")?)
        .ok_or(RecordError::Invalid("kategori"))?;
    Ok(NewsPost {
        id: text(row, "id")?,
        title: text(row, "judul")?,
        body: text(row, "isi")?,
        category,
        author: UserId(text(row, "author_id")?),
        media: opt_text(row, "gambar_url")?.into_iter().collect(),
        likes: 0,
        comments: Vec::new(),
        created_at: timestamp(row, "created_at")?,
    })
}

pub fn new_news_row(
    author: &UserId,
    title: &str,
    body: &str,
    category: NewsCategory,
    media_url: Option<&str>,
) -> Row {
    let mut row = Row::new();
    row.insert("judul".into(), Value::String(title.to_string()));
    row.insert("isi".into(), Value::String(body.to_string()));
    row.insert("kategori".into(), Value::String(category.as_wire().to_string()));
    row.insert("author_id".into(), Value::String(author.0.clone()));
    row.insert(
        "gambar_url".into(),
        media_url.map(|u| Value::String(u.to_string())).unwrap_or(Value::Null),
    );
    row
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

pub fn message_from_row(row: &Row) -> Result<ChatMessage, RecordError> {
    let recipient = opt_text(row, "receiver_id")?;
    let group = opt_text(row, "group_id")?;
    let target = match (recipient, group) {
        (Some(r), None) => MessageTarget::Direct(UserId(r)),
        (None, Some(g)) => MessageTarget::Group(GroupId(g)),
        _ => return Err(RecordError::AmbiguousTarget),
    };
    Ok(ChatMessage {
        id: text(row, "id")?,
        sender: UserId(text(row, "sender_id")?),
        target,
        body: text(row, "message")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub fn new_message_row(sender: &UserId, target: &MessageTarget, body: &str) -> Row {
    let mut row = Row::new();
    row.insert("sender_id".into(), Value::String(sender.0.clone()));
    match target {
        MessageTarget::Direct(recipient) => {
            row.insert("receiver_id".into(), Value::String(recipient.0.clone()));
        }
        MessageTarget::Group(group) => {
            row.insert("group_id".into(), Value::String(group.0.clone()));
        }
    }
    row.insert("message".into(), Value::String(body.to_string()));
    row
}

pub fn group_from_row(row: &Row) -> Result<GroupChat, RecordError> {
    Ok(GroupChat {
        id: GroupId(text(row, "id")?),
        name: text(row, "group_name")?,
        created_by: UserId(text(row, "created_by")?),
        created_at: timestamp(row, "created_at")?,
    })
}

pub fn new_group_row(name: &str, created_by: &UserId) -> Row {
    let mut row = Row::new();
    row.insert("group_name".into(), Value::String(name.to_string()));
    row.insert("created_by".into(), Value::String(created_by.0.clone()));
    row
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

pub fn notification_from_row(row: &Row) -> Result<Notification, RecordError> {
    Ok(Notification {
        id: text(row, "id")?,
        user: UserId(text(row, "user_id")?),
        message: text(row, "message")?,
        read: flag(row, "is_read")?,
        created_at: timestamp(row, "created_at")?,
    })
}

pub fn read_patch() -> Row {
    let mut row = Row::new();
    row.insert("is_read".into(), Value::Bool(true));
    row
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

pub fn schedule_from_row(row: &Row) -> Result<ScheduleEntry, RecordError> {
    Ok(ScheduleEntry {
        id: text(row, "id")?,
        class_name: text(row, "kelas")?,
        subject: text(row, "mata_pelajaran")?,
        teacher: text(row, "guru")?,
        day: text(row, "hari")?,
        starts: text(row, "jam_mulai")?,
        ends: text(row, "jam_selesai")?,
        room: opt_text(row, "ruangan")?,
    })
}
