//! Domain entities as seen by the client.
//!
//! Field names are English; the hosted store's Indonesian column names are
//! confined to [`crate::records`]. Every struct derives `Serialize` /
//! `Deserialize` (camelCase) so an embedding shell can hand them to its UI
//! layer unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChatId, GroupId, UserId};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// Fixed role set. Assigned at registration and never changed afterwards;
/// there is no role-change flow.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    #[serde(rename = "siswa")]
    Student,
    #[serde(rename = "guru")]
    Teacher,
    #[serde(rename = "osis")]
    StudentCouncil,
    #[serde(rename = "admin")]
    Admin,
}

impl Role {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Role::Student => "siswa",
            Role::Teacher => "guru",
            Role::StudentCouncil => "osis",
            Role::Admin => "admin",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "siswa" => Some(Role::Student),
            "guru" => Some(Role::Teacher),
            "osis" => Some(Role::StudentCouncil),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// The signed-in user's profile, assembled from the `users` row, the
/// best-effort `leaderboard` row and the auth session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    /// NIK/NIS number the user signs in with.
    pub identifier: String,
    /// Public display code shown instead of the NIK/NIS.
    pub display_code: String,
    pub role: Role,
    pub points: i64,
    /// Earned badge names. Client-local: the hosted schema has no badge
    /// column yet.
    pub badges: Vec<String>,
    pub class_name: Option<String>,
    pub email: Option<String>,
}

/// Registration input.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub identifier: String,
    pub name: String,
    pub role: Role,
    pub class_name: Option<String>,
    pub secret: String,
}

/// Another user, as listed for chat creation and name resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryEntry {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub class_name: Option<String>,
    pub display_code: String,
}

// ---------------------------------------------------------------------------
// Complaints
// ---------------------------------------------------------------------------

/// Complaint lifecycle. Transitions only move forward; see [`Self::allows`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComplaintStatus {
    #[serde(rename = "diterima")]
    Received,
    #[serde(rename = "diproses")]
    InProgress,
    #[serde(rename = "selesai")]
    Resolved,
}

impl ComplaintStatus {
    pub fn as_wire(&self) -> &'static str {
        match self {
            ComplaintStatus::Received => "diterima",
            ComplaintStatus::InProgress => "diproses",
            ComplaintStatus::Resolved => "selesai",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "diterima" => Some(ComplaintStatus::Received),
            "diproses" => Some(ComplaintStatus::InProgress),
            "selesai" => Some(ComplaintStatus::Resolved),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ComplaintStatus::Received => 0,
            ComplaintStatus::InProgress => 1,
            ComplaintStatus::Resolved => 2,
        }
    }

    /// Whether a transition to `next` is allowed. Same-state transitions
    /// are permitted as no-ops; regressions (including anything out of
    /// `Resolved`) are not.
    pub fn allows(&self, next: ComplaintStatus) -> bool {
        next.rank() >= self.rank()
    }
}

/// A complaint on the reporting board. Never deleted; only its status
/// changes, and only by an admin actor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Complaint {
    pub id: String,
    pub category: String,
    pub body: String,
    pub status: ComplaintStatus,
    /// Present iff the complaint is not anonymous.
    pub author: Option<UserId>,
    pub evidence_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Complaint {
    pub fn is_anonymous(&self) -> bool {
        self.author.is_none()
    }
}

// ---------------------------------------------------------------------------
// News
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NewsCategory {
    #[serde(rename = "event")]
    Event,
    #[serde(rename = "pengumuman")]
    Announcement,
    #[serde(rename = "prestasi")]
    Achievement,
    #[serde(rename = "meme")]
    Meme,
}

impl NewsCategory {
    pub fn as_wire(&self) -> &'static str {
        match self {
            NewsCategory::Event => "event",
            NewsCategory::Announcement => "pengumuman",
            NewsCategory::Achievement => "prestasi",
            NewsCategory::Meme => "meme",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "event" => Some(NewsCategory::Event),
            "pengumuman" => Some(NewsCategory::Announcement),
            "prestasi" => Some(NewsCategory::Achievement),
            "meme" => Some(NewsCategory::Meme),
            _ => None,
        }
    }
}

/// A news-feed item. Likes and comments are client-local in this version:
/// the hosted schema has no backing tables for them yet.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewsPost {
    pub id: String,
    pub title: String,
    pub body: String,
    pub category: NewsCategory,
    pub author: UserId,
    pub media: Vec<String>,
    pub likes: u32,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
}

/// A comment under a news post. Client-local, like the post's like count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author: UserId,
    pub author_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Where a message is going. Exactly one destination per message: either a
/// direct recipient or a group, never both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MessageTarget {
    Direct(UserId),
    Group(GroupId),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: UserId,
    pub target: MessageTarget,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// The conversation this message belongs to.
    pub fn chat_id(&self) -> ChatId {
        match &self.target {
            MessageTarget::Direct(recipient) => ChatId::private(&self.sender, recipient),
            MessageTarget::Group(group) => ChatId::from(group),
        }
    }
}

/// A group-chat row in the hosted store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupChat {
    pub id: GroupId,
    pub name: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ChatKind {
    Private,
    Group,
}

/// A conversation as shown in the chat list. Derived, not persisted: group
/// chats come from `chat_group` rows, private chats are projected from the
/// message history. The unread counter is client-local.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub kind: ChatKind,
    pub participants: Vec<UserId>,
    pub last_message: Option<ChatMessage>,
    pub unread: u32,
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user: UserId,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// One timetable slot. Times are the store's opaque `HH:MM` strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub id: String,
    pub class_name: String,
    pub subject: String,
    pub teacher: String,
    pub day: String,
    pub starts: String,
    pub ends: String,
    pub room: Option<String>,
}
