//! Event bus between the services and an embedding UI.
//!
//! Events are notifications to re-read the caches, not data carriers (the
//! one exception is a pushed notification, which arrives fully formed).
//! Receivers that lag simply miss events; the caches stay authoritative.

use tokio::sync::broadcast;

use suara_shared::models::Notification;

const EVENT_BUFFER: usize = 128;

#[derive(Debug, Clone)]
pub enum PortalEvent {
    /// Identity appeared, changed (points, badges, profile) or went away.
    SessionChanged,
    ComplaintsChanged,
    NewsChanged,
    MessagesChanged,
    ChatsChanged,
    SchedulesChanged,
    DirectoryChanged,
    NotificationsChanged,
    /// A notification was pushed for the signed-in user.
    NotificationArrived(Notification),
    /// A change feed dropped; the service reloads and re-subscribes.
    FeedLost { table: String },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PortalEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PortalEvent> {
        self.tx.subscribe()
    }

    /// Emit to whoever is listening. Having no listeners is normal.
    pub fn emit(&self, event: PortalEvent) {
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
