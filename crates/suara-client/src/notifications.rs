//! Notification service.
//!
//! Loads the signed-in user's notifications newest-first and keeps them
//! current through a single insert subscription filtered to that user.
//! Pushed payloads are applied directly; the unread count is always
//! derived from the cache, never tracked separately.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use suara_remote::{ChangeKind, Filter, Query, Remote, RowChange, SubscriptionSpec};
use suara_shared::models::Notification;
use suara_shared::{records, UserId};
use suara_store::{Collection, InsertOrder};

use crate::error::Result;
use crate::events::{EventBus, PortalEvent};

const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

pub struct NotificationService {
    remote: Arc<dyn Remote>,
    events: EventBus,
    user: UserId,
    cache: RwLock<Collection<Notification>>,
}

impl NotificationService {
    pub fn new(remote: Arc<dyn Remote>, events: EventBus, user: UserId) -> Self {
        Self {
            remote,
            events,
            user,
            cache: RwLock::new(Collection::new(InsertOrder::NewestFirst)),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Collection<Notification>> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Collection<Notification>> {
        self.cache.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn all(&self) -> Vec<Notification> {
        self.read().to_vec()
    }

    /// Derived by recount; never stored where it could drift from the list.
    pub fn unread_count(&self) -> usize {
        self.read().items().iter().filter(|n| !n.read).count()
    }

    /// Load the user's notifications, newest first.
    pub async fn load(&self) -> Result<()> {
        let rows = self
            .remote
            .select(
                records::TABLE_NOTIFICATIONS,
                Query::new()
                    .eq("user_id", self.user.as_str())
                    .order_desc("created_at"),
            )
            .await?;

        let notifications: Vec<Notification> = rows
            .iter()
            .filter_map(|row| match records::notification_from_row(row) {
                Ok(notification) => Some(notification),
                Err(e) => {
                    warn!(error = %e, "skipping malformed notification row");
                    None
                }
            })
            .collect();

        self.write().replace_all(notifications);
        self.events.emit(PortalEvent::NotificationsChanged);
        Ok(())
    }

    /// Apply one pushed notification.
    fn push(&self, notification: Notification) {
        if notification.user != self.user {
            return;
        }
        self.write().prepend(notification.clone());
        self.events
            .emit(PortalEvent::NotificationArrived(notification));
    }

    /// Mark every unread notification as read, in one batch.
    ///
    /// Confirmed-write: if the batch update fails remotely, no local read
    /// flag changes.
    pub async fn mark_all_read(&self) -> Result<()> {
        let unread: Vec<Value> = self
            .read()
            .items()
            .iter()
            .filter(|n| !n.read)
            .map(|n| Value::String(n.id.clone()))
            .collect();
        if unread.is_empty() {
            return Ok(());
        }

        self.remote
            .update(
                records::TABLE_NOTIFICATIONS,
                vec![Filter::In("id".into(), unread.clone())],
                records::read_patch(),
            )
            .await?;

        let mut cache = self.write();
        for id in unread.iter().filter_map(Value::as_str) {
            cache.patch(id, |notification| notification.read = true);
        }
        drop(cache);

        self.events.emit(PortalEvent::NotificationsChanged);
        Ok(())
    }

    /// Spawn the insert-filtered feed task, scoped to the session's
    /// cancellation token.
    pub fn spawn_feed(self: &Arc<Self>, cancel: &CancellationToken) {
        let service = Arc::clone(self);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            service.run_feed(cancel).await;
        });
    }

    async fn run_feed(&self, cancel: CancellationToken) {
        let spec = SubscriptionSpec::filtered(
            records::TABLE_NOTIFICATIONS,
            "user_id",
            self.user.as_str(),
        );

        loop {
            let subscribed = tokio::select! {
                _ = cancel.cancelled() => return,
                result = self.remote.subscribe(spec.clone()) => result,
            };

            let mut rx = match subscribed {
                Ok(rx) => rx,
                Err(e) => {
                    warn!(error = %e, "notification subscribe failed");
                    self.events.emit(PortalEvent::FeedLost {
                        table: records::TABLE_NOTIFICATIONS.to_string(),
                    });
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RESUBSCRIBE_DELAY) => continue,
                    }
                }
            };

            if let Err(e) = self.load().await {
                warn!(error = %e, "notification reload after subscribe failed");
            }

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    change = rx.recv() => match change {
                        Some(change) => self.handle_change(change).await,
                        None => {
                            info!("notification feed lost");
                            self.events.emit(PortalEvent::FeedLost {
                                table: records::TABLE_NOTIFICATIONS.to_string(),
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

    async fn handle_change(&self, change: RowChange) {
        let parsed = change
            .row
            .as_ref()
            .and_then(|row| records::notification_from_row(row).ok());

        match parsed {
            Some(notification) if change.kind == ChangeKind::Insert => self.push(notification),
            // Anything else (missing payload, edits from elsewhere) falls
            // back to a reload.
            _ => {
                if let Err(e) = self.load().await {
                    warn!(error = %e, "notification fallback reload failed");
                }
            }
        }
    }
}
