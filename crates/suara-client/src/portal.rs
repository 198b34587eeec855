//! The portal facade.
//!
//! Owns the injected services and ties their lifecycles to the identity:
//! signing in constructs the data and notification services, bulk-loads
//! their caches and spawns the feed tasks under a fresh cancellation
//! token; signing out cancels the token and drops the services. Nothing
//! here is a global: embedders construct a `Portal` and pass it around.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use suara_remote::Remote;
use suara_shared::models::NewAccount;

use crate::data::DataService;
use crate::error::{PortalError, Result};
use crate::events::{EventBus, PortalEvent};
use crate::notifications::NotificationService;
use crate::session::SessionService;

struct ActiveSession {
    data: Arc<DataService>,
    notifications: Arc<NotificationService>,
    cancel: CancellationToken,
}

pub struct Portal {
    remote: Arc<dyn Remote>,
    events: EventBus,
    session: SessionService,
    active: RwLock<Option<ActiveSession>>,
}

impl Portal {
    pub fn new(remote: Arc<dyn Remote>) -> Self {
        let events = EventBus::new();
        let session = SessionService::new(Arc::clone(&remote), events.clone());
        Self {
            remote,
            events,
            session,
            active: RwLock::new(None),
        }
    }

    /// Subscribe to portal events. Each caller gets an independent stream.
    pub fn events(&self) -> broadcast::Receiver<PortalEvent> {
        self.events.subscribe()
    }

    pub fn session(&self) -> &SessionService {
        &self.session
    }

    /// The data service of the signed-in session, if one is running.
    pub fn data(&self) -> Option<Arc<DataService>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| Arc::clone(&active.data))
    }

    /// The notification service of the signed-in session, if one is running.
    pub fn notifications(&self) -> Option<Arc<NotificationService>> {
        self.active
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|active| Arc::clone(&active.notifications))
    }

    /// Sign in and, on success, bring up the per-session services.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<bool> {
        if !self.session.sign_in(identifier, secret).await? {
            return Ok(false);
        }
        self.start().await?;
        Ok(true)
    }

    /// Register a new account and bring up the per-session services.
    pub async fn register(&self, account: NewAccount) -> Result<bool> {
        if !self.session.sign_up(account).await? {
            return Ok(false);
        }
        self.start().await?;
        Ok(true)
    }

    /// (Re)build the per-session services for the signed-in identity.
    ///
    /// Also the retry path when the initial bulk load failed on a
    /// transient error: the session survives such failures, so embedders
    /// call this again instead of forcing a re-login.
    pub async fn resync(&self) -> Result<()> {
        self.start().await
    }

    async fn start(&self) -> Result<()> {
        let profile = self.session.current().ok_or(PortalError::NotSignedIn)?;
        let cancel = CancellationToken::new();

        let data = Arc::new(DataService::new(
            Arc::clone(&self.remote),
            self.events.clone(),
            profile.clone(),
        ));
        data.load_all().await?;
        data.spawn_feeds(&cancel);

        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&self.remote),
            self.events.clone(),
            profile.id.clone(),
        ));
        notifications.load().await?;
        notifications.spawn_feed(&cancel);

        let previous = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(ActiveSession {
                data,
                notifications,
                cancel,
            });
        if let Some(previous) = previous {
            warn!("replacing a running session");
            previous.cancel.cancel();
        }
        Ok(())
    }

    /// Tear down the session: cancel every feed task, drop the services,
    /// clear the identity.
    pub async fn sign_out(&self) {
        let previous = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
        self.session.sign_out().await;
    }
}

impl Drop for Portal {
    fn drop(&mut self) {
        if let Some(active) = self
            .active
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            active.cancel.cancel();
        }
    }
}
