//! Session service: identity lifecycle and the profile-backed state.
//!
//! Sign-in resolves the NIK/NIS identifier to a `users` row first, then
//! authenticates against the managed provider with the derived login email.
//! Bad credentials and unknown identifiers are reported as `Ok(false)`, not
//! as errors; only transport and platform failures become `Err`.

use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{info, warn};

use suara_remote::{Filter, Query, Remote, Row};
use suara_shared::auth::{generate_display_code, login_email};
use suara_shared::models::{NewAccount, UserProfile};
use suara_shared::{records, validate};

use crate::error::{PortalError, Result};
use crate::events::{EventBus, PortalEvent};

type CodeGenerator = Box<dyn Fn() -> String + Send + Sync>;

pub struct SessionService {
    remote: Arc<dyn Remote>,
    events: EventBus,
    profile: RwLock<Option<UserProfile>>,
    code_gen: CodeGenerator,
}

impl SessionService {
    pub fn new(remote: Arc<dyn Remote>, events: EventBus) -> Self {
        Self {
            remote,
            events,
            profile: RwLock::new(None),
            code_gen: Box::new(|| generate_display_code(&mut rand::thread_rng())),
        }
    }

    /// Replace the display-code generator. Tests use this to force
    /// collisions deterministically.
    pub fn with_code_generator(mut self, code_gen: CodeGenerator) -> Self {
        self.code_gen = code_gen;
        self
    }

    /// Snapshot of the signed-in profile, if any.
    pub fn current(&self) -> Option<UserProfile> {
        self.profile
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.current().is_some()
    }

    fn set_profile(&self, profile: Option<UserProfile>) {
        *self
            .profile
            .write()
            .unwrap_or_else(PoisonError::into_inner) = profile;
        self.events.emit(PortalEvent::SessionChanged);
    }

    // -- Sign-in / registration -----------------------------------------

    /// Authenticate. `Ok(false)` means the identifier is unknown, the
    /// password is wrong, or no profile row backs the identity.
    pub async fn sign_in(&self, identifier: &str, secret: &str) -> Result<bool> {
        validate::credentials(identifier, secret)?;

        // Resolve the identifier before touching the auth provider, so an
        // unknown NIK/NIS fails without burning an auth attempt.
        let known = self
            .remote
            .select(
                records::TABLE_USERS,
                Query::new().eq("nik_nis", identifier).limit(1),
            )
            .await?;
        if known.is_empty() {
            info!(identifier, "sign-in for unknown identifier");
            return Ok(false);
        }

        let session = match self
            .remote
            .sign_in(&login_email(identifier), secret)
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_credential_failure() => {
                info!(identifier, "sign-in rejected");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        match self.load_profile(&session.user_id, &session.email).await {
            Ok(profile) => {
                info!(user = %profile.id, role = profile.role.as_wire(), "signed in");
                self.set_profile(Some(profile));
                Ok(true)
            }
            Err(PortalError::ProfileMissing) => {
                warn!(user = %session.user_id, "authenticated identity has no profile row");
                self.set_profile(None);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Register a new identity plus its two dependent rows. The profile row
    /// is mandatory; the leaderboard row is best-effort.
    pub async fn sign_up(&self, account: NewAccount) -> Result<bool> {
        validate::account(&account)?;

        let display_code = self.unique_display_code().await?;

        let mut metadata = Row::new();
        metadata.insert("name".into(), Value::String(account.name.clone()));
        metadata.insert("nik_nis".into(), Value::String(account.identifier.clone()));
        metadata.insert("role".into(), Value::String(account.role.as_wire().into()));
        metadata.insert(
            "kelas".into(),
            account
                .class_name
                .as_ref()
                .map(|k| Value::String(k.clone()))
                .unwrap_or(Value::Null),
        );

        let session = match self
            .remote
            .sign_up(&login_email(&account.identifier), &account.secret, metadata)
            .await
        {
            Ok(session) => session,
            Err(e) if e.is_credential_failure() => {
                info!(identifier = %account.identifier, "registration rejected");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        // The profile row is what the rest of the portal reads; failing to
        // create it fails the registration.
        self.remote
            .insert(
                records::TABLE_USERS,
                records::new_user_row(&session.user_id, &account, &display_code),
            )
            .await?;

        let user_id = suara_shared::UserId(session.user_id.clone());
        if let Err(e) = self
            .remote
            .insert(records::TABLE_LEADERBOARD, records::new_leaderboard_row(&user_id))
            .await
        {
            warn!(user = %session.user_id, error = %e, "leaderboard row creation failed");
        }

        let profile = self.load_profile(&session.user_id, &session.email).await?;
        info!(user = %profile.id, "registered");
        self.set_profile(Some(profile));
        Ok(true)
    }

    /// Generate display codes until the `users` table confirms one unused.
    async fn unique_display_code(&self) -> Result<String> {
        loop {
            let code = (self.code_gen)();
            let taken = self
                .remote
                .select(
                    records::TABLE_USERS,
                    Query::new().eq("display_id", code.as_str()).limit(1),
                )
                .await?;
            if taken.is_empty() {
                return Ok(code);
            }
            info!(code, "display code collision; regenerating");
        }
    }

    /// Load the profile backing an authenticated identity.
    ///
    /// A missing `users` row is [`PortalError::ProfileMissing`]; transient
    /// failures keep their remote classification so callers can tell the
    /// two apart. The leaderboard read is best-effort.
    async fn load_profile(&self, user_id: &str, email: &str) -> Result<UserProfile> {
        let rows = self
            .remote
            .select(records::TABLE_USERS, Query::new().eq("id", user_id).limit(1))
            .await?;
        let row = rows.first().ok_or(PortalError::ProfileMissing)?;
        let mut profile = records::user_profile_from_row(row)?;

        match self
            .remote
            .select(
                records::TABLE_LEADERBOARD,
                Query::new().eq("user_id", user_id).limit(1),
            )
            .await
        {
            Ok(rows) => profile.points = rows.first().map(records::points_from_row).unwrap_or(0),
            Err(e) => warn!(user = user_id, error = %e, "leaderboard load failed"),
        }

        if !email.is_empty() {
            profile.email = Some(email.to_string());
        }
        Ok(profile)
    }

    /// Re-read the profile from the store.
    ///
    /// A missing row signs the user out (the identity no longer exists); a
    /// transport failure leaves the current session in place and surfaces
    /// the error for retry.
    pub async fn refresh_profile(&self) -> Result<()> {
        let current = self.current().ok_or(PortalError::NotSignedIn)?;
        let email = current.email.clone().unwrap_or_default();

        match self.load_profile(current.id.as_str(), &email).await {
            Ok(mut profile) => {
                // Badges are client-local; carry them across the refresh.
                profile.badges = current.badges;
                self.set_profile(Some(profile));
                Ok(())
            }
            Err(PortalError::ProfileMissing) => {
                warn!(user = %current.id, "profile row gone; signing out");
                self.set_profile(None);
                Err(PortalError::ProfileMissing)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn sign_out(&self) {
        if let Err(e) = self.remote.sign_out().await {
            warn!(error = %e, "remote sign-out failed");
        }
        self.set_profile(None);
        info!("signed out");
    }

    // -- Profile mutations ----------------------------------------------

    /// Add `delta` to the user's points. Confirmed-write: the local profile
    /// changes only after the leaderboard row does. Returns the new total.
    pub async fn update_points(&self, delta: i64) -> Result<i64> {
        let current = self.current().ok_or(PortalError::NotSignedIn)?;
        let points = current.points + delta;

        self.remote
            .update(
                records::TABLE_LEADERBOARD,
                vec![Filter::Eq("user_id".into(), Value::String(current.id.0.clone()))],
                records::points_patch(points),
            )
            .await?;

        let mut updated = current;
        updated.points = points;
        self.set_profile(Some(updated));
        Ok(points)
    }

    /// Record an earned badge. Client-local: the hosted schema has no badge
    /// storage yet. Returns false if the badge was already held.
    pub fn add_badge(&self, badge: &str) -> bool {
        let mut guard = self.profile.write().unwrap_or_else(PoisonError::into_inner);
        let Some(profile) = guard.as_mut() else {
            return false;
        };
        if profile.badges.iter().any(|b| b == badge) {
            return false;
        }
        profile.badges.push(badge.to_string());
        drop(guard);

        self.events.emit(PortalEvent::SessionChanged);
        true
    }

    /// Update the editable profile fields.
    pub async fn update_profile(&self, name: &str, class_name: Option<&str>) -> Result<()> {
        validate::display_name(name)?;
        let current = self.current().ok_or(PortalError::NotSignedIn)?;

        self.remote
            .update(
                records::TABLE_USERS,
                vec![Filter::Eq("id".into(), Value::String(current.id.0.clone()))],
                records::profile_patch(name, class_name),
            )
            .await?;

        let mut updated = current;
        updated.name = name.to_string();
        updated.class_name = class_name.map(str::to_string);
        self.set_profile(Some(updated));
        Ok(())
    }

    /// Change the account password with the managed provider.
    pub async fn change_password(&self, new_secret: &str) -> Result<()> {
        validate::password(new_secret)?;
        if !self.is_signed_in() {
            return Err(PortalError::NotSignedIn);
        }
        self.remote.change_password(new_secret).await?;
        Ok(())
    }
}
