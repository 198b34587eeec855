//! # suara-client
//!
//! Service layer of the Suara portal client: the session, data and
//! notification services, the event bus an embedding UI subscribes to, and
//! the [`Portal`] facade that ties their lifecycles to the authenticated
//! identity.
//!
//! Services are explicit injected objects, constructed per signed-in
//! session and torn down (background feed tasks included) at sign-out.

pub mod data;
pub mod events;
pub mod notifications;
pub mod portal;
pub mod session;

mod error;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{fmt, EnvFilter};

pub use error::{PortalError, Result};
pub use events::{EventBus, PortalEvent};
pub use portal::Portal;

/// Initialise tracing for an embedding shell.
///
/// Honors `RUST_LOG`; defaults to debug for the portal crates and warn for
/// everything else.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("suara_client=debug,suara_remote=debug,suara_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
