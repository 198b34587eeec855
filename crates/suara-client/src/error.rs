use thiserror::Error;

use suara_remote::RemoteError;
use suara_shared::{RecordError, ValidationError};

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PortalError>;

/// Errors surfaced by the service layer.
///
/// No service call panics or lets an error escape unclassified: remote
/// failures keep their retry classification, validation failures never
/// reach the network, and policy rejections are explicit.
#[derive(Error, Debug)]
pub enum PortalError {
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("record mapping error: {0}")]
    Record(#[from] RecordError),

    #[error("not signed in")]
    NotSignedIn,

    /// No `users` row backs the authenticated identity. Unlike a transient
    /// remote failure, this forces re-authentication.
    #[error("profile not found for the signed-in identity")]
    ProfileMissing,

    /// Client-side role gate. A UX convenience only: the hosted store's
    /// policy layer is the real enforcement point.
    #[error("the current role may not perform this action")]
    PermissionDenied,

    #[error("unknown chat `{0}`")]
    UnknownChat(String),

    #[error("unknown complaint `{0}`")]
    UnknownComplaint(String),

    #[error("unknown post `{0}`")]
    UnknownPost(String),

    #[error("complaint status may only move forward")]
    InvalidTransition,
}
