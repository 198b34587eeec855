use thiserror::Error;

/// Failure while mapping a wire row to a domain model (or back).
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("missing field `{0}`")]
    Missing(&'static str),

    #[error("invalid value in field `{0}`")]
    Invalid(&'static str),

    /// A chat-message row must reference exactly one of a direct recipient
    /// and a group.
    #[error("message row has no destination, or both a recipient and a group")]
    AmbiguousTarget,
}

/// Input rejected before any remote call is made.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("password must be at least {0} characters")]
    PasswordTooShort(usize),
}
