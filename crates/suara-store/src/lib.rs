//! # suara-store
//!
//! In-memory caches for the portal's collections. There is no local
//! persistence: caches are built when an identity signs in, kept in sync by
//! the change feed (keyed merge with a version guard, full reload as the
//! fallback), and discarded at sign-out.

pub mod chats;
pub mod collection;
pub mod directory;

pub use chats::Chats;
pub use collection::{Collection, InsertOrder, Keyed};
pub use directory::Directory;
