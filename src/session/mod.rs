//! Connect / disconnect / restore of the user's confidential wallet.
//!
//! One [`SessionRecord`] per profile, stored under a fixed key. Restoring
//! requires the caller to be the same public account that connected.

pub mod manager;
pub mod store;
pub mod types;

pub use manager::SessionManager;
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};
pub use types::{SessionError, SessionRecord, SessionResult};
