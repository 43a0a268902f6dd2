//! Staff accounts: credentials, session tokens and profile changes.

pub mod service;
pub mod store;

pub use service::{AccountService, AuthError, ProfileUpdate};
pub use store::{AccountStore, MemoryAccountStore, PgAccountStore};
