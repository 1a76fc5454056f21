//! Storage for guild registrations and per-guild configuration.
//!
//! Two backends implement the store traits:
//! - **`SQLite`**: durable storage used by the binary
//! - **Memory**: process-local storage for tests and embedding

// Connection guards span each statement.
#![allow(clippy::significant_drop_tightening)]

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryGuildStore;
pub use sqlite::SqliteGuildStore;
pub use traits::{RegistrationStore, RestrictionStore};
