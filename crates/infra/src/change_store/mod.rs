//! Persistence boundary for review sessions.
//!
//! Sessions are requested by organization + invoice and come back as ordered
//! records. Writes carry one full record per transition, guarded by an
//! optimistic version expectation.

pub mod in_memory;
pub mod r#trait;

pub use in_memory::InMemoryChangeStore;
pub use r#trait::{ChangeStore, SessionRecords, StoreError};
