//! `dirsync-directory` — identity store boundary.
//!
//! The directory is the authoritative "current state" a provisioning run
//! reconciles against. This crate owns the record shape, the minimal-diff
//! representation for updates, and the store abstraction; it knows nothing
//! about jobs or CSV.

pub mod record;
pub mod store;

pub use record::{FieldDiff, IdentityRecord};
pub use store::{DirectoryStore, InMemoryDirectoryStore, StoreError};
