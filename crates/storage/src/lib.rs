//! Storage abstraction and implementations for snaphunt.
//!
//! This crate provides a trait-based interface over the catalog, user
//! accounts and submitted evidence with a SQLite implementation, plus a
//! file store for image and evidence bytes.

#![warn(missing_docs)]

pub mod trait_;
pub mod sqlite_storage;
pub mod file_store;

pub use trait_::{Storage, StorageError, Result, NewSet, NewSetImage};
pub use sqlite_storage::SqliteStorage;
pub use file_store::FileStore;
