//! WebDAV note synchronization.
//!
//! Notes live as plain text files locally ([`storage::LocalStorage`]) and as
//! JSON documents in a WebDAV collection. [`sync::SyncManager`] keeps the two
//! replicas converged with periodic, debounced and on-demand passes.

pub mod storage;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use storage::{LocalStorage, Note, NoteCollection, NoteStorage, NoteStore, NoteType};
pub use sync::{SettingsFile, SyncEvent, SyncManager, SyncReport, SyncSettings, SyncStatus};
