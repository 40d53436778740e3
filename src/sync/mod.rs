pub mod config;
pub mod events;
pub mod remote;
pub mod webdav;

mod manager;
mod reconcile;
mod scheduler;

pub use config::{
    ConfigError, ConfigSource, ConnectionSettings, MemorySettings, SettingsFile, SyncCredentials,
    SyncPolicy, SyncReport, SyncSettings, SyncState, SyncStatus, DEFAULT_SYNC_INTERVAL_MINUTES,
};
pub use events::{EventEmitter, SyncEvent};
pub use manager::{SyncError, SyncManager, NOT_CONFIGURED_MESSAGE};
pub use reconcile::{resolve_conflict, Reconciler};
pub use remote::{webdav_factory, RemoteFactory, RemoteStore};
pub use webdav::{WebDavClient, WebDavError};
