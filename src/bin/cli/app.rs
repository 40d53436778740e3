use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use notesync_lib::storage::{LocalStorage, NoteStore};
use notesync_lib::sync::{
    webdav_factory, ConfigSource, SettingsFile, SyncManager, SyncPolicy, SyncSettings, WebDavClient,
};

/// Shared application state for CLI commands
pub struct App {
    pub settings_path: PathBuf,
    pub storage: Arc<LocalStorage>,
    pub collection: Arc<NoteStore>,
}

impl App {
    /// Resolve paths and load the notes folder
    pub fn new(config: Option<PathBuf>, notes_dir: Option<PathBuf>) -> Result<Self> {
        let settings_path = match config {
            Some(path) => path,
            None => SettingsFile::default_path().context("Failed to get config directory")?,
        };
        let notes_dir = match notes_dir {
            Some(path) => path,
            None => LocalStorage::default_data_dir().context("Failed to get data directory")?,
        };

        let storage = LocalStorage::new(notes_dir);
        storage
            .init()
            .with_context(|| format!("Failed to create {}", storage.base_path().display()))?;
        let collection = NoteStore::load_from(&storage).context("Failed to load local notes")?;

        Ok(Self {
            settings_path,
            storage: Arc::new(storage),
            collection: Arc::new(collection),
        })
    }

    pub fn settings_file(&self) -> SettingsFile {
        SettingsFile::new(self.settings_path.clone())
    }

    pub fn settings(&self) -> Result<SyncSettings> {
        self.settings_file()
            .load()
            .with_context(|| format!("Failed to read {}", self.settings_path.display()))
    }

    /// Start a sync engine over the local notes and the settings file.
    /// The notes folder is edited directly, so it is re-read before each pass.
    pub fn manager(&self) -> SyncManager {
        let policy = SyncPolicy {
            reload_local_before_sync: true,
            ..SyncPolicy::default()
        };
        SyncManager::start_with(
            Arc::new(self.settings_file()),
            self.collection.clone(),
            self.storage.clone(),
            policy,
            webdav_factory(),
        )
    }

    /// A client for direct server queries, regardless of the enabled flag
    pub fn client(&self) -> Result<WebDavClient> {
        let connection = self.settings()?.connection();
        if connection.server_address.is_empty() {
            bail!("No server configured. Run `notesync-cli configure --server <url>`");
        }
        WebDavClient::new(&connection.server_address, &connection.credentials)
            .context("Invalid server address")
    }

    /// Fail with a hint when sync is switched off
    pub fn require_enabled(&self) -> Result<()> {
        if !self.settings()?.enabled {
            bail!("Sync is disabled. Run `notesync-cli configure --enable`");
        }
        Ok(())
    }
}
