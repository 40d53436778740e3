use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default periodic sync interval
pub const DEFAULT_SYNC_INTERVAL_MINUTES: u32 = 5;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config directory not found")]
    ConfigDirNotFound,
}

/// WebDAV sync settings as persisted by the application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// Whether sync is enabled
    pub enabled: bool,
    /// WebDAV collection holding the notes (e.g. "https://cloud.example.com/remote.php/dav/files/user/notes/")
    pub server_address: String,
    pub username: String,
    pub password: String,
    /// Periodic sync interval in minutes
    pub sync_interval_minutes: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            server_address: String::new(),
            username: String::new(),
            password: String::new(),
            sync_interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
        }
    }
}

impl SyncSettings {
    /// The parts of the settings a remote client is built from
    pub fn connection(&self) -> ConnectionSettings {
        ConnectionSettings {
            server_address: self.server_address.trim().to_string(),
            credentials: SyncCredentials {
                username: self.username.clone(),
                password: self.password.clone(),
            },
        }
    }
}

/// Credentials for WebDAV authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCredentials {
    pub username: String,
    pub password: String,
}

/// Server address plus credentials. A change here means a new remote client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub server_address: String,
    pub credentials: SyncCredentials,
}

/// Source of truth for sync settings, re-read before every sync-triggering action
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<SyncSettings, ConfigError>;
}

/// Settings stored as a TOML file
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the default settings file location
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|p| p.join("notesync").join("settings.toml"))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write settings to the file, creating parent directories
    pub fn save(&self, settings: &SyncSettings) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, data)?;
        // Restrict permissions on Unix, the file holds a password
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(&self.path, mode) {
                log::warn!(
                    "Sync: could not restrict permissions on {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
        Ok(())
    }
}

impl ConfigSource for SettingsFile {
    /// A missing file means default (disabled) settings
    fn load(&self) -> Result<SyncSettings, ConfigError> {
        if !self.path.exists() {
            return Ok(SyncSettings::default());
        }
        let data = std::fs::read_to_string(&self.path)?;
        Ok(toml::from_str(&data)?)
    }
}

/// Shared in-memory settings, for embedding applications and tests
#[derive(Clone, Default)]
pub struct MemorySettings {
    inner: Arc<Mutex<SyncSettings>>,
}

impl MemorySettings {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn set(&self, settings: SyncSettings) {
        *self.inner.lock().unwrap() = settings;
    }

    pub fn update(&self, f: impl FnOnce(&mut SyncSettings)) {
        f(&mut self.inner.lock().unwrap());
    }
}

impl ConfigSource for MemorySettings {
    fn load(&self) -> Result<SyncSettings, ConfigError> {
        Ok(self.inner.lock().unwrap().clone())
    }
}

/// Tunable reconciliation and scheduling constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Remote must be newer than local by more than this to be downloaded
    pub download_tolerance: Duration,
    /// Local must be newer than remote by more than this to be uploaded
    pub upload_tolerance: Duration,
    /// Quiet period before a search-triggered sync runs
    pub debounce_delay: Duration,
    /// Floor applied to any configured interval
    pub min_interval_minutes: u32,
    /// Bound on each individual WebDAV request
    pub request_timeout: Duration,
    /// Re-read local storage into the collection before each pass, for
    /// hosts where the files are edited outside the collection
    pub reload_local_before_sync: bool,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            download_tolerance: Duration::from_secs(3),
            upload_tolerance: Duration::ZERO,
            debounce_delay: Duration::from_millis(500),
            min_interval_minutes: 1,
            request_timeout: Duration::from_secs(10),
            reload_local_before_sync: false,
        }
    }
}

impl SyncPolicy {
    /// Configured interval with the minimum floor applied
    pub fn effective_interval_minutes(&self, requested: u32) -> u32 {
        requested.max(self.min_interval_minutes).max(1)
    }
}

/// Current orchestrator state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Sync is off: no timer, no remote client
    Disabled,
    /// Timer armed, waiting for the next trigger
    Idle,
    /// A reconciliation pass is running
    Syncing,
}

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// False only when the pass could not run at all
    pub success: bool,
    /// Notes added or replaced locally from the remote
    pub notes_downloaded: usize,
    /// Notes written to the remote
    pub notes_uploaded: usize,
    /// Per-note operations that failed and were skipped
    pub failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn success(
        notes_downloaded: usize,
        notes_uploaded: usize,
        failures: usize,
        duration_ms: u64,
    ) -> Self {
        Self {
            success: true,
            notes_downloaded,
            notes_uploaded,
            failures,
            error: None,
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            notes_downloaded: 0,
            notes_uploaded: 0,
            failures: 0,
            error: Some(message),
            duration_ms: 0,
            finished_at: Utc::now(),
        }
    }
}

/// Queryable snapshot of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub state: SyncState,
    /// Completion time of the last pass that ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_report: Option<SyncReport>,
    pub interval_minutes: u32,
    pub pending_debounced_sync: bool,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::Disabled,
            last_sync: None,
            last_error: None,
            last_report: None,
            interval_minutes: DEFAULT_SYNC_INTERVAL_MINUTES,
            pending_debounced_sync: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let file = SettingsFile::new(temp_dir.path().join("nested").join("settings.toml"));

        let settings = SyncSettings {
            enabled: true,
            server_address: "https://dav.example.com/notes/".into(),
            username: "alice".into(),
            password: "secret".into(),
            sync_interval_minutes: 15,
        };
        file.save(&settings).unwrap();

        assert_eq!(file.load().unwrap(), settings);
    }

    #[cfg(unix)]
    #[test]
    fn test_saved_settings_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let file = SettingsFile::new(temp_dir.path().join("settings.toml"));
        std::fs::write(file.path(), "").unwrap();
        std::fs::set_permissions(file.path(), std::fs::Permissions::from_mode(0o644)).unwrap();

        file.save(&SyncSettings::default()).unwrap();

        let mode = std::fs::metadata(file.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_settings_file_is_disabled_default() {
        let temp_dir = TempDir::new().unwrap();
        let file = SettingsFile::new(temp_dir.path().join("absent.toml"));
        let settings = file.load().unwrap();
        assert!(!settings.enabled);
        assert_eq!(settings.sync_interval_minutes, DEFAULT_SYNC_INTERVAL_MINUTES);
    }

    #[test]
    fn test_partial_settings_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "enabled = true\nserver_address = \"http://x/\"\n").unwrap();

        let settings = SettingsFile::new(path).load().unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.username, "");
        assert_eq!(settings.sync_interval_minutes, DEFAULT_SYNC_INTERVAL_MINUTES);
    }

    #[test]
    fn test_invalid_settings_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "enabled = \"maybe").unwrap();
        assert!(matches!(SettingsFile::new(path).load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_interval_floor() {
        let policy = SyncPolicy::default();
        assert_eq!(policy.effective_interval_minutes(0), 1);
        assert_eq!(policy.effective_interval_minutes(1), 1);
        assert_eq!(policy.effective_interval_minutes(30), 30);
    }

    #[test]
    fn test_connection_trims_address() {
        let settings = SyncSettings {
            server_address: "  https://dav.example.com/notes/ ".into(),
            ..Default::default()
        };
        assert_eq!(settings.connection().server_address, "https://dav.example.com/notes/");
    }

    #[test]
    fn test_memory_settings_update() {
        let source = MemorySettings::default();
        source.update(|s| s.enabled = true);
        assert!(source.load().unwrap().enabled);
    }
}
