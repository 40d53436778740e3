use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::time::Instant;

use super::config::{
    ConfigError, ConfigSource, ConnectionSettings, SyncPolicy, SyncReport, SyncSettings, SyncState,
    SyncStatus,
};
use super::events::{EventEmitter, SyncEvent};
use super::reconcile::Reconciler;
use super::remote::{webdav_factory, RemoteFactory, RemoteStore};
use super::scheduler::{run_scheduler, SyncCommand};
use super::webdav::WebDavError;
use crate::storage::{NoteCollection, NoteStorage};

/// Message reported when a pass is attempted without a remote client
pub const NOT_CONFIGURED_MESSAGE: &str = "WebDAV storage not initialized";

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("WebDAV error: {0}")]
    WebDav(#[from] WebDavError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Sync is not configured: no server address")]
    NotConfigured,
    #[error("Sync engine has shut down")]
    Stopped,
}

/// Handle to the sync engine.
///
/// All work happens on one actor task, so at most one reconciliation pass
/// runs at a time. Calls made while a pass is running wait for it.
#[derive(Clone)]
pub struct SyncManager {
    commands: mpsc::Sender<SyncCommand>,
    status: Arc<Mutex<SyncStatus>>,
    events: EventEmitter,
}

impl SyncManager {
    /// Spawn the engine with the default policy and a WebDAV remote.
    /// Must be called inside a tokio runtime.
    pub fn start(
        config: Arc<dyn ConfigSource>,
        collection: Arc<dyn NoteCollection>,
        storage: Arc<dyn NoteStorage>,
    ) -> Self {
        Self::start_with(config, collection, storage, SyncPolicy::default(), webdav_factory())
    }

    pub fn start_with(
        config: Arc<dyn ConfigSource>,
        collection: Arc<dyn NoteCollection>,
        storage: Arc<dyn NoteStorage>,
        policy: SyncPolicy,
        factory: RemoteFactory,
    ) -> Self {
        let (tx, rx) = mpsc::channel(32);
        let status = Arc::new(Mutex::new(SyncStatus::default()));
        let events = EventEmitter::new();

        let engine = SyncEngine {
            config,
            collection,
            storage,
            policy,
            factory,
            events: events.clone(),
            status: Arc::clone(&status),
            settings: SyncSettings::default(),
            held: false,
            connection: None,
            remote: None,
            timer: None,
            debounce_deadline: None,
            last_sync: None,
            last_error: None,
            last_report: None,
        };

        tokio::spawn(run_scheduler(engine, rx));

        Self {
            commands: tx,
            status,
            events,
        }
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SyncCommand) -> Option<T> {
        let (reply, response) = oneshot::channel();
        if self.commands.send(make(reply)).await.is_err() {
            log::warn!("Sync: engine is not running");
            return None;
        }
        response.await.ok()
    }

    /// Clear a previous [`SyncManager::disable`] and start periodic sync if
    /// the configuration says sync is enabled
    pub async fn enable(&self) {
        self.request(SyncCommand::Enable).await;
    }

    /// Stop the timer and drop the remote client until [`SyncManager::enable`]
    pub async fn disable(&self) {
        self.request(SyncCommand::Disable).await;
    }

    /// Re-read configuration and arm the periodic timer
    pub async fn sync_start(&self) {
        self.request(SyncCommand::Start).await;
    }

    /// Stop the timer and drop the remote client. The next
    /// sync-triggering call re-reads configuration and may restart it.
    pub async fn sync_stop(&self) {
        self.request(SyncCommand::Stop).await;
    }

    /// Run a pass now. `None` when sync is disabled.
    pub async fn sync_now(&self) -> Option<SyncReport> {
        self.request(SyncCommand::SyncNow).await.flatten()
    }

    /// Schedule a debounced pass. Further calls while one is pending are no-ops.
    pub async fn trigger_sync_on_search(&self) {
        self.request(SyncCommand::TriggerOnSearch).await;
    }

    pub async fn check_remote_newer(&self, uuid: &str) -> bool {
        let uuid = uuid.to_string();
        self.request(|reply| SyncCommand::CheckRemoteNewer { uuid, reply })
            .await
            .unwrap_or(false)
    }

    /// Replace the local note with the remote copy if that is newer.
    /// Returns whether the local note was replaced.
    pub async fn download_if_remote_newer(&self, uuid: &str) -> bool {
        let uuid = uuid.to_string();
        self.request(|reply| SyncCommand::DownloadIfRemoteNewer { uuid, reply })
            .await
            .unwrap_or(false)
    }

    /// Probe the configured server, whether or not sync is enabled
    pub async fn test_connection(&self) -> Result<bool, SyncError> {
        self.request(SyncCommand::TestConnection)
            .await
            .unwrap_or(Err(SyncError::Stopped))
    }

    pub fn status(&self) -> SyncStatus {
        self.status.lock().unwrap().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Stop the engine. Any pass in flight finishes first.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(SyncCommand::Shutdown).await;
    }
}

/// Periodic timer state
#[derive(Debug, Clone, Copy)]
pub(crate) struct PeriodicTimer {
    pub interval_minutes: u32,
    pub next: Instant,
}

impl PeriodicTimer {
    fn new(interval_minutes: u32) -> Self {
        Self {
            interval_minutes,
            next: Instant::now() + Self::period(interval_minutes),
        }
    }

    fn period(interval_minutes: u32) -> Duration {
        Duration::from_secs(u64::from(interval_minutes) * 60)
    }

    fn rearm(&mut self) {
        let now = Instant::now();
        if self.next <= now {
            self.next = now + Self::period(self.interval_minutes);
        }
    }
}

/// State owned by the actor task
pub(crate) struct SyncEngine {
    config: Arc<dyn ConfigSource>,
    collection: Arc<dyn NoteCollection>,
    storage: Arc<dyn NoteStorage>,
    policy: SyncPolicy,
    factory: RemoteFactory,
    events: EventEmitter,
    status: Arc<Mutex<SyncStatus>>,
    /// Last successfully loaded settings
    settings: SyncSettings,
    /// Set by `disable()`, overrides `settings.enabled`
    held: bool,
    /// Connection the current remote was built from
    connection: Option<ConnectionSettings>,
    remote: Option<Arc<dyn RemoteStore>>,
    timer: Option<PeriodicTimer>,
    debounce_deadline: Option<Instant>,
    last_sync: Option<DateTime<Utc>>,
    last_error: Option<String>,
    last_report: Option<SyncReport>,
}

impl SyncEngine {
    pub(crate) fn next_periodic(&self) -> Option<Instant> {
        self.timer.map(|t| t.next)
    }

    pub(crate) fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce_deadline
    }

    fn is_enabled(&self) -> bool {
        self.settings.enabled && !self.held
    }

    fn publish_status(&self, syncing: bool) {
        let state = if syncing {
            SyncState::Syncing
        } else if self.timer.is_some() {
            SyncState::Idle
        } else {
            SyncState::Disabled
        };

        let mut status = self.status.lock().unwrap();
        *status = SyncStatus {
            state,
            last_sync: self.last_sync,
            last_error: self.last_error.clone(),
            last_report: self.last_report.clone(),
            interval_minutes: self
                .policy
                .effective_interval_minutes(self.settings.sync_interval_minutes),
            pending_debounced_sync: self.debounce_deadline.is_some(),
        };
    }

    /// Reconcile the cached settings with the configuration source
    pub(crate) fn refresh_configuration(&mut self) {
        match self.config.load() {
            Ok(settings) => self.settings = settings,
            Err(e) => {
                log::warn!("Sync: failed to load settings, keeping previous: {}", e);
                self.last_error = Some(e.to_string());
            }
        }

        if !self.is_enabled() {
            if self.timer.is_some() || self.remote.is_some() {
                self.stop();
            }
            self.publish_status(false);
            return;
        }

        let connection = self.settings.connection();
        if self.remote.is_none() || self.connection.as_ref() != Some(&connection) {
            log::info!("Sync: building remote client for {}", connection.server_address);
            self.remote = match (self.factory)(&connection, &self.policy) {
                Ok(remote) => Some(remote),
                Err(e) => {
                    log::warn!("Sync: cannot create remote client: {}", e);
                    self.last_error = Some(e.to_string());
                    None
                }
            };
            self.connection = Some(connection);
        }

        let interval = self
            .policy
            .effective_interval_minutes(self.settings.sync_interval_minutes);
        if self.timer.map(|t| t.interval_minutes) != Some(interval) {
            log::info!("Sync: periodic sync every {} minute(s)", interval);
            self.timer = Some(PeriodicTimer::new(interval));
        }

        self.publish_status(false);
    }

    /// Stop the timer, drop the client and forget any pending debounce
    pub(crate) fn stop(&mut self) {
        if self.timer.is_some() || self.remote.is_some() {
            log::info!("Sync: stopped");
        }
        self.timer = None;
        self.remote = None;
        self.connection = None;
        self.debounce_deadline = None;
        self.publish_status(false);
    }

    pub(crate) fn enable(&mut self) {
        self.held = false;
        self.refresh_configuration();
    }

    pub(crate) fn disable(&mut self) {
        self.held = true;
        self.stop();
    }

    pub(crate) fn trigger_sync_on_search(&mut self) {
        self.refresh_configuration();
        if !self.is_enabled() || self.debounce_deadline.is_some() {
            return;
        }
        self.debounce_deadline = Some(Instant::now() + self.policy.debounce_delay);
        self.publish_status(false);
    }

    pub(crate) async fn on_timer(&mut self) {
        log::debug!("Sync: periodic timer fired");
        self.perform_sync().await;
        if let Some(timer) = self.timer.as_mut() {
            timer.rearm();
        }
    }

    pub(crate) async fn on_debounce(&mut self) {
        self.debounce_deadline = None;
        log::debug!("Sync: debounce elapsed");
        self.perform_sync().await;
    }

    /// Run one reconciliation pass. `None` when sync is disabled.
    pub(crate) async fn perform_sync(&mut self) -> Option<SyncReport> {
        self.refresh_configuration();
        if !self.is_enabled() {
            return None;
        }

        let Some(remote) = self.remote.clone() else {
            log::error!("Sync: {}", NOT_CONFIGURED_MESSAGE);
            let report = SyncReport::error(NOT_CONFIGURED_MESSAGE.to_string());
            self.last_error = Some(NOT_CONFIGURED_MESSAGE.to_string());
            self.last_report = Some(report.clone());
            self.publish_status(false);
            self.events.emit(SyncEvent::Error {
                message: NOT_CONFIGURED_MESSAGE.to_string(),
            });
            self.events.emit(SyncEvent::Finished { success: false });
            return Some(report);
        };

        self.events.emit(SyncEvent::Started);
        self.publish_status(true);
        self.reload_local();

        let report = self.reconciler(remote.as_ref()).run_pass().await;

        self.last_sync = Some(report.finished_at);
        self.last_error = None;
        self.last_report = Some(report.clone());
        self.publish_status(false);
        self.events.emit(SyncEvent::Finished {
            success: report.success,
        });
        Some(report)
    }

    fn reload_local(&self) {
        if !self.policy.reload_local_before_sync {
            return;
        }
        if let Err(e) = self.collection.reload_from(self.storage.as_ref()) {
            log::warn!("Sync: failed to reload local notes, using cached copies: {}", e);
        }
    }

    fn reconciler<'a>(&'a self, remote: &'a dyn RemoteStore) -> Reconciler<'a> {
        Reconciler {
            remote,
            collection: self.collection.as_ref(),
            storage: self.storage.as_ref(),
            events: &self.events,
            policy: &self.policy,
        }
    }

    pub(crate) async fn check_remote_newer(&mut self, uuid: &str) -> bool {
        self.refresh_configuration();
        let Some(remote) = self.remote.clone() else {
            return false;
        };
        self.reload_local();
        self.reconciler(remote.as_ref()).check_remote_newer(uuid).await
    }

    pub(crate) async fn download_if_remote_newer(&mut self, uuid: &str) -> bool {
        self.refresh_configuration();
        let Some(remote) = self.remote.clone() else {
            return false;
        };
        self.reload_local();
        self.reconciler(remote.as_ref()).download_if_remote_newer(uuid).await
    }

    /// Unlike the sync paths, an unreadable configuration is an error here
    pub(crate) async fn test_connection(&mut self) -> Result<bool, SyncError> {
        let settings = self.config.load()?;
        self.refresh_configuration();
        let connection = settings.connection();
        if connection.server_address.is_empty() {
            return Err(SyncError::NotConfigured);
        }

        let remote = (self.factory)(&connection, &self.policy)?;
        match remote.test_connection().await {
            Ok(reachable) => {
                log::info!(
                    "WebDAV: connection test to {} succeeded (result={})",
                    connection.server_address,
                    reachable
                );
                Ok(reachable)
            }
            Err(e) => {
                log::error!(
                    "WebDAV: connection test to {} failed: {}",
                    connection.server_address,
                    e
                );
                Err(e.into())
            }
        }
    }
}
