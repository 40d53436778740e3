//! One reconciliation pass between the local note collection and a remote store.
//!
//! The download phase runs to completion before the upload phase starts, and
//! the upload phase lists the remote again rather than reusing the first
//! listing. Per-note failures are logged and counted, never propagated.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use super::config::{SyncPolicy, SyncReport};
use super::events::{EventEmitter, SyncEvent};
use super::remote::RemoteStore;
use crate::storage::{Note, NoteCollection, NoteStorage};

/// True when `newer` is ahead of `older` by strictly more than `tolerance`
fn exceeds_tolerance(newer: DateTime<Utc>, older: DateTime<Utc>, tolerance: Duration) -> bool {
    let tolerance_ms = i64::try_from(tolerance.as_millis()).unwrap_or(i64::MAX);
    (newer - older).num_milliseconds() > tolerance_ms
}

/// Millisecond-field comparator: true if the remote copy was updated later
pub fn resolve_conflict(local: &Note, remote: &Note) -> bool {
    remote.updated_at_millis() > local.updated_at_millis()
}

#[derive(Debug, Default)]
struct PassTally {
    downloaded: usize,
    uploaded: usize,
    failures: usize,
}

/// Borrowed view of everything a pass touches
pub struct Reconciler<'a> {
    pub remote: &'a dyn RemoteStore,
    pub collection: &'a dyn NoteCollection,
    pub storage: &'a dyn NoteStorage,
    pub events: &'a EventEmitter,
    pub policy: &'a SyncPolicy,
}

impl Reconciler<'_> {
    /// Run download then upload. Always succeeds as a pass.
    pub async fn run_pass(&self) -> SyncReport {
        let started = Instant::now();
        let mut tally = PassTally::default();

        self.download_phase(&mut tally).await;
        self.upload_phase(&mut tally).await;

        let report = SyncReport::success(
            tally.downloaded,
            tally.uploaded,
            tally.failures,
            started.elapsed().as_millis() as u64,
        );
        log::info!(
            "Sync: pass complete, downloaded={}, uploaded={}, failures={} ({}ms)",
            report.notes_downloaded,
            report.notes_uploaded,
            report.failures,
            report.duration_ms
        );
        report
    }

    fn is_remote_newer(&self, local: &Note, remote: &Note) -> bool {
        exceeds_tolerance(remote.modified(), local.modified(), self.policy.download_tolerance)
    }

    /// Put a remote note into the collection and local storage.
    ///
    /// `expected` is the local `modified` the decision was based on, `None`
    /// when the note was missing. If the collection changed since, the
    /// download is dropped and the next pass decides again. Returns whether
    /// the collection took the remote copy.
    fn apply_download(
        &self,
        note: Note,
        expected: Option<DateTime<Utc>>,
        tally: &mut PassTally,
    ) -> bool {
        let note = Arc::new(note);
        if !self.collection.replace_if_unchanged(expected, Arc::clone(&note)) {
            log::info!(
                "Sync: note {} changed locally during sync, keeping local copy",
                note.uuid()
            );
            return false;
        }

        if let Err(e) = self.storage.write_note(&note) {
            log::warn!("Sync: failed to save downloaded note {} locally: {}", note.uuid(), e);
            tally.failures += 1;
            return true;
        }

        tally.downloaded += 1;
        self.events.emit(SyncEvent::NoteDownloaded(note));
        true
    }

    async fn download_phase(&self, tally: &mut PassTally) {
        let remote_notes = match self.remote.list_all().await {
            Ok(notes) => notes,
            Err(e) => {
                log::warn!("Sync: remote listing failed, nothing to download: {}", e);
                return;
            }
        };
        log::info!("Sync: remote has {} notes", remote_notes.len());

        for remote in remote_notes {
            match self.collection.get_note(remote.uuid()) {
                None => {
                    log::debug!("Sync: note {} missing locally, downloading", remote.uuid());
                    self.apply_download(remote, None, tally);
                }
                Some(local) if self.is_remote_newer(&local, &remote) => {
                    log::debug!(
                        "Sync: remote note {} is {}ms newer, replacing local copy",
                        remote.uuid(),
                        (remote.modified() - local.modified()).num_milliseconds()
                    );
                    self.apply_download(remote, Some(local.modified()), tally);
                }
                Some(local) => {
                    log::debug!(
                        "Sync: note {} within download tolerance ({}ms), skipping",
                        remote.uuid(),
                        (remote.modified() - local.modified()).num_milliseconds()
                    );
                }
            }
        }
    }

    async fn upload_phase(&self, tally: &mut PassTally) {
        let remote_timestamps = match self.remote.fetch_timestamps().await {
            Ok(timestamps) => timestamps,
            Err(e) => {
                log::warn!("Sync: remote listing failed, skipping uploads: {}", e);
                return;
            }
        };

        for local in self.collection.get_all_notes() {
            let upload = match remote_timestamps.get(local.uuid()) {
                None => {
                    log::debug!("Sync: note {} not on remote, uploading", local.uuid());
                    true
                }
                Some(remote_modified) => {
                    let newer = exceeds_tolerance(
                        local.modified(),
                        *remote_modified,
                        self.policy.upload_tolerance,
                    );
                    log::debug!(
                        "Sync: note {} local-remote diff {}ms, upload={}",
                        local.uuid(),
                        (local.modified() - *remote_modified).num_milliseconds(),
                        newer
                    );
                    newer
                }
            };

            if !upload {
                continue;
            }

            match self.remote.write(&local).await {
                Ok(()) => {
                    tally.uploaded += 1;
                    self.events.emit(SyncEvent::NoteUploaded(local));
                }
                Err(e) => {
                    log::warn!("Sync: failed to upload note {}: {}", local.uuid(), e);
                    tally.failures += 1;
                }
            }
        }
    }

    /// Local and remote copies of `uuid`, if both exist
    async fn find_pair(&self, uuid: &str) -> Option<(Arc<Note>, Note)> {
        let local = self.collection.get_note(uuid)?;
        let remote_notes = match self.remote.list_all().await {
            Ok(notes) => notes,
            Err(e) => {
                log::warn!("Sync: remote listing failed while checking {}: {}", uuid, e);
                return None;
            }
        };
        let remote = remote_notes.into_iter().find(|n| n.uuid() == uuid)?;
        Some((local, remote))
    }

    /// Report whether the remote copy is newer, without touching local state
    pub async fn check_remote_newer(&self, uuid: &str) -> bool {
        let Some((local, remote)) = self.find_pair(uuid).await else {
            return false;
        };

        let is_remote_newer = self.is_remote_newer(&local, &remote);
        self.events.emit(SyncEvent::RemoteNoteChecked {
            local,
            remote: Arc::new(remote),
            is_remote_newer,
        });
        is_remote_newer
    }

    /// Replace the local copy when the remote one is newer. Returns whether it did.
    pub async fn download_if_remote_newer(&self, uuid: &str) -> bool {
        let Some((local, remote)) = self.find_pair(uuid).await else {
            return false;
        };

        if !self.is_remote_newer(&local, &remote) {
            log::debug!("Sync: local note {} is up to date", uuid);
            return false;
        }

        log::info!("Sync: remote note {} is newer, updating local copy", uuid);
        let mut tally = PassTally::default();
        self.apply_download(remote, Some(local.modified()), &mut tally)
    }
}
