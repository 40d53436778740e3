use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use super::file_storage::{NoteStorage, Result};
use super::models::Note;

/// Receives change notifications from a note collection.
///
/// Called after the collection lock is released, so an observer may read
/// the collection back.
pub trait NoteObserver: Send + Sync {
    fn note_added(&self, note: &Arc<Note>);
    fn note_updated(&self, note: &Arc<Note>);
    fn note_deleted(&self, uuid: &str);
}

/// The in-memory set of notes the editor and the sync engine both work on
pub trait NoteCollection: Send + Sync {
    fn add_note(&self, note: Arc<Note>);
    /// Replace an existing note. Unknown uuids are ignored.
    fn update_note(&self, note: Arc<Note>);
    fn delete_note(&self, uuid: &str);
    fn get_note(&self, uuid: &str) -> Option<Arc<Note>>;
    fn get_all_notes(&self) -> Vec<Arc<Note>>;
    fn add_observer(&self, observer: Arc<dyn NoteObserver>);

    /// Store `note` only if the current copy of its uuid is still the one the
    /// caller read: absent when `expected` is `None`, otherwise modified at
    /// `expected`. The check and the write happen under one lock. Returns
    /// whether the note was stored.
    fn replace_if_unchanged(&self, expected: Option<DateTime<Utc>>, note: Arc<Note>) -> bool;

    /// Pick up changes made to `storage` behind the collection's back.
    /// Collections that are the only writer keep the default no-op.
    fn reload_from(&self, _storage: &dyn NoteStorage) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct NoteStoreInner {
    notes: HashMap<String, Arc<Note>>,
    observers: Vec<Arc<dyn NoteObserver>>,
}

enum Change {
    Added(Arc<Note>),
    Updated(Arc<Note>),
    Deleted(String),
}

/// Mutex-guarded note collection. Every mutation holds the lock, so an
/// editor save and a sync download on the same uuid are serialized.
/// Observers run after the lock is dropped.
#[derive(Default)]
pub struct NoteStore {
    inner: Mutex<NoteStoreInner>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection from everything currently in storage
    pub fn load_from(storage: &dyn NoteStorage) -> Result<Self> {
        let store = Self::new();
        {
            let mut inner = store.lock();
            for note in storage.read_all_notes()? {
                inner.notes.insert(note.uuid().to_string(), Arc::new(note));
            }
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.lock().notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, NoteStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(observers: Vec<Arc<dyn NoteObserver>>, changes: Vec<Change>) {
        for change in &changes {
            for observer in &observers {
                match change {
                    Change::Added(note) => observer.note_added(note),
                    Change::Updated(note) => observer.note_updated(note),
                    Change::Deleted(uuid) => observer.note_deleted(uuid),
                }
            }
        }
    }

    /// Apply `changes` under the lock, then tell observers with the lock released
    fn commit(&self, apply: impl FnOnce(&mut HashMap<String, Arc<Note>>) -> Vec<Change>) {
        let (observers, changes) = {
            let mut inner = self.lock();
            let changes = apply(&mut inner.notes);
            if changes.is_empty() {
                return;
            }
            (inner.observers.clone(), changes)
        };
        Self::notify(observers, changes);
    }
}

impl NoteCollection for NoteStore {
    fn add_note(&self, note: Arc<Note>) {
        self.commit(|notes| {
            notes.insert(note.uuid().to_string(), Arc::clone(&note));
            vec![Change::Added(note)]
        });
    }

    fn update_note(&self, note: Arc<Note>) {
        self.commit(|notes| match notes.get_mut(note.uuid()) {
            Some(slot) => {
                *slot = Arc::clone(&note);
                vec![Change::Updated(note)]
            }
            None => Vec::new(),
        });
    }

    fn delete_note(&self, uuid: &str) {
        self.commit(|notes| match notes.remove(uuid) {
            Some(_) => vec![Change::Deleted(uuid.to_string())],
            None => Vec::new(),
        });
    }

    fn get_note(&self, uuid: &str) -> Option<Arc<Note>> {
        self.lock().notes.get(uuid).cloned()
    }

    fn get_all_notes(&self) -> Vec<Arc<Note>> {
        self.lock().notes.values().cloned().collect()
    }

    fn add_observer(&self, observer: Arc<dyn NoteObserver>) {
        self.lock().observers.push(observer);
    }

    fn replace_if_unchanged(&self, expected: Option<DateTime<Utc>>, note: Arc<Note>) -> bool {
        let mut stored = false;
        self.commit(|notes| {
            let current = notes.get(note.uuid()).map(|n| n.modified());
            if current != expected {
                return Vec::new();
            }
            stored = true;
            notes.insert(note.uuid().to_string(), Arc::clone(&note));
            if current.is_some() {
                vec![Change::Updated(note)]
            } else {
                vec![Change::Added(note)]
            }
        });
        stored
    }

    /// New files are added, files with a later mtime replace the cached
    /// copy, and notes whose file is gone are dropped.
    fn reload_from(&self, storage: &dyn NoteStorage) -> Result<()> {
        let on_disk = storage.read_all_notes()?;
        self.commit(|notes| {
            let mut changes = Vec::new();
            let mut seen = HashSet::with_capacity(on_disk.len());

            for note in on_disk {
                seen.insert(note.uuid().to_string());
                let note = Arc::new(note);
                match notes.get(note.uuid()) {
                    None => {
                        notes.insert(note.uuid().to_string(), Arc::clone(&note));
                        changes.push(Change::Added(note));
                    }
                    Some(cached) if note.modified() > cached.modified() => {
                        notes.insert(note.uuid().to_string(), Arc::clone(&note));
                        changes.push(Change::Updated(note));
                    }
                    Some(_) => {}
                }
            }

            let gone: Vec<String> = notes
                .keys()
                .filter(|uuid| !seen.contains(*uuid))
                .cloned()
                .collect();
            for uuid in gone {
                notes.remove(&uuid);
                changes.push(Change::Deleted(uuid));
            }
            changes
        });
        Ok(())
    }
}
