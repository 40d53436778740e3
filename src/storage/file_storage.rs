use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::models::Note;

/// Extension of note files in the local notes directory
pub const LOCAL_NOTE_EXTENSION: &str = "txt";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Data directory not found")]
    DataDirNotFound,

    #[error("Invalid note id: {0:?}")]
    InvalidNoteId(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Persistent note storage as seen by the sync engine
pub trait NoteStorage: Send + Sync {
    fn read_all_notes(&self) -> Result<Vec<Note>>;
    fn write_note(&self, note: &Note) -> Result<()>;
    fn delete_note(&self, uuid: &str) -> Result<()>;
}

/// Flat-file note storage: one `<uuid>.txt` per note, first line is the title
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// Get the default notes directory
    pub fn default_data_dir() -> Result<PathBuf> {
        dirs::data_local_dir()
            .map(|p| p.join("notesync").join("notes"))
            .ok_or(StorageError::DataDirNotFound)
    }

    /// Initialize the notes directory
    pub fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn note_path(&self, uuid: &str) -> Result<PathBuf> {
        if uuid.is_empty() || uuid.contains(['/', '\\']) || uuid.starts_with('.') {
            return Err(StorageError::InvalidNoteId(uuid.to_string()));
        }
        Ok(self
            .base_path
            .join(format!("{}.{}", uuid, LOCAL_NOTE_EXTENSION)))
    }

    fn read_note_file(path: &Path, uuid: &str) -> Result<Note> {
        let content = fs::read_to_string(path)?;
        let (title, body) = match content.split_once('\n') {
            Some((title, body)) => (title.trim_end_matches('\r'), body),
            None => (content.as_str(), ""),
        };

        let metadata = fs::metadata(path)?;
        let modified: DateTime<Utc> = metadata.modified()?.into();
        let created: DateTime<Utc> = metadata
            .created()
            .map(DateTime::<Utc>::from)
            .unwrap_or(modified)
            .min(modified);

        Ok(Note::with_uuid(
            uuid.to_string(),
            title.to_string(),
            body.to_string(),
            created,
            modified,
        ))
    }
}

impl NoteStorage for LocalStorage {
    fn read_all_notes(&self) -> Result<Vec<Note>> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let mut notes = Vec::new();

        for entry in fs::read_dir(&self.base_path)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(LOCAL_NOTE_EXTENSION) {
                continue;
            }
            let Some(uuid) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            match Self::read_note_file(&path, uuid) {
                Ok(note) => notes.push(note),
                Err(e) => {
                    log::warn!("Failed to load note from {}: {}", path.display(), e);
                }
            }
        }

        Ok(notes)
    }

    fn write_note(&self, note: &Note) -> Result<()> {
        let path = self.note_path(note.uuid())?;
        fs::create_dir_all(&self.base_path)?;

        // The title must stay on the first line
        let title = note.title.replace(['\r', '\n'], " ");
        let content = format!("{}\n{}", title, note.body);
        fs::write(&path, content)?;

        // The file mtime is the note's modification time on reload
        let file = fs::OpenOptions::new().write(true).open(&path)?;
        file.set_modified(SystemTime::from(note.modified()))?;

        Ok(())
    }

    fn delete_note(&self, uuid: &str) -> Result<()> {
        let path = self.note_path(uuid)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
