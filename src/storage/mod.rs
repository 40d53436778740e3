mod file_storage;
mod models;
mod note_store;

pub use file_storage::{LocalStorage, NoteStorage, StorageError, LOCAL_NOTE_EXTENSION};
pub use models::*;
pub use note_store::{NoteCollection, NoteObserver, NoteStore};
