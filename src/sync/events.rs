use std::sync::Arc;

use tokio::sync::broadcast;

use crate::storage::Note;

/// Capacity of the notification channel. Slow subscribers see `Lagged`.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Fire-and-forget notifications emitted by the sync engine
#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started,
    Finished { success: bool },
    Error { message: String },
    NoteUploaded(Arc<Note>),
    NoteDownloaded(Arc<Note>),
    RemoteNoteChecked {
        local: Arc<Note>,
        remote: Arc<Note>,
        is_remote_newer: bool,
    },
}

/// Broadcasts [`SyncEvent`]s to any number of subscribers
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventEmitter {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Send an event. Having no subscribers is not an error.
    pub fn emit(&self, event: SyncEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
