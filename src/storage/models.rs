use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Sync status written on notes that have not been confirmed by a server
pub const DEFAULT_SYNC_STATUS: &str = "PENDING";

/// Kind of note, derived from the body rather than stored authoritatively
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum NoteType {
    #[default]
    Text,
    Checklist,
}

impl NoteType {
    /// Classify a body: any `[x]` or `[ ]` marker makes it a checklist
    pub fn detect(body: &str) -> Self {
        if body.contains("[x]") || body.contains("[ ]") {
            Self::Checklist
        } else {
            Self::Text
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Checklist => "CHECKLIST",
        }
    }

    /// Parse the wire spelling. Unknown values fall back to `Text`.
    pub fn from_wire(value: &str) -> Self {
        if value == "CHECKLIST" {
            Self::Checklist
        } else {
            Self::Text
        }
    }
}

/// A single note as held by the note collection and exchanged with storage.
///
/// `created` and `modified` are the canonical timestamps and are kept at
/// millisecond precision. The millisecond-epoch values used on the wire are
/// derived from them, never stored separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Note {
    uuid: String,
    pub title: String,
    pub body: String,
    created: DateTime<Utc>,
    modified: DateTime<Utc>,
    pub note_type: NoteType,
    pub sync_status: String,
    pub device_id: String,
}

impl Note {
    /// Create a fresh note authored on this device
    pub fn new(title: String, body: String) -> Self {
        let now = Utc::now();
        let mut note = Self::with_uuid(Uuid::new_v4().to_string(), title, body, now, now);
        note.device_id = local_device_id();
        note
    }

    /// Build a note with a known identity, e.g. when loading from storage
    pub fn with_uuid(
        uuid: String,
        title: String,
        body: String,
        created: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        let note_type = NoteType::detect(&body);
        Self {
            uuid,
            title,
            body,
            created: truncate_to_millis(created),
            modified: truncate_to_millis(modified),
            note_type,
            sync_status: DEFAULT_SYNC_STATUS.to_string(),
            device_id: String::new(),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    pub fn set_modified(&mut self, modified: DateTime<Utc>) {
        self.modified = truncate_to_millis(modified);
    }

    /// Record an edit: replace the content and move `modified` forward.
    ///
    /// `modified` never goes backwards, even if the wall clock does.
    pub fn edit(&mut self, title: String, body: String) {
        self.note_type = NoteType::detect(&body);
        self.title = title;
        self.body = body;
        let now = truncate_to_millis(Utc::now());
        if now > self.modified {
            self.modified = now;
        }
    }

    pub fn created_at_millis(&self) -> i64 {
        self.created.timestamp_millis()
    }

    pub fn updated_at_millis(&self) -> i64 {
        self.modified.timestamp_millis()
    }
}

/// Drop sub-millisecond digits so timestamps survive the wire format intact
pub fn truncate_to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(t.timestamp_millis()).unwrap_or(t)
}

/// Host name of this machine, used as the origin device of new notes
pub fn local_device_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_default()
}
