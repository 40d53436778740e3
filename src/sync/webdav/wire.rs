//! JSON representation of a note on the WebDAV server.
//!
//! ```json
//! {"content":"...","createdAt":1700000000000,"deviceId":"laptop","id":"<uuid>",
//!  "noteType":"TEXT","syncStatus":"PENDING","title":"...","updatedAt":1700000000000}
//! ```
//!
//! Timestamps are milliseconds since the Unix epoch. Some writers emit them as
//! floating point numbers, so decoding accepts any JSON number.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::storage::{Note, NoteType, DEFAULT_SYNC_STATUS};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireNoteOut<'a> {
    content: &'a str,
    created_at: i64,
    device_id: &'a str,
    id: &'a str,
    note_type: &'static str,
    sync_status: &'a str,
    title: &'a str,
    updated_at: i64,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct WireNoteIn {
    content: Option<String>,
    #[serde(deserialize_with = "millis_from_number")]
    created_at: i64,
    device_id: Option<String>,
    note_type: Option<String>,
    sync_status: Option<String>,
    title: Option<String>,
    #[serde(deserialize_with = "millis_from_number")]
    updated_at: i64,
}

fn millis_from_number<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value.filter(|v| v.is_finite()).map(|v| v as i64).unwrap_or(0))
}

fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

/// Serialize a note to its compact wire form
pub fn encode_note(note: &Note) -> Result<Vec<u8>, serde_json::Error> {
    let sync_status = if note.sync_status.is_empty() {
        DEFAULT_SYNC_STATUS
    } else {
        note.sync_status.as_str()
    };

    serde_json::to_vec(&WireNoteOut {
        content: &note.body,
        created_at: note.created_at_millis(),
        device_id: &note.device_id,
        id: note.uuid(),
        note_type: note.note_type.as_str(),
        sync_status,
        title: &note.title,
        updated_at: note.updated_at_millis(),
    })
}

/// Decode a note fetched from the server.
///
/// The identity comes from the file name, not from the `id` field.
pub fn decode_note(data: &[u8], uuid: &str) -> Result<Note, serde_json::Error> {
    let wire: WireNoteIn = serde_json::from_slice(data)?;

    let mut note = Note::with_uuid(
        uuid.to_string(),
        wire.title.unwrap_or_default(),
        wire.content.unwrap_or_default(),
        from_millis(wire.created_at),
        from_millis(wire.updated_at),
    );
    note.note_type = NoteType::from_wire(wire.note_type.as_deref().unwrap_or_default());
    note.sync_status = wire.sync_status.unwrap_or_default();
    note.device_id = wire.device_id.unwrap_or_default();
    Ok(note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_note() -> Note {
        let created = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let modified = Utc.timestamp_millis_opt(1_700_000_123_456).unwrap();
        let mut note = Note::with_uuid(
            "4f1c".into(),
            "Shopping".into(),
            "[ ] apples\n[x] pears".into(),
            created,
            modified,
        );
        note.device_id = "laptop".into();
        note
    }

    #[test]
    fn test_encode_field_names_and_order() {
        let json = String::from_utf8(encode_note(&sample_note()).unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"content":"[ ] apples\n[x] pears","createdAt":1700000000000,"deviceId":"laptop","id":"4f1c","noteType":"CHECKLIST","syncStatus":"PENDING","title":"Shopping","updatedAt":1700000123456}"#
        );
    }

    #[test]
    fn test_decode_keeps_identity_content_and_type() {
        let note = sample_note();
        let decoded = decode_note(&encode_note(&note).unwrap(), "4f1c").unwrap();

        assert_eq!(decoded.uuid(), note.uuid());
        assert_eq!(decoded.title, note.title);
        assert_eq!(decoded.body, note.body);
        assert_eq!(decoded.note_type, note.note_type);
        assert_eq!(decoded.device_id, note.device_id);
        assert_eq!(decoded.modified(), note.modified());
    }

    #[test]
    fn test_decode_accepts_floating_point_timestamps() {
        let data = br#"{"title":"t","content":"c","createdAt":1.7e12,"updatedAt":1700000123456.0,"noteType":"TEXT"}"#;
        let note = decode_note(data, "x").unwrap();
        assert_eq!(note.created_at_millis(), 1_700_000_000_000);
        assert_eq!(note.updated_at_millis(), 1_700_000_123_456);
    }

    #[test]
    fn test_decode_uses_file_name_identity() {
        let data = br#"{"id":"other","title":"t","content":"","updatedAt":0}"#;
        assert_eq!(decode_note(data, "from-file").unwrap().uuid(), "from-file");
    }

    #[test]
    fn test_decode_missing_fields_default() {
        let note = decode_note(b"{}", "empty").unwrap();
        assert_eq!(note.title, "");
        assert_eq!(note.body, "");
        assert_eq!(note.note_type, NoteType::Text);
        assert_eq!(note.updated_at_millis(), 0);
    }

    #[test]
    fn test_decode_rejects_malformed_json() {
        assert!(decode_note(b"{not json", "x").is_err());
        assert!(decode_note(b"[1,2]", "x").is_err());
    }

    #[test]
    fn test_empty_sync_status_encodes_as_pending() {
        let mut note = sample_note();
        note.sync_status.clear();
        let value: serde_json::Value = serde_json::from_slice(&encode_note(&note).unwrap()).unwrap();
        assert_eq!(value["syncStatus"], "PENDING");
    }
}
