mod client;
mod multistatus;
mod wire;

pub use client::{
    basic_auth_header, WebDavClient, WebDavError, NOTE_EXTENSION, PROBE_PATH, REQUEST_TIMEOUT,
};
pub use multistatus::{note_uuid_from_href, parse_multistatus, ListingEntry};
pub use wire::{decode_note, encode_note};
