use notesync_lib::sync::{SyncEvent, SyncReport};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const CYAN: &str = "\x1b[36m";
}

pub fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Mask a secret for display
pub fn mask(secret: &str) -> String {
    if secret.is_empty() {
        "(not set)".to_string()
    } else {
        "*".repeat(secret.chars().count().min(8))
    }
}

pub fn render_report(report: &SyncReport, use_color: bool) -> String {
    if !report.success {
        let message = report.error.as_deref().unwrap_or("unknown error");
        return paint(&format!("Sync failed: {}", message), Color::RED, use_color);
    }

    let mut line = format!(
        "{} downloaded {}, uploaded {} in {}ms",
        paint("Sync complete:", Color::GREEN, use_color),
        report.notes_downloaded,
        report.notes_uploaded,
        report.duration_ms
    );
    if report.failures > 0 {
        line.push_str(&paint(
            &format!(" ({} failed, see log)", report.failures),
            Color::YELLOW,
            use_color,
        ));
    }
    line
}

pub fn render_event(event: &SyncEvent, use_color: bool) -> String {
    match event {
        SyncEvent::Started => paint("sync started", Color::DIM, use_color),
        SyncEvent::Finished { success: true } => paint("sync finished", Color::GREEN, use_color),
        SyncEvent::Finished { success: false } => paint("sync failed", Color::RED, use_color),
        SyncEvent::Error { message } => paint(&format!("error: {}", message), Color::RED, use_color),
        SyncEvent::NoteUploaded(note) => format!("  ↑ {} ({})", note.title, note.uuid()),
        SyncEvent::NoteDownloaded(note) => format!("  ↓ {} ({})", note.title, note.uuid()),
        SyncEvent::RemoteNoteChecked {
            local,
            is_remote_newer,
            ..
        } => format!(
            "  checked {}: remote {}",
            local.uuid(),
            if *is_remote_newer { "newer" } else { "not newer" }
        ),
    }
}
