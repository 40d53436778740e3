use anyhow::Result;
use notesync_lib::sync::SyncPolicy;

use crate::app::App;
use crate::render::terminal::mask;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let settings = app.settings()?;
    let interval = SyncPolicy::default().effective_interval_minutes(settings.sync_interval_minutes);
    let note_count = app.collection.len();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "settingsFile": app.settings_path.to_string_lossy(),
                "notesDir": app.storage.base_path().to_string_lossy(),
                "localNotes": note_count,
                "enabled": settings.enabled,
                "serverAddress": settings.server_address,
                "username": settings.username,
                "passwordSet": !settings.password.is_empty(),
                "intervalMinutes": interval,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            println!("Settings:     {}", app.settings_path.display());
            println!("Notes folder: {} ({} notes)", app.storage.base_path().display(), note_count);
            println!("Sync:         {}", if settings.enabled { "enabled" } else { "disabled" });
            println!(
                "Server:       {}",
                if settings.server_address.is_empty() { "(not set)" } else { &settings.server_address }
            );
            println!(
                "Username:     {}",
                if settings.username.is_empty() { "(not set)" } else { &settings.username }
            );
            println!("Password:     {}", mask(&settings.password));
            println!("Interval:     {} min", interval);
        }
    }
    Ok(())
}
