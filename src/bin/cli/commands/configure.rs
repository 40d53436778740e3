use anyhow::{Context, Result};

use crate::app::App;

/// Settings given on the command line. `None` leaves a value unchanged.
pub struct Changes {
    pub server: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub interval: Option<u32>,
    pub enabled: Option<bool>,
}

pub fn run(app: &App, changes: Changes) -> Result<()> {
    let file = app.settings_file();
    let mut settings = app.settings()?;

    if let Some(server) = changes.server {
        settings.server_address = server.trim().to_string();
    }
    if let Some(username) = changes.username {
        settings.username = username;
    }
    if let Some(password) = changes.password {
        settings.password = password;
    }
    if let Some(interval) = changes.interval {
        settings.sync_interval_minutes = interval.max(1);
    }
    if let Some(enabled) = changes.enabled {
        settings.enabled = enabled;
    }

    file.save(&settings)
        .with_context(|| format!("Failed to write {}", file.path().display()))?;
    println!("Saved {}", file.path().display());
    Ok(())
}
