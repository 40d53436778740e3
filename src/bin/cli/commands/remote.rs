use anyhow::{bail, Context, Result};

use crate::app::App;
use crate::render::terminal::{paint, Color};
use crate::OutputFormat;

pub async fn test_connection(app: &App, use_color: bool) -> Result<()> {
    let manager = app.manager();
    let result = manager.test_connection().await;
    manager.shutdown().await;

    match result {
        Ok(true) => {
            println!("{}", paint("Connection OK", Color::GREEN, use_color));
            Ok(())
        }
        Ok(false) => bail!("Server returned an empty response"),
        Err(e) => Err(e).context("Connection test failed"),
    }
}

pub async fn list_remote(app: &App, format: &OutputFormat) -> Result<()> {
    let client = app.client()?;
    let mut entries: Vec<_> = client
        .fetch_timestamps()
        .await
        .context("Failed to list remote notes")?
        .into_iter()
        .collect();
    entries.sort();

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = entries
                .iter()
                .map(|(uuid, modified)| {
                    serde_json::json!({
                        "id": uuid,
                        "updatedAt": modified.timestamp_millis(),
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if entries.is_empty() {
                println!("(no remote notes)");
            }
            for (uuid, modified) in &entries {
                println!("{}  {}", modified.format("%Y-%m-%d %H:%M:%S%.3f"), uuid);
            }
        }
    }
    Ok(())
}

pub async fn check(app: &App, uuid: &str, use_color: bool) -> Result<()> {
    app.require_enabled()?;
    let manager = app.manager();
    let newer = manager.check_remote_newer(uuid).await;
    manager.shutdown().await;

    if newer {
        println!("{}", paint("Remote copy is newer", Color::YELLOW, use_color));
    } else {
        println!("Local copy is up to date (or the note is missing on one side)");
    }
    Ok(())
}

pub async fn pull(app: &App, uuid: &str, use_color: bool) -> Result<()> {
    app.require_enabled()?;
    let manager = app.manager();
    let replaced = manager.download_if_remote_newer(uuid).await;
    manager.shutdown().await;

    if replaced {
        println!("{}", paint("Updated local note from server", Color::GREEN, use_color));
    } else {
        println!("Nothing to pull");
    }
    Ok(())
}
