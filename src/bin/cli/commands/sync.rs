use anyhow::{bail, Context, Result};

use crate::app::App;
use crate::render::terminal::render_report;
use crate::OutputFormat;

pub async fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    app.require_enabled()?;

    let manager = app.manager();
    let report = manager
        .sync_now()
        .await
        .context("Sync did not run")?;
    manager.shutdown().await;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Plain => println!("{}", render_report(&report, use_color)),
    }

    if !report.success {
        bail!(report.error.unwrap_or_else(|| "sync failed".to_string()));
    }
    Ok(())
}
