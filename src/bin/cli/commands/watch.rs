use anyhow::Result;
use tokio::sync::broadcast::error::RecvError;

use crate::app::App;
use crate::render::terminal::{render_event, render_report};

pub async fn run(app: &App, use_color: bool) -> Result<()> {
    app.require_enabled()?;

    let manager = app.manager();
    let mut events = manager.subscribe();

    manager.sync_start().await;
    let status = manager.status();
    println!(
        "Watching {} (every {} min, Ctrl-C to stop)",
        app.storage.base_path().display(),
        status.interval_minutes
    );

    if let Some(report) = manager.sync_now().await {
        println!("{}", render_report(&report, use_color));
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => println!("{}", render_event(&event, use_color)),
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Dropped {} sync events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.shutdown().await;
    Ok(())
}
