use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use super::config::SyncReport;
use super::manager::{SyncEngine, SyncError};

/// Messages from [`super::SyncManager`] handles to the actor
#[derive(Debug)]
pub(crate) enum SyncCommand {
    Enable(oneshot::Sender<()>),
    Disable(oneshot::Sender<()>),
    Start(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    SyncNow(oneshot::Sender<Option<SyncReport>>),
    TriggerOnSearch(oneshot::Sender<()>),
    CheckRemoteNewer {
        uuid: String,
        reply: oneshot::Sender<bool>,
    },
    DownloadIfRemoteNewer {
        uuid: String,
        reply: oneshot::Sender<bool>,
    },
    TestConnection(oneshot::Sender<Result<bool, SyncError>>),
    /// App closing
    Shutdown,
}

/// Sleep until `deadline`, or forever when there is none
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Main scheduler loop.
///
/// Waits on the periodic deadline, the debounce deadline and the command
/// channel. Whatever wins runs to completion before the next wait, so passes
/// never overlap and commands sent during a pass queue behind it.
pub(crate) async fn run_scheduler(mut engine: SyncEngine, mut receiver: mpsc::Receiver<SyncCommand>) {
    log::info!("Sync scheduler started");

    loop {
        let periodic = engine.next_periodic();
        let debounce = engine.debounce_deadline();

        tokio::select! {
            _ = sleep_until(periodic) => {
                log::info!("Sync scheduler: running periodic sync");
                engine.on_timer().await;
            }

            _ = sleep_until(debounce) => {
                log::info!("Sync scheduler: running search-triggered sync");
                engine.on_debounce().await;
            }

            msg = receiver.recv() => {
                let Some(msg) = msg else {
                    log::info!("Sync scheduler: all handles dropped, shutting down");
                    break;
                };
                if !handle_command(&mut engine, msg).await {
                    log::info!("Sync scheduler: shutting down");
                    break;
                }
            }
        }
    }

    engine.stop();
}

/// Apply one command. Returns false on shutdown.
async fn handle_command(engine: &mut SyncEngine, command: SyncCommand) -> bool {
    match command {
        SyncCommand::Enable(reply) => {
            engine.enable();
            let _ = reply.send(());
        }
        SyncCommand::Disable(reply) => {
            engine.disable();
            let _ = reply.send(());
        }
        SyncCommand::Start(reply) => {
            engine.refresh_configuration();
            let _ = reply.send(());
        }
        SyncCommand::Stop(reply) => {
            engine.stop();
            let _ = reply.send(());
        }
        SyncCommand::SyncNow(reply) => {
            let report = engine.perform_sync().await;
            let _ = reply.send(report);
        }
        SyncCommand::TriggerOnSearch(reply) => {
            engine.trigger_sync_on_search();
            let _ = reply.send(());
        }
        SyncCommand::CheckRemoteNewer { uuid, reply } => {
            let newer = engine.check_remote_newer(&uuid).await;
            let _ = reply.send(newer);
        }
        SyncCommand::DownloadIfRemoteNewer { uuid, reply } => {
            let replaced = engine.download_if_remote_newer(&uuid).await;
            let _ = reply.send(replaced);
        }
        SyncCommand::TestConnection(reply) => {
            let result = engine.test_connection().await;
            let _ = reply.send(result);
        }
        SyncCommand::Shutdown => return false,
    }
    true
}
