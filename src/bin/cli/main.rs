mod app;
mod commands;
mod render;

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "notesync-cli", about = "Sync a notes folder with a WebDAV server", version)]
struct Cli {
    /// Settings file (default: <config dir>/notesync/settings.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Notes directory (default: <data dir>/notesync/notes)
    #[arg(long, global = true)]
    notes_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    /// Disable ANSI colors
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run one sync pass and print the result
    Sync,

    /// Keep syncing on the configured interval until Ctrl-C
    Watch,

    /// Show sync settings and the local notes folder
    Status,

    /// Check that the server answers with the configured credentials
    TestConnection,

    /// List notes on the server with their modification times
    ListRemote,

    /// Report whether the server has a newer copy of a note
    Check {
        /// Note id
        uuid: String,
    },

    /// Replace a local note with the server copy if that is newer
    Pull {
        /// Note id
        uuid: String,
    },

    /// Change sync settings
    Configure {
        /// WebDAV collection URL
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
        /// Sync interval in minutes (minimum 1)
        #[arg(long)]
        interval: Option<u32>,
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let use_color = !cli.no_color && std::io::stdout().is_terminal();
    let app = app::App::new(cli.config, cli.notes_dir)?;

    match cli.command {
        Command::Sync => {
            commands::sync::run(&app, &cli.format, use_color).await?;
        }
        Command::Watch => {
            commands::watch::run(&app, use_color).await?;
        }
        Command::Status => {
            commands::status::run(&app, &cli.format)?;
        }
        Command::TestConnection => {
            commands::remote::test_connection(&app, use_color).await?;
        }
        Command::ListRemote => {
            commands::remote::list_remote(&app, &cli.format).await?;
        }
        Command::Check { uuid } => {
            commands::remote::check(&app, &uuid, use_color).await?;
        }
        Command::Pull { uuid } => {
            commands::remote::pull(&app, &uuid, use_color).await?;
        }
        Command::Configure {
            server,
            username,
            password,
            interval,
            enable,
            disable,
        } => {
            let enabled = match (enable, disable) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::configure::run(
                &app,
                commands::configure::Changes {
                    server,
                    username,
                    password,
                    interval,
                    enabled,
                },
            )?;
        }
    }

    Ok(())
}
