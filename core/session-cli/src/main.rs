//! trailhead-session: line-oriented driver for the Trailhead session engine.
//!
//! Plays the transport role over stdio: inbound protocol messages and user
//! actions arrive one JSON object per line on stdin (or `--events`), and
//! outbound protocol messages leave one JSON object per line on stdout.
//!
//! ## Subcommands
//!
//! - `run`: start a module from its source path and drive the session until
//!   input ends

mod driver;
mod logging;
mod transport;

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::info;
use trailhead_core::{load_session_config, SessionController, SessionError, SessionSnapshot};

use transport::JsonLinesTransport;

#[derive(Parser)]
#[command(name = "trailhead-session")]
#[command(about = "Observe and drive a remote process as an ordered transcript")]
#[command(version)]
struct Cli {
    /// Session config file (defaults to ~/.trailhead/session.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, value_name = "PATH")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a module and process events until input ends
    Run {
        /// Source file of the module to run (e.g. ./pkg/main.py)
        #[arg(value_name = "PATH")]
        path: String,

        /// Read events from this file instead of stdin
        #[arg(long, value_name = "FILE")]
        events: Option<PathBuf>,

        /// Print the final session snapshot after the last outbound message
        #[arg(long)]
        snapshot: bool,
    },
}

#[derive(Serialize)]
struct SnapshotLine<'a> {
    snapshot: &'a SessionSnapshot,
}

fn main() {
    let cli = Cli::parse();
    let _logging_guard = logging::init(cli.log_file.as_deref());

    match cli.command {
        Commands::Run {
            path,
            events,
            snapshot,
        } => {
            if let Err(e) = run(cli.config.as_deref(), &path, events.as_deref(), snapshot) {
                tracing::error!(error = %e, "trailhead-session run failed");
                std::process::exit(1);
            }
        }
    }
}

fn run(
    config_path: Option<&Path>,
    path: &str,
    events: Option<&Path>,
    snapshot: bool,
) -> Result<(), SessionError> {
    let config = load_session_config(config_path)?;
    let source = open_source(events)?;

    let mut controller = SessionController::new(JsonLinesTransport::new(std::io::stdout()), config);
    let target = controller.target_for_path(path);
    controller.run(target);

    let stats = driver::drive(&mut controller, source);
    controller.teardown();

    info!(
        generation = controller.generation(),
        messages = stats.messages,
        actions = stats.actions,
        rejected = stats.rejected,
        failed = stats.failed,
        sent = controller.transport().sent(),
        "Input ended"
    );

    if snapshot {
        if let Some(snapshot) = controller.snapshot() {
            controller
                .transport_mut()
                .write_value(&SnapshotLine {
                    snapshot: &snapshot,
                })
                .map_err(|source| SessionError::Io {
                    context: "writing session snapshot".to_string(),
                    source,
                })?;
        }
    }

    Ok(())
}

fn open_source(events: Option<&Path>) -> Result<Box<dyn BufRead + Send>, SessionError> {
    match events {
        Some(path) => {
            let file = fs_err::File::open(path).map_err(|source| SessionError::Io {
                context: "opening events file".to_string(),
                source,
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(std::io::stdin()))),
    }
}
