mod config;
mod error;
mod models;
mod platform;
mod sensing;
mod session;
mod storage;
mod utils;

use log::{error, info, warn};
use std::future::Future;
use std::io::{self, BufRead};
use std::sync::Arc;
use std::time::Duration;
use time::{OffsetDateTime, UtcOffset};
use tokio::sync::{mpsc, oneshot};

use config::{CollectorConfig, SensorSource};
use error::{SessionError, StorageError};
use platform::{IioDevice, SensorDevice, SimulatedDevice, SystemProbe};
use session::Session;
use storage::{is_valid_message, MessageStore};
use utils::{format_datetime, local_offset};

const USAGE: &str = "usage: sensor-collector [run [MESSAGE] | add MESSAGE | messages]";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Collect until interrupted, optionally with an explicit label
    Run(Option<String>),
    /// Store a new label
    Add(String),
    /// Print stored labels
    List,
}

fn parse_command(args: &[String]) -> Result<Command, String> {
    match args {
        [] => Ok(Command::Run(None)),
        [cmd] if cmd == "run" => Ok(Command::Run(None)),
        [cmd, message] if cmd == "run" => Ok(Command::Run(Some(message.clone()))),
        [cmd, message] if cmd == "add" => Ok(Command::Add(message.clone())),
        [cmd] if cmd == "messages" => Ok(Command::List),
        _ => Err(USAGE.to_string()),
    }
}

/// Pick the label for a run: explicit argument, then configuration, then
/// the most recently stored message
async fn resolve_message(
    explicit: Option<String>,
    config: &CollectorConfig,
    store: &MessageStore,
) -> Result<String, Box<dyn std::error::Error>> {
    let message = match explicit.or_else(|| config.message.clone()) {
        Some(message) => message,
        None => store.last().await.ok_or(SessionError::EmptyMessage)?,
    };

    if !is_valid_message(&message) {
        return Err(StorageError::InvalidMessage(message).into());
    }
    Ok(message)
}

fn open_device(config: &CollectorConfig) -> Result<Arc<dyn SensorDevice>, SessionError> {
    match config.sensor_source {
        SensorSource::Iio => Ok(Arc::new(IioDevice::open(&config.iio_device)?)),
        SensorSource::Simulated => Ok(Arc::new(SimulatedDevice)),
    }
}

/// Forward the first successful `signal` to the returned receiver
///
/// If the signal cannot be registered the sender is held forever, so the
/// receiver never resolves and collection is not cut short.
fn forward_shutdown<F>(signal: F) -> oneshot::Receiver<()>
where
    F: Future<Output = io::Result<()>> + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
        match signal.await {
            Ok(()) => {
                let _ = tx.send(());
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
                drop(tx);
            }
        }
    });
    rx
}

/// Read stdin lines on a plain thread
///
/// A blocked read never holds up runtime shutdown this way.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Stopped reading messages from stdin: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

/// Apply each incoming line as the session label until shutdown
async fn relabel_until_shutdown(
    session: &Session,
    lines: &mut mpsc::Receiver<String>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut lines_open = true;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            line = lines.recv(), if lines_open => match line {
                Some(line) => {
                    let label = line.trim();
                    if label.is_empty() {
                        continue;
                    }
                    if is_valid_message(label) {
                        session.set_message(label);
                        info!(
                            "Now collecting for '{}'",
                            session.message().unwrap_or_default()
                        );
                    } else {
                        warn!("Ignoring invalid message '{}'", label);
                    }
                }
                None => lines_open = false,
            },
        }
    }
}

async fn run_collection(
    config: CollectorConfig,
    utc_offset: UtcOffset,
    message: String,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting sensor collection service");

    let device = open_device(&config)?;
    let probe = Arc::new(SystemProbe::new(&config));
    let mut session = Session::new(&config, utc_offset, probe, device);

    // Handle Ctrl+C gracefully
    let shutdown = forward_shutdown(tokio::signal::ctrl_c());

    session.start(&message)?;
    info!(
        "Collecting into {} since {}",
        config.data_file.display(),
        format_datetime(&OffsetDateTime::now_utc().to_offset(utc_offset))
    );
    info!("Type a new message and press Enter to relabel, Ctrl+C to stop");

    let mut lines = spawn_stdin_reader();
    relabel_until_shutdown(&session, &mut lines, shutdown).await;

    if session.is_running() {
        session.stop();
    }
    info!("Program terminated by user. Exiting gracefully.");
    Ok(())
}

async fn run(
    command: Command,
    config: CollectorConfig,
    utc_offset: UtcOffset,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = MessageStore::new(&config.messages_file);

    match command {
        Command::Run(explicit) => {
            let message = resolve_message(explicit, &config, &store).await?;
            run_collection(config, utc_offset, message).await
        }
        Command::Add(message) => {
            let index = store.add(&message).await?;
            println!("{};{} -> {}", index, message, store.path().display());
            Ok(())
        }
        Command::List => {
            for message in store.load().await {
                println!("{}", message);
            }
            Ok(())
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Resolve the local offset while the process is still single-threaded
    let utc_offset = local_offset();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    // Load configuration
    let config = match CollectorConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(command, config, utc_offset));
    // Do not wait on a probe or file write still running on the blocking pool
    runtime.shutdown_timeout(Duration::from_secs(1));
    if let Err(e) = &result {
        error!("Fatal error: {}", e);
    }
    result
}
