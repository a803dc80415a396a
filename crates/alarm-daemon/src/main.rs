mod app;
mod audio;
mod buttons;
mod clock;
mod coordinator;
mod display;
mod event;
mod http;
mod input;
mod mode;
mod player;
mod screen;
mod task;
mod timers;

use std::path::PathBuf;

use alarm_proto::config::Config;
use alarm_proto::platform;
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::app::{App, StopReason};

#[derive(Parser)]
#[command(name = "alarm-daemon", about = "Webradio alarm clock daemon")]
struct Cli {
    /// Log at debug level
    #[arg(short, long)]
    debug: bool,

    /// Run without sound hardware; display frames go to the log
    #[arg(short, long)]
    simulation: bool,

    /// Directory holding config.toml and state.json
    #[arg(short = 'c', long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the daemon
    Run,
    /// Print the version
    Version,
}

fn init_logging(debug: bool) -> anyhow::Result<PathBuf> {
    let data_dir = platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let log_path = data_dir.join("daemon.log");

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(log_file)
        .with_ansi(false);
    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let filter = if debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,alarm_daemon=info"))
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(filter)
        .init();
    Ok(log_path)
}

#[cfg(unix)]
async fn wait_for_stop(
    mut power_rx: mpsc::UnboundedReceiver<StopReason>,
) -> anyhow::Result<StopReason> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;
    let mut quit = signal(SignalKind::quit())?;
    let mut power = signal(SignalKind::user_defined1())?;

    let reason = tokio::select! {
        _ = interrupt.recv() => StopReason::Stop,
        _ = terminate.recv() => StopReason::Stop,
        _ = hangup.recv() => StopReason::Stop,
        _ = quit.recv() => StopReason::Stop,
        _ = power.recv() => StopReason::Halt,
        Some(reason) = power_rx.recv() => reason,
    };
    Ok(reason)
}

#[cfg(not(unix))]
async fn wait_for_stop(
    mut power_rx: mpsc::UnboundedReceiver<StopReason>,
) -> anyhow::Result<StopReason> {
    let reason = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            StopReason::Stop
        }
        Some(reason) = power_rx.recv() => reason,
    };
    Ok(reason)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        println!("alarm-daemon {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let log_path = init_logging(cli.debug)?;
    info!("Log file: {:?}", log_path);

    let config_dir = cli.config_dir.unwrap_or_else(platform::config_dir);
    let config = Config::load(&config_dir).map_err(|e| {
        error!("Unable to load configuration: {}", e);
        e
    })?;
    info!("Config loaded from: {:?}", Config::config_path(&config_dir));

    let (power_tx, power_rx) = mpsc::unbounded_channel();
    let app = App::start(config, cli.simulation, power_tx)
        .await
        .map_err(|e| {
            error!("Unable to start: {}", e);
            e
        })?;

    let reason = wait_for_stop(power_rx).await?;
    info!("Stop requested: {:?}", reason);
    app.stop(reason).await
}
