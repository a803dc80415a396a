use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use alarm_proto::config::{Config, PlaylistSource};
use alarm_proto::platform;
use alarm_proto::state::StateStore;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::audio::Audio;
use crate::buttons::{self, SharedPins};
use crate::clock;
use crate::coordinator::{self, Coordinator};
use crate::display::{DisplaySink, LogDisplay};
use crate::http;
use crate::player::arbiter::PlaybackArbiter;
use crate::player::playlist::{LocalCatalog, PlaylistCatalog, PlaylistPlayer, RemoteCatalog};
use crate::player::webradio::WebradioPlayer;
use crate::player::{Launcher, ProcessLauncher};
use crate::task::TaskHandle;

const INTRO_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Stop,
    /// Stop, then power the host down.
    Halt,
}

pub struct App {
    config: Arc<Config>,
    state: Arc<StateStore>,
    arbiter: PlaybackArbiter,
    http: Option<TaskHandle>,
    console: Option<TaskHandle>,
    buttons: TaskHandle,
    clock: TaskHandle,
    coordinator: TaskHandle<Coordinator>,
}

impl App {
    pub async fn start(
        mut config: Config,
        simulation: bool,
        power_off: mpsc::UnboundedSender<StopReason>,
    ) -> anyhow::Result<Self> {
        if simulation {
            info!("Simulation mode: mixer and audio filler disabled");
            config.audio.mixer_enabled = false;
            config.audio.filler_enabled = false;
        }
        let config = Arc::new(config);
        let state = StateStore::new(config.state_path())?;
        let (senders, sources) = coordinator::channels();

        let http = if config.api.enabled {
            Some(http::spawn(&config.api, state.clone(), senders.api.clone()).await?)
        } else {
            info!("HTTP API disabled");
            None
        };

        let binary = platform::find_player_binary(&config.player.binary).unwrap_or_else(|| {
            warn!("Player binary {} not found", config.player.binary);
            PathBuf::from(&config.player.binary)
        });
        info!("Player binary: {:?}", binary);
        let launcher: Arc<dyn Launcher> =
            Arc::new(ProcessLauncher::new(binary, config.player.args.clone()));

        let catalog: Arc<dyn PlaylistCatalog> = match config.playlists.source {
            PlaylistSource::Local => {
                info!("Local playlists in {:?}", config.playlist_folder());
                Arc::new(LocalCatalog::new(config.playlist_folder()))
            }
            PlaylistSource::Remote => {
                let client = reqwest::Client::new();
                Arc::new(RemoteCatalog::fetch(&client, &config.playlists.remote).await)
            }
        };

        let arbiter = PlaybackArbiter::new(
            WebradioPlayer::new(config.clone(), launcher.clone(), senders.webradio.clone()),
            PlaylistPlayer::new(catalog, launcher, senders.playlist.clone()),
        );
        let audio = Audio::new(state.clone(), config.audio.clone());
        let display: Box<dyn DisplaySink> = Box::new(LogDisplay::new(simulation));

        let mut coordinator = Coordinator::new(
            config.clone(),
            state.clone(),
            arbiter.clone(),
            audio,
            display,
            senders.internal.clone(),
            power_off,
        );
        coordinator.show_intro().await;
        tokio::time::sleep(INTRO_DURATION).await;
        coordinator.start_audio().await;
        coordinator.enter_clock_mode().await;

        let coordinator =
            TaskHandle::spawn("coordinator", move |token| coordinator.run(sources, token));
        let pins = SharedPins::default();
        let buttons = buttons::spawn(pins.clone(), senders.buttons);
        let console = simulation.then(|| buttons::spawn_console(pins));
        let clock = clock::spawn(state.clone(), senders.clock);

        info!("Alarm radio started");
        Ok(Self {
            config,
            state,
            arbiter,
            http,
            console,
            buttons,
            clock,
            coordinator,
        })
    }

    pub async fn stop(self, reason: StopReason) -> anyhow::Result<()> {
        info!("Stopping ({:?})", reason);

        if let Some(http) = self.http {
            stop_producer(http).await;
        }
        if let Some(console) = self.console {
            stop_producer(console).await;
        }
        stop_producer(self.buttons).await;
        stop_producer(self.clock).await;
        self.arbiter.stop_sending_events().await;

        let mut coordinator = self.coordinator.stop().await?;
        coordinator.shutdown().await;

        if let Err(e) = self.state.flush().await {
            warn!("Unable to save state: {}", e);
        }

        if reason == StopReason::Halt {
            halt(&self.config.daemon.halt_command).await;
        }
        info!("Stopped");
        Ok(())
    }
}

async fn stop_producer(task: TaskHandle) {
    let name = task.name();
    if let Err(e) = task.stop().await {
        warn!("{} did not stop cleanly: {}", name, e);
    }
}

async fn halt(command: &[String]) {
    let Some((program, args)) = command.split_first() else {
        warn!("No halt command configured");
        return;
    };
    info!("Halt: {}", command.join(" "));
    match tokio::process::Command::new(program).args(args).status().await {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Halt command exited with {}", status),
        Err(e) => warn!("Unable to run halt command: {}", e),
    }
}
