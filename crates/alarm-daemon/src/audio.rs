/// Volume control and the silence filler.
///
/// The volume itself lives in the state store; this module applies it to
/// the ALSA mixer through `amixer`.  The filler is an `aplay` reading
/// `/dev/zero` so the card stays open between tracks.
use std::process::Stdio;
use std::sync::Arc;

use alarm_proto::config::AudioConfig;
use alarm_proto::state::StateStore;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

pub struct Audio {
    state: Arc<StateStore>,
    config: AudioConfig,
    filler: Option<Child>,
}

impl Audio {
    pub fn new(state: Arc<StateStore>, config: AudioConfig) -> Self {
        Self {
            state,
            config,
            filler: None,
        }
    }

    pub async fn start(&mut self) {
        if self.config.filler_enabled && self.filler.is_none() {
            let child = Command::new("aplay")
                .args([
                    "-D", "default", "-t", "raw", "-r", "44100", "-c", "2", "-f", "S16_LE",
                    "/dev/zero",
                ])
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn();
            match child {
                Ok(child) => {
                    info!("Start audio filler");
                    self.filler = Some(child);
                }
                Err(e) => warn!("Unable to start audio filler: {}", e),
            }
        }

        let volume = self.state.volume().await;
        self.apply(volume).await;
    }

    pub async fn stop(&mut self) {
        if let Some(mut child) = self.filler.take() {
            info!("Stop audio filler");
            if let Err(e) = child.kill().await {
                warn!("Unable to stop audio filler: {}", e);
            }
        }
    }

    /// Moves the volume by `delta` and returns the clamped result.
    pub async fn adjust_volume(&mut self, delta: i32) -> u8 {
        let current = i64::from(self.state.volume().await);
        self.set_volume(current + i64::from(delta)).await
    }

    pub async fn set_volume(&mut self, volume: i64) -> u8 {
        let volume = self.state.set_volume(volume).await;
        self.apply(volume).await;
        volume
    }

    async fn apply(&self, volume: u8) {
        if !self.config.mixer_enabled {
            debug!("Mixer disabled, volume {}% not applied", volume);
            return;
        }
        let status = Command::new("amixer")
            .args(["set", &self.config.mixer_control, &format!("{}%", volume)])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) if status.success() => debug!("Volume set to {}%", volume),
            Ok(status) => warn!("amixer exited with {}", status),
            Err(e) => warn!("Unable to run amixer: {}", e),
        }
    }
}
