use std::sync::Arc;

use alarm_proto::config::Config;
use alarm_proto::protocol::WebradioId;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};

use super::{Launcher, PlaybackError, Session};
use crate::event::WebradioEvent;

/// Name and id of the station currently playing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub id: WebradioId,
    pub name: String,
}

#[derive(Clone)]
pub struct WebradioPlayer {
    shared: Arc<Shared>,
}

struct Shared {
    config: Arc<Config>,
    launcher: Arc<dyn Launcher>,
    events: mpsc::Sender<WebradioEvent>,
    inner: Mutex<Inner>,
}

struct Inner {
    current: Option<WebradioId>,
    session: Option<Session>,
    next_session: u64,
    send_events: bool,
}

impl Inner {
    fn clear(&mut self) {
        if let Some(session) = self.session.take() {
            session.kill();
        }
        self.current = None;
    }
}

impl WebradioPlayer {
    pub fn new(
        config: Arc<Config>,
        launcher: Arc<dyn Launcher>,
        events: mpsc::Sender<WebradioEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                launcher,
                events,
                inner: Mutex::new(Inner {
                    current: None,
                    session: None,
                    next_session: 1,
                    send_events: true,
                }),
            }),
        }
    }

    pub async fn play(&self, id: WebradioId) -> Result<(), PlaybackError> {
        let mut inner = self.shared.inner.lock().await;
        if inner.current == Some(id) {
            return Ok(());
        }

        let stations = self
            .shared
            .config
            .webradio_group(id.group_id)
            .ok_or(PlaybackError::UnknownGroup(id.group_id))?;
        let station = (id.index_id as usize)
            .checked_sub(1)
            .and_then(|idx| stations.get(idx))
            .ok_or(PlaybackError::UnknownWebradio(id))?;

        inner.clear();
        info!("Play webradio {}: {}", id, station.name);

        let session = Session::new(inner.next_session);
        inner.next_session += 1;
        let exit = self
            .shared
            .launcher
            .launch(&station.url, session.token())
            .map_err(|source| PlaybackError::Launch {
                target: station.name.clone(),
                source,
            })?;

        let session_id = session.id;
        inner.current = Some(id);
        inner.session = Some(session);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            exit.await;
            shared.on_exit(session_id).await;
        });
        Ok(())
    }

    pub async fn clear(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(id) = inner.current {
            info!("Stop webradio {}", id);
        }
        inner.clear();
    }

    pub async fn current(&self) -> Option<NowPlaying> {
        let id = self.shared.inner.lock().await.current?;
        let name = self.webradio_name(id)?;
        Some(NowPlaying { id, name })
    }

    pub fn webradio_name(&self, id: WebradioId) -> Option<String> {
        self.shared.config.webradio(id).map(|w| w.name.clone())
    }

    pub fn group_len(&self, group_id: u32) -> usize {
        self.shared
            .config
            .webradio_group(group_id)
            .map_or(0, |stations| stations.len())
    }

    pub async fn stop_sending_events(&self) {
        info!("Stop sending events for webradio player");
        self.shared.inner.lock().await.send_events = false;
    }

    pub async fn stop(&self) {
        info!("Stop webradio player");
        self.shared.inner.lock().await.clear();
    }
}

impl Shared {
    async fn on_exit(&self, session_id: u64) {
        let notify = {
            let mut inner = self.inner.lock().await;
            let current = inner.session.as_ref().is_some_and(|s| s.id == session_id);
            if !current {
                return;
            }
            warn!("Webradio stopped playing");
            inner.session = None;
            inner.current = None;
            inner.send_events
        };
        if notify && self.events.send(WebradioEvent::Stopped).await.is_err() {
            warn!("Webradio event dropped: coordinator gone");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::testing::FakeLauncher;

    fn config() -> Arc<Config> {
        let config: Config = toml::from_str(
            r#"
[[webradio_group]]
[[webradio_group.station]]
name = "FIP"
url = "http://radio.test/fip"
[[webradio_group.station]]
name = "Inter"
url = "http://radio.test/inter"
"#,
        )
        .unwrap();
        Arc::new(config)
    }

    fn player() -> (WebradioPlayer, FakeLauncher, mpsc::Receiver<WebradioEvent>) {
        let launcher = FakeLauncher::default();
        let (tx, rx) = mpsc::channel(8);
        let player = WebradioPlayer::new(config(), Arc::new(launcher.clone()), tx);
        (player, launcher, rx)
    }

    #[tokio::test]
    async fn test_play_same_station_is_noop() {
        let (player, launcher, _rx) = player();
        player.play(WebradioId::new(1, 1)).await.unwrap();
        player.play(WebradioId::new(1, 1)).await.unwrap();
        assert_eq!(launcher.launches(), vec!["http://radio.test/fip"]);

        player.play(WebradioId::new(1, 2)).await.unwrap();
        assert_eq!(launcher.launches().len(), 2);
        assert_eq!(player.current().await.unwrap().name, "Inter");
    }

    #[tokio::test]
    async fn test_unknown_targets() {
        let (player, launcher, _rx) = player();
        assert!(matches!(
            player.play(WebradioId::new(4, 1)).await,
            Err(PlaybackError::UnknownGroup(4))
        ));
        assert!(matches!(
            player.play(WebradioId::new(1, 3)).await,
            Err(PlaybackError::UnknownWebradio(_))
        ));
        assert!(launcher.launches().is_empty());
        assert!(player.current().await.is_none());
    }

    #[tokio::test]
    async fn test_exit_is_reported_once() {
        let (player, launcher, mut rx) = player();
        player.play(WebradioId::new(1, 1)).await.unwrap();
        launcher.finish(0);

        assert_eq!(rx.recv().await, Some(WebradioEvent::Stopped));
        assert!(player.current().await.is_none());
    }

    #[tokio::test]
    async fn test_cleared_session_exit_is_ignored() {
        let (player, launcher, mut rx) = player();
        player.play(WebradioId::new(1, 1)).await.unwrap();
        player.play(WebradioId::new(1, 2)).await.unwrap();
        player.clear().await;
        assert!(player.current().await.is_none());

        // Both killed processes have exited; neither may report.
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
        assert_eq!(launcher.launches().len(), 2);
    }

    #[tokio::test]
    async fn test_launch_failure_leaves_player_idle() {
        let (player, launcher, _rx) = player();
        launcher.fail_on("inter");
        let err = player.play(WebradioId::new(1, 2)).await.unwrap_err();
        assert!(err.to_string().contains("Inter"));
        assert!(player.current().await.is_none());
    }

    #[tokio::test]
    async fn test_no_events_after_stop_sending() {
        let (player, launcher, mut rx) = player();
        player.play(WebradioId::new(1, 1)).await.unwrap();
        player.stop_sending_events().await;
        launcher.finish(0);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(rx.try_recv().is_err());
    }
}
