/// Coordinator: single owner of mode, pop-up, animation and snooze state.
///
/// Every producer (clock, buttons, HTTP API, the two players and the
/// coordinator's own timers) feeds its own channel.  `run` waits on all of
/// them and handles exactly one event per wake-up, so no two decisions ever
/// interleave.  Volume and alarm live in the `StateStore`, which HTTP
/// handlers read concurrently.
use std::sync::Arc;
use std::time::Duration;

use alarm_proto::config::Config;
use alarm_proto::state::{AlarmTarget, StateStore};
use chrono::Timelike;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::StopReason;
use crate::audio::Audio;
use crate::display::DisplaySink;
use crate::event::{
    ApiCommand, ApiRequest, ButtonEvent, ClockEvent, Event, InternalEvent, PlaylistEvent,
    WebradioEvent,
};
use crate::input::{self, Context, Intent};
use crate::mode::{Mode, PopUp};
use crate::player::arbiter::{next_playlist, next_webradio, PlaybackArbiter};
use crate::screen::{self, Frame};
use crate::timers::{is_current, Scheduled, Timers};

const POPUP_DURATION: Duration = Duration::from_millis(1200);
const ANIMATION_INTERVAL: Duration = Duration::from_millis(100);
const CHANNEL_CAPACITY: usize = 32;

/// Receiving ends of every producer channel.
pub struct EventSources {
    pub internal: mpsc::Receiver<InternalEvent>,
    pub clock: mpsc::Receiver<ClockEvent>,
    pub api: mpsc::Receiver<ApiRequest>,
    pub webradio: mpsc::Receiver<WebradioEvent>,
    pub playlist: mpsc::Receiver<PlaylistEvent>,
    pub buttons: mpsc::Receiver<ButtonEvent>,
}

/// Sending ends, handed out to the producers.
pub struct EventSenders {
    pub internal: mpsc::Sender<InternalEvent>,
    pub clock: mpsc::Sender<ClockEvent>,
    pub api: mpsc::Sender<ApiRequest>,
    pub webradio: mpsc::Sender<WebradioEvent>,
    pub playlist: mpsc::Sender<PlaylistEvent>,
    pub buttons: mpsc::Sender<ButtonEvent>,
}

pub fn channels() -> (EventSenders, EventSources) {
    let (internal_tx, internal_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (clock_tx, clock_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (api_tx, api_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (webradio_tx, webradio_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (playlist_tx, playlist_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (buttons_tx, buttons_rx) = mpsc::channel(CHANNEL_CAPACITY);
    (
        EventSenders {
            internal: internal_tx,
            clock: clock_tx,
            api: api_tx,
            webradio: webradio_tx,
            playlist: playlist_tx,
            buttons: buttons_tx,
        },
        EventSources {
            internal: internal_rx,
            clock: clock_rx,
            api: api_rx,
            webradio: webradio_rx,
            playlist: playlist_rx,
            buttons: buttons_rx,
        },
    )
}

/// Present while the alarm is ringing or snoozed.
struct SnoozeTimer {
    wake: Option<Scheduled>,
}

pub struct Coordinator {
    config: Arc<Config>,
    state: Arc<StateStore>,
    arbiter: PlaybackArbiter,
    audio: Audio,
    display: Box<dyn DisplaySink>,
    timers: Timers,
    power_off: mpsc::UnboundedSender<StopReason>,

    mode: Mode,
    popup: PopUp,
    popup_hide: Option<Scheduled>,
    animation: Option<Scheduled>,
    animation_tick: usize,
    snooze: Option<SnoozeTimer>,
}

impl Coordinator {
    pub fn new(
        config: Arc<Config>,
        state: Arc<StateStore>,
        arbiter: PlaybackArbiter,
        audio: Audio,
        display: Box<dyn DisplaySink>,
        internal_tx: mpsc::Sender<InternalEvent>,
        power_off: mpsc::UnboundedSender<StopReason>,
    ) -> Self {
        Self {
            config,
            state,
            arbiter,
            audio,
            display,
            timers: Timers::new(internal_tx),
            power_off,
            mode: Mode::Undefined,
            popup: PopUp::None,
            popup_hide: None,
            animation: None,
            animation_tick: 0,
            snooze: None,
        }
    }

    pub async fn show_intro(&mut self) {
        self.mode = Mode::Undefined;
        self.refresh(true).await;
    }

    pub async fn start_audio(&mut self) {
        self.audio.start().await;
    }

    pub async fn enter_clock_mode(&mut self) {
        self.mode = Mode::Clock;
        self.refresh(true).await;
    }

    /// Runs until `shutdown` is cancelled, then hands the coordinator back
    /// for the final teardown.
    pub async fn run(mut self, mut sources: EventSources, shutdown: CancellationToken) -> Self {
        info!("Coordinator: starting event loop");
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                Some(ev) = sources.internal.recv() => Event::Internal(ev),
                Some(ev) = sources.clock.recv() => Event::Clock(ev),
                Some(req) = sources.api.recv() => Event::Api(req),
                Some(ev) = sources.webradio.recv() => Event::Webradio(ev),
                Some(ev) = sources.playlist.recv() => Event::Playlist(ev),
                Some(ev) = sources.buttons.recv() => Event::Button(ev),
                else => {
                    info!("Coordinator: every producer is gone");
                    break;
                }
            };
            self.dispatch(event).await;
        }
        info!("Coordinator: event loop stopped");
        self
    }

    pub(crate) async fn dispatch(&mut self, event: Event) {
        match event {
            Event::Internal(InternalEvent::PopupHide(token)) => {
                if is_current(&self.popup_hide, token) {
                    self.popup_hide = None;
                    self.refresh(true).await;
                }
            }
            Event::Internal(InternalEvent::AnimationTick(token)) => {
                if is_current(&self.animation, token) {
                    self.animation = None;
                    self.animation_tick += 1;
                    self.refresh(false).await;
                }
            }
            Event::Internal(InternalEvent::SnoozeWake(token)) => {
                let due = self
                    .snooze
                    .as_mut()
                    .filter(|s| is_current(&s.wake, token))
                    .map(|s| s.wake = None)
                    .is_some();
                if due {
                    info!("Snooze is over");
                    self.fire_alarm().await;
                }
            }
            Event::Clock(ClockEvent::MinuteTick) => {
                if self.mode == Mode::Clock && self.popup == PopUp::None {
                    self.refresh(false).await;
                }
            }
            Event::Clock(ClockEvent::AlarmDue) => {
                self.clear_snooze();
                self.snooze = Some(SnoozeTimer { wake: None });
                self.fire_alarm().await;
            }
            Event::Api(request) => self.on_api(request).await,
            Event::Webradio(WebradioEvent::Stopped) => {
                debug!("Receive webradio stopped event");
                self.refresh(true).await;
            }
            Event::Playlist(PlaylistEvent::TrackChanged) => {
                debug!("Receive playlist track changed event");
                self.refresh(true).await;
            }
            Event::Button(event) => {
                debug!(
                    "Receive button event: {:?} {:?} {}",
                    event.button, event.phase, event.step_count
                );
                let context = self.context().await;
                if let Some(intent) = input::interpret(&event, &context) {
                    self.execute(intent).await;
                }
            }
        }
    }

    async fn context(&self) -> Context {
        Context {
            mode: self.mode,
            alarm_ringing: self.snooze.is_some(),
            playlist_active: self.arbiter.current_playlist().await.is_some(),
            webradio_groups: self.config.webradio_groups.len() as u32,
        }
    }

    async fn execute(&mut self, intent: Intent) {
        debug!("Execute {:?}", intent);
        match intent {
            Intent::PlayNextWebradio { group_id } => {
                let current = self.arbiter.current_webradio().await.map(|w| w.id);
                let len = self.arbiter.group_len(group_id);
                if let Some(next) = next_webradio(current, group_id, len) {
                    self.clear_snooze();
                    if let Err(e) = self.arbiter.play_webradio(next).await {
                        warn!("{}", e);
                    }
                }
                self.refresh(true).await;
            }
            Intent::CycleAlarmWebradio { group_id } => {
                let current = self.state.alarm().await.webradio();
                let len = self.arbiter.group_len(group_id);
                if let Some(next) = next_webradio(current, group_id, len) {
                    self.state.update_alarm(|a| a.set_webradio(next)).await;
                }
                self.refresh(true).await;
            }
            Intent::PlayNextPlaylist => {
                let current = self.arbiter.current_playlist().await.map(|p| p.id);
                if let Some(next) = next_playlist(current, self.arbiter.playlist_count()) {
                    self.clear_snooze();
                    if let Err(e) = self.arbiter.play_playlist(next).await {
                        warn!("{}", e);
                    }
                }
                self.refresh(true).await;
            }
            Intent::CycleAlarmPlaylist => {
                let current = self.state.alarm().await.playlist();
                if let Some(next) = next_playlist(current, self.arbiter.playlist_count()) {
                    self.state.update_alarm(|a| a.set_playlist(next)).await;
                }
                self.refresh(true).await;
            }
            Intent::SwitchMode => {
                self.mode = self.mode.toggled();
                debug!("Switch to {:?} mode", self.mode);
                self.refresh(true).await;
            }
            Intent::ToggleAlarmEnabled => {
                let alarm = self.state.update_alarm(|a| a.enabled = !a.enabled).await;
                info!("Alarm {}", if alarm.enabled { "enabled" } else { "disabled" });
                self.refresh(true).await;
            }
            Intent::AdjustVolume(delta) => {
                self.audio.adjust_volume(delta).await;
                self.show_popup(PopUp::Volume).await;
            }
            Intent::AdjustAlarm(minutes) => {
                self.state.update_alarm(|a| a.add_minutes(minutes)).await;
                self.refresh(true).await;
            }
            Intent::SwitchDisplay => {
                self.display.switch();
            }
            Intent::Snooze => {
                debug!("Stop playing sound");
                self.rearm_snooze();
                self.arbiter.stop_all().await;
                self.refresh(true).await;
            }
            Intent::SnoozeOff => {
                info!("Snooze off");
                self.clear_snooze();
                self.show_popup(PopUp::SnoozeOff).await;
            }
            Intent::NextSong => {
                debug!("Next song in playlist");
                self.arbiter.next_song().await;
                self.refresh(true).await;
            }
            Intent::PowerOff => {
                info!("See you!");
                self.clear_snooze();
                if self.power_off.send(StopReason::Halt).is_err() {
                    warn!("Power-off request dropped: nobody is listening");
                }
            }
        }
    }

    async fn on_api(&mut self, request: ApiRequest) {
        let ApiRequest { command, reply } = request;
        info!("API request: {:?}", command);
        let (result, rerender) = match command {
            ApiCommand::PlayWebradio(id) => {
                self.clear_snooze();
                (self.arbiter.play_webradio(id).await, true)
            }
            ApiCommand::PlayPlaylist(id) => {
                self.clear_snooze();
                (self.arbiter.play_playlist(id).await, true)
            }
            ApiCommand::SetVolume(volume) => {
                self.audio.set_volume(volume).await;
                (Ok(()), false)
            }
        };
        if let Err(e) = &result {
            warn!("{}", e);
        }
        if reply.send(result).is_err() {
            debug!("API caller went away before the reply");
        }
        if rerender {
            self.refresh(true).await;
        }
    }

    /// Plays the alarm target.  Failures are logged; the alarm stays armed.
    async fn fire_alarm(&mut self) {
        let alarm = self.state.alarm().await;
        info!("Alarm! {:02}:{:02}", alarm.hour, alarm.minute);
        let result = match alarm.target {
            AlarmTarget::Webradio(id) => self.arbiter.play_webradio(id).await,
            AlarmTarget::Playlist(id) => self.arbiter.play_playlist(id).await,
            AlarmTarget::None => {
                warn!("Alarm has no target to play");
                Ok(())
            }
        };
        if let Err(e) = result {
            warn!("{}", e);
        }
        self.refresh(true).await;
    }

    fn rearm_snooze(&mut self) {
        let Some(snooze) = self.snooze.as_mut() else {
            return;
        };
        if let Some(wake) = snooze.wake.take() {
            wake.cancel();
        }
        let secs = self.config.daemon.snooze_duration_secs;
        info!("Snooze for {} seconds", secs);
        snooze.wake = Some(
            self.timers
                .schedule(Duration::from_secs(secs), InternalEvent::SnoozeWake),
        );
    }

    fn clear_snooze(&mut self) {
        if let Some(snooze) = self.snooze.take() {
            if let Some(wake) = snooze.wake {
                wake.cancel();
            }
        }
    }

    async fn show_popup(&mut self, popup: PopUp) {
        if let Some(hide) = self.popup_hide.take() {
            hide.cancel();
        }
        self.popup = popup;
        self.popup_hide = Some(self.timers.schedule(POPUP_DURATION, InternalEvent::PopupHide));
        self.refresh(false).await;
    }

    /// Composes and shows the current screen.  `reset` drops the pop-up and
    /// restarts the marquee.
    async fn refresh(&mut self, reset: bool) {
        if let Some(animation) = self.animation.take() {
            animation.cancel();
        }
        if reset {
            self.animation_tick = 0;
            self.popup = PopUp::None;
            if let Some(hide) = self.popup_hide.take() {
                hide.cancel();
            }
        }

        let frame = self.frame().await;
        let screen = screen::compose(&frame);
        self.display.show(&screen);

        if screen.is_animated() {
            self.animation = Some(
                self.timers
                    .schedule(ANIMATION_INTERVAL, InternalEvent::AnimationTick),
            );
        }
    }

    async fn frame(&self) -> Frame {
        let state = self.state.get_state().await;
        let now = chrono::Local::now();
        let now_playing = match self.mode {
            Mode::Clock => self.arbiter.now_playing().await,
            _ => None,
        };
        let alarm_target = match (self.mode, state.alarm.target) {
            (Mode::AlarmSetting, AlarmTarget::Webradio(id)) => self.arbiter.webradio_name(id),
            (Mode::AlarmSetting, AlarmTarget::Playlist(id)) => self.arbiter.playlist_name(id),
            _ => None,
        };
        Frame {
            mode: self.mode,
            popup: self.popup,
            animation_tick: self.animation_tick,
            time: (now.hour(), now.minute()),
            alarm: state.alarm,
            ringing: self.snooze.is_some(),
            volume: state.volume,
            now_playing,
            alarm_target,
        }
    }

    /// Final teardown once the loop has stopped.
    pub async fn shutdown(&mut self) {
        self.mode = Mode::End;
        self.clear_snooze();
        self.refresh(true).await;
        self.arbiter.stop().await;
        self.audio.stop().await;
        self.display.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockWatch;
    use crate::display::testing::RecordingDisplay;
    use crate::event::ButtonId;
    use crate::player::playlist::{LocalCatalog, PlaylistPlayer};
    use crate::player::testing::FakeLauncher;
    use crate::player::webradio::WebradioPlayer;
    use crate::player::PlaybackError;
    use crate::screen::{Label, Screen};
    use crate::task::TaskHandle;
    use alarm_proto::config::AudioConfig;
    use alarm_proto::protocol::{PlaylistId, WebradioId};
    use tokio::sync::oneshot;

    const CONFIG: &str = r#"
[daemon]
snooze_duration_secs = 300

[audio]
mixer_enabled = false
filler_enabled = false

[[webradio_group]]
[[webradio_group.station]]
name = "FIP"
url = "http://radio.test/fip"
[[webradio_group.station]]
name = "Inter"
url = "http://radio.test/inter"

[[webradio_group]]
[[webradio_group.station]]
name = "Nova"
url = "http://radio.test/nova"
[[webradio_group.station]]
name = "Nova Jazz Classique et Musiques du Monde"
url = "http://radio.test/nova-jazz"
"#;

    struct Harness {
        coordinator: Coordinator,
        launcher: FakeLauncher,
        display: RecordingDisplay,
        state: Arc<StateStore>,
        senders: EventSenders,
        sources: EventSources,
        power_rx: mpsc::UnboundedReceiver<StopReason>,
        _dir: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let library = dir.path().join("playlist");
        std::fs::create_dir_all(library.join("morning")).unwrap();
        std::fs::write(library.join("morning").join("wake.mp3"), b"").unwrap();

        let config: Arc<Config> = Arc::new(toml::from_str(CONFIG).unwrap());
        let state = StateStore::new(dir.path().join("state.json")).unwrap();
        let launcher = FakeLauncher::default();
        let shared_launcher = Arc::new(launcher.clone());
        let display = RecordingDisplay::new();
        let (senders, sources) = channels();
        let (power_tx, power_rx) = mpsc::unbounded_channel();

        let arbiter = PlaybackArbiter::new(
            WebradioPlayer::new(config.clone(), shared_launcher.clone(), senders.webradio.clone()),
            PlaylistPlayer::new(
                Arc::new(LocalCatalog::new(library)),
                shared_launcher,
                senders.playlist.clone(),
            ),
        );
        let audio = Audio::new(
            state.clone(),
            AudioConfig {
                mixer_enabled: false,
                filler_enabled: false,
                ..AudioConfig::default()
            },
        );
        let coordinator = Coordinator::new(
            config,
            state.clone(),
            arbiter,
            audio,
            Box::new(display.clone()),
            senders.internal.clone(),
            power_tx,
        );

        Harness {
            coordinator,
            launcher,
            display,
            state,
            senders,
            sources,
            power_rx,
            _dir: dir,
        }
    }

    async fn in_clock_mode() -> Harness {
        let mut h = harness();
        h.coordinator.enter_clock_mode().await;
        h
    }

    async fn press(h: &mut Harness, button: ButtonId, step: u32) {
        h.coordinator
            .dispatch(Event::Button(ButtonEvent::press(button, step)))
            .await;
    }

    async fn release(h: &mut Harness, button: ButtonId, step: u32) {
        h.coordinator
            .dispatch(Event::Button(ButtonEvent::release(button, step)))
            .await;
    }

    async fn api(h: &mut Harness, command: ApiCommand) -> Result<(), PlaybackError> {
        let (reply, rx) = oneshot::channel();
        h.coordinator
            .dispatch(Event::Api(ApiRequest { command, reply }))
            .await;
        rx.await.unwrap()
    }

    #[tokio::test]
    async fn test_alarm_edge_plays_exactly_once() {
        let mut h = in_clock_mode().await;
        h.state
            .update_alarm(|a| {
                a.hour = 8;
                a.minute = 0;
                a.enabled = true;
                a.set_webradio(WebradioId::new(1, 2));
            })
            .await;

        let mut watch = ClockWatch::default();
        let alarm = h.state.alarm().await;
        for now in [(7, 59), (8, 0), (8, 0)] {
            for event in watch.tick(now, &alarm) {
                h.coordinator.dispatch(Event::Clock(event)).await;
            }
        }

        assert_eq!(h.launcher.launches(), vec!["http://radio.test/inter"]);
        assert!(h.coordinator.snooze.is_some());
        assert!(matches!(h.display.last(), Some(Screen::Clock { ringing: true, .. })));
        assert!(h.state.alarm().await.enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snooze_stops_playback_and_wakes_again() {
        let mut h = in_clock_mode().await;
        h.state
            .update_alarm(|a| a.set_playlist(PlaylistId(1)))
            .await;
        h.coordinator.dispatch(Event::Clock(ClockEvent::AlarmDue)).await;
        assert_eq!(h.launcher.launches().len(), 1);

        press(&mut h, ButtonId::Snooze, 5).await;
        assert!(h.coordinator.arbiter.now_playing().await.is_none());
        assert!(h.coordinator.snooze.is_some());

        let wake = h.sources.internal.recv().await.unwrap();
        assert!(matches!(wake, InternalEvent::SnoozeWake(_)));
        h.coordinator.dispatch(Event::Internal(wake)).await;
        assert_eq!(h.launcher.launches().len(), 2);
        assert_eq!(
            h.coordinator.arbiter.now_playing().await.as_deref(),
            Some("morning:wake")
        );
    }

    #[tokio::test]
    async fn test_snooze_press_without_alarm_only_stops() {
        let mut h = in_clock_mode().await;
        press(&mut h, ButtonId::Digit1, 1).await;
        press(&mut h, ButtonId::Snooze, 5).await;
        assert!(h.coordinator.arbiter.now_playing().await.is_none());
        assert!(h.coordinator.snooze.is_none());
    }

    #[tokio::test]
    async fn test_snooze_off_only_while_ringing() {
        let mut h = in_clock_mode().await;
        press(&mut h, ButtonId::Snooze, 15).await;
        assert!(matches!(h.display.last(), Some(Screen::Clock { .. })));

        h.coordinator.dispatch(Event::Clock(ClockEvent::AlarmDue)).await;
        press(&mut h, ButtonId::Snooze, 15).await;
        assert_eq!(h.display.last(), Some(Screen::SnoozeOff));
        assert!(h.coordinator.snooze.is_none());
    }

    #[tokio::test]
    async fn test_digit_cycles_group_and_clears_snooze() {
        let mut h = in_clock_mode().await;
        h.coordinator.dispatch(Event::Clock(ClockEvent::AlarmDue)).await;
        assert!(h.coordinator.snooze.is_some());

        press(&mut h, ButtonId::Digit1, 1).await;
        assert!(h.coordinator.snooze.is_none());
        press(&mut h, ButtonId::Digit1, 2).await;
        press(&mut h, ButtonId::Digit1, 4).await;
        press(&mut h, ButtonId::Digit1, 7).await;
        assert_eq!(
            h.launcher.launches(),
            vec![
                "http://radio.test/fip",
                "http://radio.test/inter",
                "http://radio.test/fip"
            ]
        );

        // Unconfigured group.
        press(&mut h, ButtonId::Digit3, 1).await;
        assert_eq!(h.launcher.launches().len(), 3);
    }

    #[tokio::test]
    async fn test_alarm_setting_mode_edits_alarm() {
        let mut h = in_clock_mode().await;
        release(&mut h, ButtonId::AlarmSetting, 3).await;
        assert_eq!(h.coordinator.mode, Mode::AlarmSetting);

        press(&mut h, ButtonId::Less, 1).await;
        press(&mut h, ButtonId::Digit2, 1).await;
        let alarm = h.state.alarm().await;
        assert_eq!((alarm.hour, alarm.minute), (7, 59));
        assert_eq!(alarm.webradio(), Some(WebradioId::new(2, 1)));
        assert!(h.launcher.launches().is_empty());
        assert!(
            matches!(h.display.last(), Some(Screen::AlarmSettings { label, .. }) if label.text == "Nova")
        );

        press(&mut h, ButtonId::Playlist, 1).await;
        assert_eq!(h.state.alarm().await.playlist(), Some(PlaylistId(1)));

        release(&mut h, ButtonId::AlarmSetting, 7).await;
        assert_eq!(h.coordinator.mode, Mode::AlarmSetting);
        release(&mut h, ButtonId::AlarmSetting, 1).await;
        assert_eq!(h.coordinator.mode, Mode::Clock);

        press(&mut h, ButtonId::AlarmSetting, 6).await;
        assert!(h.state.alarm().await.enabled);
    }

    #[tokio::test]
    async fn test_volume_popup_hides_on_current_token_only() {
        let mut h = in_clock_mode().await;
        press(&mut h, ButtonId::More, 1).await;
        let stale = h.coordinator.popup_hide.as_ref().unwrap().token();
        press(&mut h, ButtonId::More, 2).await;
        assert_eq!(h.display.last(), Some(Screen::Volume { volume: 48 }));

        h.coordinator
            .dispatch(Event::Internal(InternalEvent::PopupHide(stale)))
            .await;
        assert_eq!(h.coordinator.popup, PopUp::Volume);

        let current = h.coordinator.popup_hide.as_ref().unwrap().token();
        h.coordinator
            .dispatch(Event::Internal(InternalEvent::PopupHide(current)))
            .await;
        assert_eq!(h.coordinator.popup, PopUp::None);
        assert!(matches!(h.display.last(), Some(Screen::Clock { .. })));
    }

    fn clock_label(h: &Harness) -> Label {
        match h.display.last() {
            Some(Screen::Clock { label, .. }) => label,
            other => panic!("expected the clock screen, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_marquee_advances_on_current_tick_and_resets() {
        let mut h = in_clock_mode().await;
        api(&mut h, ApiCommand::PlayWebradio(WebradioId::new(2, 2))).await.unwrap();
        assert_eq!(clock_label(&h).scroll, Some(0));
        let first = h.coordinator.animation.as_ref().unwrap().token();

        h.coordinator
            .dispatch(Event::Internal(InternalEvent::AnimationTick(first)))
            .await;
        assert_eq!(h.coordinator.animation_tick, 1);
        assert_eq!(clock_label(&h).scroll, Some(1));
        let second = h.coordinator.animation.as_ref().unwrap().token();
        assert_ne!(first, second);

        let shown = h.display.frames.lock().unwrap().len();
        h.coordinator
            .dispatch(Event::Internal(InternalEvent::AnimationTick(first)))
            .await;
        assert_eq!(h.coordinator.animation_tick, 1);
        assert_eq!(h.display.frames.lock().unwrap().len(), shown);

        // Soft re-render keeps the marquee position.
        h.coordinator.dispatch(Event::Clock(ClockEvent::MinuteTick)).await;
        assert_eq!(h.coordinator.animation_tick, 1);
        assert_eq!(clock_label(&h).scroll, Some(1));

        h.coordinator.arbiter.stop_all().await;
        h.coordinator
            .dispatch(Event::Webradio(WebradioEvent::Stopped))
            .await;
        assert_eq!(h.coordinator.animation_tick, 0);
        assert_eq!(clock_label(&h).scroll, None);
        assert!(h.coordinator.animation.is_none());
    }

    #[tokio::test]
    async fn test_minute_tick_skipped_under_popup() {
        let mut h = in_clock_mode().await;
        press(&mut h, ButtonId::Less, 1).await;
        let shown = h.display.frames.lock().unwrap().len();
        h.coordinator.dispatch(Event::Clock(ClockEvent::MinuteTick)).await;
        assert_eq!(h.display.frames.lock().unwrap().len(), shown);
    }

    #[tokio::test]
    async fn test_api_play_replies_and_switches_source() {
        let mut h = in_clock_mode().await;
        api(&mut h, ApiCommand::PlayPlaylist(PlaylistId(1))).await.unwrap();
        h.coordinator.dispatch(Event::Clock(ClockEvent::AlarmDue)).await;

        api(&mut h, ApiCommand::PlayWebradio(WebradioId::new(2, 1))).await.unwrap();
        assert!(h.coordinator.snooze.is_none());
        assert!(h.coordinator.arbiter.current_playlist().await.is_none());

        let err = api(&mut h, ApiCommand::PlayWebradio(WebradioId::new(9, 1)))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::UnknownGroup(9)));

        api(&mut h, ApiCommand::SetVolume(250)).await.unwrap();
        assert_eq!(h.state.volume().await, 100);
    }

    #[tokio::test]
    async fn test_next_song_only_with_playlist() {
        let mut h = in_clock_mode().await;
        release(&mut h, ButtonId::NextPowerOff, 1).await;
        assert!(h.launcher.launches().is_empty());

        press(&mut h, ButtonId::Playlist, 1).await;
        release(&mut h, ButtonId::NextPowerOff, 1).await;
        // Single-track playlist: skipping ends it.
        assert!(h.coordinator.arbiter.current_playlist().await.is_none());
    }

    #[tokio::test]
    async fn test_power_off_requests_halt() {
        let mut h = in_clock_mode().await;
        h.coordinator.dispatch(Event::Clock(ClockEvent::AlarmDue)).await;
        press(&mut h, ButtonId::NextPowerOff, 20).await;
        assert_eq!(h.power_rx.try_recv().ok(), Some(StopReason::Halt));
        assert!(h.coordinator.snooze.is_none());
    }

    #[tokio::test]
    async fn test_display_switch() {
        let mut h = in_clock_mode().await;
        release(&mut h, ButtonId::Snooze, 1).await;
        assert!(!h.display.is_on());
        release(&mut h, ButtonId::Snooze, 4).await;
        assert!(h.display.is_on());
    }

    #[tokio::test]
    async fn test_loop_processes_events_until_stopped() {
        let h = harness();
        let Harness {
            mut coordinator,
            launcher,
            display,
            senders,
            sources,
            ..
        } = h;
        coordinator.show_intro().await;
        assert_eq!(display.last(), Some(Screen::Intro));
        coordinator.enter_clock_mode().await;

        let task = TaskHandle::spawn("coordinator", move |token| coordinator.run(sources, token));
        senders
            .buttons
            .send(ButtonEvent::press(ButtonId::Digit2, 1))
            .await
            .unwrap();

        let (reply, rx) = oneshot::channel();
        senders
            .api
            .send(ApiRequest {
                command: ApiCommand::SetVolume(12),
                reply,
            })
            .await
            .unwrap();
        rx.await.unwrap().unwrap();

        // The two channels are served in no fixed order.
        for _ in 0..100 {
            if !launcher.launches().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let mut coordinator = task.stop().await.unwrap();
        coordinator.shutdown().await;
        assert_eq!(launcher.launches(), vec!["http://radio.test/nova"]);
        assert_eq!(display.last(), Some(Screen::End));
        assert!(!display.is_on());
    }
}
