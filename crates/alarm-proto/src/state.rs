use crate::protocol::{PlaylistId, WebradioId};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Delay between the last mutation and the state file being written.
pub const SAVE_DEBOUNCE: Duration = Duration::from_secs(10);

pub const MAX_VOLUME: u8 = 100;

/// What the alarm plays when it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AlarmTarget {
    Webradio(WebradioId),
    Playlist(PlaylistId),
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub hour: u8,
    pub minute: u8,
    #[serde(default)]
    pub target: AlarmTarget,
    #[serde(default)]
    pub enabled: bool,
}

impl Default for Alarm {
    fn default() -> Self {
        Self {
            hour: 8,
            minute: 0,
            target: AlarmTarget::None,
            enabled: false,
        }
    }
}

impl Alarm {
    /// Shifts the alarm time by `minutes` (any sign, any magnitude), wrapping
    /// around midnight.
    pub fn add_minutes(&mut self, minutes: i32) {
        let total = i64::from(self.hour) * 60 + i64::from(self.minute) + i64::from(minutes);
        let total = total.rem_euclid(24 * 60);
        self.hour = (total / 60) as u8;
        self.minute = (total % 60) as u8;
        debug!("New alarm value: {:02}:{:02}", self.hour, self.minute);
    }

    pub fn set_webradio(&mut self, id: WebradioId) {
        self.target = AlarmTarget::Webradio(id);
    }

    pub fn set_playlist(&mut self, id: PlaylistId) {
        self.target = AlarmTarget::Playlist(id);
    }

    pub fn webradio(&self) -> Option<WebradioId> {
        match self.target {
            AlarmTarget::Webradio(id) => Some(id),
            _ => None,
        }
    }

    pub fn playlist(&self) -> Option<PlaylistId> {
        match self.target {
            AlarmTarget::Playlist(id) => Some(id),
            _ => None,
        }
    }

    pub fn matches(&self, hour: u32, minute: u32) -> bool {
        u32::from(self.hour) == hour && u32::from(self.minute) == minute
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistentState {
    pub volume: u8,
    #[serde(default)]
    pub alarm: Alarm,
}

impl Default for PersistentState {
    fn default() -> Self {
        Self {
            volume: 40,
            alarm: Alarm::default(),
        }
    }
}

/// Volume and alarm, shared between the coordinator (writer) and the HTTP
/// handlers (readers).  Every mutation schedules a debounced save.
pub struct StateStore {
    state: RwLock<PersistentState>,
    state_file: PathBuf,
    debounce: Duration,
    pending_save: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl StateStore {
    pub fn new(state_file: PathBuf) -> anyhow::Result<Arc<Self>> {
        Self::with_debounce(state_file, SAVE_DEBOUNCE)
    }

    pub fn with_debounce(state_file: PathBuf, debounce: Duration) -> anyhow::Result<Arc<Self>> {
        let persistent = Self::load_persistent(&state_file)?;
        Ok(Arc::new(Self {
            state: RwLock::new(persistent),
            state_file,
            debounce,
            pending_save: Mutex::new(None),
        }))
    }

    pub async fn get_state(&self) -> PersistentState {
        *self.state.read().await
    }

    pub async fn volume(&self) -> u8 {
        self.state.read().await.volume
    }

    pub async fn alarm(&self) -> Alarm {
        self.state.read().await.alarm
    }

    /// Stores the volume clamped to 0–100 and returns the stored value.
    pub async fn set_volume(self: &Arc<Self>, volume: i64) -> u8 {
        let volume = volume.clamp(0, i64::from(MAX_VOLUME)) as u8;
        self.state.write().await.volume = volume;
        self.schedule_save();
        volume
    }

    /// Applies `f` to the alarm under the write lock and returns the result.
    pub async fn update_alarm<F>(self: &Arc<Self>, f: F) -> Alarm
    where
        F: FnOnce(&mut Alarm),
    {
        let alarm = {
            let mut state = self.state.write().await;
            f(&mut state.alarm);
            state.alarm
        };
        self.schedule_save();
        alarm
    }

    fn schedule_save(self: &Arc<Self>) {
        let store = Arc::clone(self);
        let debounce = self.debounce;
        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if let Err(e) = store.save().await {
                warn!("Unable to save state file {:?}: {}", store.state_file, e);
            }
        });

        let mut pending = self.pending_save.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = pending.replace(task) {
            previous.abort();
        }
    }

    /// Writes the state immediately if a save is still pending.
    pub async fn flush(&self) -> anyhow::Result<()> {
        let pending = self
            .pending_save
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(task) = pending {
            if !task.is_finished() {
                task.abort();
                self.save().await?;
            }
        }
        Ok(())
    }

    async fn save(&self) -> anyhow::Result<()> {
        let persistent = *self.state.read().await;
        info!("Save state file: {:?}", self.state_file);
        let json = serde_json::to_string_pretty(&persistent)?;
        crate::platform::write_atomic(&self.state_file, json.as_bytes())?;
        Ok(())
    }

    fn load_persistent(state_file: &Path) -> anyhow::Result<PersistentState> {
        match std::fs::read_to_string(state_file) {
            Ok(content) => serde_json::from_str::<PersistentState>(&content).map_err(|e| {
                anyhow::anyhow!("unable to interpret state file {}: {}", state_file.display(), e)
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No state file yet, using defaults");
                Ok(PersistentState::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}
