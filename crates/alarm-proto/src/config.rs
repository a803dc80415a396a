use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::protocol::WebradioId;

const CONFIG_FILENAME: &str = "config.toml";
const STATE_FILENAME: &str = "state.json";
const PLAYLIST_FOLDER: &str = "playlist";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub playlists: PlaylistsConfig,
    /// Radio groups in digit-button order: the first table is group 1.
    #[serde(default, rename = "webradio_group")]
    pub webradio_groups: Vec<WebradioGroup>,

    /// Directory the configuration was loaded from.
    #[serde(skip)]
    pub config_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Seconds an alarm stays quiet after a snooze.
    #[serde(default = "default_snooze_duration")]
    pub snooze_duration_secs: u64,
    /// Command run after a power-off shutdown.
    #[serde(default = "default_halt_command")]
    pub halt_command: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_enabled")]
    pub enabled: bool,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub api_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player binary name or path; looked up on PATH when bare.
    #[serde(default = "default_player_binary")]
    pub binary: String,
    /// Arguments placed before the stream URL or file path.
    #[serde(default = "default_player_args")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_true")]
    pub mixer_enabled: bool,
    /// ALSA simple control driven by `amixer`.
    #[serde(default = "default_mixer_control")]
    pub mixer_control: String,
    /// Keep the sound card busy with silence to avoid pops between tracks.
    #[serde(default = "default_true")]
    pub filler_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistSource {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistsConfig {
    #[serde(default)]
    pub source: PlaylistSource,
    /// Folder of playlist sub-directories; relative paths are resolved
    /// against the config directory.
    #[serde(default = "default_playlist_folder")]
    pub folder: PathBuf,
    #[serde(default)]
    pub remote: Vec<RemotePlaylist>,
}

/// A named M3U list fetched at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePlaylist {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WebradioGroup {
    #[serde(default, rename = "station")]
    pub stations: Vec<Webradio>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webradio {
    pub name: String,
    pub url: String,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            snooze_duration_secs: default_snooze_duration(),
            halt_command: default_halt_command(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: default_api_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
            api_key: String::new(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: default_player_binary(),
            args: default_player_args(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            mixer_enabled: true,
            mixer_control: default_mixer_control(),
            filler_enabled: true,
        }
    }
}

impl Default for PlaylistsConfig {
    fn default() -> Self {
        Self {
            source: PlaylistSource::Local,
            folder: default_playlist_folder(),
            remote: Vec::new(),
        }
    }
}

fn default_snooze_duration() -> u64 {
    600
}

fn default_halt_command() -> Vec<String> {
    vec!["sudo".to_string(), "halt".to_string()]
}

fn default_api_enabled() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_player_binary() -> String {
    crate::platform::player_binary_name().to_string()
}

fn default_player_args() -> Vec<String> {
    vec!["--no-video".to_string(), "--really-quiet".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_mixer_control() -> String {
    "PCM".to_string()
}

fn default_playlist_folder() -> PathBuf {
    PathBuf::from(PLAYLIST_FOLDER)
}

fn generate_api_key() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

impl Config {
    /// Loads `config.toml` from `config_dir`, writing a default one (with a
    /// freshly generated API key) when it does not exist yet.
    pub fn load(config_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(config_dir)?;
        let config_path = Self::config_path(config_dir);

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Self>(&content)
                .map_err(|e| anyhow::anyhow!("unable to interpret {}: {}", config_path.display(), e))?
        } else {
            tracing::info!("Create default config file {:?}", config_path);
            let mut config = Self::default();
            config.api.api_key = generate_api_key();
            config.config_dir = config_dir.to_path_buf();
            config.save()?;
            config
        };

        config.config_dir = config_dir.to_path_buf();
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        crate::platform::write_atomic(&Self::config_path(&self.config_dir), content.as_bytes())?;
        Ok(())
    }

    pub fn config_path(config_dir: &Path) -> PathBuf {
        config_dir.join(CONFIG_FILENAME)
    }

    pub fn state_path(&self) -> PathBuf {
        self.config_dir.join(STATE_FILENAME)
    }

    pub fn playlist_folder(&self) -> PathBuf {
        if self.playlists.folder.is_absolute() {
            self.playlists.folder.clone()
        } else {
            self.config_dir.join(&self.playlists.folder)
        }
    }

    /// Stations of group `group_id` (1-based).
    pub fn webradio_group(&self, group_id: u32) -> Option<&[Webradio]> {
        let idx = (group_id as usize).checked_sub(1)?;
        self.webradio_groups.get(idx).map(|g| g.stations.as_slice())
    }

    pub fn webradio(&self, id: WebradioId) -> Option<&Webradio> {
        let idx = (id.index_id as usize).checked_sub(1)?;
        self.webradio_group(id.group_id)?.get(idx)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            api: ApiConfig::default(),
            player: PlayerConfig::default(),
            audio: AudioConfig::default(),
            playlists: PlaylistsConfig::default(),
            webradio_groups: Vec::new(),
            config_dir: crate::platform::config_dir(),
        }
    }
}
