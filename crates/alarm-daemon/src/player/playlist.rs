use std::path::{Path, PathBuf};
use std::sync::Arc;

use alarm_proto::config::RemotePlaylist;
use alarm_proto::m3u::{load_m3u, M3uEntry};
use alarm_proto::protocol::PlaylistId;
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use super::{Launcher, PlaybackError, Session};
use crate::event::PlaylistEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub name: String,
    /// File path or URL handed to the player.
    pub location: String,
}

/// Where playlists come from.  Ids are 1-based positions.
pub trait PlaylistCatalog: Send + Sync + 'static {
    fn count(&self) -> u32;
    fn playlist(&self, id: PlaylistId) -> Option<Playlist>;
    fn tracks(&self, playlist: &Playlist) -> Result<Vec<Track>, PlaybackError>;
}

/// Sub-directories of a folder, sorted by name; their files are the tracks.
pub struct LocalCatalog {
    folder: PathBuf,
}

impl LocalCatalog {
    pub fn new(folder: PathBuf) -> Self {
        Self { folder }
    }

    fn directories(&self) -> Vec<(String, PathBuf)> {
        let entries = match std::fs::read_dir(&self.folder) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Unable to access playlist folder {:?}: {}", self.folder, e);
                return Vec::new();
            }
        };
        let mut dirs: Vec<(String, PathBuf)> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .map(|e| (e.file_name().to_string_lossy().into_owned(), e.path()))
            .collect();
        dirs.sort_by(|a, b| a.0.cmp(&b.0));
        dirs
    }

    fn directory(&self, id: PlaylistId) -> Option<(String, PathBuf)> {
        let idx = (id.0 as usize).checked_sub(1)?;
        self.directories().into_iter().nth(idx)
    }
}

fn track_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl PlaylistCatalog for LocalCatalog {
    fn count(&self) -> u32 {
        self.directories().len() as u32
    }

    fn playlist(&self, id: PlaylistId) -> Option<Playlist> {
        self.directory(id).map(|(name, _)| Playlist { id, name })
    }

    fn tracks(&self, playlist: &Playlist) -> Result<Vec<Track>, PlaybackError> {
        let (_, dir) = self
            .directory(playlist.id)
            .ok_or(PlaybackError::UnknownPlaylist(playlist.id))?;
        let entries = std::fs::read_dir(&dir).map_err(|e| PlaybackError::Catalog {
            id: playlist.id,
            message: e.to_string(),
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.path())
            .collect();
        files.sort();

        Ok(files
            .into_iter()
            .map(|path| Track {
                name: track_name(&path),
                location: path.to_string_lossy().into_owned(),
            })
            .collect())
    }
}

/// Named M3U lists fetched once at startup.
pub struct RemoteCatalog {
    lists: Vec<(String, Vec<M3uEntry>)>,
}

impl RemoteCatalog {
    /// A list that cannot be fetched stays in place, empty, so ids keep
    /// matching the configuration order.
    pub async fn fetch(client: &reqwest::Client, remote: &[RemotePlaylist]) -> Self {
        let mut lists = Vec::with_capacity(remote.len());
        for playlist in remote {
            let entries = match load_m3u(client, &playlist.url).await {
                Ok(entries) => {
                    info!("Remote playlist {}: {} tracks", playlist.name, entries.len());
                    entries
                }
                Err(e) => {
                    warn!("Unable to fetch remote playlist {}: {}", playlist.name, e);
                    Vec::new()
                }
            };
            lists.push((playlist.name.clone(), entries));
        }
        Self { lists }
    }
}

impl PlaylistCatalog for RemoteCatalog {
    fn count(&self) -> u32 {
        self.lists.len() as u32
    }

    fn playlist(&self, id: PlaylistId) -> Option<Playlist> {
        let idx = (id.0 as usize).checked_sub(1)?;
        self.lists.get(idx).map(|(name, _)| Playlist {
            id,
            name: name.clone(),
        })
    }

    fn tracks(&self, playlist: &Playlist) -> Result<Vec<Track>, PlaybackError> {
        let idx = (playlist.id.0 as usize)
            .checked_sub(1)
            .ok_or(PlaybackError::UnknownPlaylist(playlist.id))?;
        let (_, entries) = self
            .lists
            .get(idx)
            .ok_or(PlaybackError::UnknownPlaylist(playlist.id))?;
        Ok(entries
            .iter()
            .map(|e| Track {
                name: e.name.clone(),
                location: e.location.clone(),
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct PlaylistPlayer {
    shared: Arc<Shared>,
}

struct Shared {
    catalog: Arc<dyn PlaylistCatalog>,
    launcher: Arc<dyn Launcher>,
    events: mpsc::Sender<PlaylistEvent>,
    inner: Mutex<Inner>,
}

struct Inner {
    current: Option<Playlist>,
    tracks: Vec<Track>,
    position: usize,
    session: Option<Session>,
    next_session: u64,
    send_events: bool,
}

impl Inner {
    fn kill_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.kill();
        }
    }

    fn clear(&mut self) {
        self.kill_session();
        self.current = None;
        self.tracks.clear();
        self.position = 0;
    }
}

impl PlaylistPlayer {
    pub fn new(
        catalog: Arc<dyn PlaylistCatalog>,
        launcher: Arc<dyn Launcher>,
        events: mpsc::Sender<PlaylistEvent>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                catalog,
                launcher,
                events,
                inner: Mutex::new(Inner {
                    current: None,
                    tracks: Vec::new(),
                    position: 0,
                    session: None,
                    next_session: 1,
                    send_events: true,
                }),
            }),
        }
    }

    pub async fn play(&self, id: PlaylistId) -> Result<(), PlaybackError> {
        if self.current_playlist().await.is_some_and(|p| p.id == id) {
            return Ok(());
        }

        // Catalog reads hit the disk; keep them off the runtime and the lock.
        let catalog = self.shared.catalog.clone();
        let (playlist, mut tracks) = tokio::task::spawn_blocking(move || {
            let playlist = catalog
                .playlist(id)
                .ok_or(PlaybackError::UnknownPlaylist(id))?;
            let tracks = catalog.tracks(&playlist)?;
            Ok::<_, PlaybackError>((playlist, tracks))
        })
        .await
        .map_err(|e| PlaybackError::Catalog {
            id,
            message: e.to_string(),
        })??;
        if tracks.is_empty() {
            return Err(PlaybackError::EmptyPlaylist(id));
        }
        tracks.shuffle(&mut rand::thread_rng());

        let mut inner = self.shared.inner.lock().await;
        inner.clear();
        info!("Play playlist {}: {} ({} tracks)", id, playlist.name, tracks.len());
        inner.current = Some(playlist);
        inner.tracks = tracks;

        if let Err(e) = self.shared.play_track(&mut inner) {
            inner.clear();
            return Err(e);
        }
        Ok(())
    }

    /// Skips to the next track, idling after the last one.
    pub async fn next_song(&self) {
        let mut inner = self.shared.inner.lock().await;
        if inner.current.is_none() {
            return;
        }
        inner.kill_session();
        inner.position += 1;
        self.shared.advance(&mut inner);
    }

    pub async fn clear(&self) {
        let mut inner = self.shared.inner.lock().await;
        if let Some(playlist) = &inner.current {
            info!("Stop playlist {}", playlist.name);
        }
        inner.clear();
    }

    pub async fn current_playlist(&self) -> Option<Playlist> {
        self.shared.inner.lock().await.current.clone()
    }

    pub async fn current_song_name(&self) -> Option<String> {
        let inner = self.shared.inner.lock().await;
        inner.current.as_ref()?;
        inner.tracks.get(inner.position).map(|t| t.name.clone())
    }

    pub fn playlist(&self, id: PlaylistId) -> Option<Playlist> {
        self.shared.catalog.playlist(id)
    }

    pub fn count(&self) -> u32 {
        self.shared.catalog.count()
    }

    pub async fn stop_sending_events(&self) {
        info!("Stop sending events for playlist player");
        self.shared.inner.lock().await.send_events = false;
    }

    pub async fn stop(&self) {
        info!("Stop playlist player");
        self.shared.inner.lock().await.clear();
    }
}

impl Shared {
    /// Launches the track at the current position.
    fn play_track(self: &Arc<Self>, inner: &mut Inner) -> Result<(), PlaybackError> {
        let track = inner.tracks[inner.position].clone();
        debug!("Play track {}: {}", inner.position + 1, track.name);

        let session = Session::new(inner.next_session);
        inner.next_session += 1;
        let exit = self
            .launcher
            .launch(&track.location, session.token())
            .map_err(|source| PlaybackError::Launch {
                target: track.name.clone(),
                source,
            })?;

        let session_id = session.id;
        inner.session = Some(session);

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            exit.await;
            shared.on_track_end(session_id).await;
        });
        Ok(())
    }

    /// Starts the track at the current position, or idles past the end.
    fn advance(self: &Arc<Self>, inner: &mut Inner) {
        if inner.position >= inner.tracks.len() {
            info!("End of playlist");
            inner.clear();
            return;
        }
        if let Err(e) = self.play_track(inner) {
            warn!("{}", e);
            inner.clear();
        }
    }

    async fn on_track_end(self: Arc<Self>, session_id: u64) {
        let notify = {
            let mut inner = self.inner.lock().await;
            let current = inner.session.as_ref().is_some_and(|s| s.id == session_id);
            if !current {
                return;
            }
            inner.session = None;
            inner.position += 1;
            self.advance(&mut inner);
            inner.send_events
        };
        if notify && self.events.send(PlaylistEvent::TrackChanged).await.is_err() {
            warn!("Playlist event dropped: coordinator gone");
        }
    }
}
