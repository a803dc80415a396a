use alarm_proto::protocol::{PlaylistId, WebradioId};

use super::playlist::{Playlist, PlaylistPlayer};
use super::webradio::{NowPlaying, WebradioPlayer};
use super::PlaybackError;

/// Keeps webradio and playlist playback mutually exclusive: starting one
/// clears the other first.
#[derive(Clone)]
pub struct PlaybackArbiter {
    webradio: WebradioPlayer,
    playlist: PlaylistPlayer,
}

impl PlaybackArbiter {
    pub fn new(webradio: WebradioPlayer, playlist: PlaylistPlayer) -> Self {
        Self { webradio, playlist }
    }

    pub async fn play_webradio(&self, id: WebradioId) -> Result<(), PlaybackError> {
        self.playlist.clear().await;
        self.webradio.play(id).await
    }

    pub async fn play_playlist(&self, id: PlaylistId) -> Result<(), PlaybackError> {
        self.webradio.clear().await;
        self.playlist.play(id).await
    }

    pub async fn stop_all(&self) {
        self.webradio.clear().await;
        self.playlist.clear().await;
    }

    pub async fn next_song(&self) {
        self.playlist.next_song().await;
    }

    pub async fn current_webradio(&self) -> Option<NowPlaying> {
        self.webradio.current().await
    }

    pub async fn current_playlist(&self) -> Option<Playlist> {
        self.playlist.current_playlist().await
    }

    /// Label of whatever plays: the station name, or `playlist:song`.
    pub async fn now_playing(&self) -> Option<String> {
        if let Some(webradio) = self.webradio.current().await {
            return Some(webradio.name);
        }
        let playlist = self.playlist.current_playlist().await?;
        let song = self.playlist.current_song_name().await.unwrap_or_default();
        Some(format!("{}:{}", playlist.name, song))
    }

    pub fn webradio_name(&self, id: WebradioId) -> Option<String> {
        self.webradio.webradio_name(id)
    }

    pub fn playlist_name(&self, id: PlaylistId) -> Option<String> {
        self.playlist.playlist(id).map(|p| p.name)
    }

    pub fn group_len(&self, group_id: u32) -> usize {
        self.webradio.group_len(group_id)
    }

    pub fn playlist_count(&self) -> u32 {
        self.playlist.count()
    }

    pub async fn stop_sending_events(&self) {
        self.webradio.stop_sending_events().await;
        self.playlist.stop_sending_events().await;
    }

    pub async fn stop(&self) {
        self.webradio.stop().await;
        self.playlist.stop().await;
    }
}

/// Station after `current` in `group_id`, wrapping; the first one when
/// `current` belongs to another group or nothing plays.
pub fn next_webradio(current: Option<WebradioId>, group_id: u32, group_len: usize) -> Option<WebradioId> {
    if group_len == 0 {
        return None;
    }
    let index_id = match current {
        Some(id) if id.group_id == group_id => id.index_id as usize % group_len + 1,
        _ => 1,
    };
    Some(WebradioId::new(group_id, index_id as u32))
}

/// Playlist after `current`, wrapping to the first.
pub fn next_playlist(current: Option<PlaylistId>, count: u32) -> Option<PlaylistId> {
    if count == 0 {
        return None;
    }
    match current {
        Some(id) if id.0 < count => Some(id.next()),
        _ => Some(PlaylistId::FIRST),
    }
}
