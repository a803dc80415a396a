use serde::{Deserialize, Serialize};
use std::fmt;

/// One internet radio stream among the configured groups.  Both indexes are
/// 1-based: group N is bound to digit button N.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WebradioId {
    pub group_id: u32,
    pub index_id: u32,
}

impl WebradioId {
    pub fn new(group_id: u32, index_id: u32) -> Self {
        Self { group_id, index_id }
    }
}

impl fmt::Display for WebradioId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.group_id, self.index_id)
    }
}

/// 1-based position of a playlist in the playlist catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaylistId(pub u32);

impl PlaylistId {
    pub const FIRST: PlaylistId = PlaylistId(1);

    pub fn next(self) -> Self {
        PlaylistId(self.0 + 1)
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// JSON body returned by every `/api` route, success included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub status_code: u16,
    pub message: String,
}

impl ErrorMessage {
    /// Builds a body for `status_code`; an empty `message` is replaced by the
    /// default title of that status.
    pub fn new(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            default_title(status_code).to_string()
        } else {
            message
        };
        Self {
            status_code,
            message,
        }
    }

    pub fn status(status_code: u16) -> Self {
        Self::new(status_code, "")
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.status_code, self.message)
    }
}

fn default_title(status_code: u16) -> &'static str {
    match status_code {
        200 => "Ok",
        400 => "Bad request",
        403 => "Forbidden",
        404 => "Page not found",
        405 => "Method not allowed",
        503 => "Service unavailable",
        _ => "Internal error",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeStatus {
    pub volume: u8,
}
