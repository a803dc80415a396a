//! Playback through an external media player process.
//!
//! Each play spawns one process.  A watcher task waits for it to exit and
//! reports back to the owning player, which ignores exits from sessions it
//! has already replaced or cleared.
pub mod arbiter;
pub mod playlist;
pub mod webradio;

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use alarm_proto::protocol::{PlaylistId, WebradioId};
use futures_util::future::BoxFuture;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum PlaybackError {
    #[error("unknown webradio group {0}")]
    UnknownGroup(u32),
    #[error("unknown webradio {0}")]
    UnknownWebradio(WebradioId),
    #[error("unknown playlist {0}")]
    UnknownPlaylist(PlaylistId),
    #[error("playlist {0} has no tracks")]
    EmptyPlaylist(PlaylistId),
    #[error("unable to read playlist {id}: {message}")]
    Catalog { id: PlaylistId, message: String },
    #[error("unable to start player for {target}: {source}")]
    Launch {
        target: String,
        #[source]
        source: io::Error,
    },
}

/// Resolves when the launched process has exited, for any reason.
pub type ExitFuture = BoxFuture<'static, ()>;

pub trait Launcher: Send + Sync + 'static {
    /// Starts playing `source`.  Cancelling `stop` kills the process.
    fn launch(&self, source: &str, stop: CancellationToken) -> io::Result<ExitFuture>;
}

/// Runs the configured player binary with its arguments followed by the
/// stream URL or file path.
pub struct ProcessLauncher {
    binary: PathBuf,
    args: Vec<String>,
}

impl ProcessLauncher {
    pub fn new(binary: PathBuf, args: Vec<String>) -> Self {
        Self { binary, args }
    }
}

impl Launcher for ProcessLauncher {
    fn launch(&self, source: &str, stop: CancellationToken) -> io::Result<ExitFuture> {
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let source = source.to_string();

        Ok(Box::pin(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => debug!("Player for {} exited: {}", source, status),
                    Err(e) => warn!("Unable to wait for player of {}: {}", source, e),
                },
                _ = stop.cancelled() => {
                    debug!("Kill player for {}", source);
                    if let Err(e) = child.kill().await {
                        warn!("Unable to kill player of {}: {}", source, e);
                    }
                }
            }
        }))
    }
}

/// One launched process as seen by its player.
#[derive(Debug)]
pub(crate) struct Session {
    pub id: u64,
    stop: CancellationToken,
}

impl Session {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            stop: CancellationToken::new(),
        }
    }

    pub fn token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn kill(self) {
        self.stop.cancel();
    }
}
