use std::path::{Path, PathBuf};

const APP_DIR: &str = "alarm-radio";

pub fn data_dir() -> PathBuf {
    // ~/.local/share/alarm-radio/ (XDG standard)
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join(".local")
            .join("share")
            .join(APP_DIR)
    }
    #[cfg(windows)]
    {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

pub fn config_dir() -> PathBuf {
    #[cfg(unix)]
    {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join(APP_DIR)
    }

    #[cfg(windows)]
    {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
    }
}

#[cfg(unix)]
pub fn player_binary_name() -> &'static str {
    "mpv"
}

#[cfg(windows)]
pub fn player_binary_name() -> &'static str {
    "mpv.exe"
}

fn find_on_path(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var("PATH").ok()?;
    #[cfg(unix)]
    let sep = ":";
    #[cfg(windows)]
    let sep = ";";
    for dir in path.split(sep) {
        for name in names {
            let p = PathBuf::from(dir).join(name);
            if p.exists() {
                return Some(p);
            }
        }
    }
    None
}

/// Resolves the media player binary.
///
/// An explicit path (anything containing a separator) is used as is; a bare
/// name is looked up beside the current exe and then on PATH.
pub fn find_player_binary(configured: &str) -> Option<PathBuf> {
    let configured = if configured.is_empty() {
        player_binary_name()
    } else {
        configured
    };

    if configured.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(configured);
        return p.exists().then_some(p);
    }

    if let Some(p) = find_beside_exe(configured) {
        return Some(p);
    }

    find_on_path(&[configured])
}

fn find_beside_exe(name: &str) -> Option<PathBuf> {
    let current_exe = std::env::current_exe().ok()?;
    let dir = current_exe.parent()?;
    let p = dir.join(name);
    p.exists().then_some(p)
}

/// Writes `content` next to `path` and renames it into place so readers never
/// observe a half-written file.
pub fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, content)?;
    std::fs::rename(&tmp, path)
}
