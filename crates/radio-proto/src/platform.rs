use std::path::{Path, PathBuf};

const APP_DIR: &str = "radio-m3u";

/// Well-known control-channel endpoint exposed by the player process.
#[cfg(unix)]
pub fn control_socket_path() -> PathBuf {
    std::env::temp_dir().join("radio-m3u-mpv.sock")
}

#[cfg(windows)]
pub fn control_socket_path() -> PathBuf {
    PathBuf::from(r"\\.\pipe\radio-m3u-mpv")
}

pub fn control_socket_arg(path: &Path) -> String {
    format!("--input-ipc-server={}", path.display())
}

pub fn data_dir() -> PathBuf {
    // On macOS and Linux, use ~/.local/share/<app>/ (XDG standard)
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
pub fn mpv_binary_name() -> &'static str {
    "mpv"
}

#[cfg(windows)]
pub fn mpv_binary_name() -> &'static str {
    "mpv.exe"
}

/// First `PATH` entry containing an executable file called `name`.
pub fn find_on_path(name: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|p| p.is_file())
}

/// Find the mpv binary for playback.
///
/// An explicit override wins when it exists; otherwise the directory of the
/// current executable is checked before `PATH`.
pub fn find_mpv_binary(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = override_path {
        return p.is_file().then(|| p.to_path_buf());
    }

    let exe_name = mpv_binary_name();
    if let Ok(current_exe) = std::env::current_exe() {
        if let Some(dir) = current_exe.parent() {
            let local_mpv = dir.join(exe_name);
            if local_mpv.is_file() {
                return Some(local_mpv);
            }
        }
    }

    find_on_path(exe_name)
}

/// First playlist file (`.m3u` / `.m3u8`, lexicographic order) inside `dir`.
pub fn find_playlist_in(dir: &Path) -> Option<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_playlist_file(p))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn is_playlist_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("m3u") || e.eq_ignore_ascii_case("m3u8"))
        .unwrap_or(false)
}
