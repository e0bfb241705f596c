mod action;
mod app;
mod core;
mod dirty;
mod input;
mod ipc;
mod logging;
mod monitor;
mod mpv;
mod notify;
mod player;
mod render;
mod session;
mod view;

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use radio_proto::catalog::{CatalogError, StationCatalog};
use radio_proto::config::Config;
use radio_proto::platform;
use tokio::sync::mpsc;

use crate::core::{CoreOptions, PlaybackCore};
use crate::dirty::DirtyFlags;
use crate::notify::Notifier;
use crate::player::MpvPlayer;
use crate::render::{PlainSurface, Surface, TerminalSurface};

/// Terminal internet-radio player for M3U playlists.
#[derive(Debug, Parser)]
#[command(name = "radio-m3u", version, about)]
struct Cli {
    /// Playlist file; defaults to the first .m3u/.m3u8 in the current directory.
    playlist: Option<PathBuf>,

    /// Plain monochrome display.
    #[arg(long)]
    plain: bool,

    /// Start with song-change notifications off.
    #[arg(long)]
    no_notify: bool,
}

/// Problems that abort before the terminal is taken over.
#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("playlist not found: {0}")]
    PlaylistNotFound(PathBuf),
    #[error("no .m3u or .m3u8 playlist found in {0}")]
    NoPlaylist(PathBuf),
    #[error("mpv not found; install it or set [player] binary in {0}")]
    PlayerMissing(PathBuf),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

fn resolve_playlist(arg: Option<PathBuf>, cwd: &Path) -> Result<PathBuf, StartupError> {
    match arg {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(StartupError::PlaylistNotFound(path)),
        None => platform::find_playlist_in(cwd)
            .ok_or_else(|| StartupError::NoPlaylist(cwd.to_path_buf())),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, config_err) = match Config::load() {
        Ok(c) => (c, None),
        Err(e) => (Config::default(), Some(e)),
    };

    let log_path = platform::data_dir().join("radio-m3u.log");
    let log = match logging::init(&log_path, &config.logging.filter, config.logging.enabled) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("radio-m3u: file logging unavailable: {}", e);
            None
        }
    };
    if let Some(e) = config_err {
        tracing::warn!("config unreadable, using defaults: {}", e);
    }
    tracing::info!("radio-m3u starting, log at {}", log_path.display());

    // ── Startup checks (before the terminal is touched) ──────────────────────
    let cwd = std::env::current_dir()?;
    let playlist = resolve_playlist(cli.playlist, &cwd)?;
    let binary = platform::find_mpv_binary(config.player.binary.as_deref())
        .ok_or_else(|| StartupError::PlayerMissing(Config::config_path()))?;
    let catalog = Arc::new(StationCatalog::load(&playlist).map_err(StartupError::from)?);
    tracing::info!(
        "loaded {} stations from {}, player {}",
        catalog.len(),
        playlist.display(),
        binary.display()
    );

    // ── Core ─────────────────────────────────────────────────────────────────
    let backend = MpvPlayer::new(
        binary,
        platform::control_socket_path(),
        &config.player,
        &config.metadata,
    )?;
    let notifier = Notifier::detect();
    let opts = CoreOptions {
        volume: config.player.default_volume,
        volume_step: config.player.volume_step,
        notifications: config.display.notifications && !cli.no_notify && notifier.is_available(),
        notifier,
        history_path: config.history.enabled.then(|| config.history.path.clone()),
        log,
        logging_enabled: config.logging.enabled,
    };

    let dirty = Arc::new(DirtyFlags::new());
    let (events_tx, events_rx) = mpsc::channel(256);
    let (core, snapshots) = PlaybackCore::new(
        catalog.clone(),
        Box::new(backend),
        opts,
        dirty.clone(),
        events_tx.clone(),
    );
    let core_task = tokio::spawn(core.run(events_rx));

    // ── Display ──────────────────────────────────────────────────────────────
    let plain = cli.plain || config.display.plain || !std::io::stdout().is_terminal();
    let surface: Box<dyn Surface> = if plain {
        Box::new(PlainSurface::new(std::io::stdout()))
    } else {
        Box::new(TerminalSurface::new(std::io::stdout()))
    };

    let app = app::App::new(
        catalog,
        snapshots,
        dirty,
        events_tx,
        surface,
        Duration::from_millis(config.display.frame_ms.max(10)),
        Duration::from_millis(config.display.timer_ms.max(100)),
    );
    app.run(core_task).await?;

    tracing::info!("radio-m3u exiting");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from(["radio-m3u", "--plain", "--no-notify", "list.m3u"]);
        assert!(cli.plain);
        assert!(cli.no_notify);
        assert_eq!(cli.playlist, Some(PathBuf::from("list.m3u")));
    }

    #[test]
    fn test_resolve_playlist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            resolve_playlist(None, dir.path()),
            Err(StartupError::NoPlaylist(_))
        ));
        assert!(matches!(
            resolve_playlist(Some(dir.path().join("missing.m3u")), dir.path()),
            Err(StartupError::PlaylistNotFound(_))
        ));

        let list = dir.path().join("radios.m3u");
        std::fs::write(&list, "http://radio.example/live\n").unwrap();
        assert_eq!(resolve_playlist(None, dir.path()).unwrap(), list);
        assert_eq!(resolve_playlist(Some(list.clone()), dir.path()).unwrap(), list);
    }
}
