//! Best-effort desktop notifications via `notify-send`.

use std::path::PathBuf;
use std::time::Duration;

use radio_proto::icy::TrackTitle;
use tokio::process::Command;
use tracing::debug;

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Default)]
pub struct Notifier {
    program: Option<PathBuf>,
}

impl Notifier {
    /// Look up `notify-send` on `PATH`; absent means notifications are no-ops.
    pub fn detect() -> Self {
        let program = radio_proto::platform::find_on_path("notify-send");
        if program.is_none() {
            debug!("notify: notify-send not found, notifications disabled");
        }
        Self { program }
    }

    pub fn disabled() -> Self {
        Self { program: None }
    }

    pub fn is_available(&self) -> bool {
        self.program.is_some()
    }

    /// Fire and forget; failures are only logged.
    pub fn song_changed(&self, station: &str, title: &TrackTitle) {
        let Some(program) = self.program.clone() else {
            return;
        };
        let summary = format!("♪ {}", station);
        let body = if title.artist.is_empty() {
            title.song.clone()
        } else {
            format!("{}\n{}", title.artist, title.song)
        };

        tokio::spawn(async move {
            let mut cmd = Command::new(program);
            cmd.arg("--app-name=radio-m3u")
                .arg("--expire-time=5000")
                .arg(summary)
                .arg(body)
                .kill_on_drop(true);
            match tokio::time::timeout(NOTIFY_TIMEOUT, cmd.status()).await {
                Ok(Ok(status)) if status.success() => {}
                Ok(Ok(status)) => debug!("notify: notify-send exited with {}", status),
                Ok(Err(e)) => debug!("notify: cannot run notify-send: {}", e),
                Err(_) => debug!("notify: notify-send timed out"),
            }
        });
    }
}
