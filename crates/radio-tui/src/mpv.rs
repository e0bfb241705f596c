/// mpv process supervisor.
///
/// Lifecycle:
///
/// ```text
///   NotRunning ──start()──▶ Starting ──probe ok──▶ Running
///        ▲                     │                     │
///        └──── spawn failed / exited early ──────────┤
///        └──────────── Stopping ◀──────stop()────────┘
/// ```
///
/// The player runs in its own process group so that `stop()` reaches any
/// helpers it forks.  Failures are logged and reported as `false`; nothing
/// here returns an error to the caller.
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use radio_proto::config::PlayerConfig;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Readiness probe granularity.
const PROBE_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    NotRunning,
    Starting,
    Running,
    Stopping,
}

/// Everything needed to launch one player instance.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub binary: PathBuf,
    pub socket: PathBuf,
    pub demuxer_max_bytes: String,
    pub audio_buffer_secs: f32,
    pub start_timeout: Duration,
    pub stop_timeout: Duration,
}

impl LaunchOptions {
    pub fn from_config(binary: PathBuf, socket: PathBuf, cfg: &PlayerConfig) -> Self {
        Self {
            binary,
            socket,
            demuxer_max_bytes: cfg.demuxer_max_bytes.clone(),
            audio_buffer_secs: cfg.audio_buffer_secs,
            start_timeout: Duration::from_millis(cfg.start_timeout_ms),
            stop_timeout: Duration::from_millis(cfg.stop_timeout_ms),
        }
    }

    /// Command line for `url`; the URL is always the last argument.
    pub fn args(&self, url: &str, volume: u8) -> Vec<String> {
        vec![
            "--no-video".to_string(),
            format!("--volume={}", volume.min(100)),
            "--quiet".to_string(),
            "--no-terminal".to_string(),
            "--cache=yes".to_string(),
            format!("--demuxer-max-bytes={}", self.demuxer_max_bytes),
            format!("--audio-buffer={}", self.audio_buffer_secs),
            radio_proto::platform::control_socket_arg(&self.socket),
            url.to_string(),
        ]
    }
}

pub struct MpvSupervisor {
    opts: LaunchOptions,
    state: SupervisorState,
    process: Option<Child>,
}

impl MpvSupervisor {
    pub fn new(opts: LaunchOptions) -> Self {
        Self {
            opts,
            state: SupervisorState::NotRunning,
            process: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn socket_path(&self) -> &Path {
        &self.opts.socket
    }

    /// True iff a process handle exists and it has not exited.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawn the player for `url` and wait (bounded) for its control channel.
    ///
    /// Returns `true` only when the process is still alive after the probe.
    pub async fn start(&mut self, url: &str, volume: u8) -> bool {
        if self.process.is_some() {
            self.stop().await;
        }
        self.state = SupervisorState::Starting;
        remove_socket(&self.opts.socket).await;

        let mut cmd = Command::new(&self.opts.binary);
        cmd.args(self.opts.args(url, volume))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!("mpv: spawn of {} failed: {}", self.opts.binary.display(), e);
                self.state = SupervisorState::NotRunning;
                return false;
            }
        };
        info!("mpv: spawned pid={:?} for {}", child.id(), url);

        let deadline = tokio::time::Instant::now() + self.opts.start_timeout;
        while tokio::time::Instant::now() < deadline {
            tokio::time::sleep(PROBE_INTERVAL).await;
            if let Ok(Some(status)) = child.try_wait() {
                warn!("mpv: exited during startup with {}", status);
                self.state = SupervisorState::NotRunning;
                remove_socket(&self.opts.socket).await;
                return false;
            }
            if control_channel_ready(&self.opts.socket) {
                debug!("mpv: control channel ready");
                break;
            }
        }

        match child.try_wait() {
            Ok(None) => {
                if !control_channel_ready(&self.opts.socket) {
                    debug!("mpv: alive but control channel not ready yet");
                }
                self.process = Some(child);
                self.state = SupervisorState::Running;
                true
            }
            Ok(Some(status)) => {
                warn!("mpv: exited during startup with {}", status);
                self.state = SupervisorState::NotRunning;
                remove_socket(&self.opts.socket).await;
                false
            }
            Err(e) => {
                warn!("mpv: cannot query process state: {}", e);
                let _ = child.kill().await;
                self.state = SupervisorState::NotRunning;
                remove_socket(&self.opts.socket).await;
                false
            }
        }
    }

    /// Graceful group termination, escalating to a forced kill after the
    /// stop timeout.  The control channel is always removed.  Idempotent.
    pub async fn stop(&mut self) {
        let Some(mut child) = self.process.take() else {
            self.state = SupervisorState::NotRunning;
            remove_socket(&self.opts.socket).await;
            return;
        };
        self.state = SupervisorState::Stopping;

        request_termination(&mut child);
        match tokio::time::timeout(self.opts.stop_timeout, child.wait()).await {
            Ok(Ok(status)) => debug!("mpv: exited with {}", status),
            Ok(Err(e)) => warn!("mpv: wait failed: {}", e),
            Err(_) => {
                warn!(
                    "mpv: still alive after {:?}, killing",
                    self.opts.stop_timeout
                );
                force_kill(&mut child).await;
            }
        }

        remove_socket(&self.opts.socket).await;
        self.state = SupervisorState::NotRunning;
        info!("mpv: stopped");
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    match child.id() {
        Some(pid) => {
            if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                debug!("mpv: SIGTERM to group {} failed: {}", pid, e);
            }
        }
        None => debug!("mpv: process already reaped"),
    }
}

#[cfg(windows)]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!("mpv: terminate failed: {}", e);
    }
}

#[cfg(unix)]
async fn force_kill(child: &mut Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    let _ = child.kill().await;
}

#[cfg(windows)]
async fn force_kill(child: &mut Child) {
    let _ = child.kill().await;
}

#[cfg(unix)]
fn control_channel_ready(socket: &Path) -> bool {
    socket.exists()
}

#[cfg(windows)]
fn control_channel_ready(socket: &Path) -> bool {
    tokio::net::windows::named_pipe::ClientOptions::new()
        .open(socket)
        .is_ok()
}

#[cfg(unix)]
async fn remove_socket(socket: &Path) {
    match tokio::fs::remove_file(socket).await {
        Ok(()) => debug!("mpv: removed {}", socket.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("mpv: cannot remove {}: {}", socket.display(), e),
    }
}

/// Named pipes vanish with their server.
#[cfg(windows)]
async fn remove_socket(_socket: &Path) {}
