//! Player backend seam between the playback core and the external player.
//!
//! The core only ever sees booleans from this trait: every transport or
//! process failure has already been logged and absorbed underneath.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use radio_proto::config::{MetadataConfig, PlayerConfig};
use radio_proto::protocol::property;
use serde_json::json;
use tracing::debug;

use crate::ipc::ControlClient;
use crate::monitor::{self, MonitorContext};
use crate::mpv::{LaunchOptions, MpvSupervisor, SupervisorState};

#[async_trait]
pub trait PlayerBackend: Send {
    async fn start(&mut self, url: &str, volume: u8) -> bool;
    async fn stop(&mut self);
    fn is_running(&mut self) -> bool;
    async fn set_volume(&self, volume: u8) -> bool;
    async fn set_mute(&self, muted: bool) -> bool;
    /// Launch the metadata and statistics workers for a started stream.
    fn spawn_monitors(&self, url: &str, ctx: MonitorContext);
}

/// mpv-backed player: process supervisor plus control client.
pub struct MpvPlayer {
    supervisor: MpvSupervisor,
    control: ControlClient,
    http: reqwest::Client,
    retry_backoff: Duration,
    stats_warmup: Duration,
    stats_interval: Duration,
}

impl MpvPlayer {
    pub fn new(
        binary: PathBuf,
        socket: PathBuf,
        player: &PlayerConfig,
        metadata: &MetadataConfig,
    ) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(metadata.request_timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .user_agent(metadata.user_agent.clone())
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .build()?;

        Ok(Self {
            control: ControlClient::new(socket.clone()),
            supervisor: MpvSupervisor::new(LaunchOptions::from_config(binary, socket, player)),
            http,
            retry_backoff: Duration::from_secs(metadata.retry_backoff_secs),
            stats_warmup: Duration::from_secs(metadata.stats_warmup_secs),
            stats_interval: Duration::from_secs(metadata.stats_interval_secs.max(1)),
        })
    }
}

#[async_trait]
impl PlayerBackend for MpvPlayer {
    async fn start(&mut self, url: &str, volume: u8) -> bool {
        self.supervisor.start(url, volume).await
    }

    async fn stop(&mut self) {
        self.supervisor.stop().await;
    }

    fn is_running(&mut self) -> bool {
        self.supervisor.state() == SupervisorState::Running && self.supervisor.is_running()
    }

    async fn set_volume(&self, volume: u8) -> bool {
        let ok = self
            .control
            .set_property(property::VOLUME, json!(volume))
            .await;
        if !ok {
            debug!("player: volume {} not applied", volume);
        }
        ok
    }

    async fn set_mute(&self, muted: bool) -> bool {
        let ok = self.control.set_property(property::MUTE, json!(muted)).await;
        if !ok {
            debug!("player: mute={} not applied", muted);
        }
        ok
    }

    fn spawn_monitors(&self, url: &str, ctx: MonitorContext) {
        tokio::spawn(monitor::watch_metadata(
            self.http.clone(),
            url.to_string(),
            self.retry_backoff,
            ctx.clone(),
        ));
        // Separate client: request ids of the two workers never interleave.
        tokio::spawn(monitor::poll_stats(
            ControlClient::new(self.supervisor.socket_path()),
            self.stats_warmup,
            self.stats_interval,
            ctx,
        ));
    }
}
