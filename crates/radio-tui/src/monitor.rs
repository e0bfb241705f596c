//! Background monitors launched for every started stream.
//!
//! Both workers are tagged with the playback generation they were started
//! for and stop as soon as their cancellation token fires.  They never touch
//! session state; everything goes back to the core as a `CoreEvent`.

use std::time::Duration;

use radio_proto::icy::IcyConnection;
use radio_proto::protocol::property;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::CoreEvent;
use crate::ipc::ControlClient;
use crate::session::{StreamStats, BUFFERING};

/// Handle shared by the monitors of one playback generation.
#[derive(Clone)]
pub struct MonitorContext {
    pub generation: u64,
    pub cancel: CancellationToken,
    pub events: mpsc::Sender<CoreEvent>,
}

impl MonitorContext {
    /// Forward an event; `false` once cancelled or the core is gone.
    async fn emit(&self, event: CoreEvent) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            res = self.events.send(event) => res.is_ok(),
        }
    }

    /// Sleep unless cancelled first; `false` on cancellation.
    async fn pause(&self, dur: Duration) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = tokio::time::sleep(dur) => true,
        }
    }
}

/// Follow the station's in-band titles until cancelled.
///
/// Every failed or finished attempt (connect error, read timeout, no
/// `icy-metaint`, end of stream) waits `backoff` and reconnects.
pub async fn watch_metadata(
    http: reqwest::Client,
    url: String,
    backoff: Duration,
    ctx: MonitorContext,
) {
    let mut last_title: Option<String> = None;
    let mut bitrate_sent = false;

    info!("icy[{}]: watching {}", ctx.generation, url);
    loop {
        let attempt = follow_stream(&http, &url, &ctx, &mut last_title, &mut bitrate_sent);
        let keep_going = tokio::select! {
            _ = ctx.cancel.cancelled() => false,
            res = attempt => match res {
                Ok(true) => true,
                Ok(false) => false,
                Err(e) => {
                    debug!("icy[{}]: {}", ctx.generation, e);
                    true
                }
            },
        };
        if !keep_going || !ctx.pause(backoff).await {
            break;
        }
    }
    debug!("icy[{}]: watcher exiting", ctx.generation);
}

/// One HTTP attempt.  `Ok(false)` means the core went away.
async fn follow_stream(
    http: &reqwest::Client,
    url: &str,
    ctx: &MonitorContext,
    last_title: &mut Option<String>,
    bitrate_sent: &mut bool,
) -> anyhow::Result<bool> {
    let mut conn = IcyConnection::open(http, url).await?;

    // Keep asking on every reconnect until a reply carries `icy-br`.
    if !*bitrate_sent {
        if let Some(announced) = conn.headers.bitrate.clone() {
            let ev = CoreEvent::Bitrate {
                generation: ctx.generation,
                announced,
            };
            if !ctx.emit(ev).await {
                return Ok(false);
            }
            *bitrate_sent = true;
        }
    }

    if conn.headers.metaint.is_none() {
        debug!("icy[{}]: no icy-metaint, retrying later", ctx.generation);
        return Ok(true);
    }

    loop {
        let Some(title) = conn.next_title().await? else {
            continue;
        };
        if last_title.as_deref() == Some(title.as_str()) {
            continue;
        }
        debug!("icy[{}]: title {:?}", ctx.generation, title);
        *last_title = Some(title.clone());
        let ev = CoreEvent::Title {
            generation: ctx.generation,
            raw: title,
        };
        if !ctx.emit(ev).await {
            return Ok(false);
        }
    }
}

/// Poll player statistics: one round after `warmup`, then every `interval`.
pub async fn poll_stats(
    client: ControlClient,
    warmup: Duration,
    interval: Duration,
    ctx: MonitorContext,
) {
    if !ctx.pause(warmup).await {
        return;
    }
    loop {
        let stats = tokio::select! {
            _ = ctx.cancel.cancelled() => break,
            stats = read_stats(&client) => stats,
        };
        let ev = CoreEvent::Stats {
            generation: ctx.generation,
            stats,
        };
        if !ctx.emit(ev).await || !ctx.pause(interval).await {
            break;
        }
    }
    debug!("stats[{}]: poller exiting", ctx.generation);
}

pub async fn read_stats(client: &ControlClient) -> StreamStats {
    let audio_bitrate = client
        .get_property(property::AUDIO_BITRATE)
        .await
        .and_then(|v| v.as_f64())
        .map(format_bitrate);
    let codec = client
        .get_property(property::AUDIO_CODEC_NAME)
        .await
        .and_then(|v| v.as_str().map(str::to_uppercase));
    let cache_duration = client
        .get_property(property::DEMUXER_CACHE_DURATION)
        .await
        .and_then(|v| v.as_f64())
        .map(|secs| format!("{:.1}s", secs));

    let paused_for_cache = client
        .get_property(property::PAUSED_FOR_CACHE)
        .await
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let buffer_status = if paused_for_cache {
        BUFFERING.to_string()
    } else {
        match client.get_property(property::CACHE_BUFFERING_STATE).await {
            Some(v) => format_buffer_state(&v),
            None => "OK".to_string(),
        }
    };

    StreamStats {
        audio_bitrate,
        codec,
        cache_duration,
        buffer_status,
    }
}

fn format_bitrate(bits_per_sec: f64) -> String {
    format!("{} kbps", (bits_per_sec / 1000.0) as u64)
}

fn format_buffer_state(v: &Value) -> String {
    match v.as_f64() {
        Some(pct) => format!("{}%", pct.round() as i64),
        None => "OK".to_string(),
    }
}
