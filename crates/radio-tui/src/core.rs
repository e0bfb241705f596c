/// PlaybackCore: single-owner event loop for all session state.
///
/// Input, the metadata watcher and the statistics poller never touch the
/// session; they send `CoreEvent`s into this loop.  After each event the
/// core publishes an immutable `Snapshot` on a `watch` channel and then
/// marks the affected screen regions dirty, so the renderer never sees a
/// dirty region before the matching snapshot.
///
/// Every successful start bumps the playback *generation*.  Monitor events
/// carry the generation they were launched for; anything older than the
/// current one is dropped.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Local;
use radio_proto::catalog::StationCatalog;
use radio_proto::history::{self, HistoryEntry};
use radio_proto::icy::TrackTitle;
use rand::Rng;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::action::Command;
use crate::dirty::{DirtyFlags, Region, RegionSet};
use crate::logging::LogHandle;
use crate::monitor::MonitorContext;
use crate::notify::Notifier;
use crate::player::PlayerBackend;
use crate::session::{PlaybackSession, Snapshot, StreamMetadata, StreamStats, UiState, BUFFERING};

/// Process liveness check cadence.
const HEARTBEAT: Duration = Duration::from_secs(5);

// ── CoreEvent ─────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum CoreEvent {
    /// A user command from the input worker.
    Command(Command),
    /// New in-band title from the metadata watcher.
    Title { generation: u64, raw: String },
    /// `icy-br` announced by the station.
    Bitrate { generation: u64, announced: String },
    /// One round of player statistics.
    Stats { generation: u64, stats: StreamStats },
    /// Check that the player is still alive.
    HeartbeatTick,
    Shutdown,
}

// ── options ───────────────────────────────────────────────────────────────────

pub struct CoreOptions {
    pub volume: u8,
    pub volume_step: u8,
    pub notifications: bool,
    pub notifier: Notifier,
    pub history_path: Option<PathBuf>,
    pub log: Option<LogHandle>,
    /// Initial state of the log filter behind `log`.
    pub logging_enabled: bool,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            volume: 50,
            volume_step: 5,
            notifications: false,
            notifier: Notifier::disabled(),
            history_path: None,
            log: None,
            logging_enabled: false,
        }
    }
}

// ── PlaybackCore ──────────────────────────────────────────────────────────────

pub struct PlaybackCore {
    catalog: Arc<StationCatalog>,
    backend: Box<dyn PlayerBackend>,
    session: PlaybackSession,
    metadata: Arc<StreamMetadata>,
    ui: UiState,
    dirty: Arc<DirtyFlags>,
    /// Regions touched by the event being handled; flushed after publish.
    pending: RegionSet,
    snapshot_tx: watch::Sender<Snapshot>,
    /// Handed to monitors so they can report back.
    events_tx: mpsc::Sender<CoreEvent>,
    monitors: Option<CancellationToken>,
    generation: u64,
    volume_step: u8,
    notifier: Notifier,
    history_path: Option<PathBuf>,
    log: Option<LogHandle>,
}

impl PlaybackCore {
    pub fn new(
        catalog: Arc<StationCatalog>,
        backend: Box<dyn PlayerBackend>,
        opts: CoreOptions,
        dirty: Arc<DirtyFlags>,
        events_tx: mpsc::Sender<CoreEvent>,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let session = PlaybackSession::new(catalog.len(), opts.volume);
        let ui = UiState {
            number_entry: None,
            notifications: opts.notifications,
            logging: opts.log.is_some() && opts.logging_enabled,
        };
        let metadata = Arc::new(StreamMetadata::default());
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            session: session.clone(),
            metadata: metadata.clone(),
            ui: ui.clone(),
        });

        let core = Self {
            catalog,
            backend,
            session,
            metadata,
            ui,
            dirty,
            pending: RegionSet::empty(),
            snapshot_tx,
            events_tx,
            monitors: None,
            generation: 0,
            volume_step: opts.volume_step,
            notifier: opts.notifier,
            history_path: opts.history_path,
            log: opts.log,
        };
        (core, snapshot_rx)
    }

    /// Run until `Shutdown` or until every sender is gone, then stop playback.
    pub async fn run(mut self, mut event_rx: mpsc::Receiver<CoreEvent>) -> anyhow::Result<()> {
        info!("core: starting event loop");

        let heartbeat_tx = self.events_tx.clone();
        let heartbeat = tokio::spawn(async move {
            loop {
                tokio::time::sleep(HEARTBEAT).await;
                if heartbeat_tx.send(CoreEvent::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });

        loop {
            match event_rx.recv().await {
                None => {
                    info!("core: event channel closed, shutting down");
                    break;
                }
                Some(CoreEvent::Shutdown) => {
                    info!("core: shutdown requested");
                    break;
                }
                Some(ev) => self.handle_event(ev).await,
            }
        }

        heartbeat.abort();
        self.halt().await;
        Ok(())
    }

    pub async fn handle_event(&mut self, ev: CoreEvent) {
        match ev {
            CoreEvent::Command(cmd) => {
                debug!("core: command {:?}", cmd);
                self.handle_command(cmd).await;
            }
            CoreEvent::Title { generation, raw } => self.on_title(generation, &raw),
            CoreEvent::Bitrate {
                generation,
                announced,
            } => self.on_bitrate(generation, announced),
            CoreEvent::Stats { generation, stats } => self.on_stats(generation, stats),
            CoreEvent::HeartbeatTick => self.on_heartbeat().await,
            CoreEvent::Shutdown => {}
        }
        self.publish();
    }

    async fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::SelectNext => self.select_next(),
            Command::SelectPrevious => self.select_previous(),
            Command::SelectByNumber(n) => self.select_by_number(n),
            Command::SelectRandom => self.select_random(),
            Command::TogglePlayPause => self.toggle_play_pause().await,
            Command::Stop => self.stop().await,
            Command::VolumeUp => self.change_volume(i32::from(self.volume_step)).await,
            Command::VolumeDown => self.change_volume(-i32::from(self.volume_step)).await,
            Command::ToggleMute => self.set_mute(!self.session.is_muted).await,
            Command::ToggleNotifications => self.toggle_notifications(),
            Command::ToggleLogging => self.toggle_logging(),
            Command::NumberEntry(buffer) => {
                self.ui.number_entry = buffer;
                self.touch(Region::Input);
            }
            // Quit is consumed by the input worker.
            Command::Quit => {}
        }
    }

    // ── selection ─────────────────────────────────────────────────────────────

    pub fn select_next(&mut self) {
        let len = self.catalog.len();
        if let Some(idx) = self.session.selected_index {
            self.session.selected_index = Some((idx + 1) % len);
            self.touch(Region::Stations);
        }
    }

    pub fn select_previous(&mut self) {
        let len = self.catalog.len();
        if let Some(idx) = self.session.selected_index {
            self.session.selected_index = Some((idx + len - 1) % len);
            self.touch(Region::Stations);
        }
    }

    /// 1-based, as shown on screen.  Out-of-range numbers are ignored.
    pub fn select_by_number(&mut self, number: usize) {
        if (1..=self.catalog.len()).contains(&number) {
            self.session.selected_index = Some(number - 1);
            self.touch(Region::Stations);
        } else {
            debug!("core: no station #{}", number);
        }
        self.touch(Region::Input);
    }

    pub fn select_random(&mut self) {
        let len = self.catalog.len();
        if len == 0 {
            return;
        }
        self.session.selected_index = Some(rand::thread_rng().gen_range(0..len));
        self.touch(Region::Stations);
    }

    // ── playback ──────────────────────────────────────────────────────────────

    pub async fn toggle_play_pause(&mut self) {
        let Some(selected) = self.session.selected_index else {
            return;
        };

        if !self.session.is_playing {
            self.start_station(selected).await;
        } else if self.session.playing_index != Some(selected) {
            info!("core: switching station");
            self.halt().await;
            self.start_station(selected).await;
        } else if self.session.is_paused {
            self.resume().await;
        } else {
            self.pause().await;
        }
    }

    pub async fn stop(&mut self) {
        self.halt().await;
        self.touch_all();
    }

    async fn start_station(&mut self, idx: usize) {
        let Some(station) = self.catalog.get(idx) else {
            return;
        };
        let url = station.url.clone();
        info!("core: starting {:?} ({})", station.name, url);

        self.touch_all();
        if !self.backend.start(&url, self.session.volume).await {
            warn!("core: player failed to start for {}", url);
            self.session.reset_playback();
            self.metadata = Arc::new(StreamMetadata::default());
            return;
        }

        self.generation += 1;
        self.session.is_playing = true;
        self.session.is_paused = false;
        self.session.playing_index = Some(idx);
        self.metadata = Arc::new(StreamMetadata::started(Instant::now()));

        if self.session.is_muted {
            self.backend.set_mute(true).await;
        }

        let token = CancellationToken::new();
        self.backend.spawn_monitors(
            &url,
            MonitorContext {
                generation: self.generation,
                cancel: token.clone(),
                events: self.events_tx.clone(),
            },
        );
        self.monitors = Some(token);
    }

    /// Stop workers and player, back to Stopped with empty metadata.
    async fn halt(&mut self) {
        if let Some(token) = self.monitors.take() {
            token.cancel();
        }
        // In-flight monitor events from the old stream become stale.
        self.generation += 1;
        self.backend.stop().await;
        self.session.reset_playback();
        self.metadata = Arc::new(StreamMetadata::default());
    }

    async fn pause(&mut self) {
        self.backend.set_mute(true).await;
        self.session.is_paused = true;
        self.metadata = Arc::new(StreamMetadata {
            pause_start_time: Some(Instant::now()),
            ..(*self.metadata).clone()
        });
        self.touch_set(
            RegionSet::empty()
                .with(Region::Status)
                .with(Region::Song)
                .with(Region::Timer),
        );
    }

    async fn resume(&mut self) {
        self.backend.set_mute(self.session.is_muted).await;
        self.session.is_paused = false;
        let now = Instant::now();
        let paused_for = self
            .metadata
            .pause_start_time
            .map(|t| now.saturating_duration_since(t))
            .unwrap_or_default();
        self.metadata = Arc::new(StreamMetadata {
            pause_start_time: None,
            total_pause: self.metadata.total_pause + paused_for,
            ..(*self.metadata).clone()
        });
        self.touch_set(
            RegionSet::empty()
                .with(Region::Status)
                .with(Region::Song)
                .with(Region::Timer),
        );
    }

    /// Clamp to 0..=100; the session value stands even if the player
    /// does not acknowledge it.
    pub async fn change_volume(&mut self, delta: i32) {
        let volume = (i32::from(self.session.volume) + delta).clamp(0, 100) as u8;
        self.session.volume = volume;
        if self.session.is_playing {
            self.backend.set_volume(volume).await;
        }
        self.touch(Region::Status);
    }

    pub async fn set_mute(&mut self, muted: bool) {
        self.session.is_muted = muted;
        // While paused the player stays muted; resume applies the new value.
        if self.session.is_playing && !self.session.is_paused {
            self.backend.set_mute(muted).await;
        }
        self.touch(Region::Status);
    }

    // ── monitor events ────────────────────────────────────────────────────────

    fn is_current(&self, generation: u64) -> bool {
        if generation != self.generation || !self.session.is_playing {
            debug!(
                "core: dropping event for generation {} (current {})",
                generation, self.generation
            );
            return false;
        }
        true
    }

    fn on_title(&mut self, generation: u64, raw: &str) {
        if !self.is_current(generation) {
            return;
        }
        let title = TrackTitle::parse(raw);
        if title.raw.is_empty() || title.raw == self.metadata.title {
            return;
        }
        info!("core: now playing {:?}", title.raw);

        let previous = self.metadata.title.clone();
        let now = Instant::now();
        self.metadata = Arc::new(StreamMetadata {
            artist: title.artist.clone(),
            song: title.song.clone(),
            title: title.raw.clone(),
            song_start_time: Some(now),
            pause_start_time: self.session.is_paused.then_some(now),
            total_pause: Duration::ZERO,
            ..(*self.metadata).clone()
        });
        self.touch_set(RegionSet::empty().with(Region::Song).with(Region::Technical));

        let station = self
            .session
            .playing_index
            .and_then(|i| self.catalog.get(i))
            .map(|s| s.name.clone())
            .unwrap_or_default();

        if self.ui.notifications && !previous.is_empty() {
            self.notifier.song_changed(&station, &title);
        }
        if let Some(path) = self.history_path.clone() {
            let entry = HistoryEntry {
                timestamp: Local::now(),
                station,
                artist: title.artist,
                song: title.song,
            };
            tokio::spawn(async move {
                if let Err(e) = history::append_entry(&path, &entry).await {
                    warn!("core: history append failed: {}", e);
                }
            });
        }
    }

    fn on_bitrate(&mut self, generation: u64, announced: String) {
        if !self.is_current(generation) {
            return;
        }
        self.metadata = Arc::new(StreamMetadata {
            announced_bitrate: Some(announced),
            ..(*self.metadata).clone()
        });
        self.touch(Region::Technical);
    }

    /// Only a change into BUFFERING repaints at once; everything else is
    /// picked up by the timer refresh.
    fn on_stats(&mut self, generation: u64, stats: StreamStats) {
        if !self.is_current(generation) {
            return;
        }
        let entering_buffering = stats.buffer_status == BUFFERING && !self.metadata.is_buffering();
        let prev = &*self.metadata;
        self.metadata = Arc::new(StreamMetadata {
            audio_bitrate: stats.audio_bitrate.or_else(|| prev.audio_bitrate.clone()),
            codec: stats.codec.or_else(|| prev.codec.clone()),
            cache_duration: stats.cache_duration.or_else(|| prev.cache_duration.clone()),
            buffer_status: Some(stats.buffer_status),
            ..prev.clone()
        });
        if entering_buffering {
            self.touch(Region::Technical);
        }
    }

    async fn on_heartbeat(&mut self) {
        if self.session.is_playing && !self.backend.is_running() {
            warn!("core: heartbeat: player process exited");
            self.stop().await;
        }
    }

    // ── ambient toggles ───────────────────────────────────────────────────────

    fn toggle_notifications(&mut self) {
        self.ui.notifications = !self.ui.notifications;
        info!("core: notifications {}", on_off(self.ui.notifications));
        self.touch(Region::Status);
    }

    fn toggle_logging(&mut self) {
        let Some(log) = self.log.as_ref() else {
            return;
        };
        let enabled = !self.ui.logging;
        if enabled {
            log.set_enabled(true);
            info!("core: logging on");
        } else {
            info!("core: logging off");
            log.set_enabled(false);
        }
        self.ui.logging = enabled;
        self.touch(Region::Status);
    }

    // ── publication ───────────────────────────────────────────────────────────

    fn touch(&mut self, region: Region) {
        self.pending.insert(region);
    }

    fn touch_set(&mut self, regions: RegionSet) {
        for region in regions.iter() {
            self.pending.insert(region);
        }
    }

    fn touch_all(&mut self) {
        self.pending = RegionSet::all();
    }

    /// Snapshot first, dirty marks second.
    fn publish(&mut self) {
        self.snapshot_tx.send_replace(Snapshot {
            session: self.session.clone(),
            metadata: self.metadata.clone(),
            ui: self.ui.clone(),
        });
        let pending = std::mem::take(&mut self.pending);
        self.dirty.mark_set(pending);
    }
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}
