//! Session data owned by the playback core and published to the display.

use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Stopped,
    Playing,
    Paused,
}

/// Selection and playback flags.  `is_paused` implies `is_playing`.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    /// `None` only when the catalog is empty.
    pub selected_index: Option<usize>,
    pub playing_index: Option<usize>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_muted: bool,
    pub volume: u8,
}

impl PlaybackSession {
    pub fn new(station_count: usize, volume: u8) -> Self {
        Self {
            selected_index: (station_count > 0).then_some(0),
            playing_index: None,
            is_playing: false,
            is_paused: false,
            is_muted: false,
            volume: volume.min(100),
        }
    }

    pub fn status(&self) -> PlayerStatus {
        match (self.is_playing, self.is_paused) {
            (false, _) => PlayerStatus::Stopped,
            (true, false) => PlayerStatus::Playing,
            (true, true) => PlayerStatus::Paused,
        }
    }

    /// Back to Stopped; selection, volume and mute are kept.
    pub fn reset_playback(&mut self) {
        self.playing_index = None;
        self.is_playing = false;
        self.is_paused = false;
    }
}

/// Everything known about the current stream.  Replaced as a whole, never
/// patched in place, so a published snapshot is always consistent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamMetadata {
    pub artist: String,
    pub song: String,
    /// Raw `StreamTitle` value.
    pub title: String,
    /// `icy-br` as announced by the server.
    pub announced_bitrate: Option<String>,
    /// Bitrate measured by the player, e.g. "128 kbps".
    pub audio_bitrate: Option<String>,
    pub codec: Option<String>,
    pub buffer_status: Option<String>,
    pub cache_duration: Option<String>,
    pub start_time: Option<Instant>,
    pub song_start_time: Option<Instant>,
    pub pause_start_time: Option<Instant>,
    pub total_pause: Duration,
}

impl StreamMetadata {
    pub fn started(now: Instant) -> Self {
        Self {
            start_time: Some(now),
            song_start_time: Some(now),
            ..Self::default()
        }
    }

    /// Time since the latest title change, excluding pauses.  Frozen while
    /// paused.
    pub fn song_elapsed(&self, now: Instant) -> Option<Duration> {
        let start = self.song_start_time?;
        let end = self.pause_start_time.unwrap_or(now);
        Some(
            end.saturating_duration_since(start)
                .saturating_sub(self.total_pause),
        )
    }

    pub fn uptime(&self, now: Instant) -> Option<Duration> {
        self.start_time.map(|s| now.saturating_duration_since(s))
    }

    pub fn is_buffering(&self) -> bool {
        self.buffer_status.as_deref() == Some(BUFFERING)
    }
}

pub const BUFFERING: &str = "BUFFERING";

/// One statistics round read from the player.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamStats {
    pub audio_bitrate: Option<String>,
    pub codec: Option<String>,
    pub cache_duration: Option<String>,
    pub buffer_status: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UiState {
    /// Digits typed so far in number-entry mode.
    pub number_entry: Option<String>,
    pub notifications: bool,
    pub logging: bool,
}

/// Immutable view handed to the display loop.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub session: PlaybackSession,
    pub metadata: Arc<StreamMetadata>,
    pub ui: UiState,
}
