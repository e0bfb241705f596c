//! Screen layout and the text of every region.
//!
//! ```text
//! row 0      timer      radio-m3u  14:03:22            Uptime 01:02:03
//! row 1      status     ▶ Playing: Radio Swiss Jazz    Vol 50%  Notify on  Log on
//! row 3..4   song       ♪ Song
//!                         Artist  [03:12]
//! row 5      technical  128 kbps │ MP3 │ OK │ Cache 4.2s
//! row 7..    stations   header + windowed list around the selection
//! last two   input      number entry, key help
//! ```

use std::time::{Duration, Instant};

use radio_proto::catalog::StationCatalog;
use radio_proto::icy::announced_kbps;
use unicode_width::UnicodeWidthChar;

use crate::dirty::Region;
use crate::render::{LineStyle, RegionFrame, RegionSource, StyledLine};
use crate::session::{PlayerStatus, Snapshot, StreamMetadata};

pub struct Glyphs {
    pub playing: &'static str,
    pub paused: &'static str,
    pub stopped: &'static str,
    pub note: &'static str,
    pub sep: &'static str,
}

pub const RICH_GLYPHS: Glyphs = Glyphs {
    playing: "▶",
    paused: "⏸",
    stopped: "■",
    note: "♪",
    sep: "│",
};

pub const ASCII_GLYPHS: Glyphs = Glyphs {
    playing: ">",
    paused: "=",
    stopped: "#",
    note: "*",
    sep: "|",
};

const HELP: &str =
    "up/down select  p play/pause  s stop  +/- volume  m mute  r random  0-9 jump  t notify  l log  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub width: u16,
    pub stations_top: u16,
    /// List rows below the stations header.
    pub station_rows: u16,
    pub input_top: u16,
}

impl Layout {
    const TIMER: u16 = 0;
    const STATUS: u16 = 1;
    const SONG: u16 = 3;
    const TECHNICAL: u16 = 5;
    const STATIONS: u16 = 7;

    pub fn for_size(width: u16, height: u16) -> Self {
        // header rows above the list, the list header, and two input rows
        let station_rows = height.saturating_sub(Self::STATIONS + 1 + 2).max(1);
        Self {
            width: width.max(20),
            stations_top: Self::STATIONS,
            station_rows,
            input_top: Self::STATIONS + 1 + station_rows,
        }
    }
}

/// Everything needed to produce region text for one frame.
pub struct ScreenView<'a> {
    catalog: &'a StationCatalog,
    snap: &'a Snapshot,
    layout: Layout,
    now: Instant,
    clock: String,
    glyphs: &'static Glyphs,
}

impl<'a> ScreenView<'a> {
    pub fn new(
        catalog: &'a StationCatalog,
        snap: &'a Snapshot,
        layout: Layout,
        now: Instant,
        clock: String,
        glyphs: &'static Glyphs,
    ) -> Self {
        Self {
            catalog,
            snap,
            layout,
            now,
            clock,
            glyphs,
        }
    }

    fn fit(&self, text: &str) -> String {
        fit_width(text, self.layout.width as usize)
    }

    fn line(&self, text: &str, style: LineStyle) -> StyledLine {
        StyledLine::new(self.fit(text), style)
    }

    fn timer_lines(&self) -> Vec<StyledLine> {
        let meta = &self.snap.metadata;
        let mut text = format!("radio-m3u  {}", self.clock);
        if self.snap.session.status() == PlayerStatus::Playing {
            if let Some(up) = meta.uptime(self.now) {
                text.push_str(&format!("    Uptime {}", format_duration(up)));
            }
        }
        vec![self.line(&text, LineStyle::Header)]
    }

    fn status_lines(&self) -> Vec<StyledLine> {
        let session = &self.snap.session;
        let station = session
            .playing_index
            .and_then(|i| self.catalog.get(i))
            .map(|s| s.name.as_str())
            .unwrap_or("");
        let (glyph, label, style) = match session.status() {
            PlayerStatus::Playing => (self.glyphs.playing, "Playing", LineStyle::Playing),
            PlayerStatus::Paused => (self.glyphs.paused, "Paused", LineStyle::Accent),
            PlayerStatus::Stopped => (self.glyphs.stopped, "Stopped", LineStyle::Dim),
        };
        let head = if station.is_empty() {
            format!("{} {}", glyph, label)
        } else {
            format!("{} {}: {}", glyph, label, station)
        };
        let volume = if session.is_muted {
            "MUTE".to_string()
        } else {
            format!("Vol {}%", session.volume)
        };
        let text = format!(
            "{}    {}  Notify {}  Log {}",
            head,
            volume,
            on_off(self.snap.ui.notifications),
            on_off(self.snap.ui.logging)
        );
        vec![self.line(&text, style)]
    }

    fn song_lines(&self) -> Vec<StyledLine> {
        if self.snap.session.status() == PlayerStatus::Stopped {
            return vec![StyledLine::blank(), StyledLine::blank()];
        }
        let meta = &self.snap.metadata;
        let elapsed = meta
            .song_elapsed(self.now)
            .map(|d| format!("[{}]", format_duration(d)))
            .unwrap_or_default();

        if meta.song.is_empty() {
            return vec![
                self.line(&format!("{} waiting for title", self.glyphs.note), LineStyle::Dim),
                self.line(&format!("  {}", elapsed), LineStyle::Dim),
            ];
        }

        let second = if meta.artist.is_empty() {
            format!("  {}", elapsed)
        } else {
            format!("  {}  {}", meta.artist, elapsed)
        };
        vec![
            self.line(&format!("{} {}", self.glyphs.note, meta.song), LineStyle::Header),
            self.line(&second, LineStyle::Accent),
        ]
    }

    fn technical_lines(&self) -> Vec<StyledLine> {
        if self.snap.session.status() == PlayerStatus::Stopped {
            return vec![StyledLine::blank()];
        }
        let meta = &self.snap.metadata;
        let style = if meta.is_buffering() {
            LineStyle::Warning
        } else {
            LineStyle::Dim
        };
        let sep = format!(" {} ", self.glyphs.sep);
        vec![self.line(&technical_parts(meta).join(&sep), style)]
    }

    fn station_lines(&self) -> Vec<StyledLine> {
        let rows = self.layout.station_rows as usize;
        let session = &self.snap.session;
        let mut lines = Vec::with_capacity(rows + 1);
        lines.push(self.line(
            &format!("Stations ({})", self.catalog.len()),
            LineStyle::Header,
        ));

        if self.catalog.is_empty() {
            lines.push(self.line("  playlist has no stations", LineStyle::Dim));
        } else {
            let selected = session.selected_index.unwrap_or(0);
            let start = window_start(selected, rows, self.catalog.len());
            for (idx, station) in self.catalog.iter().enumerate().skip(start).take(rows) {
                let marker = if session.playing_index == Some(idx) {
                    self.glyphs.playing
                } else {
                    " "
                };
                let mut text = format!("{} {:>3}. {}", marker, idx + 1, station.name);
                if let Some(group) = &station.group {
                    text.push_str(&format!("  [{}]", group));
                }
                let style = if idx == selected {
                    LineStyle::Selected
                } else if session.playing_index == Some(idx) {
                    LineStyle::Playing
                } else {
                    LineStyle::Normal
                };
                lines.push(self.line(&text, style));
            }
        }

        lines.resize(rows + 1, StyledLine::blank());
        lines
    }

    fn input_lines(&self) -> Vec<StyledLine> {
        let entry = match &self.snap.ui.number_entry {
            Some(buffer) => self.line(&format!("Go to station: {}_", buffer), LineStyle::Accent),
            None => StyledLine::blank(),
        };
        vec![entry, self.line(HELP, LineStyle::Dim)]
    }
}

impl RegionSource for ScreenView<'_> {
    fn frame(&self, region: Region) -> RegionFrame {
        let (top, lines) = match region {
            Region::Timer => (Layout::TIMER, self.timer_lines()),
            Region::Status => (Layout::STATUS, self.status_lines()),
            Region::Song => (Layout::SONG, self.song_lines()),
            Region::Technical => (Layout::TECHNICAL, self.technical_lines()),
            Region::Stations => (self.layout.stations_top, self.station_lines()),
            Region::Input => (self.layout.input_top, self.input_lines()),
        };
        RegionFrame { top, lines }
    }
}

/// Measured bitrate, else the announced one; then codec, buffer, cache.
pub fn technical_parts(meta: &StreamMetadata) -> Vec<String> {
    let mut parts = Vec::new();
    let bitrate = meta.audio_bitrate.clone().or_else(|| {
        meta.announced_bitrate.as_deref().map(|raw| match announced_kbps(raw) {
            Some(kbps) => format!("{} kbps", kbps),
            None => raw.to_string(),
        })
    });
    parts.extend(bitrate);
    parts.extend(meta.codec.clone());
    parts.extend(meta.buffer_status.clone());
    parts.extend(meta.cache_duration.as_ref().map(|c| format!("Cache {}", c)));
    parts
}

/// First list index to show so that `selected` stays roughly centred.
pub fn window_start(selected: usize, rows: usize, len: usize) -> usize {
    if len <= rows {
        return 0;
    }
    selected.saturating_sub(rows / 2).min(len - rows)
}

/// Truncate to `width` terminal columns.
pub fn fit_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

fn on_off(v: bool) -> &'static str {
    if v {
        "on"
    } else {
        "off"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{PlaybackSession, UiState};
    use radio_proto::catalog::Station;
    use std::sync::Arc;

    fn catalog(n: usize) -> StationCatalog {
        StationCatalog::new(
            (0..n)
                .map(|i| Station {
                    name: format!("Radio {}", i + 1),
                    url: format!("http://r{}.example/", i),
                    group: (i == 0).then(|| "Jazz".to_string()),
                    ..Station::default()
                })
                .collect(),
        )
    }

    fn snapshot(session: PlaybackSession, metadata: StreamMetadata) -> Snapshot {
        Snapshot {
            session,
            metadata: Arc::new(metadata),
            ui: UiState {
                number_entry: None,
                notifications: true,
                logging: false,
            },
        }
    }

    fn texts(frame: &RegionFrame) -> Vec<&str> {
        frame.lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_technical_prefers_measured_bitrate() {
        let mut meta = StreamMetadata {
            announced_bitrate: Some("128,64".into()),
            codec: Some("MP3".into()),
            buffer_status: Some("OK".into()),
            cache_duration: Some("4.2s".into()),
            ..StreamMetadata::default()
        };
        assert_eq!(technical_parts(&meta), vec!["64 kbps", "MP3", "OK", "Cache 4.2s"]);
        meta.audio_bitrate = Some("131 kbps".into());
        assert_eq!(technical_parts(&meta)[0], "131 kbps");
    }

    #[test]
    fn test_window_keeps_selection_visible() {
        assert_eq!(window_start(0, 5, 3), 0);
        assert_eq!(window_start(2, 5, 20), 0);
        assert_eq!(window_start(10, 5, 20), 8);
        assert_eq!(window_start(19, 5, 20), 15);
    }

    #[test]
    fn test_fit_width_counts_columns() {
        assert_eq!(fit_width("abcdef", 4), "abcd");
        assert_eq!(fit_width("日本語", 5), "日本");
        assert_eq!(fit_width("ok", 10), "ok");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(59)), "00:59");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }

    #[test]
    fn test_status_and_song_regions() {
        let cat = catalog(3);
        let mut session = PlaybackSession::new(3, 40);
        session.is_playing = true;
        session.playing_index = Some(0);
        session.is_muted = true;
        let now = Instant::now();
        let meta = StreamMetadata {
            artist: "Artist".into(),
            song: "Song".into(),
            title: "Artist - Song".into(),
            ..StreamMetadata::started(now - Duration::from_secs(75))
        };
        let snap = snapshot(session, meta);
        let view = ScreenView::new(
            &cat,
            &snap,
            Layout::for_size(100, 20),
            now,
            "12:00:00".into(),
            &ASCII_GLYPHS,
        );

        let status = view.frame(Region::Status);
        assert_eq!(status.top, 1);
        assert!(status.lines[0].text.starts_with("> Playing: Radio 1"));
        assert!(status.lines[0].text.contains("MUTE"));

        let song = view.frame(Region::Song);
        assert_eq!(texts(&song), vec!["* Song", "  Artist  [01:15]"]);

        let timer = view.frame(Region::Timer);
        assert!(timer.lines[0].text.contains("Uptime 01:15"));
    }

    #[test]
    fn test_station_region_has_fixed_height() {
        let cat = catalog(2);
        let snap = snapshot(PlaybackSession::new(2, 50), StreamMetadata::default());
        let layout = Layout::for_size(80, 16);
        let view = ScreenView::new(&cat, &snap, layout, Instant::now(), String::new(), &ASCII_GLYPHS);

        let frame = view.frame(Region::Stations);
        assert_eq!(frame.lines.len(), layout.station_rows as usize + 1);
        assert_eq!(frame.lines[1].style, LineStyle::Selected);
        assert_eq!(frame.lines[1].text, "    1. Radio 1  [Jazz]");
        assert_eq!(frame.lines[2].text, "    2. Radio 2");
        assert_eq!(view.frame(Region::Input).top, layout.input_top);
        assert!(layout.input_top + 2 <= 16);
    }

    #[test]
    fn test_stopped_regions_are_blank() {
        let cat = catalog(1);
        let snap = snapshot(PlaybackSession::new(1, 50), StreamMetadata::default());
        let view = ScreenView::new(
            &cat,
            &snap,
            Layout::for_size(80, 24),
            Instant::now(),
            String::new(),
            &RICH_GLYPHS,
        );
        assert_eq!(texts(&view.frame(Region::Song)), vec!["", ""]);
        assert_eq!(texts(&view.frame(Region::Technical)), vec![""]);
    }
}
