//! Commands: every user intent the playback core understands.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    // ── Selection ────────────────────────────────────────────────────────────
    SelectNext,
    SelectPrevious,
    /// 1-based station number as typed by the user.
    SelectByNumber(usize),
    SelectRandom,

    // ── Playback ─────────────────────────────────────────────────────────────
    TogglePlayPause,
    Stop,
    VolumeUp,
    VolumeDown,
    ToggleMute,

    // ── UI / ambient ─────────────────────────────────────────────────────────
    ToggleNotifications,
    ToggleLogging,
    /// Number-entry buffer changed; `None` leaves number mode.
    NumberEntry(Option<String>),
    Quit,
}
