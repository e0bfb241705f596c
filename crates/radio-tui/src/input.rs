//! Keyboard input: key → command mapping and the blocking reader worker.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::Command;
use crate::core::CoreEvent;
use crate::dirty::DirtyFlags;

/// How long one `event::poll` waits before re-checking the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Longest station number accepted in number-entry mode.
const MAX_NUMBER_DIGITS: usize = 4;

/// Stateful key mapper; the only state is the number-entry buffer.
#[derive(Debug, Default)]
pub struct KeyMapper {
    number: Option<String>,
}

impl KeyMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn map(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind == KeyEventKind::Release {
            return Vec::new();
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Command::Quit];
        }

        if let Some(buffer) = self.number.as_mut() {
            match key.code {
                KeyCode::Char(c) if c.is_ascii_digit() => {
                    if buffer.len() < MAX_NUMBER_DIGITS {
                        buffer.push(c);
                    }
                    return vec![Command::NumberEntry(Some(buffer.clone()))];
                }
                KeyCode::Backspace => {
                    buffer.pop();
                    if buffer.is_empty() {
                        self.number = None;
                        return vec![Command::NumberEntry(None)];
                    }
                    return vec![Command::NumberEntry(Some(buffer.clone()))];
                }
                KeyCode::Enter => {
                    let typed = self.number.take().unwrap_or_default();
                    let mut out = vec![Command::NumberEntry(None)];
                    match typed.parse::<usize>() {
                        Ok(n) => out.push(Command::SelectByNumber(n)),
                        Err(_) => debug!("input: ignoring station number {:?}", typed),
                    }
                    return out;
                }
                KeyCode::Esc => {
                    self.number = None;
                    return vec![Command::NumberEntry(None)];
                }
                _ => {
                    // Any other key leaves number mode and is handled normally.
                    self.number = None;
                    let mut out = vec![Command::NumberEntry(None)];
                    out.extend(self.map_normal(key));
                    return out;
                }
            }
        }

        self.map_normal(key)
    }

    fn map_normal(&mut self, key: KeyEvent) -> Vec<Command> {
        let cmd = match key.code {
            KeyCode::Char('q') => Command::Quit,
            KeyCode::Char('p') | KeyCode::Char(' ') | KeyCode::Enter => Command::TogglePlayPause,
            KeyCode::Char('s') => Command::Stop,
            KeyCode::Char('m') => Command::ToggleMute,
            KeyCode::Char('+') | KeyCode::Char('=') => Command::VolumeUp,
            KeyCode::Char('-') | KeyCode::Char('_') => Command::VolumeDown,
            KeyCode::Up | KeyCode::Char('k') => Command::SelectPrevious,
            KeyCode::Down | KeyCode::Char('j') => Command::SelectNext,
            KeyCode::Char('r') => Command::SelectRandom,
            KeyCode::Char('t') => Command::ToggleNotifications,
            KeyCode::Char('l') => Command::ToggleLogging,
            KeyCode::Char(c) if c.is_ascii_digit() => {
                let buffer = c.to_string();
                self.number = Some(buffer.clone());
                Command::NumberEntry(Some(buffer))
            }
            _ => return Vec::new(),
        };
        vec![cmd]
    }
}

/// Blocking reader on the runtime's blocking pool.
///
/// Polls with a short timeout so a cleared `running` flag is noticed within
/// one interval.  Quit clears the flag itself; every other command is
/// forwarded to the core.
pub fn spawn_input_worker(
    running: Arc<AtomicBool>,
    events: mpsc::Sender<CoreEvent>,
    dirty: Arc<DirtyFlags>,
) -> tokio::task::JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let mut mapper = KeyMapper::new();
        while running.load(Ordering::Acquire) {
            match event::poll(POLL_INTERVAL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("input: poll failed: {}", e);
                    running.store(false, Ordering::Release);
                    break;
                }
            }

            let ev = match event::read() {
                Ok(ev) => ev,
                Err(e) => {
                    warn!("input: read failed: {}", e);
                    running.store(false, Ordering::Release);
                    break;
                }
            };

            match ev {
                Event::Key(key) => {
                    for cmd in mapper.map(key) {
                        if cmd == Command::Quit {
                            debug!("input: quit requested");
                            running.store(false, Ordering::Release);
                            break;
                        }
                        if events.blocking_send(CoreEvent::Command(cmd)).is_err() {
                            running.store(false, Ordering::Release);
                            break;
                        }
                    }
                }
                Event::Resize(w, h) => {
                    debug!("input: resize to {}x{}", w, h);
                    dirty.request_full_repaint();
                }
                _ => {}
            }
        }
        debug!("input: worker exiting");
    })
}
