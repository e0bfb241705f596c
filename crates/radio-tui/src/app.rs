//! Display loop and terminal ownership.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::{cursor, execute, terminal};
use radio_proto::catalog::StationCatalog;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::core::CoreEvent;
use crate::dirty::{DirtyFlags, Region};
use crate::input;
use crate::render::{RenderDiffEngine, Surface};
use crate::session::{PlayerStatus, Snapshot};
use crate::view::{Layout, ScreenView, ASCII_GLYPHS, RICH_GLYPHS};

/// Raw mode plus alternate screen, undone on drop and on panic.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> io::Result<Self> {
        let default_hook = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            default_hook(info);
        }));

        terminal::enable_raw_mode()?;
        execute!(io::stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

fn restore_terminal() {
    execute!(io::stdout(), terminal::LeaveAlternateScreen, cursor::Show).ok();
    terminal::disable_raw_mode().ok();
}

pub struct App {
    catalog: Arc<StationCatalog>,
    snapshots: watch::Receiver<Snapshot>,
    dirty: Arc<DirtyFlags>,
    events_tx: mpsc::Sender<CoreEvent>,
    surface: Box<dyn Surface>,
    frame_interval: Duration,
    timer_interval: Duration,
    running: Arc<AtomicBool>,
}

impl App {
    pub fn new(
        catalog: Arc<StationCatalog>,
        snapshots: watch::Receiver<Snapshot>,
        dirty: Arc<DirtyFlags>,
        events_tx: mpsc::Sender<CoreEvent>,
        surface: Box<dyn Surface>,
        frame_interval: Duration,
        timer_interval: Duration,
    ) -> Self {
        Self {
            catalog,
            snapshots,
            dirty,
            events_tx,
            surface,
            frame_interval,
            timer_interval,
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Own the terminal until quit, then shut the core down and wait for it.
    pub async fn run(mut self, core: JoinHandle<anyhow::Result<()>>) -> anyhow::Result<()> {
        let guard = TerminalGuard::enter()?;
        debug!("app: terminal ready, size={:?}", self.surface.size());

        let input = input::spawn_input_worker(
            self.running.clone(),
            self.events_tx.clone(),
            self.dirty.clone(),
        );

        let result = self.display_loop().await;
        self.running.store(false, Ordering::Release);

        if self.events_tx.send(CoreEvent::Shutdown).await.is_err() {
            debug!("app: core already gone");
        }
        match core.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("app: core exited with error: {}", e),
            Err(e) => error!("app: core task failed: {}", e),
        }
        if let Err(e) = input.await {
            warn!("app: input worker failed: {}", e);
        }

        drop(guard);
        info!("app: terminal restored");
        result
    }

    async fn display_loop(&mut self) -> anyhow::Result<()> {
        let glyphs = if self.surface.ascii_only() {
            &ASCII_GLYPHS
        } else {
            &RICH_GLYPHS
        };
        let mut engine = RenderDiffEngine::new(self.dirty.clone());

        let mut frame = tokio::time::interval(self.frame_interval);
        frame.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut timer = tokio::time::interval(self.timer_interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_size = self.surface.size();

        while self.running.load(Ordering::Acquire) {
            tokio::select! {
                _ = frame.tick() => {
                    let size = self.surface.size();
                    if size != last_size {
                        last_size = size;
                        self.dirty.request_full_repaint();
                    }
                    let snap = self.snapshots.borrow().clone();
                    let view = ScreenView::new(
                        &self.catalog,
                        &snap,
                        Layout::for_size(size.0, size.1),
                        Instant::now(),
                        chrono::Local::now().format("%H:%M:%S").to_string(),
                        glyphs,
                    );
                    engine.render(self.surface.as_mut(), &view)?;
                }
                _ = timer.tick() => {
                    self.dirty.mark(Region::Timer);
                    if self.snapshots.borrow().session.status() == PlayerStatus::Playing {
                        self.dirty.mark(Region::Song);
                        self.dirty.mark(Region::Technical);
                    }
                }
            }
        }
        debug!("app: display loop finished");
        Ok(())
    }
}
