//! Dirty-region renderer.
//!
//! `RenderDiffEngine` drains the shared `DirtyFlags`, asks a `RegionSource`
//! for the current text of each dirty region, and rewrites only the rows
//! whose region text differs from what was last drawn.  Output goes through
//! a `Surface`, chosen once at startup: a styled crossterm terminal, or a
//! plain monochrome fallback.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::Arc;

use crossterm::cursor::MoveTo;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;

use crate::dirty::{DirtyFlags, Region, RegionSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Normal,
    Header,
    Accent,
    Dim,
    Selected,
    Playing,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledLine {
    pub text: String,
    pub style: LineStyle,
}

impl StyledLine {
    pub fn new(text: impl Into<String>, style: LineStyle) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, LineStyle::Normal)
    }

    pub fn blank() -> Self {
        Self::plain(String::new())
    }
}

/// Rows occupied by one region, starting at screen row `top`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionFrame {
    pub top: u16,
    pub lines: Vec<StyledLine>,
}

pub trait RegionSource {
    fn frame(&self, region: Region) -> RegionFrame;
}

/// Output device for cursor-addressed rows.
pub trait Surface: Send {
    /// `(columns, rows)`.
    fn size(&self) -> (u16, u16);
    /// The view should avoid non-ASCII glyphs.
    fn ascii_only(&self) -> bool;
    fn clear(&mut self) -> io::Result<()>;
    fn write_line(&mut self, row: u16, line: &StyledLine) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

fn terminal_size() -> (u16, u16) {
    terminal::size().unwrap_or((80, 24))
}

/// Colours and attributes through crossterm.
pub struct TerminalSurface<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Surface for TerminalSurface<W> {
    fn size(&self) -> (u16, u16) {
        terminal_size()
    }

    fn ascii_only(&self) -> bool {
        false
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn write_line(&mut self, row: u16, line: &StyledLine) -> io::Result<()> {
        queue!(self.out, MoveTo(0, row), Clear(ClearType::CurrentLine))?;
        match line.style {
            LineStyle::Normal => {}
            LineStyle::Header => queue!(
                self.out,
                SetForegroundColor(Color::Cyan),
                SetAttribute(Attribute::Bold)
            )?,
            LineStyle::Accent => queue!(self.out, SetForegroundColor(Color::Yellow))?,
            LineStyle::Dim => queue!(self.out, SetForegroundColor(Color::DarkGrey))?,
            LineStyle::Selected => queue!(self.out, SetAttribute(Attribute::Reverse))?,
            LineStyle::Playing => queue!(
                self.out,
                SetForegroundColor(Color::Green),
                SetAttribute(Attribute::Bold)
            )?,
            LineStyle::Warning => queue!(self.out, SetForegroundColor(Color::Red))?,
        }
        queue!(
            self.out,
            Print(&line.text),
            ResetColor,
            SetAttribute(Attribute::Reset)
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Fallback for terminals without colour support: positioned text only.
pub struct PlainSurface<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> PlainSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> Surface for PlainSurface<W> {
    fn size(&self) -> (u16, u16) {
        terminal_size()
    }

    fn ascii_only(&self) -> bool {
        true
    }

    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All))
    }

    fn write_line(&mut self, row: u16, line: &StyledLine) -> io::Result<()> {
        queue!(
            self.out,
            MoveTo(0, row),
            Clear(ClearType::CurrentLine),
            Print(&line.text)
        )
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

pub struct RenderDiffEngine {
    flags: Arc<DirtyFlags>,
    last: HashMap<Region, RegionFrame>,
    painted: bool,
}

impl RenderDiffEngine {
    pub fn new(flags: Arc<DirtyFlags>) -> Self {
        Self {
            flags,
            last: HashMap::new(),
            painted: false,
        }
    }

    /// Draw one frame; returns the number of rows rewritten.
    ///
    /// The first call (and any requested full repaint) clears the screen and
    /// draws every region.
    pub fn render(
        &mut self,
        surface: &mut dyn Surface,
        source: &dyn RegionSource,
    ) -> io::Result<usize> {
        let drained = self.flags.take();
        let full = drained.full_repaint || !self.painted;
        let regions = if full {
            surface.clear()?;
            self.last.clear();
            RegionSet::all()
        } else {
            drained.regions
        };
        if regions.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        for region in regions.iter() {
            let frame = source.frame(region);
            if self.last.get(&region) == Some(&frame) {
                continue;
            }
            for (offset, line) in frame.lines.iter().enumerate() {
                surface.write_line(frame.top + offset as u16, line)?;
                written += 1;
            }
            self.last.insert(region, frame);
        }

        if written > 0 || full {
            surface.flush()?;
        }
        self.painted = true;
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingSurface {
        clears: usize,
        flushes: usize,
        writes: Vec<(u16, String)>,
    }

    impl Surface for RecordingSurface {
        fn size(&self) -> (u16, u16) {
            (80, 24)
        }

        fn ascii_only(&self) -> bool {
            true
        }

        fn clear(&mut self) -> io::Result<()> {
            self.clears += 1;
            Ok(())
        }

        fn write_line(&mut self, row: u16, line: &StyledLine) -> io::Result<()> {
            self.writes.push((row, line.text.clone()));
            Ok(())
        }

        fn flush(&mut self) -> io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    /// One line per region, at row = region ordinal.
    struct FakeSource {
        text: RefCell<HashMap<Region, String>>,
    }

    impl FakeSource {
        fn new() -> Self {
            let text = Region::ALL
                .iter()
                .map(|r| (*r, format!("{:?}", r)))
                .collect();
            Self {
                text: RefCell::new(text),
            }
        }

        fn set(&self, region: Region, text: &str) {
            self.text.borrow_mut().insert(region, text.to_string());
        }
    }

    impl RegionSource for FakeSource {
        fn frame(&self, region: Region) -> RegionFrame {
            RegionFrame {
                top: region as u16,
                lines: vec![StyledLine::plain(self.text.borrow()[&region].clone())],
            }
        }
    }

    #[test]
    fn test_first_render_paints_everything() {
        let flags = Arc::new(DirtyFlags::new());
        let mut engine = RenderDiffEngine::new(flags);
        let mut surface = RecordingSurface::default();
        let source = FakeSource::new();

        let n = engine.render(&mut surface, &source).unwrap();
        assert_eq!(n, Region::ALL.len());
        assert_eq!(surface.clears, 1);
        assert_eq!(surface.flushes, 1);
    }

    #[test]
    fn test_only_changed_dirty_regions_are_rewritten() {
        let flags = Arc::new(DirtyFlags::new());
        let mut engine = RenderDiffEngine::new(flags.clone());
        let mut surface = RecordingSurface::default();
        let source = FakeSource::new();
        engine.render(&mut surface, &source).unwrap();
        surface.writes.clear();

        // Dirty but unchanged: nothing written, flag still consumed.
        flags.mark(Region::Timer);
        assert_eq!(engine.render(&mut surface, &source).unwrap(), 0);
        assert!(flags.take().regions.is_empty());

        // Changed but not dirty: not noticed.
        source.set(Region::Song, "new song");
        assert_eq!(engine.render(&mut surface, &source).unwrap(), 0);

        flags.mark(Region::Song);
        flags.mark(Region::Status);
        assert_eq!(engine.render(&mut surface, &source).unwrap(), 1);
        assert_eq!(surface.writes, vec![(Region::Song as u16, "new song".to_string())]);
        assert_eq!(surface.clears, 1);
    }

    #[test]
    fn test_full_repaint_request() {
        let flags = Arc::new(DirtyFlags::new());
        let mut engine = RenderDiffEngine::new(flags.clone());
        let mut surface = RecordingSurface::default();
        let source = FakeSource::new();
        engine.render(&mut surface, &source).unwrap();

        flags.request_full_repaint();
        let n = engine.render(&mut surface, &source).unwrap();
        assert_eq!(n, Region::ALL.len());
        assert_eq!(surface.clears, 2);
    }

    #[test]
    fn test_plain_surface_emits_no_colour() {
        let mut surface = PlainSurface::new(Vec::new());
        surface
            .write_line(3, &StyledLine::new("hello", LineStyle::Header))
            .unwrap();
        surface.flush().unwrap();
        let out = String::from_utf8(surface.out).unwrap();
        assert!(out.contains("hello"));
        // Cursor move to row 4 col 1 (1-based).
        assert!(out.contains("\x1b[4;1H"));
        assert!(!out.contains("\x1b[36m"));
    }
}
