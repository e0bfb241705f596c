//! Dirty-region bookkeeping shared by every state producer and the renderer.
//!
//! Producers `mark()` regions from any task; the display loop drains the
//! whole set with a single atomic swap at the start of each frame.  Marks
//! that land while a frame is being drawn survive into the next frame, and
//! repeated marks of the same region before a frame coalesce.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Region {
    Timer,
    Status,
    Song,
    Technical,
    Stations,
    Input,
}

impl Region {
    pub const ALL: [Region; 6] = [
        Region::Timer,
        Region::Status,
        Region::Song,
        Region::Technical,
        Region::Stations,
        Region::Input,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Forces every region to be redrawn from scratch (first paint, resize).
const FULL_REPAINT: u8 = 1 << 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegionSet(u8);

impl RegionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Region::ALL.iter().fold(Self::empty(), |set, r| set.with(*r))
    }

    pub fn with(self, region: Region) -> Self {
        Self(self.0 | region.bit())
    }

    pub fn insert(&mut self, region: Region) {
        self.0 |= region.bit();
    }

    pub fn contains(&self, region: Region) -> bool {
        self.0 & region.bit() != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Region> {
        Region::ALL.into_iter().filter(move |r| self.contains(*r))
    }
}

impl FromIterator<Region> for RegionSet {
    fn from_iter<I: IntoIterator<Item = Region>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), |set, r| set.with(r))
    }
}

/// Result of one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Drained {
    pub regions: RegionSet,
    pub full_repaint: bool,
}

#[derive(Debug, Default)]
pub struct DirtyFlags {
    bits: AtomicU8,
}

impl DirtyFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark(&self, region: Region) {
        self.bits.fetch_or(region.bit(), Ordering::AcqRel);
    }

    pub fn mark_set(&self, regions: RegionSet) {
        if !regions.is_empty() {
            self.bits.fetch_or(regions.0, Ordering::AcqRel);
        }
    }

    pub fn request_full_repaint(&self) {
        self.bits.fetch_or(FULL_REPAINT, Ordering::AcqRel);
    }

    /// Take and clear everything marked so far.
    pub fn take(&self) -> Drained {
        let bits = self.bits.swap(0, Ordering::AcqRel);
        Drained {
            regions: RegionSet(bits & !FULL_REPAINT),
            full_repaint: bits & FULL_REPAINT != 0,
        }
    }
}
