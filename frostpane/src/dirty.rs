//! Frame-to-frame invalidation tracking.
//!
//! Every state change between paints is folded into a bitmask; the paint
//! cycle consumes the mask exactly once and performs the work it implies
//! (recapture, re-blur, resource teardown). A flag is never cleared without
//! its work having run.

use std::ops::{BitOr, BitOrAssign};

/// Bitmask of what changed since the last paint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DirtyFlags(u32);

impl DirtyFlags {
    /// The region's on-screen size changed.
    pub const SIZE: Self = Self(1 << 0);
    /// The region moved relative to the frame.
    pub const POSITION: Self = Self(1 << 1);
    /// The screen pixels beneath the region changed.
    pub const CONTENT: Self = Self(1 << 2);
    /// Blur parameters (radius or rounds) changed.
    pub const PARAMS: Self = Self(1 << 3);
    /// The enabled state toggled.
    pub const ENABLED: Self = Self(1 << 4);
    /// Every flag at once.
    pub const ALL: Self = Self(0x1F);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// True when no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True when every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True when any flag in `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl BitOr for DirtyFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DirtyFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Accumulates [`DirtyFlags`] between paints.
///
/// `mark` may be called any number of times in any order (accumulation is
/// a commutative OR); `consume` is the only clearing path and is called
/// once per paint cycle.
#[derive(Debug, Default)]
pub struct DirtyTracker {
    flags: DirtyFlags,
}

impl DirtyTracker {
    /// Creates a clean tracker.
    pub const fn new() -> Self {
        Self {
            flags: DirtyFlags::empty(),
        }
    }

    /// Accumulates `flags` into the pending set.
    pub fn mark(&mut self, flags: DirtyFlags) {
        self.flags |= flags;
    }

    /// Returns everything marked since the last consume and clears the
    /// pending set. The caller is obligated to perform the work the
    /// returned flags imply.
    pub fn consume(&mut self) -> DirtyFlags {
        std::mem::take(&mut self.flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_tracker_consumes_empty() {
        let mut tracker = DirtyTracker::new();
        assert_eq!(tracker.consume(), DirtyFlags::empty());
    }

    #[test]
    fn marks_accumulate_with_or() {
        let mut tracker = DirtyTracker::new();
        tracker.mark(DirtyFlags::SIZE);
        tracker.mark(DirtyFlags::PARAMS);
        tracker.mark(DirtyFlags::SIZE);

        let flags = tracker.consume();
        assert_eq!(flags, DirtyFlags::SIZE | DirtyFlags::PARAMS);
        assert!(flags.contains(DirtyFlags::SIZE));
        assert!(!flags.contains(DirtyFlags::CONTENT));
    }

    #[test]
    fn consume_clears_pending_flags() {
        let mut tracker = DirtyTracker::new();
        tracker.mark(DirtyFlags::ALL);
        assert_eq!(tracker.consume(), DirtyFlags::ALL);
        assert_eq!(tracker.consume(), DirtyFlags::empty());
    }

    #[test]
    fn mark_order_does_not_matter() {
        let mut forward = DirtyTracker::new();
        forward.mark(DirtyFlags::CONTENT);
        forward.mark(DirtyFlags::ENABLED);

        let mut reverse = DirtyTracker::new();
        reverse.mark(DirtyFlags::ENABLED);
        reverse.mark(DirtyFlags::CONTENT);

        assert_eq!(forward.consume(), reverse.consume());
    }

    #[test]
    fn intersects_matches_any_flag() {
        let flags = DirtyFlags::SIZE | DirtyFlags::CONTENT;
        assert!(flags.intersects(DirtyFlags::CONTENT | DirtyFlags::PARAMS));
        assert!(!flags.intersects(DirtyFlags::PARAMS));
    }
}
