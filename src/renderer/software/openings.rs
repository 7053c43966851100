//! Per-frame arenas shared by every rasterized wall span.
//!
//! Draw-segment records outlive the span that created them (the masked
//! pass and the sprite clipper read them later), so everything they
//! reference in the arenas is an index from the pool base.  Growth may
//! reallocate the backing storage mid-frame; indices stay valid across
//! any reallocation, which is the whole point.

use std::ops::Range;

use bitflags::bitflags;

use crate::fixed::{Angle, Fixed};
use crate::world::geometry::SegmentId;

bitflags! {
    /// Which vertical edges of a wall occlude sprites behind it.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Silhouette: u8 {
        const BOTTOM = 0x01;
        const TOP    = 0x02;
        const BOTH   = 0x03;
    }
}

/// Where a draw-segment's sprite-clip boundary for one edge comes from.
///
/// Fully open walls do not pay for a pool block; the two synthetic
/// variants stand in for "clip everything" rows without any storage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SpriteClip {
    #[default]
    Unset,
    /// Every column clipped at the bottom screen edge.
    ScreenBottom,
    /// Every column clipped at row -1 (top edge).
    AboveTop,
    /// Snapshot block in the openings arena, first slot = column `x1`.
    Stored(usize),
}

impl SpriteClip {
    /// Clip row for screen column `x` of a span starting at `x1`.
    /// `Unset` carries no clip information and must not be queried.
    pub fn row_at(&self, openings: &Openings, x1: i32, x: i32, screen_h: i32) -> i32 {
        match self {
            SpriteClip::Unset => {
                debug_assert!(false, "queried an unsaved sprite clip");
                screen_h
            }
            SpriteClip::ScreenBottom => screen_h,
            SpriteClip::AboveTop => -1,
            SpriteClip::Stored(base) => openings.clip(base + (x - x1) as usize),
        }
    }
}

/// One persistent record per rasterized wall span, consumed by the
/// masked-texture pass and the sprite clipper after the opaque pass.
#[derive(Debug, Clone, Default)]
pub struct DrawSeg {
    pub seg: SegmentId,
    pub x1: i32,
    pub x2: i32,

    pub scale1: Fixed,
    pub scale2: Fixed,
    pub scale_step: Fixed,

    /// Texture-space parameters frozen at setup time for the masked pass.
    pub center_angle: Angle,
    pub offset: Fixed,
    pub distance: Fixed,

    pub silhouette: Silhouette,
    /// Do not clip sprites above this height.
    pub tsil_height: Fixed,
    /// Do not clip sprites below this height.
    pub bsil_height: Fixed,

    pub top_clip: SpriteClip,
    pub bottom_clip: SpriteClip,

    /// Masked mid-texture column block in the arena, first slot = `x1`.
    pub masked: Option<usize>,
}

/// The growable per-frame pools: clip-row snapshots and masked-pass
/// texture columns.  Append-only within a frame, reset wholesale between
/// frames.  A taken (`None`) texture-column slot marks that column as
/// already drawn.
#[derive(Default)]
pub struct Openings {
    clips: Vec<i32>,
    clips_used: usize,
    texcols: Vec<Option<i32>>,
    texcols_used: usize,
}

impl Openings {
    pub fn begin_frame(&mut self) {
        self.clips_used = 0;
        self.texcols_used = 0;
    }

    /// Grow both pools ahead of one wall span so every allocation the
    /// span can make (two clip snapshots plus one masked block) succeeds.
    pub fn ensure_span(&mut self, span: usize) {
        let clips_need = self.clips_used + 2 * span;
        if clips_need > self.clips.len() {
            self.clips.resize(clips_need.next_power_of_two(), 0);
        }
        let texcols_need = self.texcols_used + span;
        if texcols_need > self.texcols.len() {
            self.texcols.resize(texcols_need.next_power_of_two(), None);
        }
    }

    /// Hand out `len` clip slots; returns the base index of the block.
    pub fn alloc_clips(&mut self, len: usize) -> usize {
        let base = self.clips_used;
        self.clips_used += len;
        if self.clips_used > self.clips.len() {
            self.clips.resize(self.clips_used.next_power_of_two(), 0);
        }
        base
    }

    /// Hand out `len` texture-column slots, all pending (`Some` once
    /// filled by the opaque pass, `None` = drawn/empty).
    pub fn alloc_texcols(&mut self, len: usize) -> usize {
        let base = self.texcols_used;
        self.texcols_used += len;
        if self.texcols_used > self.texcols.len() {
            self.texcols.resize(self.texcols_used.next_power_of_two(), None);
        }
        self.texcols[base..base + len].fill(None);
        base
    }

    #[inline]
    pub fn clip(&self, idx: usize) -> i32 {
        self.clips[idx]
    }

    #[inline]
    pub fn set_clip(&mut self, idx: usize, row: i32) {
        self.clips[idx] = row;
    }

    pub fn clip_block(&self, range: Range<usize>) -> &[i32] {
        &self.clips[range]
    }

    #[inline]
    pub fn texcol(&self, idx: usize) -> Option<i32> {
        self.texcols[idx]
    }

    #[inline]
    pub fn set_texcol(&mut self, idx: usize, col: Option<i32>) {
        self.texcols[idx] = col;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn growth_preserves_stored_blocks() {
        let mut op = Openings::default();
        op.begin_frame();
        let base = op.alloc_clips(4);
        for (i, row) in [10, 20, 30, 40].into_iter().enumerate() {
            op.set_clip(base + i, row);
        }
        // Force several reallocations; the old block must read back
        // unchanged through the same indices.
        for _ in 0..6 {
            let big = op.alloc_clips(1000);
            op.set_clip(big, -7);
        }
        assert_eq!(op.clip_block(base..base + 4), &[10, 20, 30, 40]);
    }

    #[test]
    fn texcol_growth_preserves_pending_slots() {
        let mut op = Openings::default();
        op.begin_frame();
        let a = op.alloc_texcols(3);
        op.set_texcol(a, Some(17));
        op.set_texcol(a + 1, None);
        op.set_texcol(a + 2, Some(99));
        let _ = op.alloc_texcols(5000);
        assert_eq!(op.texcol(a), Some(17));
        assert_eq!(op.texcol(a + 1), None);
        assert_eq!(op.texcol(a + 2), Some(99));
    }

    #[test]
    fn blocks_are_disjoint() {
        let mut op = Openings::default();
        op.begin_frame();
        let a = op.alloc_clips(8);
        let b = op.alloc_clips(8);
        assert!(b >= a + 8);
    }

    #[test]
    fn frame_reset_recycles_storage() {
        let mut op = Openings::default();
        op.begin_frame();
        let a = op.alloc_clips(16);
        op.begin_frame();
        let b = op.alloc_clips(16);
        assert_eq!(a, b);
    }

    #[test]
    fn fresh_texcol_blocks_are_pending_after_reuse() {
        let mut op = Openings::default();
        op.begin_frame();
        let a = op.alloc_texcols(2);
        op.set_texcol(a, Some(5));
        op.begin_frame();
        let b = op.alloc_texcols(2);
        assert_eq!(b, a);
        assert_eq!(op.texcol(b), None, "recycled slots must not leak columns");
    }

    #[test]
    fn synthetic_sprite_clips_need_no_storage() {
        let op = Openings::default();
        assert_eq!(SpriteClip::ScreenBottom.row_at(&op, 5, 9, 200), 200);
        assert_eq!(SpriteClip::AboveTop.row_at(&op, 5, 9, 200), -1);
    }

    #[test]
    fn stored_sprite_clip_indexes_from_span_start() {
        let mut op = Openings::default();
        op.begin_frame();
        let base = op.alloc_clips(3);
        op.set_clip(base, 100);
        op.set_clip(base + 1, 101);
        op.set_clip(base + 2, 102);
        let clip = SpriteClip::Stored(base);
        assert_eq!(clip.row_at(&op, 10, 10, 200), 100);
        assert_eq!(clip.row_at(&op, 10, 12, 200), 102);
    }
}
