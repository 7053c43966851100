//! Classic column-based software wall rasterizer.
//!
//! One [`Rasterizer`] owns all frame-scoped state: the per-column clip
//! bands, the openings arenas, the draw-segment table, the plane
//! accumulator and the active precision profile.  The visibility
//! traversal drives it strictly front-to-back, one wall span at a time,
//! then replays the masked mid-textures back-to-front.

mod masked;
mod openings;
mod planes;
mod precision;
mod view;
mod walls;

pub use openings::{DrawSeg, Openings, Silhouette, SpriteClip};
pub use planes::{PlaneBank, PlaneId, UNMARKED, VisPlane};
pub use view::View;
pub use walls::SpanArgs;

use precision::Precision;

/// Per-column occlusion state, shared by every wall span of the frame.
///
/// `ceiling[x]` is the last row covered from the top (-1 = fully open),
/// `floor[x]` the first free row from the bottom (screen height = fully
/// open).  `solid[x]` flags columns through which nothing further can be
/// seen; the traversal reads it to prune descent.
#[derive(Default)]
pub struct ClipBands {
    pub ceiling: Vec<i32>,
    pub floor: Vec<i32>,
    pub solid: Vec<bool>,
}

pub struct Rasterizer {
    pub view: View,
    pub clip: ClipBands,
    pub openings: Openings,
    pub drawsegs: Vec<DrawSeg>,
    pub planes: PlaneBank,

    precision: Precision,
    adaptive_precision: bool,
}

impl Rasterizer {
    pub fn new(view: View) -> Self {
        let w = view.width;
        let h = view.height;
        let mut r = Rasterizer {
            view,
            clip: ClipBands {
                ceiling: vec![-1; w],
                floor: vec![h as i32; w],
                solid: vec![false; w],
            },
            openings: Openings::default(),
            drawsegs: Vec::with_capacity(256),
            planes: PlaneBank::default(),
            precision: Precision::default(),
            adaptive_precision: true,
        };
        r.begin_frame();
        r
    }

    /// Toggle per-sector precision adaptation.  Off falls back to the
    /// legacy 64-unit clamp with 12 fractional height bits.
    pub fn set_adaptive_precision(&mut self, on: bool) {
        self.adaptive_precision = on;
        if !on {
            self.precision.reset_legacy();
        }
    }

    /// Reset all frame-scoped state; call once before the first wall
    /// span of a frame.
    pub fn begin_frame(&mut self) {
        let w = self.view.width;
        self.clip.ceiling.fill(-1);
        self.clip.floor.fill(self.view.height as i32);
        self.clip.solid.fill(false);
        self.openings.begin_frame();
        self.drawsegs.clear();
        self.planes.clear(w);
    }

    /// True when nothing further can be drawn into this column.
    pub fn is_solid(&self, x: i32) -> bool {
        self.clip.solid[x as usize]
    }
}
