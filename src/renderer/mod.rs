//! Rendering abstraction layer.
//!
//! The wall rasterizer never touches pixels.  For every visible slice of
//! wall it prepares one fully resolved [`ColumnRequest`] and hands it to
//! whatever [`ColumnPainter`] the host plugged in: a palette blitter, a
//! filtered blitter, a test recorder.  Back-ends can be swapped without
//! touching the clipping or projection logic.

use crate::fixed::Fixed;

/// Pixel format of a software frame-buffer (0xAARRGGBB).
pub type Rgba = u32;

/// Everything needed to draw one vertical strip of texture.
///
/// `y_top ..= y_bottom` is non-empty and already clipped against the
/// per-column open span; the painter only converts texels to pixels.
#[derive(Clone, Copy, Debug)]
pub struct ColumnRequest<'a> {
    pub x: i32,
    pub y_top: i32,
    pub y_bottom: i32,

    /// Texture-space height aligned with the screen center row.
    pub texture_mid: Fixed,
    /// Texel step per screen pixel (reciprocal of the column scale).
    pub iscale: Fixed,
    /// Nominal tier height in texels; 0 lets the texture tile freely.
    pub tex_height: i32,
    /// Depth of this column (the projective scale), for distance effects.
    pub depth: Fixed,

    /// Fractional horizontal sample coordinate, for filtering back-ends.
    pub texel_u: Fixed,
    /// Shading tables for this column and its filter neighbor.
    pub colormap: u8,
    pub next_colormap: u8,

    /// Texel columns: the sampled one and its two wrapped neighbors.
    pub source: &'a [u8],
    pub prev_source: &'a [u8],
    pub next_source: &'a [u8],
}

/// The pixel-column drawing primitive.  Implementations own the output
/// image; the rasterizer guarantees requests arrive in column order
/// within one wall span and never overlap vertically within a column.
pub trait ColumnPainter {
    fn draw_column(&mut self, req: &ColumnRequest<'_>);
}

pub mod software;
