//! Deferred rendering of semi-transparent mid textures.
//!
//! Two-sided walls with a middle texture cannot draw it during the
//! opaque pass (geometry behind must resolve first).  Setup freezes the
//! span's scale and texture-space parameters in its draw-segment record
//! and banks one texture column per screen column; this pass replays
//! them back-to-front once the opaque walls are done.

use crate::fixed::{FRACBITS, FRACUNIT, Fixed, fixed_mul};
use crate::renderer::{ColumnPainter, ColumnRequest};
use crate::renderer::software::Rasterizer;
use crate::world::geometry::{Level, LinedefFlags, RenderFlags};
use crate::world::texture::TextureBank;

impl Rasterizer {
    /// Draw the masked mid-texture columns of `drawsegs[ds_index]` over
    /// `[x1, x2]`.  Columns whose banked slot was already taken are
    /// skipped, so overlapping invocations never double-blend.
    pub fn render_masked_range(
        &mut self,
        level: &Level,
        bank: &TextureBank,
        painter: &mut dyn ColumnPainter,
        ds_index: usize,
        x1: i32,
        x2: i32,
    ) {
        let ds = self.drawsegs[ds_index].clone();
        let Some(masked_base) = ds.masked else {
            return;
        };
        debug_assert!(x1 >= ds.x1 && x2 <= ds.x2);

        let seg = &level.segs[ds.seg as usize];
        let sidedef = level.front_sidedef(seg);
        let linedef = &level.linedefs[seg.linedef as usize];
        let (front_id, back_id) = level.sectors_of_seg(seg);
        let front = &level.sectors[front_id as usize];
        let back = &level.sectors[back_id.expect("masked wall must be two-sided") as usize];

        // Two-sided normal textures must shade with the light the player
        // actually perceives, even under deep-water sector tricks.
        let light = level.effective_light(front_id, self.view.z);

        let tex = bank.texture_or_missing(sidedef.middle);
        let tex_h = tex.height_fixed();
        let tex_height = if linedef.render_flags.contains(RenderFlags::MID_TILE) {
            0
        } else {
            tex_h >> FRACBITS
        };

        // vertical positioning, pegged across the opening
        let mut texturemid = if linedef.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
            front.floor_h.max(back.floor_h) + tex_h - self.view.z
        } else {
            front.ceil_h.min(back.ceil_h) - self.view.z
        };
        texturemid += sidedef.y_off;

        let screen_h = self.view.height as i32;
        let mut spryscale = ds.scale1 + (x1 - ds.x1) * ds.scale_step;

        for x in x1..=x2 {
            let slot = masked_base + (x - ds.x1) as usize;
            if let Some(texcol) = self.openings.texcol(slot) {
                let colormap = self.view.wall_colormap(light, spryscale);
                let next_colormap = self
                    .view
                    .wall_colormap(light.saturating_add(1), spryscale);

                // Double-width intermediate: the single-width product of
                // texturemid and scale overflows for tall sectors seen
                // up close, and an overflowed placement would sample far
                // outside the texture.
                let t = ((self.view.centery_frac as i64) << FRACBITS)
                    - texturemid as i64 * spryscale as i64;
                if (t + tex_h as i64 * spryscale as i64) < 0
                    || t > (screen_h as i64) << (2 * FRACBITS)
                {
                    // entirely off-screen; leave the column pending
                    spryscale += ds.scale_step;
                    continue;
                }
                let sprtop = (t >> FRACBITS) as Fixed;
                let sprbottom = sprtop + fixed_mul(spryscale, tex_h);

                let ceil = ds.top_clip.row_at(&self.openings, ds.x1, x, screen_h);
                let floor = ds.bottom_clip.row_at(&self.openings, ds.x1, x, screen_h);
                let mut yl = (sprtop + FRACUNIT - 1) >> FRACBITS;
                let mut yh = (sprbottom - 1) >> FRACBITS;
                if yl <= ceil {
                    yl = ceil + 1;
                }
                if yh >= floor {
                    yh = floor - 1;
                }

                if yl <= yh {
                    // texture offset exactly as the opaque pass derived it
                    let angle = ds.center_angle + self.view.x_to_angle[x as usize];
                    let texel_u = ds.offset - fixed_mul(angle.fine_tangent(), ds.distance);
                    let iscale = (u32::MAX / spryscale.max(1) as u32) as Fixed;

                    painter.draw_column(&ColumnRequest {
                        x,
                        y_top: yl,
                        y_bottom: yh,
                        texture_mid: texturemid,
                        iscale,
                        tex_height,
                        depth: spryscale,
                        texel_u,
                        colormap,
                        next_colormap,
                        source: tex.column_wrapped(texcol),
                        prev_source: tex.column_wrapped(texcol - 1),
                        next_source: tex.column_wrapped(texcol + 1),
                    });
                }

                // drawn (or provably empty): never revisit this column
                self.openings.set_texcol(slot, None);
            }
            spryscale += ds.scale_step;
        }
    }
}

/*──────────────────────────────── tests ───────────────────────────────*/

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::software::walls::tests::{
        FLAT, RecordingPainter, angle_to_vertex, eye_level_view, plain_sidedef, test_bank,
        wall_level,
    };
    use crate::renderer::software::{Rasterizer, SpanArgs};
    use crate::world::geometry::{Linedef, LinedefFlags, RenderFlags, Sector};
    use crate::world::texture::NO_TEXTURE;

    fn grate_linedef() -> Linedef {
        Linedef {
            v1: 0,
            v2: 1,
            flags: LinedefFlags::TWO_SIDED,
            render_flags: RenderFlags::empty(),
            right_sidedef: Some(0),
            left_sidedef: Some(1),
        }
    }

    /// Two-sided wall carrying a masked grate, rasterized over
    /// `[start, stop]`; returns the rasterizer primed for the masked
    /// pass.
    fn rasterized_grate(
        floor: i32,
        ceil: i32,
        start: i32,
        stop: i32,
    ) -> (crate::world::geometry::Level, Rasterizer) {
        let bank = test_bank();
        let mut level = wall_level(
            grate_linedef(),
            vec![
                plain_sidedef(NO_TEXTURE, NO_TEXTURE, 3),
                plain_sidedef(NO_TEXTURE, NO_TEXTURE, NO_TEXTURE),
            ],
            vec![
                Sector::new(floor, ceil, FLAT, FLAT, 128),
                Sector::new(floor, ceil, FLAT, FLAT, 144),
            ],
        );
        level.sidedefs[1].sector = 1;
        let mut raster = Rasterizer::new(eye_level_view());
        let mut painter = RecordingPainter::default();
        let args = SpanArgs {
            seg: 0,
            start,
            stop,
            angle1: angle_to_vertex(&level, 0),
            ceiling_plane: None,
            floor_plane: None,
        };
        raster.store_wall_range(&mut level, &bank, &mut painter, &args);
        (level, raster)
    }

    #[test]
    fn masked_pass_draws_each_pending_column_once() {
        let (level, mut raster) = rasterized_grate(0, 128, 150, 170);
        let bank = test_bank();

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        let drawn: Vec<i32> = painter.columns.iter().map(|c| c.0).collect();
        assert_eq!(drawn, (150..=170).collect::<Vec<_>>());
        for &(_, yl, yh) in &painter.columns {
            assert!(yl <= yh && yl >= 0 && yh < 200);
        }

        // second invocation over the same range: sentinel slots skip all
        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        assert!(painter.columns.is_empty(), "columns drew twice");
    }

    #[test]
    fn overlapping_ranges_never_double_draw() {
        let (level, mut raster) = rasterized_grate(0, 128, 150, 170);
        let bank = test_bank();

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 160);
        raster.render_masked_range(&level, &bank, &mut painter, 0, 155, 170);
        let mut drawn: Vec<i32> = painter.columns.iter().map(|c| c.0).collect();
        drawn.sort_unstable();
        drawn.dedup();
        assert_eq!(drawn.len(), painter.columns.len(), "a column drew twice");
        assert_eq!(drawn, (150..=170).collect::<Vec<_>>());
    }

    #[test]
    fn off_screen_placement_is_skipped_and_stays_pending() {
        // A grate high above the view: the projected top lands below
        // nothing and the bottom above everything, so the column must be
        // skipped outright rather than drawn with a garbage placement.
        let (level, mut raster) = rasterized_grate(20000, 20128, 150, 170);
        let bank = test_bank();

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        assert!(painter.columns.is_empty());

        // skipped columns remain pending for a later, saner pass
        let base = raster.drawsegs[0].masked.unwrap();
        assert!(raster.openings.texcol(base).is_some());
    }

    #[test]
    fn masked_pass_respects_saved_clip_rows() {
        let (level, mut raster) = rasterized_grate(0, 128, 150, 170);
        let bank = test_bank();

        // Tighten the saved clip snapshot as if a nearer wall had
        // covered the upper half of the opening.
        let ds = raster.drawsegs[0].clone();
        if let crate::renderer::software::SpriteClip::Stored(base) = ds.top_clip {
            for i in 0..21 {
                raster.openings.set_clip(base + i, 120);
            }
        } else {
            panic!("masked wall must have saved top clips");
        }

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        for &(_, yl, _) in &painter.columns {
            assert!(yl >= 121, "column leaked above the saved clip row");
        }
    }

    #[test]
    fn unpegged_grate_hangs_from_the_higher_floor() {
        let bank = test_bank();
        let mut level = wall_level(
            grate_linedef(),
            vec![
                plain_sidedef(NO_TEXTURE, NO_TEXTURE, 2), // STEP, 64 tall
                plain_sidedef(NO_TEXTURE, NO_TEXTURE, NO_TEXTURE),
            ],
            vec![
                Sector::new(0, 128, FLAT, FLAT, 128),
                Sector::new(16, 128, FLAT, FLAT, 128),
            ],
        );
        level.sidedefs[1].sector = 1;
        level.linedefs[0].flags |= LinedefFlags::LOWER_UNPEGGED;

        let mut raster = Rasterizer::new(eye_level_view());
        let mut painter = RecordingPainter::default();
        let args = SpanArgs {
            seg: 0,
            start: 158,
            stop: 162,
            angle1: angle_to_vertex(&level, 0),
            ceiling_plane: None,
            floor_plane: None,
        };
        raster.store_wall_range(&mut level, &bank, &mut painter, &args);

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 158, 162);
        assert!(!painter.columns.is_empty());
        // bottom-pegged 64-tall grate on the 16-unit back floor, eye at
        // 41: top of texture at 16 + 64 - 41 = 39 above the eye
        let (_, yl, _) = painter.columns[2];
        // distance 128, scale ~ 1.25: top row ~ 100 - 39 * 1.25
        let approx = 100.0 - 39.0 * 1.25;
        assert!((yl as f64 - approx).abs() < 3.0, "yl {yl} vs {approx}");
    }

    #[test]
    fn masked_light_resolves_through_the_height_link() {
        let (mut level, mut raster) = rasterized_grate(0, 128, 150, 170);
        let bank = test_bank();

        // Sector 1 is an unrelated control sector raising the front's
        // floor surface; the eye below its floor sees its light.
        level.sectors.push(Sector::new(64, 128, FLAT, FLAT, 255));
        level.sectors[0].height_link = Some(2);

        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        assert!(!painter.columns.is_empty());
        // brightest light level resolves to the brightest colormap band
        assert!(painter.colormaps.iter().all(|&c| c == 0));
    }

    #[test]
    fn masked_light_without_link_uses_the_front_sector() {
        let (level, mut raster) = rasterized_grate(0, 128, 150, 170);
        let bank = test_bank();
        let mut painter = RecordingPainter::default();
        raster.render_masked_range(&level, &bank, &mut painter, 0, 150, 170);
        // light 128 at this depth lands well away from full bright
        assert!(painter.colormaps.iter().all(|&c| c > 0));
    }
}
