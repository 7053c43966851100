//! Wall segment setup and the per-column rasterization loop.
//!
//! `store_wall_range` is the entry point the visibility traversal calls
//! once per contiguous screen-column span, strictly front-to-back.  It
//! derives every per-wall quantity (tiers, marks, silhouette, stepping
//! coefficients), walks the columns left-to-right, and leaves behind a
//! draw-segment record for the masked and sprite passes.

use crate::fixed::{ANG90, Angle, FRACBITS, Fixed, fixed_from_f32, fixed_mod, fixed_mul};
use crate::renderer::{ColumnPainter, ColumnRequest};
use crate::renderer::software::Rasterizer;
use crate::renderer::software::openings::{DrawSeg, Silhouette, SpriteClip};
use crate::renderer::software::planes::PlaneId;
use crate::renderer::software::precision::scale_from_angle;
use crate::world::geometry::{Level, Linedef, LinedefFlags, RenderFlags, Sector, SegmentId, Sidedef};
use crate::world::texture::{NO_TEXTURE, TextureBank, TextureId};

/// One visible wall span, as handed over by the traversal.
#[derive(Clone, Copy, Debug)]
pub struct SpanArgs {
    pub seg: SegmentId,
    /// Inclusive screen-column range.
    pub start: i32,
    pub stop: i32,
    /// View angle to the seg's first vertex, precomputed by the caller.
    pub angle1: Angle,
    /// Accumulation targets for the front sector's surfaces; `None`
    /// disables the corresponding marking outright.
    pub ceiling_plane: Option<PlaneId>,
    pub floor_plane: Option<PlaneId>,
}

/// One textured tier of a wall: which texture, where its origin row
/// sits relative to the eye, and the height the painter tiles at.
#[derive(Clone, Copy, Debug)]
struct Tier {
    tex: TextureId,
    mid: Fixed,
    tex_height: i32,
}

/// Everything `plan_wall` decides about a wall before any column is
/// touched: tier selection, span marking, and the sprite silhouette.
#[derive(Debug)]
struct WallPlan {
    mid: Option<Tier>,
    top: Option<Tier>,
    bottom: Option<Tier>,
    masked: bool,

    mark_floor: bool,
    mark_ceiling: bool,

    silhouette: Silhouette,
    tsil_height: Fixed,
    bsil_height: Fixed,
    top_clip: SpriteClip,
    bottom_clip: SpriteClip,

    /// Front ceiling/floor relative to the eye (ceiling possibly
    /// swapped for the back one by the shared-sky rule).
    worldtop: Fixed,
    worldbottom: Fixed,
    /// Back ceiling/floor relative to the eye; two-sided walls only.
    worldhigh: Fixed,
    worldlow: Fixed,

    two_sided: bool,
    /// Back ceiling drops below the front one / back floor rises above.
    top_open: bool,
    bottom_open: bool,
}

fn tier_height(flags: RenderFlags, tile: RenderFlags, tex_h: Fixed) -> i32 {
    if flags.contains(tile) { 0 } else { tex_h >> FRACBITS }
}

/// Classify the wall and resolve its texture tiers.
fn plan_wall(
    linedef: &Linedef,
    sidedef: &Sidedef,
    front: &Sector,
    back: Option<&Sector>,
    view_z: Fixed,
    sky: TextureId,
    bank: &TextureBank,
) -> WallPlan {
    let mut worldtop = front.ceil_h - view_z;
    let worldbottom = front.floor_h - view_z;

    let mut plan = match back {
        None => {
            // Single-sided: the wall is an opaque terminator, so both
            // surface spans always mark and sprites behind it are gone.
            let mid = (sidedef.middle != NO_TEXTURE).then(|| {
                let tex_h = bank.height_of(sidedef.middle);
                let peg = if linedef.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                    // bottom of texture at bottom of wall
                    front.floor_h + tex_h - view_z
                } else {
                    worldtop
                };
                Tier {
                    tex: sidedef.middle,
                    mid: peg + fixed_mod(sidedef.y_off, tex_h),
                    tex_height: tier_height(linedef.render_flags, RenderFlags::MID_TILE, tex_h),
                }
            });
            WallPlan {
                mid,
                top: None,
                bottom: None,
                masked: false,
                mark_floor: true,
                mark_ceiling: true,
                silhouette: Silhouette::BOTH,
                tsil_height: Fixed::MIN,
                bsil_height: Fixed::MAX,
                top_clip: SpriteClip::ScreenBottom,
                bottom_clip: SpriteClip::AboveTop,
                worldtop,
                worldbottom,
                worldhigh: 0,
                worldlow: 0,
                two_sided: false,
                top_open: false,
                bottom_open: false,
            }
        }
        Some(back) => {
            let mut silhouette = Silhouette::empty();
            let mut tsil_height = 0;
            let mut bsil_height = 0;
            let mut top_clip = SpriteClip::Unset;
            let mut bottom_clip = SpriteClip::Unset;

            if linedef.render_flags.contains(RenderFlags::CLOSED) {
                // A shut door occludes everything regardless of how the
                // sector heights currently compare.
                silhouette = Silhouette::BOTH;
                bottom_clip = SpriteClip::AboveTop;
                bsil_height = Fixed::MAX;
                top_clip = SpriteClip::ScreenBottom;
                tsil_height = Fixed::MIN;
            } else {
                if front.floor_h > back.floor_h {
                    silhouette |= Silhouette::BOTTOM;
                    bsil_height = front.floor_h;
                } else if back.floor_h > view_z {
                    silhouette |= Silhouette::BOTTOM;
                    bsil_height = Fixed::MAX;
                }
                if front.ceil_h < back.ceil_h {
                    silhouette |= Silhouette::TOP;
                    tsil_height = front.ceil_h;
                } else if back.ceil_h < view_z {
                    silhouette |= Silhouette::TOP;
                    tsil_height = Fixed::MIN;
                }
            }

            let worldhigh = back.ceil_h - view_z;
            let worldlow = back.floor_h - view_z;

            // Outdoor areas: when both sides show sky, step against the
            // back ceiling so moving outdoor heights never show a seam.
            if front.ceil_tex == sky && back.ceil_tex == sky {
                worldtop = worldhigh;
            }

            let mut mark_floor = worldlow != worldbottom
                || back.floor_tex != front.floor_tex
                || back.light != front.light
                || back.floor_xoff != front.floor_xoff
                || back.floor_yoff != front.floor_yoff
                // deep water: never let the far side bleed through
                || front.height_link.is_some();

            let mut mark_ceiling = worldhigh != worldtop
                || back.ceil_tex != front.ceil_tex
                || back.light != front.light
                || back.ceil_xoff != front.ceil_xoff
                || back.ceil_yoff != front.ceil_yoff
                || (front.height_link.is_some() && front.ceil_tex != sky);

            if back.ceil_h <= front.floor_h || back.floor_h >= front.ceil_h {
                // closed door
                mark_ceiling = true;
                mark_floor = true;
            }

            let top_open = worldhigh < worldtop;
            let top = (top_open && sidedef.upper != NO_TEXTURE).then(|| {
                let tex_h = bank.height_of(sidedef.upper);
                let peg = if linedef.flags.contains(LinedefFlags::UPPER_UNPEGGED) {
                    worldtop
                } else {
                    back.ceil_h + tex_h - view_z
                };
                Tier {
                    tex: sidedef.upper,
                    mid: peg + fixed_mod(sidedef.y_off, tex_h),
                    tex_height: tier_height(linedef.render_flags, RenderFlags::TOP_TILE, tex_h),
                }
            });

            let bottom_open = worldlow > worldbottom;
            let bottom = (bottom_open && sidedef.lower != NO_TEXTURE).then(|| {
                let tex_h = bank.height_of(sidedef.lower);
                let peg = if linedef.flags.contains(LinedefFlags::LOWER_UNPEGGED) {
                    worldtop
                } else {
                    worldlow
                };
                Tier {
                    tex: sidedef.lower,
                    mid: peg + fixed_mod(sidedef.y_off, tex_h),
                    tex_height: tier_height(linedef.render_flags, RenderFlags::BOT_TILE, tex_h),
                }
            });

            WallPlan {
                mid: None,
                top,
                bottom,
                masked: sidedef.middle != NO_TEXTURE,
                mark_floor,
                mark_ceiling,
                silhouette,
                tsil_height,
                bsil_height,
                top_clip,
                bottom_clip,
                worldtop,
                worldbottom,
                worldhigh,
                worldlow,
                two_sided: true,
                top_open,
                bottom_open,
            }
        }
    };

    // A surface on the wrong side of the view plane is invisible and
    // never needs marking; sky ceilings and linked sectors are exempt.
    if front.height_link.is_none() {
        if front.floor_h >= view_z {
            plan.mark_floor = false;
        }
        if front.ceil_h <= view_z && front.ceil_tex != sky {
            plan.mark_ceiling = false;
        }
    }

    plan
}

/// Per-span working state for the column loop.  The interpolation
/// accumulators are stateful: columns must advance left to right.
struct WallJob {
    x1: i32,
    stop_x: i32,

    textured: bool,
    distance: Fixed,
    center_angle: Angle,
    offset: Fixed,
    light: u8,

    scale: Fixed,
    scale_step: Fixed,

    mid: Option<Tier>,
    top: Option<Tier>,
    bottom: Option<Tier>,
    masked_base: Option<usize>,

    /// `Some` while marking that surface is live for this span.
    ceil_plane: Option<PlaneId>,
    floor_plane: Option<PlaneId>,

    topfrac: Fixed,
    topstep: Fixed,
    bottomfrac: Fixed,
    bottomstep: Fixed,
    pixhigh: Fixed,
    pixhighstep: Fixed,
    pixlow: Fixed,
    pixlowstep: Fixed,
}

impl Rasterizer {
    /// Rasterize one visible wall span.  Returns the (possibly renewed)
    /// ceiling and floor plane handles for the caller to carry forward.
    pub fn store_wall_range(
        &mut self,
        level: &mut Level,
        bank: &TextureBank,
        painter: &mut dyn ColumnPainter,
        args: &SpanArgs,
    ) -> (Option<PlaneId>, Option<PlaneId>) {
        let SpanArgs {
            seg: seg_id,
            start,
            stop,
            angle1,
            ..
        } = *args;
        debug_assert!(
            0 <= start && start <= stop && (stop as usize) < self.view.width,
            "bad wall range {start}..{stop}"
        );

        let seg = level.segs[seg_id as usize].clone();
        if !seg.miniseg {
            // side effect for the automap: this line has been seen
            level.linedefs[seg.linedef as usize].flags |= LinedefFlags::MAPPED;
        }
        let (front_id, back_id) = level.sectors_of_seg(&seg);

        let span = (stop - start + 1) as usize;
        self.openings.ensure_span(span);

        // Perpendicular distance to the wall line.  Grazing offsets are
        // clamped to a right angle before the cosine.
        let normal_angle = seg.angle + ANG90;
        let mut offset_angle = normal_angle.diff(angle1);
        if offset_angle > ANG90 {
            offset_angle = ANG90;
        }
        let v1 = level.vertices[seg.v1 as usize].pos;
        let (v1x, v1y) = (fixed_from_f32(v1.x), fixed_from_f32(v1.y));
        let hyp = if v1x == self.view.x && v1y == self.view.y {
            0
        } else {
            self.view.point_to_dist(v1x, v1y)
        };
        let distance = fixed_mul(hyp, offset_angle.fine_cosine());

        if self.adaptive_precision {
            self.precision.adapt(&mut level.sectors[front_id as usize]);
        } else {
            self.precision.reset_legacy();
        }

        let scale1 = scale_from_angle(
            &self.view,
            self.view.angle + self.view.x_to_angle[start as usize],
            normal_angle,
            distance,
            self.precision.max_scale,
        );
        let (scale2, scale_step) = if stop > start {
            let s2 = scale_from_angle(
                &self.view,
                self.view.angle + self.view.x_to_angle[stop as usize],
                normal_angle,
                distance,
                self.precision.max_scale,
            );
            (s2, (s2 - scale1) / (stop - start))
        } else {
            (scale1, 0)
        };

        let sidedef = level.front_sidedef(&seg).clone();
        let linedef = level.linedefs[seg.linedef as usize].clone();
        let front = level.sectors[front_id as usize].clone();
        let back = back_id.map(|i| level.sectors[i as usize].clone());

        let mut plan = plan_wall(
            &linedef,
            &sidedef,
            &front,
            back.as_ref(),
            self.view.z,
            level.sky_flat,
            bank,
        );

        let masked_base = plan.masked.then(|| self.openings.alloc_texcols(span));

        let textured =
            plan.mid.is_some() || plan.top.is_some() || plan.bottom.is_some() || masked_base.is_some();
        let (offset, center_angle) = if textured {
            let off =
                fixed_mul(hyp, -offset_angle.fine_sine()) + sidedef.x_off + seg.offset;
            (off, ANG90 + self.view.angle - normal_angle)
        } else {
            (0, Angle(0))
        };

        // Interpolation coefficients live in the active precision width.
        let inv = self.precision.inv_height_bits;
        let centery = self.view.centery_frac >> inv;
        let worldtop = plan.worldtop >> inv;
        let worldbottom = plan.worldbottom >> inv;
        let topstep = -fixed_mul(scale_step, worldtop);
        let topfrac = centery - fixed_mul(worldtop, scale1);
        let bottomstep = -fixed_mul(scale_step, worldbottom);
        let bottomfrac = centery - fixed_mul(worldbottom, scale1);
        let (mut pixhigh, mut pixhighstep, mut pixlow, mut pixlowstep) = (0, 0, 0, 0);
        if plan.two_sided {
            let worldhigh = plan.worldhigh >> inv;
            let worldlow = plan.worldlow >> inv;
            if plan.top_open {
                pixhigh = centery - fixed_mul(worldhigh, scale1);
                pixhighstep = -fixed_mul(scale_step, worldhigh);
            }
            if plan.bottom_open {
                pixlow = centery - fixed_mul(worldlow, scale1);
                pixlowstep = -fixed_mul(scale_step, worldlow);
            }
        }

        // Begin or extend surface accumulation.  A missing handle
        // silently disables that marking; ceiling and floor sharing one
        // plane must split so the marks cannot overwrite each other.
        let mut ceil_plane = args.ceiling_plane;
        if plan.mark_ceiling {
            ceil_plane = self.planes.check_plane(ceil_plane, start, stop);
            if ceil_plane.is_none() {
                plan.mark_ceiling = false;
            }
        }
        let mut floor_plane = args.floor_plane;
        if plan.mark_floor {
            match floor_plane {
                Some(fp) if plan.mark_ceiling && ceil_plane == Some(fp) => {
                    floor_plane = self.planes.dup_plane(Some(fp), start, stop);
                }
                Some(fp) => {
                    floor_plane = self.planes.check_plane(Some(fp), start, stop);
                }
                None => plan.mark_floor = false,
            }
        }

        let mut job = WallJob {
            x1: start,
            stop_x: stop + 1,
            textured,
            distance,
            center_angle,
            offset,
            light: front.light,
            scale: scale1,
            scale_step,
            mid: plan.mid,
            top: plan.top,
            bottom: plan.bottom,
            masked_base,
            ceil_plane: if plan.mark_ceiling { ceil_plane } else { None },
            floor_plane: if plan.mark_floor { floor_plane } else { None },
            topfrac,
            topstep,
            bottomfrac,
            bottomstep,
            pixhigh,
            pixhighstep,
            pixlow,
            pixlowstep,
        };

        let did_solid = self.render_seg_loop(&mut job, bank, painter);

        let mut ds = DrawSeg {
            seg: seg_id,
            x1: start,
            x2: stop,
            scale1,
            scale2,
            scale_step,
            center_angle,
            offset,
            distance,
            silhouette: plan.silhouette,
            tsil_height: plan.tsil_height,
            bsil_height: plan.bsil_height,
            top_clip: plan.top_clip,
            bottom_clip: plan.bottom_clip,
            masked: masked_base,
        };

        // Solidity may only be discovered during rasterization; a wall
        // that shut any column must carry full clipping info.
        if let Some(back) = back.as_ref() {
            if did_solid {
                if !ds.silhouette.contains(Silhouette::BOTTOM) {
                    ds.silhouette |= Silhouette::BOTTOM;
                    ds.bsil_height = back.floor_h;
                }
                if !ds.silhouette.contains(Silhouette::TOP) {
                    ds.silhouette |= Silhouette::TOP;
                    ds.tsil_height = back.ceil_h;
                }
            }
        }

        // Persist sprite-clip rows for the later passes.
        if (ds.silhouette.contains(Silhouette::TOP) || masked_base.is_some())
            && ds.top_clip == SpriteClip::Unset
        {
            let base = self.openings.alloc_clips(span);
            for i in 0..span {
                let row = self.clip.ceiling[start as usize + i];
                self.openings.set_clip(base + i, row);
            }
            ds.top_clip = SpriteClip::Stored(base);
        }
        if (ds.silhouette.contains(Silhouette::BOTTOM) || masked_base.is_some())
            && ds.bottom_clip == SpriteClip::Unset
        {
            let base = self.openings.alloc_clips(span);
            for i in 0..span {
                let row = self.clip.floor[start as usize + i];
                self.openings.set_clip(base + i, row);
            }
            ds.bottom_clip = SpriteClip::Stored(base);
        }
        if masked_base.is_some() {
            if !ds.silhouette.contains(Silhouette::TOP) {
                ds.silhouette |= Silhouette::TOP;
                ds.tsil_height = Fixed::MIN;
            }
            if !ds.silhouette.contains(Silhouette::BOTTOM) {
                ds.silhouette |= Silhouette::BOTTOM;
                ds.bsil_height = Fixed::MAX;
            }
        }

        self.drawsegs.push(ds);
        (ceil_plane, floor_plane)
    }

    /// CORE LOOPING ROUTINE: draws zero, one or two tiers per column,
    /// marks surface spans, and tightens the clip bands.  Returns true
    /// if at least one column became fully solid.
    fn render_seg_loop(
        &mut self,
        job: &mut WallJob,
        bank: &TextureBank,
        painter: &mut dyn ColumnPainter,
    ) -> bool {
        let hb = self.precision.height_bits;
        let hu = self.precision.height_unit;
        let screen_h = self.view.height as i32;
        let mut did_solid = false;

        for x in job.x1..job.stop_x {
            let col = x as usize;

            // open span for this column
            let mut yl = (job.topfrac + hu - 1) >> hb;
            let top = self.clip.ceiling[col] + 1;
            if yl < top {
                yl = top;
            }

            if let Some(pid) = job.ceil_plane {
                let mut bottom = yl - 1;
                if bottom >= self.clip.floor[col] {
                    bottom = self.clip.floor[col] - 1;
                }
                if top <= bottom {
                    let pl = self.planes.plane_mut(pid);
                    pl.top[col] = top as u16;
                    pl.bottom[col] = bottom as u16;
                    pl.modified = true;
                }
                self.clip.ceiling[col] = bottom;
            }

            let mut yh = job.bottomfrac >> hb;
            let bottom = self.clip.floor[col] - 1;
            if yh > bottom {
                yh = bottom;
            }

            if let Some(pid) = job.floor_plane {
                let mut ftop = yh.max(self.clip.ceiling[col]) + 1;
                if ftop <= bottom {
                    let pl = self.planes.plane_mut(pid);
                    pl.top[col] = ftop as u16;
                    pl.bottom[col] = bottom as u16;
                    pl.modified = true;
                }
                self.clip.floor[col] = ftop;
            }

            // texture column and shading are shared by all tiers
            let mut texturecolumn = 0;
            let mut texel_u = 0;
            let mut colormap = 0;
            let mut next_colormap = 0;
            let mut iscale = 0;
            if job.textured {
                let angle = job.center_angle + self.view.x_to_angle[col];
                texel_u = job.offset - fixed_mul(angle.fine_tangent(), job.distance);
                texturecolumn = texel_u >> FRACBITS;
                colormap = self.view.wall_colormap(job.light, job.scale);
                next_colormap = self
                    .view
                    .wall_colormap(job.light.saturating_add(1), job.scale);
                iscale = (u32::MAX / job.scale.max(1) as u32) as Fixed;
            }

            if let Some(mid) = job.mid {
                // Single-sided: one tier fills the open span and the
                // column is finished top to bottom.
                paint_tier(
                    painter, bank, &mid, x, yl, yh, texturecolumn, texel_u, iscale, colormap,
                    next_colormap, job.scale,
                );
                self.clip.ceiling[col] = screen_h;
                self.clip.floor[col] = -1;
            } else {
                if let Some(top_tier) = job.top {
                    let mut mid_row = job.pixhigh >> hb;
                    job.pixhigh += job.pixhighstep;

                    if mid_row >= self.clip.floor[col] {
                        mid_row = self.clip.floor[col] - 1;
                    }
                    if mid_row >= yl {
                        paint_tier(
                            painter, bank, &top_tier, x, yl, mid_row, texturecolumn, texel_u,
                            iscale, colormap, next_colormap, job.scale,
                        );
                        self.clip.ceiling[col] = mid_row;
                    } else {
                        self.clip.ceiling[col] = yl - 1;
                    }
                } else if job.ceil_plane.is_some() {
                    // untextured edge still narrows, or sky would leak
                    self.clip.ceiling[col] = yl - 1;
                }

                if let Some(bottom_tier) = job.bottom {
                    let mut mid_row = (job.pixlow + hu - 1) >> hb;
                    job.pixlow += job.pixlowstep;

                    if mid_row <= self.clip.ceiling[col] {
                        mid_row = self.clip.ceiling[col] + 1;
                    }
                    if mid_row <= yh {
                        paint_tier(
                            painter, bank, &bottom_tier, x, mid_row, yh, texturecolumn, texel_u,
                            iscale, colormap, next_colormap, job.scale,
                        );
                        self.clip.floor[col] = mid_row;
                    } else {
                        self.clip.floor[col] = yh + 1;
                    }
                } else if job.floor_plane.is_some() {
                    self.clip.floor[col] = yh + 1;
                }

                if (job.ceil_plane.is_some() || job.floor_plane.is_some())
                    && self.clip.floor[col] <= self.clip.ceiling[col] + 1
                {
                    // sight through this column is completely blocked
                    self.clip.solid[col] = true;
                    did_solid = true;
                }

                if let Some(base) = job.masked_base {
                    self.openings
                        .set_texcol(base + (x - job.x1) as usize, Some(texturecolumn));
                }
            }

            job.scale += job.scale_step;
            job.topfrac += job.topstep;
            job.bottomfrac += job.bottomstep;
        }

        did_solid
    }
}

#[allow(clippy::too_many_arguments)]
fn paint_tier(
    painter: &mut dyn ColumnPainter,
    bank: &TextureBank,
    tier: &Tier,
    x: i32,
    y_top: i32,
    y_bottom: i32,
    texturecolumn: i32,
    texel_u: Fixed,
    iscale: Fixed,
    colormap: u8,
    next_colormap: u8,
    depth: Fixed,
) {
    if y_top > y_bottom {
        return;
    }
    let tex = bank.texture_or_missing(tier.tex);
    painter.draw_column(&ColumnRequest {
        x,
        y_top,
        y_bottom,
        texture_mid: tier.mid,
        iscale,
        tex_height: tier.tex_height,
        depth,
        texel_u,
        colormap,
        next_colormap,
        source: tex.column_wrapped(texturecolumn),
        prev_source: tex.column_wrapped(texturecolumn - 1),
        next_source: tex.column_wrapped(texturecolumn + 1),
    });
}

/*──────────────────────────────── tests ───────────────────────────────*/
