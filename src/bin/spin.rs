//! Spinning-room demo for the wall rasterizer.
//!
//! ```bash
//! cargo run --release -- --width 960 --height 600
//! ```
//!
//! Builds a small synthetic map (a room split by a windowed wall with a
//! masked grate), then drives the rasterizer the way a visibility
//! traversal would: front-to-back opaque spans, then the masked pass in
//! reverse.  Floors and ceilings are only accumulated, not drawn.

use anyhow::{Context, Result};
use clap::Parser;
use glam::vec2;
use minifb::{Key, Window, WindowOptions};

use wallcast::fixed::{Angle, FRACBITS, Fixed, fixed_from_f32};
use wallcast::renderer::{ColumnPainter, ColumnRequest, Rgba};
use wallcast::renderer::software::{Rasterizer, SpanArgs, View};
use wallcast::world::geometry::{
    Level, Linedef, LinedefFlags, RenderFlags, Sector, Seg, Sidedef, Vertex,
};
use wallcast::world::texture::{NO_TEXTURE, Texture, TextureBank};

#[derive(Parser)]
#[command(about = "spinning demo room for the wallcast rasterizer")]
struct Args {
    #[arg(long, default_value_t = 960)]
    width: usize,
    #[arg(long, default_value_t = 600)]
    height: usize,
    /// Horizontal field of view in degrees.
    #[arg(long, default_value_t = 90.0)]
    fov: f64,
    /// Disable per-sector precision adaptation (legacy scale clamp).
    #[arg(long)]
    no_wiggle_fix: bool,
}

/*──────────────────────────── painter ────────────────────────────*/

/// Palette blitter: the drawing primitive the rasterizer delegates to.
/// Texel 0 is transparent, which is what makes the grate see-through.
struct Blitter {
    frame: Vec<Rgba>,
    width: usize,
    height: usize,
    palette: [Rgba; 256],
}

impl Blitter {
    fn new(width: usize, height: usize) -> Self {
        let mut palette = [0u32; 256];
        for (i, slot) in palette.iter_mut().enumerate() {
            *slot = match i {
                0 => 0,
                1..=31 => rgb(140 + (i as u32 * 3) as u8, 60, 40), // brick reds
                32..=63 => rgb(90, 90, (80 + i) as u8),            // stone blues
                64..=95 => rgb(60, (100 + i / 2) as u8, 60),       // grate greens
                _ => {
                    let g = (i as u8).wrapping_mul(2);
                    rgb(g, g, g)
                }
            };
        }
        Blitter {
            frame: vec![0; width * height],
            width,
            height,
            palette,
        }
    }

    fn clear(&mut self) {
        self.frame.fill(0xFF_18_18_20);
    }

    fn shade(&self, texel: u8, colormap: u8) -> Rgba {
        let c = self.palette[texel as usize];
        let keep = 32 - colormap.min(31) as u32;
        let r = ((c >> 16 & 0xFF) * keep / 32) << 16;
        let g = ((c >> 8 & 0xFF) * keep / 32) << 8;
        let b = (c & 0xFF) * keep / 32;
        0xFF00_0000 | r | g | b
    }
}

fn rgb(r: u8, g: u8, b: u8) -> Rgba {
    0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

impl ColumnPainter for Blitter {
    fn draw_column(&mut self, req: &ColumnRequest<'_>) {
        let h = req.source.len() as i32;
        let wrap = if req.tex_height > 0 { req.tex_height } else { h };
        let centery = self.height as i32 / 2;
        // classic renderers let this accumulator wrap
        let mut frac = req
            .texture_mid
            .wrapping_add((req.y_top - centery).wrapping_mul(req.iscale));
        for y in req.y_top..=req.y_bottom {
            let i = (frac >> FRACBITS).rem_euclid(wrap).min(h - 1);
            let texel = req.source[i as usize];
            if texel != 0 {
                self.frame[y as usize * self.width + req.x as usize] =
                    self.shade(texel, req.colormap);
            }
            frac = frac.wrapping_add(req.iscale);
        }
    }
}

/*─────────────────────────── map assembly ─────────────────────────*/

fn checkered(name: &str, w: usize, h: usize, base: u8, alt: u8, hole: bool) -> Texture {
    let mut texels = vec![0u8; w * h];
    for c in 0..w {
        for y in 0..h {
            let bar = (c / 8 + y / 16) % 2 == 0;
            texels[c * h + y] = if hole && c % 16 < 10 && y % 32 < 22 {
                0
            } else if bar {
                base
            } else {
                alt
            };
        }
    }
    Texture::new(name, w, h, texels)
}

fn build_bank() -> Result<TextureBank> {
    let mut bank = TextureBank::default_with_checker();
    bank.insert("BRICK", checkered("BRICK", 64, 128, 4, 20, false))?;
    bank.insert("STONE", checkered("STONE", 64, 64, 36, 52, false))?;
    bank.insert("GRATE", checkered("GRATE", 64, 128, 70, 88, true))?;
    bank.insert("FLOOR", checkered("FLOOR", 64, 64, 110, 140, false))?;
    bank.insert("CEIL", checkered("CEIL", 64, 64, 120, 150, false))?;
    Ok(bank)
}

/// One room split down the middle by a windowed wall with a grate.
fn build_level(bank: &TextureBank) -> Level {
    let brick = bank.id("BRICK").unwrap();
    let stone = bank.id("STONE").unwrap();
    let grate = bank.id("GRATE").unwrap();
    let floor = bank.id("FLOOR").unwrap();
    let ceil = bank.id("CEIL").unwrap();

    let vertices = vec![
        Vertex { pos: vec2(-256.0, -256.0) }, // 0
        Vertex { pos: vec2(-256.0, 256.0) },  // 1
        Vertex { pos: vec2(256.0, 256.0) },   // 2
        Vertex { pos: vec2(256.0, -256.0) },  // 3
        Vertex { pos: vec2(0.0, -256.0) },    // 4
        Vertex { pos: vec2(0.0, 256.0) },     // 5
    ];

    let solid_side = |sector| Sidedef {
        x_off: 0,
        y_off: 0,
        upper: NO_TEXTURE,
        lower: NO_TEXTURE,
        middle: brick,
        sector,
    };
    let sidedefs = vec![
        solid_side(0), // 0..4: perimeter, clockwise from the west wall
        solid_side(0),
        solid_side(1),
        solid_side(0),
        // 4: west face of the divider
        Sidedef {
            x_off: 0,
            y_off: 0,
            upper: brick,
            lower: stone,
            middle: grate,
            sector: 0,
        },
        // 5: east face
        Sidedef {
            x_off: 0,
            y_off: 0,
            upper: brick,
            lower: stone,
            middle: NO_TEXTURE,
            sector: 1,
        },
    ];

    let one_sided = |v1, v2, sd| Linedef {
        v1,
        v2,
        flags: LinedefFlags::IMPASSABLE,
        render_flags: RenderFlags::empty(),
        right_sidedef: Some(sd),
        left_sidedef: None,
    };
    let linedefs = vec![
        one_sided(0, 1, 0), // west
        one_sided(1, 2, 1), // north
        one_sided(2, 3, 2), // east
        one_sided(3, 0, 3), // south
        Linedef {
            v1: 4,
            v2: 5,
            flags: LinedefFlags::TWO_SIDED,
            render_flags: RenderFlags::empty(),
            right_sidedef: Some(5),
            left_sidedef: Some(4),
        },
    ];

    // Every line carries one seg per visible side.
    let mut segs = Vec::new();
    for (i, ld) in linedefs.iter().enumerate() {
        let a = vertices[ld.v1 as usize].pos;
        let b = vertices[ld.v2 as usize].pos;
        let dir_angle = |from: glam::Vec2, to: glam::Vec2| {
            Angle::from_radians(((to.y - from.y) as f64).atan2((to.x - from.x) as f64))
        };
        segs.push(Seg {
            v1: ld.v1,
            v2: ld.v2,
            angle: dir_angle(a, b),
            offset: 0,
            linedef: i as u16,
            dir: 0,
            miniseg: false,
        });
        if ld.left_sidedef.is_some() {
            segs.push(Seg {
                v1: ld.v2,
                v2: ld.v1,
                angle: dir_angle(b, a),
                offset: 0,
                linedef: i as u16,
                dir: 1,
                miniseg: false,
            });
        }
    }

    let west = Sector::new(0, 128, floor, ceil, 176);
    let east = Sector::new(32, 96, floor, ceil, 224);

    Level {
        vertices,
        linedefs,
        sidedefs,
        segs,
        sectors: vec![west, east],
        sky_flat: NO_TEXTURE,
    }
}

/*─────────────────────── traversal stand-in ───────────────────────*/

/// Project a seg onto screen columns; `None` when back-facing or
/// outside the view cone.  A real engine clips via its BSP instead.
fn project_span(level: &Level, view: &View, seg_idx: usize) -> Option<(i32, i32, Angle)> {
    let seg = &level.segs[seg_idx];
    let p1 = level.vertices[seg.v1 as usize].pos;
    let p2 = level.vertices[seg.v2 as usize].pos;
    let eye = vec2(
        view.x as f32 / (1 << FRACBITS) as f32,
        view.y as f32 / (1 << FRACBITS) as f32,
    );

    // front side of a seg is to the right of v1 -> v2
    let cross = (p2.x - p1.x) * (eye.y - p1.y) - (p2.y - p1.y) * (eye.x - p1.x);
    if cross >= -1.0 {
        return None;
    }

    let view_rad = view.angle.0 as f64 / 2f64.powi(32) * std::f64::consts::TAU;
    let rel = |p: glam::Vec2| {
        let a = ((p.y - eye.y) as f64).atan2((p.x - eye.x) as f64) - view_rad;
        // wrap into [-pi, pi]
        (a + std::f64::consts::PI).rem_euclid(std::f64::consts::TAU) - std::f64::consts::PI
    };
    let (a1, a2) = (rel(p1), rel(p2));
    if a1.abs() > std::f64::consts::FRAC_PI_2 && a2.abs() > std::f64::consts::FRAC_PI_2 {
        return None;
    }

    let focal = (view.projection >> FRACBITS) as f64;
    let limit = std::f64::consts::FRAC_PI_2 * 0.95;
    let to_x = |a: f64| view.centerx as f64 - a.clamp(-limit, limit).tan() * focal;
    let start = to_x(a1).ceil().max(0.0) as i32;
    let stop = to_x(a2).floor().min(view.width as f64 - 1.0) as i32;
    if start > stop {
        return None;
    }

    let angle1 = Angle::from_radians(((p1.y - eye.y) as f64).atan2((p1.x - eye.x) as f64));
    Some((start, stop, angle1))
}

fn main() -> Result<()> {
    let args = Args::parse();
    let fov = args.fov.to_radians();

    let bank = build_bank().context("building texture bank")?;
    let mut level = build_level(&bank);

    let mut raster = Rasterizer::new(View::new(args.width, args.height, fov));
    raster.set_adaptive_precision(!args.no_wiggle_fix);

    let mut blitter = Blitter::new(args.width, args.height);
    let mut window = Window::new(
        "wallcast",
        args.width,
        args.height,
        WindowOptions::default(),
    )
    .context("opening window")?;
    window.set_target_fps(60);

    let mut t: f64 = 0.0;
    while window.is_open() && !window.is_key_down(Key::Escape) {
        t += 1.0 / 60.0;

        raster.view.set_viewpoint(
            fixed_from_f32(-140.0),
            fixed_from_f32((t * 0.7).sin() as f32 * 60.0),
            (41 << FRACBITS) as Fixed,
            Angle::from_radians(t * 0.5),
        );
        raster.begin_frame();
        blitter.clear();

        // visible segs, nearest first, the order the clip bands demand
        let eye = vec2(-140.0, (t * 0.7).sin() as f32 * 60.0);
        let mut visible: Vec<(f32, usize, (i32, i32, Angle))> = level
            .segs
            .iter()
            .enumerate()
            .filter_map(|(i, seg)| {
                let mid = (level.vertices[seg.v1 as usize].pos
                    + level.vertices[seg.v2 as usize].pos)
                    / 2.0;
                project_span(&level, &raster.view, i)
                    .map(|span| ((mid - eye).length(), i, span))
            })
            .collect();
        visible.sort_by(|a, b| a.0.total_cmp(&b.0));

        let sec = level.sectors[0].clone();
        let mut ceil = Some(raster.planes.find(
            sec.ceil_h,
            sec.ceil_tex,
            sec.light,
            0,
            args.width as i32 - 1,
        ));
        let mut floor = Some(raster.planes.find(
            sec.floor_h,
            sec.floor_tex,
            sec.light,
            0,
            args.width as i32 - 1,
        ));

        for &(_, seg_idx, (start, stop, angle1)) in &visible {
            let spans = SpanArgs {
                seg: seg_idx as u16,
                start,
                stop,
                angle1,
                ceiling_plane: ceil,
                floor_plane: floor,
            };
            (ceil, floor) = raster.store_wall_range(&mut level, &bank, &mut blitter, &spans);
        }

        // masked textures resolve strictly after the opaque pass
        for i in (0..raster.drawsegs.len()).rev() {
            if raster.drawsegs[i].masked.is_some() {
                let (x1, x2) = (raster.drawsegs[i].x1, raster.drawsegs[i].x2);
                raster.render_masked_range(&level, &bank, &mut blitter, i, x1, x2);
            }
        }

        window.update_with_buffer(&blitter.frame, args.width, args.height)?;
    }
    Ok(())
}
