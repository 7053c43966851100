use crate::fixed::{ANG90, Angle, FRACBITS, Fixed, fixed_div};

/// Light diminishing tables.  Sixteen wall light bands, each mapping a
/// column scale to one of 32 colormaps; brighter with proximity.
pub const LIGHTLEVELS: usize = 16;
pub const LIGHTSEGSHIFT: u32 = 4;
pub const MAXLIGHTSCALE: usize = 48;
pub const LIGHTSCALESHIFT: u32 = 12;
pub const NUMCOLORMAPS: i32 = 32;
const DISTMAP: i32 = 2;

/// Frame-constant viewpoint: position, orientation and the projection
/// tables derived from the viewport size.  Built once per resolution,
/// repositioned once per frame.
pub struct View {
    pub x: Fixed,
    pub y: Fixed,
    pub z: Fixed,
    pub angle: Angle,

    pub width: usize,
    pub height: usize,
    pub centerx: i32,
    pub centery: i32,
    pub centery_frac: Fixed,

    /// Horizontal projection constant (pixels per unit slope).
    pub projection: Fixed,
    /// Aspect-corrected vertical projection constant.
    pub projection_y: Fixed,

    /// View angle of each screen column's ray, relative to `angle`.
    pub x_to_angle: Vec<Angle>,

    scale_light: Vec<[u8; MAXLIGHTSCALE]>,
}

impl View {
    pub fn new(width: usize, height: usize, fov: f64) -> Self {
        let centerx = width as i32 / 2;
        let centery = height as i32 / 2;
        let focal = centerx as f64 / (fov * 0.5).tan();

        let x_to_angle = (0..=width)
            .map(|x| {
                let dx = centerx as f64 - (x as f64 + 0.5);
                Angle::from_radians((dx / focal).atan())
            })
            .collect();

        // Classic 320x200 pixels are not square; keep the same vertical
        // stretch at any resolution.
        let projection_y = (height as f64 * focal * 320.0) / (200.0 * width as f64);

        let mut scale_light = vec![[0u8; MAXLIGHTSCALE]; LIGHTLEVELS];
        for (i, row) in scale_light.iter_mut().enumerate() {
            let startmap =
                ((LIGHTLEVELS - 1 - i) * 2 * NUMCOLORMAPS as usize / LIGHTLEVELS) as i32;
            for (j, slot) in row.iter_mut().enumerate() {
                let level = startmap - (j as i32 * 320 / width as i32) / DISTMAP;
                *slot = level.clamp(0, NUMCOLORMAPS - 1) as u8;
            }
        }

        View {
            x: 0,
            y: 0,
            z: 0,
            angle: Angle(0),
            width,
            height,
            centerx,
            centery,
            centery_frac: centery << FRACBITS,
            projection: (focal * (1 << FRACBITS) as f64) as Fixed,
            projection_y: (projection_y * (1 << FRACBITS) as f64) as Fixed,
            x_to_angle,
            scale_light,
        }
    }

    pub fn set_viewpoint(&mut self, x: Fixed, y: Fixed, z: Fixed, angle: Angle) {
        self.x = x;
        self.y = y;
        self.z = z;
        self.angle = angle;
    }

    /// Colormap index for a wall column at the given sector light and
    /// projective scale.
    pub fn wall_colormap(&self, light: u8, scale: Fixed) -> u8 {
        let band = ((light as u32 >> LIGHTSEGSHIFT) as usize).min(LIGHTLEVELS - 1);
        let idx = ((scale >> LIGHTSCALESHIFT).max(0) as usize).min(MAXLIGHTSCALE - 1);
        self.scale_light[band][idx]
    }

    /// Distance from the viewpoint to a map point, in fixed units.
    pub fn point_to_dist(&self, px: Fixed, py: Fixed) -> Fixed {
        let mut dx = (px - self.x).abs();
        let mut dy = (py - self.y).abs();
        if dy > dx {
            std::mem::swap(&mut dx, &mut dy);
        }
        if dx == 0 {
            return 0;
        }
        let slope = Angle::from_tan(fixed_div(dy, dx));
        fixed_div(dx, (slope + ANG90).fine_sine())
    }
}
