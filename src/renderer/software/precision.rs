//! Scale clamp and fixed-point precision control.
//!
//! Looking almost parallel down a wall makes the projective scale
//! explode; the taller the sector, the sooner subsequent fixed-point
//! math overflows.  The classic engine clamped scale at 64 units and
//! lived with the resulting wall wobble.  This controller instead picks
//! a per-sector profile (a scale clamp plus a fractional-bit width for
//! height interpolation), trading precision for headroom as sectors get
//! taller, so the clamp is rarely hit and overflow never is.

use crate::fixed::{ANG90, Angle, FRACBITS, FRACUNIT, Fixed, fixed_div, fixed_mul};
use crate::renderer::software::view::View;
use crate::world::geometry::Sector;

/// Scale clamp plus fractional-bit width, coarsening with sector height.
struct Profile {
    max_scale: Fixed,
    height_bits: i32,
}

const PROFILES: [Profile; 8] = [
    Profile { max_scale: 2048 * FRACUNIT, height_bits: 12 },
    Profile { max_scale: 1024 * FRACUNIT, height_bits: 12 },
    Profile { max_scale: 1024 * FRACUNIT, height_bits: 11 },
    Profile { max_scale: 512 * FRACUNIT, height_bits: 11 },
    Profile { max_scale: 512 * FRACUNIT, height_bits: 10 },
    Profile { max_scale: 256 * FRACUNIT, height_bits: 10 },
    Profile { max_scale: 256 * FRACUNIT, height_bits: 9 },
    Profile { max_scale: 128 * FRACUNIT, height_bits: 9 },
];

/// The profile the original renderer hard-wired.
const LEGACY: Profile = Profile { max_scale: 64 * FRACUNIT, height_bits: 12 };

pub(crate) struct Precision {
    pub max_scale: Fixed,
    pub height_bits: i32,
    pub height_unit: Fixed,
    pub inv_height_bits: i32,
    last_height: i32,
}

impl Default for Precision {
    fn default() -> Self {
        let mut p = Precision {
            max_scale: 0,
            height_bits: 0,
            height_unit: 0,
            inv_height_bits: 0,
            last_height: 0,
        };
        p.reset_legacy();
        p
    }
}

impl Precision {
    fn apply(&mut self, profile: &Profile) {
        self.max_scale = profile.max_scale;
        self.height_bits = profile.height_bits;
        self.height_unit = 1 << profile.height_bits;
        self.inv_height_bits = FRACBITS - profile.height_bits;
    }

    pub fn reset_legacy(&mut self) {
        self.apply(&LEGACY);
        self.last_height = 0;
    }

    /// Re-tune for the sector about to be rasterized.  Cheap when the
    /// height matches the last call; the chosen profile index is cached
    /// on the sector and only recomputed when its height changes.
    pub fn adapt(&mut self, sector: &mut Sector) {
        let mut height = (sector.ceil_h - sector.floor_h) >> FRACBITS;

        // Disallow degenerate heights; 1 also forces cache initialization.
        if height < 1 {
            height = 1;
        }

        if height != self.last_height {
            self.last_height = height;

            if height != sector.cached_height {
                sector.cached_height = height;
                sector.precision_idx = 0;
                let mut h = height >> 7;
                loop {
                    h >>= 1;
                    if h == 0 {
                        break;
                    }
                    sector.precision_idx += 1;
                }
            }

            self.apply(&PROFILES[sector.precision_idx]);
        }
    }
}

/// Projective depth scale for the screen column whose ray leaves the eye
/// at `visangle`.  `distance` is the perpendicular distance to the wall
/// line and `normal_angle` the direction of its normal.  Near-parallel
/// rays (denominator collapsing against the numerator) return the
/// current clamp rather than diverging.
pub(crate) fn scale_from_angle(
    view: &View,
    visangle: Angle,
    normal_angle: Angle,
    distance: Fixed,
    max_scale: Fixed,
) -> Fixed {
    let anglea = ANG90 + (visangle - view.angle);
    let angleb = ANG90 + (visangle - normal_angle);

    let den = fixed_mul(distance, anglea.fine_sine());
    let num = fixed_mul(view.projection_y, angleb.fine_sine());

    if den > num >> FRACBITS {
        fixed_div(num, den).clamp(256, max_scale)
    } else {
        max_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn sector_of_height(h: i32) -> Sector {
        Sector::new(0, h, 1, 1, 128)
    }

    #[test]
    fn profile_coarsens_exactly_at_power_of_two_heights() {
        let expectations = [
            (1, 0),
            (100, 0),
            (255, 0),
            (256, 1),
            (511, 1),
            (512, 2),
            (1024, 3),
            (2048, 4),
            (4096, 5),
            (8192, 6),
            (16384, 7),
            (32000, 7),
        ];
        for (height, idx) in expectations {
            let mut p = Precision::default();
            let mut sec = sector_of_height(height);
            p.adapt(&mut sec);
            assert_eq!(sec.precision_idx, idx, "height {height}");
            assert_eq!(p.max_scale, PROFILES[idx].max_scale);
            assert_eq!(p.height_bits, PROFILES[idx].height_bits);
            assert_eq!(p.inv_height_bits, FRACBITS - PROFILES[idx].height_bits);
        }
    }

    #[test]
    fn coarsening_is_monotone() {
        let mut prev_clamp = Fixed::MAX;
        let mut prev_bits = i32::MAX;
        for h in [32, 128, 300, 600, 1200, 2500, 5000, 10000, 20000] {
            let mut p = Precision::default();
            let mut sec = sector_of_height(h);
            p.adapt(&mut sec);
            assert!(p.max_scale <= prev_clamp);
            assert!(p.height_bits <= prev_bits);
            prev_clamp = p.max_scale;
            prev_bits = p.height_bits;
        }
    }

    #[test]
    fn adapt_is_idempotent_for_unchanged_height() {
        let mut p = Precision::default();
        let mut sec = sector_of_height(700);
        p.adapt(&mut sec);
        let (idx, cached) = (sec.precision_idx, sec.cached_height);
        p.adapt(&mut sec);
        p.adapt(&mut sec);
        assert_eq!(sec.precision_idx, idx);
        assert_eq!(sec.cached_height, cached);
    }

    #[test]
    fn moving_sector_recomputes_profile() {
        let mut p = Precision::default();
        let mut sec = sector_of_height(100);
        p.adapt(&mut sec);
        assert_eq!(sec.precision_idx, 0);
        sec.ceil_h = 5000 << FRACBITS; // door opened into a shaft
        p.adapt(&mut sec);
        assert_eq!(sec.cached_height, 5000);
        assert_eq!(sec.precision_idx, 5);
    }

    #[test]
    fn non_positive_height_is_treated_as_one() {
        let mut p = Precision::default();
        let mut sec = sector_of_height(0);
        p.adapt(&mut sec);
        assert_eq!(sec.cached_height, 1);
        assert_eq!(sec.precision_idx, 0);

        let mut inverted = Sector::new(64, 0, 1, 1, 128);
        p.adapt(&mut inverted);
        assert_eq!(inverted.cached_height, 1);
    }

    #[test]
    fn legacy_profile_when_adaptation_is_off() {
        let p = Precision::default();
        assert_eq!(p.max_scale, 64 * FRACUNIT);
        assert_eq!(p.height_bits, 12);
        assert_eq!(p.height_unit, 1 << 12);
        assert_eq!(p.inv_height_bits, 4);
    }

    #[test]
    fn head_on_scale_is_projection_over_distance() {
        let mut view = View::new(320, 200, FRAC_PI_2);
        view.set_viewpoint(0, 0, 41 * FRACUNIT, Angle(0));
        // Wall straight ahead, normal pointing back at the eye.
        let scale = scale_from_angle(
            &view,
            view.angle,
            view.angle,
            128 * FRACUNIT,
            2048 * FRACUNIT,
        );
        let expected = fixed_div(view.projection_y, 128 * FRACUNIT);
        assert!((scale - expected).abs() <= 16, "scale {scale} vs {expected}");
    }

    #[test]
    fn grazing_ray_clamps_to_max_scale() {
        let mut view = View::new(320, 200, FRAC_PI_2);
        view.set_viewpoint(0, 0, 41 * FRACUNIT, Angle(0));
        let max = 512 * FRACUNIT;
        // Ray parallel to the wall: denominator collapses.
        let scale = scale_from_angle(&view, view.angle + ANG90, view.angle, 128 * FRACUNIT, max);
        assert_eq!(scale, max);
    }

    #[test]
    fn vanishing_numerator_clamps_low_end() {
        let mut view = View::new(320, 200, FRAC_PI_2);
        view.set_viewpoint(0, 0, 0, Angle(0));
        // Ray nearly along the wall normal's perpendicular: the numerator
        // collapses and the un-clamped quotient would drop below 256.
        let scale = scale_from_angle(
            &view,
            view.angle,
            view.angle + ANG90,
            128 * FRACUNIT,
            2048 * FRACUNIT,
        );
        assert_eq!(scale, 256);
    }
}
