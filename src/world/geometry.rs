use bitflags::bitflags;
use glam::Vec2;

use crate::fixed::{Angle, FRACBITS, Fixed};
use crate::world::texture::TextureId;

pub type LinedefId = u16;
pub type SegmentId = u16;
pub type VertexId = u16;
pub type SidedefId = u16;
pub type SectorId = u16;

/// Runtime snapshot of one map.  Geometry is immutable after load; the
/// renderer only touches the mapped-line flag and the per-sector
/// precision cache.
#[derive(Debug)]
pub struct Level {
    pub vertices: Vec<Vertex>,
    pub linedefs: Vec<Linedef>,
    pub sidedefs: Vec<Sidedef>,
    pub segs: Vec<Seg>,
    pub sectors: Vec<Sector>,
    /// Flat id treated as open sky by the ceiling rules.
    pub sky_flat: TextureId,
}

/*--------------------------- linedefs -------------------------------*/

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LinedefFlags: u16 {
        const IMPASSABLE      = 0x0001;
        const BLOCK_MONSTERS  = 0x0002;
        const TWO_SIDED       = 0x0004;
        const UPPER_UNPEGGED  = 0x0010;
        const LOWER_UNPEGGED  = 0x0020;
        const SECRET          = 0x0040;
        const BLOCK_SOUND     = 0x0080;
        /// Seen by the player; set here as a side effect for the automap.
        const MAPPED          = 0x0100;
        const NOT_ON_MAP      = 0x0200;
    }
}

bitflags! {
    /// Renderer-facing classification written by the visibility
    /// traversal's line analyzer, read during wall setup.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
    pub struct RenderFlags: u8 {
        /// Two-sided line that is currently a shut obstruction (door).
        const CLOSED   = 0x01;
        /// Tier tiles freely instead of clamping to the texture's
        /// nominal height (non-power-of-two art).
        const TOP_TILE = 0x02;
        const MID_TILE = 0x04;
        const BOT_TILE = 0x08;
    }
}

#[derive(Clone, Debug)]
pub struct Linedef {
    pub v1: VertexId,
    pub v2: VertexId,
    pub flags: LinedefFlags,
    pub render_flags: RenderFlags,
    pub right_sidedef: Option<SidedefId>,
    pub left_sidedef: Option<SidedefId>,
}

/*--------------------------- sidedefs -------------------------------*/

#[derive(Clone, Debug)]
pub struct Sidedef {
    pub x_off: Fixed,
    pub y_off: Fixed,
    pub upper: TextureId,
    pub lower: TextureId,
    pub middle: TextureId,
    pub sector: SectorId,
}

/*----------------------- simple primitives --------------------------*/

#[derive(Clone, Copy, Debug)]
pub struct Vertex {
    pub pos: Vec2,
}

/// Screen-projected, BSP-clipped portion of a linedef.
#[derive(Clone, Debug)]
pub struct Seg {
    pub v1: VertexId,
    pub v2: VertexId,
    /// Direction of v1 -> v2 in map space.
    pub angle: Angle,
    /// Distance from the linedef start to v1, along the line.
    pub offset: Fixed,
    pub linedef: LinedefId,
    /// 0 = seg runs with the linedef (front is the right side).
    pub dir: u16,
    /// Partition-only seg; never marks the line as seen.
    pub miniseg: bool,
}

#[derive(Clone, Debug)]
pub struct Sector {
    pub floor_h: Fixed,
    pub ceil_h: Fixed,
    pub floor_tex: TextureId,
    pub ceil_tex: TextureId,
    pub light: u8,
    pub floor_xoff: Fixed,
    pub floor_yoff: Fixed,
    pub ceil_xoff: Fixed,
    pub ceil_yoff: Fixed,
    /// Control sector supplying fake floor/ceiling surfaces (deep water).
    pub height_link: Option<SectorId>,

    /// Owned by the precision controller; see `renderer::software`.
    pub cached_height: i32,
    pub precision_idx: usize,
}

impl Sector {
    /// Plain sector from map-unit heights, no offsets or links.
    pub fn new(
        floor_h: i32,
        ceil_h: i32,
        floor_tex: TextureId,
        ceil_tex: TextureId,
        light: u8,
    ) -> Self {
        Sector {
            floor_h: floor_h << FRACBITS,
            ceil_h: ceil_h << FRACBITS,
            floor_tex,
            ceil_tex,
            light,
            floor_xoff: 0,
            floor_yoff: 0,
            ceil_xoff: 0,
            ceil_yoff: 0,
            height_link: None,
            cached_height: 0,
            precision_idx: 0,
        }
    }
}

/*----------------------------- lookups ------------------------------*/

impl Level {
    /// Sidedef facing the viewer for this seg.
    pub fn front_sidedef(&self, seg: &Seg) -> &Sidedef {
        let ld = &self.linedefs[seg.linedef as usize];
        let id = if seg.dir == 0 {
            ld.right_sidedef
        } else {
            ld.left_sidedef
        };
        &self.sidedefs[id.expect("seg without a front sidedef") as usize]
    }

    /// Front sector plus the sector behind the wall, if any.
    pub fn sectors_of_seg(&self, seg: &Seg) -> (SectorId, Option<SectorId>) {
        let ld = &self.linedefs[seg.linedef as usize];
        let (front, back) = if seg.dir == 0 {
            (ld.right_sidedef, ld.left_sidedef)
        } else {
            (ld.left_sidedef, ld.right_sidedef)
        };
        let front = self.sidedefs[front.expect("seg without a front sidedef") as usize].sector;
        let back = back.map(|i| self.sidedefs[i as usize].sector);
        (front, back)
    }

    /// Light level after the deep-water substitution: when a sector draws
    /// fake surfaces through a height link and the eye sits outside the
    /// linked slab, the control sector's light applies instead.
    pub fn effective_light(&self, sector: SectorId, view_z: Fixed) -> u8 {
        let sec = &self.sectors[sector as usize];
        if let Some(link) = sec.height_link {
            let ctrl = &self.sectors[link as usize];
            if view_z <= ctrl.floor_h || view_z >= ctrl.ceil_h {
                return ctrl.light;
            }
        }
        sec.light
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::FRACUNIT;

    fn linked_level() -> Level {
        let mut water = Sector::new(0, 128, 1, 2, 96);
        water.height_link = Some(1);
        let ctrl = Sector::new(32, 128, 1, 2, 200);
        Level {
            vertices: vec![],
            linedefs: vec![],
            sidedefs: vec![],
            segs: vec![],
            sectors: vec![water, ctrl],
            sky_flat: 0,
        }
    }

    #[test]
    fn effective_light_substitutes_outside_linked_slab() {
        let lvl = linked_level();
        // Eye under the control floor: submerged, control light wins.
        assert_eq!(lvl.effective_light(0, 16 * FRACUNIT), 200);
        // Eye inside the slab: the sector's own light.
        assert_eq!(lvl.effective_light(0, 64 * FRACUNIT), 96);
    }

    #[test]
    fn effective_light_without_link_is_plain() {
        let mut lvl = linked_level();
        lvl.sectors[0].height_link = None;
        assert_eq!(lvl.effective_light(0, 16 * FRACUNIT), 96);
    }
}
