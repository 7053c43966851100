//! Horizontal-surface accumulation bookkeeping.
//!
//! The wall pass does not render floors or ceilings; it only records,
//! per plane and per column, which vertical pixel range is still open
//! for them.  A separate span renderer consumes the accumulated planes
//! after the opaque walls are resolved.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use smallvec::SmallVec;

use crate::fixed::Fixed;
use crate::world::texture::TextureId;

pub type PlaneId = u16;

/// Column not yet touched for this plane.
pub const UNMARKED: u16 = u16::MAX;

#[derive(Clone, Debug)]
pub struct VisPlane {
    pub height: Fixed,
    pub tex: TextureId,
    pub light: u8,

    /// Inclusive horizontal range the plane touches.
    pub min_x: i32,
    pub max_x: i32,

    /// Per-column open pixel range, `UNMARKED` where untouched.
    pub top: Vec<u16>,
    pub bottom: Vec<u16>,

    pub modified: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PlaneKey {
    height: Fixed,
    tex: TextureId,
    light: u8,
}

/// Frame-scoped registry of visible planes, deduplicated by surface key.
#[derive(Default)]
pub struct PlaneBank {
    lookup: HashMap<PlaneKey, SmallVec<[PlaneId; 4]>>,
    planes: Vec<VisPlane>,
    width: usize,
}

impl PlaneBank {
    pub fn clear(&mut self, width: usize) {
        self.lookup.clear();
        self.planes.clear();
        self.width = width;
    }

    pub fn plane(&self, id: PlaneId) -> &VisPlane {
        &self.planes[id as usize]
    }

    pub fn plane_mut(&mut self, id: PlaneId) -> &mut VisPlane {
        &mut self.planes[id as usize]
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &VisPlane> + '_ {
        self.planes.iter()
    }

    fn push(&mut self, key: PlaneKey, min_x: i32, max_x: i32) -> PlaneId {
        assert!(self.planes.len() < PlaneId::MAX as usize);
        let id = self.planes.len() as PlaneId;
        self.planes.push(VisPlane {
            height: key.height,
            tex: key.tex,
            light: key.light,
            min_x,
            max_x,
            top: vec![UNMARKED; self.width],
            bottom: vec![0; self.width],
            modified: false,
        });
        self.lookup.entry(key).or_default().push(id);
        id
    }

    /// Plane for a surface, reusing an existing compatible one.  Called
    /// by the traversal when it enters a sector's span of columns.
    pub fn find(
        &mut self,
        height: Fixed,
        tex: TextureId,
        light: u8,
        min_x: i32,
        max_x: i32,
    ) -> PlaneId {
        let key = PlaneKey { height, tex, light };
        if let Entry::Occupied(ids) = self.lookup.entry(key) {
            if let Some(&id) = ids.get().first() {
                let pl = &mut self.planes[id as usize];
                pl.min_x = pl.min_x.min(min_x);
                pl.max_x = pl.max_x.max(max_x);
                return id;
            }
        }
        self.push(key, min_x, max_x)
    }

    /// Begin or extend a plane over `[start, stop]`.  When any column in
    /// the overlap is already marked, the surface gets a fresh plane so
    /// earlier marks survive; `None` in means marking stays disabled.
    pub fn check_plane(
        &mut self,
        id: Option<PlaneId>,
        start: i32,
        stop: i32,
    ) -> Option<PlaneId> {
        let id = id?;
        let pl = &self.planes[id as usize];

        let intr_l = start.max(pl.min_x);
        let intr_h = stop.min(pl.max_x);
        let union_l = start.min(pl.min_x);
        let union_h = stop.max(pl.max_x);

        let free = (intr_l..=intr_h).all(|x| pl.top[x as usize] == UNMARKED);
        if free {
            let pl = &mut self.planes[id as usize];
            pl.min_x = union_l;
            pl.max_x = union_h;
            Some(id)
        } else {
            let key = PlaneKey {
                height: pl.height,
                tex: pl.tex,
                light: pl.light,
            };
            Some(self.push(key, start, stop))
        }
    }

    /// Unconditionally split off a fresh plane with the same surface key.
    /// Used when ceiling and floor would otherwise alias one plane and
    /// the second set of marks would overwrite the first.
    pub fn dup_plane(&mut self, id: Option<PlaneId>, start: i32, stop: i32) -> Option<PlaneId> {
        let id = id?;
        let pl = &self.planes[id as usize];
        let key = PlaneKey {
            height: pl.height,
            tex: pl.tex,
            light: pl.light,
        };
        Some(self.push(key, start, stop))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_reuses_matching_surface() {
        let mut bank = PlaneBank::default();
        bank.clear(320);
        let a = bank.find(128 << 16, 3, 160, 10, 50);
        let b = bank.find(128 << 16, 3, 160, 40, 90);
        assert_eq!(a, b);
        assert_eq!(bank.plane(a).min_x, 10);
        assert_eq!(bank.plane(a).max_x, 90);
        let c = bank.find(64 << 16, 3, 160, 0, 10);
        assert_ne!(a, c);
    }

    #[test]
    fn check_plane_extends_when_columns_free() {
        let mut bank = PlaneBank::default();
        bank.clear(320);
        let a = bank.find(0, 1, 128, 0, 100);
        let again = bank.check_plane(Some(a), 50, 150).unwrap();
        assert_eq!(a, again);
        assert_eq!(bank.plane(a).max_x, 150);
    }

    #[test]
    fn check_plane_splits_when_columns_taken() {
        let mut bank = PlaneBank::default();
        bank.clear(320);
        let a = bank.find(0, 1, 128, 0, 100);
        bank.plane_mut(a).top[60] = 5; // column already marked
        let b = bank.check_plane(Some(a), 50, 150).unwrap();
        assert_ne!(a, b);
        let pb = bank.plane(b);
        assert_eq!((pb.min_x, pb.max_x), (50, 150));
        assert_eq!((pb.height, pb.tex, pb.light), (0, 1, 128));
    }

    #[test]
    fn null_handle_disables_marking() {
        let mut bank = PlaneBank::default();
        bank.clear(320);
        assert_eq!(bank.check_plane(None, 0, 10), None);
        assert_eq!(bank.dup_plane(None, 0, 10), None);
    }

    #[test]
    fn dup_always_splits() {
        let mut bank = PlaneBank::default();
        bank.clear(320);
        let a = bank.find(0, 1, 128, 0, 100);
        let b = bank.dup_plane(Some(a), 0, 100).unwrap();
        assert_ne!(a, b);
    }
}
