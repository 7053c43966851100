// Format-agnostic repository of wall textures decoded by the asset
// loader.  The rasterizer interacts through `TextureId` only and samples
// whole vertical columns, so texels are stored column-major.

use std::collections::HashMap;

use crate::fixed::{FRACBITS, Fixed};

/// Runtime handle for a texture in this bank.
///
/// *Guaranteed* to remain stable for the lifetime of the bank.
pub type TextureId = u16;

/// The "no texture on this tier" id.  Slot 0 always holds the fallback
/// checkerboard, so an accidental draw through it stays visible (and
/// obvious) instead of crashing.
pub const NO_TEXTURE: TextureId = 0;

/// Palette-indexed texels in column-major order.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub name: String,
    pub w: usize,
    pub h: usize,
    texels: Vec<u8>,
}

impl Texture {
    pub fn new<S: Into<String>>(name: S, w: usize, h: usize, texels: Vec<u8>) -> Self {
        assert_eq!(texels.len(), w * h, "column-major texel block mismatch");
        Texture {
            name: name.into(),
            w,
            h,
            texels,
        }
    }

    /// One vertical texel column; the index wraps in both directions so
    /// filtering neighbors (`i - 1`, `i + 1`) are always valid.
    #[inline]
    pub fn column_wrapped(&self, i: i32) -> &[u8] {
        let c = i.rem_euclid(self.w as i32) as usize;
        &self.texels[c * self.h..(c + 1) * self.h]
    }

    /// Texture height in map units (one texel = one unit).
    #[inline]
    pub fn height_fixed(&self) -> Fixed {
        (self.h as Fixed) << FRACBITS
    }
}

/// Convenience checkerboard 8x8 (dark/light grey indices).
impl Default for Texture {
    fn default() -> Self {
        const LIGHT_IDX: u8 = 8;
        const DARK_IDX: u8 = 16;
        let mut pix = vec![0u8; 8 * 8];
        for c in 0..8 {
            for y in 0..8 {
                pix[c * 8 + y] = if (c ^ y) & 1 == 0 { LIGHT_IDX } else { DARK_IDX };
            }
        }
        Texture::new("CHECKER", 8, 8, pix)
    }
}

/// Things that can go wrong when using the bank.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextureError {
    /// Attempted to insert a second texture with an existing name.
    #[error("texture name `{0}` already present in bank")]
    Duplicate(String),

    /// Requested ID is outside `0 .. bank.len()`.
    #[error("texture id {0} out of range")]
    BadId(TextureId),
}

/// A format-agnostic cache of textures.
///
/// * Does **not** know about on-disk archives or image formats; that is
///   the loader's job.
/// * Stores exactly one copy of every name.
/// * ID **0** is always the "missing" checkerboard.
pub struct TextureBank {
    by_name: HashMap<String, TextureId>,
    data: Vec<Texture>,
}

impl TextureBank {
    /// Create an empty bank with a mandatory *missing* texture used as
    /// fallback.  The texture is inserted under the fixed name
    /// `"MISSING"` and obtains the handle **0**.
    pub fn new(missing_tex: Texture) -> Self {
        let mut by_name = HashMap::new();
        by_name.insert("MISSING".into(), NO_TEXTURE);
        Self {
            by_name,
            data: vec![missing_tex],
        }
    }

    pub fn default_with_checker() -> Self {
        Self::new(Texture::default())
    }

    /// Number of textures stored (including the "missing" one).
    pub fn len(&self) -> usize {
        self.data.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data.len() == 1 // only the checkerboard
    }

    /// Obtain the id for a *loaded* texture by name.
    pub fn id(&self, name: &str) -> Option<TextureId> {
        self.by_name.get(name).copied()
    }

    /// Borrow a texture by id, with bounds-checking.
    pub fn texture(&self, id: TextureId) -> Result<&Texture, TextureError> {
        self.data.get(id as usize).ok_or(TextureError::BadId(id))
    }

    /// Fallback-safe borrow: bad ids resolve to the checkerboard.
    pub fn texture_or_missing(&self, id: TextureId) -> &Texture {
        self.data.get(id as usize).unwrap_or(&self.data[0])
    }

    /// Nominal height of a texture in fixed map units.
    pub fn height_of(&self, id: TextureId) -> Fixed {
        self.texture_or_missing(id).height_fixed()
    }

    /// Insert a texture under `name`.
    ///
    /// * Returns the newly assigned `TextureId`.
    /// * Fails if the name already exists (`Duplicate`).
    pub fn insert<S: Into<String>>(
        &mut self,
        name: S,
        tex: Texture,
    ) -> Result<TextureId, TextureError> {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(TextureError::Duplicate(name));
        }
        let id = self.data.len() as TextureId;
        self.data.push(tex);
        self.by_name.insert(name, id);
        Ok(id)
    }
}

/*======================================================================*/
/*                               Tests                                  */
/*======================================================================*/
#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_tex(color: u8) -> Texture {
        Texture::new("Dummy", 2, 2, vec![color; 4])
    }

    #[test]
    fn insert_and_lookup() {
        let mut bank = TextureBank::default_with_checker();
        let red = bank.insert("RED", dummy_tex(0x00)).unwrap();
        let blue = bank.insert("BLUE", dummy_tex(0xFF)).unwrap();

        assert_ne!(red, NO_TEXTURE);
        assert_ne!(blue, red);
        assert_eq!(bank.id("RED"), Some(red));
        assert_eq!(bank.id("NOPE"), None);

        assert_eq!(bank.texture(red).unwrap().column_wrapped(0)[0], 0x00);
        assert_eq!(bank.texture(blue).unwrap().column_wrapped(0)[0], 0xFF);
    }

    #[test]
    fn duplicate_name_rejected() {
        let mut bank = TextureBank::default_with_checker();
        bank.insert("WOOD", dummy_tex(1)).unwrap();
        let err = bank.insert("WOOD", dummy_tex(2)).unwrap_err();
        assert_eq!(err, TextureError::Duplicate("WOOD".into()));
        assert_eq!(bank.len(), 2);
    }

    #[test]
    fn bad_id_falls_back_to_checker() {
        let bank = TextureBank::default_with_checker();
        let bad = TextureId::MAX;
        assert_eq!(bank.texture(bad).unwrap_err(), TextureError::BadId(bad));
        assert_eq!(bank.texture_or_missing(bad).name, "CHECKER");
    }

    #[test]
    fn column_wrapping_is_bidirectional() {
        let tex = Texture::new("T", 2, 3, vec![1, 1, 1, 2, 2, 2]);
        assert_eq!(tex.column_wrapped(0)[0], 1);
        assert_eq!(tex.column_wrapped(1)[0], 2);
        assert_eq!(tex.column_wrapped(2)[0], 1);
        assert_eq!(tex.column_wrapped(-1)[0], 2);
    }
}
