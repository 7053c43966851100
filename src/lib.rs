//! Wall-column rasterizer core of a 2.5-D ray-cast software renderer.
//!
//! Given one visible wall segment (front-to-back order, supplied by an
//! external visibility traversal), [`renderer::software::Rasterizer`]
//! computes which screen columns the wall covers, which texture tiers
//! appear in each column, the floor/ceiling span extents bordering the
//! wall, and the per-column sampling parameters handed to the pixel
//! drawing primitive.  Semi-transparent mid textures are captured during
//! setup and resolved later by a deferred masked pass.
//!
//! The crate owns no framebuffer and performs no pixel writes; callers
//! plug in a [`renderer::ColumnPainter`] for that.

pub mod fixed;
pub mod renderer;
pub mod world;
