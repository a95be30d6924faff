//! Transform stage
//!
//! Per-vertex math shared by the shape, glyph and mask pipelines: scale the unit
//! quad to the instance extent, rotate it about its pivot, translate into pixel
//! space and convert to normalized device coordinates with a Y flip.
//!
//! The inverse mappings (`shape_local`, `glyph_local`) are used by the CPU
//! rasterizer to recover the interpolated varyings at a pixel center.

use crate::geometry::Vec2;
use crate::instance::{GlyphInstance, ScreenUniform, ShapeInstance};
use crate::quad::{quad_corner, quad_offset};

/// Whether a quad grows to make room for the shadow penumbra
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Expansion {
    /// Grow by `shadow` on every side (shape pipeline)
    #[default]
    Shadow,
    /// Exact silhouette (mask pipeline)
    None,
}

/// Pixel space (top-left origin, Y-down) to NDC (center origin, Y-up)
pub fn pixel_to_ndc(pixel: Vec2, screen: Vec2) -> Vec2 {
    (pixel / screen * 2.0 - Vec2::ONE) * Vec2::new(1.0, -1.0)
}

/// Quad extent of a shape instance for the given expansion
pub fn shape_extent(instance: &ShapeInstance, expansion: Expansion) -> Vec2 {
    let size = Vec2::from(instance.size).max(Vec2::ZERO);
    match expansion {
        Expansion::Shadow => size + Vec2::splat(2.0 * instance.shadow.max(0.0)),
        Expansion::None => size,
    }
}

/// Output of the shape vertex stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeVertex {
    pub clip_position: [f32; 4],
    /// Offset from the instance center in the unrotated instance frame
    pub local_offset: Vec2,
    /// Screen-space pixel position of the vertex
    pub pixel_pos: Vec2,
}

pub fn shape_vertex(
    instance: &ShapeInstance,
    index: u32,
    screen: &ScreenUniform,
    expansion: Expansion,
) -> ShapeVertex {
    let local_offset = shape_extent(instance, expansion) * quad_offset(index);
    let pixel_pos = instance.center() + local_offset.rotate(instance.rotation);
    let ndc = pixel_to_ndc(pixel_pos, screen.size());
    ShapeVertex {
        clip_position: [ndc.x, ndc.y, 0.0, 1.0],
        local_offset,
        pixel_pos,
    }
}

/// Offset of a screen pixel from the instance center, in the unrotated frame
pub fn shape_local(instance: &ShapeInstance, pixel: Vec2) -> Vec2 {
    (pixel - instance.center()).rotate(-instance.rotation)
}

/// Output of the glyph vertex stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphVertex {
    pub clip_position: [f32; 4],
    /// Normalized atlas coordinate
    pub uv: Vec2,
    pub layer: u32,
}

pub fn glyph_vertex(
    instance: &GlyphInstance,
    index: u32,
    screen: &ScreenUniform,
    atlas_side: f32,
) -> GlyphVertex {
    let corner = quad_corner(index);
    let size = Vec2::from(instance.size);
    let pixel = Vec2::from(instance.position) + corner * size;
    let pixel = pixel.rotate_about(instance.origin.into(), instance.rotation);
    let ndc = pixel_to_ndc(pixel, screen.size());
    GlyphVertex {
        clip_position: [ndc.x, ndc.y, 0.0, 1.0],
        uv: glyph_uv(instance, corner, atlas_side),
        layer: instance.layer(),
    }
}

/// Atlas coordinate for a position inside the glyph quad (`corner` in `[0, 1]²`)
pub fn glyph_uv(instance: &GlyphInstance, corner: Vec2, atlas_side: f32) -> Vec2 {
    let texel = Vec2::new(instance.uvd[0], instance.uvd[1]) + corner * Vec2::from(instance.size);
    texel / atlas_side.max(1.0)
}

/// Position of a screen pixel inside the glyph quad, in `[0, 1]²` when covered
pub fn glyph_local(instance: &GlyphInstance, pixel: Vec2) -> Vec2 {
    let unrotated = pixel.rotate_about(instance.origin.into(), -instance.rotation);
    let size = Vec2::from(instance.size);
    if size.x <= 0.0 || size.y <= 0.0 {
        return Vec2::splat(-1.0);
    }
    (unrotated - Vec2::from(instance.position)) / size
}
