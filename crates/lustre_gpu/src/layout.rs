//! Instance vertex buffer layouts
//!
//! Attribute offsets are derived from the `repr(C)` records in
//! `lustre_core::instance`; locations match the WGSL input structs.

use lustre_core::{GlyphInstance, ShapeInstance};

const SHAPE_ATTRIBUTES: [wgpu::VertexAttribute; 16] = wgpu::vertex_attr_array![
    0 => Float32x2,  // position
    1 => Float32x2,  // size
    2 => Float32,    // rotation
    3 => Float32x4,  // color
    4 => Uint32,     // flags
    5 => Float32x2,  // corner radius, corner feather
    6 => Float32,    // shadow
    7 => Float32,    // alpha
    8 => Float32x4,  // lin_gradient
    9 => Float32x4,  // lin_color1
    10 => Float32x4, // lin_color2
    11 => Float32x4, // rad_gradient
    12 => Float32x4, // rad_color1
    13 => Float32x4, // rad_color2
    14 => Float32x4, // texture_tint
    15 => Float32,   // shadow_alpha
];

const GLYPH_ATTRIBUTES: [wgpu::VertexAttribute; 6] = wgpu::vertex_attr_array![
    0 => Float32x2, // position
    1 => Float32x2, // size
    2 => Float32x4, // color
    3 => Float32x3, // uvd
    4 => Float32x2, // origin
    5 => Float32,   // rotation
];

/// One [`ShapeInstance`] per instance (shape and mask pipelines)
pub const SHAPE_INSTANCE_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<ShapeInstance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &SHAPE_ATTRIBUTES,
};

/// One [`GlyphInstance`] per instance
pub const GLYPH_INSTANCE_LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
    array_stride: std::mem::size_of::<GlyphInstance>() as wgpu::BufferAddress,
    step_mode: wgpu::VertexStepMode::Instance,
    attributes: &GLYPH_ATTRIBUTES,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn end_of(attributes: &[wgpu::VertexAttribute]) -> u64 {
        attributes
            .iter()
            .map(|a| a.offset + a.format.size())
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn strides_cover_every_attribute() {
        assert_eq!(SHAPE_INSTANCE_LAYOUT.array_stride, 172);
        assert_eq!(end_of(SHAPE_INSTANCE_LAYOUT.attributes), 172);
        assert_eq!(GLYPH_INSTANCE_LAYOUT.array_stride, 56);
        assert_eq!(end_of(GLYPH_INSTANCE_LAYOUT.attributes), 56);
    }

    #[test]
    fn shape_offsets_match_record() {
        let offset = |location: u32| SHAPE_ATTRIBUTES[location as usize].offset as usize;
        assert_eq!(offset(0), bytemuck::offset_of!(ShapeInstance, position));
        assert_eq!(offset(2), bytemuck::offset_of!(ShapeInstance, rotation));
        assert_eq!(offset(4), bytemuck::offset_of!(ShapeInstance, flags));
        assert_eq!(offset(5), bytemuck::offset_of!(ShapeInstance, corner_radius));
        assert_eq!(offset(5) + 4, bytemuck::offset_of!(ShapeInstance, corner_feather));
        assert_eq!(offset(8), bytemuck::offset_of!(ShapeInstance, lin_gradient));
        assert_eq!(offset(11), bytemuck::offset_of!(ShapeInstance, rad_gradient));
        assert_eq!(offset(14), bytemuck::offset_of!(ShapeInstance, texture_tint));
        assert_eq!(offset(15), bytemuck::offset_of!(ShapeInstance, shadow_alpha));
    }

    #[test]
    fn glyph_offsets_match_record() {
        let offset = |location: u32| GLYPH_ATTRIBUTES[location as usize].offset as usize;
        assert_eq!(offset(2), bytemuck::offset_of!(GlyphInstance, color));
        assert_eq!(offset(3), bytemuck::offset_of!(GlyphInstance, uvd));
        assert_eq!(offset(4), bytemuck::offset_of!(GlyphInstance, origin));
        assert_eq!(offset(5), bytemuck::offset_of!(GlyphInstance, rotation));
    }

    #[test]
    fn instance_step() {
        assert_eq!(SHAPE_INSTANCE_LAYOUT.step_mode, wgpu::VertexStepMode::Instance);
        assert_eq!(GLYPH_INSTANCE_LAYOUT.step_mode, wgpu::VertexStepMode::Instance);
    }
}
