//! Instance records
//!
//! GPU-ready per-quad records. All structures use `#[repr(C)]` and implement
//! `bytemuck::Pod` so a slice of them can be copied straight into an
//! instance-step vertex buffer. Field order is the binary contract with the
//! vertex buffer layouts in `lustre_gpu::layout`.

use std::ops::BitOr;

use crate::geometry::{Color, Vec2};

// ─────────────────────────────────────────────────────────────────────────────
// Paint flags
// ─────────────────────────────────────────────────────────────────────────────

/// Bitmask of optional paint layers carried in [`ShapeInstance::flags`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct PaintFlags(pub u32);

impl PaintFlags {
    /// Flat color only
    pub const NONE: PaintFlags = PaintFlags(0);
    /// Sample the bound color texture
    pub const TEXTURE: PaintFlags = PaintFlags(1 << 0);
    /// Evaluate the linear gradient
    pub const LIN_GRADIENT: PaintFlags = PaintFlags(1 << 1);
    /// Evaluate the radial gradient
    pub const RAD_GRADIENT: PaintFlags = PaintFlags(1 << 2);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: PaintFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: PaintFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: PaintFlags) {
        self.0 &= !other.0;
    }
}

impl BitOr for PaintFlags {
    type Output = PaintFlags;
    fn bitor(self, rhs: PaintFlags) -> PaintFlags {
        PaintFlags(self.0 | rhs.0)
    }
}

/// Bit values the shape compositor tests `flags` against.
///
/// On the GPU these are pipeline-overridable constants (`TEXTURE`,
/// `LIN_GRADIENT`, `RAD_GRADIENT`); they must match whatever bits the
/// instance producer packs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlagLayout {
    pub texture: u32,
    pub lin_gradient: u32,
    pub rad_gradient: u32,
}

impl FlagLayout {
    pub fn has_texture(&self, flags: u32) -> bool {
        flags & self.texture != 0
    }

    pub fn has_lin_gradient(&self, flags: u32) -> bool {
        flags & self.lin_gradient != 0
    }

    pub fn has_rad_gradient(&self, flags: u32) -> bool {
        flags & self.rad_gradient != 0
    }
}

impl Default for FlagLayout {
    fn default() -> Self {
        Self {
            texture: PaintFlags::TEXTURE.bits(),
            lin_gradient: PaintFlags::LIN_GRADIENT.bits(),
            rad_gradient: PaintFlags::RAD_GRADIENT.bits(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shape instance
// ─────────────────────────────────────────────────────────────────────────────

/// One rounded rectangle (matches the shape shader's instance attributes)
///
/// Memory layout (stride 172 bytes):
/// - position: `vec2<f32>`       @ 0   - center pivot, pixels, Y-down
/// - size: `vec2<f32>`           @ 8
/// - rotation: `f32`             @ 16  - radians about the center
/// - color: `vec4<f32>`          @ 20  - flat paint layer, straight alpha
/// - flags: `u32`                @ 36
/// - corner_radius/feather: `vec2<f32>` @ 40
/// - shadow: `f32`               @ 48
/// - alpha: `f32`                @ 52
/// - lin_gradient: `vec4<f32>`   @ 56  - (p1.x, p1.y, p2.x, p2.y)
/// - lin_color1: `vec4<f32>`     @ 72
/// - lin_color2: `vec4<f32>`     @ 88
/// - rad_gradient: `vec4<f32>`   @ 104 - (center.x, center.y, edge.x, edge.y)
/// - rad_color1: `vec4<f32>`     @ 120
/// - rad_color2: `vec4<f32>`     @ 136
/// - texture_tint: `vec4<f32>`   @ 152
/// - shadow_alpha: `f32`         @ 168
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShapeInstance {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub rotation: f32,
    pub color: [f32; 4],
    pub flags: u32,
    /// Corner arc radius in pixels
    pub corner_radius: f32,
    /// Soft-edge width of the corner arc, used when there is no shadow
    pub corner_feather: f32,
    /// Shadow spread in pixels; the quad grows by this much on every side
    pub shadow: f32,
    pub alpha: f32,
    pub lin_gradient: [f32; 4],
    pub lin_color1: [f32; 4],
    pub lin_color2: [f32; 4],
    pub rad_gradient: [f32; 4],
    pub rad_color1: [f32; 4],
    pub rad_color2: [f32; 4],
    pub texture_tint: [f32; 4],
    /// Opacity of the shadow penumbra (the solid shape is unaffected)
    pub shadow_alpha: f32,
}

impl Default for ShapeInstance {
    fn default() -> Self {
        Self {
            position: [0.0; 2],
            size: [0.0; 2],
            rotation: 0.0,
            color: [1.0, 1.0, 1.0, 1.0],
            flags: PaintFlags::NONE.bits(),
            corner_radius: 0.0,
            corner_feather: 0.0,
            shadow: 0.0,
            alpha: 1.0,
            lin_gradient: [0.0; 4],
            lin_color1: [0.0; 4],
            lin_color2: [0.0; 4],
            rad_gradient: [0.0; 4],
            rad_color1: [0.0; 4],
            rad_color2: [0.0; 4],
            texture_tint: [1.0, 1.0, 1.0, 1.0],
            shadow_alpha: 1.0,
        }
    }
}

impl ShapeInstance {
    /// Axis-aligned rectangle from its top-left corner
    pub fn rect(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self::centered(x + width * 0.5, y + height * 0.5, width, height)
    }

    /// Rectangle from its center
    pub fn centered(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            position: [cx, cy],
            size: [width, height],
            ..Default::default()
        }
    }

    pub fn center(&self) -> Vec2 {
        self.position.into()
    }

    pub fn half_size(&self) -> Vec2 {
        Vec2::from(self.size) * 0.5
    }

    pub fn paint_flags(&self) -> PaintFlags {
        PaintFlags(self.flags)
    }

    /// Set the flat color layer
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color.to_array();
        self
    }

    /// Set rotation about the center, in radians
    pub fn with_rotation(mut self, radians: f32) -> Self {
        self.rotation = radians;
        self
    }

    /// Set the corner radius
    pub fn with_corner_radius(mut self, radius: f32) -> Self {
        self.corner_radius = radius;
        self
    }

    /// Set the soft-edge width of the corner arc
    pub fn with_corner_feather(mut self, feather: f32) -> Self {
        self.corner_feather = feather;
        self
    }

    /// Set shadow spread and penumbra opacity
    pub fn with_shadow(mut self, spread: f32, alpha: f32) -> Self {
        self.shadow = spread;
        self.shadow_alpha = alpha;
        self
    }

    /// Set the instance-level alpha multiplier
    pub fn with_alpha(mut self, alpha: f32) -> Self {
        self.alpha = alpha;
        self
    }

    /// Enable the linear gradient layer from `p1` (color `c1`) to `p2` (color `c2`)
    pub fn with_linear_gradient(mut self, p1: Vec2, p2: Vec2, c1: Color, c2: Color) -> Self {
        self.lin_gradient = [p1.x, p1.y, p2.x, p2.y];
        self.lin_color1 = c1.to_array();
        self.lin_color2 = c2.to_array();
        self.flags |= PaintFlags::LIN_GRADIENT.bits();
        self
    }

    /// Enable the radial gradient layer centered at `center`; `edge` is a point
    /// where the gradient reaches `c2`
    pub fn with_radial_gradient(mut self, center: Vec2, edge: Vec2, c1: Color, c2: Color) -> Self {
        self.rad_gradient = [center.x, center.y, edge.x, edge.y];
        self.rad_color1 = c1.to_array();
        self.rad_color2 = c2.to_array();
        self.flags |= PaintFlags::RAD_GRADIENT.bits();
        self
    }

    /// Enable the texture layer with a multiplicative tint
    pub fn with_texture(mut self, tint: Color) -> Self {
        self.texture_tint = tint.to_array();
        self.flags |= PaintFlags::TEXTURE.bits();
        self
    }

    /// Replace the flag bits wholesale
    pub fn with_flags(mut self, flags: PaintFlags) -> Self {
        self.flags = flags.bits();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Glyph instance
// ─────────────────────────────────────────────────────────────────────────────

/// One glyph quad sampling the layered coverage atlas
///
/// Memory layout (stride 56 bytes):
/// - position: `vec2<f32>` @ 0  - top-left of the glyph quad, pixels
/// - size: `vec2<f32>`     @ 8
/// - color: `vec4<f32>`    @ 16
/// - uvd: `vec3<f32>`      @ 32 - atlas texel offset (x, y) and layer
/// - origin: `vec2<f32>`   @ 44 - rotation pivot shared by the text run
/// - rotation: `f32`       @ 52
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlyphInstance {
    pub position: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 4],
    pub uvd: [f32; 3],
    pub origin: [f32; 2],
    pub rotation: f32,
}

impl GlyphInstance {
    /// Glyph quad at `(x, y)` sampling the atlas region at `(u, v)` on `layer`
    pub fn new(x: f32, y: f32, width: f32, height: f32, u: f32, v: f32, layer: u32) -> Self {
        Self {
            position: [x, y],
            size: [width, height],
            color: [0.0, 0.0, 0.0, 1.0],
            uvd: [u, v, layer as f32],
            origin: [x, y],
            rotation: 0.0,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color.to_array();
        self
    }

    /// Rotate the glyph rigidly about a pivot shared with the rest of its run
    pub fn with_rotation_about(mut self, origin: Vec2, radians: f32) -> Self {
        self.origin = origin.to_array();
        self.rotation = radians;
        self
    }

    pub fn layer(&self) -> u32 {
        self.uvd[2].max(0.0) as u32
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Screen uniform
// ─────────────────────────────────────────────────────────────────────────────

/// Per-surface uniform used to map pixels to normalized device coordinates
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ScreenUniform {
    pub screen_size: [f32; 2],
    pub _padding: [f32; 2],
}

impl ScreenUniform {
    /// Surface dimensions are clamped to at least one pixel
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            screen_size: [width.max(1.0), height.max(1.0)],
            _padding: [0.0; 2],
        }
    }

    pub fn size(&self) -> Vec2 {
        self.screen_size.into()
    }
}

impl Default for ScreenUniform {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_strides() {
        assert_eq!(std::mem::size_of::<ShapeInstance>(), 172);
        assert_eq!(std::mem::size_of::<GlyphInstance>(), 56);
        assert_eq!(std::mem::size_of::<ScreenUniform>(), 16);
    }

    #[test]
    fn builders_set_flag_bits() {
        let shape = ShapeInstance::rect(0.0, 0.0, 10.0, 10.0)
            .with_texture(Color::WHITE)
            .with_linear_gradient(Vec2::ZERO, Vec2::ONE, Color::RED, Color::BLUE);
        let flags = shape.paint_flags();
        assert!(flags.contains(PaintFlags::TEXTURE));
        assert!(flags.contains(PaintFlags::LIN_GRADIENT));
        assert!(!flags.contains(PaintFlags::RAD_GRADIENT));
    }

    #[test]
    fn default_shape_is_flat() {
        assert_eq!(ShapeInstance::default().paint_flags(), PaintFlags::NONE);
    }

    #[test]
    fn rect_uses_center_pivot() {
        let shape = ShapeInstance::rect(10.0, 20.0, 100.0, 50.0);
        assert_eq!(shape.position, [60.0, 45.0]);
        assert_eq!(shape.half_size(), Vec2::new(50.0, 25.0));
    }

    #[test]
    fn flag_insert_remove() {
        let mut flags = PaintFlags::TEXTURE | PaintFlags::RAD_GRADIENT;
        flags.remove(PaintFlags::TEXTURE);
        assert_eq!(flags, PaintFlags::RAD_GRADIENT);
        flags.insert(PaintFlags::LIN_GRADIENT);
        assert!(flags.contains(PaintFlags::LIN_GRADIENT | PaintFlags::RAD_GRADIENT));
    }

    #[test]
    fn screen_uniform_never_zero() {
        let screen = ScreenUniform::new(0.0, -4.0);
        assert_eq!(screen.screen_size, [1.0, 1.0]);
    }
}
