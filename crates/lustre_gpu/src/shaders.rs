//! WGSL shaders
//!
//! Three pipelines share one vertex prelude (screen uniform, quad corner
//! formula, pixel to NDC conversion) and the shape and mask shaders share the
//! rounded-rectangle edge functions, so a shape's silhouette and its clip
//! mask are computed by the same code.
//!
//! Pipeline-overridable constants:
//! - shape: `TEXTURE`, `LIN_GRADIENT`, `RAD_GRADIENT` (flag bits), `GAMMA`,
//!   `GAMMA_SCALE` (tone curve)
//! - glyph: `ATLAS_SIDE`, `ATLAS_LAYERS`

use crate::renderer::RendererError;

/// Screen uniform, quad generator and transform helpers
macro_rules! vertex_prelude {
    () => {
        r#"
struct Screen {
    size: vec2<f32>,
    _padding: vec2<f32>,
}

@group(0) @binding(0) var<uniform> screen: Screen;

// Vertex index 0..6 to a unit-square corner:
// (1,1) (1,0) (0,0) and (0,0) (0,1) (1,1)
fn quad_corner(index: u32) -> vec2<f32> {
    let i = index % 6u;
    let x = select(0.0, 1.0, (1u + i) % 6u < 3u);
    let y = select(0.0, 1.0, (2u + i) % 6u < 3u);
    return vec2<f32>(x, y);
}

// Pixel space (top-left origin, Y down) to NDC
fn pixel_to_ndc(pixel: vec2<f32>) -> vec2<f32> {
    return (pixel / screen.size * 2.0 - 1.0) * vec2<f32>(1.0, -1.0);
}

fn rotate(v: vec2<f32>, angle: f32) -> vec2<f32> {
    let s = sin(angle);
    let c = cos(angle);
    return vec2<f32>(v.x * c - v.y * s, v.x * s + v.y * c);
}
"#
    };
}

/// Shape instance attributes (shape and mask pipelines read the same buffer)
macro_rules! shape_instance {
    () => {
        r#"
struct ShapeInstance {
    @location(0) position: vec2<f32>,
    @location(1) size: vec2<f32>,
    @location(2) rotation: f32,
    @location(3) color: vec4<f32>,
    @location(4) flags: u32,
    @location(5) round: vec2<f32>,
    @location(6) shadow: f32,
    @location(7) alpha: f32,
    @location(8) lin_gradient: vec4<f32>,
    @location(9) lin_color1: vec4<f32>,
    @location(10) lin_color2: vec4<f32>,
    @location(11) rad_gradient: vec4<f32>,
    @location(12) rad_color1: vec4<f32>,
    @location(13) rad_color2: vec4<f32>,
    @location(14) texture_tint: vec4<f32>,
    @location(15) shadow_alpha: f32,
}
"#
    };
}

/// Rounded-rectangle edge coverage
macro_rules! edge_functions {
    () => {
        r#"
// x: distance past the silhouette in pixels, y: 1.0 inside a corner region
fn edge_measure(local: vec2<f32>, half_size: vec2<f32>, radius: f32) -> vec2<f32> {
    let d = abs(local);
    let h = max(half_size, vec2<f32>(0.0));
    let r = clamp(radius, 0.0, min(h.x, h.y));
    let inner = h - vec2<f32>(r);
    if (d.x > inner.x && d.y > inner.y) {
        return vec2<f32>(length(d - inner) - r, 1.0);
    }
    return vec2<f32>(max(d.x - h.x, d.y - h.y), 0.0);
}

// Coverage multiplier, or a negative value to discard
fn edge_coverage(
    local: vec2<f32>,
    half_size: vec2<f32>,
    radius: f32,
    feather: f32,
    shadow: f32,
    shadow_alpha: f32,
) -> f32 {
    let m = edge_measure(local, half_size, radius);
    let excess = m.x;
    if (excess <= 0.0) {
        return 1.0;
    }
    if (shadow > 0.0) {
        let falloff = clamp(1.0 - excess / shadow, 0.0, 1.0);
        if (falloff <= 0.0) {
            return -1.0;
        }
        if (falloff < 1.0) {
            return falloff * shadow_alpha;
        }
        return falloff;
    }
    // Only corner arcs are feathered
    if (m.y > 0.5 && feather > 0.0) {
        let soft = clamp(1.0 - excess / feather, 0.0, 1.0);
        if (soft > 0.0) {
            return soft;
        }
    }
    return -1.0;
}
"#
    };
}

/// Shape pipeline: paint layers, rounded corners, shadow falloff
pub const SHAPE_SHADER: &str = concat!(
    r#"
// ============================================================================
// Lustre Shape Shader
// ============================================================================
"#,
    vertex_prelude!(),
    shape_instance!(),
    edge_functions!(),
    r#"
override TEXTURE: u32 = 1u;
override LIN_GRADIENT: u32 = 2u;
override RAD_GRADIENT: u32 = 4u;
override GAMMA: f32 = 1.0;
override GAMMA_SCALE: f32 = 1.0;

const GRADIENT_EPSILON: f32 = 0.0001;

struct ShapeVarying {
    @builtin(position) clip_position: vec4<f32>,
    // Offset from the center in the unrotated instance frame
    @location(0) local_offset: vec2<f32>,
    // Screen-space pixel position (gradients)
    @location(1) pixel_pos: vec2<f32>,
    @location(2) @interpolate(flat) size: vec2<f32>,
    @location(3) @interpolate(flat) color: vec4<f32>,
    @location(4) @interpolate(flat) flags: u32,
    @location(5) @interpolate(flat) round: vec2<f32>,
    // shadow, alpha, shadow_alpha, unused
    @location(6) @interpolate(flat) params: vec4<f32>,
    @location(7) @interpolate(flat) lin_gradient: vec4<f32>,
    @location(8) @interpolate(flat) lin_color1: vec4<f32>,
    @location(9) @interpolate(flat) lin_color2: vec4<f32>,
    @location(10) @interpolate(flat) rad_gradient: vec4<f32>,
    @location(11) @interpolate(flat) rad_color1: vec4<f32>,
    @location(12) @interpolate(flat) rad_color2: vec4<f32>,
    @location(13) @interpolate(flat) texture_tint: vec4<f32>,
}

@group(1) @binding(0) var color_texture: texture_2d<f32>;
@group(1) @binding(1) var color_sampler: sampler;

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    instance: ShapeInstance,
) -> ShapeVarying {
    var out: ShapeVarying;

    let shadow = max(instance.shadow, 0.0);
    let extent = max(instance.size, vec2<f32>(0.0)) + vec2<f32>(2.0 * shadow);
    let local_offset = extent * (quad_corner(vertex_index) - 0.5);
    let pixel_pos = instance.position + rotate(local_offset, instance.rotation);

    out.clip_position = vec4<f32>(pixel_to_ndc(pixel_pos), 0.0, 1.0);
    out.local_offset = local_offset;
    out.pixel_pos = pixel_pos;
    out.size = abs(instance.size);
    out.color = instance.color;
    out.flags = instance.flags;
    out.round = instance.round;
    out.params = vec4<f32>(instance.shadow, instance.alpha, instance.shadow_alpha, 0.0);
    out.lin_gradient = instance.lin_gradient;
    out.lin_color1 = instance.lin_color1;
    out.lin_color2 = instance.lin_color2;
    out.rad_gradient = instance.rad_gradient;
    out.rad_color1 = instance.rad_color1;
    out.rad_color2 = instance.rad_color2;
    out.texture_tint = instance.texture_tint;
    return out;
}

@fragment
fn fs_main(in: ShapeVarying) -> @location(0) vec4<f32> {
    var color = vec3<f32>(0.0);
    var max_alpha = 0.0;

    // Paint layers: texture, radial, linear, flat
    if ((in.flags & TEXTURE) != 0u) {
        let uv = in.local_offset / max(in.size, vec2<f32>(GRADIENT_EPSILON)) + 0.5;
        let s = textureSampleLevel(color_texture, color_sampler, uv, 0.0) * in.texture_tint;
        color = mix(color, s.rgb, vec3<f32>(s.a));
        max_alpha = max(max_alpha, s.a);
    }

    if ((in.flags & RAD_GRADIENT) != 0u) {
        let p1 = in.rad_gradient.xy;
        let p2 = in.rad_gradient.zw;
        let t = distance(p1, in.pixel_pos) / max(distance(p1, p2), GRADIENT_EPSILON);
        let c = mix(in.rad_color1, in.rad_color2, vec4<f32>(t));
        color = mix(color, c.rgb, vec3<f32>(c.a));
        max_alpha = max(max_alpha, c.a);
    }

    if ((in.flags & LIN_GRADIENT) != 0u) {
        let p1 = in.lin_gradient.xy;
        let axis = in.lin_gradient.zw - p1;
        let len_sq = dot(axis, axis);
        var t = 0.0;
        if (len_sq > GRADIENT_EPSILON) {
            t = clamp(dot(in.pixel_pos - p1, axis) / len_sq, 0.0, 1.0);
        }
        let c = mix(in.lin_color1, in.lin_color2, vec4<f32>(t));
        color = mix(color, c.rgb, vec3<f32>(c.a));
        max_alpha = max(max_alpha, c.a);
    }

    color = mix(color, in.color.rgb, vec3<f32>(in.color.a));
    max_alpha = max(max_alpha, in.color.a);

    let coverage = edge_coverage(
        in.local_offset,
        in.size * 0.5,
        in.round.x,
        in.round.y,
        in.params.x,
        in.params.z,
    );
    if (coverage < 0.0) {
        discard;
    }
    max_alpha *= coverage;

    if (GAMMA != 1.0 || GAMMA_SCALE != 1.0) {
        color = pow(max(color, vec3<f32>(0.0)), vec3<f32>(GAMMA)) * GAMMA_SCALE;
    }

    return vec4<f32>(color, max_alpha * in.params.y);
}
"#
);

/// Glyph pipeline: flat color masked by the layered coverage atlas
pub const GLYPH_SHADER: &str = concat!(
    r#"
// ============================================================================
// Lustre Glyph Shader
// ============================================================================
"#,
    vertex_prelude!(),
    r#"
override ATLAS_SIDE: f32 = 2048.0;
// Layers beyond the bound atlas read as zero coverage
override ATLAS_LAYERS: u32 = 1u;

struct GlyphInstance {
    @location(0) position: vec2<f32>,
    @location(1) size: vec2<f32>,
    @location(2) color: vec4<f32>,
    // Atlas texel offset (xy) and layer (z)
    @location(3) uvd: vec3<f32>,
    @location(4) origin: vec2<f32>,
    @location(5) rotation: f32,
}

struct GlyphVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) @interpolate(flat) layer: u32,
    @location(2) @interpolate(flat) color: vec4<f32>,
}

@group(1) @binding(0) var atlas: texture_2d_array<f32>;
@group(1) @binding(1) var atlas_sampler: sampler;

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    instance: GlyphInstance,
) -> GlyphVarying {
    var out: GlyphVarying;

    let corner = quad_corner(vertex_index);
    let pixel = instance.position + corner * instance.size;
    // Rigid rotation about the run origin
    let rotated = instance.origin + rotate(pixel - instance.origin, instance.rotation);

    out.clip_position = vec4<f32>(pixel_to_ndc(rotated), 0.0, 1.0);
    out.uv = (instance.uvd.xy + corner * instance.size) / max(ATLAS_SIDE, 1.0);
    out.layer = u32(max(instance.uvd.z, 0.0));
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: GlyphVarying) -> @location(0) vec4<f32> {
    var coverage = 0.0;
    if (in.layer < ATLAS_LAYERS) {
        coverage = textureSampleLevel(atlas, atlas_sampler, in.uv, in.layer, 0.0).r;
    }
    return vec4<f32>(in.color.rgb, in.color.a * coverage);
}
"#
);

/// Mask pipeline: silhouette only, writes the stencil buffer
pub const MASK_SHADER: &str = concat!(
    r#"
// ============================================================================
// Lustre Mask Shader
// ============================================================================
"#,
    vertex_prelude!(),
    shape_instance!(),
    edge_functions!(),
    r#"
// Stencil is binary: softer fragments leave it untouched
const MASK_THRESHOLD: f32 = 0.5;

struct MaskVarying {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) local_offset: vec2<f32>,
    @location(1) @interpolate(flat) half_size: vec2<f32>,
    @location(2) @interpolate(flat) round: vec2<f32>,
}

@vertex
fn vs_main(
    @builtin(vertex_index) vertex_index: u32,
    instance: ShapeInstance,
) -> MaskVarying {
    var out: MaskVarying;

    // No shadow expansion: the mask is the exact silhouette
    let extent = max(instance.size, vec2<f32>(0.0));
    let local_offset = extent * (quad_corner(vertex_index) - 0.5);
    let pixel_pos = instance.position + rotate(local_offset, instance.rotation);

    out.clip_position = vec4<f32>(pixel_to_ndc(pixel_pos), 0.0, 1.0);
    out.local_offset = local_offset;
    out.half_size = extent * 0.5;
    out.round = instance.round;
    return out;
}

@fragment
fn fs_main(in: MaskVarying) -> @location(0) vec4<f32> {
    let coverage = edge_coverage(in.local_offset, in.half_size, in.round.x, in.round.y, 0.0, 1.0);
    if (coverage < MASK_THRESHOLD) {
        discard;
    }
    return vec4<f32>(0.0);
}
"#
);

/// Every shader with its label
pub const ALL_SHADERS: [(&str, &str); 3] = [
    ("shape", SHAPE_SHADER),
    ("glyph", GLYPH_SHADER),
    ("mask", MASK_SHADER),
];

/// Parse and validate a WGSL source with naga
pub fn validate(name: &str, source: &str) -> Result<naga::Module, RendererError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| RendererError::ShaderError {
        name: name.to_string(),
        message: e.emit_to_string(source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| RendererError::ShaderError {
        name: name.to_string(),
        message: e.to_string(),
    })?;

    tracing::debug!("validated {} shader", name);
    Ok(module)
}
