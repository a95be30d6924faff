//! Renderer configuration
//!
//! Defaults can be raised at startup through environment variables:
//!
//! - `LUSTRE_GPU_MAX_SHAPES=20000`
//! - `LUSTRE_GPU_MAX_GLYPHS=50000`
//! - `LUSTRE_GPU_ATLAS_SIDE=4096`
//! - `LUSTRE_GPU_GAMMA=2.2`
//!
//! Values are then clamped to what the device supports.

use lustre_core::{FlagLayout, GlyphInstance, ShapeInstance, ToneCurve};

/// Configuration for creating a renderer
#[derive(Clone, Debug)]
pub struct RendererConfig {
    /// Initial capacity of the shape instance buffer (grows on demand)
    pub max_shape_instances: usize,
    /// Initial capacity of the glyph instance buffer (grows on demand)
    pub max_glyph_instances: usize,
    /// Side length of each atlas layer in texels
    pub atlas_side: u32,
    /// Number of atlas layers
    pub atlas_layers: u32,
    /// Color target format (None = `Rgba8Unorm` offscreen)
    pub texture_format: Option<wgpu::TextureFormat>,
    /// Tone curve baked into the shape pipeline
    pub tone: ToneCurve,
    /// Paint flag bits baked into the shape pipeline
    pub flag_layout: FlagLayout,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_shape_instances: 4_096,  // ~700 KB
            max_glyph_instances: 16_384, // ~900 KB
            atlas_side: 2048,
            atlas_layers: 3,
            texture_format: None,
            tone: ToneCurve::IDENTITY,
            flag_layout: FlagLayout::default(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

fn parse_usize(value: Option<String>) -> Option<usize> {
    value.and_then(|v| v.trim().parse::<usize>().ok())
}

fn parse_f32(value: Option<String>) -> Option<f32> {
    value
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

impl RendererConfig {
    /// Resolved color target format
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture_format
            .unwrap_or(wgpu::TextureFormat::Rgba8Unorm)
    }

    /// Apply `LUSTRE_GPU_*` overrides from the process environment
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(env_var)
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = parse_usize(lookup("LUSTRE_GPU_MAX_SHAPES")) {
            self.max_shape_instances = v;
        }
        if let Some(v) = parse_usize(lookup("LUSTRE_GPU_MAX_GLYPHS")) {
            self.max_glyph_instances = v;
        }
        if let Some(v) = parse_usize(lookup("LUSTRE_GPU_ATLAS_SIDE")) {
            self.atlas_side = v.min(u32::MAX as usize) as u32;
        }
        if let Some(gamma) = parse_f32(lookup("LUSTRE_GPU_GAMMA")) {
            self.tone.gamma = gamma;
        }
        self
    }

    /// Clamp capacities and atlas dimensions to device limits
    pub fn clamped_to(mut self, limits: &wgpu::Limits) -> Self {
        let shape_cap = (limits.max_buffer_size / std::mem::size_of::<ShapeInstance>() as u64)
            .max(1) as usize;
        let glyph_cap = (limits.max_buffer_size / std::mem::size_of::<GlyphInstance>() as u64)
            .max(1) as usize;

        let shapes = self.max_shape_instances.clamp(1, shape_cap);
        if shapes != self.max_shape_instances {
            tracing::warn!(
                "max_shape_instances {} clamped to {}",
                self.max_shape_instances,
                shapes
            );
            self.max_shape_instances = shapes;
        }

        let glyphs = self.max_glyph_instances.clamp(1, glyph_cap);
        if glyphs != self.max_glyph_instances {
            tracing::warn!(
                "max_glyph_instances {} clamped to {}",
                self.max_glyph_instances,
                glyphs
            );
            self.max_glyph_instances = glyphs;
        }

        let side = self.atlas_side.clamp(1, limits.max_texture_dimension_2d);
        if side != self.atlas_side {
            tracing::warn!("atlas_side {} clamped to {}", self.atlas_side, side);
            self.atlas_side = side;
        }

        let layers = self.atlas_layers.clamp(1, limits.max_texture_array_layers);
        if layers != self.atlas_layers {
            tracing::warn!("atlas_layers {} clamped to {}", self.atlas_layers, layers);
            self.atlas_layers = layers;
        }

        self
    }
}

pub(crate) fn log_renderer_config(config: &RendererConfig) {
    tracing::info!(
        "gpu config: max_shape_instances={}, max_glyph_instances={}, atlas={}x{}x{}, format={:?}, gamma={}, gamma_scale={}",
        config.max_shape_instances,
        config.max_glyph_instances,
        config.atlas_side,
        config.atlas_side,
        config.atlas_layers,
        config.format(),
        config.tone.gamma,
        config.tone.scale
    );
}
