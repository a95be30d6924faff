//! Shape fragment compositor
//!
//! Layers the paint stack of one instance into a single straight-alpha color,
//! then applies the rounded-corner clip, shadow falloff, tone curve and the
//! instance alpha. Each layer blends as
//!
//! ```text
//! color     = mix(color, layer.rgb, layer.a)
//! max_alpha = max(max_alpha, layer.a)
//! ```
//!
//! so the output opacity is that of the most opaque layer, not an
//! alpha-over accumulation.

use crate::edge::Edge;
use crate::geometry::{Color, Vec2};
use crate::instance::{FlagLayout, ShapeInstance};
use crate::paint::{paint_stack, PaintLayer, PaintStack, ToneCurve, GRADIENT_EPSILON};
use crate::texture::TextureSource;

/// Result of shading one fragment
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Fragment {
    Shaded(Color),
    Discarded,
}

impl Fragment {
    pub fn color(&self) -> Option<Color> {
        match self {
            Fragment::Shaded(c) => Some(*c),
            Fragment::Discarded => None,
        }
    }

    pub fn is_discarded(&self) -> bool {
        matches!(self, Fragment::Discarded)
    }
}

/// Flat values of one shape instance, computed once and shared by every
/// fragment of its quad
#[derive(Clone, Debug)]
pub struct ShapeFragment {
    paint: PaintStack,
    size: Vec2,
    edge: Edge,
    alpha: f32,
}

impl ShapeFragment {
    pub fn new(instance: &ShapeInstance, layout: &FlagLayout) -> Self {
        Self {
            paint: paint_stack(instance, layout),
            size: Vec2::from(instance.size).abs(),
            edge: Edge::from_instance(instance),
            alpha: instance.alpha,
        }
    }

    pub fn paint(&self) -> &[PaintLayer] {
        &self.paint
    }

    pub fn edge(&self) -> &Edge {
        &self.edge
    }

    /// Texture coordinate for an offset from the instance center
    pub fn texture_uv(&self, local_offset: Vec2) -> Vec2 {
        local_offset / self.size.max(Vec2::splat(GRADIENT_EPSILON)) + Vec2::HALF
    }

    /// Composite the paint layers and coverage at one fragment
    pub fn shade<T>(
        &self,
        local_offset: Vec2,
        pixel_pos: Vec2,
        texture: &T,
        tone: &ToneCurve,
    ) -> Fragment
    where
        T: TextureSource + ?Sized,
    {
        let mut color = Color::BLACK;
        let mut max_alpha = 0.0f32;

        for layer in &self.paint {
            let src = match layer {
                PaintLayer::Texture { tint } => texture
                    .sample(self.texture_uv(local_offset))
                    .modulate(*tint),
                PaintLayer::RadialGradient(g) => g.color_at(g.radial_factor(pixel_pos)),
                PaintLayer::LinearGradient(g) => g.color_at(g.linear_factor(pixel_pos)),
                PaintLayer::Flat(c) => *c,
            };
            color = Color::mix(color, src.with_alpha(1.0), src.a);
            max_alpha = max_alpha.max(src.a);
        }

        let Some(coverage) = self.edge.coverage(local_offset) else {
            return Fragment::Discarded;
        };
        max_alpha *= coverage;

        let color = tone.apply(color);
        Fragment::Shaded(Color::rgba(color.r, color.g, color.b, max_alpha * self.alpha))
    }
}
