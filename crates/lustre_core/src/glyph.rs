//! Glyph compositor
//!
//! A glyph is a flat color masked by one texel of the layered coverage atlas.

use crate::atlas::CoverageSource;
use crate::geometry::{Color, Vec2};
use crate::instance::GlyphInstance;

/// Flat values of one glyph instance
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphFragment {
    color: Color,
}

impl GlyphFragment {
    pub fn new(instance: &GlyphInstance) -> Self {
        Self {
            color: instance.color.into(),
        }
    }

    /// `(color.rgb, color.a * coverage(uv, layer))`
    pub fn shade<A>(&self, uv: Vec2, layer: u32, atlas: &A) -> Color
    where
        A: CoverageSource + ?Sized,
    {
        let coverage = atlas.coverage(uv, layer);
        self.color.with_alpha(self.color.a * coverage)
    }
}
