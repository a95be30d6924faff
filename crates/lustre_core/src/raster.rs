//! CPU reference rasterizer
//!
//! Evaluates the same vertex and fragment math as the GPU pipelines at every
//! pixel center, with an 8-bit stencil plane for clipping and the standard
//! straight-alpha blend equation:
//!
//! ```text
//! rgb = src.rgb * src.a + dst.rgb * (1 - src.a)
//! a   = src.a           + dst.a   * (1 - src.a)
//! ```
//!
//! It is slow and exact; the visual test suite compares GPU output against it.

use tracing::trace;

use crate::atlas::CoverageSource;
use crate::compositor::{Fragment, ShapeFragment};
use crate::geometry::{Color, Vec2};
use crate::glyph::GlyphFragment;
use crate::instance::{FlagLayout, GlyphInstance, ShapeInstance};
use crate::mask::{mask_fragment, ClipError, ClipStack};
use crate::paint::ToneCurve;
use crate::quad::{quad_corner, QUAD_VERTEX_COUNT};
use crate::texture::TextureSource;
use crate::transform::{glyph_local, glyph_uv, shape_extent, shape_local, Expansion};

/// Straight-alpha float framebuffer with a stencil plane
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u32,
    height: u32,
    pixels: Vec<Color>,
    stencil: Vec<u8>,
    clips: ClipStack,
    tone: ToneCurve,
    flag_layout: FlagLayout,
}

/// Pixel bounds `[x0, x1) x [y0, y1)` covering a set of points
#[derive(Clone, Copy, Debug)]
struct Bounds {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Canvas {
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            pixels: vec![Color::TRANSPARENT; len],
            stencil: vec![0; len],
            clips: ClipStack::new(),
            tone: ToneCurve::IDENTITY,
            flag_layout: FlagLayout::default(),
        }
    }

    pub fn with_tone(mut self, tone: ToneCurve) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_flag_layout(mut self, layout: FlagLayout) -> Self {
        self.flag_layout = layout;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn clip_depth(&self) -> u32 {
        self.clips.depth()
    }

    /// Fill with `color` and reset the stencil and clip stack
    pub fn clear(&mut self, color: Color) {
        let color = clamp_unit(color);
        self.pixels.fill(color);
        self.stencil.fill(0);
        self.clips = ClipStack::new();
    }

    pub fn pixel(&self, x: u32, y: u32) -> Color {
        self.pixels[self.index(x, y)]
    }

    pub fn stencil(&self, x: u32, y: u32) -> u8 {
        self.stencil[self.index(x, y)]
    }

    /// Quantized RGBA8 bytes, row-major, tightly packed
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| c.to_rgba8()).collect()
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn bounds(&self, points: impl IntoIterator<Item = Vec2>) -> Option<Bounds> {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(p);
            max = max.max(p);
        }
        if !(min.x.is_finite() && min.y.is_finite() && max.x.is_finite() && max.y.is_finite()) {
            return None;
        }
        let clamp = |v: f32, hi: u32| v.clamp(0.0, hi as f32) as u32;
        let bounds = Bounds {
            x0: clamp(min.x.floor(), self.width),
            y0: clamp(min.y.floor(), self.height),
            x1: clamp(max.x.ceil(), self.width),
            y1: clamp(max.y.ceil(), self.height),
        };
        (bounds.x0 < bounds.x1 && bounds.y0 < bounds.y1).then_some(bounds)
    }

    fn blend(&mut self, x: u32, y: u32, src: Color) {
        let i = self.index(x, y);
        let src = clamp_unit(src);
        let dst = self.pixels[i];
        let inv = 1.0 - src.a;
        self.pixels[i] = Color::rgba(
            src.r * src.a + dst.r * inv,
            src.g * src.a + dst.g * inv,
            src.b * src.a + dst.b * inv,
            src.a + dst.a * inv,
        );
    }

    /// Rasterize shape instances in order, sampling `texture` for textured ones
    pub fn draw_shapes<T>(&mut self, shapes: &[ShapeInstance], texture: &T)
    where
        T: TextureSource + ?Sized,
    {
        let reference = self.clips.reference() as u8;
        let mut shaded = 0usize;

        for shape in shapes {
            let fragment = ShapeFragment::new(shape, &self.flag_layout);
            let half = shape_extent(shape, Expansion::Shadow) * 0.5;
            let Some(b) = self.bounds(quad_points(shape, half)) else {
                continue;
            };

            for y in b.y0..b.y1 {
                for x in b.x0..b.x1 {
                    let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let local = shape_local(shape, center);
                    if !inside_half_open(local, half) || self.stencil(x, y) != reference {
                        continue;
                    }
                    if let Fragment::Shaded(color) = fragment.shade(local, center, texture, &self.tone) {
                        self.blend(x, y, color);
                        shaded += 1;
                    }
                }
            }
        }

        trace!(shapes = shapes.len(), fragments = shaded, "canvas draw_shapes");
    }

    /// Rasterize glyph instances sampling a layered coverage atlas
    pub fn draw_glyphs<A>(&mut self, glyphs: &[GlyphInstance], atlas: &A, atlas_side: f32)
    where
        A: CoverageSource + ?Sized,
    {
        let reference = self.clips.reference() as u8;
        let mut shaded = 0usize;

        for glyph in glyphs {
            let fragment = GlyphFragment::new(glyph);
            let origin = Vec2::from(glyph.origin);
            let corners = (0..QUAD_VERTEX_COUNT).map(|i| {
                (Vec2::from(glyph.position) + quad_corner(i) * Vec2::from(glyph.size))
                    .rotate_about(origin, glyph.rotation)
            });
            let Some(b) = self.bounds(corners) else {
                continue;
            };

            for y in b.y0..b.y1 {
                for x in b.x0..b.x1 {
                    let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                    let local = glyph_local(glyph, center);
                    if !inside_half_open(local - Vec2::HALF, Vec2::HALF)
                        || self.stencil(x, y) != reference
                    {
                        continue;
                    }
                    let uv = glyph_uv(glyph, local, atlas_side);
                    let color = fragment.shade(uv, glyph.layer(), atlas);
                    self.blend(x, y, color);
                    shaded += 1;
                }
            }
        }

        trace!(glyphs = glyphs.len(), fragments = shaded, "canvas draw_glyphs");
    }

    /// Enter a clip shaped like `mask` (its paint and shadow are ignored)
    pub fn push_clip(&mut self, mask: &ShapeInstance) -> Result<(), ClipError> {
        let reference = self.clips.push()?;
        self.stamp_mask(mask, reference as u8, 1);
        Ok(())
    }

    /// Leave the innermost clip; `mask` must match the one pushed
    pub fn pop_clip(&mut self, mask: &ShapeInstance) -> Result<(), ClipError> {
        let reference = self.clips.pop()?;
        self.stamp_mask(mask, reference as u8, -1);
        Ok(())
    }

    fn stamp_mask(&mut self, mask: &ShapeInstance, reference: u8, step: i16) {
        let half = shape_extent(mask, Expansion::None) * 0.5;
        let Some(b) = self.bounds(quad_points(mask, half)) else {
            return;
        };
        let mut written = 0usize;

        for y in b.y0..b.y1 {
            for x in b.x0..b.x1 {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                let local = shape_local(mask, center);
                if !inside_half_open(local, half) {
                    continue;
                }
                let decision =
                    mask_fragment(local, half, mask.corner_radius, mask.corner_feather);
                let i = self.index(x, y);
                if decision.writes_stencil() && self.stencil[i] == reference {
                    self.stencil[i] = (self.stencil[i] as i16 + step).clamp(0, 255) as u8;
                    written += 1;
                }
            }
        }

        trace!(reference, step, texels = written, "canvas stencil mask");
    }
}

/// Rotated quad corners of a shape with the given half extent
fn quad_points(shape: &ShapeInstance, half: Vec2) -> impl Iterator<Item = Vec2> + '_ {
    (0..QUAD_VERTEX_COUNT).map(move |i| {
        let offset = (quad_corner(i) * 2.0 - Vec2::ONE) * half;
        shape.center() + offset.rotate(shape.rotation)
    })
}

/// Point-in-quad test with the top-left fill convention
fn inside_half_open(local: Vec2, half: Vec2) -> bool {
    local.x >= -half.x && local.x < half.x && local.y >= -half.y && local.y < half.y
}

fn clamp_unit(c: Color) -> Color {
    Color::rgba(
        c.r.clamp(0.0, 1.0),
        c.g.clamp(0.0, 1.0),
        c.b.clamp(0.0, 1.0),
        c.a.clamp(0.0, 1.0),
    )
}
