//! Color texture sources for the shape texture layer

use thiserror::Error;

use crate::geometry::{Color, Vec2};

/// Errors raised while building a color texture
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("{width}x{height} texture needs {expected} bytes of RGBA8 data, got {actual}")]
    DataLength {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// A 2-D color texture addressed by normalized coordinates
pub trait TextureSource {
    /// Straight-alpha color at `uv`
    fn sample(&self, uv: Vec2) -> Color;
}

/// Solid color everywhere
impl TextureSource for Color {
    fn sample(&self, _uv: Vec2) -> Color {
        *self
    }
}

/// The 1x1 transparent placeholder bound when a draw has no texture
#[derive(Clone, Copy, Debug, Default)]
pub struct Transparent;

impl TextureSource for Transparent {
    fn sample(&self, _uv: Vec2) -> Color {
        Color::TRANSPARENT
    }
}

/// Straight RGBA8 image, nearest filtering with clamp-to-edge addressing
#[derive(Clone, Debug)]
pub struct RgbaImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl RgbaImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(TextureError::DataLength {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Image filled with one color
    pub fn filled(width: u32, height: u32, color: Color) -> Self {
        let texel = color.to_rgba8();
        let pixels = texel
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn texel(&self, x: u32, y: u32) -> Color {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        let c = |k: usize| self.pixels[i + k] as f32 / 255.0;
        Color::rgba(c(0), c(1), c(2), c(3))
    }
}

impl TextureSource for RgbaImage {
    fn sample(&self, uv: Vec2) -> Color {
        if self.width == 0 || self.height == 0 {
            return Color::TRANSPARENT;
        }
        let x = nearest(uv.x, self.width);
        let y = nearest(uv.y, self.height);
        self.texel(x, y)
    }
}

/// Nearest texel index for a normalized coordinate, clamped to the edge
pub(crate) fn nearest(coord: f32, extent: u32) -> u32 {
    let scaled = (coord * extent as f32).floor();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(0.0, (extent - 1) as f32) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearest_clamps_to_edge() {
        assert_eq!(nearest(-0.5, 4), 0);
        assert_eq!(nearest(0.0, 4), 0);
        assert_eq!(nearest(0.3, 4), 1);
        assert_eq!(nearest(1.0, 4), 3);
        assert_eq!(nearest(7.0, 4), 3);
    }

    #[test]
    fn image_rejects_bad_length() {
        let err = RgbaImage::new(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            TextureError::DataLength {
                width: 2,
                height: 2,
                expected: 16,
                actual: 15
            }
        );
        assert_eq!(
            err.to_string(),
            "2x2 texture needs 16 bytes of RGBA8 data, got 15"
        );
        assert!(RgbaImage::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn image_sampling() {
        let mut pixels = vec![0u8; 2 * 1 * 4];
        pixels[4..8].copy_from_slice(&[255, 0, 0, 255]);
        let image = RgbaImage::new(2, 1, pixels).unwrap();
        assert_eq!(image.sample(Vec2::new(0.25, 0.5)), Color::TRANSPARENT);
        assert_eq!(image.sample(Vec2::new(0.75, 0.5)), Color::RED);
    }

    #[test]
    fn placeholder_is_transparent() {
        assert_eq!(Transparent.sample(Vec2::HALF).a, 0.0);
    }
}
