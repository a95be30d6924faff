//! Layered glyph coverage atlas
//!
//! The atlas is a square `side x side` single-channel image with several
//! layers. It is populated by an external glyph rasterizer and packer; the
//! compositor only reads it.

use thiserror::Error;

use crate::geometry::Vec2;
use crate::texture::nearest;

/// Errors raised while building or updating the coverage atlas
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    #[error("image data has {actual} bytes, expected {expected}")]
    DataLength { expected: usize, actual: usize },

    #[error("layer {layer} out of range (atlas has {layers} layers)")]
    LayerOutOfRange { layer: u32, layers: u32 },

    #[error("region {width}x{height} at ({x}, {y}) does not fit in a {side}x{side} layer")]
    RegionOutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        side: u32,
    },
}

/// Single-channel coverage addressed by normalized coordinate and layer
pub trait CoverageSource {
    /// Coverage in `[0, 1]`; out-of-range layers read as 0
    fn coverage(&self, uv: Vec2, layer: u32) -> f32;
}

/// In-memory layered coverage atlas (R8, nearest, clamp-to-edge)
#[derive(Clone, Debug)]
pub struct MaskAtlas {
    side: u32,
    layers: u32,
    data: Vec<u8>,
}

impl MaskAtlas {
    /// Empty (zero coverage) atlas
    pub fn new(side: u32, layers: u32) -> Self {
        Self {
            side,
            layers,
            data: vec![0; Self::layer_len(side) * layers as usize],
        }
    }

    /// Build an atlas from per-layer R8 data, each `side * side` bytes
    pub fn from_layers(side: u32, layers: &[&[u8]]) -> Result<Self, AtlasError> {
        let expected = Self::layer_len(side);
        let mut data = Vec::with_capacity(expected * layers.len());
        for layer in layers {
            if layer.len() != expected {
                return Err(AtlasError::DataLength {
                    expected,
                    actual: layer.len(),
                });
            }
            data.extend_from_slice(layer);
        }
        Ok(Self {
            side,
            layers: layers.len() as u32,
            data,
        })
    }

    fn layer_len(side: u32) -> usize {
        side as usize * side as usize
    }

    pub fn side(&self) -> u32 {
        self.side
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Raw bytes of one layer, for GPU upload
    pub fn layer_data(&self, layer: u32) -> Option<&[u8]> {
        if layer >= self.layers {
            return None;
        }
        let len = Self::layer_len(self.side);
        let start = layer as usize * len;
        Some(&self.data[start..start + len])
    }

    /// Copy a `width x height` block of coverage into `layer` at `(x, y)`
    pub fn write_region(
        &mut self,
        layer: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        coverage: &[u8],
    ) -> Result<(), AtlasError> {
        if layer >= self.layers {
            return Err(AtlasError::LayerOutOfRange {
                layer,
                layers: self.layers,
            });
        }
        let fits_x = x.checked_add(width).is_some_and(|r| r <= self.side);
        let fits_y = y.checked_add(height).is_some_and(|b| b <= self.side);
        if !fits_x || !fits_y {
            return Err(AtlasError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                side: self.side,
            });
        }
        let expected = width as usize * height as usize;
        if coverage.len() != expected {
            return Err(AtlasError::DataLength {
                expected,
                actual: coverage.len(),
            });
        }

        let base = layer as usize * Self::layer_len(self.side);
        for row in 0..height as usize {
            let dst = base + (y as usize + row) * self.side as usize + x as usize;
            let src = row * width as usize;
            self.data[dst..dst + width as usize]
                .copy_from_slice(&coverage[src..src + width as usize]);
        }
        Ok(())
    }

    pub fn texel(&self, layer: u32, x: u32, y: u32) -> u8 {
        let base = layer as usize * Self::layer_len(self.side);
        self.data[base + y as usize * self.side as usize + x as usize]
    }
}

impl CoverageSource for MaskAtlas {
    fn coverage(&self, uv: Vec2, layer: u32) -> f32 {
        if layer >= self.layers || self.side == 0 {
            return 0.0;
        }
        let x = nearest(uv.x, self.side);
        let y = nearest(uv.y, self.side);
        self.texel(layer, x, y) as f32 / 255.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_layers_validates_length() {
        let good = vec![0u8; 16];
        let bad = vec![0u8; 15];
        assert!(MaskAtlas::from_layers(4, &[&good, &good]).is_ok());
        assert_eq!(
            MaskAtlas::from_layers(4, &[&good, &bad]).unwrap_err(),
            AtlasError::DataLength {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn write_region_and_sample() {
        let mut atlas = MaskAtlas::new(4, 2);
        atlas.write_region(1, 2, 0, 2, 2, &[255; 4]).unwrap();
        assert_eq!(atlas.coverage(Vec2::new(0.6, 0.1), 1), 1.0);
        assert_eq!(atlas.coverage(Vec2::new(0.6, 0.1), 0), 0.0);
        assert_eq!(atlas.coverage(Vec2::new(0.1, 0.1), 1), 0.0);
        assert_eq!(atlas.layer_data(1).map(|d| d[2]), Some(255));
    }

    #[test]
    fn write_region_bounds() {
        let mut atlas = MaskAtlas::new(4, 1);
        assert!(matches!(
            atlas.write_region(0, 3, 0, 2, 1, &[0; 2]),
            Err(AtlasError::RegionOutOfBounds { .. })
        ));
        assert!(matches!(
            atlas.write_region(1, 0, 0, 1, 1, &[0]),
            Err(AtlasError::LayerOutOfRange { .. })
        ));
    }

    #[test]
    fn missing_layer_reads_zero() {
        let atlas = MaskAtlas::from_layers(2, &[&[255; 4]]).unwrap();
        assert_eq!(atlas.coverage(Vec2::HALF, 0), 1.0);
        assert_eq!(atlas.coverage(Vec2::HALF, 5), 0.0);
    }
}
