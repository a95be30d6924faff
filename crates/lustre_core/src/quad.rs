//! Quad generator
//!
//! Every pipeline draws instanced quads with no vertex buffer of its own: the
//! vertex index `0..6` is mapped to a corner of the unit square, forming the
//! triangles `(1,1) (1,0) (0,0)` and `(0,0) (0,1) (1,1)`.

use crate::geometry::Vec2;

/// Vertices drawn per instance
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// Unit-square corner in `{0, 1}²` for a vertex index
pub fn quad_corner(index: u32) -> Vec2 {
    let i = index % QUAD_VERTEX_COUNT;
    let x = (1 + i) % 6 < 3;
    let y = (2 + i) % 6 < 3;
    Vec2::new(x as u32 as f32, y as u32 as f32)
}

/// Corner offset from the quad center, in `{-0.5, +0.5}²`
pub fn quad_offset(index: u32) -> Vec2 {
    quad_corner(index) - Vec2::HALF
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross(a: Vec2, b: Vec2, c: Vec2) -> f32 {
        let ab = b - a;
        let ac = c - a;
        ab.x * ac.y - ab.y * ac.x
    }

    #[test]
    fn corner_sequence() {
        let corners: Vec<[f32; 2]> = (0..QUAD_VERTEX_COUNT)
            .map(|i| quad_corner(i).to_array())
            .collect();
        assert_eq!(
            corners,
            vec![
                [1.0, 1.0],
                [1.0, 0.0],
                [0.0, 0.0],
                [0.0, 0.0],
                [0.0, 1.0],
                [1.0, 1.0],
            ]
        );
    }

    #[test]
    fn covers_all_four_corners() {
        for corner in [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]] {
            assert!((0..QUAD_VERTEX_COUNT).any(|i| quad_corner(i).to_array() == corner));
        }
    }

    #[test]
    fn triangles_share_winding() {
        let v: Vec<Vec2> = (0..QUAD_VERTEX_COUNT).map(quad_corner).collect();
        let first = cross(v[0], v[1], v[2]);
        let second = cross(v[3], v[4], v[5]);
        assert!(first != 0.0 && second != 0.0);
        assert_eq!(first.signum(), second.signum());
    }

    #[test]
    fn offsets_are_centered() {
        for i in 0..QUAD_VERTEX_COUNT {
            let o = quad_offset(i);
            assert_eq!(o.abs(), Vec2::HALF);
        }
    }
}
