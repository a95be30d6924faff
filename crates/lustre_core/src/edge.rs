//! Rounded-rectangle edge coverage
//!
//! Closed-form distance math shared by the shape compositor and the mask
//! pipeline. Distances are measured in the unrotated instance frame from the
//! center, so the result is independent of rotation and output resolution.

use crate::geometry::Vec2;
use crate::instance::ShapeInstance;

/// How far `local` lies outside the rounded rectangle, in pixels.
///
/// Values `<= 0` are inside the solid shape. Inside a corner region the
/// distance to the corner arc is used; elsewhere the distance to the nearest
/// straight edge. `radius` saturates at the smaller half extent.
pub fn edge_excess(local: Vec2, half_size: Vec2, radius: f32) -> f32 {
    measure(local, half_size, radius).0
}

/// Excess plus whether `local` falls in a corner region
fn measure(local: Vec2, half_size: Vec2, radius: f32) -> (f32, bool) {
    let d = local.abs();
    let h = half_size.max(Vec2::ZERO);
    let r = radius.clamp(0.0, h.x.min(h.y));
    let inner = h - Vec2::splat(r);

    if d.x > inner.x && d.y > inner.y {
        ((d - inner).length() - r, true)
    } else {
        ((d.x - h.x).max(d.y - h.y), false)
    }
}

/// Flat per-instance edge parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub half_size: Vec2,
    pub radius: f32,
    pub feather: f32,
    pub shadow: f32,
    pub shadow_alpha: f32,
}

impl Edge {
    pub fn from_instance(instance: &ShapeInstance) -> Self {
        Self {
            half_size: instance.half_size().abs(),
            radius: instance.corner_radius,
            feather: instance.corner_feather,
            shadow: instance.shadow,
            shadow_alpha: instance.shadow_alpha,
        }
    }

    /// Solid silhouette only: no shadow penumbra
    pub fn silhouette(half_size: Vec2, radius: f32, feather: f32) -> Self {
        Self {
            half_size,
            radius,
            feather,
            shadow: 0.0,
            shadow_alpha: 1.0,
        }
    }

    pub fn excess(&self, local: Vec2) -> f32 {
        edge_excess(local, self.half_size, self.radius)
    }

    /// Coverage multiplier at `local`, or `None` when the fragment is discarded.
    ///
    /// Without a shadow only the corner arcs are feathered; straight edges
    /// stay hard.
    pub fn coverage(&self, local: Vec2) -> Option<f32> {
        let (excess, in_corner) = measure(local, self.half_size, self.radius);
        if excess <= 0.0 {
            return Some(1.0);
        }

        if self.shadow > 0.0 {
            let falloff = (1.0 - excess / self.shadow).clamp(0.0, 1.0);
            if falloff <= 0.0 {
                None
            } else if falloff < 1.0 {
                Some(falloff * self.shadow_alpha)
            } else {
                Some(falloff)
            }
        } else if in_corner && self.feather > 0.0 {
            let soft = (1.0 - excess / self.feather).clamp(0.0, 1.0);
            (soft > 0.0).then_some(soft)
        } else {
            None
        }
    }
}
