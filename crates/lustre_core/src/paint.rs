//! Paint layers
//!
//! A shape's flags are resolved once per instance into an ordered list of
//! paint layers. Each layer yields a straight-alpha color per fragment that the
//! compositor folds into the running `(color, max_alpha)` pair.

use smallvec::SmallVec;

use crate::geometry::{Color, Vec2};
use crate::instance::{FlagLayout, ShapeInstance};

/// Guard for gradient denominators
pub const GRADIENT_EPSILON: f32 = 1e-4;

/// Two-point gradient in screen-space pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Gradient {
    pub p1: Vec2,
    pub p2: Vec2,
    pub c1: Color,
    pub c2: Color,
}

impl Gradient {
    pub fn from_packed(points: [f32; 4], c1: [f32; 4], c2: [f32; 4]) -> Self {
        Self {
            p1: Vec2::new(points[0], points[1]),
            p2: Vec2::new(points[2], points[3]),
            c1: c1.into(),
            c2: c2.into(),
        }
    }

    /// Projection of `p` onto the `p1 -> p2` axis, clamped to `[0, 1]`.
    /// Coincident endpoints give 0.
    pub fn linear_factor(&self, p: Vec2) -> f32 {
        let axis = self.p2 - self.p1;
        let len_sq = axis.dot(axis);
        if len_sq <= GRADIENT_EPSILON {
            return 0.0;
        }
        ((p - self.p1).dot(axis) / len_sq).clamp(0.0, 1.0)
    }

    /// Distance from the center `p1` in units of `|p2 - p1|`. Unclamped, so
    /// the colors extrapolate beyond `p2`.
    pub fn radial_factor(&self, p: Vec2) -> f32 {
        let radius = self.p1.distance(self.p2).max(GRADIENT_EPSILON);
        self.p1.distance(p) / radius
    }

    pub fn color_at(&self, t: f32) -> Color {
        Color::mix(self.c1, self.c2, t)
    }
}

/// One source in the paint stack
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PaintLayer {
    /// Bound texture sampled in the instance frame, multiplied by `tint`
    Texture { tint: Color },
    RadialGradient(Gradient),
    LinearGradient(Gradient),
    Flat(Color),
}

/// Ordered paint layers: texture, radial, linear, flat
pub type PaintStack = SmallVec<[PaintLayer; 4]>;

/// Resolve the instance flags into its paint stack. The flat color is always
/// present and always last.
pub fn paint_stack(instance: &ShapeInstance, layout: &FlagLayout) -> PaintStack {
    let mut stack = PaintStack::new();
    if layout.has_texture(instance.flags) {
        stack.push(PaintLayer::Texture {
            tint: instance.texture_tint.into(),
        });
    }
    if layout.has_rad_gradient(instance.flags) {
        stack.push(PaintLayer::RadialGradient(Gradient::from_packed(
            instance.rad_gradient,
            instance.rad_color1,
            instance.rad_color2,
        )));
    }
    if layout.has_lin_gradient(instance.flags) {
        stack.push(PaintLayer::LinearGradient(Gradient::from_packed(
            instance.lin_gradient,
            instance.lin_color1,
            instance.lin_color2,
        )));
    }
    stack.push(PaintLayer::Flat(instance.color.into()));
    stack
}

/// Optional power curve applied to the composited color
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ToneCurve {
    pub gamma: f32,
    pub scale: f32,
}

impl ToneCurve {
    pub const IDENTITY: ToneCurve = ToneCurve {
        gamma: 1.0,
        scale: 1.0,
    };

    pub fn new(gamma: f32, scale: f32) -> Self {
        Self { gamma, scale }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }

    /// `pow(rgb, gamma) * scale`, alpha untouched
    pub fn apply(&self, color: Color) -> Color {
        if self.is_identity() {
            return color;
        }
        let f = |c: f32| c.max(0.0).powf(self.gamma) * self.scale;
        Color::rgba(f(color.r), f(color.g), f(color.b), color.a)
    }
}

impl Default for ToneCurve {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::PaintFlags;

    fn horizontal() -> Gradient {
        Gradient {
            p1: Vec2::new(10.0, 0.0),
            p2: Vec2::new(30.0, 0.0),
            c1: Color::RED,
            c2: Color::BLUE,
        }
    }

    #[test]
    fn linear_endpoints_and_clamp() {
        let g = horizontal();
        assert_eq!(g.linear_factor(Vec2::new(10.0, 5.0)), 0.0);
        assert_eq!(g.linear_factor(Vec2::new(30.0, -5.0)), 1.0);
        assert_eq!(g.linear_factor(Vec2::new(20.0, 0.0)), 0.5);
        assert_eq!(g.linear_factor(Vec2::new(-100.0, 0.0)), 0.0);
        assert_eq!(g.linear_factor(Vec2::new(100.0, 0.0)), 1.0);
    }

    #[test]
    fn linear_degenerate_is_zero() {
        let mut g = horizontal();
        g.p2 = g.p1;
        assert_eq!(g.linear_factor(Vec2::new(50.0, 50.0)), 0.0);
    }

    #[test]
    fn radial_is_unclamped() {
        let g = horizontal();
        assert_eq!(g.radial_factor(g.p1), 0.0);
        assert_eq!(g.radial_factor(Vec2::new(10.0, 20.0)), 1.0);
        assert_eq!(g.radial_factor(Vec2::new(50.0, 0.0)), 2.0);
    }

    #[test]
    fn stack_order() {
        let shape = ShapeInstance::default()
            .with_linear_gradient(Vec2::ZERO, Vec2::ONE, Color::RED, Color::BLUE)
            .with_texture(Color::WHITE)
            .with_radial_gradient(Vec2::ZERO, Vec2::ONE, Color::RED, Color::BLUE);
        let stack = paint_stack(&shape, &FlagLayout::default());
        assert_eq!(stack.len(), 4);
        assert!(matches!(stack[0], PaintLayer::Texture { .. }));
        assert!(matches!(stack[1], PaintLayer::RadialGradient(_)));
        assert!(matches!(stack[2], PaintLayer::LinearGradient(_)));
        assert!(matches!(stack[3], PaintLayer::Flat(_)));
        assert!(!stack.spilled());
    }

    #[test]
    fn custom_flag_layout() {
        let layout = FlagLayout {
            texture: 1 << 4,
            lin_gradient: 1 << 5,
            rad_gradient: 1 << 6,
        };
        let shape = ShapeInstance::default().with_flags(PaintFlags(1 << 5));
        let stack = paint_stack(&shape, &layout);
        assert_eq!(stack.len(), 2);
        assert!(matches!(stack[0], PaintLayer::LinearGradient(_)));
    }

    #[test]
    fn tone_curve() {
        let c = Color::rgba(0.5, 0.25, 1.0, 0.4);
        assert_eq!(ToneCurve::IDENTITY.apply(c), c);
        let toned = ToneCurve::new(2.0, 2.0).apply(c);
        assert_eq!(toned, Color::rgba(0.5, 0.125, 2.0, 0.4));
    }
}
