//! End-to-end properties of the vertex and fragment stages

use lustre_core::transform::shape_local;
use lustre_core::{
    edge_excess, mask_fragment, quad_offset, shape_vertex, Canvas, Color, Edge, Expansion,
    FlagLayout, Fragment, GlyphFragment, GlyphInstance, MaskAtlas, ScreenUniform, ShapeFragment,
    ShapeInstance, ToneCurve, Transparent, Vec2, QUAD_VERTEX_COUNT,
};

fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-4
}

fn shade(shape: &ShapeInstance, local: Vec2, pixel: Vec2) -> Fragment {
    ShapeFragment::new(shape, &FlagLayout::default()).shade(local, pixel, &Transparent, &ToneCurve::IDENTITY)
}

#[test]
fn vertices_land_on_expanded_quad_corners() {
    let screen = ScreenUniform::new(200.0, 100.0);
    let shape = ShapeInstance::centered(100.0, 50.0, 40.0, 20.0).with_shadow(5.0, 0.5);
    for i in 0..QUAD_VERTEX_COUNT {
        let v = shape_vertex(&shape, i, &screen, Expansion::Shadow);
        assert_eq!(v.local_offset.abs(), Vec2::new(25.0, 15.0));
        assert_eq!(v.local_offset, quad_offset(i) * Vec2::new(50.0, 30.0));
    }
}

#[test]
fn rotated_vertex_inverts_to_local_offset() {
    let screen = ScreenUniform::new(200.0, 200.0);
    let shape = ShapeInstance::centered(80.0, 120.0, 30.0, 60.0).with_rotation(0.7);
    for i in 0..QUAD_VERTEX_COUNT {
        let v = shape_vertex(&shape, i, &screen, Expansion::Shadow);
        let back = shape_local(&shape, v.pixel_pos);
        assert!(approx_eq(back.x, v.local_offset.x));
        assert!(approx_eq(back.y, v.local_offset.y));
    }
}

#[test]
fn linear_gradient_runs_p1_to_p2_in_screen_space() {
    let shape = ShapeInstance::rect(0.0, 0.0, 100.0, 10.0)
        .with_color(Color::TRANSPARENT)
        .with_linear_gradient(Vec2::new(0.0, 5.0), Vec2::new(100.0, 5.0), Color::RED, Color::BLUE);

    let at = |x: f32| {
        let pixel = Vec2::new(x, 5.0);
        shade(&shape, pixel - shape.center(), pixel).color().unwrap()
    };
    assert_eq!(at(0.0), Color::RED);
    assert_eq!(at(100.0), Color::BLUE);
    let mid = at(50.0);
    assert!(approx_eq(mid.r, 0.5) && approx_eq(mid.b, 0.5));
}

#[test]
fn radial_gradient_extrapolates() {
    let shape = ShapeInstance::rect(0.0, 0.0, 100.0, 100.0)
        .with_color(Color::TRANSPARENT)
        .with_radial_gradient(
            Vec2::new(50.0, 50.0),
            Vec2::new(60.0, 50.0),
            Color::rgb(0.0, 0.0, 0.0),
            Color::rgb(0.1, 0.0, 0.0),
        );
    let at = |p: Vec2| shade(&shape, p - shape.center(), p).color().unwrap();
    assert!(approx_eq(at(Vec2::new(50.0, 50.0)).r, 0.0));
    assert!(approx_eq(at(Vec2::new(50.0, 60.0)).r, 0.1));
    assert!(approx_eq(at(Vec2::new(80.0, 50.0)).r, 0.3));
}

#[test]
fn opaque_texture_hides_flat_color_alpha() {
    let shape = ShapeInstance::rect(0.0, 0.0, 10.0, 10.0)
        .with_texture(Color::WHITE)
        .with_color(Color::GREEN.with_alpha(0.2));
    let frag = ShapeFragment::new(&shape, &FlagLayout::default());
    let c = frag
        .shade(Vec2::ZERO, shape.center(), &Color::RED, &ToneCurve::IDENTITY)
        .color()
        .unwrap();
    assert_eq!(c.a, 1.0);
    assert!(approx_eq(c.r, 0.8) && approx_eq(c.g, 0.2));
}

#[test]
fn shadow_alpha_only_touches_penumbra() {
    let shape = ShapeInstance::rect(10.0, 10.0, 20.0, 20.0)
        .with_color(Color::BLACK)
        .with_corner_radius(5.0)
        .with_shadow(8.0, 0.5);
    let inside = shade(&shape, Vec2::new(10.0, 0.0), Vec2::ZERO).color().unwrap();
    assert_eq!(inside.a, 1.0);

    let penumbra = shade(&shape, Vec2::new(14.0, 0.0), Vec2::ZERO).color().unwrap();
    assert!(approx_eq(penumbra.a, 0.5 * 0.5));

    assert!(shade(&shape, Vec2::new(18.0, 0.0), Vec2::ZERO).is_discarded());
}

#[test]
fn instance_alpha_applies_once() {
    let shape = ShapeInstance::rect(0.0, 0.0, 20.0, 20.0)
        .with_color(Color::WHITE)
        .with_shadow(10.0, 0.5)
        .with_alpha(0.5);
    let penumbra = shade(&shape, Vec2::new(15.0, 0.0), Vec2::ZERO).color().unwrap();
    assert!(approx_eq(penumbra.a, 0.5 * 0.5 * 0.5));
}

#[test]
fn mask_agrees_with_shape_silhouette() {
    let shape = ShapeInstance::rect(0.0, 0.0, 40.0, 24.0)
        .with_corner_radius(7.0)
        .with_corner_feather(1.5);
    let edge = Edge::from_instance(&shape);
    let mut samples = 0;
    for yi in -15..=15 {
        for xi in -25..=25 {
            let local = Vec2::new(xi as f32 * 0.83, yi as f32 * 0.83);
            let shape_kept = edge.coverage(local);
            let mask = mask_fragment(local, shape.half_size(), 7.0, 1.5);
            match (shape_kept, mask) {
                (Some(a), lustre_core::MaskDecision::Keep { coverage }) => assert_eq!(a, coverage),
                (None, lustre_core::MaskDecision::Discard) => {}
                other => panic!("silhouette mismatch at {local:?}: {other:?}"),
            }
            samples += 1;
        }
    }
    assert!(samples > 1000);
}

#[test]
fn sharp_rect_has_no_antialiasing_band() {
    let half = Vec2::new(12.0, 8.0);
    assert!(edge_excess(Vec2::new(11.999, 7.999), half, 0.0) <= 0.0);
    let edge = Edge::silhouette(half, 0.0, 0.0);
    assert_eq!(edge.coverage(Vec2::new(11.999, 7.999)), Some(1.0));
    assert_eq!(edge.coverage(Vec2::new(12.001, 0.0)), None);
}

#[test]
fn glyph_alpha_tracks_coverage() {
    let mut atlas = MaskAtlas::new(8, 3);
    atlas.write_region(2, 0, 0, 4, 4, &[255; 16]).unwrap();
    let glyph = GlyphInstance::new(0.0, 0.0, 4.0, 4.0, 0.0, 0.0, 2).with_color(Color::BLUE.with_alpha(0.6));
    let frag = GlyphFragment::new(&glyph);
    assert_eq!(frag.shade(Vec2::new(0.1, 0.1), 2, &atlas).a, 0.6);
    assert_eq!(frag.shade(Vec2::new(0.9, 0.9), 2, &atlas).a, 0.0);

    let mut canvas = Canvas::new(8, 8);
    canvas.draw_glyphs(&[glyph], &atlas, 8.0);
    assert!(approx_eq(canvas.pixel(1, 1).a, 0.6));
    assert_eq!(canvas.pixel(5, 5), Color::TRANSPARENT);
}

#[test]
fn nested_clips_intersect() {
    let mut canvas = Canvas::new(12, 12);
    let left = ShapeInstance::rect(0.0, 0.0, 8.0, 12.0);
    let top = ShapeInstance::rect(0.0, 0.0, 12.0, 8.0);
    canvas.push_clip(&left).unwrap();
    canvas.push_clip(&top).unwrap();
    canvas.draw_shapes(&[ShapeInstance::rect(0.0, 0.0, 12.0, 12.0).with_color(Color::RED)], &Transparent);
    canvas.pop_clip(&top).unwrap();
    canvas.pop_clip(&left).unwrap();

    assert_eq!(canvas.pixel(2, 2), Color::RED);
    assert_eq!(canvas.pixel(10, 2), Color::TRANSPARENT);
    assert_eq!(canvas.pixel(2, 10), Color::TRANSPARENT);
    assert_eq!(canvas.clip_depth(), 0);
    for y in 0..12 {
        for x in 0..12 {
            assert_eq!(canvas.stencil(x, y), 0);
        }
    }
}
