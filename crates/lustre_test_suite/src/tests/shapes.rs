//! Shape rendering tests
//!
//! Flat-colored rectangles: sharp, rounded, feathered, rotated and translucent.

use crate::runner::TestSuite;
use lustre_core::{Color, ShapeInstance};

/// Create the shapes test suite
pub fn suite() -> TestSuite {
    let mut suite = TestSuite::new("shapes");

    // Zero radius, zero shadow: exact axis-aligned rectangle
    suite.add("rect_sharp", |ctx| {
        ctx.shape(ShapeInstance::rect(40.0, 60.0, 120.0, 80.0).with_color(Color::BLUE));
        Ok(())
    });

    suite.add("rect_rounded", |ctx| {
        ctx.shape(
            ShapeInstance::rect(40.0, 40.0, 176.0, 120.0)
                .with_color(Color::RED)
                .with_corner_radius(24.0),
        );
        Ok(())
    });

    // Radius larger than the half extent collapses to a pill
    suite.add("rect_pill", |ctx| {
        ctx.shape(
            ShapeInstance::rect(32.0, 100.0, 192.0, 48.0)
                .with_color(Color::from_hex(0x2E7D32))
                .with_corner_radius(200.0),
        );
        Ok(())
    });

    suite.add("rect_feathered_corners", |ctx| {
        ctx.shape(
            ShapeInstance::rect(48.0, 48.0, 160.0, 160.0)
                .with_color(Color::from_hex(0x6A1B9A))
                .with_corner_radius(32.0)
                .with_corner_feather(6.0),
        );
        Ok(())
    });

    suite.add("rect_rotated", |ctx| {
        ctx.shape(
            ShapeInstance::centered(128.0, 128.0, 140.0, 70.0)
                .with_color(Color::from_hex(0xEF6C00))
                .with_corner_radius(12.0)
                .with_rotation(std::f32::consts::FRAC_PI_6),
        );
        Ok(())
    });

    // Overlapping translucent shapes blend in submission order
    suite.add("overlap_translucent", |ctx| {
        ctx.shapes(&[
            ShapeInstance::rect(32.0, 32.0, 128.0, 128.0).with_color(Color::RED),
            ShapeInstance::rect(96.0, 96.0, 128.0, 128.0)
                .with_color(Color::BLUE)
                .with_corner_radius(16.0)
                .with_alpha(0.5),
        ]);
        Ok(())
    });

    suite.add_sized("grid", 320, 192, |ctx| {
        let shapes: Vec<_> = (0..5)
            .flat_map(|col| {
                (0..3).map(move |row| {
                    let t = (col * 3 + row) as f32 / 14.0;
                    ShapeInstance::rect(16.0 + col as f32 * 60.0, 16.0 + row as f32 * 60.0, 48.0, 48.0)
                        .with_color(Color::rgb(t, 0.4, 1.0 - t))
                        .with_corner_radius(row as f32 * 8.0)
                })
            })
            .collect();
        ctx.set_clear_color(Color::from_hex(0x202020)).shapes(&shapes);
        Ok(())
    });

    suite
}
