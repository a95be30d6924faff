//! Visual test cases organized by category

pub mod shapes;

use crate::runner::TestSuite;

/// Create all test suites
pub fn all_suites() -> Vec<TestSuite> {
    vec![
        shapes::suite(),
        gradients::suite(),
        shadows::suite(),
        textures::suite(),
        glyphs::suite(),
        clipping::suite(),
    ]
}
