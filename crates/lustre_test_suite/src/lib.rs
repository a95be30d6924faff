//! Lustre Visual Test Suite
//!
//! Renders scenes headless on the GPU, replays the same draw list on the CPU
//! reference rasterizer and compares the two images.
//!
//! # Test Categories
//!
//! - **shapes**: rounded, rotated and feathered rectangles
//! - **gradients**: linear and radial fills
//! - **shadows**: drop-shadow falloff
//! - **textures**: tinted texture layers
//! - **glyphs**: atlas-sampled coverage masks
//! - **clipping**: nested stencil clips

pub mod harness;
pub mod runner;
pub mod tests;

pub use harness::{TestContext, TestHarness, TestResult};
pub use runner::TestRunner;
