//! Lustre GPU Renderer
//!
//! wgpu pipelines for the Lustre compositing core.
//!
//! # Features
//!
//! - **Shapes**: Rounded, rotated, feathered rectangles with optional drop-shadow falloff
//! - **Paint layers**: Solid color, texture, linear and radial gradients
//! - **Glyphs**: Tinted coverage masks sampled from a layered atlas
//! - **Clipping**: Nested stencil masks pushed and popped in draw order

pub mod config;
pub mod draw;
pub mod layout;
pub mod pipelines;
pub mod renderer;
pub mod shaders;

pub use config::RendererConfig;
pub use draw::{DrawCommand, DrawList, TextureId};
pub use layout::{GLYPH_INSTANCE_LAYOUT, SHAPE_INSTANCE_LAYOUT};
pub use pipelines::STENCIL_FORMAT;
pub use renderer::{GpuRenderer, RendererError};
pub use shaders::{GLYPH_SHADER, MASK_SHADER, SHAPE_SHADER};
