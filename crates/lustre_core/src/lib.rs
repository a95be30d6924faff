//! Lustre compositing core
//!
//! The data contract and per-vertex / per-fragment math of the Lustre
//! rendering pipelines, as plain Rust. The WGSL shaders in `lustre_gpu` run
//! the same algorithms; this crate is the reference they are tested against.
//!
//! # Pipeline
//!
//! ```text
//! ShapeInstance / GlyphInstance
//!     -> quad        (vertex index -> unit-square corner)
//!     -> transform   (scale, rotate, translate, pixel -> NDC)
//!     -> compositor  (paint layers, edge coverage, tone curve)
//!     -> framebuffer
//! ```
//!
//! [`raster::Canvas`] strings these stages together on the CPU.

pub mod atlas;
pub mod compositor;
pub mod edge;
pub mod geometry;
pub mod glyph;
pub mod instance;
pub mod mask;
pub mod paint;
pub mod quad;
pub mod raster;
pub mod texture;
pub mod transform;

pub use atlas::{AtlasError, CoverageSource, MaskAtlas};
pub use compositor::{Fragment, ShapeFragment};
pub use edge::{edge_excess, Edge};
pub use geometry::{Color, Vec2};
pub use glyph::GlyphFragment;
pub use instance::{FlagLayout, GlyphInstance, PaintFlags, ScreenUniform, ShapeInstance};
pub use mask::{mask_fragment, ClipError, ClipStack, MaskDecision, MASK_THRESHOLD};
pub use paint::{Gradient, PaintLayer, PaintStack, ToneCurve};
pub use quad::{quad_corner, quad_offset, QUAD_VERTEX_COUNT};
pub use raster::Canvas;
pub use texture::{RgbaImage, TextureError, TextureSource, Transparent};
pub use transform::{glyph_vertex, pixel_to_ndc, shape_vertex, Expansion, GlyphVertex, ShapeVertex};
