//! Test harness for visual tests
//!
//! Provides infrastructure for running visual tests, including:
//! - GPU context initialization
//! - Offscreen rendering and readback
//! - Comparison against the CPU reference rasterizer
//! - PNG output of both images and a diff

use anyhow::{Context, Result};
use image::{ImageBuffer, Rgba, RgbaImage};
use lustre_core::{
    Canvas, ClipError, Color, GlyphInstance, MaskAtlas, RgbaImage as Texture, ShapeInstance,
    TextureSource, Transparent,
};
use lustre_gpu::{DrawCommand, DrawList, GpuRenderer, RendererConfig, TextureId};
use std::cell::RefCell;
use std::path::PathBuf;
use std::sync::Arc;

/// Result of a visual test
#[derive(Debug)]
pub enum TestResult {
    /// GPU and CPU images agree
    Passed,
    /// Too many pixels differ beyond the per-channel tolerance
    Failed { difference: f32, diff_path: PathBuf },
}

impl TestResult {
    pub fn is_passed(&self) -> bool {
        matches!(self, TestResult::Passed)
    }
}

/// Context for a single test
pub struct TestContext {
    /// Recorded draws
    pub list: DrawList,
    /// Color textures, indexed by the [`TextureId`]s handed out by `add_texture`
    pub textures: Vec<Texture>,
    /// Glyph coverage atlas
    pub atlas: MaskAtlas,
    /// Background the target is cleared to
    pub clear_color: Color,
    /// Viewport size
    pub size: (u32, u32),
    /// Test name
    pub name: String,
    /// First clip error raised while recording
    error: Option<ClipError>,
}

impl TestContext {
    /// Create a new test context
    pub fn new(name: &str, width: u32, height: u32, atlas: MaskAtlas) -> Self {
        Self {
            list: DrawList::new(),
            textures: Vec::new(),
            atlas,
            clear_color: Color::WHITE,
            size: (width, height),
            name: name.to_string(),
            error: None,
        }
    }

    /// Record shape instances
    pub fn shapes(&mut self, shapes: &[ShapeInstance]) -> &mut Self {
        self.list.shapes(shapes);
        self
    }

    /// Record one shape instance
    pub fn shape(&mut self, shape: ShapeInstance) -> &mut Self {
        self.shapes(&[shape])
    }

    /// Record glyph instances
    pub fn glyphs(&mut self, glyphs: &[GlyphInstance]) -> &mut Self {
        self.list.glyphs(glyphs);
        self
    }

    pub fn push_clip(&mut self, mask: ShapeInstance) -> &mut Self {
        if let Err(e) = self.list.push_clip(mask) {
            self.error.get_or_insert(e);
        }
        self
    }

    pub fn pop_clip(&mut self) -> &mut Self {
        if let Err(e) = self.list.pop_clip() {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Register a color texture for `textured_shape` draws
    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId::new(self.textures.len() as u32 - 1)
    }

    /// Record one shape whose texture layer samples `texture`
    pub fn textured_shape(&mut self, texture: TextureId, shape: ShapeInstance) -> &mut Self {
        self.list.textured_shapes(texture, &[shape]);
        self
    }

    /// Texture a recorded command samples
    fn texture(&self, id: Option<TextureId>) -> Result<&dyn TextureSource> {
        match id {
            None => Ok(&Transparent),
            Some(id) => self
                .textures
                .get(id.index() as usize)
                .map(|t| t as &dyn TextureSource)
                .with_context(|| format!("texture {} was never added", id.index())),
        }
    }

    /// Mutable access to the glyph atlas for writing coverage
    pub fn atlas_mut(&mut self) -> &mut MaskAtlas {
        &mut self.atlas
    }

    pub fn set_clear_color(&mut self, color: Color) -> &mut Self {
        self.clear_color = color;
        self
    }

    /// Error recorded while building the draw list, if any
    pub fn error(&self) -> Option<&ClipError> {
        self.error.as_ref()
    }
}

/// Test harness for running visual tests
pub struct TestHarness {
    /// GPU renderer (wrapped in RefCell for interior mutability)
    renderer: RefCell<GpuRenderer>,
    /// wgpu device
    device: Arc<wgpu::Device>,
    /// wgpu queue
    queue: Arc<wgpu::Queue>,
    /// Output directory for test results
    output_dir: PathBuf,
    /// Default viewport size
    default_size: (u32, u32),
    /// Largest per-channel difference still counted as a match
    tolerance: u8,
    /// Fraction of pixels allowed to exceed `tolerance` (0.0-1.0)
    threshold: f32,
}

impl TestHarness {
    /// Create a new test harness with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(TestHarnessConfig::default())
    }

    /// Create a new test harness with custom configuration
    pub fn with_config(config: TestHarnessConfig) -> Result<Self> {
        let renderer = pollster::block_on(GpuRenderer::new(config.renderer))
            .context("Failed to create GPU renderer")?;

        let device = renderer.device_arc();
        let queue = renderer.queue_arc();

        std::fs::create_dir_all(&config.output_dir).context("Failed to create output directory")?;

        Ok(Self {
            renderer: RefCell::new(renderer),
            device,
            queue,
            output_dir: config.output_dir,
            default_size: config.default_size,
            tolerance: config.tolerance,
            threshold: config.threshold,
        })
    }

    /// Create a test context with the default viewport size
    pub fn create_context(&self, name: &str) -> TestContext {
        self.create_context_with_size(name, self.default_size.0, self.default_size.1)
    }

    /// Create a test context with an atlas matching the renderer's configuration
    pub fn create_context_with_size(&self, name: &str, width: u32, height: u32) -> TestContext {
        let config = self.renderer.borrow().config().clone();
        TestContext::new(
            name,
            width,
            height,
            MaskAtlas::new(config.atlas_side, config.atlas_layers),
        )
    }

    /// Create an offscreen render target that can be copied out
    fn create_render_texture(&self, width: u32, height: u32, format: wgpu::TextureFormat) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Test Render Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    /// Create a buffer for reading back texture data
    fn create_readback_buffer(&self, width: u32, height: u32) -> wgpu::Buffer {
        let bytes_per_row = Self::padded_bytes_per_row(width);
        let buffer_size = (bytes_per_row * height) as u64;

        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Test Readback Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        })
    }

    /// Calculate padded bytes per row (must be multiple of 256 for wgpu)
    fn padded_bytes_per_row(width: u32) -> u32 {
        let unpadded = width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        unpadded.div_ceil(align) * align
    }

    /// Render the context's draw list on the GPU and read it back
    pub fn render_gpu(&self, ctx: &TestContext) -> Result<RgbaImage> {
        let (width, height) = ctx.size;
        let mut renderer = self.renderer.borrow_mut();

        renderer.resize(width, height);
        renderer.clear_textures();
        for (index, texture) in ctx.textures.iter().enumerate() {
            let id = renderer.create_texture(texture);
            anyhow::ensure!(
                id.index() as usize == index,
                "renderer assigned texture {} to context texture {}",
                id.index(),
                index
            );
        }
        renderer.upload_atlas(&ctx.atlas)?;

        let target = self.create_render_texture(width, height, renderer.texture_format());

        let c = ctx.clear_color;
        renderer.render(
            &target,
            &ctx.list,
            Some([c.r as f64, c.g as f64, c.b as f64, c.a as f64]),
        )?;

        let buffer = self.create_readback_buffer(width, height);
        let bytes_per_row = Self::padded_bytes_per_row(width);

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Test Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(bytes_per_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        // Map buffer and read pixels
        let buffer_slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .context("Failed to receive buffer map result")?
            .context("Failed to map buffer")?;

        let data = buffer_slice.get_mapped_range();

        // Strip row padding
        let mut img: RgbaImage = ImageBuffer::new(width, height);
        for y in 0..height {
            let row_start = (y * bytes_per_row) as usize;
            let row = &data[row_start..row_start + (width * 4) as usize];
            for x in 0..width {
                let i = (x * 4) as usize;
                img.put_pixel(x, y, Rgba([row[i], row[i + 1], row[i + 2], row[i + 3]]));
            }
        }

        drop(data);
        buffer.unmap();
        Ok(img)
    }

    /// Replay the context's draw list on the CPU reference rasterizer
    pub fn render_cpu(&self, ctx: &TestContext) -> Result<RgbaImage> {
        let (width, height) = ctx.size;
        let config = self.renderer.borrow().config().clone();
        let shapes = ctx.list.shape_instances();
        let glyphs = ctx.list.glyph_instances();

        let mut canvas = Canvas::new(width, height)
            .with_tone(config.tone)
            .with_flag_layout(config.flag_layout);
        canvas.clear(ctx.clear_color);

        for command in ctx.list.commands() {
            match command {
                DrawCommand::Shapes {
                    instances, texture, ..
                } => {
                    let range = instances.start as usize..instances.end as usize;
                    canvas.draw_shapes(&shapes[range], ctx.texture(*texture)?);
                }
                DrawCommand::Glyphs { instances, .. } => {
                    let range = instances.start as usize..instances.end as usize;
                    canvas.draw_glyphs(&glyphs[range], &ctx.atlas, config.atlas_side as f32);
                }
                DrawCommand::PushClip { instance, .. } => {
                    canvas.push_clip(&shapes[*instance as usize])?;
                }
                DrawCommand::PopClip { instance, .. } => {
                    canvas.pop_clip(&shapes[*instance as usize])?;
                }
            }
        }

        RgbaImage::from_raw(width, height, canvas.to_rgba8())
            .context("Canvas produced a buffer of the wrong size")
    }

    /// Fraction of pixels where any channel differs by more than `tolerance`
    pub fn compare_images(img1: &RgbaImage, img2: &RgbaImage, tolerance: u8) -> f32 {
        if img1.dimensions() != img2.dimensions() {
            return 1.0; // Different sizes = completely different
        }

        let (width, height) = img1.dimensions();
        let total_pixels = (width as usize * height as usize).max(1);
        let mismatched = img1
            .pixels()
            .zip(img2.pixels())
            .filter(|(p1, p2)| Self::max_channel_diff(p1, p2) > tolerance)
            .count();

        mismatched as f32 / total_pixels as f32
    }

    fn max_channel_diff(p1: &Rgba<u8>, p2: &Rgba<u8>) -> u8 {
        p1.0.iter()
            .zip(p2.0.iter())
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0)
    }

    /// Generate a diff image highlighting differences between two images
    pub fn generate_diff_image(img1: &RgbaImage, img2: &RgbaImage, tolerance: u8) -> Option<RgbaImage> {
        if img1.dimensions() != img2.dimensions() {
            return None;
        }

        let (width, height) = img1.dimensions();
        let mut diff = ImageBuffer::new(width, height);

        for y in 0..height {
            for x in 0..width {
                let p1 = img1.get_pixel(x, y);
                let p2 = img2.get_pixel(x, y);

                if Self::max_channel_diff(p1, p2) > tolerance {
                    diff.put_pixel(x, y, Rgba([255, 0, 0, 255]));
                } else {
                    diff.put_pixel(x, y, Rgba([p1[0] / 3, p1[1] / 3, p1[2] / 3, 128]));
                }
            }
        }

        Some(diff)
    }

    /// Run a test with the default viewport size
    pub fn run_test<F>(&self, name: &str, test_fn: F) -> Result<TestResult>
    where
        F: FnOnce(&mut TestContext) -> Result<()>,
    {
        self.run_test_with_size(name, self.default_size.0, self.default_size.1, test_fn)
    }

    /// Run a test with a custom viewport size
    pub fn run_test_with_size<F>(
        &self,
        name: &str,
        width: u32,
        height: u32,
        test_fn: F,
    ) -> Result<TestResult>
    where
        F: FnOnce(&mut TestContext) -> Result<()>,
    {
        let mut ctx = self.create_context_with_size(name, width, height);
        test_fn(&mut ctx).with_context(|| format!("test '{}' failed to set up its scene", name))?;

        if let Some(e) = ctx.error() {
            anyhow::bail!("test '{}' recorded an invalid clip sequence: {}", name, e);
        }

        tracing::info!(
            "Test '{}': {} shapes, {} glyphs, {} commands",
            name,
            ctx.list.shape_instances().len(),
            ctx.list.glyph_instances().len(),
            ctx.list.commands().len()
        );

        let gpu = self.render_gpu(&ctx)?;
        let cpu = self.render_cpu(&ctx)?;

        let output_path = self.output_path(name);
        gpu.save(&output_path)
            .with_context(|| format!("Failed to write {:?}", output_path))?;
        let cpu_path = self.cpu_path(name);
        cpu.save(&cpu_path)
            .with_context(|| format!("Failed to write {:?}", cpu_path))?;
        tracing::debug!("Rendered test '{}' to {:?}", name, output_path);

        let difference = Self::compare_images(&gpu, &cpu, self.tolerance);
        if difference <= self.threshold {
            tracing::info!("Test '{}' PASSED (diff: {:.4}%)", name, difference * 100.0);
            Ok(TestResult::Passed)
        } else {
            let diff_path = self.diff_path(name);
            if let Some(diff_img) = Self::generate_diff_image(&gpu, &cpu, self.tolerance) {
                diff_img.save(&diff_path).ok();
            }
            tracing::warn!(
                "Test '{}' FAILED (diff: {:.4}%, threshold: {:.4}%)",
                name,
                difference * 100.0,
                self.threshold * 100.0
            );
            Ok(TestResult::Failed {
                difference,
                diff_path,
            })
        }
    }

    /// Get the GPU output image path for a test
    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.png", Self::file_stem(name)))
    }

    /// Get the CPU reference image path for a test
    pub fn cpu_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_cpu.png", Self::file_stem(name)))
    }

    /// Get the diff image path for a test
    pub fn diff_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_diff.png", Self::file_stem(name)))
    }

    fn file_stem(name: &str) -> String {
        name.replace("::", "_")
    }
}

/// Configuration for test harness
#[derive(Debug, Clone)]
pub struct TestHarnessConfig {
    /// Output directory for test results
    pub output_dir: PathBuf,
    /// Default viewport size
    pub default_size: (u32, u32),
    /// Largest per-channel difference (in 1/255 steps) still counted as a match
    pub tolerance: u8,
    /// Fraction of pixels allowed to exceed `tolerance` (0.0-1.0)
    pub threshold: f32,
    /// Renderer configuration
    pub renderer: RendererConfig,
}

impl Default for TestHarnessConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test_output"),
            default_size: (256, 256),
            tolerance: 2,
            // Hard rotated edges may land a pixel center on the boundary
            threshold: 0.002,
            renderer: RendererConfig {
                max_shape_instances: 1_024,
                max_glyph_instances: 1_024,
                atlas_side: 256,
                atlas_layers: 2,
                ..RendererConfig::default()
            },
        }
    }
}
