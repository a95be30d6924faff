//! GPU renderer
//!
//! Owns the wgpu device and queue, the instance buffers, the registered color
//! textures and glyph atlas, and a stencil attachment sized to the viewport.
//! A frame is a [`DrawList`] replayed into one render pass. Instance buffers
//! start at the configured capacity and grow when a frame needs more.

use std::sync::Arc;

use thiserror::Error;
use wgpu::util::DeviceExt;

use lustre_core::{
    AtlasError, ClipError, GlyphInstance, MaskAtlas, RgbaImage, ScreenUniform, ShapeInstance,
    QUAD_VERTEX_COUNT,
};

use crate::config::{log_renderer_config, RendererConfig};
use crate::draw::{DrawCommand, DrawList, TextureId};
use crate::pipelines::{
    create_bind_group_layouts, create_pipelines, BindGroupLayouts, Pipelines, STENCIL_FORMAT,
};

/// Error type for renderer operations
#[derive(Error, Debug)]
pub enum RendererError {
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    #[error("failed to request GPU device: {0}")]
    DeviceError(#[from] wgpu::RequestDeviceError),

    #[error("{name} shader failed validation: {message}")]
    ShaderError { name: String, message: String },

    #[error("{kind} instances: {requested} requested, device buffers hold at most {capacity}")]
    CapacityExceeded {
        kind: &'static str,
        requested: usize,
        capacity: usize,
    },

    #[error("atlas is {side}x{side}x{layers}, renderer expects {expected_side}x{expected_side}x{expected_layers}")]
    AtlasMismatch {
        side: u32,
        layers: u32,
        expected_side: u32,
        expected_layers: u32,
    },

    #[error("render target is {width}x{height} {format:?}, renderer expects {expected_width}x{expected_height} {expected_format:?}")]
    TargetMismatch {
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        expected_width: u32,
        expected_height: u32,
        expected_format: wgpu::TextureFormat,
    },

    #[error("texture {} is not registered ({registered} textures)", .id.index())]
    UnknownTexture { id: TextureId, registered: usize },

    #[error(transparent)]
    Atlas(#[from] AtlasError),

    #[error(transparent)]
    Clip(#[from] ClipError),
}

/// GPU buffers
struct Buffers {
    /// Uniform buffer for the screen size
    screen: wgpu::Buffer,
    /// Instance buffer for shapes and clip masks
    shapes: wgpu::Buffer,
    shape_capacity: usize,
    /// Instance buffer for glyphs
    glyphs: wgpu::Buffer,
    glyph_capacity: usize,
}

/// Capacity an instance buffer grows to for `requested` instances, or `None`
/// when the device cannot hold that many in one buffer
fn grown_capacity(requested: usize, max: usize) -> Option<usize> {
    (requested <= max).then(|| requested.next_power_of_two().min(max))
}

fn instance_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Stencil attachment matching the viewport
struct StencilTarget {
    view: wgpu::TextureView,
    size: (u32, u32),
}

/// The GPU renderer
pub struct GpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: RendererConfig,
    texture_format: wgpu::TextureFormat,
    layouts: BindGroupLayouts,
    pipelines: Pipelines,
    buffers: Buffers,
    screen_bind_group: wgpu::BindGroup,
    /// Nearest/clamp sampler shared by the color textures and the atlas
    sampler: wgpu::Sampler,
    /// 1x1 transparent texture bound for untextured draws
    placeholder_bind_group: wgpu::BindGroup,
    /// Registered color textures, indexed by [`TextureId`]
    textures: Vec<wgpu::BindGroup>,
    atlas_texture: wgpu::Texture,
    atlas_bind_group: wgpu::BindGroup,
    stencil: Option<StencilTarget>,
    viewport_size: (u32, u32),
}

impl GpuRenderer {
    /// Create a headless renderer, preferring the primary backends and falling
    /// back to any backend (GL included) when none of them has an adapter
    pub async fn new(config: RendererConfig) -> Result<Self, RendererError> {
        let adapter = match Self::request_adapter(wgpu::Backends::PRIMARY).await {
            Some(adapter) => adapter,
            None => {
                tracing::debug!("no adapter on the primary backends, trying all backends");
                Self::request_adapter(wgpu::Backends::all())
                    .await
                    .ok_or(RendererError::AdapterNotFound)?
            }
        };

        let info = adapter.get_info();
        tracing::info!("using adapter {} ({:?})", info.name, info.backend);

        // Downlevel adapters (GL) cannot satisfy the full default limits
        let required_limits = if wgpu::Limits::default().check_limits(&adapter.limits()) {
            wgpu::Limits::default()
        } else {
            wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits())
        };

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Lustre GPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits,
                    memory_hints: wgpu::MemoryHints::MemoryUsage,
                },
                None,
            )
            .await?;

        Self::from_device(Arc::new(device), Arc::new(queue), config)
    }

    async fn request_adapter(backends: wgpu::Backends) -> Option<wgpu::Adapter> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    }

    /// Create a renderer on an existing device
    pub fn from_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        config: RendererConfig,
    ) -> Result<Self, RendererError> {
        let config = config.with_env_overrides().clamped_to(&device.limits());
        log_renderer_config(&config);

        let texture_format = config.format();
        let layouts = create_bind_group_layouts(&device);
        let pipelines = create_pipelines(&device, &layouts, texture_format, &config)?;
        let buffers = Self::create_buffers(&device, &config);

        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lustre Screen Bind Group"),
            layout: &layouts.screen,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffers.screen.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Lustre Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let placeholder = Self::upload_image(
            &device,
            &queue,
            &RgbaImage::filled(1, 1, lustre_core::Color::TRANSPARENT),
        );
        let placeholder_bind_group =
            Self::create_texture_bind_group(&device, &layouts, &placeholder, &sampler);

        let atlas_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lustre Glyph Atlas"),
            size: wgpu::Extent3d {
                width: config.atlas_side,
                height: config.atlas_side,
                depth_or_array_layers: config.atlas_layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let atlas_bind_group =
            Self::create_atlas_bind_group(&device, &layouts, &atlas_texture, &sampler);

        Ok(Self {
            device,
            queue,
            config,
            texture_format,
            layouts,
            pipelines,
            buffers,
            screen_bind_group,
            sampler,
            placeholder_bind_group,
            textures: Vec::new(),
            atlas_texture,
            atlas_bind_group,
            stencil: None,
            viewport_size: (800, 600),
        })
    }

    fn create_buffers(device: &wgpu::Device, config: &RendererConfig) -> Buffers {
        let screen = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Lustre Screen Uniform"),
            contents: bytemuck::bytes_of(&ScreenUniform::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let shapes = instance_buffer(
            device,
            "Lustre Shape Instances",
            (config.max_shape_instances * std::mem::size_of::<ShapeInstance>()) as u64,
        );
        let glyphs = instance_buffer(
            device,
            "Lustre Glyph Instances",
            (config.max_glyph_instances * std::mem::size_of::<GlyphInstance>()) as u64,
        );

        Buffers {
            screen,
            shapes,
            shape_capacity: config.max_shape_instances,
            glyphs,
            glyph_capacity: config.max_glyph_instances,
        }
    }

    /// Upload an RGBA8 image as a sampled texture
    fn upload_image(device: &wgpu::Device, queue: &wgpu::Queue, image: &RgbaImage) -> wgpu::Texture {
        let empty = image.width() == 0 || image.height() == 0;
        device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Lustre Shape Texture"),
                size: wgpu::Extent3d {
                    width: image.width().max(1),
                    height: image.height().max(1),
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8Unorm,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            if empty { &[0u8; 4][..] } else { image.as_bytes() },
        )
    }

    fn create_texture_bind_group(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        texture: &wgpu::Texture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lustre Texture Bind Group"),
            layout: &layouts.texture,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn create_atlas_bind_group(
        device: &wgpu::Device,
        layouts: &BindGroupLayouts,
        atlas: &wgpu::Texture,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        // Always an array view, even with a single layer
        let view = atlas.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Lustre Glyph Atlas View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Lustre Atlas Bind Group"),
            layout: &layouts.atlas,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    /// Resize the viewport
    pub fn resize(&mut self, width: u32, height: u32) {
        let size = (width.max(1), height.max(1));
        if size != self.viewport_size {
            tracing::debug!("viewport resized to {}x{}", size.0, size.1);
            self.viewport_size = size;
        }
    }

    pub fn viewport_size(&self) -> (u32, u32) {
        self.viewport_size
    }

    /// Get the wgpu device
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// Get the wgpu device as Arc
    pub fn device_arc(&self) -> Arc<wgpu::Device> {
        self.device.clone()
    }

    /// Get the wgpu queue
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Get the wgpu queue as Arc
    pub fn queue_arc(&self) -> Arc<wgpu::Queue> {
        self.queue.clone()
    }

    /// Get the texture format used by this renderer's pipelines
    pub fn texture_format(&self) -> wgpu::TextureFormat {
        self.texture_format
    }

    /// Effective configuration after overrides and clamping
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Shape instances the current buffer holds without growing
    pub fn shape_capacity(&self) -> usize {
        self.buffers.shape_capacity
    }

    /// Glyph instances the current buffer holds without growing
    pub fn glyph_capacity(&self) -> usize {
        self.buffers.glyph_capacity
    }

    /// Wait for submitted work to finish
    pub fn poll(&self) {
        self.device.poll(wgpu::Maintain::Wait);
    }

    /// Register `image` as a color texture for textured shape draws
    pub fn create_texture(&mut self, image: &RgbaImage) -> TextureId {
        let id = TextureId::new(self.textures.len() as u32);
        let bind_group = self.texture_bind_group(image);
        self.textures.push(bind_group);
        tracing::debug!(
            "registered {}x{} shape texture {}",
            image.width(),
            image.height(),
            id.index()
        );
        id
    }

    /// Replace the contents of a registered texture
    pub fn update_texture(&mut self, id: TextureId, image: &RgbaImage) -> Result<(), RendererError> {
        self.check_texture(id)?;
        let bind_group = self.texture_bind_group(image);
        self.textures[id.index() as usize] = bind_group;
        tracing::debug!("updated shape texture {}", id.index());
        Ok(())
    }

    /// Drop every registered texture; ids handed out earlier become invalid
    pub fn clear_textures(&mut self) {
        self.textures.clear();
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    fn texture_bind_group(&self, image: &RgbaImage) -> wgpu::BindGroup {
        let texture = Self::upload_image(&self.device, &self.queue, image);
        Self::create_texture_bind_group(&self.device, &self.layouts, &texture, &self.sampler)
    }

    fn check_texture(&self, id: TextureId) -> Result<(), RendererError> {
        if (id.index() as usize) < self.textures.len() {
            Ok(())
        } else {
            Err(RendererError::UnknownTexture {
                id,
                registered: self.textures.len(),
            })
        }
    }

    /// Upload every layer of `atlas`; its dimensions must match the configuration
    pub fn upload_atlas(&mut self, atlas: &MaskAtlas) -> Result<(), RendererError> {
        if atlas.side() != self.config.atlas_side || atlas.layers() > self.config.atlas_layers {
            return Err(RendererError::AtlasMismatch {
                side: atlas.side(),
                layers: atlas.layers(),
                expected_side: self.config.atlas_side,
                expected_layers: self.config.atlas_layers,
            });
        }
        let side = atlas.side();
        for layer in 0..atlas.layers() {
            if let Some(data) = atlas.layer_data(layer) {
                self.write_atlas(layer, 0, 0, side, side, data);
            }
        }
        tracing::debug!("uploaded {} atlas layers", atlas.layers());
        Ok(())
    }

    /// Update a region of one atlas layer (for incremental glyph packing)
    pub fn write_atlas_region(
        &mut self,
        layer: u32,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        coverage: &[u8],
    ) -> Result<(), RendererError> {
        if layer >= self.config.atlas_layers {
            return Err(AtlasError::LayerOutOfRange {
                layer,
                layers: self.config.atlas_layers,
            }
            .into());
        }
        let side = self.config.atlas_side;
        let fits = x.checked_add(width).is_some_and(|r| r <= side)
            && y.checked_add(height).is_some_and(|b| b <= side);
        if !fits {
            return Err(AtlasError::RegionOutOfBounds {
                x,
                y,
                width,
                height,
                side,
            }
            .into());
        }
        let expected = width as usize * height as usize;
        if coverage.len() != expected {
            return Err(AtlasError::DataLength {
                expected,
                actual: coverage.len(),
            }
            .into());
        }
        self.write_atlas(layer, x, y, width, height, coverage);
        Ok(())
    }

    fn write_atlas(&self, layer: u32, x: u32, y: u32, width: u32, height: u32, data: &[u8]) {
        if width == 0 || height == 0 {
            return;
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.atlas_texture,
                mip_level: 0,
                origin: wgpu::Origin3d { x, y, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn ensure_stencil(&mut self) {
        if self
            .stencil
            .as_ref()
            .is_some_and(|s| s.size == self.viewport_size)
        {
            return;
        }
        let (width, height) = self.viewport_size;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Lustre Stencil"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        tracing::debug!("created {}x{} stencil attachment", width, height);
        self.stencil = Some(StencilTarget {
            view,
            size: self.viewport_size,
        });
    }

    /// Grow the instance buffers to fit `list`
    fn reserve(&mut self, list: &DrawList) -> Result<(), RendererError> {
        let max_bytes = self.device.limits().max_buffer_size;
        let shape_size = std::mem::size_of::<ShapeInstance>();
        let glyph_size = std::mem::size_of::<GlyphInstance>();

        let shapes = list.shape_instances().len();
        if shapes > self.buffers.shape_capacity {
            let max = (max_bytes / shape_size as u64) as usize;
            let capacity = grown_capacity(shapes, max).ok_or(RendererError::CapacityExceeded {
                kind: "shape",
                requested: shapes,
                capacity: max,
            })?;
            self.buffers.shapes = instance_buffer(
                &self.device,
                "Lustre Shape Instances",
                (capacity * shape_size) as u64,
            );
            self.buffers.shape_capacity = capacity;
            tracing::debug!("shape buffer grown to {} instances", capacity);
        }

        let glyphs = list.glyph_instances().len();
        if glyphs > self.buffers.glyph_capacity {
            let max = (max_bytes / glyph_size as u64) as usize;
            let capacity = grown_capacity(glyphs, max).ok_or(RendererError::CapacityExceeded {
                kind: "glyph",
                requested: glyphs,
                capacity: max,
            })?;
            self.buffers.glyphs = instance_buffer(
                &self.device,
                "Lustre Glyph Instances",
                (capacity * glyph_size) as u64,
            );
            self.buffers.glyph_capacity = capacity;
            tracing::debug!("glyph buffer grown to {} instances", capacity);
        }
        Ok(())
    }

    fn check_target(&self, target: &wgpu::Texture) -> Result<(), RendererError> {
        let (expected_width, expected_height) = self.viewport_size;
        if (target.width(), target.height()) != self.viewport_size
            || target.format() != self.texture_format
        {
            return Err(RendererError::TargetMismatch {
                width: target.width(),
                height: target.height(),
                format: target.format(),
                expected_width,
                expected_height,
                expected_format: self.texture_format,
            });
        }
        Ok(())
    }

    /// Render a draw list into `target`, clearing it first when `clear_color` is set.
    ///
    /// `target` must match the viewport size and the renderer's texture format,
    /// and every texture the list names must be registered.
    pub fn render(
        &mut self,
        target: &wgpu::Texture,
        list: &DrawList,
        clear_color: Option<[f64; 4]>,
    ) -> Result<(), RendererError> {
        self.check_target(target)?;
        for id in list.textures() {
            self.check_texture(id)?;
        }
        self.reserve(list)?;
        if list.clip_depth() != 0 {
            tracing::warn!("draw list ends with {} unbalanced clips", list.clip_depth());
        }
        self.ensure_stencil();

        let screen = ScreenUniform::new(self.viewport_size.0 as f32, self.viewport_size.1 as f32);
        self.queue
            .write_buffer(&self.buffers.screen, 0, bytemuck::bytes_of(&screen));
        if !list.shape_instances().is_empty() {
            self.queue.write_buffer(
                &self.buffers.shapes,
                0,
                bytemuck::cast_slice(list.shape_instances()),
            );
        }
        if !list.glyph_instances().is_empty() {
            self.queue.write_buffer(
                &self.buffers.glyphs,
                0,
                bytemuck::cast_slice(list.glyph_instances()),
            );
        }

        let Some(stencil) = self.stencil.as_ref() else {
            return Ok(());
        };

        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Lustre Render Encoder"),
            });

        {
            let load = match clear_color {
                Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                None => wgpu::LoadOp::Load,
            };
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Lustre Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &stencil.view,
                    depth_ops: None,
                    stencil_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(0),
                        store: wgpu::StoreOp::Discard,
                    }),
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_bind_group(0, &self.screen_bind_group, &[]);

            for command in list.commands() {
                match command {
                    DrawCommand::Shapes {
                        instances,
                        reference,
                        texture,
                    } => {
                        let bind_group = (*texture)
                            .and_then(|id| self.textures.get(id.index() as usize))
                            .unwrap_or(&self.placeholder_bind_group);
                        render_pass.set_pipeline(&self.pipelines.shape);
                        render_pass.set_bind_group(1, bind_group, &[]);
                        render_pass.set_vertex_buffer(0, self.buffers.shapes.slice(..));
                        render_pass.set_stencil_reference(*reference);
                        render_pass.draw(0..QUAD_VERTEX_COUNT, instances.clone());
                    }
                    DrawCommand::Glyphs {
                        instances,
                        reference,
                    } => {
                        render_pass.set_pipeline(&self.pipelines.glyph);
                        render_pass.set_bind_group(1, &self.atlas_bind_group, &[]);
                        render_pass.set_vertex_buffer(0, self.buffers.glyphs.slice(..));
                        render_pass.set_stencil_reference(*reference);
                        render_pass.draw(0..QUAD_VERTEX_COUNT, instances.clone());
                    }
                    DrawCommand::PushClip {
                        instance,
                        reference,
                    } => {
                        render_pass.set_pipeline(&self.pipelines.mask_push);
                        render_pass.set_vertex_buffer(0, self.buffers.shapes.slice(..));
                        render_pass.set_stencil_reference(*reference);
                        render_pass.draw(0..QUAD_VERTEX_COUNT, *instance..*instance + 1);
                    }
                    DrawCommand::PopClip {
                        instance,
                        reference,
                    } => {
                        render_pass.set_pipeline(&self.pipelines.mask_pop);
                        render_pass.set_vertex_buffer(0, self.buffers.shapes.slice(..));
                        render_pass.set_stencil_reference(*reference);
                        render_pass.draw(0..QUAD_VERTEX_COUNT, *instance..*instance + 1);
                    }
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        tracing::trace!(
            "submitted {} commands ({} shapes, {} glyphs)",
            list.commands().len(),
            list.shape_instances().len(),
            list.glyph_instances().len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lustre_core::Color;

    /// Helper to create a test wgpu device on the given backends
    async fn create_test_device_on(backends: wgpu::Backends) -> Option<(wgpu::Device, wgpu::Queue)> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor::default(), None)
            .await
            .ok()?;

        Some((device, queue))
    }

    async fn create_test_device() -> Option<(wgpu::Device, wgpu::Queue)> {
        create_test_device_on(wgpu::Backends::all()).await
    }

    fn small_config() -> RendererConfig {
        RendererConfig {
            atlas_side: 64,
            ..RendererConfig::default()
        }
    }

    fn target(renderer: &GpuRenderer, width: u32, height: u32) -> wgpu::Texture {
        renderer.device().create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: renderer.texture_format(),
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
    }

    #[test]
    fn error_messages() {
        let err = RendererError::CapacityExceeded {
            kind: "shape",
            requested: 10,
            capacity: 4,
        };
        assert_eq!(
            err.to_string(),
            "shape instances: 10 requested, device buffers hold at most 4"
        );
        let err = RendererError::UnknownTexture {
            id: TextureId::new(3),
            registered: 1,
        };
        assert_eq!(err.to_string(), "texture 3 is not registered (1 textures)");
        let err: RendererError = ClipError::Underflow.into();
        assert!(err.to_string().contains("underflow"));
    }

    #[test]
    fn capacity_grows_to_powers_of_two() {
        assert_eq!(grown_capacity(3, 1_000), Some(4));
        assert_eq!(grown_capacity(513, 1_000), Some(1_000));
        assert_eq!(grown_capacity(1_000, 1_000), Some(1_000));
        assert_eq!(grown_capacity(1_001, 1_000), None);
    }

    #[test]
    fn renderer_creation() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device().await else {
                // Skip test if no GPU available
                return;
            };
            let renderer =
                GpuRenderer::from_device(Arc::new(device), Arc::new(queue), small_config())
                    .unwrap();
            assert_eq!(renderer.texture_format(), wgpu::TextureFormat::Rgba8Unorm);
        });
    }

    #[test]
    fn pipelines_build_on_gl() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device_on(wgpu::Backends::GL).await else {
                return;
            };
            let mut renderer =
                GpuRenderer::from_device(Arc::new(device), Arc::new(queue), small_config())
                    .unwrap();
            renderer.resize(8, 8);
            let target = target(&renderer, 8, 8);

            let mut list = DrawList::new();
            list.shapes(&[ShapeInstance::rect(0.0, 0.0, 4.0, 4.0)])
                .glyphs(&[GlyphInstance::new(4.0, 4.0, 2.0, 2.0, 0.0, 0.0, 0)]);
            renderer.render(&target, &list, Some([0.0; 4])).unwrap();
            renderer.poll();
        });
    }

    #[test]
    fn buffers_grow_on_demand() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device().await else {
                return;
            };
            let mut renderer = GpuRenderer::from_device(
                Arc::new(device),
                Arc::new(queue),
                RendererConfig {
                    max_shape_instances: 2,
                    max_glyph_instances: 1,
                    ..small_config()
                },
            )
            .unwrap();
            renderer.resize(16, 16);
            let target = target(&renderer, 16, 16);

            let mut list = DrawList::new();
            list.shapes(&[ShapeInstance::rect(0.0, 0.0, 4.0, 4.0); 3])
                .glyphs(&[GlyphInstance::default(); 5]);
            renderer.render(&target, &list, None).unwrap();
            assert_eq!(renderer.shape_capacity(), 4);
            assert_eq!(renderer.glyph_capacity(), 8);

            // Smaller frames keep the grown buffers
            list.clear();
            list.shapes(&[ShapeInstance::rect(0.0, 0.0, 4.0, 4.0)]);
            renderer.render(&target, &list, None).unwrap();
            assert_eq!(renderer.shape_capacity(), 4);
        });
    }

    #[test]
    fn target_must_match_viewport() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device().await else {
                return;
            };
            let mut renderer =
                GpuRenderer::from_device(Arc::new(device), Arc::new(queue), small_config())
                    .unwrap();
            let list = DrawList::new();

            // Default viewport is 800x600
            let small = target(&renderer, 16, 16);
            assert!(matches!(
                renderer.render(&small, &list, None),
                Err(RendererError::TargetMismatch {
                    width: 16,
                    expected_width: 800,
                    ..
                })
            ));

            renderer.resize(16, 16);
            assert!(renderer.render(&small, &list, None).is_ok());
        });
    }

    #[test]
    fn textures_are_registered_per_draw() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device().await else {
                return;
            };
            let mut renderer =
                GpuRenderer::from_device(Arc::new(device), Arc::new(queue), small_config())
                    .unwrap();
            renderer.resize(8, 8);
            let target = target(&renderer, 8, 8);

            let red = renderer.create_texture(&RgbaImage::filled(2, 2, Color::RED));
            let blue = renderer.create_texture(&RgbaImage::filled(2, 2, Color::BLUE));
            assert_eq!((red.index(), blue.index()), (0, 1));
            assert_eq!(renderer.texture_count(), 2);

            let textured = ShapeInstance::rect(0.0, 0.0, 4.0, 4.0).with_texture(Color::WHITE);
            let mut list = DrawList::new();
            list.textured_shapes(red, &[textured])
                .textured_shapes(blue, &[textured]);
            assert!(renderer.render(&target, &list, None).is_ok());
            assert!(renderer
                .update_texture(blue, &RgbaImage::filled(1, 1, Color::GREEN))
                .is_ok());

            renderer.clear_textures();
            assert!(matches!(
                renderer.render(&target, &list, None),
                Err(RendererError::UnknownTexture { registered: 0, .. })
            ));
            assert!(matches!(
                renderer.update_texture(red, &RgbaImage::filled(1, 1, Color::RED)),
                Err(RendererError::UnknownTexture { .. })
            ));
        });
    }

    #[test]
    fn atlas_dimensions_are_checked() {
        pollster::block_on(async {
            let Some((device, queue)) = create_test_device().await else {
                return;
            };
            let mut renderer = GpuRenderer::from_device(
                Arc::new(device),
                Arc::new(queue),
                RendererConfig {
                    atlas_layers: 2,
                    ..small_config()
                },
            )
            .unwrap();
            assert!(renderer.upload_atlas(&MaskAtlas::new(64, 2)).is_ok());
            assert!(matches!(
                renderer.upload_atlas(&MaskAtlas::new(32, 1)),
                Err(RendererError::AtlasMismatch { .. })
            ));
            assert!(matches!(
                renderer.write_atlas_region(0, 60, 0, 8, 1, &[0; 8]),
                Err(RendererError::Atlas(AtlasError::RegionOutOfBounds { .. }))
            ));
        });
    }
}
