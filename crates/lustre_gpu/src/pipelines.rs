//! Bind group layouts and render pipelines
//!
//! Four pipelines draw into one color attachment plus a `Stencil8`
//! attachment:
//!
//! | pipeline    | shader | stencil compare | stencil pass op  | color writes |
//! |-------------|--------|-----------------|------------------|--------------|
//! | `shape`     | shape  | Equal           | Keep             | all          |
//! | `glyph`     | glyph  | Equal           | Keep             | all          |
//! | `mask_push` | mask   | Equal           | IncrementClamp   | none         |
//! | `mask_pop`  | mask   | Equal           | DecrementClamp   | none         |

use std::collections::HashMap;

use crate::config::RendererConfig;
use crate::layout::{GLYPH_INSTANCE_LAYOUT, SHAPE_INSTANCE_LAYOUT};
use crate::renderer::RendererError;
use crate::shaders::{self, GLYPH_SHADER, MASK_SHADER, SHAPE_SHADER};

/// Depth/stencil attachment format used by every pipeline
pub const STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Stencil8;

/// Bind group layouts shared by the pipelines
pub struct BindGroupLayouts {
    /// Group 0: screen uniform
    pub screen: wgpu::BindGroupLayout,
    /// Group 1 of the shape pipeline: color texture + sampler
    pub texture: wgpu::BindGroupLayout,
    /// Group 1 of the glyph pipeline: layered coverage atlas + sampler
    pub atlas: wgpu::BindGroupLayout,
}

/// Render pipelines
pub struct Pipelines {
    pub shape: wgpu::RenderPipeline,
    pub glyph: wgpu::RenderPipeline,
    pub mask_push: wgpu::RenderPipeline,
    pub mask_pop: wgpu::RenderPipeline,
}

/// Specialization constants for the shape shader
pub fn shape_constants(config: &RendererConfig) -> HashMap<String, f64> {
    HashMap::from([
        ("TEXTURE".to_string(), config.flag_layout.texture as f64),
        ("LIN_GRADIENT".to_string(), config.flag_layout.lin_gradient as f64),
        ("RAD_GRADIENT".to_string(), config.flag_layout.rad_gradient as f64),
        ("GAMMA".to_string(), config.tone.gamma as f64),
        ("GAMMA_SCALE".to_string(), config.tone.scale as f64),
    ])
}

/// Specialization constants for the glyph shader
pub fn glyph_constants(config: &RendererConfig) -> HashMap<String, f64> {
    HashMap::from([
        ("ATLAS_SIDE".to_string(), config.atlas_side as f64),
        ("ATLAS_LAYERS".to_string(), config.atlas_layers as f64),
    ])
}

pub fn create_bind_group_layouts(device: &wgpu::Device) -> BindGroupLayouts {
    let screen = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Lustre Screen Bind Group Layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let texture = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Lustre Texture Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    let atlas = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("Lustre Atlas Bind Group Layout"),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2Array,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    });

    tracing::debug!("created bind group layouts");
    BindGroupLayouts {
        screen,
        texture,
        atlas,
    }
}

fn stencil_state(pass_op: wgpu::StencilOperation) -> wgpu::DepthStencilState {
    let face = wgpu::StencilFaceState {
        compare: wgpu::CompareFunction::Equal,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    };
    wgpu::DepthStencilState {
        format: STENCIL_FORMAT,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil: wgpu::StencilState {
            front: face,
            back: face,
            read_mask: 0xff,
            write_mask: 0xff,
        },
        bias: wgpu::DepthBiasState::default(),
    }
}

fn shader_module(
    device: &wgpu::Device,
    name: &str,
    source: &'static str,
) -> Result<wgpu::ShaderModule, RendererError> {
    shaders::validate(name, source)?;
    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(name),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    }))
}

/// Validate the shaders and build every pipeline for `format`
pub fn create_pipelines(
    device: &wgpu::Device,
    layouts: &BindGroupLayouts,
    format: wgpu::TextureFormat,
    config: &RendererConfig,
) -> Result<Pipelines, RendererError> {
    let shape_shader = shader_module(device, "Lustre Shape Shader", SHAPE_SHADER)?;
    let glyph_shader = shader_module(device, "Lustre Glyph Shader", GLYPH_SHADER)?;
    let mask_shader = shader_module(device, "Lustre Mask Shader", MASK_SHADER)?;

    let color_targets = &[Some(wgpu::ColorTargetState {
        format,
        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
        write_mask: wgpu::ColorWrites::ALL,
    })];
    let mask_targets = &[Some(wgpu::ColorTargetState {
        format,
        blend: None,
        write_mask: wgpu::ColorWrites::empty(),
    })];

    let primitive_state = wgpu::PrimitiveState {
        topology: wgpu::PrimitiveTopology::TriangleList,
        strip_index_format: None,
        front_face: wgpu::FrontFace::Ccw,
        cull_mode: None,
        unclipped_depth: false,
        polygon_mode: wgpu::PolygonMode::Fill,
        conservative: false,
    };

    let multisample_state = wgpu::MultisampleState {
        count: 1,
        mask: !0,
        alpha_to_coverage_enabled: false,
    };

    let shape_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lustre Shape Pipeline Layout"),
        bind_group_layouts: &[&layouts.screen, &layouts.texture],
        push_constant_ranges: &[],
    });
    let glyph_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lustre Glyph Pipeline Layout"),
        bind_group_layouts: &[&layouts.screen, &layouts.atlas],
        push_constant_ranges: &[],
    });
    let mask_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Lustre Mask Pipeline Layout"),
        bind_group_layouts: &[&layouts.screen],
        push_constant_ranges: &[],
    });

    let shape_constants = shape_constants(config);
    let glyph_constants = glyph_constants(config);
    let no_constants = HashMap::new();

    let shape = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Lustre Shape Pipeline"),
        layout: Some(&shape_layout),
        vertex: wgpu::VertexState {
            module: &shape_shader,
            entry_point: Some("vs_main"),
            buffers: &[SHAPE_INSTANCE_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &shape_constants,
                ..Default::default()
            },
        },
        fragment: Some(wgpu::FragmentState {
            module: &shape_shader,
            entry_point: Some("fs_main"),
            targets: color_targets,
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &shape_constants,
                ..Default::default()
            },
        }),
        primitive: primitive_state,
        depth_stencil: Some(stencil_state(wgpu::StencilOperation::Keep)),
        multisample: multisample_state,
        multiview: None,
        cache: None,
    });

    let glyph = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("Lustre Glyph Pipeline"),
        layout: Some(&glyph_layout),
        vertex: wgpu::VertexState {
            module: &glyph_shader,
            entry_point: Some("vs_main"),
            buffers: &[GLYPH_INSTANCE_LAYOUT],
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &glyph_constants,
                ..Default::default()
            },
        },
        fragment: Some(wgpu::FragmentState {
            module: &glyph_shader,
            entry_point: Some("fs_main"),
            targets: color_targets,
            compilation_options: wgpu::PipelineCompilationOptions {
                constants: &glyph_constants,
                ..Default::default()
            },
        }),
        primitive: primitive_state,
        depth_stencil: Some(stencil_state(wgpu::StencilOperation::Keep)),
        multisample: multisample_state,
        multiview: None,
        cache: None,
    });

    let mask_pipeline = |label: &str, pass_op: wgpu::StencilOperation| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&mask_layout),
            vertex: wgpu::VertexState {
                module: &mask_shader,
                entry_point: Some("vs_main"),
                buffers: &[SHAPE_INSTANCE_LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &no_constants,
                    ..Default::default()
                },
            },
            fragment: Some(wgpu::FragmentState {
                module: &mask_shader,
                entry_point: Some("fs_main"),
                targets: mask_targets,
                compilation_options: wgpu::PipelineCompilationOptions {
                    constants: &no_constants,
                    ..Default::default()
                },
            }),
            primitive: primitive_state,
            depth_stencil: Some(stencil_state(pass_op)),
            multisample: multisample_state,
            multiview: None,
            cache: None,
        })
    };

    let mask_push = mask_pipeline(
        "Lustre Mask Push Pipeline",
        wgpu::StencilOperation::IncrementClamp,
    );
    let mask_pop = mask_pipeline(
        "Lustre Mask Pop Pipeline",
        wgpu::StencilOperation::DecrementClamp,
    );

    tracing::debug!("created render pipelines for {:?}", format);
    Ok(Pipelines {
        shape,
        glyph,
        mask_push,
        mask_pop,
    })
}
