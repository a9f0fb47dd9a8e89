//! Device acquisition and resource setup for the GPU backend.

use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::{GpuRenderer, RENDER_FORMAT};
use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::shader::{
    premultiplied_blend, ShaderVariants, ALL_EFFECTS, ONLY_SHAPE_FILTERS, PEN_COMPOSITE_SHADER,
    PEN_DOT_SHADER, PEN_LINE_SHADER,
};
use crate::software::{surface_size, SoftwareRenderer};
use crate::texture_cache::CostumeTextureCache;
use crate::{STAGE_HEIGHT, STAGE_WIDTH};

/// Two triangles covering the unit square; positions double as texture
/// coordinates.
const UNIT_QUAD: [[f32; 2]; 6] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [0.0, 1.0],
    [1.0, 0.0],
    [1.0, 1.0],
];

pub(super) fn create_output_texture(
    device: &wgpu::Device,
    zoom: f32,
    config_scale: u32,
) -> (wgpu::Texture, wgpu::TextureView) {
    let (width, height) = surface_size(zoom, config_scale);
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("frame_output"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: RENDER_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

fn create_pen_uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("pen_uniform_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn create_pen_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    source: &str,
    label: &'static str,
    vs_entry: &'static str,
    fs_entry: &'static str,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some(vs_entry),
            compilation_options: Default::default(),
            buffers: &[],
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(fs_entry),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format: RENDER_FORMAT,
                blend: Some(premultiplied_blend()),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl GpuRenderer {
    /// Acquires an adapter and device headlessly and allocates the quad
    /// buffer, the pen framebuffer and the shader variants in use.
    ///
    /// Fails with [`RenderError::ContextAcquisition`] when the platform has
    /// no usable GPU, carrying the underlying message verbatim.
    pub async fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::ContextAcquisition(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: None,
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .map_err(|e| RenderError::ContextAcquisition(e.to_string()))?;

        log::info!("rendering on {}", adapter.get_info().name);

        let zoom = 1.0;
        let (output, output_view) = create_output_texture(&device, zoom, config.scale);

        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("unit_quad"),
            contents: bytemuck::cast_slice(&UNIT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let mut variants = ShaderVariants::new(&device, RENDER_FORMAT);
        variants.get_or_compile(&device, ALL_EFFECTS)?;
        variants.get_or_compile(&device, ONLY_SHAPE_FILTERS)?;

        let pen_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pen_layer"),
            size: wgpu::Extent3d {
                width: STAGE_WIDTH,
                height: STAGE_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let pen_view = pen_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let pen_uniform_layout = create_pen_uniform_layout(&device);
        let pen_dot_pipeline = create_pen_pipeline(
            &device,
            &pen_uniform_layout,
            PEN_DOT_SHADER,
            "pen_dot_pipeline",
            "vs_dot",
            "fs_dot",
            wgpu::PrimitiveTopology::TriangleList,
        );
        let pen_line_pipeline = create_pen_pipeline(
            &device,
            &pen_uniform_layout,
            PEN_LINE_SHADER,
            "pen_line_pipeline",
            "vs_line",
            "fs_line",
            wgpu::PrimitiveTopology::LineList,
        );

        // Fullscreen pass drawing the pen texture over the backdrop. The
        // quad's Y flip keeps pen content in stage orientation.
        let composite_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("pen_composite_bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
        let composite_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pen_composite_shader"),
            source: wgpu::ShaderSource::Wgsl(PEN_COMPOSITE_SHADER.into()),
        });
        let composite_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("pen_composite_layout"),
                bind_group_layouts: &[&composite_layout],
                push_constant_ranges: &[],
            });
        let composite_pipeline =
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("pen_composite_pipeline"),
                layout: Some(&composite_pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &composite_module,
                    entry_point: Some("vs_quad"),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &composite_module,
                    entry_point: Some("fs_composite"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: RENDER_FORMAT,
                        blend: Some(premultiplied_blend()),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            });

        let composite_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("pen_composite_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let pen_composite_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pen_composite_bind_group"),
            layout: &composite_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&pen_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&composite_sampler),
                },
            ],
        });

        let textures = CostumeTextureCache::new(&device);
        let software = SoftwareRenderer::new(config)?;

        let mut renderer = Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
            config,
            zoom,
            output,
            output_view,
            quad_buffer,
            variants,
            textures,
            pen_view,
            pen_dot_pipeline,
            pen_line_pipeline,
            pen_uniform_layout,
            composite_pipeline,
            pen_composite_bind_group,
            software,
        };
        renderer.clear_pen_texture();
        Ok(renderer)
    }
}
