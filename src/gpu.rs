//! The wgpu-accelerated backend.
//!
//! Sprites are textured quads; the Scratch image effects run in the
//! fragment shader. The pen layer is a 480×360 texture bound to its own
//! framebuffer and composited over the stage as a fullscreen pass.
//! Queries that a fragment shader gives no advantage on are delegated to
//! an embedded [`SoftwareRenderer`], which observes every pen primitive
//! this renderer receives.

use std::sync::Arc;

use crate::config::RenderConfig;
use crate::shader::ShaderVariants;
use crate::software::SoftwareRenderer;
use crate::texture_cache::CostumeTextureCache;

mod compositor;
mod construction;
mod queries;
mod readback;
mod stage;

/// Color format of every render target this backend owns. Plain (non-sRGB)
/// so the effect math sees the same 8-bit values the software backend does.
pub(crate) const RENDER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// The wgpu project renderer.
///
/// Construction is async because adapter and device acquisition are; tests
/// and simple embedders can drive it with `futures::executor::block_on`.
pub struct GpuRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    config: RenderConfig,
    zoom: f32,

    /// The composed frame, readable through [`GpuRenderer::read_pixels`].
    output: wgpu::Texture,
    output_view: wgpu::TextureView,

    /// Static unit-square vertex buffer shared by every sprite draw.
    quad_buffer: wgpu::Buffer,
    variants: ShaderVariants,
    textures: CostumeTextureCache,

    /// The persistent pen layer and its draw pipelines.
    pen_view: wgpu::TextureView,
    pen_dot_pipeline: wgpu::RenderPipeline,
    pen_line_pipeline: wgpu::RenderPipeline,
    pen_uniform_layout: wgpu::BindGroupLayout,
    composite_pipeline: wgpu::RenderPipeline,
    pen_composite_bind_group: wgpu::BindGroup,

    /// Software fallback for the queries that need full-stage compositing;
    /// pen primitives are mirrored into it.
    software: SoftwareRenderer,
}

impl GpuRenderer {
    pub fn config(&self) -> RenderConfig {
        self.config
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Size of the output texture in pixels.
    pub fn output_size(&self) -> (u32, u32) {
        (self.output.width(), self.output.height())
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }
}
