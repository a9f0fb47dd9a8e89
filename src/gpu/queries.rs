//! The accelerated point query.
//!
//! Only `sprite_touches_point` benefits from the GPU: with a
//! shape-affecting filter active, which pixels are covered is only known
//! to the shader, so the sprite is drawn with the shape-filters-only
//! variant into a one-shot scratch target and a single texel is read
//! back. The scratch texture and buffer are released before the query
//! returns.

use super::readback::map_buffer_bytes;
use super::{GpuRenderer, RENDER_FORMAT};
use crate::error::RenderError;
use crate::shader::ONLY_SHAPE_FILTERS;
use crate::target::Target;
use crate::{STAGE_HEIGHT, STAGE_WIDTH};

impl GpuRenderer {
    pub(super) fn touches_point_readback(
        &mut self,
        sprite: &Target,
        x: f32,
        y: f32,
    ) -> Result<bool, RenderError> {
        // Readback addresses pixels from the bottom-left of the
        // framebuffer, hence 180 + y rather than the top-left 180 − y used
        // everywhere else. Texture copies count rows from the top, so the
        // row index is flipped below.
        let px = (240.0 + x).floor();
        let py = (180.0 + y).floor();
        if px < 0.0 || py < 0.0 || px >= STAGE_WIDTH as f32 || py >= STAGE_HEIGHT as f32 {
            return Ok(false);
        }

        let Some(prepared) =
            self.prepare_child(sprite, ONLY_SHAPE_FILTERS, (STAGE_WIDTH, STAGE_HEIGHT), 1.0)?
        else {
            return Ok(false);
        };
        let variant = self
            .variants
            .peek(ONLY_SHAPE_FILTERS)
            .expect("shape-filter variant compiled at construction");
        debug_assert!(
            variant.has_flag(crate::shader::FLAG_WHIRL)
                && !variant.has_flag(crate::shader::FLAG_GHOST),
            "readback queries must use the shape-filters-only variant"
        );

        let scratch = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("touch_query_target"),
            size: wgpu::Extent3d {
                width: STAGE_WIDTH,
                height: STAGE_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: RENDER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let scratch_view = scratch.create_view(&wgpu::TextureViewDescriptor::default());

        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("touch_query_readback"),
            size: 4,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("touch_query_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("touch_query_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &scratch_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.encode_sprite_draws(&mut pass, &variant.pipeline, std::slice::from_ref(&prepared));
        }

        // Single-texel copy; a one-row copy needs no row padding.
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &scratch,
                mip_level: 0,
                origin: wgpu::Origin3d {
                    x: px as u32,
                    y: STAGE_HEIGHT - 1 - py as u32,
                    z: 0,
                },
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: None,
                    rows_per_image: None,
                },
            },
            wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let bytes = map_buffer_bytes(&self.device, &readback)?;
        Ok(bytes.get(3).copied().unwrap_or(0) != 0)
    }
}
