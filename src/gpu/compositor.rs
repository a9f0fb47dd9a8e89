//! Per-child draw preparation: transform chain, uniform plumbing, and the
//! prepared state a render pass consumes.

use bytemuck::Zeroable;
use wgpu::util::DeviceExt;

use super::GpuRenderer;
use crate::error::RenderError;
use crate::matrix::Mat3;
use crate::target::{RotationStyle, Target};

/// One sprite quad's uniform block. The layout mirrors `SpriteUniforms`
/// in the WGSL source: a vec4-padded 3×3 matrix followed by the effect
/// scalars, padded to a 16-byte multiple.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(super) struct SpriteUniforms {
    transform: [f32; 12],
    dimensions: [f32; 2],
    mosaic: f32,
    pixelate: f32,
    whirl: f32,
    fisheye: f32,
    opacity: f32,
    brightness: f32,
    color_shift: f32,
    _pad: [f32; 3],
}

/// Everything a render pass needs to draw one child.
pub(super) struct PreparedDraw {
    pub uniform_bind_group: wgpu::BindGroup,
    pub texture_bind_group: std::sync::Arc<wgpu::BindGroup>,
}

impl GpuRenderer {
    /// Builds the transform and uniforms for one child and ensures its
    /// costume texture exists. Returns `None` for children without a
    /// costume or with a sub-pixel destination rect.
    ///
    /// `target_size` is the render target in pixels and `global_scale` the
    /// stage-unit-to-pixel factor of that target.
    pub(super) fn prepare_child(
        &mut self,
        child: &Target,
        flags: &[&str],
        target_size: (u32, u32),
        global_scale: f32,
    ) -> Result<Option<PreparedDraw>, RenderError> {
        let Some(costume) = child.current_costume() else {
            return Ok(None);
        };

        let mut matrix = Mat3::projection(target_size.0 as f32, target_size.1 as f32);
        matrix.multiply(&Mat3::scaling(global_scale, global_scale));
        matrix.multiply(&Mat3::translation(
            (child.scratch_x + 240.0).trunc(),
            (180.0 - child.scratch_y).trunc(),
        ));

        let mut object_scale = costume.scale();
        if child.is_sprite() {
            match child.rotation_style {
                RotationStyle::Normal => {
                    if child.direction != 90.0 {
                        matrix.multiply(&Mat3::rotation(child.direction - 90.0));
                    }
                }
                RotationStyle::LeftRight => {
                    if child.direction < 0.0 {
                        matrix.multiply(&Mat3::scaling(-1.0, 1.0));
                    }
                }
                RotationStyle::None => {}
            }
            if child.scale != 1.0 {
                matrix.multiply(&Mat3::scaling(child.scale, child.scale));
            }
            object_scale *= child.scale;
        }

        if !(costume.width() * object_scale >= 1.0) || !(costume.height() * object_scale >= 1.0) {
            return Ok(None);
        }

        if costume.scale() != 1.0 {
            matrix.multiply(&Mat3::scaling(costume.scale(), costume.scale()));
        }
        let (rcx, rcy) = costume.rotation_center();
        matrix.multiply(&Mat3::translation(-rcx, -rcy));
        matrix.multiply(&Mat3::scaling(costume.width(), costume.height()));

        let lod = costume.lod(1.0).clone();

        let filters = &child.filters;
        let mut uniforms = SpriteUniforms::zeroed();
        uniforms.transform = matrix.to_padded_columns();
        {
            let variant = self.variants.get_or_compile(&self.device, flags)?;
            // Every variant transforms vertices; anything else indicates a
            // caller/variant mismatch.
            variant.expect_uniform("transform")?;
            if variant.has_uniform("dimensions") {
                uniforms.dimensions = [lod.width() as f32, lod.height() as f32];
            }
            if variant.has_uniform("mosaic") {
                uniforms.mosaic = filters.mosaic_steps();
            }
            if variant.has_uniform("pixelate") {
                uniforms.pixelate = filters.pixelate_size() * lod.scale();
            }
            if variant.has_uniform("whirl") {
                uniforms.whirl = filters.whirl_radians();
            }
            if variant.has_uniform("fisheye") {
                uniforms.fisheye = filters.fisheye_power();
            }
            if variant.has_uniform("opacity") {
                uniforms.opacity = filters.ghost_opacity();
            }
            if variant.has_uniform("brightness") {
                uniforms.brightness = filters.brightness_offset();
            }
            if variant.has_uniform("color_shift") {
                uniforms.color_shift = filters.color_shift();
            }
        }

        let uniform_buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("sprite_uniforms"),
                contents: bytemuck::bytes_of(&uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniform_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sprite_uniform_bind_group"),
            layout: &self.variants.layouts().uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_bind_group = self.textures.bind_group_for(
            &self.device,
            &self.queue,
            &self.variants.layouts().texture_layout,
            &lod,
        );

        Ok(Some(PreparedDraw {
            uniform_bind_group,
            texture_bind_group,
        }))
    }

    /// Encodes one already-begun render pass drawing `draws` with the
    /// given variant's pipeline.
    pub(super) fn encode_sprite_draws(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        pipeline: &wgpu::RenderPipeline,
        draws: &[PreparedDraw],
    ) {
        pass.set_pipeline(pipeline);
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        for draw in draws {
            pass.set_bind_group(0, &draw.uniform_bind_group, &[]);
            pass.set_bind_group(1, draw.texture_bind_group.as_ref(), &[]);
            pass.draw(0..6, 0..1);
        }
    }
}
