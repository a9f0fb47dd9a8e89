//! Frame assembly, pen primitives and the trait surface of the GPU
//! backend.

use wgpu::util::DeviceExt;

use super::construction::create_output_texture;
use super::GpuRenderer;
use crate::color::PenColor;
use crate::error::RenderError;
use crate::renderer::{ProjectRenderer, SpriteRenderer};
use crate::shader::ALL_EFFECTS;
use crate::target::Target;
use crate::{STAGE_HEIGHT, STAGE_WIDTH};

/// Uniform block shared by the pen-dot and pen-line shaders: two NDC
/// points (center/radius for dots, endpoints for lines) and a color.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct PenUniforms {
    a: [f32; 2],
    b: [f32; 2],
    color: [f32; 4],
}

/// Stage coordinates to normalized device coordinates.
fn to_ndc(x: f32, y: f32) -> [f32; 2] {
    [x / 240.0, y / 180.0]
}

impl GpuRenderer {
    fn pen_uniform_bind_group(&self, uniforms: &PenUniforms) -> wgpu::BindGroup {
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("pen_uniforms"),
                contents: bytemuck::bytes_of(uniforms),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pen_uniform_bind_group"),
            layout: &self.pen_uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        })
    }

    /// Runs one pass over the pen framebuffer. The pen texture stays the
    /// render target between primitives; each submission loads the
    /// existing content.
    fn encode_pen_pass(
        &self,
        pipeline: &wgpu::RenderPipeline,
        bind_group: &wgpu::BindGroup,
        vertices: u32,
    ) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pen_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pen_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.pen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.draw(0..vertices, 0..1);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
    }

    pub(super) fn clear_pen_texture(&mut self) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pen_clear_encoder"),
            });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pen_clear_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.pen_view,
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
        self.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl SpriteRenderer for GpuRenderer {
    fn draw_child(&mut self, child: &Target) -> Result<(), RenderError> {
        let size = self.output_size();
        let scale = self.zoom * self.config.scale as f32;
        let Some(prepared) = self.prepare_child(child, ALL_EFFECTS, size, scale)? else {
            return Ok(());
        };
        let variant = self
            .variants
            .peek(ALL_EFFECTS)
            .expect("default variant compiled at construction");

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("draw_child_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("draw_child_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.encode_sprite_draws(&mut pass, &variant.pipeline, std::slice::from_ref(&prepared));
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl ProjectRenderer for GpuRenderer {
    fn init(&mut self, stage: &Target) -> Result<(), RenderError> {
        self.software.init(stage)?;
        self.clear_pen_texture();
        self.draw_frame(stage)
    }

    fn draw_frame(&mut self, stage: &Target) -> Result<(), RenderError> {
        let size = self.output_size();
        let scale = self.zoom * self.config.scale as f32;

        let backdrop = self.prepare_child(stage, ALL_EFFECTS, size, scale)?;
        let mut children = Vec::new();
        for child in &stage.children {
            if child.visible {
                if let Some(prepared) = self.prepare_child(child, ALL_EFFECTS, size, scale)? {
                    children.push(prepared);
                }
            }
        }

        let variant = self
            .variants
            .peek(ALL_EFFECTS)
            .expect("default variant compiled at construction");

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("frame_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.output_view,
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

            if let Some(backdrop) = &backdrop {
                self.encode_sprite_draws(
                    &mut pass,
                    &variant.pipeline,
                    std::slice::from_ref(backdrop),
                );
            }

            // Pen overlay between the backdrop and the sprites.
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &self.pen_composite_bind_group, &[]);
            pass.draw(0..3, 0..1);

            self.encode_sprite_draws(&mut pass, &variant.pipeline, &children);
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn on_stage_filters_changed(&mut self) {
        // Frames are rebuilt from scratch each draw; only the software
        // fallback caches the backdrop.
        self.software.on_stage_filters_changed();
    }

    fn resize(&mut self, zoom: f32, stage: &Target) -> Result<(), RenderError> {
        if zoom != self.zoom {
            self.zoom = zoom;
            let (output, output_view) = create_output_texture(&self.device, zoom, self.config.scale);
            self.output = output;
            self.output_view = output_view;
        }
        self.software.resize(zoom, stage)?;
        self.draw_frame(stage)
    }

    fn pen_clear(&mut self) {
        self.clear_pen_texture();
        self.software.pen_clear();
    }

    fn pen_dot(&mut self, color: &PenColor, size: f32, x: f32, y: f32) {
        let (r, g, b, a) = color.to_parts();
        let radius = size / 2.0;
        let uniforms = PenUniforms {
            a: to_ndc(x, y),
            b: [radius / 240.0, radius / 180.0],
            color: [r, g, b, a],
        };
        let bind_group = self.pen_uniform_bind_group(&uniforms);
        self.encode_pen_pass(&self.pen_dot_pipeline, &bind_group, 6);
        self.software.pen_dot(color, size, x, y);
    }

    fn pen_line(&mut self, color: &PenColor, size: f32, x1: f32, y1: f32, x2: f32, y2: f32) {
        let (r, g, b, a) = color.to_parts();
        let uniforms = PenUniforms {
            a: to_ndc(x1, y1),
            b: to_ndc(x2, y2),
            color: [r, g, b, a],
        };
        let bind_group = self.pen_uniform_bind_group(&uniforms);
        self.encode_pen_pass(&self.pen_line_pipeline, &bind_group, 2);
        self.software.pen_line(color, size, x1, y1, x2, y2);
    }

    fn pen_stamp(&mut self, sprite: &Target) -> Result<(), RenderError> {
        let Some(prepared) =
            self.prepare_child(sprite, ALL_EFFECTS, (STAGE_WIDTH, STAGE_HEIGHT), 1.0)?
        else {
            return Ok(());
        };
        let variant = self
            .variants
            .peek(ALL_EFFECTS)
            .expect("default variant compiled at construction");

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("pen_stamp_encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pen_stamp_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.pen_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.encode_sprite_draws(&mut pass, &variant.pipeline, std::slice::from_ref(&prepared));
        }
        self.queue.submit(std::iter::once(encoder.finish()));
        self.software.pen_stamp(sprite)
    }

    fn sprite_touches_point(
        &mut self,
        sprite: &Target,
        x: f32,
        y: f32,
    ) -> Result<bool, RenderError> {
        if sprite.filters.shape_affecting() {
            self.touches_point_readback(sprite, x, y)
        } else {
            self.software.sprite_touches_point(sprite, x, y)
        }
    }

    fn sprites_intersect(
        &mut self,
        sprite: &Target,
        others: &[&Target],
    ) -> Result<bool, RenderError> {
        // Requires compositing pairs of sprites; the CPU path is exact and
        // off the hot path.
        self.software.sprites_intersect(sprite, others)
    }

    fn sprite_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        color: u32,
    ) -> Result<bool, RenderError> {
        self.software.sprite_touches_color(stage, sprite, color)
    }

    fn sprite_color_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        sprite_color: u32,
        other_color: u32,
    ) -> Result<bool, RenderError> {
        self.software
            .sprite_color_touches_color(stage, sprite, sprite_color, other_color)
    }
}
