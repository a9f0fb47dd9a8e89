//! Frame assembly, the pen layer and resizing for the software backend.

use tiny_skia::{
    BlendMode, FilterQuality, LineCap, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use super::{draw_child_into, new_surface, surface_size, DrawPass, SoftwareRenderer};
use crate::color::PenColor;
use crate::error::RenderError;
use crate::matrix::Mat3;
use crate::renderer::{ProjectRenderer, SpriteRenderer};
use crate::target::Target;

impl SoftwareRenderer {
    fn frame_pass(&self) -> DrawPass {
        DrawPass::frame(
            self.effective_scale(),
            self.zoom,
            self.config.accurate_filters,
        )
    }

    fn render_backdrop(&mut self, stage: &Target) {
        self.stage_surface.fill(tiny_skia::Color::TRANSPARENT);
        let pass = self.frame_pass();
        draw_child_into(&mut self.stage_surface, &pass, stage, &mut self.filter);
        self.rendered_backdrop = Some(stage.current_costume);
    }

    /// Draws a slice of children in order onto the sprite surface,
    /// skipping invisible ones. Does not clear first.
    pub fn draw_objects(&mut self, children: &[Target]) {
        let pass = self.frame_pass();
        for child in children {
            if child.visible {
                draw_child_into(&mut self.sprite_surface, &pass, child, &mut self.filter);
            }
        }
    }

    fn pen_paint(color: &PenColor) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(color.to_skia());
        paint.anti_alias = true;
        paint
    }

    /// Draws the pen surface onto `surface` through `base`, covering the
    /// 480×360 stage rect regardless of the pen surface's own zoom.
    pub(crate) fn draw_pen_layer(surface: &mut Pixmap, pen: &Pixmap, base: &Mat3, pen_scale: f32) {
        let mut matrix = *base;
        matrix.multiply(&Mat3::scaling(1.0 / pen_scale, 1.0 / pen_scale));
        let paint = PixmapPaint {
            opacity: 1.0,
            blend_mode: BlendMode::SourceOver,
            quality: FilterQuality::Nearest,
        };
        surface.draw_pixmap(0, 0, pen.as_ref(), &paint, matrix.to_skia(), None);
    }
}

impl SpriteRenderer for SoftwareRenderer {
    fn draw_child(&mut self, child: &Target) -> Result<(), RenderError> {
        let pass = self.frame_pass();
        draw_child_into(&mut self.sprite_surface, &pass, child, &mut self.filter);
        Ok(())
    }
}

impl ProjectRenderer for SoftwareRenderer {
    fn init(&mut self, stage: &Target) -> Result<(), RenderError> {
        self.render_backdrop(stage);
        self.pen_clear();
        self.sprite_surface.fill(tiny_skia::Color::TRANSPARENT);
        Ok(())
    }

    fn draw_frame(&mut self, stage: &Target) -> Result<(), RenderError> {
        if self.rendered_backdrop != Some(stage.current_costume) {
            self.render_backdrop(stage);
        }
        self.sprite_surface.fill(tiny_skia::Color::TRANSPARENT);
        self.draw_objects(&stage.children);
        Ok(())
    }

    fn on_stage_filters_changed(&mut self) {
        self.rendered_backdrop = None;
    }

    fn resize(&mut self, zoom: f32, stage: &Target) -> Result<(), RenderError> {
        if zoom == self.zoom {
            return Ok(());
        }
        self.zoom = zoom;

        let (w, h) = surface_size(zoom, self.config.scale);
        if self.sprite_surface.width() != w || self.sprite_surface.height() != h {
            self.sprite_surface = new_surface(zoom, self.config.scale)?;
            self.stage_surface = new_surface(zoom, self.config.scale)?;
        }
        self.render_backdrop(stage);

        if zoom > self.pen_zoom {
            // Grow immediately, carrying the existing drawing along.
            let mut grown = new_surface(zoom, self.config.scale)?;
            let factor = zoom / self.pen_zoom;
            let paint = PixmapPaint {
                opacity: 1.0,
                blend_mode: BlendMode::Source,
                quality: FilterQuality::Bilinear,
            };
            grown.draw_pixmap(
                0,
                0,
                self.pen_surface.as_ref(),
                &paint,
                Transform::from_scale(factor, factor),
                None,
            );
            self.pen_surface = grown;
            self.pen_zoom = zoom;
            self.pending_pen_zoom = None;
        } else if zoom < self.pen_zoom {
            if self.pen_dirty {
                // Shrinking now would destroy detail; wait for the next
                // pen_clear.
                self.pending_pen_zoom = Some(zoom);
            } else {
                self.pen_surface = new_surface(zoom, self.config.scale)?;
                self.pen_zoom = zoom;
                self.pending_pen_zoom = None;
            }
        }
        Ok(())
    }

    fn pen_clear(&mut self) {
        if let Some(zoom) = self.pending_pen_zoom.take() {
            if let Ok(surface) = new_surface(zoom, self.config.scale) {
                self.pen_surface = surface;
                self.pen_zoom = zoom;
            }
        }
        self.pen_surface.fill(tiny_skia::Color::TRANSPARENT);
        self.pen_dirty = false;
    }

    fn pen_dot(&mut self, color: &PenColor, size: f32, x: f32, y: f32) {
        let scale = self.pen_scale();
        let Some(path) = PathBuilder::from_circle(240.0 + x, 180.0 - y, size / 2.0) else {
            return;
        };
        self.pen_surface.fill_path(
            &path,
            &Self::pen_paint(color),
            tiny_skia::FillRule::Winding,
            Transform::from_scale(scale, scale),
            None,
        );
        self.pen_dirty = true;
    }

    fn pen_line(&mut self, color: &PenColor, size: f32, x1: f32, y1: f32, x2: f32, y2: f32) {
        let scale = self.pen_scale();
        let (mut sx1, mut sy1) = (240.0 + x1, 180.0 - y1);
        let (mut sx2, mut sy2) = (240.0 + x2, 180.0 - y2);
        // Odd widths land between pixel centers; shift them onto the grid
        // so a width-1 line fills exactly one row. Only meaningful while
        // the pen surface is unzoomed.
        if self.pen_zoom == 1.0 {
            let fraction = size.rem_euclid(2.0);
            if fraction > 0.5 && fraction < 1.5 {
                sx1 -= 0.5;
                sy1 -= 0.5;
                sx2 -= 0.5;
                sy2 -= 0.5;
            }
        }

        let mut builder = PathBuilder::new();
        builder.move_to(sx1, sy1);
        builder.line_to(sx2, sy2);
        let Some(path) = builder.finish() else {
            return;
        };
        let stroke = Stroke {
            width: size,
            line_cap: LineCap::Round,
            ..Stroke::default()
        };
        self.pen_surface.stroke_path(
            &path,
            &Self::pen_paint(color),
            &stroke,
            Transform::from_scale(scale, scale),
            None,
        );
        self.pen_dirty = true;
    }

    fn pen_stamp(&mut self, sprite: &Target) -> Result<(), RenderError> {
        let scale = self.pen_scale();
        let pass = DrawPass {
            base: Mat3::scaling(scale, scale),
            snap_scale: scale,
            lod_scale: self.pen_zoom,
            no_effects: false,
            accurate: self.config.accurate_filters,
            blend: BlendMode::SourceOver,
        };
        draw_child_into(&mut self.pen_surface, &pass, sprite, &mut self.filter);
        self.pen_dirty = true;
        Ok(())
    }

    fn sprite_touches_point(
        &mut self,
        sprite: &Target,
        x: f32,
        y: f32,
    ) -> Result<bool, RenderError> {
        Ok(self.touches_point(sprite, x, y))
    }

    fn sprites_intersect(
        &mut self,
        sprite: &Target,
        others: &[&Target],
    ) -> Result<bool, RenderError> {
        self.intersect_any(sprite, others)
    }

    fn sprite_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        color: u32,
    ) -> Result<bool, RenderError> {
        self.touches_color(stage, sprite, color)
    }

    fn sprite_color_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        sprite_color: u32,
        other_color: u32,
    ) -> Result<bool, RenderError> {
        self.color_touches_color(stage, sprite, sprite_color, other_color)
    }
}
