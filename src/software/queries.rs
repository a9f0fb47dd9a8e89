//! The pixel-sampling spatial queries.
//!
//! All four queries go through the same compositing code as rendering, so
//! a script observes exactly what the frame shows. The two working
//! surfaces are reused between calls and sized to the query rect; the
//! canvas `source-in`/`destination-in` operations are reproduced by
//! blitting one working surface over the other with the matching
//! tiny-skia blend mode across the full rect.

use tiny_skia::{BlendMode, FilterQuality, Pixmap, PixmapPaint, Transform};

use super::{draw_child_into, DrawPass, SoftwareRenderer};
use crate::color::pack_rgb;
use crate::error::RenderError;
use crate::target::{RotationStyle, Target};

/// Clamped integer size of a query rect; `None` when degenerate or NaN.
fn rect_size(width: f32, height: f32) -> Option<(u32, u32)> {
    if width >= 1.0 && height >= 1.0 {
        Some((width as u32, height as u32))
    } else {
        None
    }
}

fn blit_full(dst: &mut Pixmap, src: &Pixmap, blend: BlendMode) {
    let paint = PixmapPaint {
        opacity: 1.0,
        blend_mode: blend,
        quality: FilterQuality::Nearest,
    };
    dst.draw_pixmap(0, 0, src.as_ref(), &paint, Transform::identity(), None);
}

fn matches_color(pixel: tiny_skia::PremultipliedColorU8, color: u32) -> bool {
    if pixel.alpha() == 0 {
        return false;
    }
    let c = pixel.demultiply();
    pack_rgb(c.red(), c.green(), c.blue()) == color & 0xffffff
}

impl SoftwareRenderer {
    /// Point membership is answered from the costume raster itself: the
    /// query point is carried through the inverse of the sprite's
    /// rotation/mirror/scale chain and one texel is sampled.
    pub(crate) fn touches_point(&self, sprite: &Target, x: f32, y: f32) -> bool {
        if !sprite.rotated_bounds().contains(x, y) {
            return false;
        }
        let Some(costume) = sprite.current_costume() else {
            return false;
        };

        let mut cx = (x - sprite.scratch_x) / sprite.scale;
        let mut cy = (sprite.scratch_y - y) / sprite.scale;
        match sprite.rotation_style {
            RotationStyle::Normal if sprite.direction != 90.0 => {
                let radians = (90.0 - sprite.direction).to_radians();
                let (sin, cos) = radians.sin_cos();
                let ox = cx;
                cx = cos * ox - sin * cy;
                cy = sin * ox + cos * cy;
            }
            RotationStyle::LeftRight if sprite.direction < 0.0 => {
                cx = -cx;
            }
            _ => {}
        }

        let (rcx, rcy) = costume.rotation_center();
        let lod = costume.base_lod();
        let px = ((cx * costume.bitmap_resolution() + rcx).round() * lod.scale()).floor();
        let py = ((cy * costume.bitmap_resolution() + rcy).round() * lod.scale()).floor();
        lod.alpha_at(px as i32, py as i32) != 0
    }

    pub(crate) fn intersect_any(
        &mut self,
        sprite: &Target,
        others: &[&Target],
    ) -> Result<bool, RenderError> {
        let mb = sprite.rotated_bounds();
        for other in others {
            if !other.visible || std::ptr::eq(*other as *const Target, sprite as *const Target) {
                continue;
            }
            let ob = other.rotated_bounds();
            if !mb.overlaps(&ob) {
                continue;
            }

            let left = mb.left.max(ob.left);
            let top = mb.top.min(ob.top);
            let width = mb.right.min(ob.right) - left;
            let height = top - mb.bottom.max(ob.bottom);
            let Some((w, h)) = rect_size(width, height) else {
                continue;
            };

            let mut first = self.take_work_surface(0, w, h)?;
            let mut second = self.take_work_surface(1, w, h)?;
            let pass = DrawPass::query_rect(left, top, self.config.accurate_filters)
                .without_effects();
            draw_child_into(&mut first, &pass, sprite, &mut self.filter);
            draw_child_into(&mut second, &pass, other, &mut self.filter);
            blit_full(&mut first, &second, BlendMode::SourceIn);

            let hit = first.pixels().iter().any(|px| px.alpha() != 0);
            self.return_work_surface(0, first);
            self.return_work_surface(1, second);
            if hit {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Renders everything except `sprite` into the first working surface
    /// over the sprite's bounds, masks it with the sprite's own coverage,
    /// and scans for the queried color.
    pub(crate) fn touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        color: u32,
    ) -> Result<bool, RenderError> {
        let bounds = sprite.rotated_bounds();
        let Some((w, h)) = rect_size(bounds.width(), bounds.height()) else {
            return Ok(false);
        };

        let mut composed = self.take_work_surface(0, w, h)?;
        let mut mask = self.take_work_surface(1, w, h)?;
        let pass = DrawPass::query_rect(bounds.left, bounds.top, self.config.accurate_filters);
        self.draw_all_except(&mut composed, &pass, stage, sprite);
        draw_child_into(&mut mask, &pass.without_effects(), sprite, &mut self.filter);
        blit_full(&mut composed, &mask, BlendMode::DestinationIn);

        let hit = composed.pixels().iter().any(|px| matches_color(*px, color));
        self.return_work_surface(0, composed);
        self.return_work_surface(1, mask);
        Ok(hit)
    }

    pub(crate) fn color_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        sprite_color: u32,
        other_color: u32,
    ) -> Result<bool, RenderError> {
        let bounds = sprite.rotated_bounds();
        let Some((w, h)) = rect_size(bounds.width(), bounds.height()) else {
            return Ok(false);
        };

        let mut composed = self.take_work_surface(0, w, h)?;
        let mut own = self.take_work_surface(1, w, h)?;
        let pass = DrawPass::query_rect(bounds.left, bounds.top, self.config.accurate_filters);
        self.draw_all_except(&mut composed, &pass, stage, sprite);
        draw_child_into(&mut own, &pass, sprite, &mut self.filter);

        let hit = own
            .pixels()
            .iter()
            .zip(composed.pixels())
            .any(|(own_px, other_px)| {
                matches_color(*own_px, sprite_color) && matches_color(*other_px, other_color)
            });
        self.return_work_surface(0, composed);
        self.return_work_surface(1, own);
        Ok(hit)
    }

    /// The backdrop, the pen layer and every visible child but `skip`,
    /// composed in frame order.
    fn draw_all_except(
        &mut self,
        surface: &mut Pixmap,
        pass: &DrawPass,
        stage: &Target,
        skip: &Target,
    ) {
        draw_child_into(surface, pass, stage, &mut self.filter);
        Self::draw_pen_layer(surface, &self.pen_surface, &pass.base, self.pen_scale());
        for child in &stage.children {
            if child.visible && !std::ptr::eq(child as *const Target, skip as *const Target) {
                draw_child_into(surface, pass, child, &mut self.filter);
            }
        }
    }
}
