//! The per-child raster draw shared by frames, pen stamps and queries.

use ahash::AHashMap;
use tiny_skia::{BlendMode, FilterQuality, Pixmap, PixmapPaint};

use crate::costume::CostumeLod;
use crate::filters::Filters;
use crate::matrix::{hsv_to_rgb, rgb_to_hsv, Mat3};
use crate::target::{RotationStyle, Target};

/// Transform and mode state for one sequence of child draws, the analogue
/// of saved 2D-canvas state.
pub(crate) struct DrawPass {
    /// Transform applied before the child's own chain. Carries the surface
    /// scale for frame draws and the rect offset for queries.
    pub base: Mat3,
    /// The coordinate grid positions are snapped to (product of stage zoom
    /// and the config scale; 1 for query rects).
    pub snap_scale: f32,
    /// Stage zoom used to pick a costume LOD.
    pub lod_scale: f32,
    /// Suppresses ghost/brightness/color, used by queries that only care
    /// about coverage.
    pub no_effects: bool,
    /// Accurate (Scratch-exact) vs CSS-approximate color math.
    pub accurate: bool,
    pub blend: BlendMode,
}

impl DrawPass {
    pub(crate) fn frame(scale: f32, zoom: f32, accurate: bool) -> Self {
        Self {
            base: Mat3::scaling(scale, scale),
            snap_scale: scale,
            lod_scale: zoom,
            no_effects: false,
            accurate,
            blend: BlendMode::SourceOver,
        }
    }

    /// A pass rendering into a query rect whose top-left screen corner is
    /// `(240 + left, 180 − top)`.
    pub(crate) fn query_rect(left: f32, top: f32, accurate: bool) -> Self {
        Self {
            base: Mat3::translation(-(240.0 + left), -(180.0 - top)),
            snap_scale: 1.0,
            lod_scale: 1.0,
            no_effects: false,
            accurate,
            blend: BlendMode::SourceOver,
        }
    }

    pub(crate) fn without_effects(mut self) -> Self {
        self.no_effects = true;
        self
    }
}

/// Scratch storage for the pixel-filter path: one reusable pixmap plus the
/// hue-shift memo keyed by packed `0xRRGGBB`.
pub(crate) struct FilterScratch {
    pub scratch: Option<Pixmap>,
    pub hue_memo: AHashMap<u32, [u8; 3]>,
}

/// Draws one sprite or the stage onto `surface`. Children without a
/// current costume and destination rects under one logical unit are
/// silently skipped.
pub(crate) fn draw_child_into(
    surface: &mut Pixmap,
    pass: &DrawPass,
    child: &Target,
    filter: &mut FilterScratch,
) {
    let Some(costume) = child.current_costume() else {
        return;
    };

    // Snap the sprite origin to the effective pixel grid to avoid seam
    // shimmer on costume edges.
    let snap = |v: f32| (v * pass.snap_scale).trunc() / pass.snap_scale;
    let mut matrix = pass.base;
    matrix.multiply(&Mat3::translation(
        snap(child.scratch_x + 240.0),
        snap(180.0 - child.scratch_y),
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
        object_scale *= child.scale;
    }

    let width = costume.width() * object_scale;
    let height = costume.height() * object_scale;
    if !(width >= 1.0) || !(height >= 1.0) {
        return;
    }

    let lod = costume.lod(object_scale * pass.lod_scale);
    let (rcx, rcy) = costume.rotation_center();
    matrix.multiply(&Mat3::translation(-rcx * object_scale, -rcy * object_scale));
    matrix.multiply(&Mat3::scaling(
        width / lod.width() as f32,
        height / lod.height() as f32,
    ));

    let opacity = if pass.no_effects {
        1.0
    } else {
        child.filters.ghost_opacity()
    };
    let paint = PixmapPaint {
        opacity,
        blend_mode: pass.blend,
        quality: FilterQuality::Nearest,
    };
    let transform = matrix.to_skia();

    let needs_pixel_filters =
        !pass.no_effects && (child.filters.color != 0.0 || child.filters.brightness != 0.0);
    if needs_pixel_filters {
        apply_color_filters(lod, &child.filters, pass.accurate, filter);
        let filtered = filter
            .scratch
            .as_ref()
            .expect("filter scratch was just filled");
        surface.draw_pixmap(0, 0, filtered.as_ref(), &paint, transform, None);
    } else {
        surface.draw_pixmap(0, 0, lod.pixmap().as_ref(), &paint, transform, None);
    }
}

/// Fills `filter.scratch` with the LOD bitmap after the color and
/// brightness effects.
fn apply_color_filters(lod: &CostumeLod, filters: &Filters, accurate: bool, filter: &mut FilterScratch) {
    let (w, h) = (lod.width(), lod.height());
    let reuse = matches!(&filter.scratch, Some(p) if p.width() == w && p.height() == h);
    if !reuse {
        filter.scratch = Pixmap::new(w, h);
    }
    let Some(scratch) = filter.scratch.as_mut() else {
        return;
    };

    filter.hue_memo.clear();
    let shift = filters.color_shift();
    let brightness = filters.brightness_offset() * 255.0;
    let css_brightness = (100.0 + filters.brightness).max(0.0) / 100.0;
    let theta = (filters.color / 200.0 * 360.0).to_radians();
    let (sin, cos) = theta.sin_cos();

    let src = lod.pixmap().pixels();
    let dst = scratch.pixels_mut();
    for (out, px) in dst.iter_mut().zip(src) {
        let c = px.demultiply();
        let (mut r, mut g, mut b) = (c.red(), c.green(), c.blue());
        let a = c.alpha();

        if accurate {
            if filters.color != 0.0 {
                let key = crate::color::pack_rgb(r, g, b);
                let shifted = *filter.hue_memo.entry(key).or_insert_with(|| {
                    let (mut hue, mut sat, mut val) = rgb_to_hsv(r, g, b);
                    // Scratch forces darks and grays to a visible color
                    // before shifting the hue.
                    if val < 0.055 {
                        hue = 0.0;
                        sat = 1.0;
                        val = 0.055;
                    } else if sat < 0.09 {
                        hue = 0.0;
                        sat = 0.09;
                    }
                    let (nr, ng, nb) = hsv_to_rgb(hue + shift, sat, val);
                    [nr, ng, nb]
                });
                [r, g, b] = shifted;
            }
            if filters.brightness != 0.0 {
                r = (r as f32 + brightness).clamp(0.0, 255.0) as u8;
                g = (g as f32 + brightness).clamp(0.0, 255.0) as u8;
                b = (b as f32 + brightness).clamp(0.0, 255.0) as u8;
            }
        } else {
            // The CSS approximation in list order: brightness() first, then
            // hue-rotate() with the filter-effects color matrix.
            if filters.brightness != 0.0 {
                r = (r as f32 * css_brightness).clamp(0.0, 255.0) as u8;
                g = (g as f32 * css_brightness).clamp(0.0, 255.0) as u8;
                b = (b as f32 * css_brightness).clamp(0.0, 255.0) as u8;
            }
            if filters.color != 0.0 {
                let (rf, gf, bf) = (r as f32, g as f32, b as f32);
                let nr = rf * (0.213 + cos * 0.787 - sin * 0.213)
                    + gf * (0.715 - cos * 0.715 - sin * 0.715)
                    + bf * (0.072 - cos * 0.072 + sin * 0.928);
                let ng = rf * (0.213 - cos * 0.213 + sin * 0.143)
                    + gf * (0.715 + cos * 0.285 + sin * 0.140)
                    + bf * (0.072 - cos * 0.072 - sin * 0.283);
                let nb = rf * (0.213 - cos * 0.213 - sin * 0.787)
                    + gf * (0.715 - cos * 0.715 + sin * 0.715)
                    + bf * (0.072 + cos * 0.928 + sin * 0.072);
                r = nr.clamp(0.0, 255.0) as u8;
                g = ng.clamp(0.0, 255.0) as u8;
                b = nb.clamp(0.0, 255.0) as u8;
            }
        }

        *out = tiny_skia::ColorU8::from_rgba(r, g, b, a).premultiply();
    }
}
