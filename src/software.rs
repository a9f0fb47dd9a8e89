//! The self-contained software backend.
//!
//! Rasterizes with `tiny-skia` into three surfaces — stage backdrop, pen
//! layer and sprites — stacked in that z-order by the embedder. The
//! backdrop surface is re-rendered lazily; the pen surface persists across
//! frames and is only mutated by the pen operations.

use ahash::AHashMap;
use tiny_skia::Pixmap;

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::{STAGE_HEIGHT, STAGE_WIDTH};

mod compositor;
mod queries;
mod stage;

pub(crate) use compositor::{draw_child_into, DrawPass, FilterScratch};

/// The tiny-skia project renderer.
///
/// Owns the three output surfaces plus two working surfaces reused by the
/// pixel queries. Queries must not be issued reentrantly — a draw callback
/// must not itself query the renderer that is drawing.
pub struct SoftwareRenderer {
    config: RenderConfig,
    zoom: f32,

    sprite_surface: Pixmap,
    stage_surface: Pixmap,
    pen_surface: Pixmap,

    /// Zoom the pen surface is currently allocated at.
    pen_zoom: f32,
    /// Whether the pen surface has content since the last clear.
    pen_dirty: bool,
    /// A shrink deferred until the next `pen_clear`.
    pending_pen_zoom: Option<f32>,

    /// Costume index currently rendered on the stage surface.
    rendered_backdrop: Option<usize>,

    work: [Option<Pixmap>; 2],
    filter: FilterScratch,
}

pub(crate) fn surface_size(zoom: f32, config_scale: u32) -> (u32, u32) {
    let s = zoom * config_scale as f32;
    (
        ((STAGE_WIDTH as f32 * s).round() as u32).max(1),
        ((STAGE_HEIGHT as f32 * s).round() as u32).max(1),
    )
}

fn new_surface(zoom: f32, config_scale: u32) -> Result<Pixmap, RenderError> {
    let (w, h) = surface_size(zoom, config_scale);
    Pixmap::new(w, h).ok_or(RenderError::Allocation("output surface"))
}

impl SoftwareRenderer {
    pub fn new(config: RenderConfig) -> Result<Self, RenderError> {
        let zoom = 1.0;
        Ok(Self {
            config,
            zoom,
            sprite_surface: new_surface(zoom, config.scale)?,
            stage_surface: new_surface(zoom, config.scale)?,
            pen_surface: new_surface(zoom, config.scale)?,
            pen_zoom: zoom,
            pen_dirty: false,
            pending_pen_zoom: None,
            rendered_backdrop: None,
            work: [None, None],
            filter: FilterScratch {
                scratch: None,
                hue_memo: AHashMap::new(),
            },
        })
    }

    pub fn config(&self) -> RenderConfig {
        self.config
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// The surface holding the composited sprites of the last frame.
    pub fn sprite_surface(&self) -> &Pixmap {
        &self.sprite_surface
    }

    /// The lazily re-rendered backdrop surface.
    pub fn stage_surface(&self) -> &Pixmap {
        &self.stage_surface
    }

    /// The persistent pen surface.
    pub fn pen_surface(&self) -> &Pixmap {
        &self.pen_surface
    }

    /// Scale from stage units to sprite-surface pixels.
    pub(crate) fn effective_scale(&self) -> f32 {
        self.zoom * self.config.scale as f32
    }

    /// Scale from stage units to pen-surface pixels.
    pub(crate) fn pen_scale(&self) -> f32 {
        self.pen_zoom * self.config.scale as f32
    }

    /// Hands out a cleared working surface of exactly `width × height`,
    /// reusing the previous allocation when the dimensions still match.
    pub(crate) fn take_work_surface(
        &mut self,
        slot: usize,
        width: u32,
        height: u32,
    ) -> Result<Pixmap, RenderError> {
        match self.work[slot].take() {
            Some(mut pixmap) if pixmap.width() == width && pixmap.height() == height => {
                pixmap.fill(tiny_skia::Color::TRANSPARENT);
                Ok(pixmap)
            }
            _ => Pixmap::new(width, height).ok_or(RenderError::Allocation("query working surface")),
        }
    }

    pub(crate) fn return_work_surface(&mut self, slot: usize, pixmap: Pixmap) {
        self.work[slot] = Some(pixmap);
    }
}
