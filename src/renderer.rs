//! The renderer traits shared by the GPU and software backends.

use crate::color::PenColor;
use crate::error::RenderError;
use crate::target::Target;

/// Draws a single sprite or the stage onto the renderer's output surface
/// using its current transform state.
pub trait SpriteRenderer {
    fn draw_child(&mut self, child: &Target) -> Result<(), RenderError>;
}

/// A full project renderer: frame assembly, the pen layer, and the spatial
/// queries scripting primitives rely on.
///
/// All operations run on one thread, serialized by the host's frame loop.
/// Queries are synchronous and reflect the state as of the last completed
/// frame plus any pen writes since then; they must not be issued
/// reentrantly from inside a draw.
pub trait ProjectRenderer: SpriteRenderer {
    /// Performs the initial render of the stage backdrop and clears the pen
    /// layer. Call once before the first frame.
    fn init(&mut self, stage: &Target) -> Result<(), RenderError>;

    /// Clears the output, draws the stage backdrop with its filters, the
    /// pen layer on top of it, then every visible child in z-order.
    fn draw_frame(&mut self, stage: &Target) -> Result<(), RenderError>;

    /// Marks the stage backdrop stale so the next frame re-renders it even
    /// though the costume index is unchanged.
    fn on_stage_filters_changed(&mut self);

    /// Changes the stage zoom. The backdrop is re-rendered at the new zoom;
    /// the pen layer only ever grows (a shrink is deferred until the next
    /// [`ProjectRenderer::pen_clear`] while it holds content).
    fn resize(&mut self, zoom: f32, stage: &Target) -> Result<(), RenderError>;

    /// Clears the pen layer to transparent and commits any pending zoom
    /// change.
    fn pen_clear(&mut self);

    /// Fills a circle of diameter `size` centered at the stage point
    /// `(x, y)`.
    fn pen_dot(&mut self, color: &PenColor, size: f32, x: f32, y: f32);

    /// Strokes a round-capped line between two stage points.
    fn pen_line(&mut self, color: &PenColor, size: f32, x1: f32, y1: f32, x2: f32, y2: f32);

    /// Composites a sprite onto the pen layer through the regular draw
    /// path; effects are honored.
    fn pen_stamp(&mut self, sprite: &Target) -> Result<(), RenderError>;

    /// Whether the sprite's costume has a non-transparent pixel at the
    /// stage point `(x, y)`.
    fn sprite_touches_point(&mut self, sprite: &Target, x: f32, y: f32)
        -> Result<bool, RenderError>;

    /// Whether any visible sprite in `others` overlaps `sprite` on a pixel
    /// where both have non-zero alpha.
    fn sprites_intersect(
        &mut self,
        sprite: &Target,
        others: &[&Target],
    ) -> Result<bool, RenderError>;

    /// Whether the composed image of everything except `sprite` shows the
    /// 24-bit color `color` somewhere under a non-transparent pixel of
    /// `sprite`.
    fn sprite_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        color: u32,
    ) -> Result<bool, RenderError>;

    /// Whether a pixel of `sprite` matching `sprite_color` sits on top of a
    /// composed pixel matching `other_color`.
    fn sprite_color_touches_color(
        &mut self,
        stage: &Target,
        sprite: &Target,
        sprite_color: u32,
        other_color: u32,
    ) -> Result<bool, RenderError>;
}
