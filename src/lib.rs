//! # Stagehand
//!
//! Stagehand is a compositor for a Scratch-compatible stage. It renders a
//! backdrop, a persistent pen drawing layer and a z-ordered list of sprites
//! into a single frame, and answers the pixel-exact spatial queries that
//! scripting primitives are built on: point-in-sprite, sprite-sprite
//! intersection, sprite-touches-color and color-touches-color.
//!
//! Two backends are provided behind the same [`ProjectRenderer`] trait:
//!
//! - [`GpuRenderer`] rasterizes sprites with [`wgpu`](https://crates.io/crates/wgpu),
//!   evaluating the Scratch image effects (ghost, brightness, color, mosaic,
//!   pixelate, whirl, fisheye) in a fragment shader. Queries that depend on
//!   shape-altering effects read pixels back from a scratch render target;
//!   everything else is delegated to an embedded software renderer.
//! - [`SoftwareRenderer`] is self-contained and rasterizes through
//!   [`tiny-skia`](https://crates.io/crates/tiny-skia). It owns three
//!   surfaces (stage, pen, sprites) that an embedder composites in that
//!   z-order.
//!
//! The stage is the fixed 480×360 Scratch grid with its origin at the
//! center and +Y pointing up. Screen space is `480·scale × 360·scale`
//! pixels with the origin at the top-left; the mapping is
//! `screen = (x + 240, 180 − y) · scale`.
//!
//! ## Basic usage
//!
//! ```no_run
//! use stagehand::{Costume, ProjectRenderer, RenderConfig, SoftwareRenderer, Target};
//!
//! let backdrop = tiny_skia::Pixmap::new(480, 360).unwrap();
//! let mut stage = Target::stage(vec![Costume::new("backdrop", backdrop, 1.0, 240.0, 180.0)]);
//! stage.children.push(Target::sprite(vec![/* costumes */]));
//!
//! let mut renderer = SoftwareRenderer::new(RenderConfig::default()).unwrap();
//! renderer.init(&stage).unwrap();
//! renderer.draw_frame(&stage).unwrap();
//! let touching = renderer.sprite_touches_point(&stage.children[0], 0.0, 0.0).unwrap();
//! # let _ = touching;
//! ```

pub use tiny_skia;
pub use wgpu;

mod color;
mod config;
mod costume;
mod error;
mod filters;
mod gpu;
mod matrix;
mod renderer;
mod shader;
mod software;
mod target;
mod texture_cache;

pub use color::PenColor;
pub use config::RenderConfig;
pub use costume::{Costume, CostumeLod, LodId};
pub use error::RenderError;
pub use filters::Filters;
pub use gpu::GpuRenderer;
pub use matrix::Mat3;
pub use renderer::{ProjectRenderer, SpriteRenderer};
pub use software::SoftwareRenderer;
pub use target::{Bounds, RotationStyle, Target, TargetKind};

/// Logical stage width in Scratch units.
pub const STAGE_WIDTH: u32 = 480;
/// Logical stage height in Scratch units.
pub const STAGE_HEIGHT: u32 = 360;
