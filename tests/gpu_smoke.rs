//! GPU backend tests. These need a working adapter; on machines without
//! one (e.g. bare CI) each test logs the acquisition failure and passes
//! vacuously.

mod common;

use common::*;
use futures::executor::block_on;
use stagehand::{
    Filters, GpuRenderer, PenColor, ProjectRenderer, RenderConfig, RenderError,
};

fn try_renderer() -> Option<GpuRenderer> {
    match block_on(GpuRenderer::new(RenderConfig::default())) {
        Ok(renderer) => Some(renderer),
        Err(RenderError::ContextAcquisition(message)) => {
            eprintln!("skipping GPU test, no adapter: {message}");
            None
        }
        Err(other) => panic!("unexpected construction failure: {other}"),
    }
}

/// Demultiplied RGBA of one pixel in a tightly packed RGBA8 frame.
fn frame_pixel(frame: &[u8], width: u32, x: u32, y: u32) -> (u8, u8, u8, u8) {
    let i = ((y * width + x) * 4) as usize;
    let (r, g, b, a) = (frame[i], frame[i + 1], frame[i + 2], frame[i + 3]);
    if a == 0 || a == 255 {
        return (r, g, b, a);
    }
    let un = |c: u8| ((c as u32 * 255 + (a as u32 / 2)) / a as u32).min(255) as u8;
    (un(r), un(g), un(b), a)
}

#[test]
fn empty_frame_is_transparent() {
    let Some(mut r) = try_renderer() else { return };
    let stage = stagehand::Target::stage(vec![]);
    r.init(&stage).unwrap();
    let frame = r.read_pixels().unwrap();
    assert!(frame.chunks(4).all(|px| px[3] == 0));
}

#[test]
fn backdrop_and_centered_sprite_compose() {
    let Some(mut r) = try_renderer() else { return };
    let mut stage = stage_with_backdrop([0, 0, 255, 255]);
    stage.children.push(solid_sprite(20, 20, [255, 255, 255, 255]));
    r.init(&stage).unwrap();
    r.draw_frame(&stage).unwrap();

    let frame = r.read_pixels().unwrap();
    assert_eq!(frame_pixel(&frame, 480, 240, 180), (255, 255, 255, 255));
    assert_eq!(frame_pixel(&frame, 480, 10, 10), (0, 0, 255, 255));
}

#[test]
fn ghost_reduces_alpha_over_nothing() {
    let Some(mut r) = try_renderer() else { return };
    let mut stage = stagehand::Target::stage(vec![]);
    let mut sprite = solid_sprite(20, 20, [255, 0, 0, 255]);
    sprite.filters.ghost = 50.0;
    stage.children.push(sprite);
    r.init(&stage).unwrap();
    r.draw_frame(&stage).unwrap();

    let frame = r.read_pixels().unwrap();
    let (_, _, _, a) = frame_pixel(&frame, 480, 240, 180);
    assert!((a as i32 - 128).abs() <= 2, "alpha {a}");
}

#[test]
fn hue_shift_matches_the_software_backend() {
    let Some(mut r) = try_renderer() else { return };
    let mut stage = stagehand::Target::stage(vec![]);
    let mut sprite = solid_sprite(20, 20, [255, 0, 0, 255]);
    sprite.filters.color = 100.0;
    stage.children.push(sprite);
    r.init(&stage).unwrap();
    r.draw_frame(&stage).unwrap();

    let frame = r.read_pixels().unwrap();
    let (red, green, blue, _) = frame_pixel(&frame, 480, 240, 180);
    // Shader and CPU agree on the half-turn shift within a couple of
    // 8-bit units.
    assert!(red <= 2, "red {red}");
    assert!(green >= 253 && blue >= 253, "got ({red}, {green}, {blue})");
}

#[test]
fn pen_marks_compose_between_backdrop_and_sprites() {
    let Some(mut r) = try_renderer() else { return };
    let stage = stage_with_backdrop([0, 0, 0, 255]);
    r.init(&stage).unwrap();
    r.pen_dot(&PenColor::rgb(255, 0, 0), 8.0, 0.0, 0.0);
    r.draw_frame(&stage).unwrap();

    let frame = r.read_pixels().unwrap();
    let (red, _, _, a) = frame_pixel(&frame, 480, 240, 180);
    assert_eq!(a, 255);
    assert!(red >= 253, "red {red}");
}

#[test]
fn pen_clear_erases_gpu_pen_content() {
    let Some(mut r) = try_renderer() else { return };
    let stage = stage_with_backdrop([0, 0, 0, 255]);
    r.init(&stage).unwrap();
    r.pen_dot(&PenColor::rgb(255, 0, 0), 8.0, 0.0, 0.0);
    r.pen_clear();
    r.draw_frame(&stage).unwrap();

    let frame = r.read_pixels().unwrap();
    assert_eq!(frame_pixel(&frame, 480, 240, 180), (0, 0, 0, 255));
}

#[test]
fn whirl_forces_the_readback_query_path() {
    let Some(mut r) = try_renderer() else { return };
    let mut sprite = solid_sprite(20, 20, [255, 255, 255, 255]);
    sprite.filters = Filters {
        whirl: 360.0,
        ..Filters::default()
    };
    assert!(sprite.filters.shape_affecting());

    // A whirl rotates around the costume center: the center stays covered
    // and points outside the bounds stay empty.
    assert!(r.sprite_touches_point(&sprite, 0.0, 0.0).unwrap());
    assert!(!r.sprite_touches_point(&sprite, 100.0, 0.0).unwrap());
}

#[test]
fn point_queries_without_shape_filters_delegate_to_software() {
    let Some(mut r) = try_renderer() else { return };
    let sprite = solid_sprite(2, 2, [255, 255, 255, 255]);
    assert!(r.sprite_touches_point(&sprite, 0.0, 0.0).unwrap());
    assert!(!r.sprite_touches_point(&sprite, 10.0, 10.0).unwrap());
}

#[test]
fn touches_color_delegation_sees_mirrored_pen_state() {
    let Some(mut r) = try_renderer() else { return };
    let mut stage = stage_with_backdrop([0, 0, 0, 255]);
    stage.children.push(solid_sprite(10, 10, [255, 0, 0, 255]));
    r.init(&stage).unwrap();

    r.pen_dot(&PenColor::rgb(0, 255, 0), 6.0, 0.0, 0.0);
    assert!(r
        .sprite_touches_color(&stage, &stage.children[0], 0x00ff00)
        .unwrap());
}

#[test]
fn resize_scales_the_output_texture() {
    let Some(mut r) = try_renderer() else { return };
    let stage = stage_with_backdrop([0, 0, 255, 255]);
    r.init(&stage).unwrap();
    r.resize(2.0, &stage).unwrap();
    assert_eq!(r.output_size(), (960, 720));
    let frame = r.read_pixels().unwrap();
    assert_eq!(frame_pixel(&frame, 960, 480, 360), (0, 0, 255, 255));
}
