//! Shared helpers for the renderer tests.
#![allow(dead_code)]

use stagehand::{Costume, Target};
use tiny_skia::Pixmap;

/// A pixmap filled with one straight-alpha RGBA color.
pub fn solid_pixmap(width: u32, height: u32, rgba: [u8; 4]) -> Pixmap {
    let mut pixmap = Pixmap::new(width, height).unwrap();
    let px = tiny_skia::ColorU8::from_rgba(rgba[0], rgba[1], rgba[2], rgba[3]).premultiply();
    for p in pixmap.pixels_mut() {
        *p = px;
    }
    pixmap
}

/// A costume with its rotation center in the middle of the bitmap.
pub fn solid_costume(name: &str, width: u32, height: u32, rgba: [u8; 4]) -> Costume {
    Costume::new(
        name,
        solid_pixmap(width, height, rgba),
        1.0,
        width as f32 / 2.0,
        height as f32 / 2.0,
    )
}

pub fn solid_sprite(width: u32, height: u32, rgba: [u8; 4]) -> Target {
    Target::sprite(vec![solid_costume("solid", width, height, rgba)])
}

/// A stage with a single solid backdrop.
pub fn stage_with_backdrop(rgba: [u8; 4]) -> Target {
    Target::stage(vec![solid_costume("backdrop", 480, 360, rgba)])
}

/// Demultiplied RGBA of one pixmap pixel.
pub fn pixel(pixmap: &Pixmap, x: u32, y: u32) -> (u8, u8, u8, u8) {
    let px = pixmap.pixel(x, y).expect("pixel in bounds");
    let c = px.demultiply();
    (c.red(), c.green(), c.blue(), c.alpha())
}

/// An expectation checked against a surface, in the style of a visual
/// regression list: coordinates, expected RGBA within a tolerance, and a
/// label for the failure message.
pub struct PixelExpectation {
    pub x: u32,
    pub y: u32,
    pub rgba: [u8; 4],
    pub tolerance: u8,
    pub label: &'static str,
}

impl PixelExpectation {
    pub fn exact(x: u32, y: u32, rgba: [u8; 4], label: &'static str) -> Self {
        Self {
            x,
            y,
            rgba,
            tolerance: 0,
            label,
        }
    }

    pub fn transparent(x: u32, y: u32, label: &'static str) -> Self {
        Self::exact(x, y, [0, 0, 0, 0], label)
    }
}

/// Checks expectations against a pixmap; returns one message per failure.
pub fn check_pixels(pixmap: &Pixmap, expectations: &[PixelExpectation]) -> Vec<String> {
    let mut failures = Vec::new();
    for e in expectations {
        let (r, g, b, a) = pixel(pixmap, e.x, e.y);
        let actual = [r, g, b, a];
        // A fully transparent pixel has no meaningful color.
        let matches = if e.rgba[3] == 0 {
            a == 0
        } else {
            actual
                .iter()
                .zip(&e.rgba)
                .all(|(got, want)| (*got as i32 - *want as i32).unsigned_abs() <= e.tolerance as u32)
        };
        if !matches {
            failures.push(format!(
                "{}: ({}, {}) expected {:?}, got {:?}",
                e.label, e.x, e.y, e.rgba, actual
            ));
        }
    }
    failures
}

/// Panics with every failure listed, like a visual regression report.
pub fn assert_pixels(pixmap: &Pixmap, expectations: &[PixelExpectation]) {
    let failures = check_pixels(pixmap, expectations);
    if !failures.is_empty() {
        panic!(
            "{} pixel expectation(s) failed:\n{}",
            failures.len(),
            failures.join("\n")
        );
    }
}
