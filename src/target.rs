//! Sprites, the stage, and their stage-coordinate bounds.

use crate::costume::Costume;
use crate::filters::Filters;

/// How a sprite responds to its direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStyle {
    /// Free rotation around the costume's rotation center.
    #[default]
    Normal,
    /// Horizontal mirroring only, when the direction points left.
    LeftRight,
    /// Direction has no visual effect.
    None,
}

/// Discriminates the stage from its sprites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Stage,
    Sprite,
}

/// A positioned, oriented, filterable instance of a costume — either the
/// stage backdrop or one sprite.
///
/// The stage owns its sprites in `children`, ordered bottom to top; the
/// list never contains the stage itself. Direction follows the Scratch
/// convention: 90 points right, 0 points up.
#[derive(Debug, Clone)]
pub struct Target {
    pub kind: TargetKind,
    pub costumes: Vec<Costume>,
    pub current_costume: usize,
    pub scratch_x: f32,
    pub scratch_y: f32,
    pub direction: f32,
    pub scale: f32,
    pub rotation_style: RotationStyle,
    pub visible: bool,
    pub filters: Filters,
    /// Z-ordered sprites, stage only.
    pub children: Vec<Target>,
}

impl Target {
    pub fn stage(costumes: Vec<Costume>) -> Self {
        Self {
            kind: TargetKind::Stage,
            costumes,
            current_costume: 0,
            scratch_x: 0.0,
            scratch_y: 0.0,
            direction: 90.0,
            scale: 1.0,
            rotation_style: RotationStyle::Normal,
            visible: true,
            filters: Filters::default(),
            children: Vec::new(),
        }
    }

    pub fn sprite(costumes: Vec<Costume>) -> Self {
        Self {
            kind: TargetKind::Sprite,
            ..Self::stage(costumes)
        }
    }

    pub fn is_sprite(&self) -> bool {
        self.kind == TargetKind::Sprite
    }

    pub fn current_costume(&self) -> Option<&Costume> {
        self.costumes.get(self.current_costume)
    }

    /// The axis-aligned bounding box of this sprite after rotation, mirror
    /// and scale, in stage coordinates (Y up, `top > bottom`). A target
    /// without a costume has an empty box at its position.
    pub fn rotated_bounds(&self) -> Bounds {
        let Some(costume) = self.current_costume() else {
            return Bounds {
                left: self.scratch_x,
                right: self.scratch_x,
                top: self.scratch_y,
                bottom: self.scratch_y,
            };
        };

        let s = costume.scale() * self.scale;
        let (rcx, rcy) = costume.rotation_center();
        let mut left = -rcx * s;
        let mut top = rcy * s;
        let mut right = left + costume.width() * s;
        let mut bottom = top - costume.height() * s;

        match self.rotation_style {
            RotationStyle::Normal if self.direction != 90.0 => {
                // Rotate the four corners by (90 − direction) and take the
                // axis-aligned hull.
                let radians = (90.0 - self.direction).to_radians();
                let (sin, cos) = radians.sin_cos();
                let rotate = |x: f32, y: f32| (cos * x - sin * y, sin * x + cos * y);
                let corners = [
                    rotate(left, top),
                    rotate(right, top),
                    rotate(left, bottom),
                    rotate(right, bottom),
                ];
                left = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
                right = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
                bottom = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
                top = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
            }
            RotationStyle::LeftRight if self.direction < 0.0 => {
                let mirrored_left = -right;
                right = -left;
                left = mirrored_left;
            }
            _ => {}
        }

        Bounds {
            left: left + self.scratch_x,
            right: right + self.scratch_x,
            top: top + self.scratch_y,
            bottom: bottom + self.scratch_y,
        }
    }
}

/// An axis-aligned box in stage coordinates: Y up, so `top >= bottom`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

impl Bounds {
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.top - self.bottom
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.bottom && y <= self.top
    }

    /// Overlap test with non-strict rejection: boxes that merely share an
    /// edge do not overlap.
    pub fn overlaps(&self, other: &Bounds) -> bool {
        !(self.bottom >= other.top
            || other.bottom >= self.top
            || self.left >= other.right
            || other.left >= self.right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::Pixmap;

    fn sprite_2x2() -> Target {
        let costume = Costume::new("square", Pixmap::new(2, 2).unwrap(), 1.0, 1.0, 1.0);
        Target::sprite(vec![costume])
    }

    #[test]
    fn default_direction_bounds_are_centered() {
        let sprite = sprite_2x2();
        let b = sprite.rotated_bounds();
        assert_eq!(b, Bounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 });
    }

    #[test]
    fn bounds_translate_with_position() {
        let mut sprite = sprite_2x2();
        sprite.scratch_x = 10.0;
        sprite.scratch_y = -5.0;
        let b = sprite.rotated_bounds();
        assert_eq!(b.left, 9.0);
        assert_eq!(b.right, 11.0);
        assert_eq!(b.top, -4.0);
        assert_eq!(b.bottom, -6.0);
    }

    #[test]
    fn rotation_by_45_degrees_grows_the_box() {
        let mut sprite = sprite_2x2();
        sprite.direction = 45.0;
        let b = sprite.rotated_bounds();
        let expected = 2.0f32.sqrt();
        assert!((b.width() - expected).abs() < 1e-5);
        assert!((b.height() - expected).abs() < 1e-5);
    }

    #[test]
    fn rotation_by_180_keeps_the_box() {
        let mut sprite = sprite_2x2();
        sprite.direction = -90.0;
        let b = sprite.rotated_bounds();
        assert!((b.width() - 2.0).abs() < 1e-5);
        assert!((b.height() - 2.0).abs() < 1e-5);
    }

    #[test]
    fn left_right_mirrors_an_offset_center() {
        // Rotation center at the bitmap's left edge: the box extends right
        // of the position normally, left of it when mirrored.
        let costume = Costume::new("edge", Pixmap::new(2, 2).unwrap(), 1.0, 0.0, 1.0);
        let mut sprite = Target::sprite(vec![costume]);
        sprite.rotation_style = RotationStyle::LeftRight;
        let b = sprite.rotated_bounds();
        assert_eq!((b.left, b.right), (0.0, 2.0));
        sprite.direction = -90.0;
        let b = sprite.rotated_bounds();
        assert_eq!((b.left, b.right), (-2.0, 0.0));
    }

    #[test]
    fn rotation_style_none_ignores_direction() {
        let mut sprite = sprite_2x2();
        sprite.rotation_style = RotationStyle::None;
        sprite.direction = 37.0;
        assert_eq!(
            sprite.rotated_bounds(),
            Bounds { left: -1.0, right: 1.0, top: 1.0, bottom: -1.0 }
        );
    }

    #[test]
    fn scale_multiplies_the_box() {
        let mut sprite = sprite_2x2();
        sprite.scale = 3.0;
        let b = sprite.rotated_bounds();
        assert_eq!(b.width(), 6.0);
        assert_eq!(b.height(), 6.0);
    }

    #[test]
    fn touching_edges_do_not_overlap() {
        let a = Bounds { left: 0.0, right: 10.0, top: 10.0, bottom: 0.0 };
        let b = Bounds { left: 10.0, right: 20.0, top: 10.0, bottom: 0.0 };
        assert!(!a.overlaps(&b));
        let c = Bounds { left: 9.0, right: 20.0, top: 10.0, bottom: 0.0 };
        assert!(a.overlaps(&c));
        assert!(c.overlaps(&a));
    }
}
