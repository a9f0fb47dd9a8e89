//! The small linear-algebra kernel shared by both backends: 3×3 affine
//! matrices for the sprite transform chain, and the closed-form HSV
//! conversions that the accurate color effect relies on. The CPU versions
//! here and the WGSL versions in `shader.rs` must agree pixel-for-pixel.

/// A 3×3 row-major affine matrix. Points are column vectors `(x, y, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat3(pub [f32; 9]);

impl Mat3 {
    pub const IDENTITY: Self = Mat3([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);

    pub fn translation(tx: f32, ty: f32) -> Self {
        Mat3([1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0])
    }

    /// Rotation by `degrees`, counter-clockwise positive in the stage's
    /// Y-up convention.
    pub fn rotation(degrees: f32) -> Self {
        let radians = degrees.to_radians();
        let (sin, cos) = radians.sin_cos();
        Mat3([cos, -sin, 0.0, sin, cos, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        Mat3([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    /// Maps pixel coordinates `(0..width, 0..height)` to clip space with Y
    /// flipped, so that larger Y is further down on screen.
    pub fn projection(width: f32, height: f32) -> Self {
        Mat3([
            2.0 / width,
            0.0,
            -1.0,
            0.0,
            -2.0 / height,
            1.0,
            0.0,
            0.0,
            1.0,
        ])
    }

    /// Post-multiplies in place: `self = self × rhs`. The transform chain is
    /// built top-down, so the matrix applied last to a point is pushed first.
    pub fn multiply(&mut self, rhs: &Mat3) {
        let a = &self.0;
        let b = &rhs.0;
        let mut out = [0.0f32; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        self.0 = out;
    }

    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let m = &self.0;
        (m[0] * x + m[1] * y + m[2], m[3] * x + m[4] * y + m[5])
    }

    /// The matrix as three vec4-padded columns, which is how a WGSL
    /// `mat3x3<f32>` is laid out inside a uniform buffer.
    pub fn to_padded_columns(&self) -> [f32; 12] {
        let m = &self.0;
        [
            m[0], m[3], m[6], 0.0, //
            m[1], m[4], m[7], 0.0, //
            m[2], m[5], m[8], 0.0,
        ]
    }

    pub(crate) fn to_skia(&self) -> tiny_skia::Transform {
        let m = &self.0;
        tiny_skia::Transform::from_row(m[0], m[3], m[1], m[4], m[2], m[5])
    }
}

/// Converts 8-bit RGB to HSV with `h ∈ [0, 1)` and `s, v ∈ [0, 1]`.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (f32, f32, f32) {
    let r = r as f32 / 255.0;
    let g = g as f32 / 255.0;
    let b = b as f32 / 255.0;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { delta / max };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };

    (h, s, v)
}

/// Converts HSV back to 8-bit RGB. `h` is taken modulo 1 with negative wrap.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor();
    let f = h - sector;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector as i32 {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformed(m: &Mat3, x: f32, y: f32) -> (f32, f32) {
        m.transform_point(x, y)
    }

    #[test]
    fn identity_leaves_points_alone() {
        assert_eq!(transformed(&Mat3::IDENTITY, 3.0, -7.0), (3.0, -7.0));
    }

    #[test]
    fn translation_offsets_points() {
        let m = Mat3::translation(10.0, -5.0);
        assert_eq!(transformed(&m, 1.0, 2.0), (11.0, -3.0));
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        let m = Mat3::rotation(90.0);
        let (x, y) = transformed(&m, 1.0, 0.0);
        assert!(x.abs() < 1e-6);
        assert!((y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn projection_flips_y() {
        let m = Mat3::projection(480.0, 360.0);
        assert_eq!(transformed(&m, 0.0, 0.0), (-1.0, 1.0));
        assert_eq!(transformed(&m, 480.0, 360.0), (1.0, -1.0));
        assert_eq!(transformed(&m, 240.0, 180.0), (0.0, 0.0));
    }

    #[test]
    fn multiply_post_applies_rhs_first() {
        // Translate after scaling: scaling must not affect the offset.
        let mut m = Mat3::translation(100.0, 0.0);
        m.multiply(&Mat3::scaling(2.0, 2.0));
        assert_eq!(transformed(&m, 1.0, 1.0), (102.0, 2.0));
    }

    #[test]
    fn padded_columns_match_wgsl_layout() {
        let m = Mat3::translation(5.0, 6.0);
        let cols = m.to_padded_columns();
        // Third column carries the translation.
        assert_eq!(&cols[8..12], &[5.0, 6.0, 1.0, 0.0]);
        assert_eq!(cols[3], 0.0);
        assert_eq!(cols[7], 0.0);
    }

    #[test]
    fn hsv_round_trips_primaries() {
        for &(r, g, b) in &[
            (255u8, 0u8, 0u8),
            (0, 255, 0),
            (0, 0, 255),
            (255, 255, 0),
            (0, 255, 255),
            (255, 0, 255),
            (255, 255, 255),
            (0, 0, 0),
            (128, 64, 32),
        ] {
            let (h, s, v) = rgb_to_hsv(r, g, b);
            let (r2, g2, b2) = hsv_to_rgb(h, s, v);
            assert!(
                (r as i32 - r2 as i32).abs() <= 1
                    && (g as i32 - g2 as i32).abs() <= 1
                    && (b as i32 - b2 as i32).abs() <= 1,
                "({r},{g},{b}) -> ({h},{s},{v}) -> ({r2},{g2},{b2})"
            );
        }
    }

    #[test]
    fn hue_wraps_negative() {
        let (r, g, b) = hsv_to_rgb(-0.5, 1.0, 1.0);
        let (r2, g2, b2) = hsv_to_rgb(0.5, 1.0, 1.0);
        assert_eq!((r, g, b), (r2, g2, b2));
    }

    #[test]
    fn pure_red_has_zero_hue() {
        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!(h, 0.0);
        assert_eq!(s, 1.0);
        assert_eq!(v, 1.0);
    }
}
