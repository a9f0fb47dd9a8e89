//! The per-sprite effect record and the unit conversions that turn raw
//! filter values into the quantities the shaders and the raster paths
//! consume.

/// The six Scratch image effect channels of a sprite or the stage.
///
/// `ghost` is an opacity reduction in `[0, 100]`, `brightness` is an
/// additive offset in `[-100, 100]`, `color` is a hue shift in units of
/// 1/200 of a full turn. The four remaining channels distort texture
/// coordinates and may be any value; zero disables them.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Filters {
    pub ghost: f32,
    pub brightness: f32,
    pub color: f32,
    pub mosaic: f32,
    pub pixelate: f32,
    pub whirl: f32,
    pub fisheye: f32,
}

impl Filters {
    /// True when any effect that alters texture coordinates is active.
    /// Shape-affecting effects force the GPU backend onto its readback
    /// query path; color-only effects never change which pixels are opaque.
    pub fn shape_affecting(&self) -> bool {
        self.fisheye != 0.0 || self.mosaic != 0.0 || self.pixelate != 0.0 || self.whirl != 0.0
    }

    /// A CSS filter string approximating the color effects, e.g.
    /// `"brightness(120%) hue-rotate(90deg)"`. Ghost is intentionally not
    /// part of the string: callers apply it through the surface's global
    /// alpha, which every raster target supports.
    pub fn css_approximation(&self) -> String {
        let mut css = String::new();
        if self.brightness != 0.0 {
            css.push_str(&format!("brightness({}%)", 100.0 + self.brightness));
        }
        if self.color != 0.0 {
            if !css.is_empty() {
                css.push(' ');
            }
            css.push_str(&format!("hue-rotate({}deg)", self.color / 200.0 * 360.0));
        }
        css
    }

    /// Opacity after the ghost effect, clamped to `[0, 1]`.
    pub fn ghost_opacity(&self) -> f32 {
        (1.0 - self.ghost / 100.0).clamp(0.0, 1.0)
    }

    /// Brightness as a per-channel offset in `[-1, 1]`.
    pub fn brightness_offset(&self) -> f32 {
        self.brightness.clamp(-100.0, 100.0) / 100.0
    }

    /// Hue shift as a fraction of a full turn.
    pub fn color_shift(&self) -> f32 {
        self.color / 200.0
    }

    /// Mosaic tile count along each axis, clamped to `[1, 512]`.
    pub fn mosaic_steps(&self) -> f32 {
        ((self.mosaic.abs() + 10.0) / 10.0).round().clamp(1.0, 512.0)
    }

    /// Pixelate block size in texels.
    pub fn pixelate_size(&self) -> f32 {
        self.pixelate.abs() / 10.0
    }

    /// Whirl angle in radians. Negated so that positive whirl twists the
    /// same direction Scratch does.
    pub fn whirl_radians(&self) -> f32 {
        -self.whirl.to_radians()
    }

    /// Fisheye exponent, never negative.
    pub fn fisheye_power(&self) -> f32 {
        ((self.fisheye + 100.0) / 100.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filters_are_not_shape_affecting() {
        assert!(!Filters::default().shape_affecting());
    }

    #[test]
    fn each_shape_channel_is_shape_affecting() {
        for f in [
            Filters { mosaic: 10.0, ..Default::default() },
            Filters { pixelate: 10.0, ..Default::default() },
            Filters { whirl: -45.0, ..Default::default() },
            Filters { fisheye: 1.0, ..Default::default() },
        ] {
            assert!(f.shape_affecting(), "{f:?}");
        }
        let color_only = Filters {
            ghost: 50.0,
            brightness: -20.0,
            color: 25.0,
            ..Default::default()
        };
        assert!(!color_only.shape_affecting());
    }

    #[test]
    fn css_approximation_skips_zero_channels() {
        assert_eq!(Filters::default().css_approximation(), "");
        let f = Filters { brightness: 20.0, ..Default::default() };
        assert_eq!(f.css_approximation(), "brightness(120%)");
        let f = Filters { color: 100.0, ..Default::default() };
        assert_eq!(f.css_approximation(), "hue-rotate(180deg)");
        let f = Filters { brightness: -50.0, color: 50.0, ..Default::default() };
        assert_eq!(f.css_approximation(), "brightness(50%) hue-rotate(90deg)");
    }

    #[test]
    fn ghost_opacity_clamps() {
        assert_eq!(Filters { ghost: 0.0, ..Default::default() }.ghost_opacity(), 1.0);
        assert_eq!(Filters { ghost: 50.0, ..Default::default() }.ghost_opacity(), 0.5);
        assert_eq!(Filters { ghost: 200.0, ..Default::default() }.ghost_opacity(), 0.0);
        assert_eq!(Filters { ghost: -40.0, ..Default::default() }.ghost_opacity(), 1.0);
    }

    #[test]
    fn mosaic_steps_round_and_clamp() {
        assert_eq!(Filters { mosaic: 0.0, ..Default::default() }.mosaic_steps(), 1.0);
        assert_eq!(Filters { mosaic: 10.0, ..Default::default() }.mosaic_steps(), 2.0);
        assert_eq!(Filters { mosaic: -10.0, ..Default::default() }.mosaic_steps(), 2.0);
        assert_eq!(Filters { mosaic: 1.0e6, ..Default::default() }.mosaic_steps(), 512.0);
    }

    #[test]
    fn fisheye_power_never_negative() {
        assert_eq!(Filters { fisheye: -300.0, ..Default::default() }.fisheye_power(), 0.0);
        assert_eq!(Filters { fisheye: 0.0, ..Default::default() }.fisheye_power(), 1.0);
    }
}
