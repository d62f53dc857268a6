//! Intensity shading of vertex colors.
//!
//! A shade mode turns per-vertex state (slope pair, overlay value) into a
//! signed intensity in roughly [-1, 1], which is then applied to the ramp
//! color by brightening or darkening in HSV space.

use serde::{Deserialize, Serialize};

use crate::color::Rgb;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ShadeMode {
    Off,
    /// Directional illumination from an azimuth/elevation light.
    Illumination {
        magnitude: f64,
        /// Degrees clockwise from north.
        azimuth: f64,
        /// Degrees above the horizon.
        elevation: f64,
    },
    /// Darken by slope steepness.
    SlopeShading { magnitude: f64 },
    /// Shade by a second scalar field draped over the surface.
    Overlay {
        magnitude: f64,
        center: f64,
        reversed: bool,
    },
}

/// Shade parameters resolved once per color pass.
#[derive(Debug, Clone, Copy)]
pub enum ShadeParams {
    Off,
    Illumination {
        magnitude: f64,
        mag2: f64,
        light: [f64; 3],
    },
    SlopeShading {
        magnitude: f64,
    },
    Overlay {
        signed_magnitude: f64,
        center: f64,
    },
}

impl ShadeMode {
    pub fn resolve(&self) -> ShadeParams {
        match *self {
            ShadeMode::Off => ShadeParams::Off,
            ShadeMode::Illumination {
                magnitude,
                azimuth,
                elevation,
            } => {
                let (saz, _) = azimuth.to_radians().sin_cos();
                let caz = azimuth.to_radians().cos();
                let (sel, cel) = elevation.to_radians().sin_cos();
                ShadeParams::Illumination {
                    magnitude,
                    mag2: magnitude * magnitude,
                    light: [saz * cel, caz * cel, sel],
                }
            }
            ShadeMode::SlopeShading { magnitude } => ShadeParams::SlopeShading { magnitude },
            ShadeMode::Overlay {
                magnitude,
                center,
                reversed,
            } => ShadeParams::Overlay {
                signed_magnitude: if reversed { -magnitude } else { magnitude },
                center,
            },
        }
    }
}

impl ShadeParams {
    /// Shade intensity for one vertex. `overlay` carries the overlay
    /// sample and its (min, max) range; a missing sample leaves the color
    /// unshaded.
    pub fn intensity(&self, dzdx: f64, dzdy: f64, overlay: Option<(f64, f64, f64)>) -> Option<f64> {
        match *self {
            ShadeParams::Off => None,
            ShadeParams::Illumination {
                magnitude,
                mag2,
                light,
            } => {
                let dd = (mag2 * dzdx * dzdx + mag2 * dzdy * dzdy + 1.0).sqrt();
                Some(
                    magnitude * light[0] * dzdx / dd + magnitude * light[1] * dzdy / dd
                        + light[2] / dd
                        - 0.5,
                )
            }
            ShadeParams::SlopeShading { magnitude } => {
                let slope = (dzdx * dzdx + dzdy * dzdy).sqrt();
                Some((-magnitude * slope).max(-1.0))
            }
            ShadeParams::Overlay {
                signed_magnitude,
                center,
            } => {
                let (value, min, max) = overlay?;
                if max > min {
                    Some(signed_magnitude * (value - center) / (max - min))
                } else {
                    Some(0.0)
                }
            }
        }
    }
}

/// Apply a shade intensity to a color: positive intensity lightens toward
/// white, negative darkens toward black, via the HSV transform used by the
/// GMT illumination model.
pub fn apply_shade(intensity: f64, rgb: Rgb) -> Rgb {
    let (mut h, mut s, mut v) = rgb_to_hsv(rgb);
    let i = intensity as f32;
    if i > 0.0 {
        if s != 0.0 {
            s = (1.0 - i) * s + i * 0.1;
        }
        v = (1.0 - i) * v + i;
    } else {
        if s != 0.0 {
            s = (1.0 + i) * s - i;
        }
        v = (1.0 + i) * v - i * 0.3;
    }
    s = s.clamp(0.0, 1.0);
    v = v.clamp(0.0, 1.0);
    if h < 0.0 {
        h += 360.0;
    }
    hsv_to_rgb(h, s, v)
}

fn rgb_to_hsv(rgb: Rgb) -> (f32, f32, f32) {
    let [r, g, b] = rgb;
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    let delta = max - min;
    if delta == 0.0 || max == 0.0 {
        return (0.0, 0.0, v);
    }
    let s = delta / max;
    let h = if r == max {
        (g - b) / delta
    } else if g == max {
        2.0 + (b - r) / delta
    } else {
        4.0 + (r - g) / delta
    };
    (h * 60.0, s, v)
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    if s == 0.0 {
        return [v, v, v];
    }
    let h = if h >= 360.0 { 0.0 } else { h / 60.0 };
    let i = h as i32;
    let f = h - i as f32;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i {
        0 => [v, t, p],
        1 => [q, v, p],
        2 => [p, v, t],
        3 => [p, q, v],
        4 => [t, p, v],
        _ => [v, p, q],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn off_mode_has_no_intensity() {
        assert!(ShadeMode::Off.resolve().intensity(1.0, 1.0, None).is_none());
    }

    #[test]
    fn flat_terrain_under_overhead_light() {
        // light straight down on flat terrain: intensity = 1 - 0.5
        let params = ShadeMode::Illumination {
            magnitude: 1.0,
            azimuth: 0.0,
            elevation: 90.0,
        }
        .resolve();
        let i = params.intensity(0.0, 0.0, None).unwrap();
        assert!((i - 0.5).abs() < 1e-9, "got {}", i);
    }

    #[test]
    fn facing_slope_brighter_than_opposing() {
        let params = ShadeMode::Illumination {
            magnitude: 1.0,
            azimuth: 90.0,
            elevation: 30.0,
        }
        .resolve();
        let toward = params.intensity(0.5, 0.0, None).unwrap();
        let away = params.intensity(-0.5, 0.0, None).unwrap();
        assert!(toward > away, "toward {} vs away {}", toward, away);
    }

    #[test]
    fn slope_shading_darkens_and_saturates() {
        let params = ShadeMode::SlopeShading { magnitude: 2.0 }.resolve();
        assert_eq!(params.intensity(0.0, 0.0, None), Some(0.0));
        let steep = params.intensity(3.0, 4.0, None).unwrap();
        assert_eq!(steep, -1.0, "intensity clamps at -1");
        let gentle = params.intensity(0.1, 0.0, None).unwrap();
        assert!(gentle < 0.0 && gentle > -1.0);
    }

    #[test]
    fn overlay_shading_signed_about_center() {
        let params = ShadeMode::Overlay {
            magnitude: 1.0,
            center: 50.0,
            reversed: false,
        }
        .resolve();
        let hi = params.intensity(0.0, 0.0, Some((75.0, 0.0, 100.0))).unwrap();
        let lo = params.intensity(0.0, 0.0, Some((25.0, 0.0, 100.0))).unwrap();
        assert!((hi - 0.25).abs() < 1e-12);
        assert!((lo + 0.25).abs() < 1e-12);
        assert!(params.intensity(0.0, 0.0, None).is_none(), "missing sample skips shading");
    }

    #[test]
    fn overlay_reversed_flips_sign() {
        let params = ShadeMode::Overlay {
            magnitude: 1.0,
            center: 0.0,
            reversed: true,
        }
        .resolve();
        let i = params.intensity(0.0, 0.0, Some((1.0, -2.0, 2.0))).unwrap();
        assert!(i < 0.0);
    }

    #[test]
    fn positive_intensity_lightens() {
        let base = [0.5, 0.25, 0.25];
        let lighter = apply_shade(0.5, base);
        let darker = apply_shade(-0.5, base);
        assert!(lighter[0] > base[0] && lighter[1] > base[1]);
        assert!(darker[0] < base[0]);
    }

    #[test]
    fn negative_shade_keeps_gray_achromatic() {
        // darkening must not introduce hue on a zero-saturation base
        let shaded = apply_shade(-0.5, [0.5, 0.5, 0.5]);
        assert!(
            shaded[0] == shaded[1] && shaded[1] == shaded[2],
            "gray picked up a tint: {:?}",
            shaded
        );
        assert!((shaded[0] - 0.4).abs() < 1e-6, "got {:?}", shaded);
    }

    #[test]
    fn full_negative_intensity_goes_black() {
        let shaded = apply_shade(-1.0, [0.8, 0.9, 1.0]);
        // v collapses to -i*0.3 = 0.3 with full saturation
        assert!(shaded.iter().all(|c| *c <= 0.31), "got {:?}", shaded);
    }

    #[test]
    fn hsv_round_trip_preserves_color() {
        for rgb in [[1.0, 0.0, 0.0], [0.2, 0.7, 0.4], [0.9, 0.9, 0.1], [0.3, 0.3, 0.3]] {
            let (h, s, v) = rgb_to_hsv(rgb);
            let h = if h < 0.0 { h + 360.0 } else { h };
            let back = hsv_to_rgb(h, s, v);
            for (a, b) in rgb.iter().zip(back.iter()) {
                assert!((a - b).abs() < 1e-5, "{:?} -> {:?}", rgb, back);
            }
        }
    }
}
