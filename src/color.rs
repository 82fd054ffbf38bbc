//! Color types for the pattern system.
//!
//! Patterns and envelopes work in HSV throughout; conversion to 8-bit RGB
//! happens once, at the point colors leave the core toward a hardware sink.

use thiserror::Error;

/// HSV color. All channels are in 0.0..=1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hsv {
    pub hue: f64,
    pub saturation: f64,
    pub value: f64,
}

impl Hsv {
    pub fn new(hue: f64, saturation: f64, value: f64) -> Self {
        Hsv {
            hue,
            saturation,
            value,
        }
    }

    /// Return a copy with updated hue (wraps at 1.0).
    pub fn with_hue(self, hue: f64) -> Self {
        Hsv::new(hue.rem_euclid(1.0), self.saturation, self.value)
    }

    /// Return a copy with updated brightness, clamped to 0..=1.
    pub fn with_value(self, value: f64) -> Self {
        Hsv::new(self.hue, self.saturation, value.clamp(0.0, 1.0))
    }
}

/// 8-bit RGB, the wire-side color representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }

    pub fn black() -> Self {
        Rgb::new(0, 0, 0)
    }

    /// Convert HSV channels (0..=1) to 8-bit RGB.
    pub fn from_hsv(hue: f64, saturation: f64, value: f64) -> Self {
        let h = hue.rem_euclid(1.0) * 6.0;
        let s = saturation.clamp(0.0, 1.0);
        let v = value.clamp(0.0, 1.0);

        let i = h.floor();
        let f = h - i;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));

        let (r, g, b) = match i as i64 % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        Rgb::new(
            (r * 255.0).round() as u8,
            (g * 255.0).round() as u8,
            (b * 255.0).round() as u8,
        )
    }
}

impl From<Hsv> for Rgb {
    fn from(c: Hsv) -> Self {
        Rgb::from_hsv(c.hue, c.saturation, c.value)
    }
}

/// Error resolving a color specification.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("unknown color name: {0}")]
    UnknownName(String),
    #[error("invalid hex color: {0}")]
    InvalidHex(String),
}

/// Named colors available to `.color("…")`.
const NAMED_COLORS: &[(&str, Hsv)] = &[
    ("red", Hsv { hue: 0.0, saturation: 1.0, value: 1.0 }),
    ("orange", Hsv { hue: 0.08, saturation: 1.0, value: 1.0 }),
    ("yellow", Hsv { hue: 0.16, saturation: 1.0, value: 1.0 }),
    ("green", Hsv { hue: 0.33, saturation: 1.0, value: 1.0 }),
    ("cyan", Hsv { hue: 0.5, saturation: 1.0, value: 1.0 }),
    ("blue", Hsv { hue: 0.6, saturation: 1.0, value: 1.0 }),
    ("purple", Hsv { hue: 0.75, saturation: 1.0, value: 1.0 }),
    ("magenta", Hsv { hue: 0.83, saturation: 1.0, value: 1.0 }),
    ("pink", Hsv { hue: 0.9, saturation: 0.6, value: 1.0 }),
    ("white", Hsv { hue: 0.0, saturation: 0.0, value: 1.0 }),
    ("warm_white", Hsv { hue: 0.08, saturation: 0.2, value: 1.0 }),
    ("cool_white", Hsv { hue: 0.55, saturation: 0.1, value: 1.0 }),
    ("dim_red", Hsv { hue: 0.0, saturation: 1.0, value: 0.5 }),
    ("dim_blue", Hsv { hue: 0.6, saturation: 1.0, value: 0.5 }),
    ("dim_white", Hsv { hue: 0.0, saturation: 0.0, value: 0.5 }),
    ("amber", Hsv { hue: 0.1, saturation: 1.0, value: 1.0 }),
    ("lime", Hsv { hue: 0.25, saturation: 1.0, value: 1.0 }),
    ("teal", Hsv { hue: 0.45, saturation: 1.0, value: 1.0 }),
    ("violet", Hsv { hue: 0.7, saturation: 1.0, value: 1.0 }),
    ("hot_pink", Hsv { hue: 0.92, saturation: 1.0, value: 1.0 }),
];

/// Resolve a color name to HSV.
pub fn color_from_name(name: &str) -> Result<Hsv, ColorError> {
    let key = name.trim().to_ascii_lowercase();
    NAMED_COLORS
        .iter()
        .find(|(n, _)| *n == key)
        .map(|(_, c)| *c)
        .ok_or_else(|| ColorError::UnknownName(name.to_string()))
}

/// Parse a `#RGB` or `#RRGGBB` hex color into HSV.
pub fn color_from_hex(hex: &str) -> Result<Hsv, ColorError> {
    let digits = hex.trim_start_matches('#');

    let expanded: String = if digits.len() == 3 {
        digits.chars().flat_map(|c| [c, c]).collect()
    } else {
        digits.to_string()
    };

    if expanded.len() != 6 {
        return Err(ColorError::InvalidHex(hex.to_string()));
    }

    let parse = |s: &str| {
        u8::from_str_radix(s, 16).map_err(|_| ColorError::InvalidHex(hex.to_string()))
    };
    let r = parse(&expanded[0..2])? as f64 / 255.0;
    let g = parse(&expanded[2..4])? as f64 / 255.0;
    let b = parse(&expanded[4..6])? as f64 / 255.0;

    Ok(rgb_to_hsv(r, g, b))
}

/// Resolve a color spec: `#hex` or a named color.
pub fn resolve_color(spec: &str) -> Result<Hsv, ColorError> {
    if spec.starts_with('#') {
        color_from_hex(spec)
    } else {
        color_from_name(spec)
    }
}

fn rgb_to_hsv(r: f64, g: f64, b: f64) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue = if delta == 0.0 {
        0.0
    } else if max == r {
        (((g - b) / delta).rem_euclid(6.0)) / 6.0
    } else if max == g {
        ((b - r) / delta + 2.0) / 6.0
    } else {
        ((r - g) / delta + 4.0) / 6.0
    };

    let saturation = if max == 0.0 { 0.0 } else { delta / max };

    Hsv::new(hue, saturation, max)
}

/// Linearly interpolate between two HSV colors, taking the shortest path
/// around the hue wheel.
pub fn interpolate_hsv(c1: Hsv, c2: Hsv, t: f64) -> Hsv {
    let t = t.clamp(0.0, 1.0);

    let (mut h1, mut h2) = (c1.hue, c2.hue);
    if (h2 - h1).abs() > 0.5 {
        if h1 < h2 {
            h1 += 1.0;
        } else {
            h2 += 1.0;
        }
    }

    Hsv::new(
        (h1 + (h2 - h1) * t).rem_euclid(1.0),
        c1.saturation + (c2.saturation - c1.saturation) * t,
        c1.value + (c2.value - c1.value) * t,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_colors() {
        let red = color_from_name("red").unwrap();
        assert_eq!(red.hue, 0.0);
        assert!(color_from_name("RED").is_ok());
        assert!(matches!(
            color_from_name("plaid"),
            Err(ColorError::UnknownName(_))
        ));
    }

    #[test]
    fn test_hex_parsing() {
        let c = color_from_hex("#FF0000").unwrap();
        assert!(c.hue.abs() < 1e-9);
        assert!((c.saturation - 1.0).abs() < 1e-9);
        // Shorthand expands per digit.
        assert_eq!(color_from_hex("#F00"), color_from_hex("#FF0000"));
        assert!(color_from_hex("#12345").is_err());
        assert!(color_from_hex("#GGGGGG").is_err());
    }

    #[test]
    fn test_rgb_from_hsv() {
        assert_eq!(Rgb::from_hsv(0.0, 1.0, 1.0), Rgb::new(255, 0, 0));
        assert_eq!(Rgb::from_hsv(0.0, 0.0, 1.0), Rgb::new(255, 255, 255));
        assert_eq!(Rgb::from_hsv(0.5, 1.0, 0.0), Rgb::black());
        // Blue at hue 2/3.
        assert_eq!(Rgb::from_hsv(2.0 / 3.0, 1.0, 1.0), Rgb::new(0, 0, 255));
    }

    #[test]
    fn test_interpolate_wraps_hue() {
        let a = Hsv::new(0.95, 1.0, 1.0);
        let b = Hsv::new(0.05, 1.0, 1.0);
        let mid = interpolate_hsv(a, b, 0.5);
        // Shortest path crosses 1.0, landing at 0.0 rather than 0.5.
        assert!(mid.hue < 0.1 || mid.hue > 0.9);
    }
}
