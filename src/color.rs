//! RGBA colors and overlay palettes.

use serde::{Deserialize, Serialize};

/// Straight (non-premultiplied) RGBA color.
///
/// Serializes as `#rrggbb` or `#rrggbbaa`, which is what layer records carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const WHITE: Color = Color::rgb(255, 255, 255);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Same color with alpha replaced by `alpha` in [0, 1].
    pub fn with_alpha(self, alpha: f32) -> Self {
        Self {
            a: (alpha.clamp(0.0, 1.0) * 255.0).round() as u8,
            ..self
        }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let hex = s.trim().strip_prefix('#').unwrap_or(s.trim());
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        match hex.len() {
            6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Self::rgba(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
            _ => None,
        }
    }

    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Hue in degrees, saturation and lightness in [0, 1].
    fn to_hsl(self) -> (f32, f32, f32) {
        let r = self.r as f32 / 255.0;
        let g = self.g as f32 / 255.0;
        let b = self.b as f32 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let l = (max + min) / 2.0;
        let d = max - min;
        if d == 0.0 {
            return (0.0, 0.0, l);
        }
        let s = d / (1.0 - (2.0 * l - 1.0).abs());
        let h = if max == r {
            60.0 * (((g - b) / d).rem_euclid(6.0))
        } else if max == g {
            60.0 * ((b - r) / d + 2.0)
        } else {
            60.0 * ((r - g) / d + 4.0)
        };
        (h, s, l)
    }

    fn from_hsl(h: f32, s: f32, l: f32) -> Self {
        let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
        let hp = h.rem_euclid(360.0) / 60.0;
        let x = c * (1.0 - (hp % 2.0 - 1.0).abs());
        let (r, g, b) = match hp as u32 {
            0 => (c, x, 0.0),
            1 => (x, c, 0.0),
            2 => (0.0, c, x),
            3 => (0.0, x, c),
            4 => (x, 0.0, c),
            _ => (c, 0.0, x),
        };
        let m = l - c / 2.0;
        let channel = |v: f32| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::rgb(channel(r), channel(g), channel(b))
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::rgb(255, 87, 87)
    }
}

impl TryFrom<String> for Color {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::from_hex(&value).ok_or_else(|| format!("invalid color '{value}'"))
    }
}

impl From<Color> for String {
    fn from(c: Color) -> Self {
        c.to_hex()
    }
}

const BASE_PALETTE: [Color; 9] = [
    Color::rgb(255, 87, 87),
    Color::rgb(87, 255, 87),
    Color::rgb(87, 87, 255),
    Color::rgb(255, 255, 87),
    Color::rgb(87, 255, 255),
    Color::rgb(255, 87, 255),
    Color::rgb(255, 165, 0),
    Color::rgb(128, 0, 128),
    Color::rgb(0, 128, 0),
];

/// `n` visually distinct overlay colors.
///
/// The nine base colors come first; later entries cycle through them with
/// lightness and saturation shifted per cycle.
pub fn distinct_colors(n: usize) -> Vec<Color> {
    (0..n)
        .map(|i| {
            let base = BASE_PALETTE[i % BASE_PALETTE.len()];
            let cycle = i / BASE_PALETTE.len();
            if cycle == 0 {
                return base;
            }
            let (h, s, l) = base.to_hsl();
            let l = (l + (30.0 + cycle as f32 * 15.0) / 255.0).rem_euclid(1.0);
            let s = (s + cycle as f32 * 10.0 / 255.0).rem_euclid(1.0).max(100.0 / 255.0);
            Color::from_hsl(h, s, l)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let c = Color::rgb(0x12, 0xab, 0xff);
        assert_eq!(c.to_hex(), "#12abff");
        assert_eq!(Color::from_hex("#12abff"), Some(c));
        assert_eq!(Color::from_hex("12abff80").map(|c| c.a), Some(0x80));
    }

    #[test]
    fn test_hex_rejects_garbage() {
        assert_eq!(Color::from_hex("#12ab"), None);
        assert_eq!(Color::from_hex("#zzzzzz"), None);
        assert_eq!(Color::from_hex(""), None);
    }

    #[test]
    fn test_serde_as_hex_string() {
        let json = serde_json::to_string(&Color::rgb(255, 0, 0)).unwrap();
        assert_eq!(json, "\"#ff0000\"");
        let back: Color = serde_json::from_str("\"#00ff00\"").unwrap();
        assert_eq!(back, Color::rgb(0, 255, 0));
        assert!(serde_json::from_str::<Color>("\"green\"").is_err());
    }

    #[test]
    fn test_with_alpha() {
        assert_eq!(Color::WHITE.with_alpha(0.6).a, 153);
        assert_eq!(Color::WHITE.with_alpha(2.0).a, 255);
    }

    #[test]
    fn test_hsl_round_trip_primary() {
        let red = Color::rgb(255, 0, 0);
        let (h, s, l) = red.to_hsl();
        assert_eq!(Color::from_hsl(h, s, l), red);
    }

    #[test]
    fn test_distinct_colors() {
        assert!(distinct_colors(0).is_empty());
        let small = distinct_colors(3);
        assert_eq!(small, BASE_PALETTE[..3].to_vec());

        let many = distinct_colors(20);
        assert_eq!(many.len(), 20);
        assert_ne!(many[9], many[0]);
        assert!(many.iter().all(|c| c.a == 255));
    }
}
