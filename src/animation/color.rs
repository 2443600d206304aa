use crate::{
    animation::curve::Curve,
    foundation::error::{FramecastError, FramecastResult},
};

/// An animated RGB color: one curve per channel, evaluated per frame.
///
/// Used for the timeline background and for clip waveform tinting.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Color {
    /// Red channel curve (0-255).
    pub red: Curve,
    /// Green channel curve (0-255).
    pub green: Curve,
    /// Blue channel curve (0-255).
    pub blue: Curve,
}

impl Color {
    /// A color held constant at the given channel values.
    pub fn rgb(red: f64, green: f64, blue: f64) -> Self {
        Self {
            red: Curve::constant(red),
            green: Curve::constant(green),
            blue: Curve::constant(blue),
        }
    }

    /// Parse a `#rrggbb` hex string into a constant color.
    pub fn from_hex(hex: &str) -> FramecastResult<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 {
            return Err(FramecastError::validation(format!(
                "color '{hex}' must be #rrggbb"
            )));
        }
        let channel = |range: std::ops::Range<usize>| -> FramecastResult<f64> {
            u8::from_str_radix(&digits[range], 16)
                .map(f64::from)
                .map_err(|_| FramecastError::validation(format!("color '{hex}' must be #rrggbb")))
        };
        Ok(Self::rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// The rounded `[r, g, b]` channel values at `frame`.
    pub fn at(&self, frame: i64) -> [u8; 3] {
        let clamp = |v: i64| v.clamp(0, 255) as u8;
        [
            clamp(self.red.value_as_long(frame)),
            clamp(self.green.value_as_long(frame)),
            clamp(self.blue.value_as_long(frame)),
        ]
    }

    /// The color at `frame` as a `#rrggbb` hex string.
    pub fn hex(&self, frame: i64) -> String {
        let [r, g, b] = self.at(frame);
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Whether all three channels hold 0 for the whole timeline.
    pub fn is_black(&self) -> bool {
        self.red.points().iter().all(|p| p.co.y == 0.0)
            && self.green.points().iter().all(|p| p.co.y == 0.0)
            && self.blue.points().iter().all(|p| p.co.y == 0.0)
    }

    /// Whether any channel is animated (more than one control point).
    pub fn is_animated(&self) -> bool {
        self.red.point_count() > 1 || self.green.point_count() > 1 || self.blue.point_count() > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let c = Color::from_hex("#ff8000").unwrap();
        assert_eq!(c.at(1), [255, 128, 0]);
        assert_eq!(c.hex(1), "#ff8000");
    }

    #[test]
    fn rejects_malformed_hex() {
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn default_is_black_and_static() {
        let c = Color::default();
        assert!(c.is_black());
        assert!(!c.is_animated());
    }
}
