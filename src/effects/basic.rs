//! The built-in per-pixel effects: elementwise channel math driven by
//! animated curves.

use serde_json::{Value, json};

use crate::{
    animation::curve::Curve,
    effects::{Effect, base::EffectBase},
    foundation::error::FramecastResult,
    frame::Frame,
    structured::Structured,
};

fn clamp255(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

fn for_each_pixel(frame: &mut Frame, mut f: impl FnMut(&mut [u8])) {
    let Some(pixels) = frame.pixels().map(<[u8]>::to_vec) else {
        return;
    };
    let mut pixels = pixels;
    for px in pixels.chunks_exact_mut(4) {
        f(px);
    }
    frame.set_pixels(pixels);
}

/// Brightness offset plus contrast stretch, both animated.
#[derive(Debug)]
pub struct Brightness {
    base: EffectBase,
    /// Brightness offset in `[-1, 1]`; 0 leaves the image untouched.
    pub brightness: Curve,
    /// Contrast in `[0, 100]`; higher stretches away from mid-gray.
    pub contrast: Curve,
}

impl Default for Brightness {
    fn default() -> Self {
        Self {
            base: EffectBase::default(),
            brightness: Curve::constant(0.0),
            contrast: Curve::constant(3.0),
        }
    }
}

impl Effect for Brightness {
    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Brightness"
    }

    fn apply(&self, frame: &mut Frame, frame_number: i64) {
        let brightness = self.brightness.value(frame_number) as f32;
        let contrast = self.contrast.value(frame_number) as f32;
        let factor = (259.0 * (contrast + 255.0)) / (255.0 * (259.0 - contrast));
        for_each_pixel(frame, |px| {
            for c in 0..3 {
                let stretched = factor * (f32::from(px[c]) - 128.0) + 128.0;
                px[c] = clamp255(stretched + 255.0 * brightness);
            }
        });
    }
}

impl Structured for Brightness {
    fn to_structured(&self) -> Value {
        let mut root = self.base.to_structured();
        root["type"] = json!(self.kind());
        root["brightness"] = self.brightness.to_structured();
        root["contrast"] = self.contrast.to_structured();
        root
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        self.base.load_structured(value)?;
        if let Some(v) = value.get("brightness") {
            self.brightness.load_structured(v)?;
        }
        if let Some(v) = value.get("contrast") {
            self.contrast.load_structured(v)?;
        }
        Ok(())
    }
}

/// Animated color saturation: 0 = grayscale, 1 = unchanged, >1 oversaturated.
#[derive(Debug)]
pub struct Saturation {
    base: EffectBase,
    pub saturation: Curve,
}

impl Default for Saturation {
    fn default() -> Self {
        Self {
            base: EffectBase::default(),
            saturation: Curve::constant(1.0),
        }
    }
}

impl Effect for Saturation {
    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Saturation"
    }

    fn apply(&self, frame: &mut Frame, frame_number: i64) {
        let s = self.saturation.value(frame_number) as f32;
        // Rec. 601 luma weights.
        const PR: f32 = 0.299;
        const PG: f32 = 0.587;
        const PB: f32 = 0.114;
        for_each_pixel(frame, |px| {
            let r = f32::from(px[0]);
            let g = f32::from(px[1]);
            let b = f32::from(px[2]);
            let p = (r * r * PR + g * g * PG + b * b * PB).sqrt();
            px[0] = clamp255(p + (r - p) * s);
            px[1] = clamp255(p + (g - p) * s);
            px[2] = clamp255(p + (b - p) * s);
        });
    }
}

impl Structured for Saturation {
    fn to_structured(&self) -> Value {
        let mut root = self.base.to_structured();
        root["type"] = json!(self.kind());
        root["saturation"] = self.saturation.to_structured();
        root
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        self.base.load_structured(value)?;
        if let Some(v) = value.get("saturation") {
            self.saturation.load_structured(v)?;
        }
        Ok(())
    }
}

/// Animated hue rotation; the shift is a fraction of a full turn.
#[derive(Debug)]
pub struct Hue {
    base: EffectBase,
    pub hue: Curve,
}

impl Default for Hue {
    fn default() -> Self {
        Self {
            base: EffectBase::default(),
            hue: Curve::constant(0.0),
        }
    }
}

impl Effect for Hue {
    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Hue"
    }

    fn apply(&self, frame: &mut Frame, frame_number: i64) {
        let radians = (360.0 * self.hue.value(frame_number)).to_radians() as f32;
        let cos_a = radians.cos();
        let sin_a = radians.sin();
        // RGB-space rotation about the gray diagonal.
        let third = (1.0 - cos_a) / 3.0;
        let tilt = (1.0f32 / 3.0).sqrt() * sin_a;
        let m = [
            [cos_a + third, third - tilt, third + tilt],
            [third + tilt, cos_a + third, third - tilt],
            [third - tilt, third + tilt, cos_a + third],
        ];
        for_each_pixel(frame, |px| {
            let r = f32::from(px[0]);
            let g = f32::from(px[1]);
            let b = f32::from(px[2]);
            px[0] = clamp255(r * m[0][0] + g * m[0][1] + b * m[0][2]);
            px[1] = clamp255(r * m[1][0] + g * m[1][1] + b * m[1][2]);
            px[2] = clamp255(r * m[2][0] + g * m[2][1] + b * m[2][2]);
        });
    }
}

impl Structured for Hue {
    fn to_structured(&self) -> Value {
        let mut root = self.base.to_structured();
        root["type"] = json!(self.kind());
        root["hue"] = self.hue.to_structured();
        root
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        self.base.load_structured(value)?;
        if let Some(v) = value.get("hue") {
            self.hue.load_structured(v)?;
        }
        Ok(())
    }
}

/// Invert every color channel, leaving alpha alone.
#[derive(Debug, Default)]
pub struct Negate {
    base: EffectBase,
}

impl Effect for Negate {
    fn base(&self) -> &EffectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut EffectBase {
        &mut self.base
    }

    fn kind(&self) -> &'static str {
        "Negate"
    }

    fn apply(&self, frame: &mut Frame, _frame_number: i64) {
        for_each_pixel(frame, |px| {
            px[0] = 255 - px[0];
            px[1] = 255 - px[1];
            px[2] = 255 - px[2];
        });
    }
}

impl Structured for Negate {
    fn to_structured(&self) -> Value {
        let mut root = self.base.to_structured();
        root["type"] = json!(self.kind());
        root
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        self.base.load_structured(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame(level: u8) -> Frame {
        let mut f = Frame::new(1, 2, 2);
        f.fill([level, level, level]);
        f
    }

    #[test]
    fn negate_inverts_channels_but_not_alpha() {
        let mut f = gray_frame(10);
        Negate::default().apply(&mut f, 1);
        let px = f.pixels().unwrap();
        assert_eq!(&px[..4], &[245, 245, 245, 255]);
    }

    #[test]
    fn brightness_shifts_toward_white() {
        let mut effect = Brightness::default();
        effect.brightness = Curve::constant(0.5);
        effect.contrast = Curve::constant(0.0);
        let mut f = gray_frame(100);
        effect.apply(&mut f, 1);
        let px = f.pixels().unwrap();
        assert!(px[0] > 100);
    }

    #[test]
    fn zero_saturation_is_grayscale() {
        let mut effect = Saturation::default();
        effect.saturation = Curve::constant(0.0);
        let mut f = Frame::new(1, 1, 1);
        f.fill([200, 50, 10]);
        effect.apply(&mut f, 1);
        let px = f.pixels().unwrap();
        assert_eq!(px[0], px[1]);
        assert_eq!(px[1], px[2]);
    }

    #[test]
    fn full_hue_turn_is_identity() {
        let mut effect = Hue::default();
        effect.hue = Curve::constant(1.0);
        let mut f = Frame::new(1, 1, 1);
        f.fill([120, 60, 30]);
        effect.apply(&mut f, 1);
        let px = f.pixels().unwrap();
        assert!((i32::from(px[0]) - 120).abs() <= 1);
        assert!((i32::from(px[1]) - 60).abs() <= 1);
        assert!((i32::from(px[2]) - 30).abs() <= 1);
    }

    #[test]
    fn effect_parameters_animate() {
        let mut effect = Saturation::default();
        let mut curve = Curve::new();
        curve.add_point_xy(1.0, 1.0);
        curve.add_point_xy(10.0, 0.0);
        effect.saturation = curve;
        let mut at_start = Frame::new(1, 1, 1);
        at_start.fill([200, 50, 10]);
        let mut at_end = at_start.clone();
        effect.apply(&mut at_start, 1);
        effect.apply(&mut at_end, 10);
        // Fully saturated at frame 1, grayscale at frame 10.
        assert_ne!(at_start.pixels().unwrap()[0], at_start.pixels().unwrap()[1]);
        assert_eq!(at_end.pixels().unwrap()[0], at_end.pixels().unwrap()[1]);
    }
}
