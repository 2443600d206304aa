use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::{Value, json};

use crate::{
    animation::{color::Color, curve::Curve},
    effects::{Effect, create_effect},
    foundation::{
        core::{ChannelLayout, Fraction},
        error::{FramecastError, FramecastResult},
    },
    frame::Frame,
    mapper::{FrameMapper, Pulldown},
    source::{FrameSource, SourceInfo, dummy::DummySource},
    structured::{Structured, merge_bool, merge_f64, merge_i32, merge_string},
};

/// Nine-way anchor used to place a clip's image on the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Gravity {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

/// How a clip's image is sized against the canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ScaleMode {
    /// Scale up to cover the canvas, preserving aspect; excess is clipped.
    Crop,
    /// Uniform scale preserving aspect, bounded by the canvas.
    #[default]
    Fit,
    /// Independent X/Y scale filling the canvas exactly.
    Stretch,
    /// No resize.
    None,
}

/// What the clip's placement is measured against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Anchor {
    #[default]
    Canvas,
    Viewport,
}

enum ClipSource {
    Raw(Box<dyn FrameSource>),
    Mapped(FrameMapper),
}

impl ClipSource {
    fn as_source(&self) -> &dyn FrameSource {
        match self {
            ClipSource::Raw(source) => source.as_ref(),
            ClipSource::Mapped(mapper) => mapper,
        }
    }

    fn as_source_mut(&mut self) -> &mut dyn FrameSource {
        match self {
            ClipSource::Raw(source) => source.as_mut(),
            ClipSource::Mapped(mapper) => mapper,
        }
    }
}

/// A time-positioned piece of media on the timeline.
///
/// Carries placement (position/layer/start/end, all in seconds), animated
/// properties as curves, an effect chain, and the wrapped source. Attaching
/// the clip to a timeline wraps its source in a [`FrameMapper`] targeting
/// the timeline's profile; the wrapper stays for the life of the clip.
pub struct Clip {
    /// Stable identifier used by the diff protocol.
    pub id: String,
    position: f64,
    layer: i32,
    start: f64,
    end: f64,
    gravity: Gravity,
    scale_mode: ScaleMode,
    anchor: Anchor,
    waveform: bool,
    /// Tint for the generated waveform image.
    pub wave_color: Color,

    /// Opacity, 0..1.
    pub alpha: Curve,
    pub scale_x: Curve,
    pub scale_y: Curve,
    /// Horizontal offset as a fraction of canvas width.
    pub location_x: Curve,
    /// Vertical offset as a fraction of canvas height.
    pub location_y: Curve,
    /// Rotation in degrees, clockwise about the image center.
    pub rotation: Curve,
    /// Time remap: maps clip frame numbers onto source frame numbers when it
    /// has more than one point.
    pub time: Curve,
    /// Audio gain, 0..1.
    pub volume: Curve,
    /// Crop extents and offsets as fractions of the source image.
    pub crop_width: Curve,
    pub crop_height: Curve,
    pub crop_x: Curve,
    pub crop_y: Curve,

    effects: Vec<Box<dyn Effect>>,
    source: Mutex<ClipSource>,
}

impl Clip {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        let duration = source.info().duration;
        Self {
            id: String::new(),
            position: 0.0,
            layer: 0,
            start: 0.0,
            end: duration,
            gravity: Gravity::default(),
            scale_mode: ScaleMode::default(),
            anchor: Anchor::default(),
            waveform: false,
            wave_color: Color::rgb(0.0, 123.0, 255.0),
            alpha: Curve::constant(1.0),
            scale_x: Curve::constant(1.0),
            scale_y: Curve::constant(1.0),
            location_x: Curve::constant(0.0),
            location_y: Curve::constant(0.0),
            rotation: Curve::constant(0.0),
            time: Curve::new(),
            volume: Curve::constant(1.0),
            crop_width: Curve::constant(1.0),
            crop_height: Curve::constant(1.0),
            crop_x: Curve::constant(0.0),
            crop_y: Curve::constant(0.0),
            effects: Vec::new(),
            source: Mutex::new(ClipSource::Raw(source)),
        }
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn set_position(&mut self, position: f64) {
        self.position = position;
    }

    pub fn layer(&self) -> i32 {
        self.layer
    }

    pub fn set_layer(&mut self, layer: i32) {
        self.layer = layer;
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn set_start(&mut self, start: f64) {
        self.start = start;
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn set_end(&mut self, end: f64) {
        self.end = end;
    }

    /// Length of the trimmed clip in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Gravity) {
        self.gravity = gravity;
    }

    pub fn scale_mode(&self) -> ScaleMode {
        self.scale_mode
    }

    pub fn set_scale_mode(&mut self, mode: ScaleMode) {
        self.scale_mode = mode;
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn set_anchor(&mut self, anchor: Anchor) {
        self.anchor = anchor;
    }

    pub fn waveform(&self) -> bool {
        self.waveform
    }

    /// Substitute a rendered waveform of the clip's audio for its image.
    pub fn set_waveform(&mut self, waveform: bool) {
        self.waveform = waveform;
    }

    /// Whether the clip covers timeline time `t` (seconds).
    pub fn covers(&self, t: f64) -> bool {
        self.position <= t && t <= self.position + self.duration()
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
        self.effects
            .sort_by(|a, b| crate::effects::effect_order(a.as_ref(), b.as_ref()));
    }

    pub fn remove_effect(&mut self, id: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.base().id != id);
        before != self.effects.len()
    }

    pub fn effect_mut(&mut self, id: &str) -> Option<&mut Box<dyn Effect>> {
        self.effects.iter_mut().find(|e| e.base().id == id)
    }

    /// The wrapped source's stream profile.
    pub fn info(&self) -> SourceInfo {
        self.lock_source().as_source().info().clone()
    }

    pub fn open(&self) -> FramecastResult<()> {
        self.lock_source().as_source_mut().open()
    }

    pub fn close(&self) {
        self.lock_source().as_source_mut().close();
    }

    pub fn is_open(&self) -> bool {
        self.lock_source().as_source().is_open()
    }

    /// Wrap the source in a mapper targeting the given profile, or re-target
    /// the existing mapper. Called when the clip joins a timeline.
    pub(crate) fn attach(
        &mut self,
        fps: Fraction,
        sample_rate: i32,
        channels: i32,
        channel_layout: ChannelLayout,
    ) {
        let source = self.source.get_mut().expect("clip source lock poisoned");
        let placeholder = ClipSource::Raw(Box::new(DummySource::new(SourceInfo::default_profile(
            1, 1, 1,
        ))));
        let current = std::mem::replace(source, placeholder);
        *source = match current {
            ClipSource::Raw(raw) => ClipSource::Mapped(FrameMapper::new(
                raw,
                fps,
                Pulldown::None,
                sample_rate,
                channels,
                channel_layout,
            )),
            ClipSource::Mapped(mut mapper) => {
                mapper.change_mapping(fps, Pulldown::None, sample_rate, channels, channel_layout);
                ClipSource::Mapped(mapper)
            }
        };
    }

    /// Fetch the clip-local frame `number`, after time remapping, with the
    /// waveform substitution and the clip's effect chain applied.
    pub fn get_frame(&self, number: i64) -> FramecastResult<Arc<Frame>> {
        let source_number = self.time_mapped_frame(number);
        let frame = self.lock_source().as_source().get_frame(source_number)?;

        if !self.waveform && self.effects.is_empty() {
            return Ok(frame);
        }

        let mut frame = (*frame).clone();
        frame.number = number;
        if self.waveform {
            let tint = self.wave_color.at(number);
            let pixels = frame.waveform_image(frame.width, frame.height, tint);
            frame.set_pixels(pixels);
        }
        for effect in &self.effects {
            effect.apply(&mut frame, number);
        }
        Ok(Arc::new(frame))
    }

    /// The source frame that plays at clip frame `number`, honoring the time
    /// remap curve when one is set.
    pub fn time_mapped_frame(&self, number: i64) -> i64 {
        if self.time.point_count() > 1 {
            self.time.value_as_long(number).max(1)
        } else {
            number
        }
    }

    fn lock_source(&self) -> MutexGuard<'_, ClipSource> {
        self.source.lock().expect("clip source lock poisoned")
    }
}

impl std::fmt::Debug for Clip {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("position", &self.position)
            .field("layer", &self.layer)
            .field("start", &self.start)
            .field("end", &self.end)
            .field("effects", &self.effects.len())
            .finish_non_exhaustive()
    }
}

impl Structured for Clip {
    fn to_structured(&self) -> Value {
        let effects: Vec<Value> = self.effects.iter().map(|e| e.to_structured()).collect();
        json!({
            "id": self.id,
            "position": self.position,
            "layer": self.layer,
            "start": self.start,
            "end": self.end,
            "gravity": self.gravity,
            "scale": self.scale_mode,
            "anchor": self.anchor,
            "waveform": self.waveform,
            "wave_color": self.wave_color.to_structured(),
            "alpha": self.alpha.to_structured(),
            "scale_x": self.scale_x.to_structured(),
            "scale_y": self.scale_y.to_structured(),
            "location_x": self.location_x.to_structured(),
            "location_y": self.location_y.to_structured(),
            "rotation": self.rotation.to_structured(),
            "time": self.time.to_structured(),
            "volume": self.volume.to_structured(),
            "crop_width": self.crop_width.to_structured(),
            "crop_height": self.crop_height.to_structured(),
            "crop_x": self.crop_x.to_structured(),
            "crop_y": self.crop_y.to_structured(),
            "effects": effects,
            "reader": self.info(),
        })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        merge_string(&mut self.id, value, "id");
        merge_f64(&mut self.position, value, "position");
        merge_i32(&mut self.layer, value, "layer");
        merge_f64(&mut self.start, value, "start");
        merge_f64(&mut self.end, value, "end");
        merge_bool(&mut self.waveform, value, "waveform");
        if let Some(v) = value.get("gravity") {
            self.gravity = serde_json::from_value(v.clone())
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
        }
        if let Some(v) = value.get("scale") {
            self.scale_mode = serde_json::from_value(v.clone())
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
        }
        if let Some(v) = value.get("anchor") {
            self.anchor = serde_json::from_value(v.clone())
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
        }
        if let Some(v) = value.get("wave_color") {
            self.wave_color.load_structured(v)?;
        }
        for (curve, key) in [
            (&mut self.alpha, "alpha"),
            (&mut self.scale_x, "scale_x"),
            (&mut self.scale_y, "scale_y"),
            (&mut self.location_x, "location_x"),
            (&mut self.location_y, "location_y"),
            (&mut self.rotation, "rotation"),
            (&mut self.time, "time"),
            (&mut self.volume, "volume"),
            (&mut self.crop_width, "crop_width"),
            (&mut self.crop_height, "crop_height"),
            (&mut self.crop_x, "crop_x"),
            (&mut self.crop_y, "crop_y"),
        ] {
            if let Some(v) = value.get(key) {
                curve.load_structured(v)?;
            }
        }
        if let Some(entries) = value.get("effects").and_then(Value::as_array) {
            let mut effects = Vec::with_capacity(entries.len());
            for entry in entries {
                let kind = entry.get("type").and_then(Value::as_str).ok_or_else(|| {
                    FramecastError::invalid_json("effect entry is missing a \"type\" tag")
                })?;
                effects.push(create_effect(kind, entry)?);
            }
            self.effects = effects;
            self.effects
                .sort_by(|a, b| crate::effects::effect_order(a.as_ref(), b.as_ref()));
        }
        if let Some(reader) = value.get("reader") {
            let info: SourceInfo = serde_json::from_value(reader.clone())
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
            if value.get("end").is_none() {
                self.end = info.duration;
            }
            *self.lock_source() = ClipSource::Raw(Box::new(DummySource::new(info)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip() -> Clip {
        Clip::new(Box::new(DummySource::new(SourceInfo::default_profile(
            8, 8, 30,
        ))))
    }

    #[test]
    fn new_clip_spans_its_source() {
        let c = clip();
        assert_eq!(c.start(), 0.0);
        assert_eq!(c.duration(), 1.0);
        assert!(c.covers(0.5));
        assert!(!c.covers(1.5));
    }

    #[test]
    fn attach_wraps_the_source_in_a_mapper() {
        let mut c = clip();
        c.attach(
            Fraction { num: 24, den: 1 },
            44100,
            2,
            ChannelLayout::Stereo,
        );
        assert_eq!(c.info().fps, Fraction { num: 24, den: 1 });
        // Re-attaching re-targets the existing mapper instead of nesting.
        c.attach(
            Fraction { num: 30, den: 1 },
            48000,
            2,
            ChannelLayout::Stereo,
        );
        assert_eq!(c.info().fps, Fraction { num: 30, den: 1 });
        assert_eq!(c.info().sample_rate, 48000);
    }

    #[test]
    fn time_curve_remaps_frames() {
        let mut c = clip();
        // Play backwards: frame 1 -> 30, frame 30 -> 1.
        c.time.add_point_xy(1.0, 30.0);
        c.time.add_point_xy(30.0, 1.0);
        assert_eq!(c.time_mapped_frame(1), 30);
        assert_eq!(c.time_mapped_frame(30), 1);
    }

    #[test]
    fn effects_apply_to_fetched_frames() {
        let mut c = clip();
        c.open().unwrap();
        c.add_effect(
            create_effect("Negate", &serde_json::json!({ "id": "n" })).unwrap(),
        );
        let frame = c.get_frame(1).unwrap();
        // DummySource produces black frames; negated they are white.
        assert_eq!(frame.pixels().unwrap()[0], 255);
    }

    #[test]
    fn structured_roundtrip_keeps_placement_and_curves() {
        let mut c = clip();
        c.id = "c1".into();
        c.set_position(2.5);
        c.set_layer(3);
        c.alpha.add_point_xy(100.0, 0.0);
        let snapshot = c.to_structured();

        let mut restored = clip();
        restored.load_structured(&snapshot).unwrap();
        assert_eq!(restored.id, "c1");
        assert_eq!(restored.position(), 2.5);
        assert_eq!(restored.layer(), 3);
        assert_eq!(restored.alpha, c.alpha);
    }
}
