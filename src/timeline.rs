pub mod clip;
pub mod composite;
pub mod diff;

use std::sync::{
    Mutex,
    atomic::{AtomicU64, Ordering},
};

use kurbo::Affine;
use rayon::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::{
    animation::{color::Color, curve::Curve},
    cache::CacheMemory,
    effects::{Effect, create_effect, effect_order},
    foundation::{
        core::{ChannelLayout, Fraction},
        error::{FramecastError, FramecastResult},
    },
    frame::Frame,
    source::SourceInfo,
    structured::{Structured, merge_f64, merge_i32},
};

use clip::{Clip, Gravity, ScaleMode};

/// Construction-time configuration for a [`Timeline`]. Replaces any notion
/// of process-wide settings; every timeline carries its own.
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct TimelineSettings {
    /// Hard ceiling on canvas width.
    pub max_width: u32,
    /// Hard ceiling on canvas height.
    pub max_height: u32,
    /// Frames composited per window; `None` sizes the window to the rayon
    /// pool.
    pub window_frames: Option<usize>,
    /// Cache byte budget; 0 sizes the cache from the output profile.
    pub cache_max_bytes: i64,
}

impl Default for TimelineSettings {
    fn default() -> Self {
        Self {
            max_width: 7680,
            max_height: 4320,
            window_frames: None,
            cache_max_bytes: 0,
        }
    }
}

/// The multi-layer compositor: owns clips and effects, produces output
/// frames at a fixed profile, and memoizes them in a bounded cache.
///
/// `get_frame` composites a whole window of frames per miss, at most once
/// per frame number even under concurrent callers (double-checked against
/// the cache under one composition lock). Audio is pulled in strictly
/// increasing frame order before images are composited in parallel, because
/// the mappers' resamplers carry state between calls.
pub struct Timeline {
    info: SourceInfo,
    settings: TimelineSettings,
    /// Animated background color.
    pub color: Color,
    /// Viewport curves, kept for structured data and editor overlays; they
    /// do not affect composited output.
    pub viewport_scale: Curve,
    pub viewport_x: Curve,
    pub viewport_y: Curve,
    clips: Vec<Clip>,
    effects: Vec<Box<dyn Effect>>,
    cache: CacheMemory,
    compose_lock: Mutex<()>,
    open_lock: Mutex<()>,
    blank_frames: AtomicU64,
}

impl Timeline {
    pub fn new(
        width: u32,
        height: u32,
        fps: Fraction,
        sample_rate: i32,
        channels: i32,
        channel_layout: ChannelLayout,
        settings: TimelineSettings,
    ) -> Self {
        let info = SourceInfo {
            has_video: true,
            has_audio: true,
            has_single_image: false,
            width: width.min(settings.max_width),
            height: height.min(settings.max_height),
            fps,
            sample_rate,
            channels,
            channel_layout,
            video_length: 0,
            duration: 0.0,
        };
        let cache = CacheMemory::new();
        if settings.cache_max_bytes > 0 {
            cache.set_max_bytes(settings.cache_max_bytes);
        } else {
            cache.set_max_bytes_from_info(
                rayon::current_num_threads() * 4,
                info.width,
                info.height,
                info.sample_rate,
                info.channels,
            );
        }
        Self {
            info,
            settings,
            color: Color::default(),
            viewport_scale: Curve::constant(100.0),
            viewport_x: Curve::constant(0.0),
            viewport_y: Curve::constant(0.0),
            clips: Vec::new(),
            effects: Vec::new(),
            cache,
            compose_lock: Mutex::new(()),
            open_lock: Mutex::new(()),
            blank_frames: AtomicU64::new(0),
        }
    }

    /// Output stream profile.
    pub fn info(&self) -> &SourceInfo {
        &self.info
    }

    pub fn cache(&self) -> &CacheMemory {
        &self.cache
    }

    /// How many times a failing clip source has been replaced by a blank
    /// frame. Blank substitution keeps one bad clip from aborting a whole
    /// composite, but it should never pass unnoticed.
    pub fn blank_frame_count(&self) -> u64 {
        self.blank_frames.load(Ordering::Relaxed)
    }

    /// Add a clip; its source is wrapped in (or re-targeted onto) a mapper
    /// for this timeline's profile.
    pub fn add_clip(&mut self, mut clip: Clip) {
        clip.attach(
            self.info.fps,
            self.info.sample_rate,
            self.info.channels,
            self.info.channel_layout,
        );
        self.clips.push(clip);
        self.sort_clips();
        self.refresh_length();
        self.cache.clear();
    }

    pub fn remove_clip(&mut self, id: &str) -> bool {
        let before = self.clips.len();
        self.clips.retain(|c| c.id != id);
        let removed = before != self.clips.len();
        if removed {
            self.refresh_length();
            self.cache.clear();
        }
        removed
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: &str) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn clip_mut(&mut self, id: &str) -> Option<&mut Clip> {
        self.cache.clear();
        self.clips.iter_mut().find(|c| c.id == id)
    }

    pub fn add_effect(&mut self, effect: Box<dyn Effect>) {
        self.effects.push(effect);
        self.effects
            .sort_by(|a, b| effect_order(a.as_ref(), b.as_ref()));
        self.cache.clear();
    }

    pub fn remove_effect(&mut self, id: &str) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.base().id != id);
        let removed = before != self.effects.len();
        if removed {
            self.cache.clear();
        }
        removed
    }

    pub fn effects(&self) -> &[Box<dyn Effect>] {
        &self.effects
    }

    /// Apply an ordered batch of insert/update/delete records to the object
    /// graph. The batch is validated up front; a bad record fails the whole
    /// batch with nothing applied.
    pub fn apply_diff(&mut self, records: &Value) -> FramecastResult<()> {
        diff::apply(self, records)
    }

    /// Produce (or fetch) one output frame.
    pub fn get_frame(&self, requested: i64) -> FramecastResult<Arc<Frame>> {
        if requested < 1 {
            return Err(FramecastError::out_of_bounds_frame(
                requested,
                self.info.video_length,
            ));
        }
        if let Some(frame) = self.cache.get_frame(requested) {
            return Ok(frame);
        }

        // Double-checked: a concurrent caller may have composited this
        // window while we waited for the lock.
        let _compose = self.compose_lock.lock().expect("compose lock poisoned");
        if let Some(frame) = self.cache.get_frame(requested) {
            return Ok(frame);
        }

        let window = self
            .settings
            .window_frames
            .unwrap_or_else(rayon::current_num_threads)
            .max(1) as i64;
        let first = requested;
        let last = requested + window - 1;
        tracing::debug!(requested, window, "compositing frame window");

        self.update_open_clips(first, last);

        // Ordered audio pre-pass: resamplers inside the mappers carry state,
        // so every clip must see its frames in increasing order.
        for number in first..=last {
            let t = self.frame_time(number);
            for c in self.clips.iter().filter(|c| c.covers(t)) {
                let local = self.clip_frame_number(number, c);
                let _ = self.get_or_create_frame(c, local);
            }
        }

        let numbers: Vec<i64> = (first..=last).collect();
        let frames: Vec<Arc<Frame>> = numbers
            .into_par_iter()
            .map(|number| self.compose(number))
            .collect();
        for frame in frames {
            self.cache.add(frame);
        }

        self.cache
            .get_frame(requested)
            .ok_or_else(|| FramecastError::validation("composited window lost its frames"))
    }

    fn frame_time(&self, number: i64) -> f64 {
        (number - 1) as f64 / self.info.fps.to_f64()
    }

    /// The clip-local frame number playing at timeline frame `number`.
    fn clip_frame_number(&self, number: i64, clip: &Clip) -> i64 {
        let t = self.frame_time(number);
        ((t - clip.position() + clip.start()) * self.info.fps.to_f64()).round() as i64 + 1
    }

    /// Open clips intersecting the window, close the rest. Opening a source
    /// is not assumed reentrant, so this runs under its own lock.
    fn update_open_clips(&self, first: i64, last: i64) {
        let _open = self.open_lock.lock().expect("open lock poisoned");
        let from = self.frame_time(first);
        let to = self.frame_time(last);
        for c in &self.clips {
            let intersects = c.position() <= to && from <= c.position() + c.duration();
            if intersects && !c.is_open() {
                if let Err(e) = c.open() {
                    tracing::warn!(clip = %c.id, error = %e, "clip failed to open");
                }
            } else if !intersects && c.is_open() {
                c.close();
            }
        }
    }

    /// Fetch a clip frame, substituting an observable blank frame when the
    /// clip's source fails.
    fn get_or_create_frame(&self, clip: &Clip, number: i64) -> Arc<Frame> {
        match clip.get_frame(number) {
            Ok(frame) => frame,
            Err(e) => {
                self.blank_frames.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    clip = %clip.id,
                    number,
                    error = %e,
                    "clip source failed, substituting blank frame"
                );
                let samples = Frame::samples_per_frame(
                    number.max(1),
                    self.info.fps,
                    self.info.sample_rate,
                    self.info.channels,
                )
                .max(0) as usize;
                let mut blank = Frame::blank(
                    number,
                    self.info.width,
                    self.info.height,
                    [0, 0, 0],
                    samples,
                    self.info.channels,
                );
                blank.set_sample_rate(self.info.sample_rate);
                blank.set_channel_layout(self.info.channel_layout);
                Arc::new(blank)
            }
        }
    }

    fn compose(&self, number: i64) -> Arc<Frame> {
        let samples = Frame::samples_per_frame(
            number,
            self.info.fps,
            self.info.sample_rate,
            self.info.channels,
        )
        .max(0) as usize;
        let mut frame = Frame::blank(
            number,
            self.info.width,
            self.info.height,
            self.color.at(number),
            samples,
            self.info.channels,
        );
        frame.set_sample_rate(self.info.sample_rate);
        frame.set_channel_layout(self.info.channel_layout);

        let t = self.frame_time(number);
        for c in self.clips.iter().filter(|c| c.covers(t)) {
            let local = self.clip_frame_number(number, c);
            let clip_frame = self.get_or_create_frame(c, local);
            self.add_layer(&mut frame, c, &clip_frame, local);
        }

        for effect in self.effects.iter().filter(|e| e.base().covers(t)) {
            effect.apply(&mut frame, number);
        }

        Arc::new(frame)
    }

    /// Mix one clip's audio and composite its image onto the accumulating
    /// frame.
    fn add_layer(&self, dst: &mut Frame, clip: &Clip, clip_frame: &Frame, local: i64) {
        if self.info.has_audio && clip_frame.sample_count() > 0 {
            if clip_frame.channel_count() != self.info.channels {
                tracing::warn!(
                    clip = %clip.id,
                    have = clip_frame.channel_count(),
                    want = self.info.channels,
                    "channel count mismatch, skipping clip audio"
                );
            } else {
                let volume = clip.volume.value(local) as f32;
                let previous = clip.volume.value(local - 1) as f32;
                for channel in 0..self.info.channels {
                    let mut samples = clip_frame.audio_samples(channel).to_vec();
                    if (previous - volume).abs() > f32::EPSILON {
                        // Ramp between the neighboring volume values so an
                        // animated volume curve never clicks.
                        let span = samples.len().max(1) as f32;
                        for (i, s) in samples.iter_mut().enumerate() {
                            *s *= previous + (volume - previous) * (i as f32 / span);
                        }
                    } else if volume != 1.0 {
                        for s in &mut samples {
                            *s *= volume;
                        }
                    }
                    dst.add_audio(false, channel, 0, &samples, 1.0);
                }
            }
        }

        if !self.info.has_video || !clip_frame.has_image() {
            return;
        }

        let alpha = clip.alpha.value(local).clamp(0.0, 1.0) as f32;
        if alpha <= 0.0 {
            return;
        }

        let source = self.cropped(clip, clip_frame, local);
        let (iw, ih) = (f64::from(source.width), f64::from(source.height));
        if iw == 0.0 || ih == 0.0 {
            return;
        }
        let (cw, ch) = (f64::from(self.info.width), f64::from(self.info.height));

        let (mut sx, mut sy) = match clip.scale_mode() {
            ScaleMode::Fit => {
                let s = (cw / iw).min(ch / ih);
                (s, s)
            }
            ScaleMode::Stretch => (cw / iw, ch / ih),
            ScaleMode::Crop => {
                let s = (cw / iw).max(ch / ih);
                (s, s)
            }
            ScaleMode::None => (1.0, 1.0),
        };
        sx *= clip.scale_x.value(local);
        sy *= clip.scale_y.value(local);
        if sx <= 0.0 || sy <= 0.0 {
            return;
        }

        let (sw, sh) = (iw * sx, ih * sy);
        let (mut ox, mut oy) = gravity_offset(clip.gravity(), cw, ch, sw, sh);
        ox += clip.location_x.value(local) * cw;
        oy += clip.location_y.value(local) * ch;

        let place = Affine::translate((ox, oy)) * Affine::scale_non_uniform(sx, sy);
        let rotation = clip.rotation.value(local);
        let transform = if rotation != 0.0 {
            let center = (ox + sw / 2.0, oy + sh / 2.0);
            Affine::translate(center)
                * Affine::rotate(rotation.to_radians())
                * Affine::translate((-center.0, -center.1))
                * place
        } else {
            place
        };

        composite::draw(dst, &source, transform, alpha);
    }

    /// The clip's image with its crop curves applied. Full-frame crops
    /// borrow the original; anything else copies the sub-rectangle.
    fn cropped(&self, clip: &Clip, clip_frame: &Frame, local: i64) -> Frame {
        let w = clip.crop_width.value(local).clamp(0.0, 1.0);
        let h = clip.crop_height.value(local).clamp(0.0, 1.0);
        let x = clip.crop_x.value(local).clamp(0.0, 1.0);
        let y = clip.crop_y.value(local).clamp(0.0, 1.0);
        if w >= 1.0 && h >= 1.0 && x <= 0.0 && y <= 0.0 {
            return clip_frame.clone();
        }
        let (fw, fh) = (clip_frame.width as i64, clip_frame.height as i64);
        let cx = ((x * fw as f64) as i64).clamp(0, fw);
        let cy = ((y * fh as f64) as i64).clamp(0, fh);
        let cw = ((w * fw as f64) as i64).clamp(0, fw - cx);
        let chh = ((h * fh as f64) as i64).clamp(0, fh - cy);

        let mut out = Frame::new(clip_frame.number, cw.max(0) as u32, chh.max(0) as u32);
        let Some(src) = clip_frame.pixels() else {
            return out;
        };
        let mut pixels = vec![0u8; (cw * chh * 4).max(0) as usize];
        for row in 0..chh {
            let s = (((cy + row) * fw + cx) * 4) as usize;
            let d = (row * cw * 4) as usize;
            pixels[d..d + (cw * 4) as usize].copy_from_slice(&src[s..s + (cw * 4) as usize]);
        }
        out.set_pixels(pixels);
        out
    }

    fn sort_clips(&mut self) {
        self.clips.sort_by(|a, b| {
            a.layer()
                .cmp(&b.layer())
                .then(a.position().total_cmp(&b.position()))
        });
    }

    /// Track the furthest clip end as the timeline's duration.
    fn refresh_length(&mut self) {
        let duration = self
            .clips
            .iter()
            .map(|c| c.position() + c.duration())
            .fold(0.0f64, f64::max);
        self.info.duration = duration;
        self.info.video_length = (duration * self.info.fps.to_f64()).round() as i64;
    }

    /// Re-target every clip's mapper after a profile change.
    fn retarget_clips(&mut self) {
        for c in &mut self.clips {
            c.attach(
                self.info.fps,
                self.info.sample_rate,
                self.info.channels,
                self.info.channel_layout,
            );
        }
        self.refresh_length();
        self.cache.clear();
    }
}

/// Top-left placement offset for a scaled image under a 9-way anchor.
fn gravity_offset(gravity: Gravity, cw: f64, ch: f64, sw: f64, sh: f64) -> (f64, f64) {
    let x = match gravity {
        Gravity::TopLeft | Gravity::Left | Gravity::BottomLeft => 0.0,
        Gravity::Top | Gravity::Center | Gravity::Bottom => (cw - sw) / 2.0,
        Gravity::TopRight | Gravity::Right | Gravity::BottomRight => cw - sw,
    };
    let y = match gravity {
        Gravity::TopLeft | Gravity::Top | Gravity::TopRight => 0.0,
        Gravity::Left | Gravity::Center | Gravity::Right => (ch - sh) / 2.0,
        Gravity::BottomLeft | Gravity::Bottom | Gravity::BottomRight => ch - sh,
    };
    (x, y)
}

impl Structured for Timeline {
    fn to_structured(&self) -> Value {
        let clips: Vec<Value> = self.clips.iter().map(|c| c.to_structured()).collect();
        let effects: Vec<Value> = self.effects.iter().map(|e| e.to_structured()).collect();
        json!({
            "type": "Timeline",
            "width": self.info.width,
            "height": self.info.height,
            "fps": self.info.fps,
            "sample_rate": self.info.sample_rate,
            "channels": self.info.channels,
            "channel_layout": self.info.channel_layout,
            "duration": self.info.duration,
            "video_length": self.info.video_length.to_string(),
            "color": self.color.to_structured(),
            "viewport_scale": self.viewport_scale.to_structured(),
            "viewport_x": self.viewport_x.to_structured(),
            "viewport_y": self.viewport_y.to_structured(),
            "clips": clips,
            "effects": effects,
        })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        if let Some(v) = value.get("width").and_then(Value::as_u64) {
            self.info.width = (v as u32).min(self.settings.max_width);
        }
        if let Some(v) = value.get("height").and_then(Value::as_u64) {
            self.info.height = (v as u32).min(self.settings.max_height);
        }
        if let Some(v) = value.get("fps") {
            self.info.fps = parse_fps(v)?;
        }
        merge_i32(&mut self.info.sample_rate, value, "sample_rate");
        merge_i32(&mut self.info.channels, value, "channels");
        if let Some(v) = value.get("channel_layout") {
            self.info.channel_layout = serde_json::from_value(v.clone())
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
        }
        merge_f64(&mut self.info.duration, value, "duration");
        if let Some(v) = value.get("color") {
            self.color.load_structured(v)?;
        }
        for (curve, key) in [
            (&mut self.viewport_scale, "viewport_scale"),
            (&mut self.viewport_x, "viewport_x"),
            (&mut self.viewport_y, "viewport_y"),
        ] {
            if let Some(v) = value.get(key) {
                curve.load_structured(v)?;
            }
        }
        if let Some(entries) = value.get("clips").and_then(Value::as_array) {
            self.clips.clear();
            for entry in entries {
                let mut clip = Clip::new(Box::new(crate::source::dummy::DummySource::new(
                    SourceInfo::default_profile(self.info.width, self.info.height, 1),
                )));
                clip.load_structured(entry)?;
                self.add_clip(clip);
            }
        }
        if let Some(entries) = value.get("effects").and_then(Value::as_array) {
            self.effects.clear();
            for entry in entries {
                let kind = entry.get("type").and_then(Value::as_str).ok_or_else(|| {
                    FramecastError::invalid_json("effect entry is missing a \"type\" tag")
                })?;
                self.effects.push(create_effect(kind, entry)?);
            }
            self.effects
                .sort_by(|a, b| effect_order(a.as_ref(), b.as_ref()));
        }
        self.retarget_clips();
        Ok(())
    }
}

pub(crate) fn parse_fps(value: &Value) -> FramecastResult<Fraction> {
    if let Some(n) = value.as_f64() {
        return Fraction::new(n.round() as i32, 1)
            .map_err(|e| FramecastError::invalid_json(e.to_string()));
    }
    serde_json::from_value(value.clone()).map_err(|e| FramecastError::invalid_json(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::dummy::DummySource;

    fn timeline() -> Timeline {
        Timeline::new(
            64,
            48,
            Fraction { num: 30, den: 1 },
            44100,
            2,
            ChannelLayout::Stereo,
            TimelineSettings {
                window_frames: Some(2),
                ..TimelineSettings::default()
            },
        )
    }

    fn color_clip(id: &str, layer: i32, color: [u8; 3], frames: i64) -> Clip {
        let info = SourceInfo::default_profile(64, 48, frames);
        let mut clip = Clip::new(Box::new(DummySource::with_color(info, color)));
        clip.id = id.into();
        clip.set_layer(layer);
        clip
    }

    fn center_pixel(frame: &Frame) -> [u8; 4] {
        let px = frame.pixels().unwrap();
        let i = (((frame.height / 2) * frame.width + frame.width / 2) * 4) as usize;
        [px[i], px[i + 1], px[i + 2], px[i + 3]]
    }

    #[test]
    fn empty_timeline_yields_background_frames() {
        let t = timeline();
        let f = t.get_frame(1).unwrap();
        assert_eq!(center_pixel(&f), [0, 0, 0, 255]);
        assert_eq!(f.sample_count(), 1470);
    }

    #[test]
    fn invalid_frame_number_errors() {
        let t = timeline();
        assert!(matches!(
            t.get_frame(0),
            Err(FramecastError::OutOfBoundsFrame { .. })
        ));
    }

    #[test]
    fn single_clip_fills_the_canvas() {
        let mut t = timeline();
        t.add_clip(color_clip("a", 0, [200, 10, 10], 30));
        let f = t.get_frame(1).unwrap();
        assert_eq!(center_pixel(&f)[0], 200);
    }

    #[test]
    fn higher_layer_composites_on_top() {
        let mut t = timeline();
        t.add_clip(color_clip("bottom", 0, [200, 0, 0], 30));
        t.add_clip(color_clip("top", 5, [0, 200, 0], 30));
        let f = t.get_frame(1).unwrap();
        let px = center_pixel(&f);
        assert_eq!(px[1], 200);
        assert_eq!(px[0], 0);
    }

    #[test]
    fn alpha_curve_blends_layers() {
        let mut t = timeline();
        t.add_clip(color_clip("bottom", 0, [200, 0, 0], 30));
        let mut top = color_clip("top", 5, [0, 200, 0], 30);
        top.alpha = Curve::constant(0.5);
        t.add_clip(top);
        let f = t.get_frame(1).unwrap();
        let px = center_pixel(&f);
        assert!(px[0] > 50 && px[0] < 150, "red {}", px[0]);
        assert!(px[1] > 50 && px[1] < 150, "green {}", px[1]);
    }

    #[test]
    fn frames_compute_at_most_once() {
        let mut t = timeline();
        t.add_clip(color_clip("a", 0, [1, 2, 3], 30));
        let first = t.get_frame(1).unwrap();
        let again = t.get_frame(1).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn clip_audio_reaches_the_output() {
        let mut t = timeline();
        t.add_clip(color_clip("a", 0, [0, 0, 0], 30));
        let f = t.get_frame(1).unwrap();
        assert_eq!(f.sample_count(), 1470);
        assert!(f.audio_samples(0).iter().any(|&s| s != 0.0));
    }

    #[test]
    fn volume_curve_scales_audio() {
        let mut t = timeline();
        let mut clip = color_clip("a", 0, [0, 0, 0], 30);
        clip.volume = Curve::constant(0.0);
        t.add_clip(clip);
        let f = t.get_frame(2).unwrap();
        assert!(f.audio_samples(0).iter().all(|&s| s == 0.0));
    }

    #[test]
    fn failing_clip_substitutes_blank_and_counts() {
        let mut t = timeline();
        // One frame of media stretched over a full second: frames past the
        // source's length fail inside the mapper's wrapped source, but the
        // composite must still come out.
        let mut clip = color_clip("short", 0, [9, 9, 9], 30);
        clip.time.add_point_xy(1.0, 1000.0);
        clip.time.add_point_xy(2.0, 2000.0);
        t.add_clip(clip);
        let f = t.get_frame(1);
        assert!(f.is_ok());
        assert!(t.blank_frame_count() > 0);
    }

    #[test]
    fn timeline_duration_tracks_clips() {
        let mut t = timeline();
        let mut clip = color_clip("a", 0, [0, 0, 0], 30);
        clip.set_position(2.0);
        t.add_clip(clip);
        assert_eq!(t.info().duration, 3.0);
        assert_eq!(t.info().video_length, 90);
        t.remove_clip("a");
        assert_eq!(t.info().duration, 0.0);
    }

    #[test]
    fn structured_snapshot_roundtrips() {
        let mut t = timeline();
        t.add_clip(color_clip("a", 2, [5, 5, 5], 30));
        t.add_effect(create_effect("Negate", &json!({ "id": "n", "end": 10.0 })).unwrap());
        let snapshot = t.to_structured();

        let mut restored = timeline();
        restored.load_structured(&snapshot).unwrap();
        assert_eq!(restored.clips().len(), 1);
        assert_eq!(restored.clips()[0].id, "a");
        assert_eq!(restored.clips()[0].layer(), 2);
        assert_eq!(restored.effects().len(), 1);
    }
}
