pub mod resample;

use std::sync::{Arc, Mutex, MutexGuard};

use crate::{
    cache::CacheMemory,
    foundation::{
        core::{ChannelLayout, Fraction},
        error::{FramecastError, FramecastResult},
    },
    frame::Frame,
    source::{FrameSource, SourceInfo},
};

use resample::LinearResampler;

/// Extra input samples fed to the resampler per frame so it is never
/// input-limited at block edges.
const EXTRA_INPUT_SAMPLES: i32 = 20;

/// Pulldown technique used when converting between frame rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Pulldown {
    /// 2:3:2:3 — duplicate or skip single fields at the field interval.
    Classic,
    /// 2:3:3:2 — duplicate or skip field pairs spanning two adjacent frames.
    Advanced,
    /// Duplicate or skip whole frames, never individual fields.
    None,
}

/// One half-frame: a source frame number plus odd/even parity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Field {
    pub frame: i64,
    pub odd: bool,
}

/// The inclusive range of source samples belonging to one target frame.
///
/// A range may start midway through one source frame and end midway through
/// a later one. Positions are per-channel sample indices at the source rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SampleRange {
    pub frame_start: i64,
    pub sample_start: i32,
    pub frame_end: i64,
    pub sample_end: i32,
    pub total: i32,
}

impl SampleRange {
    /// Grow the range at the end by `count` samples, rolling over into later
    /// frames as needed.
    pub fn extend(&mut self, count: i32, fps: Fraction, sample_rate: i32, channels: i32) {
        self.sample_end += count;
        loop {
            let per = Frame::samples_per_frame(self.frame_end, fps, sample_rate, channels);
            if self.sample_end < per {
                break;
            }
            self.frame_end += 1;
            self.sample_end -= per;
        }
        self.total += count;
    }

    /// Drop `count` samples from the start of the range, rolling into later
    /// frames as needed.
    pub fn shrink(&mut self, count: i32, fps: Fraction, sample_rate: i32, channels: i32) {
        self.sample_start += count;
        loop {
            let per = Frame::samples_per_frame(self.frame_start, fps, sample_rate, channels);
            if self.sample_start < per {
                break;
            }
            self.frame_start += 1;
            self.sample_start -= per;
        }
        self.total -= count;
    }

    /// Move the whole window forward by `count` samples, keeping its length.
    pub fn shift(&mut self, count: i32, fps: Fraction, sample_rate: i32, channels: i32) {
        self.extend(count, fps, sample_rate, channels);
        self.shrink(count, fps, sample_rate, channels);
    }
}

/// One target frame: the two fields that form its image plus the source
/// sample range that forms its audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MappedFrame {
    pub odd: Field,
    pub even: Field,
    pub samples: SampleRange,
}

#[derive(Debug)]
struct MapperState {
    dirty: bool,
    frames: Vec<MappedFrame>,
    resampler: Option<LinearResampler>,
}

/// Remaps a source's frame and sample timeline onto a target frame rate,
/// sample rate and channel layout.
///
/// The mapping table is built lazily and rebuilt after [`change_mapping`].
/// Implements [`FrameSource`] itself so mappers nest transparently under
/// clips. Audio redistribution never loses or duplicates a sample; rate
/// conversion is stateful, so frames must be requested in increasing order
/// for seamless audio (the compositor's ordered pre-pass guarantees this).
///
/// [`change_mapping`]: FrameMapper::change_mapping
pub struct FrameMapper {
    source: Box<dyn FrameSource>,
    info: SourceInfo,
    original: Fraction,
    target: Fraction,
    pulldown: Pulldown,
    cache: CacheMemory,
    state: Mutex<MapperState>,
}

impl FrameMapper {
    pub fn new(
        source: Box<dyn FrameSource>,
        target_fps: Fraction,
        pulldown: Pulldown,
        sample_rate: i32,
        channels: i32,
        channel_layout: ChannelLayout,
    ) -> Self {
        let original = source.info().fps;
        let info = retarget_info(source.info(), target_fps, sample_rate, channels, channel_layout);
        let cache = CacheMemory::new();
        cache.set_max_bytes_from_info(
            rayon::current_num_threads() * 2,
            info.width,
            info.height,
            info.sample_rate,
            info.channels,
        );
        Self {
            source,
            info,
            original,
            target: target_fps,
            pulldown,
            cache,
            state: Mutex::new(MapperState {
                dirty: true,
                frames: Vec::new(),
                resampler: None,
            }),
        }
    }

    /// Re-target the mapper without dropping the wrapped source. The mapping
    /// table, frame cache and resampler state are discarded; the table is
    /// rebuilt lazily on next use.
    pub fn change_mapping(
        &mut self,
        target_fps: Fraction,
        pulldown: Pulldown,
        sample_rate: i32,
        channels: i32,
        channel_layout: ChannelLayout,
    ) {
        tracing::debug!(
            num = target_fps.num,
            den = target_fps.den,
            sample_rate,
            channels,
            "mapper re-targeted"
        );
        self.target = target_fps;
        self.pulldown = pulldown;
        self.info = retarget_info(
            self.source.info(),
            target_fps,
            sample_rate,
            channels,
            channel_layout,
        );
        self.cache.clear();
        self.cache.set_max_bytes_from_info(
            rayon::current_num_threads() * 2,
            self.info.width,
            self.info.height,
            self.info.sample_rate,
            self.info.channels,
        );
        let state = self.state.get_mut().expect("mapper lock poisoned");
        state.dirty = true;
        state.frames.clear();
        state.resampler = None;
    }

    /// Look up the mapping entry for one target frame.
    pub fn mapped_frame(&self, number: i64) -> FramecastResult<MappedFrame> {
        let mut state = self.lock_state();
        if state.dirty {
            self.init_locked(&mut state);
        }
        self.mapped_frame_locked(&state, number)
    }

    fn mapped_frame_locked(
        &self,
        state: &MapperState,
        number: i64,
    ) -> FramecastResult<MappedFrame> {
        if self.info.has_video && !self.info.has_audio && self.info.has_single_image {
            // Still images need no mapping; every target frame is itself.
            let field = Field {
                frame: number,
                odd: true,
            };
            return Ok(MappedFrame {
                odd: field,
                even: field,
                samples: SampleRange {
                    frame_start: 0,
                    sample_start: 0,
                    frame_end: 0,
                    sample_end: 0,
                    total: 0,
                },
            });
        }
        let total = state.frames.len() as i64;
        if number < 1 || number > total {
            return Err(FramecastError::out_of_bounds_frame(number, total));
        }
        Ok(state.frames[(number - 1) as usize])
    }

    /// Rebuild the field and frame mapping tables.
    fn init_locked(&self, state: &mut MapperState) {
        if self.info.has_video && !self.info.has_audio && self.info.has_single_image {
            return;
        }
        tracing::debug!(
            original = self.original.to_f64(),
            target = self.target.to_f64(),
            "mapper building frame mapping"
        );

        state.dirty = false;
        state.frames.clear();
        self.cache.clear();

        let src = self.source.info();
        let mut list = FieldList::new();

        // 24/25/30 pairs use the cadence-based pulldown walk; every other
        // rate pair falls back to a linear remap of whole frames.
        if is_broadcast_rate(self.original.to_f64()) && is_broadcast_rate(self.target.to_f64()) {
            let difference = self.target.to_int() - self.original.to_int();
            let mut field_interval = 0i64;
            let mut frame_interval = 0i64;
            if difference != 0 {
                field_interval =
                    (self.original.to_int() as f64 / difference as f64).abs().round() as i64;
                frame_interval = field_interval * 2;
            }

            let number_of_fields = src.video_length * 2;
            let mut frame: i64 = 1;
            let mut field: i64 = 1;
            while field <= number_of_fields {
                if difference == 0 {
                    list.add(frame);
                } else if difference > 0 {
                    // Source is short on fields; insert extras on cadence.
                    list.add(frame);
                    if self.pulldown == Pulldown::Classic && field % field_interval == 0 {
                        list.add(frame);
                    } else if self.pulldown == Pulldown::Advanced
                        && field % field_interval == 0
                        && field % frame_interval != 0
                    {
                        list.add(frame);
                        if frame + 1 <= self.info.video_length {
                            let odd = list.toggle;
                            list.push(Field {
                                frame: frame + 1,
                                odd,
                            });
                        }
                    } else if self.pulldown == Pulldown::None && field % frame_interval == 0 {
                        list.add(frame);
                        list.add(frame);
                    }
                } else {
                    // Source has too many fields; skip on cadence.
                    if self.pulldown == Pulldown::Classic && field % field_interval == 0 {
                        list.toggle = !list.toggle;
                    } else if self.pulldown == Pulldown::Advanced
                        && field % field_interval == 0
                        && field % frame_interval != 0
                    {
                        field += 1;
                    } else if self.pulldown == Pulldown::None && frame % field_interval == 0 {
                        field += 1;
                    } else {
                        list.add(frame);
                    }
                }

                if field % 2 == 0 {
                    frame += 1;
                }
                field += 1;
            }
        } else {
            let rate_diff = self.target.to_f64() / self.original.to_f64();
            let new_length = (src.video_length as f64 * rate_diff) as i64;
            let increment = (src.video_length + 1) as f64 / new_length as f64;
            let mut original_frame = 1.0f64;
            for _ in 1..=new_length {
                let n = original_frame.round() as i64;
                list.add(n);
                list.add(n);
                original_frame += increment;
            }
        }

        // Pair consecutive fields into frames and walk the source sample
        // stream so each target frame gets exactly its share.
        let mut odd = Field { frame: 0, odd: true };
        let mut even = Field { frame: 0, odd: true };
        let mut start_frame: i64 = 1;
        let mut start_position: i32 = 0;
        for (i, f) in list.fields.iter().enumerate() {
            if f.odd {
                odd = *f;
            } else {
                even = *f;
            }
            if (i + 1) % 2 != 0 {
                continue;
            }
            let number = (i as i64 + 1) / 2;
            let total =
                Frame::samples_per_frame(number, self.target, src.sample_rate, src.channels);

            let mut end_frame = start_frame;
            let mut end_position = start_position;
            let mut remaining = total;
            while remaining > 0 {
                let available =
                    Frame::samples_per_frame(end_frame, self.original, src.sample_rate, src.channels)
                        - end_position;
                if available >= remaining {
                    end_position += remaining - 1;
                    remaining = 0;
                } else {
                    end_frame += 1;
                    end_position = 0;
                    remaining -= available;
                }
            }

            state.frames.push(MappedFrame {
                odd,
                even,
                samples: SampleRange {
                    frame_start: start_frame,
                    sample_start: start_position,
                    frame_end: end_frame,
                    sample_end: end_position,
                    total,
                },
            });

            start_frame = end_frame;
            start_position = end_position + 1;
            if start_position
                >= Frame::samples_per_frame(start_frame, self.original, src.sample_rate, src.channels)
            {
                start_frame += 1;
                start_position = 0;
            }
        }
    }

    /// Fetch a source frame, substituting silence on recoverable source
    /// errors so one bad frame never poisons the mapping.
    fn get_or_create_frame(&self, number: i64) -> FramecastResult<Arc<Frame>> {
        match self.source.get_frame(number) {
            Ok(frame) => Ok(frame),
            Err(
                FramecastError::ReaderClosed(_)
                | FramecastError::TooManySeeks(_)
                | FramecastError::OutOfBoundsFrame { .. },
            ) => {
                let src = self.source.info();
                let samples = Frame::samples_per_frame(
                    number,
                    self.target,
                    src.sample_rate,
                    src.channels,
                ) as usize;
                tracing::debug!(number, samples, "source frame unavailable, using blank");
                let mut blank = Frame::blank(
                    number,
                    self.info.width,
                    self.info.height,
                    [0, 0, 0],
                    samples,
                    src.channels,
                );
                blank.set_sample_rate(src.sample_rate);
                blank.set_channel_layout(self.info.channel_layout);
                Ok(Arc::new(blank))
            }
            Err(e) => Err(e),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, MapperState> {
        self.state.lock().expect("mapper lock poisoned")
    }
}

impl FrameSource for FrameMapper {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn open(&mut self) -> FramecastResult<()> {
        self.source.open()
    }

    fn close(&mut self) {
        self.source.close();
        self.cache.clear();
        let state = self.state.get_mut().expect("mapper lock poisoned");
        state.dirty = true;
        state.frames.clear();
        state.resampler = None;
    }

    fn is_open(&self) -> bool {
        self.source.is_open()
    }

    fn get_frame(&self, requested: i64) -> FramecastResult<Arc<Frame>> {
        if let Some(frame) = self.cache.get_frame(requested) {
            return Ok(frame);
        }

        // One builder at a time; a concurrent caller for the same frame
        // finds it in the cache on the second check.
        let mut state = self.lock_state();
        if state.dirty {
            self.init_locked(&mut state);
        }
        if let Some(frame) = self.cache.get_frame(requested) {
            return Ok(frame);
        }

        let mapped = self.mapped_frame_locked(&state, requested)?;
        let mapped_frame = self.get_or_create_frame(mapped.odd.frame)?;

        let channels_in_frame = mapped_frame.channel_count();
        let samples_in_frame = Frame::samples_per_frame(
            requested,
            self.target,
            mapped_frame.sample_rate(),
            channels_in_frame,
        )
        .max(0) as usize;

        // Identical mapping: reuse the source frame untouched.
        if self.info.sample_rate == mapped_frame.sample_rate()
            && self.info.channels == channels_in_frame
            && self.info.channel_layout == mapped_frame.channel_layout()
            && mapped.samples.total as usize == mapped_frame.sample_count()
            && mapped.samples.frame_start == mapped.odd.frame
            && mapped.samples.sample_start == 0
            && mapped_frame.number == requested
            && self.target == self.original
        {
            self.cache.add(Arc::clone(&mapped_frame));
            return Ok(mapped_frame);
        }

        let src_rate = self.source.info().sample_rate;
        let src_channels = self.source.info().channels;

        let mut frame = Frame::new(requested, mapped_frame.width, mapped_frame.height);
        frame.set_audio(
            vec![vec![0.0; samples_in_frame]; channels_in_frame.max(0) as usize],
            mapped_frame.sample_rate(),
            mapped_frame.channel_layout(),
        );
        if let Some(pixels) = mapped_frame.pixels() {
            frame.set_pixels(pixels.to_vec());
        }
        if mapped.even.frame != mapped.odd.frame {
            let even_frame = self.get_or_create_frame(mapped.even.frame)?;
            frame.merge_even_rows(&even_frame);
        }

        let need_resampling = self.info.has_audio
            && (self.info.sample_rate != frame.sample_rate()
                || self.info.channels != channels_in_frame
                || self.info.channel_layout != frame.channel_layout());

        // Over-read slightly when resampling so the converter is never
        // starved at the block edge; after the first frame the window shifts
        // instead, keeping step with the converter's carried position.
        let mut copy = mapped.samples;
        if need_resampling {
            if state.resampler.is_some() {
                copy.shift(EXTRA_INPUT_SAMPLES, self.original, src_rate, src_channels);
            } else {
                copy.extend(EXTRA_INPUT_SAMPLES, self.original, src_rate, src_channels);
            }
        }

        let mut samples_copied: usize = 0;
        let mut at_frame = copy.frame_start;
        while self.info.has_audio && (samples_copied as i32) < copy.total {
            let original_frame = self.get_or_create_frame(at_frame)?;
            let original_samples = original_frame.sample_count() as i32;
            let remaining = copy.total - samples_copied as i32;
            let mut advanced = 0usize;
            for channel in 0..channels_in_frame {
                let plane = original_frame.audio_samples(channel);
                let (replace, skip, count) = if at_frame == copy.frame_start {
                    (
                        true,
                        copy.sample_start,
                        (original_samples - copy.sample_start).min(remaining),
                    )
                } else if at_frame < copy.frame_end {
                    (true, 0, original_samples.min(remaining))
                } else {
                    (false, 0, (copy.sample_end + 1).min(remaining))
                };
                let skip = skip.max(0) as usize;
                let count = (count.max(0) as usize).min(plane.len().saturating_sub(skip));
                frame.add_audio(replace, channel, samples_copied, &plane[skip..skip + count], 1.0);
                advanced = count;
            }
            if advanced == 0 {
                break;
            }
            samples_copied += advanced;
            at_frame += 1;
        }

        if need_resampling {
            let out_len = Frame::samples_per_frame(
                requested,
                self.target,
                self.info.sample_rate,
                self.info.channels,
            )
            .max(0) as usize;
            let resampler = state.resampler.get_or_insert_with(|| {
                LinearResampler::new(src_rate, self.info.sample_rate, self.info.channels)
            });
            let planes: Vec<Vec<f32>> = (0..channels_in_frame)
                .map(|c| frame.audio_samples(c).to_vec())
                .collect();
            let out = resampler.process(&planes, out_len);
            frame.set_audio(out, self.info.sample_rate, self.info.channel_layout);
        }

        let frame = Arc::new(frame);
        self.cache.add(Arc::clone(&frame));
        Ok(frame)
    }
}

struct FieldList {
    fields: Vec<Field>,
    toggle: bool,
}

impl FieldList {
    fn new() -> Self {
        Self {
            fields: Vec::new(),
            toggle: true,
        }
    }

    fn add(&mut self, frame: i64) {
        let odd = self.toggle;
        self.push(Field { frame, odd });
    }

    fn push(&mut self, field: Field) {
        self.fields.push(field);
        self.toggle = !self.toggle;
    }
}

fn is_broadcast_rate(rate: f64) -> bool {
    (rate - 24.0).abs() < 1e-7 || (rate - 25.0).abs() < 1e-7 || (rate - 30.0).abs() < 1e-7
}

fn retarget_info(
    source: &SourceInfo,
    target_fps: Fraction,
    sample_rate: i32,
    channels: i32,
    channel_layout: ChannelLayout,
) -> SourceInfo {
    let mut info = source.clone();
    info.fps = target_fps;
    info.video_length = (info.duration * target_fps.to_f64()).round() as i64;
    info.sample_rate = sample_rate;
    info.channels = channels;
    info.channel_layout = channel_layout;
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::dummy::DummySource;

    fn source(num: i32, den: i32, length: i64) -> Box<dyn FrameSource> {
        let mut info = SourceInfo::default_profile(8, 8, length);
        info.fps = Fraction { num, den };
        info.duration = length as f64 / info.fps.to_f64();
        Box::new(DummySource::new(info))
    }

    fn mapper(num: i32, den: i32, length: i64, target: (i32, i32), pulldown: Pulldown) -> FrameMapper {
        let mut m = FrameMapper::new(
            source(num, den, length),
            Fraction {
                num: target.0,
                den: target.1,
            },
            pulldown,
            44100,
            2,
            ChannelLayout::Stereo,
        );
        m.open().unwrap();
        m
    }

    fn fields_of(m: &FrameMapper, n: i64) -> (i64, i64) {
        let f = m.mapped_frame(n).unwrap();
        (f.odd.frame, f.even.frame)
    }

    #[test]
    fn classic_pulldown_24_to_30_duplicates_single_fields() {
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        assert_eq!(fields_of(&m, 1), (1, 1));
        assert_eq!(fields_of(&m, 2), (2, 2));
        assert_eq!(fields_of(&m, 3), (2, 3));
    }

    #[test]
    fn advanced_pulldown_24_to_30_duplicates_across_two_frames() {
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Advanced);
        assert_eq!(fields_of(&m, 3), (2, 3));
        assert_eq!(fields_of(&m, 4), (3, 3));
    }

    #[test]
    fn none_pulldown_30_to_24_skips_whole_frames() {
        let m = mapper(30, 1, 30, (24, 1), Pulldown::None);
        assert_eq!(fields_of(&m, 4), (4, 4));
        assert_eq!(fields_of(&m, 5), (6, 6));
    }

    #[test]
    fn mapped_frame_errors_on_both_sides() {
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        assert!(matches!(
            m.mapped_frame(0),
            Err(FramecastError::OutOfBoundsFrame { .. })
        ));
        assert!(matches!(
            m.mapped_frame(31),
            Err(FramecastError::OutOfBoundsFrame { .. })
        ));
    }

    #[test]
    fn sample_totals_are_conserved_over_one_second() {
        // 24 source frames = 1 second = 44100 samples; the 30 target frames
        // covering the same second must split them without loss.
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        let total: i64 = (1..=30)
            .map(|n| i64::from(m.mapped_frame(n).unwrap().samples.total))
            .sum();
        assert_eq!(total, 44100);
    }

    #[test]
    fn sample_ranges_are_contiguous() {
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        let original = Fraction { num: 24, den: 1 };
        let mut expect_frame = 1i64;
        let mut expect_position = 0i32;
        for n in 1..=30 {
            let r = m.mapped_frame(n).unwrap().samples;
            assert_eq!((r.frame_start, r.sample_start), (expect_frame, expect_position));
            expect_frame = r.frame_end;
            expect_position = r.sample_end + 1;
            if expect_position >= Frame::samples_per_frame(expect_frame, original, 44100, 2) {
                expect_frame += 1;
                expect_position = 0;
            }
        }
    }

    #[test]
    fn odd_rate_pairs_use_linear_mapping() {
        // 30 -> 119/4 fps takes the generic path: whole frames, two equal
        // fields each, ranges still contiguous.
        let m = mapper(30, 1, 24, (119, 4), Pulldown::Classic);
        let original = Fraction { num: 30, den: 1 };
        let target = Fraction { num: 119, den: 4 };
        let mut expect_frame = 1i64;
        let mut expect_position = 0i32;
        let mut n = 1;
        while let Ok(f) = m.mapped_frame(n) {
            assert_eq!(f.odd.frame, f.even.frame);
            assert_eq!(f.samples.total, Frame::samples_per_frame(n, target, 44100, 2));
            assert_eq!(
                (f.samples.frame_start, f.samples.sample_start),
                (expect_frame, expect_position)
            );
            expect_frame = f.samples.frame_end;
            expect_position = f.samples.sample_end + 1;
            if expect_position >= Frame::samples_per_frame(expect_frame, original, 44100, 2) {
                expect_frame += 1;
                expect_position = 0;
            }
            n += 1;
        }
        assert!(n > 20);
    }

    #[test]
    fn identical_mapping_reuses_source_frames() {
        let m = mapper(30, 1, 30, (30, 1), Pulldown::Classic);
        let f = m.get_frame(5).unwrap();
        assert_eq!(f.number, 5);
        assert_eq!(f.sample_count(), 1470);
        // Second request is a cache hit on the same allocation.
        let again = m.get_frame(5).unwrap();
        assert!(Arc::ptr_eq(&f, &again));
    }

    #[test]
    fn remapped_audio_is_the_source_stream_redistributed() {
        // Same sample rate and channels, different frame rate: output audio
        // concatenated across frames must equal the source stream exactly.
        let m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        let mut offset: i64 = 0;
        for n in 1..=6 {
            let f = m.get_frame(n).unwrap();
            for (i, &s) in f.audio_samples(0).iter().enumerate() {
                assert_eq!(s, DummySource::sample_at(offset + i as i64), "frame {n} sample {i}");
            }
            offset += f.sample_count() as i64;
        }
    }

    #[test]
    fn resampling_path_produces_target_counts() {
        let mut m = FrameMapper::new(
            source(24, 1, 24),
            Fraction { num: 30, den: 1 },
            Pulldown::Classic,
            22050,
            1,
            ChannelLayout::Mono,
        );
        m.open().unwrap();
        let f = m.get_frame(1).unwrap();
        assert_eq!(f.sample_rate(), 22050);
        assert_eq!(f.channel_count(), 1);
        assert_eq!(
            f.sample_count(),
            Frame::samples_per_frame(1, Fraction { num: 30, den: 1 }, 22050, 1) as usize
        );
    }

    #[test]
    fn change_mapping_rebuilds_without_dropping_source() {
        let mut m = mapper(24, 1, 24, (30, 1), Pulldown::Classic);
        assert_eq!(fields_of(&m, 3), (2, 3));
        m.change_mapping(
            Fraction { num: 24, den: 1 },
            Pulldown::Classic,
            44100,
            2,
            ChannelLayout::Stereo,
        );
        assert_eq!(fields_of(&m, 3), (3, 3));
        assert!(m.is_open());
    }

    #[test]
    fn sample_range_operations_roll_across_frames() {
        let fps = Fraction { num: 30, den: 1 };
        // 1470 samples per frame at 30fps/44.1kHz stereo.
        let mut r = SampleRange {
            frame_start: 1,
            sample_start: 1400,
            frame_end: 2,
            sample_end: 100,
            total: 171,
        };
        r.extend(1400, fps, 44100, 2); // wraps onto frame 3
        assert_eq!((r.frame_end, r.sample_end, r.total), (3, 30, 1571));
        r.shrink(80, fps, 44100, 2); // wraps the start onto frame 2
        assert_eq!((r.frame_start, r.sample_start), (2, 10));
        assert_eq!(r.total, 1491);
        let len_before = r.total;
        r.shift(100, fps, 44100, 2);
        assert_eq!(r.total, len_before);
        assert_eq!((r.frame_start, r.sample_start), (2, 110));
        assert_eq!((r.frame_end, r.sample_end), (3, 130));
    }
}
