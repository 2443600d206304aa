use std::sync::Arc;

use crate::{
    foundation::error::{FramecastError, FramecastResult},
    frame::Frame,
    source::{FrameSource, SourceInfo},
};

/// A synthetic source producing solid-color frames with deterministic audio.
///
/// Stands in for real decoders in tests and as the default source for clips
/// constructed from structured data with no reader attached.
#[derive(Debug)]
pub struct DummySource {
    info: SourceInfo,
    color: [u8; 3],
    open: bool,
}

impl DummySource {
    /// A dummy source with the given stream profile, black frames.
    pub fn new(info: SourceInfo) -> Self {
        Self {
            info,
            color: [0, 0, 0],
            open: false,
        }
    }

    /// A dummy source producing solid frames of the given color.
    pub fn with_color(info: SourceInfo, color: [u8; 3]) -> Self {
        Self {
            info,
            color,
            open: false,
        }
    }

    /// The deterministic sample value at an absolute sample offset.
    ///
    /// A quiet sawtooth: cheap, non-silent, and reproducible, so tests can
    /// assert exact audio routing.
    pub fn sample_at(offset: i64) -> f32 {
        ((offset.rem_euclid(100)) as f32 / 100.0 - 0.5) * 0.1
    }
}

impl FrameSource for DummySource {
    fn info(&self) -> &SourceInfo {
        &self.info
    }

    fn open(&mut self) -> FramecastResult<()> {
        self.open = true;
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn get_frame(&self, number: i64) -> FramecastResult<Arc<Frame>> {
        if !self.open {
            return Err(FramecastError::reader_closed(
                "DummySource asked for a frame while closed",
            ));
        }
        if number < 1 || number > self.info.video_length {
            return Err(FramecastError::out_of_bounds_frame(
                number,
                self.info.video_length,
            ));
        }

        let samples = Frame::samples_per_frame(
            number,
            self.info.fps,
            self.info.sample_rate,
            self.info.channels,
        ) as usize;
        let mut frame = Frame::blank(
            number,
            self.info.width,
            self.info.height,
            self.color,
            samples,
            self.info.channels,
        );
        frame.set_sample_rate(self.info.sample_rate);
        frame.set_channel_layout(self.info.channel_layout);

        if self.info.has_audio {
            // Absolute offset of this frame's first sample in the stream.
            let mut base: i64 = 0;
            for n in 1..number {
                base += i64::from(Frame::samples_per_frame(
                    n,
                    self.info.fps,
                    self.info.sample_rate,
                    self.info.channels,
                ));
            }
            for channel in 0..self.info.channels {
                let plane: Vec<f32> = (0..samples as i64)
                    .map(|i| Self::sample_at(base + i))
                    .collect();
                frame.add_audio(true, channel, 0, &plane, 1.0);
            }
        }

        Ok(Arc::new(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_source_refuses_frames() {
        let src = DummySource::new(SourceInfo::default_profile(8, 8, 10));
        assert!(matches!(
            src.get_frame(1),
            Err(FramecastError::ReaderClosed(_))
        ));
    }

    #[test]
    fn frames_carry_expected_sample_counts() {
        let mut src = DummySource::new(SourceInfo::default_profile(8, 8, 10));
        src.open().unwrap();
        let f = src.get_frame(1).unwrap();
        assert_eq!(f.sample_count(), 1470); // 44100 / 30
        assert_eq!(f.channel_count(), 2);
        assert!(f.has_image());
    }

    #[test]
    fn out_of_range_frame_errors() {
        let mut src = DummySource::new(SourceInfo::default_profile(8, 8, 10));
        src.open().unwrap();
        assert!(matches!(
            src.get_frame(11),
            Err(FramecastError::OutOfBoundsFrame { .. })
        ));
        assert!(src.get_frame(0).is_err());
    }

    #[test]
    fn audio_is_deterministic_and_continuous() {
        let mut src = DummySource::new(SourceInfo::default_profile(8, 8, 10));
        src.open().unwrap();
        let f1 = src.get_frame(1).unwrap();
        let f2 = src.get_frame(2).unwrap();
        // Frame 2's first sample continues where frame 1 ended.
        let last = f1.audio_samples(0)[f1.sample_count() - 1];
        assert_eq!(last, DummySource::sample_at(1469));
        assert_eq!(f2.audio_samples(0)[0], DummySource::sample_at(1470));
    }
}
