use crate::foundation::core::{ChannelLayout, Fraction};

/// One video frame plus the audio that plays during it.
///
/// Frames are built up by a source, mapper, or the compositor, then frozen
/// behind an `Arc`; the frame cache holds the only long-lived strong
/// reference and everything else borrows transiently for one pass.
///
/// Pixels are row-major premultiplied RGBA8. Audio is planar `f32` in
/// `[-1, 1]`, one buffer per channel, all channels equal length.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// 1-based frame number.
    pub number: i64,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    image: Option<Vec<u8>>,
    audio: Vec<Vec<f32>>,
    sample_rate: i32,
    channel_layout: ChannelLayout,
}

impl Frame {
    /// A frame with no pixels and no audio.
    pub fn new(number: i64, width: u32, height: u32) -> Self {
        Self {
            number,
            width,
            height,
            image: None,
            audio: Vec::new(),
            sample_rate: 44100,
            channel_layout: ChannelLayout::Stereo,
        }
    }

    /// A solid-color frame carrying `samples` samples of silence per channel.
    pub fn blank(
        number: i64,
        width: u32,
        height: u32,
        rgb: [u8; 3],
        samples: usize,
        channels: i32,
    ) -> Self {
        let mut frame = Self::new(number, width, height);
        frame.fill(rgb);
        frame.audio = vec![Vec::new(); channels.max(0) as usize];
        frame.add_audio_silence(samples);
        frame
    }

    /// The exact number of audio samples belonging to frame `number` at the
    /// given rate.
    ///
    /// Rounded cumulative difference: `round(total through n) - round(total
    /// through n-1)`, with both totals snapped down to a multiple of the
    /// channel count. Not every rate divides evenly into frames, so
    /// neighboring frames may differ by one sample; summed over any span the
    /// counts are conserved exactly.
    pub fn samples_per_frame(number: i64, fps: Fraction, sample_rate: i32, channels: i32) -> i32 {
        let frame_secs = fps.reciprocal().to_f64();
        let channels = f64::from(channels.max(1));

        let mut previous = f64::from(sample_rate) * frame_secs * (number - 1) as f64;
        previous -= previous % channels;
        let mut total = f64::from(sample_rate) * frame_secs * number as f64;
        total -= total % channels;

        ((total - previous).round() as i32).max(0)
    }

    /// Audio sample rate.
    pub fn sample_rate(&self) -> i32 {
        self.sample_rate
    }

    /// Set the audio sample rate.
    pub fn set_sample_rate(&mut self, rate: i32) {
        self.sample_rate = rate;
    }

    /// Audio channel layout.
    pub fn channel_layout(&self) -> ChannelLayout {
        self.channel_layout
    }

    /// Set the audio channel layout.
    pub fn set_channel_layout(&mut self, layout: ChannelLayout) {
        self.channel_layout = layout;
    }

    /// Number of audio channels.
    pub fn channel_count(&self) -> i32 {
        self.audio.len() as i32
    }

    /// Number of audio samples per channel.
    pub fn sample_count(&self) -> usize {
        self.audio.first().map_or(0, Vec::len)
    }

    /// The samples of one channel, empty if the channel does not exist.
    pub fn audio_samples(&self, channel: i32) -> &[f32] {
        self.audio
            .get(channel.max(0) as usize)
            .map_or(&[], Vec::as_slice)
    }

    /// Append `count` samples of silence to every channel (creating a stereo
    /// pair if the frame has no channels yet).
    pub fn add_audio_silence(&mut self, count: usize) {
        if self.audio.is_empty() {
            self.audio = vec![Vec::new(); 2];
        }
        for channel in &mut self.audio {
            channel.resize(channel.len() + count, 0.0);
        }
    }

    /// Copy `samples` into one channel at `start`, growing the channel as
    /// needed. `replace` overwrites; otherwise samples are summed (mixed).
    pub fn add_audio(
        &mut self,
        replace: bool,
        channel: i32,
        start: usize,
        samples: &[f32],
        gain: f32,
    ) {
        let channel = channel.max(0) as usize;
        if channel >= self.audio.len() {
            self.audio.resize(channel + 1, Vec::new());
        }
        let buf = &mut self.audio[channel];
        if buf.len() < start + samples.len() {
            buf.resize(start + samples.len(), 0.0);
        }
        for (i, &s) in samples.iter().enumerate() {
            if replace {
                buf[start + i] = s * gain;
            } else {
                buf[start + i] += s * gain;
            }
        }
    }

    /// Replace the audio planes wholesale (used after resampling).
    pub fn set_audio(&mut self, planes: Vec<Vec<f32>>, sample_rate: i32, layout: ChannelLayout) {
        self.audio = planes;
        self.sample_rate = sample_rate;
        self.channel_layout = layout;
    }

    /// Apply a linear gain ramp across one channel's sample range, for
    /// click-free fades when a gain changes across a frame boundary.
    pub fn apply_gain_ramp(
        &mut self,
        channel: i32,
        start: usize,
        end: usize,
        initial_gain: f32,
        final_gain: f32,
    ) {
        let Some(buf) = self.audio.get_mut(channel.max(0) as usize) else {
            return;
        };
        let end = end.min(buf.len());
        if start >= end {
            return;
        }
        let span = (end - start) as f32;
        for i in start..end {
            let t = (i - start) as f32 / span;
            buf[i] *= initial_gain + (final_gain - initial_gain) * t;
        }
    }

    /// All channels interleaved (`c1 c2 c1 c2 ...`).
    pub fn interleaved_audio(&self) -> Vec<f32> {
        let samples = self.sample_count();
        let channels = self.audio.len();
        let mut out = Vec::with_capacity(samples * channels);
        for i in 0..samples {
            for channel in &self.audio {
                out.push(channel.get(i).copied().unwrap_or(0.0));
            }
        }
        out
    }

    /// Pixel buffer, if any pixels have been assigned.
    pub fn pixels(&self) -> Option<&[u8]> {
        self.image.as_deref()
    }

    /// Whether the frame carries pixels.
    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Assign a premultiplied RGBA8 pixel buffer (`width * height * 4` bytes).
    pub fn set_pixels(&mut self, pixels: Vec<u8>) {
        debug_assert_eq!(pixels.len(), (self.width * self.height * 4) as usize);
        self.image = Some(pixels);
    }

    /// Fill the frame with a solid opaque color.
    pub fn fill(&mut self, rgb: [u8; 3]) {
        let mut pixels = vec![0u8; (self.width * self.height * 4) as usize];
        for px in pixels.chunks_exact_mut(4) {
            px[0] = rgb[0];
            px[1] = rgb[1];
            px[2] = rgb[2];
            px[3] = 255;
        }
        self.image = Some(pixels);
    }

    /// Overwrite this frame's even scanlines (rows 1, 3, 5, ...) with the
    /// matching rows of `other`, pairing two source fields into one frame.
    pub fn merge_even_rows(&mut self, other: &Frame) {
        let Some(src) = other.image.as_deref() else {
            return;
        };
        if other.width != self.width || other.height != self.height {
            return;
        }
        let row = (self.width * 4) as usize;
        let dst = match self.image.as_deref_mut() {
            Some(dst) => dst,
            None => {
                self.image = Some(src.to_vec());
                return;
            }
        };
        for y in (1..self.height as usize).step_by(2) {
            dst[y * row..(y + 1) * row].copy_from_slice(&src[y * row..(y + 1) * row]);
        }
    }

    /// Render this frame's audio as a waveform image in the given tint,
    /// one column per slice of samples, amplitude mapped to column height.
    pub fn waveform_image(&self, width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        let samples = self.sample_count();
        if samples == 0 || width == 0 || height == 0 {
            return pixels;
        }
        let mid = height as usize / 2;
        for x in 0..width as usize {
            let begin = x * samples / width as usize;
            let end = ((x + 1) * samples / width as usize).max(begin + 1).min(samples);
            let mut peak = 0.0f32;
            for channel in &self.audio {
                for &s in &channel[begin..end.min(channel.len())] {
                    peak = peak.max(s.abs());
                }
            }
            let extent = ((peak.min(1.0) * mid as f32) as usize).min(mid);
            for y in mid.saturating_sub(extent)..(mid + extent).min(height as usize) {
                let at = (y * width as usize + x) * 4;
                pixels[at] = rgb[0];
                pixels[at + 1] = rgb[1];
                pixels[at + 2] = rgb[2];
                pixels[at + 3] = 255;
            }
        }
        pixels
    }

    /// Approximate memory footprint, used for cache byte budgeting.
    pub fn bytes(&self) -> usize {
        let image = self.image.as_ref().map_or(0, Vec::len);
        let audio: usize = self.audio.iter().map(|c| c.len() * 4).sum();
        image + audio
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_per_frame_conserves_totals() {
        // 29.97 fps at 44.1kHz does not divide evenly; the rounded
        // cumulative-difference formula must conserve the total anyway.
        let fps = Fraction::new(30000, 1001).unwrap();
        let mut total: i64 = 0;
        for n in 1..=3000 {
            total += i64::from(Frame::samples_per_frame(n, fps, 44100, 2));
        }
        let expected = (44100.0 * fps.reciprocal().to_f64() * 3000.0) as i64;
        assert!((total - expected).abs() <= 2, "total {total} vs {expected}");
    }

    #[test]
    fn samples_per_frame_divisible_by_channels() {
        let fps = Fraction::new(24, 1).unwrap();
        for n in 1..=100 {
            let s = Frame::samples_per_frame(n, fps, 48000, 2);
            assert_eq!(s % 2, 0);
        }
    }

    #[test]
    fn add_audio_mixes_and_replaces() {
        let mut f = Frame::new(1, 0, 0);
        f.add_audio(true, 0, 0, &[0.5, 0.5], 1.0);
        f.add_audio(false, 0, 0, &[0.25, 0.25], 1.0);
        assert_eq!(f.audio_samples(0), &[0.75, 0.75]);
        f.add_audio(true, 0, 0, &[0.1], 2.0);
        assert_eq!(f.audio_samples(0)[0], 0.2);
    }

    #[test]
    fn gain_ramp_is_monotonic() {
        let mut f = Frame::new(1, 0, 0);
        f.add_audio(true, 0, 0, &[1.0; 10], 1.0);
        f.apply_gain_ramp(0, 0, 10, 0.0, 1.0);
        let s = f.audio_samples(0);
        for w in s.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert_eq!(s[0], 0.0);
    }

    #[test]
    fn merge_even_rows_interleaves_fields() {
        let mut odd = Frame::new(1, 2, 4);
        odd.fill([10, 10, 10]);
        let mut even = Frame::new(2, 2, 4);
        even.fill([200, 200, 200]);
        odd.merge_even_rows(&even);
        let px = odd.pixels().unwrap();
        let row = 2 * 4;
        assert_eq!(px[0], 10); // row 0 from odd field
        assert_eq!(px[row], 200); // row 1 from even field
        assert_eq!(px[2 * row], 10);
        assert_eq!(px[3 * row], 200);
    }

    #[test]
    fn blank_frame_bytes_accounts_image_and_audio() {
        let f = Frame::blank(1, 4, 4, [0, 0, 0], 100, 2);
        assert_eq!(f.bytes(), 4 * 4 * 4 + 100 * 2 * 4);
    }
}
