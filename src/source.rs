pub mod dummy;

use std::sync::Arc;

use crate::{
    foundation::core::{ChannelLayout, Fraction},
    foundation::error::FramecastResult,
    frame::Frame,
};

/// Description of a frame source's media stream.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SourceInfo {
    /// Whether the source carries pixels.
    pub has_video: bool,
    /// Whether the source carries audio.
    pub has_audio: bool,
    /// Whether the source is a single still image repeated every frame.
    pub has_single_image: bool,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Frame rate.
    pub fps: Fraction,
    /// Audio sample rate in Hz.
    pub sample_rate: i32,
    /// Audio channel count.
    pub channels: i32,
    /// Audio channel layout.
    pub channel_layout: ChannelLayout,
    /// Total number of frames.
    pub video_length: i64,
    /// Total duration in seconds.
    pub duration: f64,
}

impl SourceInfo {
    /// A 30fps stereo 44.1kHz profile, convenient for tests and defaults.
    pub fn default_profile(width: u32, height: u32, video_length: i64) -> Self {
        let fps = Fraction { num: 30, den: 1 };
        Self {
            has_video: true,
            has_audio: true,
            has_single_image: false,
            width,
            height,
            fps,
            sample_rate: 44100,
            channels: 2,
            channel_layout: ChannelLayout::Stereo,
            video_length,
            duration: video_length as f64 / fps.to_f64(),
        }
    }
}

/// A supplier of raw frames: the narrow interface behind which container and
/// codec concerns live.
///
/// Concrete decoders are swappable implementations of this trait; the mapper
/// and compositor never see anything else. `get_frame` takes `&self` so
/// sources can be shared across worker threads; implementations requiring
/// internal state guard it themselves.
pub trait FrameSource: Send + Sync {
    /// Stream metadata. Stable while the source is open.
    fn info(&self) -> &SourceInfo;

    /// Acquire the underlying media.
    fn open(&mut self) -> FramecastResult<()>;

    /// Release the underlying media.
    fn close(&mut self);

    /// Whether the source is currently open.
    fn is_open(&self) -> bool;

    /// Fetch one frame by 1-based number.
    ///
    /// Fails with [`crate::FramecastError::ReaderClosed`] when not open and
    /// [`crate::FramecastError::OutOfBoundsFrame`] for an invalid number.
    fn get_frame(&self, number: i64) -> FramecastResult<Arc<Frame>>;
}
