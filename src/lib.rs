#![forbid(unsafe_code)]

pub mod animation;
pub mod cache;
pub mod effects;
pub mod foundation;
pub mod frame;
pub mod mapper;
pub mod source;
pub mod structured;
pub mod timeline;

pub use animation::color::Color;
pub use animation::curve::Curve;
pub use animation::point::{ControlPoint, Coordinate, HandleType, Interpolation};
pub use cache::CacheMemory;
pub use effects::{Effect, create_effect};
pub use foundation::core::{ChannelLayout, Fraction};
pub use foundation::error::{FramecastError, FramecastResult};
pub use frame::Frame;
pub use mapper::{FrameMapper, Pulldown};
pub use source::{FrameSource, SourceInfo};
pub use structured::Structured;
pub use timeline::clip::{Anchor, Clip, Gravity, ScaleMode};
pub use timeline::{Timeline, TimelineSettings};
