use crate::foundation::error::{FramecastError, FramecastResult};

/// A rational number used for frame rates and timebases.
///
/// Frame rates like NTSC 29.97 are only exact as fractions (`30000/1001`), so
/// every rate in the engine is carried as a `Fraction` and converted to float
/// as late as possible.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fraction {
    /// Numerator.
    pub num: i32,
    /// Denominator (must be non-zero).
    pub den: i32,
}

impl Fraction {
    /// Construct a fraction, rejecting a zero denominator.
    pub fn new(num: i32, den: i32) -> FramecastResult<Self> {
        if den == 0 {
            return Err(FramecastError::validation("Fraction den must be non-zero"));
        }
        Ok(Self { num, den })
    }

    /// The fraction as a float.
    pub fn to_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    /// The fraction rounded to the nearest integer.
    pub fn to_int(self) -> i64 {
        self.to_f64().round() as i64
    }

    /// The inverted fraction (`den/num`), e.g. a frame rate's timebase.
    pub fn reciprocal(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /// Reduce to lowest terms.
    pub fn reduce(self) -> Self {
        let g = gcd(self.num.unsigned_abs(), self.den.unsigned_abs()).max(1) as i32;
        Self {
            num: self.num / g,
            den: self.den / g,
        }
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Audio channel layouts understood by the engine.
///
/// Decoding real container layouts is a source concern; the engine only needs
/// the channel count and an identity to compare against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ChannelLayout {
    /// Single channel.
    Mono,
    /// Two channels, left/right.
    Stereo,
    /// Four channels.
    Quad,
    /// Six channels (5.1).
    Surround51,
    /// Eight channels (7.1).
    Surround71,
}

impl ChannelLayout {
    /// Number of channels implied by this layout.
    pub fn channel_count(self) -> i32 {
        match self {
            Self::Mono => 1,
            Self::Stereo => 2,
            Self::Quad => 4,
            Self::Surround51 => 6,
            Self::Surround71 => 8,
        }
    }
}
