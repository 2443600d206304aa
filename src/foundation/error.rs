/// Convenience result type used across Framecast.
pub type FramecastResult<T> = Result<T, FramecastError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum FramecastError {
    /// A frame number outside the valid `[1, total]` range was requested.
    #[error("frame {requested} is out of bounds (1..={total})")]
    OutOfBoundsFrame {
        /// Requested frame number.
        requested: i64,
        /// Number of frames in the valid range.
        total: i64,
    },

    /// A curve control point outside the valid index range was requested.
    #[error("control point {requested} is out of bounds ({total} points)")]
    OutOfBoundsPoint {
        /// Requested point index (`-1` for coordinate-match lookups).
        requested: i64,
        /// Number of points in the curve.
        total: i64,
    },

    /// A source was asked for a frame while not open.
    #[error("source is closed: {0}")]
    ReaderClosed(String),

    /// A source's internal seek retried past its threshold.
    #[error("too many seeks on source: {0}")]
    TooManySeeks(String),

    /// Malformed snapshot or diff input.
    #[error("invalid structured data: {0}")]
    InvalidJson(String),

    /// Unrecognized key in a diff record or effect registry lookup.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Invalid user-provided configuration or parameter.
    #[error("validation error: {0}")]
    Validation(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramecastError {
    /// Build an [`FramecastError::OutOfBoundsFrame`] value.
    pub fn out_of_bounds_frame(requested: i64, total: i64) -> Self {
        Self::OutOfBoundsFrame { requested, total }
    }

    /// Build an [`FramecastError::OutOfBoundsPoint`] value.
    pub fn out_of_bounds_point(requested: i64, total: i64) -> Self {
        Self::OutOfBoundsPoint { requested, total }
    }

    /// Build an [`FramecastError::ReaderClosed`] value.
    pub fn reader_closed(msg: impl Into<String>) -> Self {
        Self::ReaderClosed(msg.into())
    }

    /// Build an [`FramecastError::InvalidJson`] value.
    pub fn invalid_json(msg: impl Into<String>) -> Self {
        Self::InvalidJson(msg.into())
    }

    /// Build an [`FramecastError::InvalidKey`] value.
    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    /// Build an [`FramecastError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_frame_bounds() {
        let e = FramecastError::out_of_bounds_frame(9, 4);
        assert_eq!(e.to_string(), "frame 9 is out of bounds (1..=4)");
    }

    #[test]
    fn anyhow_bridges_into_other() {
        let e: FramecastError = anyhow::anyhow!("boom").into();
        assert!(matches!(e, FramecastError::Other(_)));
    }
}
