/// An `(x, y)` pair on a curve: `x` is a frame number, `y` is the value.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Coordinate {
    /// Frame number (fractional values allowed; rounded when evaluated).
    pub x: f64,
    /// Property value at `x`.
    pub y: f64,
}

impl Coordinate {
    /// Construct a coordinate.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// How a curve segment approaches a control point from the left.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Interpolation {
    /// Smooth cubic curve shaped by the surrounding handles.
    Bezier,
    /// Uniform steps between the two endpoint values.
    Linear,
    /// Hold the left value, jumping at the final position.
    Constant,
}

/// Whether bezier handles are managed automatically or set by the author.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum HandleType {
    /// Handles are adjusted automatically for smooth curves.
    #[default]
    Auto,
    /// Handles keep whatever values were assigned.
    Manual,
}

/// A curve control point: primary coordinate plus bezier handles.
///
/// Handles are expressed as fractions (0..1) of the enclosing segment's width
/// and height, and only matter for [`Interpolation::Bezier`] segments.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ControlPoint {
    /// Primary coordinate.
    pub co: Coordinate,
    /// Left handle, relative to the segment ending at this point.
    pub handle_left: Coordinate,
    /// Right handle, relative to the segment starting at this point.
    pub handle_right: Coordinate,
    /// Interpolation used for the segment ending at this point.
    pub interpolation: Interpolation,
    /// Handle management mode.
    pub handle_type: HandleType,
}

impl ControlPoint {
    /// Construct a point with explicit interpolation and default handles.
    pub fn new(x: f64, y: f64, interpolation: Interpolation) -> Self {
        Self {
            co: Coordinate::new(x, y),
            handle_left: Coordinate::new(0.5, 1.0),
            handle_right: Coordinate::new(0.5, 0.0),
            interpolation,
            handle_type: HandleType::Auto,
        }
    }

    /// Construct a bezier point (the default interpolation).
    pub fn bezier(x: f64, y: f64) -> Self {
        Self::new(x, y, Interpolation::Bezier)
    }

    /// Construct a linear point.
    pub fn linear(x: f64, y: f64) -> Self {
        Self::new(x, y, Interpolation::Linear)
    }

    /// Construct a constant (hold) point.
    pub fn constant(x: f64, y: f64) -> Self {
        Self::new(x, y, Interpolation::Constant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_handles_match_initialization() {
        let p = ControlPoint::bezier(1.0, 10.0);
        assert_eq!(p.handle_left, Coordinate::new(0.5, 1.0));
        assert_eq!(p.handle_right, Coordinate::new(0.5, 0.0));
        assert_eq!(p.handle_type, HandleType::Auto);
    }
}
