use std::sync::{Arc, RwLock};

use kurbo::{CubicBez, ParamCurve, Point};

use crate::{
    animation::point::{ControlPoint, Interpolation},
    foundation::core::Fraction,
    foundation::error::{FramecastError, FramecastResult},
};

/// One evaluated entry of a curve's dense value table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveValue {
    /// Interpolated value at this integer frame.
    pub value: f64,
    /// Whether the curve is increasing here, looked ahead to the next
    /// distinct rounded value.
    pub increasing: bool,
    /// 1-based occurrence count of this rounded value over the length of its
    /// run of identical consecutive rounded values.
    pub repeat: Fraction,
    /// Difference from the prior distinct rounded value.
    pub delta: f64,
}

#[derive(Debug)]
struct ValueTable {
    /// Integer frame number of the first entry.
    origin: i64,
    values: Vec<CurveValue>,
}

/// An animated property: sparse control points evaluated to one value per
/// integer frame.
///
/// Points are kept ordered by `x`; adding a point at an existing `x` replaces
/// it. The dense table is rebuilt lazily on the next read after any point
/// mutation, so reads take `&self` and are safe from worker threads.
///
/// Reads never fail: indices below the curve saturate to the first value and
/// indices beyond the last point saturate to the last value.
pub struct Curve {
    points: Vec<ControlPoint>,
    table: RwLock<Option<Arc<ValueTable>>>,
}

impl Curve {
    /// An empty curve; evaluates to `0.0` everywhere.
    pub fn new() -> Self {
        Self {
            points: Vec::new(),
            table: RwLock::new(None),
        }
    }

    /// A curve holding `value`, anchored at frame 1.
    pub fn constant(value: f64) -> Self {
        let mut curve = Self::new();
        curve.add_point(ControlPoint::bezier(1.0, value));
        curve
    }

    /// Build a curve from points, preserving replace-on-duplicate semantics.
    pub fn from_points(points: impl IntoIterator<Item = ControlPoint>) -> Self {
        let mut curve = Self::new();
        for p in points {
            curve.add_point(p);
        }
        curve
    }

    /// Insert a point ordered by `x`, replacing any point at the same `x`.
    pub fn add_point(&mut self, point: ControlPoint) {
        let at = self.points.partition_point(|p| p.co.x < point.co.x);
        if at < self.points.len() && self.points[at].co.x == point.co.x {
            self.points[at] = point;
        } else {
            self.points.insert(at, point);
        }
        self.invalidate();
    }

    /// Insert a bezier point at `(x, y)`.
    pub fn add_point_xy(&mut self, x: f64, y: f64) {
        self.add_point(ControlPoint::bezier(x, y));
    }

    /// Remove the point at `index`.
    pub fn remove_point_at(&mut self, index: usize) -> FramecastResult<()> {
        if index >= self.points.len() {
            return Err(FramecastError::out_of_bounds_point(
                index as i64,
                self.points.len() as i64,
            ));
        }
        self.points.remove(index);
        self.invalidate();
        Ok(())
    }

    /// Remove the point whose coordinate matches `point` exactly.
    pub fn remove_point(&mut self, point: &ControlPoint) -> FramecastResult<()> {
        let index = self.find_index(point)?;
        self.points.remove(index);
        self.invalidate();
        Ok(())
    }

    /// Replace the point at `index` with `point` (re-sorted by its `x`).
    pub fn update_point(&mut self, index: usize, point: ControlPoint) -> FramecastResult<()> {
        self.remove_point_at(index)?;
        self.add_point(point);
        Ok(())
    }

    /// The point at `index`.
    pub fn point(&self, index: usize) -> FramecastResult<&ControlPoint> {
        self.points.get(index).ok_or_else(|| {
            FramecastError::out_of_bounds_point(index as i64, self.points.len() as i64)
        })
    }

    /// Index of the point matching `point`'s coordinate exactly.
    pub fn find_index(&self, point: &ControlPoint) -> FramecastResult<usize> {
        self.points
            .iter()
            .position(|p| p.co.x == point.co.x && p.co.y == point.co.y)
            .ok_or_else(|| FramecastError::out_of_bounds_point(-1, self.points.len() as i64))
    }

    /// Whether any point sits at the given `x`.
    pub fn contains(&self, x: f64) -> bool {
        self.points.iter().any(|p| p.co.x == x)
    }

    /// The nearest control point at or to the right of `x`, falling back to
    /// the last point when `x` is past the end of the curve. Editors use this
    /// to snap a playhead position onto an existing point.
    pub fn closest_point(&self, x: f64) -> Option<&ControlPoint> {
        let at = self.points.partition_point(|p| p.co.x < x);
        self.points.get(at).or_else(|| self.points.last())
    }

    /// The point with the largest `y` value (last wins on ties).
    pub fn max_point(&self) -> Option<&ControlPoint> {
        let mut max: Option<&ControlPoint> = None;
        for p in &self.points {
            if max.is_none_or(|m| p.co.y >= m.co.y) {
                max = Some(p);
            }
        }
        max
    }

    /// All points, ordered by `x`.
    pub fn points(&self) -> &[ControlPoint] {
        &self.points
    }

    /// Number of control points.
    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Number of evaluable integer frames: the last point's rounded `x` + 1.
    pub fn len(&self) -> i64 {
        match self.points.len() {
            0 => 0,
            1 => 1,
            _ => self.points[self.points.len() - 1].co.x.round() as i64 + 1,
        }
    }

    /// Whether the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// The value at integer frame `index`, saturating at both ends.
    pub fn value(&self, index: i64) -> f64 {
        match self.entry(index) {
            Some(v) => v.value,
            None => 0.0,
        }
    }

    /// [`Curve::value`] rounded to the nearest `i32`.
    pub fn value_as_int(&self, index: i64) -> i32 {
        self.value(index).round() as i32
    }

    /// [`Curve::value`] rounded to the nearest `i64`.
    pub fn value_as_long(&self, index: i64) -> i64 {
        self.value(index).round() as i64
    }

    /// Whether the curve is increasing at `index` (saturating read).
    pub fn is_increasing(&self, index: i64) -> bool {
        self.entry(index).is_none_or(|v| v.increasing)
    }

    /// The run-length fraction of the rounded value at `index`.
    pub fn repeat_fraction(&self, index: i64) -> Fraction {
        match self.entry(index) {
            Some(v) => v.repeat,
            None => Fraction { num: 1, den: 1 },
        }
    }

    /// The change from the prior distinct rounded value at `index`.
    pub fn delta(&self, index: i64) -> f64 {
        self.entry(index).map_or(0.0, |v| v.delta)
    }

    /// Multiply every point's `x` (except the first) by `scale`, rounding.
    pub fn scale_points(&mut self, scale: f64) {
        for p in self.points.iter_mut().skip(1) {
            p.co.x = (p.co.x * scale).round();
        }
        self.invalidate();
    }

    /// Reverse the curve in time by swapping `y` values end-for-end.
    pub fn flip_points(&mut self) {
        let n = self.points.len();
        for i in 0..n / 2 {
            let (a, b) = (self.points[i].co.y, self.points[n - 1 - i].co.y);
            self.points[i].co.y = b;
            self.points[n - 1 - i].co.y = a;
        }
        self.invalidate();
    }

    fn invalidate(&mut self) {
        *self.table.write().expect("curve table lock poisoned") = None;
    }

    fn entry(&self, index: i64) -> Option<CurveValue> {
        let table = self.table_arc();
        if table.values.is_empty() {
            return None;
        }
        let i = (index - table.origin).clamp(0, table.values.len() as i64 - 1) as usize;
        Some(table.values[i])
    }

    fn table_arc(&self) -> Arc<ValueTable> {
        if let Some(t) = self.table.read().expect("curve table lock poisoned").as_ref() {
            return Arc::clone(t);
        }
        let mut guard = self.table.write().expect("curve table lock poisoned");
        // Another thread may have rebuilt it while we waited for the lock.
        if let Some(t) = guard.as_ref() {
            return Arc::clone(t);
        }
        let table = Arc::new(process(&self.points));
        *guard = Some(Arc::clone(&table));
        table
    }
}

impl Default for Curve {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Curve {
    fn clone(&self) -> Self {
        Self {
            points: self.points.clone(),
            table: RwLock::new(None),
        }
    }
}

impl PartialEq for Curve {
    fn eq(&self, other: &Self) -> bool {
        self.points == other.points
    }
}

impl std::fmt::Debug for Curve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Curve").field("points", &self.points).finish()
    }
}

impl serde::Serialize for Curve {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.points.serialize(serializer)
    }
}

impl<'de> serde::Deserialize<'de> for Curve {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_points(Vec::<ControlPoint>::deserialize(
            deserializer,
        )?))
    }
}

/// Rebuild the dense table by walking consecutive point pairs.
fn process(points: &[ControlPoint]) -> ValueTable {
    let mut values = Vec::<f64>::new();
    let origin = match points.first() {
        Some(p) => p.co.x.round() as i64,
        None => 0,
    };

    match points.len() {
        0 => {}
        1 => values.push(points[0].co.y),
        _ => {
            for (segment, pair) in points.windows(2).enumerate() {
                let (left, right) = (&pair[0], &pair[1]);
                let first = segment == 0;
                // The right point's interpolation governs the segment.
                match right.interpolation {
                    Interpolation::Linear => process_linear(left, right, first, &mut values),
                    Interpolation::Constant => process_constant(left, right, first, &mut values),
                    Interpolation::Bezier => process_bezier(left, right, first, &mut values),
                }
            }
        }
    }

    ValueTable {
        origin,
        values: annotate(&values),
    }
}

fn segment_steps(left: &ControlPoint, right: &ControlPoint) -> i64 {
    (right.co.x.round() as i64 - left.co.x.round() as i64).max(0)
}

fn process_linear(left: &ControlPoint, right: &ControlPoint, first: bool, out: &mut Vec<f64>) {
    let steps = segment_steps(left, right);
    if first {
        out.push(left.co.y);
    }
    if steps == 0 {
        return;
    }
    let increment = (right.co.y - left.co.y) / steps as f64;
    for s in 1..=steps {
        let y = if s == steps {
            right.co.y
        } else {
            left.co.y + increment * s as f64
        };
        out.push(y);
    }
}

fn process_constant(left: &ControlPoint, right: &ControlPoint, first: bool, out: &mut Vec<f64>) {
    let steps = segment_steps(left, right);
    if first {
        out.push(left.co.y);
    }
    for s in 1..=steps {
        out.push(if s == steps { right.co.y } else { left.co.y });
    }
}

fn process_bezier(left: &ControlPoint, right: &ControlPoint, first: bool, out: &mut Vec<f64>) {
    let steps = segment_steps(left, right);
    if first {
        out.push(left.co.y);
    }
    if steps == 0 {
        return;
    }

    let x_diff = right.co.x - left.co.x;
    let y_diff = right.co.y - left.co.y;
    let p0 = Point::new(left.co.x, left.co.y);
    let bez = CubicBez::new(
        p0,
        Point::new(
            p0.x + left.handle_right.x * x_diff,
            p0.y + left.handle_right.y * y_diff,
        ),
        Point::new(
            p0.x + right.handle_left.x * x_diff,
            p0.y + right.handle_left.y * y_diff,
        ),
        Point::new(right.co.x, right.co.y),
    );

    let start_x = left.co.x.round() as i64;
    let end_x = right.co.x.round() as i64;
    // 4x oversampling; intermediate integer frames take the first sample that
    // reaches them and later samples rounding to the same frame are held.
    let oversample = steps * 4;
    let mut next_x = start_x + 1;
    for i in 0..=oversample {
        let t = i as f64 / oversample as f64;
        let p = bez.eval(t);
        let reached = p.x.round() as i64;
        while next_x <= reached.min(end_x - 1) {
            out.push(p.y);
            next_x += 1;
        }
    }
    // The endpoint is always emitted exactly, never a resampled neighbor.
    while next_x <= end_x {
        out.push(right.co.y);
        next_x += 1;
    }
}

/// Second pass: per-value lookahead direction, repeat fraction, and delta
/// over the rounded values.
fn annotate(raw: &[f64]) -> Vec<CurveValue> {
    let rounded: Vec<i64> = raw.iter().map(|v| v.round() as i64).collect();
    let mut out = Vec::with_capacity(raw.len());

    let mut previous_dir = true;
    let mut run_start = 0usize;
    for (i, &value) in raw.iter().enumerate() {
        let mut increasing = previous_dir;
        for &next in &rounded[i + 1..] {
            if next != rounded[i] {
                increasing = next > rounded[i];
                break;
            }
        }
        previous_dir = increasing;

        if i > 0 && rounded[i] != rounded[i - 1] {
            run_start = i;
        }
        let run_len = rounded[run_start..]
            .iter()
            .take_while(|&&v| v == rounded[i])
            .count();
        let repeat = Fraction {
            num: (i - run_start + 1) as i32,
            den: run_len as i32,
        };

        let delta = if i == 0 {
            value
        } else {
            (rounded[i] - rounded[i - 1]) as f64
        };

        out.push(CurveValue {
            value,
            increasing,
            repeat,
            delta,
        });
    }
    out
}
