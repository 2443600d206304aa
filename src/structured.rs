//! Structured-data snapshots: every major object can emit a JSON
//! representation of itself and merge one back in.
//!
//! Loading is a partial merge, not a wholesale replace: only the keys present
//! in the incoming value are applied. The diff protocol depends on this to
//! patch single properties of a clip or effect.

use serde_json::{Value, json};

use crate::{
    animation::{
        color::Color,
        curve::Curve,
        point::{ControlPoint, Coordinate, HandleType, Interpolation},
    },
    foundation::error::{FramecastError, FramecastResult},
};

pub trait Structured {
    /// Snapshot this object as structured data.
    fn to_structured(&self) -> Value;

    /// Merge structured data into this object. Keys absent from `value` are
    /// left untouched; malformed input fails without partial application
    /// where the object's invariants require it.
    fn load_structured(&mut self, value: &Value) -> FramecastResult<()>;
}

/// Parse a JSON document, mapping syntax errors to the crate's error type.
pub fn parse_json(text: &str) -> FramecastResult<Value> {
    serde_json::from_str(text).map_err(|e| FramecastError::invalid_json(e.to_string()))
}

pub(crate) fn merge_f64(target: &mut f64, value: &Value, key: &str) {
    if let Some(v) = value.get(key).and_then(Value::as_f64) {
        *target = v;
    }
}

pub(crate) fn merge_i32(target: &mut i32, value: &Value, key: &str) {
    if let Some(v) = value.get(key).and_then(Value::as_i64) {
        *target = v as i32;
    }
}

pub(crate) fn merge_bool(target: &mut bool, value: &Value, key: &str) {
    if let Some(v) = value.get(key).and_then(Value::as_bool) {
        *target = v;
    }
}

pub(crate) fn merge_string(target: &mut String, value: &Value, key: &str) {
    if let Some(v) = value.get(key).and_then(Value::as_str) {
        *target = v.to_owned();
    }
}

fn interpolation_code(i: Interpolation) -> i64 {
    match i {
        Interpolation::Bezier => 0,
        Interpolation::Linear => 1,
        Interpolation::Constant => 2,
    }
}

fn interpolation_from_code(code: i64) -> FramecastResult<Interpolation> {
    match code {
        0 => Ok(Interpolation::Bezier),
        1 => Ok(Interpolation::Linear),
        2 => Ok(Interpolation::Constant),
        other => Err(FramecastError::invalid_json(format!(
            "interpolation code {other} is not 0 (bezier), 1 (linear) or 2 (constant)"
        ))),
    }
}

fn handle_type_code(h: HandleType) -> i64 {
    match h {
        HandleType::Auto => 0,
        HandleType::Manual => 1,
    }
}

fn handle_type_from_code(code: i64) -> FramecastResult<HandleType> {
    match code {
        0 => Ok(HandleType::Auto),
        1 => Ok(HandleType::Manual),
        other => Err(FramecastError::invalid_json(format!(
            "handle type code {other} is not 0 (auto) or 1 (manual)"
        ))),
    }
}

impl Structured for Coordinate {
    fn to_structured(&self) -> Value {
        json!({ "x": self.x, "y": self.y })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        merge_f64(&mut self.x, value, "x");
        merge_f64(&mut self.y, value, "y");
        Ok(())
    }
}

impl Structured for ControlPoint {
    fn to_structured(&self) -> Value {
        json!({
            "co": self.co.to_structured(),
            "handle_left": self.handle_left.to_structured(),
            "handle_right": self.handle_right.to_structured(),
            "interpolation": interpolation_code(self.interpolation),
            "handle_type": handle_type_code(self.handle_type),
        })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        if let Some(co) = value.get("co") {
            self.co.load_structured(co)?;
        }
        if let Some(h) = value.get("handle_left") {
            self.handle_left.load_structured(h)?;
        }
        if let Some(h) = value.get("handle_right") {
            self.handle_right.load_structured(h)?;
        }
        if let Some(code) = value.get("interpolation").and_then(Value::as_i64) {
            self.interpolation = interpolation_from_code(code)?;
        }
        if let Some(code) = value.get("handle_type").and_then(Value::as_i64) {
            self.handle_type = handle_type_from_code(code)?;
        }
        Ok(())
    }
}

impl Structured for Curve {
    fn to_structured(&self) -> Value {
        let points: Vec<Value> = self.points().iter().map(Structured::to_structured).collect();
        json!({ "points": points })
    }

    /// Accepts three shapes: a bare number (replace with a constant curve),
    /// an array of points, or an object with a `points` array.
    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        if let Some(v) = value.as_f64() {
            *self = Curve::constant(v);
            return Ok(());
        }
        let array = if value.is_array() {
            value.as_array()
        } else {
            value.get("points").and_then(Value::as_array)
        };
        let Some(array) = array else {
            return Err(FramecastError::invalid_json(
                "curve value must be a number, an array of points, or {\"points\": [...]}",
            ));
        };
        let mut points = Vec::with_capacity(array.len());
        for entry in array {
            let mut point = ControlPoint::bezier(1.0, 0.0);
            point.load_structured(entry)?;
            points.push(point);
        }
        *self = Curve::from_points(points);
        Ok(())
    }
}

impl Structured for Color {
    fn to_structured(&self) -> Value {
        json!({
            "red": self.red.to_structured(),
            "green": self.green.to_structured(),
            "blue": self.blue.to_structured(),
        })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        if let Some(hex) = value.as_str() {
            *self = Color::from_hex(hex)
                .map_err(|e| FramecastError::invalid_json(e.to_string()))?;
            return Ok(());
        }
        if let Some(red) = value.get("red") {
            self.red.load_structured(red)?;
        }
        if let Some(green) = value.get("green") {
            self.green.load_structured(green)?;
        }
        if let Some(blue) = value.get("blue") {
            self.blue.load_structured(blue)?;
        }
        Ok(())
    }
}
