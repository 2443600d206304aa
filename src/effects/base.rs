use serde_json::{Value, json};

use crate::{
    foundation::error::FramecastResult,
    structured::{Structured, merge_f64, merge_i32, merge_string},
};

/// Placement shared by every effect: where it sits on the timeline and how
/// it orders against siblings.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EffectBase {
    /// Stable identifier used by the diff protocol to address this effect.
    pub id: String,
    /// Timeline position in seconds.
    pub position: f64,
    /// Layer the effect applies to.
    pub layer: i32,
    /// Trim into the effect, in seconds.
    pub start: f64,
    /// End of the trimmed region, in seconds.
    pub end: f64,
    /// Tie-breaker between effects at the same layer and position; higher
    /// order applies first.
    pub order: i32,
}

impl EffectBase {
    /// Active length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the effect is active at timeline time `t` (seconds).
    pub fn covers(&self, t: f64) -> bool {
        self.position <= t && t <= self.position + self.duration()
    }
}

impl Structured for EffectBase {
    fn to_structured(&self) -> Value {
        json!({
            "id": self.id,
            "position": self.position,
            "layer": self.layer,
            "start": self.start,
            "end": self.end,
            "order": self.order,
        })
    }

    fn load_structured(&mut self, value: &Value) -> FramecastResult<()> {
        merge_string(&mut self.id, value, "id");
        merge_f64(&mut self.position, value, "position");
        merge_i32(&mut self.layer, value, "layer");
        merge_f64(&mut self.start, value, "start");
        merge_f64(&mut self.end, value, "end");
        merge_i32(&mut self.order, value, "order");
        Ok(())
    }
}
