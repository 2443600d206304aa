pub mod base;
pub mod basic;

use std::cmp::Ordering;

use serde_json::Value;

use crate::{
    foundation::error::{FramecastError, FramecastResult},
    frame::Frame,
    structured::Structured,
};

use base::EffectBase;
use basic::{Brightness, Hue, Negate, Saturation};

/// A per-frame image transformation attached to a clip or to the timeline.
///
/// Implementations are stateless between frames; all animation comes from
/// evaluating their curves at the given frame number.
pub trait Effect: Structured + Send + Sync {
    fn base(&self) -> &EffectBase;

    fn base_mut(&mut self) -> &mut EffectBase;

    /// The string tag this effect registers under.
    fn kind(&self) -> &'static str;

    /// Transform the frame's pixels in place.
    fn apply(&self, frame: &mut Frame, frame_number: i64);
}

/// Ordering for effect application: layer, then position, then order
/// descending (higher order applies first).
pub fn effect_order(a: &dyn Effect, b: &dyn Effect) -> Ordering {
    let (a, b) = (a.base(), b.base());
    a.layer
        .cmp(&b.layer)
        .then(a.position.total_cmp(&b.position))
        .then(b.order.cmp(&a.order))
}

/// Construct an effect from its string tag and merge `value` into it.
///
/// This is the registry behind the structured-data `"type"` field; an
/// unknown tag is an [`FramecastError::InvalidKey`].
pub fn create_effect(kind: &str, value: &Value) -> FramecastResult<Box<dyn Effect>> {
    let mut effect: Box<dyn Effect> = match kind {
        "Brightness" => Box::new(Brightness::default()),
        "Saturation" => Box::new(Saturation::default()),
        "Hue" => Box::new(Hue::default()),
        "Negate" => Box::new(Negate::default()),
        other => {
            return Err(FramecastError::invalid_key(format!(
                "unknown effect type '{other}'"
            )));
        }
    };
    effect.load_structured(value)?;
    Ok(effect)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn registry_builds_each_builtin() {
        for kind in ["Brightness", "Saturation", "Hue", "Negate"] {
            let effect = create_effect(kind, &json!({ "id": "e1" })).unwrap();
            assert_eq!(effect.kind(), kind);
            assert_eq!(effect.base().id, "e1");
        }
    }

    #[test]
    fn unknown_kind_is_an_invalid_key() {
        assert!(matches!(
            create_effect("Sharpen", &json!({})),
            Err(FramecastError::InvalidKey(_))
        ));
    }

    #[test]
    fn structured_roundtrip_preserves_kind_and_placement() {
        let effect = create_effect(
            "Saturation",
            &json!({ "id": "s", "layer": 2, "position": 1.0, "saturation": 0.5 }),
        )
        .unwrap();
        let snapshot = effect.to_structured();
        assert_eq!(snapshot["type"], "Saturation");
        let restored = create_effect("Saturation", &snapshot).unwrap();
        assert_eq!(restored.base().layer, 2);
    }

    #[test]
    fn ordering_breaks_ties_by_descending_order() {
        let a = create_effect("Negate", &json!({ "layer": 1, "order": 5 })).unwrap();
        let b = create_effect("Negate", &json!({ "layer": 1, "order": 9 })).unwrap();
        assert_eq!(effect_order(a.as_ref(), b.as_ref()), Ordering::Greater);
    }
}
