//! The structured diff protocol: ordered batches of insert/update/delete
//! records addressed by key paths, validated as a whole before anything is
//! applied.

use std::collections::{HashMap, HashSet};

use serde_json::{Value, json};

use crate::{
    animation::{color::Color, curve::Curve},
    effects::{create_effect, effect_order},
    foundation::core::ChannelLayout,
    foundation::error::{FramecastError, FramecastResult},
    source::{SourceInfo, dummy::DummySource},
    structured::Structured,
};

use super::{Timeline, clip::Clip};

static NULL: Value = Value::Null;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Op {
    Insert,
    Update,
    Delete,
}

struct Record<'a> {
    op: Op,
    key: &'a [Value],
    value: Option<&'a Value>,
}

/// Timeline properties addressable by a one-element key path.
const TIMELINE_KEYS: &[&str] = &[
    "width",
    "height",
    "fps",
    "sample_rate",
    "channels",
    "channel_layout",
    "duration",
    "color",
    "viewport_scale",
    "viewport_x",
    "viewport_y",
];

/// Properties whose deletion resets them to a default; everything else
/// cannot be deleted.
const RESETTABLE_KEYS: &[&str] = &["color", "viewport_scale", "viewport_x", "viewport_y"];

/// Apply a diff batch to the timeline. The whole batch is validated first;
/// any bad record fails the call with the timeline untouched.
pub(super) fn apply(timeline: &mut Timeline, records: &Value) -> FramecastResult<()> {
    let list = records
        .as_array()
        .ok_or_else(|| FramecastError::invalid_json("a diff must be a JSON array of records"))?;
    let parsed = list
        .iter()
        .map(parse_record)
        .collect::<FramecastResult<Vec<_>>>()?;

    validate(timeline, &parsed)?;
    for record in &parsed {
        apply_record(timeline, record)?;
    }

    timeline.sort_clips();
    timeline.retarget_clips();
    Ok(())
}

fn parse_record(value: &Value) -> FramecastResult<Record<'_>> {
    let op = match value.get("type").and_then(Value::as_str) {
        Some("insert") => Op::Insert,
        Some("update") => Op::Update,
        Some("delete") => Op::Delete,
        Some(other) => {
            return Err(FramecastError::invalid_json(format!(
                "unknown diff record type '{other}'"
            )));
        }
        None => {
            return Err(FramecastError::invalid_json(
                "diff record is missing a \"type\"",
            ));
        }
    };
    let key = value
        .get("key")
        .and_then(Value::as_array)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| {
            FramecastError::invalid_json("diff record needs a non-empty \"key\" array")
        })?;
    let value = value.get("value");
    if value.is_none() && op != Op::Delete {
        return Err(FramecastError::invalid_json(
            "insert and update records need a \"value\"",
        ));
    }
    Ok(Record {
        op,
        key: key.as_slice(),
        value,
    })
}

fn id_selector(value: &Value) -> FramecastResult<&str> {
    value
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| FramecastError::invalid_key("diff key selector needs an \"id\""))
}

/// Dry-run the batch against a simulation of the object graph, so a record
/// may reference items inserted earlier in the same batch. Insert and update
/// values are dry-loaded here too; application must not be the first place a
/// value gets parsed, or an earlier record would already have landed.
fn validate(timeline: &Timeline, records: &[Record<'_>]) -> FramecastResult<()> {
    let mut clip_ids: HashSet<String> = timeline.clips.iter().map(|c| c.id.clone()).collect();
    let mut effect_kinds: HashMap<String, String> = timeline
        .effects
        .iter()
        .map(|e| (e.base().id.clone(), e.kind().to_owned()))
        .collect();
    let mut clip_effect_kinds: HashMap<String, HashMap<String, String>> = timeline
        .clips
        .iter()
        .map(|c| {
            (
                c.id.clone(),
                c.effects()
                    .iter()
                    .map(|e| (e.base().id.clone(), e.kind().to_owned()))
                    .collect(),
            )
        })
        .collect();

    for record in records {
        let root = record.key[0].as_str().ok_or_else(|| {
            FramecastError::invalid_key("diff key path must start with a string")
        })?;
        match (root, record.key.len()) {
            ("clips", 1) => {
                require(record.op == Op::Insert, "\"clips\" alone only accepts inserts")?;
                let value = record.value.unwrap_or(&NULL);
                let id = id_selector(value)?;
                check_clip_value(timeline, value)?;
                clip_ids.insert(id.to_owned());
                clip_effect_kinds.insert(id.to_owned(), HashMap::new());
            }
            ("clips", 2) => {
                require(record.op != Op::Insert, "inserting at an existing clip key")?;
                let id = id_selector(&record.key[1])?;
                require_known(&clip_ids, id, "clip")?;
                match record.op {
                    Op::Update => check_clip_value(timeline, record.value.unwrap_or(&NULL))?,
                    Op::Delete => {
                        clip_ids.remove(id);
                        clip_effect_kinds.remove(id);
                    }
                    Op::Insert => {}
                }
            }
            ("clips", 3) => {
                require(
                    record.key[2].as_str() == Some("effects"),
                    "only \"effects\" nests under a clip",
                )?;
                require(record.op == Op::Insert, "a clip's \"effects\" only accepts inserts")?;
                let clip_id = id_selector(&record.key[1])?;
                require_known(&clip_ids, clip_id, "clip")?;
                let value = record.value.unwrap_or(&NULL);
                let kind = check_effect_value(value)?;
                let effect_id = id_selector(value)?;
                clip_effect_kinds
                    .entry(clip_id.to_owned())
                    .or_default()
                    .insert(effect_id.to_owned(), kind.to_owned());
            }
            ("clips", 4) => {
                require(
                    record.key[2].as_str() == Some("effects"),
                    "only \"effects\" nests under a clip",
                )?;
                require(record.op != Op::Insert, "inserting at an existing effect key")?;
                let clip_id = id_selector(&record.key[1])?;
                require_known(&clip_ids, clip_id, "clip")?;
                let effect_id = id_selector(&record.key[3])?;
                let known = clip_effect_kinds.entry(clip_id.to_owned()).or_default();
                match record.op {
                    Op::Update => {
                        let kind = known_kind(known, effect_id)?;
                        create_effect(kind, record.value.unwrap_or(&NULL)).map(drop)?;
                    }
                    Op::Delete => {
                        known_kind(known, effect_id)?;
                        known.remove(effect_id);
                    }
                    Op::Insert => {}
                }
            }
            ("effects", 1) => {
                require(record.op == Op::Insert, "\"effects\" alone only accepts inserts")?;
                let value = record.value.unwrap_or(&NULL);
                let kind = check_effect_value(value)?;
                effect_kinds.insert(id_selector(value)?.to_owned(), kind.to_owned());
            }
            ("effects", 2) => {
                require(record.op != Op::Insert, "inserting at an existing effect key")?;
                let id = id_selector(&record.key[1])?;
                match record.op {
                    Op::Update => {
                        let kind = known_kind(&effect_kinds, id)?;
                        create_effect(kind, record.value.unwrap_or(&NULL)).map(drop)?;
                    }
                    Op::Delete => {
                        known_kind(&effect_kinds, id)?;
                        effect_kinds.remove(id);
                    }
                    Op::Insert => {}
                }
            }
            (prop, 1) if TIMELINE_KEYS.contains(&prop) => match record.op {
                Op::Insert => {
                    return Err(FramecastError::invalid_key(format!(
                        "timeline property '{prop}' cannot be inserted"
                    )));
                }
                Op::Delete => {
                    require(
                        RESETTABLE_KEYS.contains(&prop),
                        "this timeline property cannot be deleted",
                    )?;
                }
                Op::Update => check_timeline_value(prop, record.value.unwrap_or(&NULL))?,
            },
            (other, _) => {
                return Err(FramecastError::invalid_key(format!(
                    "unknown diff key path starting at '{other}'"
                )));
            }
        }
    }
    Ok(())
}

fn require(condition: bool, message: &str) -> FramecastResult<()> {
    if condition {
        Ok(())
    } else {
        Err(FramecastError::invalid_key(message))
    }
}

fn require_known(ids: &HashSet<String>, id: &str, what: &str) -> FramecastResult<()> {
    if ids.contains(id) {
        Ok(())
    } else {
        Err(FramecastError::invalid_key(format!(
            "diff references unknown {what} '{id}'"
        )))
    }
}

fn known_kind<'a>(kinds: &'a HashMap<String, String>, id: &str) -> FramecastResult<&'a str> {
    kinds.get(id).map(String::as_str).ok_or_else(|| {
        FramecastError::invalid_key(format!("diff references unknown effect '{id}'"))
    })
}

/// Prove a clip value loads cleanly without touching the timeline.
fn check_clip_value(timeline: &Timeline, value: &Value) -> FramecastResult<()> {
    let mut draft = new_clip(timeline);
    draft.load_structured(value)
}

/// Prove an effect value builds cleanly; returns its kind tag.
fn check_effect_value(value: &Value) -> FramecastResult<&str> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| FramecastError::invalid_json("effect value needs a \"type\" tag"))?;
    create_effect(kind, value)?;
    Ok(kind)
}

/// Prove a timeline property value parses. Plain numeric properties merge
/// leniently and cannot fail; the parsed ones get a scratch load.
fn check_timeline_value(prop: &str, value: &Value) -> FramecastResult<()> {
    match prop {
        "fps" => super::parse_fps(value).map(drop),
        "channel_layout" => serde_json::from_value::<ChannelLayout>(value.clone())
            .map(drop)
            .map_err(|e| FramecastError::invalid_json(e.to_string())),
        "color" => Color::default().load_structured(value),
        "viewport_scale" | "viewport_x" | "viewport_y" => Curve::new().load_structured(value),
        _ => Ok(()),
    }
}

fn new_clip(timeline: &Timeline) -> Clip {
    Clip::new(Box::new(DummySource::new(SourceInfo::default_profile(
        timeline.info.width,
        timeline.info.height,
        1,
    ))))
}

fn apply_record(timeline: &mut Timeline, record: &Record<'_>) -> FramecastResult<()> {
    let root = record.key[0].as_str().unwrap_or_default();
    match (root, record.key.len()) {
        ("clips", 1) => {
            let mut clip = new_clip(timeline);
            clip.load_structured(record.value.unwrap_or(&NULL))?;
            timeline.clips.push(clip);
        }
        ("clips", 2) => {
            let id = id_selector(&record.key[1])?.to_owned();
            match record.op {
                Op::Delete => timeline.clips.retain(|c| c.id != id),
                _ => {
                    if let Some(clip) = timeline.clips.iter_mut().find(|c| c.id == id) {
                        clip.load_structured(record.value.unwrap_or(&NULL))?;
                    }
                }
            }
        }
        ("clips", 3 | 4) => {
            let clip_id = id_selector(&record.key[1])?.to_owned();
            let Some(clip) = timeline.clips.iter_mut().find(|c| c.id == clip_id) else {
                return Ok(());
            };
            match record.op {
                Op::Insert => {
                    let value = record.value.unwrap_or(&NULL);
                    let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
                    clip.add_effect(create_effect(kind, value)?);
                }
                Op::Update => {
                    let id = id_selector(&record.key[3])?;
                    if let Some(effect) = clip.effect_mut(id) {
                        effect.load_structured(record.value.unwrap_or(&NULL))?;
                    }
                }
                Op::Delete => {
                    let id = id_selector(&record.key[3])?;
                    clip.remove_effect(id);
                }
            }
        }
        ("effects", 1) => {
            let value = record.value.unwrap_or(&NULL);
            let kind = value.get("type").and_then(Value::as_str).unwrap_or_default();
            timeline.effects.push(create_effect(kind, value)?);
            timeline
                .effects
                .sort_by(|a, b| effect_order(a.as_ref(), b.as_ref()));
        }
        ("effects", 2) => {
            let id = id_selector(&record.key[1])?.to_owned();
            match record.op {
                Op::Delete => timeline.effects.retain(|e| e.base().id != id),
                _ => {
                    if let Some(effect) = timeline.effects.iter_mut().find(|e| e.base().id == id) {
                        effect.load_structured(record.value.unwrap_or(&NULL))?;
                    }
                }
            }
        }
        (prop, 1) => match record.op {
            Op::Delete => reset_property(timeline, prop),
            _ => {
                let value = record.value.unwrap_or(&NULL);
                timeline.load_structured(&json!({ prop: value }))?;
            }
        },
        _ => {}
    }
    Ok(())
}

fn reset_property(timeline: &mut Timeline, prop: &str) {
    match prop {
        "color" => timeline.color = Color::default(),
        "viewport_scale" => timeline.viewport_scale = Curve::constant(100.0),
        "viewport_x" => timeline.viewport_x = Curve::constant(0.0),
        "viewport_y" => timeline.viewport_y = Curve::constant(0.0),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::core::{ChannelLayout, Fraction};
    use crate::timeline::TimelineSettings;

    fn timeline() -> Timeline {
        Timeline::new(
            64,
            48,
            Fraction { num: 30, den: 1 },
            44100,
            2,
            ChannelLayout::Stereo,
            TimelineSettings::default(),
        )
    }

    fn clip_value(id: &str) -> Value {
        json!({
            "id": id,
            "position": 0.0,
            "layer": 1,
            "end": 1.0,
            "reader": SourceInfo::default_profile(64, 48, 30),
        })
    }

    #[test]
    fn insert_then_update_then_delete_a_clip() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
        ]))
        .unwrap();
        assert_eq!(t.clips().len(), 1);

        t.apply_diff(&json!([
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "position": 3.5 } },
        ]))
        .unwrap();
        assert_eq!(t.clip("c1").unwrap().position(), 3.5);

        t.apply_diff(&json!([
            { "type": "delete", "key": ["clips", { "id": "c1" }] },
        ]))
        .unwrap();
        assert!(t.clips().is_empty());
    }

    #[test]
    fn batch_may_reference_its_own_inserts() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "layer": 7 } },
        ]))
        .unwrap();
        assert_eq!(t.clip("c1").unwrap().layer(), 7);
    }

    #[test]
    fn bad_record_fails_the_whole_batch() {
        let mut t = timeline();
        let err = t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
            { "type": "update", "key": ["clips", { "id": "ghost" }], "value": { "layer": 1 } },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidKey(_))));
        // The valid insert before the bad record must not have landed.
        assert!(t.clips().is_empty());
    }

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let mut t = timeline();
        let err = t.apply_diff(&json!([
            { "type": "update", "key": ["sprockets"], "value": 3 },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidKey(_))));
    }

    #[test]
    fn nested_effect_lifecycle() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
            {
                "type": "insert",
                "key": ["clips", { "id": "c1" }, "effects"],
                "value": { "type": "Saturation", "id": "s1", "saturation": 0.2 },
            },
        ]))
        .unwrap();
        assert_eq!(t.clip("c1").unwrap().effects().len(), 1);

        t.apply_diff(&json!([
            {
                "type": "update",
                "key": ["clips", { "id": "c1" }, "effects", { "id": "s1" }],
                "value": { "layer": 4 },
            },
        ]))
        .unwrap();
        assert_eq!(t.clip("c1").unwrap().effects()[0].base().layer, 4);

        t.apply_diff(&json!([
            {
                "type": "delete",
                "key": ["clips", { "id": "c1" }, "effects", { "id": "s1" }],
            },
        ]))
        .unwrap();
        assert!(t.clip("c1").unwrap().effects().is_empty());
    }

    #[test]
    fn timeline_property_update_and_reset() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "update", "key": ["color"], "value": "#ff0000" },
        ]))
        .unwrap();
        assert_eq!(t.color.at(1), [255, 0, 0]);

        t.apply_diff(&json!([
            { "type": "delete", "key": ["color"] },
        ]))
        .unwrap();
        assert_eq!(t.color.at(1), [0, 0, 0]);
    }

    #[test]
    fn profile_properties_cannot_be_deleted() {
        let mut t = timeline();
        let err = t.apply_diff(&json!([
            { "type": "delete", "key": ["width"] },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidKey(_))));
    }

    #[test]
    fn updates_are_idempotent() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
        ]))
        .unwrap();
        let batch = json!([
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "position": 2.0 } },
        ]);
        t.apply_diff(&batch).unwrap();
        let once = t.to_structured();
        t.apply_diff(&batch).unwrap();
        assert_eq!(t.to_structured(), once);
    }

    #[test]
    fn diff_invalidates_cached_frames() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
        ]))
        .unwrap();
        let _ = t.get_frame(1).unwrap();
        assert!(t.cache().count() > 0);
        t.apply_diff(&json!([
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "layer": 2 } },
        ]))
        .unwrap();
        assert_eq!(t.cache().count(), 0);
    }

    #[test]
    fn malformed_clip_update_leaves_batch_unapplied() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
        ]))
        .unwrap();
        let before = t.to_structured();
        let err = t.apply_diff(&json!([
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "position": 7.5 } },
            { "type": "update", "key": ["clips", { "id": "c1" }], "value": { "gravity": "Sideways" } },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidJson(_))));
        // The good first record must not have landed either.
        assert_eq!(t.to_structured(), before);
        assert_eq!(t.clip("c1").unwrap().position(), 0.0);
    }

    #[test]
    fn malformed_property_update_leaves_batch_unapplied() {
        let mut t = timeline();
        let err = t.apply_diff(&json!([
            { "type": "update", "key": ["width"], "value": 32 },
            { "type": "update", "key": ["fps"], "value": "not an fps" },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidJson(_))));
        assert_eq!(t.info().width, 64);
    }

    #[test]
    fn malformed_effect_update_leaves_batch_unapplied() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["clips"], "value": clip_value("c1") },
            {
                "type": "insert",
                "key": ["clips", { "id": "c1" }, "effects"],
                "value": { "type": "Saturation", "id": "s1", "saturation": 1.0 },
            },
        ]))
        .unwrap();
        let before = t.to_structured();
        let err = t.apply_diff(&json!([
            {
                "type": "update",
                "key": ["clips", { "id": "c1" }, "effects", { "id": "s1" }],
                "value": { "layer": 9 },
            },
            {
                "type": "update",
                "key": ["clips", { "id": "c1" }, "effects", { "id": "s1" }],
                "value": { "saturation": "vivid" },
            },
        ]));
        assert!(matches!(err, Err(FramecastError::InvalidJson(_))));
        assert_eq!(t.to_structured(), before);
    }

    #[test]
    fn update_may_follow_insert_of_a_timeline_effect() {
        let mut t = timeline();
        t.apply_diff(&json!([
            { "type": "insert", "key": ["effects"], "value": { "type": "Negate", "id": "n1" } },
            { "type": "update", "key": ["effects", { "id": "n1" }], "value": { "layer": 3 } },
        ]))
        .unwrap();
        assert_eq!(t.effects()[0].base().layer, 3);
    }
}
