//! Transient UI-only fields and the free-form extras bag.
//!
//! The editor decorates entities with display state (`ui_*` keys, the
//! computed `site_effective*` pair). None of it may reach a store: strict
//! runs reject it, lenient runs drop it and list what was dropped.

use indexmap::IndexMap;
use serde_json::Value;

use crate::model::{ExtraValue, Extras};
use crate::raw::{RawGraph, GRAPH_TOP_LEVEL_KEYS};

const UI_PREFIX: &str = "ui_";
const EPHEMERAL_KEYS: &[&str] = &["site_effective", "site_effective_is_fallback"];

/// Whether `key` names display-only state.
pub fn is_transient_key(key: &str) -> bool {
    key.starts_with(UI_PREFIX) || EPHEMERAL_KEYS.contains(&key)
}

fn extras_keys(extras: Option<&Value>) -> impl Iterator<Item = &String> {
    extras
        .and_then(Value::as_object)
        .into_iter()
        .flat_map(|map| map.keys())
}

/// Paths of every transient field in the payload, in document order.
///
/// Unknown top-level keys count as transient: the document shape is closed.
pub fn collect_transient_fields(raw: &RawGraph) -> Vec<String> {
    let mut offenders: Vec<String> = raw
        .other
        .keys()
        .filter(|key| !GRAPH_TOP_LEVEL_KEYS.contains(&key.as_str()))
        .cloned()
        .collect();

    for (idx, node) in raw.nodes.iter().enumerate() {
        collect_entity("nodes", idx, &node.other, node.extras.as_ref(), &mut offenders);
    }
    for (idx, edge) in raw.edges.iter().enumerate() {
        collect_entity("edges", idx, &edge.other, edge.extras.as_ref(), &mut offenders);
    }
    offenders
}

fn collect_entity(
    section: &str,
    idx: usize,
    other: &IndexMap<String, Value>,
    extras: Option<&Value>,
    offenders: &mut Vec<String>,
) {
    for key in other.keys().filter(|k| is_transient_key(k)) {
        offenders.push(format!("{section}[{idx}].{key}"));
    }
    for key in extras_keys(extras).filter(|k| is_transient_key(k)) {
        offenders.push(format!("{section}[{idx}].extras.{key}"));
    }
}

/// Builds the extras bag of one entity.
///
/// Declared `extras` come first, then unrecognised attributes that are
/// neither legacy aliases nor transient. A declared key wins over an
/// attribute of the same name.
pub fn build_extras(
    declared: Option<&Value>,
    other: &IndexMap<String, Value>,
    alias_keys: &[&str],
) -> Extras {
    let mut extras = Extras::new();
    if let Some(Value::Object(map)) = declared {
        for (key, value) in map {
            if !is_transient_key(key) {
                extras.insert(key.clone(), ExtraValue::from_json(value));
            }
        }
    }
    for (key, value) in other {
        if is_transient_key(key) || alias_keys.contains(&key.as_str()) {
            continue;
        }
        extras
            .entry(key.clone())
            .or_insert_with(|| ExtraValue::from_json(value));
    }
    extras
}
