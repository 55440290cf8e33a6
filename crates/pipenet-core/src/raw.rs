//! Loosely-typed input shapes, as submitted by clients or read from a store.
//!
//! Every field is kept as a raw JSON value so the sanitizer can coerce it
//! with a precise error, and every unrecognised key lands in `other`. Legacy
//! spellings (`pm_offset_m`, `pipe_group_id`, `source`, ...) are looked up in
//! `other` by the accessor methods; the canonical field always wins when both
//! are present.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Top-level keys a graph document may carry.
pub const GRAPH_TOP_LEVEL_KEYS: &[&str] = &[
    "version",
    "site_id",
    "generated_at",
    "style_meta",
    "crs",
    "branches",
    "nodes",
    "edges",
];

/// Legacy node keys consumed by the accessors (never folded into extras).
pub const NODE_ALIAS_KEYS: &[&str] = &[
    "pm_collector_edge_id",
    "pm_offset_m",
    "well_pos_index",
    "pm_pos_index",
    "lat",
    "lon",
];

/// Legacy edge keys consumed by the accessors (never folded into extras).
pub const EDGE_ALIAS_KEYS: &[&str] = &[
    "pipe_group_id",
    "PipeGroupId",
    "BranchId",
    "longueur_m",
    "materiau",
    "sdr_ouvrage",
    "createdAt",
    "source",
    "target",
];

/// A graph document before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_meta: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<Value>,
    /// Either a list of `{id, name}` objects or an `id -> name` map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branches: Option<Value>,
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default)]
    pub edges: Vec<RawEdge>,
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

/// A node before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub node_type: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter_mm: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lat: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_lon: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gps_locked: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_edge_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset_m: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pos_index: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

/// An edge before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawEdge {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diameter_mm: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_m: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sdr: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slope_pct: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commentaire: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
    #[serde(flatten)]
    pub other: IndexMap<String, Value>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// The canonical value when present, else the first present alias.
fn with_aliases<'a>(
    canonical: Option<&'a Value>,
    other: &'a IndexMap<String, Value>,
    aliases: &[&str],
) -> Option<&'a Value> {
    canonical.filter(|v| !is_blank(v)).or_else(|| {
        aliases
            .iter()
            .find_map(|key| other.get(*key).filter(|v| !is_blank(v)))
    })
}

impl RawNode {
    pub fn gps_lat(&self) -> Option<&Value> {
        with_aliases(self.gps_lat.as_ref(), &self.other, &["lat"])
    }

    pub fn gps_lon(&self) -> Option<&Value> {
        with_aliases(self.gps_lon.as_ref(), &self.other, &["lon"])
    }

    pub fn attach_edge_id(&self) -> Option<&Value> {
        with_aliases(self.attach_edge_id.as_ref(), &self.other, &["pm_collector_edge_id"])
    }

    pub fn offset_m(&self) -> Option<&Value> {
        with_aliases(self.offset_m.as_ref(), &self.other, &["pm_offset_m"])
    }

    /// Rank along the collector: `pos_index`, `well_pos_index` or `pm_pos_index`.
    pub fn pos_index(&self) -> Option<&Value> {
        with_aliases(
            self.pos_index.as_ref(),
            &self.other,
            &["well_pos_index", "pm_pos_index"],
        )
    }
}

impl RawEdge {
    pub fn from_id(&self) -> Option<&Value> {
        with_aliases(self.from_id.as_ref(), &self.other, &["source"])
    }

    pub fn to_id(&self) -> Option<&Value> {
        with_aliases(self.to_id.as_ref(), &self.other, &["target"])
    }

    /// Provisional branch label: `branch_id` or one of its legacy spellings.
    pub fn branch_id(&self) -> Option<&Value> {
        with_aliases(
            self.branch_id.as_ref(),
            &self.other,
            &["pipe_group_id", "PipeGroupId", "BranchId"],
        )
    }

    pub fn length_m(&self) -> Option<&Value> {
        with_aliases(self.length_m.as_ref(), &self.other, &["longueur_m"])
    }

    pub fn material(&self) -> Option<&Value> {
        with_aliases(self.material.as_ref(), &self.other, &["materiau"])
    }

    pub fn sdr(&self) -> Option<&Value> {
        with_aliases(self.sdr.as_ref(), &self.other, &["sdr_ouvrage"])
    }

    pub fn created_at(&self) -> Option<&Value> {
        with_aliases(self.created_at.as_ref(), &self.other, &["createdAt"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_keys_land_in_other() {
        let raw: RawGraph = serde_json::from_value(json!({
            "version": "1.5",
            "site_id": "S1",
            "ui_zoom": 3,
            "nodes": [{"id": "N1", "type": "OUVRAGE", "ui_selected": true}],
        }))
        .unwrap();
        assert!(raw.other.contains_key("ui_zoom"));
        assert!(raw.edges.is_empty());
        assert_eq!(raw.nodes[0].other["ui_selected"], json!(true));
        assert_eq!(raw.nodes[0].node_type, Some(json!("OUVRAGE")));
    }

    #[test]
    fn legacy_aliases_are_resolved() {
        let edge: RawEdge = serde_json::from_value(json!({
            "id": "E-1",
            "source": "A",
            "target": "B",
            "pipe_group_id": "BR-7",
            "longueur_m": "12,5",
            "sdr_ouvrage": "sdr11",
        }))
        .unwrap();
        assert_eq!(edge.from_id(), Some(&json!("A")));
        assert_eq!(edge.to_id(), Some(&json!("B")));
        assert_eq!(edge.branch_id(), Some(&json!("BR-7")));
        assert_eq!(edge.length_m(), Some(&json!("12,5")));
        assert_eq!(edge.sdr(), Some(&json!("sdr11")));
        assert_eq!(edge.created_at(), None);
    }

    #[test]
    fn canonical_field_wins_over_alias() {
        let node: RawNode = serde_json::from_value(json!({
            "id": "PM-1",
            "attach_edge_id": "E-2",
            "pm_collector_edge_id": "E-1",
            "pm_offset_m": 3.0,
        }))
        .unwrap();
        assert_eq!(node.attach_edge_id(), Some(&json!("E-2")));
        assert_eq!(node.offset_m(), Some(&json!(3.0)));
        assert_eq!(node.pos_index(), None);
    }

    #[test]
    fn blank_canonical_falls_back_to_alias() {
        let edge: RawEdge = serde_json::from_value(json!({
            "branch_id": "  ",
            "BranchId": "B-2",
        }))
        .unwrap();
        assert_eq!(edge.branch_id(), Some(&json!("B-2")));
    }
}
