//! Canonical graph model produced by a successful sanitize pass.
//!
//! These types are output-only: they serialize to the wire format the stores
//! persist, and a canonical graph is read back through [`crate::raw`] like
//! any other client payload. Lengths and offsets are in metres, diameters in
//! millimetres, coordinates in decimal degrees.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::Point;

/// The only graph format version this engine reads and writes.
pub const GRAPH_VERSION: &str = "1.5";

// ---------------------------------------------------------------------------
// Node types
// ---------------------------------------------------------------------------

/// The five kinds of point entity in a pipe network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// Trunk source; the root of one or more branches.
    General,
    /// Well or other civil structure.
    Ouvrage,
    /// Junction where flow divides.
    Jonction,
    /// Inline measurement point (pressure/flow sensor).
    PointMesure,
    /// Inline valve.
    Vanne,
}

impl NodeType {
    pub const ALL: [NodeType; 5] = [
        NodeType::General,
        NodeType::Ouvrage,
        NodeType::Jonction,
        NodeType::PointMesure,
        NodeType::Vanne,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::General => "GENERAL",
            NodeType::Ouvrage => "OUVRAGE",
            NodeType::Jonction => "JONCTION",
            NodeType::PointMesure => "POINT_MESURE",
            NodeType::Vanne => "VANNE",
        }
    }

    /// Canonical id prefix for nodes of this type (`{prefix}-{suffix}`).
    pub fn id_prefix(&self) -> &'static str {
        self.as_str()
    }

    /// Maps a client type spelling onto a node type.
    ///
    /// Case-insensitive; accepts the legacy spellings `PLATEFORME`,
    /// `GÉNÉRAL`, `PUITS`, `CANALISATION` and `COLLECTEUR`.
    pub fn canonicalize(raw: &str) -> Option<NodeType> {
        let slug: String = raw
            .trim()
            .to_uppercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .collect();
        let node_type = match slug.as_str() {
            "GENERAL" | "GÉNÉRAL" | "PLATEFORME" => NodeType::General,
            "OUVRAGE" | "PUITS" | "CANALISATION" | "COLLECTEUR" => NodeType::Ouvrage,
            "JONCTION" => NodeType::Jonction,
            "POINT_MESURE" => NodeType::PointMesure,
            "VANNE" => NodeType::Vanne,
            _ => return None,
        };
        Some(node_type)
    }

    /// Types that never split flow, whatever their degree.
    pub fn is_pass_through(&self) -> bool {
        matches!(self, NodeType::Vanne | NodeType::PointMesure | NodeType::Ouvrage)
    }

    /// Types that may bind onto an edge interior through an [`Anchor`].
    pub fn is_inline_anchored(&self) -> bool {
        matches!(self, NodeType::PointMesure | NodeType::Vanne)
    }

    /// Types whose diameter and material attributes are meaningful.
    pub fn carries_pipe(&self) -> bool {
        matches!(self, NodeType::General | NodeType::Ouvrage)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Extras
// ---------------------------------------------------------------------------

/// A loosely-typed scalar carried in an entity's free-form metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtraValue {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ExtraValue {
    /// Converts a JSON value. Arrays and objects keep their compact JSON text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ExtraValue::Null,
            Value::Bool(b) => ExtraValue::Bool(*b),
            Value::Number(n) => match n.as_f64() {
                Some(f) if f.is_finite() => ExtraValue::Number(f),
                _ => ExtraValue::Text(n.to_string()),
            },
            Value::String(s) => ExtraValue::Text(s.clone()),
            Value::Array(_) | Value::Object(_) => ExtraValue::Text(value.to_string()),
        }
    }
}

/// Business metadata, in insertion order.
pub type Extras = IndexMap<String, ExtraValue>;

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

/// Binding of an inline device onto the downstream part of an edge.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anchor {
    pub attach_edge_id: String,
    /// Distance along the edge, in metres; clamped to the edge length.
    pub offset_m: Option<f64>,
}

/// A point entity of the network.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub name: String,
    /// Assigned by the branch engine; client values are only a fallback.
    pub branch_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diameter_mm: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    pub gps_lat: f64,
    pub gps_lon: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    pub gps_locked: bool,
    /// Rank of a well or measurement point along its collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pos_index: Option<i64>,
    #[serde(flatten)]
    pub anchor: Option<Anchor>,
    pub extras: Extras,
}

impl Node {
    /// Position as a `[lon, lat]` point.
    pub fn position(&self) -> Point {
        [self.gps_lon, self.gps_lat]
    }
}

/// A directed pipe segment; `from_id` is upstream of `to_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    /// Computed by the branch engine; the input value is provisional.
    pub branch_id: String,
    pub diameter_mm: f64,
    pub length_m: f64,
    pub geometry: Vec<Point>,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub material: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_id: Option<String>,
    pub active: bool,
    pub commentaire: String,
    pub extras: Extras,
}

/// A named group of edges sharing one flow path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
    /// Branch this one split from; `None` for trunks and fallbacks.
    pub parent_id: Option<String>,
    pub is_trunk: bool,
}

/// Coordinate reference systems of the stored geometry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Crs {
    pub code: String,
    pub projected_for_lengths: String,
}

impl Default for Crs {
    fn default() -> Self {
        Crs {
            code: "EPSG:4326".to_string(),
            projected_for_lengths: "EPSG:2154".to_string(),
        }
    }
}

/// The canonical graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Graph {
    pub version: String,
    pub site_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<String>,
    pub style_meta: serde_json::Map<String, Value>,
    pub crs: Crs,
    pub branches: Vec<Branch>,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}
