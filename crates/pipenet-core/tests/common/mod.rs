//! Graph document builders shared by the integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};

use pipenet_core::{RawGraph, SanitizeOptions, Sanitized, Sanitizer, SeededIdSource, ValidationError};

pub const T0: &str = "2024-01-01T00:00:00Z";
pub const T1: &str = "2024-01-02T00:00:00Z";

pub fn node(id: &str, node_type: &str, lon: f64, lat: f64) -> Value {
    json!({"id": id, "type": node_type, "gps_lon": lon, "gps_lat": lat})
}

pub fn edge(id: &str, from: &str, to: &str, diameter_mm: f64, created_at: &str, geometry: Value) -> Value {
    json!({
        "id": id,
        "from_id": from,
        "to_id": to,
        "branch_id": "PROVISIONAL",
        "diameter_mm": diameter_mm,
        "created_at": created_at,
        "geometry": geometry,
    })
}

pub fn document(nodes: Vec<Value>, edges: Vec<Value>) -> RawGraph {
    serde_json::from_value(json!({
        "version": "1.5",
        "site_id": "SITE-TEST",
        "nodes": nodes,
        "edges": edges,
    }))
    .expect("test document should deserialize")
}

pub fn run(raw: &RawGraph) -> Result<Sanitized, ValidationError> {
    Sanitizer::new(SanitizeOptions::default())
        .with_id_source(SeededIdSource::new(7))
        .run(raw)
}

/// Feeds a canonical graph back in as a client document.
pub fn reparse(sanitized: &Sanitized) -> RawGraph {
    let value = serde_json::to_value(&sanitized.graph).expect("graph serializes");
    serde_json::from_value(value).expect("canonical graph reads back")
}

pub fn branch_of<'a>(sanitized: &'a Sanitized, edge_id: &str) -> &'a str {
    sanitized
        .graph
        .edges
        .iter()
        .find(|e| e.id == edge_id)
        .map(|e| e.branch_id.as_str())
        .unwrap_or_else(|| panic!("no edge {edge_id}"))
}

/// Outlet GENERAL-1 fed by JONCTION-1, which collects OUVRAGE-A and OUVRAGE-B.
/// OUVRAGE-A has one more well (OUVRAGE-C) upstream.
pub fn junction_document(a: (f64, &str), b: (f64, &str)) -> RawGraph {
    let mut root = node("GENERAL-1", "GENERAL", 5.0, 45.0);
    root["branch_id"] = json!("MAIN");
    document(
        vec![
            root,
            node("JONCTION-1", "JONCTION", 5.0, 45.001),
            node("OUVRAGE-A", "OUVRAGE", 4.999, 45.002),
            node("OUVRAGE-B", "OUVRAGE", 5.001, 45.002),
            node("OUVRAGE-C", "OUVRAGE", 4.998, 45.003),
        ],
        vec![
            edge("E-01", "JONCTION-1", "GENERAL-1", 200.0, T0, json!([[5.0, 45.001], [5.0, 45.0]])),
            edge("E-02", "OUVRAGE-A", "JONCTION-1", a.0, a.1, json!([[4.999, 45.002], [5.0, 45.001]])),
            edge("E-03", "OUVRAGE-B", "JONCTION-1", b.0, b.1, json!([[5.001, 45.002], [5.0, 45.001]])),
            edge("E-04", "OUVRAGE-C", "OUVRAGE-A", a.0, T0, json!([[4.998, 45.003], [4.999, 45.002]])),
        ],
    )
}
