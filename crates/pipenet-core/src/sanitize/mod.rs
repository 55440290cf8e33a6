//! The sanitize pass: raw graph in, canonical graph plus report out.
//!
//! Stages run in a fixed order and each one reads the previous stage's
//! fresh output: purge transient fields, validate metadata, normalize
//! nodes, align node ids, normalize edges, resolve lengths, assign
//! branches, validate anchors, check global uniqueness, assemble. Any
//! failure aborts the pass; the caller's [`RawGraph`] is only ever read.

pub mod edges;
pub mod nodes;
pub mod transient;

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, info_span, warn};

use crate::anchor::validate_anchors;
use crate::branch::assign_branches;
use crate::config::SanitizeOptions;
use crate::error::ValidationError;
use crate::fields::{self, FieldContext};
use crate::ids::{align_node_ids, ClockIdSource, EdgeIdAllocator, EdgeIdSource};
use crate::model::{Branch, Crs, Edge, Graph, Node, GRAPH_VERSION};
use crate::raw::RawGraph;
use crate::report::{IdRename, SanitizeReport};

/// Output of a successful pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Sanitized {
    pub graph: Graph,
    pub report: SanitizeReport,
}

/// Sanitizes with default options and wall-clock edge ids.
///
/// `strict` rejects transient UI fields instead of stripping them.
pub fn sanitize(raw: &RawGraph, strict: bool) -> Result<Sanitized, ValidationError> {
    Sanitizer::new(SanitizeOptions {
        strict,
        ..SanitizeOptions::default()
    })
    .run(raw)
}

/// A configured sanitize pass.
pub struct Sanitizer {
    options: SanitizeOptions,
    ids: Box<dyn EdgeIdSource>,
}

impl Sanitizer {
    pub fn new(options: SanitizeOptions) -> Self {
        Sanitizer {
            options,
            ids: Box::new(ClockIdSource),
        }
    }

    /// Replaces the source of freshly generated edge ids.
    pub fn with_id_source(mut self, ids: impl EdgeIdSource + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    pub fn options(&self) -> &SanitizeOptions {
        &self.options
    }

    pub fn run(&mut self, raw: &RawGraph) -> Result<Sanitized, ValidationError> {
        let span = info_span!(
            "sanitize",
            site_id = tracing::field::Empty,
            strict = self.options.strict
        );
        let _enter = span.enter();
        let mut report = SanitizeReport::default();

        // 1. transient fields
        let transient = transient::collect_transient_fields(raw);
        if !transient.is_empty() {
            if self.options.strict {
                return Err(ValidationError::ForbiddenFields { fields: transient });
            }
            debug!(count = transient.len(), "stripping transient fields");
            report.stripped_fields = transient;
        }

        // 2. metadata
        let meta = Metadata::read(raw)?;
        span.record("site_id", meta.site_id.as_str());

        // 3. nodes
        let mut node_list = raw
            .nodes
            .iter()
            .enumerate()
            .map(|(index, node)| nodes::normalize_node(index, node))
            .collect::<Result<Vec<Node>, _>>()?;
        ensure_unique(node_list.iter().map(|n| n.id.as_str()), |id| {
            ValidationError::DuplicateNodeId { id }
        })?;

        // 4. node id alignment
        let keyed: Vec<(String, _)> = node_list.iter().map(|n| (n.id.clone(), n.node_type)).collect();
        let alignment = align_node_ids(&keyed, self.options.node_rename_attempts);
        for (node, id) in node_list.iter_mut().zip(alignment.ids) {
            node.id = id;
        }
        report.renamed_nodes = alignment
            .renames
            .iter()
            .map(|(old, new)| IdRename {
                old: old.clone(),
                new: new.clone(),
            })
            .collect();
        let node_ids: HashSet<String> = node_list.iter().map(|n| n.id.clone()).collect();

        // 5. edges
        let mut allocator = EdgeIdAllocator::new(
            self.ids.as_mut(),
            node_ids.iter().cloned(),
            self.options.edge_id_attempts,
        );
        let batch = edges::normalize_edges(&raw.edges, &node_ids, &alignment.renames, &mut allocator)?;
        report.renamed_edges = batch.renamed;
        report.collapsed_edges = batch.collapsed;

        // 6. lengths
        let mut edge_list = Vec::with_capacity(batch.drafts.len());
        for draft in batch.drafts {
            let length_m = edges::resolve_length(&draft)?;
            edge_list.push(Edge {
                length_m,
                ..draft.edge
            });
        }

        // 7. branches
        let assignment = assign_branches(&node_list, &edge_list, self.options.reject_cycles)?;
        for (edge, branch) in edge_list.iter_mut().zip(&assignment.edge_branches) {
            edge.branch_id = branch.clone();
        }
        for (node, branch) in node_list.iter_mut().zip(&assignment.node_branches) {
            node.branch_id = branch.clone();
        }

        // 8. anchors
        for anchor in node_list.iter_mut().filter_map(|n| n.anchor.as_mut()) {
            if let Some(new_id) = batch.remap.get(&anchor.attach_edge_id) {
                anchor.attach_edge_id = new_id.clone();
            }
        }
        report.clamped_offsets =
            validate_anchors(&mut node_list, &edge_list, self.options.offset_tolerance_m)?;

        // 9. uniqueness
        check_uniqueness(&node_list, &edge_list)?;

        // 10. assemble
        let branches = assignment
            .branches
            .into_iter()
            .map(|record| Branch {
                name: meta
                    .branch_names
                    .get(&record.id)
                    .cloned()
                    .unwrap_or_else(|| record.id.clone()),
                id: record.id,
                parent_id: record.parent_id,
                is_trunk: record.is_trunk,
            })
            .collect();
        report.branch_changes = assignment.changes;
        report.branch_diagnostics = assignment.diagnostics;
        report.branch_conflicts = assignment.conflicts;

        if !report.branch_conflicts.is_empty() {
            warn!(conflicts = report.branch_conflicts.len(), "branch assignment reported conflicts");
        }
        debug!(
            nodes = node_list.len(),
            edges = edge_list.len(),
            renamed_nodes = report.renamed_nodes.len(),
            renamed_edges = report.renamed_edges.len(),
            "sanitize complete"
        );

        Ok(Sanitized {
            graph: Graph {
                version: GRAPH_VERSION.to_string(),
                site_id: meta.site_id,
                generated_at: meta.generated_at,
                style_meta: meta.style_meta,
                crs: meta.crs,
                branches,
                nodes: node_list,
                edges: edge_list,
            },
            report,
        })
    }
}

/// Validated top-level fields.
struct Metadata {
    site_id: String,
    generated_at: Option<String>,
    style_meta: serde_json::Map<String, Value>,
    crs: Crs,
    branch_names: HashMap<String, String>,
}

impl Metadata {
    fn read(raw: &RawGraph) -> Result<Self, ValidationError> {
        if let Some(version) = fields::optional_text(raw.version.as_ref()) {
            if version != GRAPH_VERSION {
                return Err(ValidationError::UnsupportedVersion {
                    found: version,
                    expected: GRAPH_VERSION.to_string(),
                });
            }
        }
        let site_id = fields::optional_text(raw.site_id.as_ref()).ok_or(ValidationError::MissingSiteId)?;
        let generated_at =
            fields::iso_timestamp(FieldContext::graph(), "generated_at", raw.generated_at.as_ref())?;

        let style_meta = match &raw.style_meta {
            Some(Value::Object(map)) => map.clone(),
            _ => serde_json::Map::new(),
        };

        let mut crs = Crs::default();
        if let Some(Value::Object(map)) = &raw.crs {
            if let Some(code) = fields::optional_text(map.get("code")) {
                crs.code = code;
            }
            if let Some(projected) = fields::optional_text(map.get("projected_for_lengths")) {
                crs.projected_for_lengths = projected;
            }
        }

        Ok(Metadata {
            site_id,
            generated_at,
            style_meta,
            crs,
            branch_names: branch_names(raw.branches.as_ref()),
        })
    }
}

/// Client-supplied branch names: `[{id, name}]` or `{id: name}`.
fn branch_names(value: Option<&Value>) -> HashMap<String, String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let id = fields::optional_text(item.get("id"))?;
                let name = fields::optional_text(item.get("name"))?;
                Some((id, name))
            })
            .collect(),
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(id, name)| Some((id.clone(), fields::optional_text(Some(name))?)))
            .collect(),
        _ => HashMap::new(),
    }
}

fn ensure_unique<'a>(
    ids: impl Iterator<Item = &'a str>,
    err: impl Fn(String) -> ValidationError,
) -> Result<HashSet<&'a str>, ValidationError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(err(id.to_string()));
        }
    }
    Ok(seen)
}

fn check_uniqueness(nodes: &[Node], edges: &[Edge]) -> Result<(), ValidationError> {
    let node_ids = ensure_unique(nodes.iter().map(|n| n.id.as_str()), |id| {
        ValidationError::DuplicateNodeId { id }
    })?;
    let edge_ids = ensure_unique(edges.iter().map(|e| e.id.as_str()), |id| {
        ValidationError::DuplicateEdgeId { id }
    })?;
    let mut shared: Vec<&&str> = node_ids.intersection(&edge_ids).collect();
    shared.sort();
    match shared.first() {
        Some(id) => Err(ValidationError::IdSpaceOverlap { id: id.to_string() }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SeededIdSource;
    use crate::ErrorCode;
    use serde_json::json;

    fn raw(value: Value) -> RawGraph {
        serde_json::from_value(value).unwrap()
    }

    fn seeded(options: SanitizeOptions) -> Sanitizer {
        Sanitizer::new(options).with_id_source(SeededIdSource::new(42))
    }

    fn small_graph() -> Value {
        json!({
            "version": "1.5",
            "site_id": "SITE-1",
            "branches": [{"id": "TRUNK", "name": "Collecteur principal"}],
            "nodes": [
                {"id": "GENERAL-1", "type": "GENERAL", "gps_lat": 45.0, "gps_lon": 5.0, "branch_id": "TRUNK"},
                {"id": "PUITS-2", "type": "PUITS", "gps_lat": 45.001, "gps_lon": 5.0},
            ],
            "edges": [{
                "id": "E-1", "from_id": "PUITS-2", "to_id": "GENERAL-1", "branch_id": "TRUNK",
                "diameter_mm": 110, "geometry": [[5.0, 45.001], [5.0, 45.0]],
                "created_at": "2024-01-01T00:00:00Z",
            }],
        })
    }

    #[test]
    fn sanitizes_small_graph() {
        let out = seeded(SanitizeOptions::default()).run(&raw(small_graph())).unwrap();
        let graph = &out.graph;
        assert_eq!(graph.version, "1.5");
        assert_eq!(graph.nodes[1].id, "OUVRAGE-2");
        assert_eq!(graph.edges[0].from_id, "OUVRAGE-2");
        assert_eq!(graph.edges[0].branch_id, "TRUNK");
        assert!((graph.edges[0].length_m - 111.19).abs() < 0.01);
        assert_eq!(graph.branches.len(), 1);
        assert_eq!(graph.branches[0].name, "Collecteur principal");
        assert!(graph.branches[0].is_trunk);
        assert_eq!(out.report.renamed_nodes[0].old, "PUITS-2");
        assert_eq!(graph.crs, Crs::default());
    }

    #[test]
    fn strict_mode_rejects_transient_fields() {
        let mut value = small_graph();
        value["nodes"][0]["ui_selected"] = json!(true);
        let err = seeded(SanitizeOptions {
            strict: true,
            ..SanitizeOptions::default()
        })
        .run(&raw(value.clone()))
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ForbiddenFields);
        assert!(err.to_string().contains("nodes[0].ui_selected"));

        let out = seeded(SanitizeOptions::default()).run(&raw(value)).unwrap();
        assert_eq!(out.report.stripped_fields, vec!["nodes[0].ui_selected"]);
    }

    #[test]
    fn metadata_is_validated() {
        let mut value = small_graph();
        value["version"] = json!("1.4");
        let err = sanitize(&raw(value), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedVersion);

        let mut value = small_graph();
        value.as_object_mut().unwrap().remove("site_id");
        assert_eq!(sanitize(&raw(value), false).unwrap_err(), ValidationError::MissingSiteId);

        let mut value = small_graph();
        value["generated_at"] = json!("2024-01-01 10:00");
        let err = sanitize(&raw(value), false).unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidTimestamp);
    }

    #[test]
    fn missing_version_defaults() {
        let mut value = small_graph();
        value.as_object_mut().unwrap().remove("version");
        let out = sanitize(&raw(value), false).unwrap();
        assert_eq!(out.graph.version, GRAPH_VERSION);
    }

    #[test]
    fn duplicate_node_ids_are_rejected() {
        let mut value = small_graph();
        value["nodes"][1]["id"] = json!("GENERAL-1");
        let err = sanitize(&raw(value), false).unwrap_err();
        assert_eq!(err, ValidationError::DuplicateNodeId { id: "GENERAL-1".into() });
    }

    #[test]
    fn anchors_follow_replaced_edge_ids() {
        let value = json!({
            "site_id": "S",
            "nodes": [
                {"id": "GENERAL-1", "type": "GENERAL", "gps_lat": 45.0, "gps_lon": 5.0},
                {"id": "POINT_MESURE-1", "type": "POINT_MESURE", "gps_lat": 45.001, "gps_lon": 5.0,
                 "attach_edge_id": "pipe-7", "offset_m": 3},
                {"id": "OUVRAGE-1", "type": "OUVRAGE", "gps_lat": 45.002, "gps_lon": 5.0},
            ],
            "edges": [
                {"id": "pipe-7", "from_id": "OUVRAGE-1", "to_id": "POINT_MESURE-1", "branch_id": "B",
                 "diameter_mm": 90, "geometry": [[5.0, 45.002], [5.0, 45.001]]},
                {"id": "E-2", "from_id": "POINT_MESURE-1", "to_id": "GENERAL-1", "branch_id": "B",
                 "diameter_mm": 90, "geometry": [[5.0, 45.001], [5.0, 45.0]]},
            ],
        });
        let out = seeded(SanitizeOptions::default()).run(&raw(value)).unwrap();
        let anchored = out.graph.nodes[1].anchor.as_ref().unwrap();
        assert_eq!(anchored.attach_edge_id, out.graph.edges[0].id);
        assert_eq!(out.report.renamed_edges[0].old, "pipe-7");
    }

    #[test]
    fn uniqueness_checks() {
        let (nodes, edges) = {
            use crate::branch::testing::{edge, node};
            use crate::model::NodeType;
            (
                vec![node("E-1", NodeType::Ouvrage, 0.0, 0.0)],
                vec![edge("E-1", "E-1", "E-1", 1.0, "2024-01-01T00:00:00Z")],
            )
        };
        let err = check_uniqueness(&nodes, &edges).unwrap_err();
        assert_eq!(err, ValidationError::IdSpaceOverlap { id: "E-1".into() });
    }

    #[test]
    fn branch_names_accept_list_or_map() {
        let names = branch_names(Some(&json!([{"id": "A", "name": "Nord"}, {"id": "B"}])));
        assert_eq!(names.len(), 1);
        let names = branch_names(Some(&json!({"A": "Nord", "B": ""})));
        assert_eq!(names.get("A").map(String::as_str), Some("Nord"));
        assert!(!names.contains_key("B"));
    }
}
