//! Edge normalization: endpoints, ids, scalar fields and lengths.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::ValidationError;
use crate::fields::{self, FieldContext};
use crate::geometry::{polyline_length, round_cm};
use crate::ids::{is_canonical_edge_id, EdgeIdAllocator};
use crate::model::Edge;
use crate::raw::{RawEdge, EDGE_ALIAS_KEYS};
use crate::report::IdRename;

use super::transient::build_extras;

/// A normalized edge whose length is not resolved yet.
#[derive(Debug, Clone)]
pub struct EdgeDraft {
    pub edge: Edge,
    /// `length_m` as submitted, if any.
    pub declared_length: Option<f64>,
}

/// Edges surviving normalization plus the id bookkeeping.
#[derive(Debug, Default)]
pub struct EdgeBatch {
    pub drafts: Vec<EdgeDraft>,
    pub renamed: Vec<IdRename>,
    /// Replaced ids that no longer exist, for re-pointing anchors.
    pub remap: HashMap<String, String>,
    pub collapsed: Vec<String>,
}

/// Normalizes every raw edge in input order.
///
/// Endpoints go through `node_renames` and must name a known node. A
/// submitted id seen before collapses the edge when the endpoints match too,
/// otherwise the later edge gets a fresh id. Missing or non-`E-` ids are
/// replaced; anchors follow the first edge that carried a replaced id.
pub fn normalize_edges(
    raw_edges: &[RawEdge],
    node_ids: &HashSet<String>,
    node_renames: &IndexMap<String, String>,
    allocator: &mut EdgeIdAllocator<'_>,
) -> Result<EdgeBatch, ValidationError> {
    let mut batch = EdgeBatch::default();
    // Keyed by the id as submitted, before any replacement.
    let mut endpoints_by_id: HashMap<String, (String, String)> = HashMap::new();

    for (index, raw) in raw_edges.iter().enumerate() {
        let original = fields::optional_text(raw.id.as_ref());
        let label = original.clone().unwrap_or_else(|| format!("edges[{index}]"));

        let (Some(from), Some(to)) = (
            fields::optional_text(raw.from_id()),
            fields::optional_text(raw.to_id()),
        ) else {
            return Err(ValidationError::EdgeMissingEndpoints { edge: label });
        };
        let from = node_renames.get(&from).cloned().unwrap_or(from);
        let to = node_renames.get(&to).cloned().unwrap_or(to);
        for endpoint in [&from, &to] {
            if !node_ids.contains(endpoint) {
                return Err(ValidationError::EdgeEndpointMissing {
                    edge: label,
                    node: endpoint.clone(),
                });
            }
        }

        let id = match original {
            Some(original) => {
                let repeat = endpoints_by_id.get(&original);
                if repeat == Some(&(from.clone(), to.clone())) {
                    debug!(edge = %original, "collapsing exact duplicate edge");
                    batch.collapsed.push(original);
                    continue;
                }
                let first = repeat.is_none();
                if first {
                    endpoints_by_id.insert(original.clone(), (from.clone(), to.clone()));
                }

                if first && is_canonical_edge_id(&original) && allocator.keep(&original) {
                    original
                } else {
                    let fresh = allocator.mint();
                    if first && !is_canonical_edge_id(&original) {
                        batch.remap.insert(original.clone(), fresh.clone());
                    }
                    batch.renamed.push(IdRename {
                        old: original,
                        new: fresh.clone(),
                    });
                    fresh
                }
            }
            None => allocator.mint(),
        };

        let draft = normalize_edge(index, raw, &id, from, to)?;
        batch.drafts.push(draft);
    }

    Ok(batch)
}

/// Coerces the scalar fields of one edge whose id and endpoints are settled.
fn normalize_edge(
    index: usize,
    raw: &RawEdge,
    id: &str,
    from_id: String,
    to_id: String,
) -> Result<EdgeDraft, ValidationError> {
    let ctx = FieldContext::edge(id);

    let branch_id = fields::optional_text(raw.branch_id()).ok_or_else(|| {
        ValidationError::EdgeMissingBranch {
            edge: id.to_string(),
        }
    })?;
    let diameter_mm = fields::required_float(ctx, "diameter_mm", raw.diameter_mm.as_ref(), true)?;

    let geometry = fields::parse_points(raw.geometry.as_ref());
    if geometry.len() < 2 {
        return Err(ValidationError::InvalidGeometry {
            edge: id.to_string(),
        });
    }

    let created_at = match fields::iso_timestamp(ctx, "created_at", raw.created_at())? {
        Some(ts) => ts,
        None => fields::synthesize_created_at(index),
    };

    let edge = Edge {
        id: id.to_string(),
        from_id,
        to_id,
        branch_id,
        diameter_mm,
        length_m: 0.0,
        geometry,
        created_at,
        material: fields::upper_text(raw.material()),
        sdr: fields::upper_text(raw.sdr()),
        slope_pct: fields::optional_float(ctx, "slope_pct", raw.slope_pct.as_ref(), false)?,
        site_id: fields::optional_text(raw.site_id.as_ref()),
        active: fields::boolean(ctx, "active", raw.active.as_ref(), true)?,
        commentaire: fields::optional_text(raw.commentaire.as_ref()).unwrap_or_default(),
        extras: build_extras(raw.extras.as_ref(), &raw.other, EDGE_ALIAS_KEYS),
    };
    Ok(EdgeDraft {
        edge,
        declared_length: fields::optional_float(ctx, "length_m", raw.length_m(), false)?,
    })
}

/// Declared length when positive, else the geometry's haversine length.
///
/// Rounded to centimetres; must end up strictly positive.
pub fn resolve_length(draft: &EdgeDraft) -> Result<f64, ValidationError> {
    let length = draft
        .declared_length
        .map(round_cm)
        .filter(|len| *len > 0.0)
        .or_else(|| polyline_length(&draft.edge.geometry).map(round_cm))
        .unwrap_or(0.0);
    if length > 0.0 {
        Ok(length)
    } else {
        Err(ValidationError::NonPositiveLength {
            edge: draft.edge.id.clone(),
        })
    }
}
