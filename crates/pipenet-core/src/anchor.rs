//! Inline anchor validation.
//!
//! A `POINT_MESURE` or `VANNE` node may sit on the interior of an edge
//! instead of at a vertex. The edge must exist and end at the node (anchors
//! bind to the downstream end), and the offset must fall within the edge's
//! length. Overshoot within the tolerance is clamped; beyond it, rejected.

use std::collections::HashMap;

use tracing::debug;

use crate::error::ValidationError;
use crate::geometry::round_cm;
use crate::model::{Edge, Node, NodeType};
use crate::report::OffsetClamp;

// Absorbs float noise when comparing against `length + tolerance`.
const EPSILON_M: f64 = 1e-9;

/// Validates every inline anchor, clamping offsets in place.
///
/// Nodes of other types are skipped; callers strip their anchors. Returns
/// the clamps applied, in node order.
pub fn validate_anchors(
    nodes: &mut [Node],
    edges: &[Edge],
    tolerance_m: f64,
) -> Result<Vec<OffsetClamp>, ValidationError> {
    let edge_by_id: HashMap<&str, &Edge> = edges.iter().map(|e| (e.id.as_str(), e)).collect();
    let mut clamps = Vec::new();

    for node in nodes.iter_mut() {
        if !node.node_type.is_inline_anchored() {
            continue;
        }
        let Some(anchor) = node.anchor.as_mut() else {
            continue;
        };

        let edge = edge_by_id
            .get(anchor.attach_edge_id.as_str())
            .ok_or_else(|| ValidationError::AnchorEdgeMissing {
                node: node.id.clone(),
                edge: anchor.attach_edge_id.clone(),
            })?;
        if edge.to_id != node.id {
            return Err(ValidationError::AnchorEdgeInvalid {
                node: node.id.clone(),
                edge: anchor.attach_edge_id.clone(),
            });
        }

        let Some(offset) = anchor.offset_m else {
            if node.node_type == NodeType::PointMesure {
                return Err(ValidationError::AnchorOffsetMissing {
                    node: node.id.clone(),
                });
            }
            continue;
        };
        if offset < 0.0 {
            return Err(ValidationError::AnchorOffsetNegative {
                node: node.id.clone(),
                offset,
            });
        }

        let length = edge.length_m;
        if offset > length + tolerance_m + EPSILON_M {
            return Err(ValidationError::AnchorOffsetExceedsLength {
                node: node.id.clone(),
                offset,
                length,
            });
        }
        if offset > length {
            let applied = round_cm(length);
            debug!(node = %node.id, requested = offset, applied, "clamped anchor offset");
            clamps.push(OffsetClamp {
                node_id: node.id.clone(),
                requested_m: offset,
                applied_m: applied,
            });
            anchor.offset_m = Some(applied);
        } else {
            anchor.offset_m = Some(round_cm(offset));
        }
    }

    Ok(clamps)
}
