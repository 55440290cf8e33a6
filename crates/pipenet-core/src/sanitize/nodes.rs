//! Node normalization.

use serde_json::Value;

use crate::error::ValidationError;
use crate::fields::{self, FieldContext};
use crate::model::{Anchor, Node, NodeType};
use crate::raw::{RawNode, NODE_ALIAS_KEYS};

use super::transient::build_extras;

fn node_type(id: &str, value: Option<&Value>) -> Result<NodeType, ValidationError> {
    match fields::optional_text(value) {
        None => Ok(NodeType::Ouvrage),
        Some(text) => NodeType::canonicalize(&text).ok_or_else(|| ValidationError::InvalidNodeType {
            node: id.to_string(),
            value: text,
        }),
    }
}

fn coordinate(
    ctx: FieldContext<'_>,
    field: &str,
    value: Option<&Value>,
    limit: f64,
) -> Result<f64, ValidationError> {
    let number = fields::required_float(ctx, field, value, false)?;
    if number.abs() > limit {
        return Err(ctx.invalid(field, format!("{number} outside [-{limit}, {limit}]")));
    }
    Ok(number)
}

/// Coerces one raw node. `index` names nodes that lack an id.
///
/// The id is taken as submitted; alignment to the type prefix happens
/// afterwards. `branch_id` keeps the client's label, or stays empty.
pub fn normalize_node(index: usize, raw: &RawNode) -> Result<Node, ValidationError> {
    let Some(id) = fields::optional_text(raw.id.as_ref()) else {
        return Err(ValidationError::MissingField {
            kind: crate::EntityKind::Node,
            id: format!("nodes[{index}]"),
            field: "id".to_string(),
        });
    };
    let ctx = FieldContext::node(&id);
    let node_type = node_type(&id, raw.node_type.as_ref())?;

    let gps_lat = coordinate(ctx, "gps_lat", raw.gps_lat(), 90.0)?;
    let gps_lon = coordinate(ctx, "gps_lon", raw.gps_lon(), 180.0)?;

    let (diameter_mm, material) = if node_type.carries_pipe() {
        (
            fields::optional_float(ctx, "diameter_mm", raw.diameter_mm.as_ref(), true)?,
            fields::upper_text(raw.material.as_ref()),
        )
    } else {
        (None, None)
    };

    let anchor = if node_type.is_inline_anchored() {
        let offset_m = fields::optional_float(ctx, "offset_m", raw.offset_m(), false)?;
        fields::optional_text(raw.attach_edge_id()).map(|attach_edge_id| Anchor {
            attach_edge_id,
            offset_m,
        })
    } else {
        None
    };

    Ok(Node {
        node_type,
        name: fields::optional_text(raw.name.as_ref()).unwrap_or_default(),
        branch_id: fields::optional_text(raw.branch_id.as_ref()).unwrap_or_default(),
        diameter_mm,
        material,
        gps_lat,
        gps_lon,
        x: fields::optional_float(ctx, "x", raw.x.as_ref(), false)?,
        y: fields::optional_float(ctx, "y", raw.y.as_ref(), false)?,
        gps_locked: fields::boolean(ctx, "gps_locked", raw.gps_locked.as_ref(), true)?,
        pos_index: fields::optional_int(ctx, "pos_index", raw.pos_index())?,
        anchor,
        extras: build_extras(raw.extras.as_ref(), &raw.other, NODE_ALIAS_KEYS),
        id,
    })
}
