//! Validation error taxonomy for the sanitize pass.
//!
//! Uses `thiserror` for structured, matchable variants. Every variant names
//! the offending entity so the `Display` output reads like
//! `edge missing branch_id: E-7F3A`. [`ValidationError::code`] gives the
//! machine-checkable reason independent of the message text.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which kind of entity a field error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Graph,
    Node,
    Edge,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Graph => "graph",
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
        };
        f.write_str(name)
    }
}

/// Stable reason codes, one per [`ValidationError`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ForbiddenFields,
    UnsupportedVersion,
    MissingSiteId,
    InvalidTimestamp,
    MissingField,
    InvalidField,
    InvalidNodeType,
    EdgeMissingEndpoints,
    EdgeEndpointMissing,
    EdgeMissingBranch,
    InvalidGeometry,
    NonPositiveLength,
    AnchorEdgeMissing,
    AnchorEdgeInvalid,
    AnchorOffsetMissing,
    AnchorOffsetNegative,
    AnchorOffsetExceedsLength,
    DuplicateNodeId,
    DuplicateEdgeId,
    IdSpaceOverlap,
    FlowCycle,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ForbiddenFields => "forbidden_fields",
            ErrorCode::UnsupportedVersion => "unsupported_version",
            ErrorCode::MissingSiteId => "missing_site_id",
            ErrorCode::InvalidTimestamp => "invalid_timestamp",
            ErrorCode::MissingField => "missing_field",
            ErrorCode::InvalidField => "invalid_field",
            ErrorCode::InvalidNodeType => "invalid_node_type",
            ErrorCode::EdgeMissingEndpoints => "edge_missing_endpoints",
            ErrorCode::EdgeEndpointMissing => "edge_endpoint_missing",
            ErrorCode::EdgeMissingBranch => "edge_missing_branch",
            ErrorCode::InvalidGeometry => "invalid_geometry",
            ErrorCode::NonPositiveLength => "non_positive_length",
            ErrorCode::AnchorEdgeMissing => "anchor_edge_missing",
            ErrorCode::AnchorEdgeInvalid => "anchor_edge_invalid",
            ErrorCode::AnchorOffsetMissing => "anchor_offset_missing",
            ErrorCode::AnchorOffsetNegative => "anchor_offset_negative",
            ErrorCode::AnchorOffsetExceedsLength => "anchor_offset_exceeds_length",
            ErrorCode::DuplicateNodeId => "duplicate_node_id",
            ErrorCode::DuplicateEdgeId => "duplicate_edge_id",
            ErrorCode::IdSpaceOverlap => "id_space_overlap",
            ErrorCode::FlowCycle => "flow_cycle",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A violated invariant. Any variant aborts the whole sanitize pass.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum ValidationError {
    /// Strict mode found UI-only keys in the payload.
    #[error("UI payload contains transient fields that must be removed: {}", fields.join(", "))]
    ForbiddenFields { fields: Vec<String> },

    #[error("unsupported graph version: {found} (expected {expected})")]
    UnsupportedVersion { found: String, expected: String },

    #[error("graph missing site_id")]
    MissingSiteId,

    /// A timestamp field does not match `YYYY-MM-DDTHH:MM:SS[.ffffff]Z`.
    #[error("{kind} {field} is not an ISO-8601 UTC timestamp: {id} ({value})")]
    InvalidTimestamp {
        kind: EntityKind,
        id: String,
        field: String,
        value: String,
    },

    #[error("{kind} missing {field}: {id}")]
    MissingField {
        kind: EntityKind,
        id: String,
        field: String,
    },

    #[error("{kind} {field} invalid: {id} ({reason})")]
    InvalidField {
        kind: EntityKind,
        id: String,
        field: String,
        reason: String,
    },

    #[error("node type invalid: {node} ({value})")]
    InvalidNodeType { node: String, value: String },

    #[error("edge missing endpoints: {edge}")]
    EdgeMissingEndpoints { edge: String },

    /// An endpoint does not resolve to any known node.
    #[error("edge endpoint missing: {edge} references unknown node {node}")]
    EdgeEndpointMissing { edge: String, node: String },

    #[error("edge missing branch_id: {edge}")]
    EdgeMissingBranch { edge: String },

    #[error("edge geometry invalid: {edge} (need at least 2 valid points)")]
    InvalidGeometry { edge: String },

    #[error("edge length_m not positive: {edge}")]
    NonPositiveLength { edge: String },

    #[error("anchor edge missing for node {node}: {edge}")]
    AnchorEdgeMissing { node: String, edge: String },

    /// The anchor edge exists but its head (`to_id`) is not the anchored node.
    #[error("anchor edge invalid for node {node}: {edge}")]
    AnchorEdgeInvalid { node: String, edge: String },

    #[error("offset_m required for node {node}")]
    AnchorOffsetMissing { node: String },

    #[error("offset_m negative for node {node}: {offset}")]
    AnchorOffsetNegative { node: String, offset: f64 },

    #[error("offset_m exceeds edge length for node {node}: {offset} > {length}")]
    AnchorOffsetExceedsLength {
        node: String,
        offset: f64,
        length: f64,
    },

    #[error("duplicate node id: {id}")]
    DuplicateNodeId { id: String },

    #[error("duplicate edge id: {id}")]
    DuplicateEdgeId { id: String },

    #[error("id used by both a node and an edge: {id}")]
    IdSpaceOverlap { id: String },

    #[error("flow cycle through nodes: {}", nodes.join(" -> "))]
    FlowCycle { nodes: Vec<String> },
}

impl ValidationError {
    /// Returns the machine-checkable reason code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            ValidationError::ForbiddenFields { .. } => ErrorCode::ForbiddenFields,
            ValidationError::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            ValidationError::MissingSiteId => ErrorCode::MissingSiteId,
            ValidationError::InvalidTimestamp { .. } => ErrorCode::InvalidTimestamp,
            ValidationError::MissingField { .. } => ErrorCode::MissingField,
            ValidationError::InvalidField { .. } => ErrorCode::InvalidField,
            ValidationError::InvalidNodeType { .. } => ErrorCode::InvalidNodeType,
            ValidationError::EdgeMissingEndpoints { .. } => ErrorCode::EdgeMissingEndpoints,
            ValidationError::EdgeEndpointMissing { .. } => ErrorCode::EdgeEndpointMissing,
            ValidationError::EdgeMissingBranch { .. } => ErrorCode::EdgeMissingBranch,
            ValidationError::InvalidGeometry { .. } => ErrorCode::InvalidGeometry,
            ValidationError::NonPositiveLength { .. } => ErrorCode::NonPositiveLength,
            ValidationError::AnchorEdgeMissing { .. } => ErrorCode::AnchorEdgeMissing,
            ValidationError::AnchorEdgeInvalid { .. } => ErrorCode::AnchorEdgeInvalid,
            ValidationError::AnchorOffsetMissing { .. } => ErrorCode::AnchorOffsetMissing,
            ValidationError::AnchorOffsetNegative { .. } => ErrorCode::AnchorOffsetNegative,
            ValidationError::AnchorOffsetExceedsLength { .. } => {
                ErrorCode::AnchorOffsetExceedsLength
            }
            ValidationError::DuplicateNodeId { .. } => ErrorCode::DuplicateNodeId,
            ValidationError::DuplicateEdgeId { .. } => ErrorCode::DuplicateEdgeId,
            ValidationError::IdSpaceOverlap { .. } => ErrorCode::IdSpaceOverlap,
            ValidationError::FlowCycle { .. } => ErrorCode::FlowCycle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_error_message_names_the_edge() {
        let err = ValidationError::EdgeMissingBranch {
            edge: "E-7F3A".into(),
        };
        assert_eq!(err.to_string(), "edge missing branch_id: E-7F3A");
        assert_eq!(err.code(), ErrorCode::EdgeMissingBranch);
    }

    #[test]
    fn anchor_error_message() {
        let err = ValidationError::AnchorEdgeInvalid {
            node: "POINT_MESURE-12".into(),
            edge: "E-1".into(),
        };
        assert!(err.to_string().contains("anchor edge invalid"));
        assert!(err.to_string().contains("POINT_MESURE-12"));
    }

    #[test]
    fn field_error_uses_entity_kind() {
        let err = ValidationError::MissingField {
            kind: EntityKind::Node,
            id: "OUVRAGE-3".into(),
            field: "gps_lat".into(),
        };
        assert_eq!(err.to_string(), "node missing gps_lat: OUVRAGE-3");
        assert_eq!(err.code().as_str(), "missing_field");
    }

    #[test]
    fn serializes_with_code_tag() {
        let err = ValidationError::DuplicateEdgeId { id: "E-1".into() };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], "duplicate_edge_id");
        assert_eq!(json["id"], "E-1");

        let unit = serde_json::to_value(ValidationError::MissingSiteId).unwrap();
        assert_eq!(unit["code"], "missing_site_id");
    }

    #[test]
    fn code_display_matches_serde_name() {
        let code = ErrorCode::AnchorOffsetExceedsLength;
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, format!("\"{}\"", code));
    }
}
