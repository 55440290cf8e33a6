//! Diagnostics returned next to a canonical graph.
//!
//! Nothing here affects the graph itself; the report explains what the pass
//! changed so a UI can highlight it.

use serde::Serialize;

/// An edge whose branch differs from its provisional input label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BranchChange {
    pub edge_id: String,
    pub previous: Option<String>,
    pub current: String,
    /// Rule that produced the new value (`pass_through`, `diameter`, ...).
    pub reason: String,
}

/// Key values a candidate edge was ranked on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub edge_id: String,
    pub diameter_mm: f64,
    pub depth: usize,
    pub created_at: String,
    pub deviation_deg: f64,
}

/// One ranking decision at a splitter or trunk source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitDiagnostic {
    pub node_id: String,
    pub branch_id: String,
    pub main_edge_id: String,
    /// First cascade rule that separated the winner from the runner-up.
    pub rule: String,
    pub new_branches: Vec<String>,
    /// Candidates in ranked order, winner first.
    pub candidates: Vec<RankedCandidate>,
}

/// An identifier rewritten by the pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdRename {
    pub old: String,
    pub new: String,
}

/// An anchor offset reduced to its edge length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OffsetClamp {
    pub node_id: String,
    pub requested_m: f64,
    pub applied_m: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SanitizeReport {
    pub branch_changes: Vec<BranchChange>,
    pub branch_diagnostics: Vec<SplitDiagnostic>,
    pub branch_conflicts: Vec<String>,
    /// In rename order.
    pub renamed_nodes: Vec<IdRename>,
    /// In rename order; a duplicated id may appear more than once.
    pub renamed_edges: Vec<IdRename>,
    pub stripped_fields: Vec<String>,
    pub collapsed_edges: Vec<String>,
    pub clamped_offsets: Vec<OffsetClamp>,
}

impl SanitizeReport {
    /// Whether the pass left the input exactly as submitted, modulo formatting.
    pub fn is_clean(&self) -> bool {
        self.branch_changes.is_empty()
            && self.branch_conflicts.is_empty()
            && self.renamed_nodes.is_empty()
            && self.renamed_edges.is_empty()
            && self.stripped_fields.is_empty()
            && self.collapsed_edges.is_empty()
            && self.clamped_offsets.is_empty()
    }
}
