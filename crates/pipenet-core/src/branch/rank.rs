//! Tie-break cascade for picking the main continuation at a splitter.
//!
//! Candidates are the upstream edges of the node being processed. Highest
//! priority first: larger diameter, deeper upstream subtree, earlier
//! `created_at`, smaller deviation from the straight-through direction,
//! then edge id.

use std::cmp::Ordering;

use crate::fields::timestamp_millis;
use crate::geometry::{bearing_deviation_deg, initial_bearing_deg, Point};
use crate::report::{RankedCandidate, SplitDiagnostic};

use super::Network;

/// Deviation reported when a flow direction cannot be determined.
pub const UNKNOWN_DEVIATION_DEG: f64 = 180.0;

/// Ranking inputs for one candidate edge.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub edge: usize,
    pub diameter_mm: f64,
    pub depth: usize,
    /// `None` sorts after every known timestamp.
    pub created_ms: Option<i64>,
    pub deviation_deg: f64,
}

impl Candidate {
    fn created_key(&self) -> i64 {
        self.created_ms.unwrap_or(i64::MAX)
    }

    // Millidegree resolution keeps float noise out of the ordering.
    fn deviation_key(&self) -> i64 {
        (self.deviation_deg * 1000.0).round() as i64
    }
}

/// Candidates in ranked order plus the rule that decided the winner.
#[derive(Debug, Clone)]
pub struct Ranking {
    pub order: Vec<Candidate>,
    pub rule: &'static str,
}

impl Ranking {
    pub fn main_edge(&self) -> Option<usize> {
        self.order.first().map(|c| c.edge)
    }
}

fn compare(net: &Network<'_>, a: &Candidate, b: &Candidate) -> Ordering {
    b.diameter_mm
        .total_cmp(&a.diameter_mm)
        .then_with(|| b.depth.cmp(&a.depth))
        .then_with(|| a.created_key().cmp(&b.created_key()))
        .then_with(|| a.deviation_key().cmp(&b.deviation_key()))
        .then_with(|| net.edges[a.edge].id.cmp(&net.edges[b.edge].id))
}

/// Names the first cascade rule separating the top two candidates.
fn deciding_rule(order: &[Candidate]) -> &'static str {
    let [first, second, ..] = order else {
        return "single_outlet";
    };
    if first.diameter_mm.total_cmp(&second.diameter_mm) != Ordering::Equal {
        "diameter"
    } else if first.depth != second.depth {
        "depth"
    } else if first.created_key() != second.created_key() {
        "created_at"
    } else if first.deviation_key() != second.deviation_key() {
        "angle"
    } else {
        "edge_id"
    }
}

/// Bearing of the flow leaving `node` along `via` (toward its downstream end).
fn outflow_bearing(net: &Network<'_>, node: usize, via: usize) -> Option<f64> {
    let downstream = net.edge_to[via];
    initial_bearing_deg(net.position(node), net.position(downstream))
        .or_else(|| first_segment(&net.edges[via].geometry))
}

/// Bearing of the flow entering `node` along candidate edge `edge`.
fn inflow_bearing(net: &Network<'_>, node: usize, edge: usize) -> Option<f64> {
    let upstream = net.edge_from[edge];
    initial_bearing_deg(net.position(upstream), net.position(node))
        .or_else(|| last_segment(&net.edges[edge].geometry))
}

fn first_segment(points: &[Point]) -> Option<f64> {
    match points {
        [a, b, ..] => initial_bearing_deg(*a, *b),
        _ => None,
    }
}

fn last_segment(points: &[Point]) -> Option<f64> {
    match points {
        [.., a, b] => initial_bearing_deg(*a, *b),
        _ => None,
    }
}

/// Angle between the candidate's inflow and the outflow the node was
/// reached through; 0 means straight through. Roots have no outflow and
/// score 0 for every candidate.
pub fn deviation_deg(net: &Network<'_>, node: usize, via: Option<usize>, edge: usize) -> f64 {
    let Some(via) = via else {
        return 0.0;
    };
    match (inflow_bearing(net, node, edge), outflow_bearing(net, node, via)) {
        (Some(inflow), Some(outflow)) => bearing_deviation_deg(inflow, outflow),
        _ => UNKNOWN_DEVIATION_DEG,
    }
}

/// Ranks `candidates` (upstream edge indices of `node`).
pub fn rank_candidates(
    net: &Network<'_>,
    node: usize,
    via: Option<usize>,
    candidates: &[usize],
) -> Ranking {
    let mut order: Vec<Candidate> = candidates
        .iter()
        .map(|&edge| {
            let e = &net.edges[edge];
            Candidate {
                edge,
                diameter_mm: e.diameter_mm,
                depth: net.depth[net.edge_from[edge]],
                created_ms: timestamp_millis(&e.created_at),
                deviation_deg: deviation_deg(net, node, via, edge),
            }
        })
        .collect();
    order.sort_by(|a, b| compare(net, a, b));
    let rule = deciding_rule(&order);
    Ranking { order, rule }
}

/// Report entry for a ranking decision.
pub fn diagnostic(
    net: &Network<'_>,
    node: usize,
    branch: &str,
    ranking: &Ranking,
    new_branches: Vec<String>,
) -> SplitDiagnostic {
    let candidates = ranking
        .order
        .iter()
        .map(|c| RankedCandidate {
            edge_id: net.edges[c.edge].id.clone(),
            diameter_mm: c.diameter_mm,
            depth: c.depth,
            created_at: net.edges[c.edge].created_at.clone(),
            deviation_deg: c.deviation_deg,
        })
        .collect();
    SplitDiagnostic {
        node_id: net.nodes[node].id.clone(),
        branch_id: branch.to_string(),
        main_edge_id: ranking
            .main_edge()
            .map(|e| net.edges[e].id.clone())
            .unwrap_or_default(),
        rule: ranking.rule.to_string(),
        new_branches,
        candidates,
    }
}
