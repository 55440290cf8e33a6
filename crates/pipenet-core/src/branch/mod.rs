//! Branch assignment engine.
//!
//! Walks the network from every trunk source (`GENERAL` node) against the
//! stored edge direction, i.e. from outlet toward inlet, and gives every
//! edge and node a branch id. Pass-through nodes hand their branch to every
//! upstream edge; splitters keep it on the edge ranked first by
//! [`rank::rank_candidates`] and mint a child branch `{parent}:{nnn}` for
//! each other upstream edge.
//!
//! Traversal is breadth-first with explicit ordering everywhere (roots by
//! id, upstream edges by id), so the outcome depends only on the input.
//! The first branch to reach an edge or node keeps it; later arrivals are
//! recorded as conflicts and not propagated, which bounds the walk to one
//! visit per edge.

pub mod rank;

use std::collections::{BTreeMap, HashMap, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use smallvec::SmallVec;
use tracing::{debug, trace, warn};

use crate::error::ValidationError;
use crate::geometry::Point;
use crate::model::{Edge, Node, NodeType};
use crate::report::{BranchChange, SplitDiagnostic};

/// Incident-edge count from which an ordinary node divides flow.
pub const SPLIT_DEGREE: usize = 3;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Index-based view of a validated graph.
///
/// Petgraph node `i` is `nodes[i]` and petgraph edges carry the index of
/// the model edge they stand for, pointing `from_id -> to_id`.
pub struct Network<'a> {
    pub nodes: &'a [Node],
    pub edges: &'a [Edge],
    pub graph: DiGraph<usize, usize>,
    pub edge_from: Vec<usize>,
    pub edge_to: Vec<usize>,
    /// Edges whose `to_id` is the node, sorted by edge id.
    pub upstream: Vec<SmallVec<[usize; 2]>>,
    pub incident: Vec<usize>,
    /// 1 + max depth of the upstream neighbours; 0 for leaves.
    pub depth: Vec<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    Visiting,
    Done,
}

impl<'a> Network<'a> {
    pub fn build(nodes: &'a [Node], edges: &'a [Edge]) -> Result<Self, ValidationError> {
        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut index_of: HashMap<&str, NodeIndex> = HashMap::with_capacity(nodes.len());
        for (i, node) in nodes.iter().enumerate() {
            let idx = graph.add_node(i);
            index_of.entry(node.id.as_str()).or_insert(idx);
        }

        let resolve = |edge: &Edge, id: &str| {
            index_of
                .get(id)
                .copied()
                .ok_or_else(|| ValidationError::EdgeEndpointMissing {
                    edge: edge.id.clone(),
                    node: id.to_string(),
                })
        };

        let mut edge_from = Vec::with_capacity(edges.len());
        let mut edge_to = Vec::with_capacity(edges.len());
        let mut incident = vec![0; nodes.len()];
        for (i, edge) in edges.iter().enumerate() {
            let from = resolve(edge, &edge.from_id)?;
            let to = resolve(edge, &edge.to_id)?;
            graph.add_edge(from, to, i);
            edge_from.push(from.index());
            edge_to.push(to.index());
            incident[from.index()] += 1;
            incident[to.index()] += 1;
        }

        let upstream = (0..nodes.len())
            .map(|n| {
                let mut list: SmallVec<[usize; 2]> = graph
                    .edges_directed(NodeIndex::new(n), Direction::Incoming)
                    .map(|e| *e.weight())
                    .collect();
                list.sort_by(|a, b| edges[*a].id.cmp(&edges[*b].id).then(a.cmp(b)));
                list
            })
            .collect();

        let mut net = Network {
            nodes,
            edges,
            graph,
            edge_from,
            edge_to,
            upstream,
            incident,
            depth: Vec::new(),
        };
        net.depth = net.compute_depths();
        Ok(net)
    }

    pub fn position(&self, node: usize) -> Point {
        self.nodes[node].position()
    }

    /// Iterative post-order depth computation.
    ///
    /// A node still on the stack contributes depth 0, which breaks cycles.
    fn compute_depths(&self) -> Vec<usize> {
        let n = self.nodes.len();
        let mut depth = vec![0; n];
        let mut mark = vec![Mark::Unvisited; n];

        for start in 0..n {
            if mark[start] != Mark::Unvisited {
                continue;
            }
            mark[start] = Mark::Visiting;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            while let Some(&(node, cursor)) = stack.last() {
                if let Some(&edge) = self.upstream[node].get(cursor) {
                    let top = stack.len() - 1;
                    stack[top].1 += 1;
                    let child = self.edge_from[edge];
                    if mark[child] == Mark::Unvisited {
                        mark[child] = Mark::Visiting;
                        stack.push((child, 0));
                    }
                    continue;
                }
                let deepest = self.upstream[node]
                    .iter()
                    .map(|&edge| {
                        let child = self.edge_from[edge];
                        if mark[child] == Mark::Done {
                            depth[child]
                        } else {
                            0
                        }
                    })
                    .max();
                depth[node] = deepest.map_or(0, |d| d + 1);
                mark[node] = Mark::Done;
                stack.pop();
            }
        }
        depth
    }

    /// Node-id lists of every flow cycle, each sorted, in sorted order.
    pub fn cycles(&self) -> Vec<Vec<String>> {
        let mut cycles: Vec<Vec<String>> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| {
                component.len() > 1
                    || component
                        .first()
                        .is_some_and(|&n| self.graph.find_edge(n, n).is_some())
            })
            .map(|component| {
                let mut ids: Vec<String> = component
                    .iter()
                    .map(|&n| self.nodes[self.graph[n]].id.clone())
                    .collect();
                ids.sort();
                ids
            })
            .collect();
        cycles.sort();
        cycles
    }

    fn is_splitter(&self, node: usize) -> bool {
        self.nodes[node].node_type == NodeType::Jonction || self.incident[node] >= SPLIT_DEGREE
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// A branch discovered during traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRecord {
    pub id: String,
    pub parent_id: Option<String>,
    pub is_trunk: bool,
}

/// Result of [`assign_branches`]; vectors are indexed like the input.
#[derive(Debug, Clone, Default)]
pub struct BranchAssignment {
    pub edge_branches: Vec<String>,
    pub node_branches: Vec<String>,
    /// Every branch in use, sorted by id.
    pub branches: Vec<BranchRecord>,
    pub changes: Vec<BranchChange>,
    pub diagnostics: Vec<SplitDiagnostic>,
    pub conflicts: Vec<String>,
}

struct Visit {
    node: usize,
    branch: String,
    /// Edge the traversal arrived through; `None` at a root.
    via: Option<usize>,
}

struct Engine<'n, 'a> {
    net: &'n Network<'a>,
    edge_branch: Vec<Option<String>>,
    edge_reason: Vec<&'static str>,
    node_branch: Vec<Option<String>>,
    registry: BTreeMap<String, BranchRecord>,
    counters: HashMap<String, usize>,
    queue: VecDeque<Visit>,
    diagnostics: Vec<SplitDiagnostic>,
    conflicts: Vec<String>,
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

impl<'n, 'a> Engine<'n, 'a> {
    fn new(net: &'n Network<'a>) -> Self {
        Engine {
            net,
            edge_branch: vec![None; net.edges.len()],
            edge_reason: vec![""; net.edges.len()],
            node_branch: vec![None; net.nodes.len()],
            registry: BTreeMap::new(),
            counters: HashMap::new(),
            queue: VecDeque::new(),
            diagnostics: Vec::new(),
            conflicts: Vec::new(),
        }
    }

    fn register(&mut self, id: &str, parent_id: Option<&str>, is_trunk: bool) {
        self.registry
            .entry(id.to_string())
            .or_insert_with(|| BranchRecord {
                id: id.to_string(),
                parent_id: parent_id.map(str::to_string),
                is_trunk,
            });
    }

    /// Next free `{parent}:{nnn}` child id.
    fn mint_child(&mut self, parent: &str) -> String {
        let counter = self.counters.entry(parent.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let child = format!("{parent}:{:03}", *counter);
            if !self.registry.contains_key(&child) {
                self.registry.insert(
                    child.clone(),
                    BranchRecord {
                        id: child.clone(),
                        parent_id: Some(parent.to_string()),
                        is_trunk: false,
                    },
                );
                return child;
            }
        }
    }

    fn assign_edge(&mut self, edge: usize, branch: &str, reason: &'static str) {
        match &self.edge_branch[edge] {
            Some(existing) if existing == branch => return,
            Some(existing) => {
                let note = format!(
                    "edge {} claimed by branch {existing}; ignoring {branch}",
                    self.net.edges[edge].id
                );
                warn!("{note}");
                self.conflicts.push(note);
                return;
            }
            None => {}
        }
        self.edge_branch[edge] = Some(branch.to_string());
        self.edge_reason[edge] = reason;
        self.queue.push_back(Visit {
            node: self.net.edge_from[edge],
            branch: branch.to_string(),
            via: Some(edge),
        });
    }

    fn drain(&mut self) {
        while let Some(visit) = self.queue.pop_front() {
            self.visit(visit);
        }
    }

    fn visit(&mut self, visit: Visit) {
        let net = self.net;
        let node = &net.nodes[visit.node];
        match &self.node_branch[visit.node] {
            Some(existing) if *existing == visit.branch => return,
            Some(existing) => {
                let note = format!(
                    "node {} reached by branches {existing} and {}; keeping {existing}",
                    node.id, visit.branch
                );
                warn!("{note}");
                self.conflicts.push(note);
                return;
            }
            None => {
                if visit.via.is_none() {
                    self.register(&visit.branch, None, true);
                }
                self.node_branch[visit.node] = Some(visit.branch.clone());
            }
        }

        let candidates = &net.upstream[visit.node];
        if candidates.is_empty() {
            return;
        }

        let is_root = visit.via.is_none() && node.node_type == NodeType::General;
        if !is_root && (node.node_type.is_pass_through() || !net.is_splitter(visit.node)) {
            for &edge in candidates {
                self.assign_edge(edge, &visit.branch, "pass_through");
            }
            return;
        }

        let ranking = rank::rank_candidates(net, visit.node, visit.via, candidates);
        trace!(node = %node.id, rule = ranking.rule, "ranked upstream edges");
        let mut new_branches = Vec::new();
        for (position, candidate) in ranking.order.iter().enumerate() {
            if position == 0 {
                self.assign_edge(candidate.edge, &visit.branch, ranking.rule);
            } else if self.edge_branch[candidate.edge].is_none() {
                let child = self.mint_child(&visit.branch);
                self.assign_edge(candidate.edge, &child, "split_new_branch");
                new_branches.push(child);
            } else {
                self.assign_edge(candidate.edge, &visit.branch, "split_new_branch");
            }
        }
        self.diagnostics.push(rank::diagnostic(
            net,
            visit.node,
            &visit.branch,
            &ranking,
            new_branches,
        ));
    }

    fn run_roots(&mut self) {
        let net = self.net;
        let mut roots: Vec<usize> = (0..net.nodes.len())
            .filter(|&n| net.nodes[n].node_type == NodeType::General)
            .collect();
        roots.sort_by(|a, b| net.nodes[*a].id.cmp(&net.nodes[*b].id));

        // A root already claimed by an earlier trunk keeps that branch and
        // never registers its own base.
        for root in roots {
            let node = &net.nodes[root];
            let base = non_empty(&node.branch_id).unwrap_or(&node.id).to_string();
            debug!(root = %node.id, branch = %base, "walking from trunk source");
            self.queue.push_back(Visit {
                node: root,
                branch: base,
                via: None,
            });
            self.drain();
        }
    }

    /// Gives every edge no trunk reached its own id as branch.
    fn run_fallback(&mut self) {
        let net = self.net;
        let mut pending: Vec<usize> = (0..net.edges.len())
            .filter(|&e| self.edge_branch[e].is_none())
            .collect();
        pending.sort_by(|a, b| net.edges[*a].id.cmp(&net.edges[*b].id).then(a.cmp(b)));

        for edge in pending {
            if self.edge_branch[edge].is_some() {
                continue;
            }
            let id = &net.edges[edge].id;
            let note = format!("edge {id} unreachable from any trunk source; using its id as branch");
            warn!("{note}");
            self.conflicts.push(note);

            self.register(id, None, false);
            self.edge_branch[edge] = Some(id.clone());
            self.edge_reason[edge] = "fallback";
            let downstream = net.edge_to[edge];
            if self.node_branch[downstream].is_none() {
                self.node_branch[downstream] = Some(id.clone());
            }
            let upstream = net.edge_from[edge];
            if self.node_branch[upstream].is_none() {
                self.queue.push_back(Visit {
                    node: upstream,
                    branch: id.clone(),
                    via: Some(edge),
                });
                self.drain();
            }
        }
    }

    fn finish(mut self) -> BranchAssignment {
        let net = self.net;
        let edge_branches: Vec<String> = self
            .edge_branch
            .iter()
            .enumerate()
            .map(|(i, b)| b.clone().unwrap_or_else(|| net.edges[i].id.clone()))
            .collect();

        let node_branches: Vec<String> = self
            .node_branch
            .iter()
            .enumerate()
            .map(|(i, b)| {
                let node = &net.nodes[i];
                b.clone()
                    .or_else(|| non_empty(&node.branch_id).map(str::to_string))
                    .unwrap_or_else(|| node.id.clone())
            })
            .collect();

        for branch in edge_branches.iter().chain(node_branches.iter()) {
            self.register(branch, None, false);
        }

        let changes = net
            .edges
            .iter()
            .zip(&edge_branches)
            .zip(&self.edge_reason)
            .filter(|((edge, current), _)| edge.branch_id.trim() != current.as_str())
            .map(|((edge, current), reason)| BranchChange {
                edge_id: edge.id.clone(),
                previous: non_empty(&edge.branch_id).map(str::to_string),
                current: current.clone(),
                reason: reason.to_string(),
            })
            .collect();

        BranchAssignment {
            edge_branches,
            node_branches,
            branches: self.registry.into_values().collect(),
            changes,
            diagnostics: self.diagnostics,
            conflicts: self.conflicts,
        }
    }
}

/// Assigns a branch to every edge and node.
///
/// `edges[i].branch_id` and `nodes[i].branch_id` are the provisional
/// labels; the former feed `changes`, the latter seed trunk sources and
/// unreached nodes. With `reject_cycles` any flow cycle is an error,
/// otherwise each is reported as a conflict.
pub fn assign_branches(
    nodes: &[Node],
    edges: &[Edge],
    reject_cycles: bool,
) -> Result<BranchAssignment, ValidationError> {
    let net = Network::build(nodes, edges)?;

    let cycles = net.cycles();
    if reject_cycles {
        if let Some(cycle) = cycles.first() {
            return Err(ValidationError::FlowCycle {
                nodes: cycle.clone(),
            });
        }
    }

    let mut engine = Engine::new(&net);
    for cycle in &cycles {
        let note = format!("flow cycle through nodes: {}", cycle.join(" -> "));
        warn!("{note}");
        engine.conflicts.push(note);
    }

    engine.run_roots();
    engine.run_fallback();
    let assignment = engine.finish();
    debug!(
        branches = assignment.branches.len(),
        changes = assignment.changes.len(),
        conflicts = assignment.conflicts.len(),
        "branch assignment complete"
    );
    Ok(assignment)
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::model::{Edge, Extras, Node, NodeType};

    pub fn node(id: &str, node_type: NodeType, lon: f64, lat: f64) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            name: String::new(),
            branch_id: String::new(),
            diameter_mm: None,
            material: None,
            gps_lat: lat,
            gps_lon: lon,
            x: None,
            y: None,
            gps_locked: true,
            pos_index: None,
            anchor: None,
            extras: Extras::new(),
        }
    }

    pub fn edge(id: &str, from: &str, to: &str, diameter_mm: f64, created_at: &str) -> Edge {
        Edge {
            id: id.to_string(),
            from_id: from.to_string(),
            to_id: to.to_string(),
            branch_id: "PROVISIONAL".to_string(),
            diameter_mm,
            length_m: 1.0,
            geometry: Vec::new(),
            created_at: created_at.to_string(),
            material: None,
            sdr: None,
            slope_pct: None,
            site_id: None,
            active: true,
            commentaire: String::new(),
            extras: Extras::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{edge, node};
    use super::*;

    const T0: &str = "2024-01-01T00:00:00Z";
    const T1: &str = "2024-01-02T00:00:00Z";

    fn branch_of<'x>(result: &'x BranchAssignment, edges: &[Edge], id: &str) -> &'x str {
        let idx = edges.iter().position(|e| e.id == id).unwrap();
        &result.edge_branches[idx]
    }

    /// G <- J <- {A (160), B (90)}; A has one more well upstream.
    fn split_graph() -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("JONCTION-1", NodeType::Jonction, 0.0, 0.001),
            node("OUVRAGE-A", NodeType::Ouvrage, -0.001, 0.002),
            node("OUVRAGE-B", NodeType::Ouvrage, 0.001, 0.002),
            node("OUVRAGE-C", NodeType::Ouvrage, -0.002, 0.003),
        ];
        nodes[0].branch_id = "TRUNK".to_string();
        let edges = vec![
            edge("E-01", "JONCTION-1", "GENERAL-1", 200.0, T0),
            edge("E-02", "OUVRAGE-A", "JONCTION-1", 160.0, T0),
            edge("E-03", "OUVRAGE-B", "JONCTION-1", 90.0, T0),
            edge("E-04", "OUVRAGE-C", "OUVRAGE-A", 160.0, T0),
        ];
        (nodes, edges)
    }

    #[test]
    fn depth_counts_upstream_levels() {
        let (nodes, edges) = split_graph();
        let net = Network::build(&nodes, &edges).unwrap();
        assert_eq!(net.depth, vec![3, 2, 1, 0, 0]);
    }

    #[test]
    fn larger_diameter_keeps_parent_branch() {
        let (nodes, edges) = split_graph();
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert_eq!(branch_of(&result, &edges, "E-01"), "TRUNK");
        assert_eq!(branch_of(&result, &edges, "E-02"), "TRUNK");
        assert_eq!(branch_of(&result, &edges, "E-03"), "TRUNK:001");
        assert_eq!(branch_of(&result, &edges, "E-04"), "TRUNK");
        assert_eq!(result.node_branches[3], "TRUNK:001");

        let child = result.branches.iter().find(|b| b.id == "TRUNK:001").unwrap();
        assert_eq!(child.parent_id.as_deref(), Some("TRUNK"));
        let trunk = result.branches.iter().find(|b| b.id == "TRUNK").unwrap();
        assert!(trunk.is_trunk);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn diagnostics_name_the_rule() {
        let (nodes, edges) = split_graph();
        let result = assign_branches(&nodes, &edges, false).unwrap();
        let at_junction = result
            .diagnostics
            .iter()
            .find(|d| d.node_id == "JONCTION-1")
            .unwrap();
        assert_eq!(at_junction.main_edge_id, "E-02");
        assert_eq!(at_junction.rule, "diameter");
        assert_eq!(at_junction.new_branches, vec!["TRUNK:001".to_string()]);

        let at_root = result.diagnostics.iter().find(|d| d.node_id == "GENERAL-1").unwrap();
        assert_eq!(at_root.rule, "single_outlet");
    }

    #[test]
    fn deeper_subtree_wins_over_creation_time() {
        let (nodes, mut edges) = split_graph();
        edges[1].diameter_mm = 90.0;
        edges[1].created_at = T1.to_string();
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert_eq!(branch_of(&result, &edges, "E-02"), "TRUNK");
        assert_eq!(branch_of(&result, &edges, "E-03"), "TRUNK:001");
        let diag = result.diagnostics.iter().find(|d| d.node_id == "JONCTION-1").unwrap();
        assert_eq!(diag.rule, "depth");
    }

    #[test]
    fn changes_report_relabelled_edges() {
        let (nodes, edges) = split_graph();
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert_eq!(result.changes.len(), 4);
        let change = result.changes.iter().find(|c| c.edge_id == "E-03").unwrap();
        assert_eq!(change.previous.as_deref(), Some("PROVISIONAL"));
        assert_eq!(change.current, "TRUNK:001");
        assert_eq!(change.reason, "split_new_branch");
    }

    #[test]
    fn pass_through_types_never_split() {
        let nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("VANNE-1", NodeType::Vanne, 0.0, 0.001),
            node("OUVRAGE-A", NodeType::Ouvrage, -0.001, 0.002),
            node("OUVRAGE-B", NodeType::Ouvrage, 0.001, 0.002),
        ];
        let edges = vec![
            edge("E-01", "VANNE-1", "GENERAL-1", 100.0, T0),
            edge("E-02", "OUVRAGE-A", "VANNE-1", 160.0, T0),
            edge("E-03", "OUVRAGE-B", "VANNE-1", 90.0, T0),
        ];
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert!(result.edge_branches.iter().all(|b| b == "GENERAL-1"));
        assert_eq!(result.branches.len(), 1);
    }

    #[test]
    fn unreachable_edges_fall_back_to_their_id() {
        let nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("OUVRAGE-A", NodeType::Ouvrage, 0.0, 0.001),
            node("OUVRAGE-X", NodeType::Ouvrage, 1.0, 1.0),
            node("OUVRAGE-Y", NodeType::Ouvrage, 1.0, 1.001),
            node("OUVRAGE-Z", NodeType::Ouvrage, 1.0, 1.002),
        ];
        let edges = vec![
            edge("E-01", "OUVRAGE-A", "GENERAL-1", 100.0, T0),
            edge("E-09", "OUVRAGE-Y", "OUVRAGE-X", 100.0, T0),
            edge("E-10", "OUVRAGE-Z", "OUVRAGE-Y", 100.0, T0),
        ];
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert_eq!(result.edge_branches, vec!["GENERAL-1", "E-09", "E-09"]);
        assert_eq!(result.node_branches[2], "E-09");
        assert_eq!(result.node_branches[4], "E-09");
        assert_eq!(result.conflicts.len(), 1);
        assert!(result.conflicts[0].contains("unreachable"));
        let reason = result.changes.iter().find(|c| c.edge_id == "E-09").unwrap();
        assert_eq!(reason.reason, "fallback");
    }

    #[test]
    fn isolated_nodes_keep_prior_or_own_id() {
        let mut nodes = vec![
            node("OUVRAGE-A", NodeType::Ouvrage, 0.0, 0.0),
            node("OUVRAGE-B", NodeType::Ouvrage, 1.0, 1.0),
        ];
        nodes[1].branch_id = "OLD".to_string();
        let result = assign_branches(&nodes, &[], false).unwrap();
        assert_eq!(result.node_branches, vec!["OUVRAGE-A", "OLD"]);
    }

    #[test]
    fn reconvergence_keeps_first_branch() {
        // Two outlets feed from the same upstream well.
        let nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("GENERAL-2", NodeType::General, 0.002, 0.0),
            node("OUVRAGE-W", NodeType::Ouvrage, 0.001, 0.001),
        ];
        let edges = vec![
            edge("E-01", "OUVRAGE-W", "GENERAL-1", 100.0, T0),
            edge("E-02", "OUVRAGE-W", "GENERAL-2", 100.0, T0),
        ];
        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert_eq!(result.node_branches[2], "GENERAL-1");
        assert_eq!(result.edge_branches[1], "GENERAL-2");
        assert!(result.conflicts.iter().any(|c| c.contains("OUVRAGE-W")));
    }

    #[test]
    fn trunk_reached_from_another_trunk_registers_nothing() {
        let nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("GENERAL-2", NodeType::General, 0.0, 0.001),
        ];
        let edges = vec![edge("E-01", "GENERAL-2", "GENERAL-1", 100.0, T0)];
        let result = assign_branches(&nodes, &edges, false).unwrap();
        let ids: Vec<&str> = result.branches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["GENERAL-1"]);
        assert!(result.branches[0].is_trunk);
        assert_eq!(result.node_branches, vec!["GENERAL-1", "GENERAL-1"]);
    }

    #[test]
    fn cycles_are_reported_or_rejected() {
        let nodes = vec![
            node("GENERAL-1", NodeType::General, 0.0, 0.0),
            node("OUVRAGE-A", NodeType::Ouvrage, 0.0, 0.001),
            node("OUVRAGE-B", NodeType::Ouvrage, 0.0, 0.002),
        ];
        let edges = vec![
            edge("E-01", "OUVRAGE-A", "GENERAL-1", 100.0, T0),
            edge("E-02", "OUVRAGE-B", "OUVRAGE-A", 100.0, T0),
            edge("E-03", "OUVRAGE-A", "OUVRAGE-B", 100.0, T0),
        ];
        let net = Network::build(&nodes, &edges).unwrap();
        assert_eq!(net.cycles(), vec![vec!["OUVRAGE-A".to_string(), "OUVRAGE-B".to_string()]]);

        let result = assign_branches(&nodes, &edges, false).unwrap();
        assert!(result.edge_branches.iter().all(|b| b == "GENERAL-1"));
        assert!(result.conflicts[0].starts_with("flow cycle"));

        let err = assign_branches(&nodes, &edges, true).unwrap_err();
        assert_eq!(err.code(), crate::ErrorCode::FlowCycle);
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let nodes = vec![node("GENERAL-1", NodeType::General, 0.0, 0.0)];
        let edges = vec![edge("E-01", "OUVRAGE-404", "GENERAL-1", 100.0, T0)];
        let err = Network::build(&nodes, &edges).err().unwrap();
        assert_eq!(err.code(), crate::ErrorCode::EdgeEndpointMissing);
    }
}
