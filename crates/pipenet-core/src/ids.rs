//! Identifier normalization.
//!
//! Node ids follow a `{TYPE}-{suffix}` scheme where `TYPE` is the canonical
//! prefix of the node's type; [`align_node_ids`] rewrites ids that drift
//! from it. Edge ids follow an `E-{...}` scheme; missing or foreign ids are
//! replaced by ids drawn from an [`EdgeIdSource`] through an
//! [`EdgeIdAllocator`], which re-rolls on collision.

use std::collections::HashSet;

use chrono::Utc;
use indexmap::IndexMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::warn;

use crate::model::NodeType;

/// Prefix shared by every canonical edge id.
pub const EDGE_ID_PREFIX: &str = "E-";

/// Whether `id` already follows the canonical edge id scheme.
pub fn is_canonical_edge_id(id: &str) -> bool {
    id.len() > EDGE_ID_PREFIX.len() && id.starts_with(EDGE_ID_PREFIX)
}

// ---------------------------------------------------------------------------
// Edge id sources
// ---------------------------------------------------------------------------

/// Produces candidate edge ids. Collisions are handled by the caller.
pub trait EdgeIdSource: Send {
    fn next_edge_id(&mut self) -> String;
}

/// Wall-clock milliseconds (hex) followed by 24 random bits (hex).
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockIdSource;

impl EdgeIdSource for ClockIdSource {
    fn next_edge_id(&mut self) -> String {
        let millis = Utc::now().timestamp_millis().max(0);
        let noise: u32 = rand::thread_rng().gen_range(0..0x100_0000);
        format!("{EDGE_ID_PREFIX}{millis:X}{noise:06X}")
    }
}

/// Reproducible ids from a seeded ChaCha8 PRNG.
///
/// Two sources built from the same seed yield the same sequence.
#[derive(Debug, Clone)]
pub struct SeededIdSource {
    rng: ChaCha8Rng,
    counter: u64,
}

impl SeededIdSource {
    pub fn new(seed: u64) -> Self {
        SeededIdSource {
            rng: ChaCha8Rng::seed_from_u64(seed),
            counter: 0,
        }
    }
}

impl EdgeIdSource for SeededIdSource {
    fn next_edge_id(&mut self) -> String {
        self.counter += 1;
        let noise: u32 = self.rng.gen_range(0..0x100_0000);
        format!("{EDGE_ID_PREFIX}{:08X}{noise:06X}", self.counter)
    }
}

// ---------------------------------------------------------------------------
// Edge id allocation
// ---------------------------------------------------------------------------

/// Tracks kept edge ids and mints fresh ones that collide with nothing.
pub struct EdgeIdAllocator<'a> {
    source: &'a mut dyn EdgeIdSource,
    reserved: HashSet<String>,
    kept: HashSet<String>,
    attempts: usize,
}

impl<'a> EdgeIdAllocator<'a> {
    /// `reserved` holds ids minted ids must avoid (the node ids).
    pub fn new(
        source: &'a mut dyn EdgeIdSource,
        reserved: impl IntoIterator<Item = String>,
        attempts: usize,
    ) -> Self {
        EdgeIdAllocator {
            source,
            reserved: reserved.into_iter().collect(),
            kept: HashSet::new(),
            attempts: attempts.max(1),
        }
    }

    /// Whether an edge already kept this id.
    pub fn is_kept(&self, id: &str) -> bool {
        self.kept.contains(id)
    }

    /// Records `id` as kept. Returns false if it was already kept.
    pub fn keep(&mut self, id: &str) -> bool {
        self.kept.insert(id.to_string())
    }

    /// Mints and keeps a fresh id.
    ///
    /// Re-rolls up to the attempt bound; past it the last candidate is
    /// accepted and the final uniqueness check reports any residual clash.
    pub fn mint(&mut self) -> String {
        let mut candidate = self.source.next_edge_id();
        let mut rolls = 1;
        while self.kept.contains(&candidate) || self.reserved.contains(&candidate) {
            if rolls >= self.attempts {
                warn!(id = %candidate, rolls, "edge id re-rolls exhausted; keeping colliding id");
                break;
            }
            candidate = self.source.next_edge_id();
            rolls += 1;
        }
        self.kept.insert(candidate.clone());
        candidate
    }
}

// ---------------------------------------------------------------------------
// Node id alignment
// ---------------------------------------------------------------------------

/// Outcome of [`align_node_ids`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeIdAlignment {
    /// Final id of every input node, in input order.
    pub ids: Vec<String>,
    /// Old id to new id, in rename order.
    pub renames: IndexMap<String, String>,
}

/// Splits `id` into its type prefix and suffix at the first `-`.
///
/// An id without a dash is all suffix.
fn split_id(id: &str) -> (&str, &str) {
    match id.split_once('-') {
        Some((prefix, suffix)) => (prefix, suffix),
        None => ("", id),
    }
}

/// Rewrites every id whose prefix does not match its node type.
///
/// The replacement is `{TYPE}-{suffix}`; if taken, `{TYPE}-{suffix}_{n}`
/// for increasing `n`, up to `attempts` tries after which the colliding
/// candidate is accepted.
pub fn align_node_ids(nodes: &[(String, NodeType)], attempts: usize) -> NodeIdAlignment {
    let mut taken: HashSet<String> = nodes.iter().map(|(id, _)| id.clone()).collect();
    let mut alignment = NodeIdAlignment::default();

    for (id, node_type) in nodes {
        let expected = node_type.id_prefix();
        let (prefix, suffix) = split_id(id);
        if prefix == expected {
            alignment.ids.push(id.clone());
            continue;
        }

        let base = if suffix.is_empty() {
            expected.to_string()
        } else {
            format!("{expected}-{suffix}")
        };
        let mut candidate = base.clone();
        let mut attempt = 0;
        while taken.contains(&candidate) {
            if attempt >= attempts {
                warn!(node = %id, candidate = %candidate, "node rename retries exhausted");
                break;
            }
            attempt += 1;
            candidate = format!("{base}_{attempt}");
        }

        if candidate != *id {
            taken.remove(id);
            taken.insert(candidate.clone());
            alignment.renames.insert(id.clone(), candidate.clone());
        }
        alignment.ids.push(candidate);
    }

    alignment
}
