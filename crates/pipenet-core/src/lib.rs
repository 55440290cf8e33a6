//! Sanitization and branch-assignment engine for pipe network graphs.
//!
//! The single entry point is [`sanitize`]: it takes a loosely-typed
//! [`RawGraph`] as submitted by a client and returns a canonical [`Graph`]
//! plus a [`SanitizeReport`], or a [`ValidationError`] when any invariant
//! fails. The pass never mutates the caller's graph.

pub mod anchor;
pub mod branch;
pub mod config;
pub mod error;
pub mod fields;
pub mod geometry;
pub mod ids;
pub mod model;
pub mod raw;
pub mod report;
pub mod sanitize;

// Re-export commonly used types
pub use config::SanitizeOptions;
pub use error::{EntityKind, ErrorCode, ValidationError};
pub use ids::{ClockIdSource, EdgeIdSource, SeededIdSource};
pub use model::{Branch, Crs, Edge, ExtraValue, Extras, Graph, Node, NodeType};
pub use raw::{RawEdge, RawGraph, RawNode};
pub use report::SanitizeReport;
pub use sanitize::{sanitize, Sanitized, Sanitizer};
