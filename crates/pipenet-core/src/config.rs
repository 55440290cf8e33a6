//! Tunables for a sanitize pass.
//!
//! Reads overrides from environment variables:
//! - `PIPENET_STRICT`: reject transient UI fields instead of stripping them
//! - `PIPENET_OFFSET_TOLERANCE_M`: anchor overshoot clamped silently (default: 0.5)
//! - `PIPENET_REJECT_CYCLES`: fail on flow cycles instead of reporting them

use serde::{Deserialize, Serialize};

/// Default overshoot, in metres, for an anchor offset past its edge's end.
pub const DEFAULT_OFFSET_TOLERANCE_M: f64 = 0.5;

/// Options controlling a [`crate::Sanitizer`] run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeOptions {
    /// Reject payloads carrying transient UI fields.
    pub strict: bool,
    /// Anchor offsets past the edge length by at most this much are clamped.
    pub offset_tolerance_m: f64,
    /// Bounded retries when disambiguating a renamed node id.
    pub node_rename_attempts: usize,
    /// Bounded re-rolls when minting an edge id.
    pub edge_id_attempts: usize,
    /// Turn flow cycles into a hard error.
    pub reject_cycles: bool,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        SanitizeOptions {
            strict: false,
            offset_tolerance_m: DEFAULT_OFFSET_TOLERANCE_M,
            node_rename_attempts: 50,
            edge_id_attempts: 5,
            reject_cycles: false,
        }
    }
}

impl SanitizeOptions {
    /// Defaults overridden by `PIPENET_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`SanitizeOptions::from_env`] with an injectable variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut options = SanitizeOptions::default();
        if let Some(value) = lookup("PIPENET_STRICT") {
            match parse_flag(&value) {
                Some(flag) => options.strict = flag,
                None => tracing::warn!(value = %value, "ignoring invalid PIPENET_STRICT"),
            }
        }
        if let Some(value) = lookup("PIPENET_REJECT_CYCLES") {
            match parse_flag(&value) {
                Some(flag) => options.reject_cycles = flag,
                None => tracing::warn!(value = %value, "ignoring invalid PIPENET_REJECT_CYCLES"),
            }
        }
        if let Some(value) = lookup("PIPENET_OFFSET_TOLERANCE_M") {
            match value.trim().parse::<f64>() {
                Ok(tol) if tol.is_finite() && tol >= 0.0 => options.offset_tolerance_m = tol,
                _ => tracing::warn!(value = %value, "ignoring invalid PIPENET_OFFSET_TOLERANCE_M"),
            }
        }
        options
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
