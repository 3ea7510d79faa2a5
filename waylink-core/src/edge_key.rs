//! Combined (edge, direction) keys.
//!
//! An edge key packs a directed edge into one non-negative integer:
//! `edge * 2` for the forward traversal, `edge * 2 + 1` for the reverse.
//! The mapping is a bijection for stored edges; virtual edges created by
//! query-time graph splitting resolve to the key of the stored edge they
//! were split from, so the same real-world segment yields the same key no
//! matter where a route snapped onto it. Keys of virtual edges are only
//! meaningful within a single query.

use crate::engine::{EdgeId, EdgeState};

/// Combine an edge index and a traversal direction into one key.
pub fn edge_key(edge: EdgeId, reverse: bool) -> u64 {
    u64::from(edge) * 2 + u64::from(reverse)
}

/// Split a key back into (edge index, reverse flag). Inverse of
/// [`edge_key`] for all stored edges.
pub fn decompose_edge_key(key: u64) -> (EdgeId, bool) {
    ((key / 2) as EdgeId, key % 2 == 1)
}

/// Resolve the key for an edge encountered during a path walk.
///
/// For a virtual edge this takes the edge *index* from the original edge's
/// key but keeps the traversal direction of the fragment itself; an edge
/// state without an original-edge relation is treated as a stored edge.
pub fn resolve_edge_key(edge: &EdgeState) -> u64 {
    let index = match edge.original_edge_key {
        Some(original) => decompose_edge_key(original).0,
        None => edge.edge,
    };
    edge_key(index, edge.reverse)
}
