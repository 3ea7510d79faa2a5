//! Per-edge path details, run-length encoded.
//!
//! During a path walk the engine presents each traversed edge once, in
//! order. An emitter derives one value per edge and reports whether that
//! value differs from the previous edge's, which lets the walk store a
//! detail only at transitions instead of per edge. Emitters carry their
//! "last seen" state explicitly and are constructed fresh per path.
//!
//! The set of detail kinds is closed: a factory keyed on the requested
//! detail names builds the emitters, and unknown names are an invalid
//! request, not a silent no-op.

use rustc_hash::FxHashMap;
use serde::Serialize;

use waylink_common::InvalidRequest;

use crate::edge_key::{decompose_edge_key, resolve_edge_key};
use crate::engine::{EdgeAttributeStore, EdgeId, EdgeState, NodeId};
use crate::stable_id::StableIdValues;

/// Stable edge ID of each traversed edge, in traversal direction.
pub const STABLE_EDGE_IDS: &str = "stable_edge_ids";
/// Combined (edge, direction) key of each traversed edge.
pub const EDGE_KEY: &str = "edge_key";
/// External-system edge reference: original edge index for virtual edges,
/// stable ID otherwise.
pub const EXTERNAL_EDGE_ID: &str = "external_edge_id";
/// Node each traversed edge leads into.
pub const ADJ_NODE: &str = "adj_node";

/// One detail value. Untagged so the JSON form is the bare string or number.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    Int(i64),
}

/// One run of identical detail values along a path, covering the traversed
/// edges `first..=last`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathDetail {
    pub value: DetailValue,
    pub first: usize,
    pub last: usize,
}

/// Read-only lookups an emitter may need while observing edges.
pub struct DetailContext<'a> {
    pub attributes: &'a dyn EdgeAttributeStore,
    pub stable_ids: &'a StableIdValues,
}

/// A per-path state machine producing one detail value per edge.
#[derive(Debug)]
pub enum PathDetailEmitter {
    StableEdgeIds { last: Option<String> },
    EdgeKey { last: Option<u64> },
    ExternalEdgeId { last: Option<String> },
    AdjNode { last_edge: Option<EdgeId>, adj: NodeId },
}

impl PathDetailEmitter {
    /// Build the emitter for one requested detail name.
    pub fn for_name(name: &str) -> Result<Self, InvalidRequest> {
        match name {
            STABLE_EDGE_IDS => Ok(Self::StableEdgeIds { last: None }),
            EDGE_KEY => Ok(Self::EdgeKey { last: None }),
            EXTERNAL_EDGE_ID => Ok(Self::ExternalEdgeId { last: None }),
            ADJ_NODE => Ok(Self::AdjNode { last_edge: None, adj: 0 }),
            other => Err(InvalidRequest::UnknownPathDetail(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::StableEdgeIds { .. } => STABLE_EDGE_IDS,
            Self::EdgeKey { .. } => EDGE_KEY,
            Self::ExternalEdgeId { .. } => EXTERNAL_EDGE_ID,
            Self::AdjNode { .. } => ADJ_NODE,
        }
    }

    /// Feed the next traversed edge. Returns true iff this edge's value
    /// differs from the previous edge's, updating the last-seen state.
    pub fn observe(&mut self, edge: &EdgeState, ctx: &DetailContext<'_>) -> bool {
        match self {
            Self::StableEdgeIds { last } => {
                let value = ctx.stable_ids.stable_id(ctx.attributes, edge);
                replace_if_changed(last, value)
            }
            Self::EdgeKey { last } => replace_if_changed(last, resolve_edge_key(edge)),
            Self::ExternalEdgeId { last } => {
                let value = external_edge_id(edge, ctx);
                replace_if_changed(last, value)
            }
            Self::AdjNode { last_edge, adj } => {
                if *last_edge == Some(edge.edge) {
                    false
                } else {
                    *last_edge = Some(edge.edge);
                    *adj = edge.adj_node;
                    true
                }
            }
        }
    }

    /// Value for the edge most recently passed to [`observe`](Self::observe).
    pub fn current_value(&self) -> DetailValue {
        match self {
            Self::StableEdgeIds { last } | Self::ExternalEdgeId { last } => {
                DetailValue::Text(last.clone().unwrap_or_default())
            }
            Self::EdgeKey { last } => DetailValue::Int(last.map_or(-1, |k| k as i64)),
            Self::AdjNode { adj, .. } => DetailValue::Int(i64::from(*adj)),
        }
    }
}

fn replace_if_changed<T: PartialEq>(last: &mut Option<T>, value: T) -> bool {
    if last.as_ref() == Some(&value) {
        false
    } else {
        *last = Some(value);
        true
    }
}

/// A virtual edge is referenced by the index of the stored edge it was split
/// from; a stored edge by its stable ID. The plain-edge-index fallback some
/// callers used historically for stored edges is intentionally not offered.
fn external_edge_id(edge: &EdgeState, ctx: &DetailContext<'_>) -> String {
    match edge.original_edge_key {
        Some(original) => decompose_edge_key(original).0.to_string(),
        None => ctx.stable_ids.stable_id(ctx.attributes, edge),
    }
}

/// Build emitters for every requested detail name.
pub fn emitters_for(names: &[String]) -> Result<Vec<PathDetailEmitter>, InvalidRequest> {
    names.iter().map(|n| PathDetailEmitter::for_name(n)).collect()
}

/// Drive the emitters over a path's edge sequence, producing run-length
/// encoded details keyed by detail name.
pub fn walk_path(
    edges: &[EdgeState],
    emitters: &mut [PathDetailEmitter],
    ctx: &DetailContext<'_>,
) -> FxHashMap<&'static str, Vec<PathDetail>> {
    let mut details: FxHashMap<&'static str, Vec<PathDetail>> = FxHashMap::default();
    for emitter in emitters.iter() {
        details.insert(emitter.name(), Vec::new());
    }

    for (index, edge) in edges.iter().enumerate() {
        for emitter in emitters.iter_mut() {
            let runs = details.entry(emitter.name()).or_default();
            if emitter.observe(edge, ctx) {
                runs.push(PathDetail {
                    value: emitter.current_value(),
                    first: index,
                    last: index,
                });
            } else if let Some(run) = runs.last_mut() {
                run.last = index;
            }
        }
    }
    details
}

/// Flatten the textual values of one detail's runs, in path order.
pub fn text_values(runs: &[PathDetail]) -> Vec<String> {
    runs.iter()
        .filter_map(|run| match &run.value {
            DetailValue::Text(s) => Some(s.clone()),
            DetailValue::Int(_) => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::memory::VecAttributeStore;
    use crate::engine::RoadClass;
    use crate::stable_id::{calculate_stable_edge_id, stable_id_string};

    fn edge(index: EdgeId, reverse: bool, adj: NodeId) -> EdgeState {
        EdgeState {
            edge: index,
            reverse,
            base_node: 0,
            adj_node: adj,
            road_class: RoadClass::Residential,
            original_edge_key: None,
        }
    }

    fn virtual_edge(index: EdgeId, original_edge: EdgeId) -> EdgeState {
        EdgeState {
            original_edge_key: Some(crate::edge_key::edge_key(original_edge, false)),
            ..edge(index, false, 0)
        }
    }

    /// Store with stable IDs assigned for `n` edges at synthetic coordinates.
    fn store_with_ids(n: EdgeId) -> (VecAttributeStore, StableIdValues) {
        let mut store = VecAttributeStore::new(n as usize);
        let values = StableIdValues::create(&mut store);
        for e in 0..n {
            let lat = 38.0 + f64::from(e) * 0.001;
            let fwd = calculate_stable_edge_id(RoadClass::Residential, lat, -94.0, lat, -94.001);
            let rev = calculate_stable_edge_id(RoadClass::Residential, lat, -94.001, lat, -94.0);
            values.set_stable_id(&mut store, e, false, fwd);
            values.set_stable_id(&mut store, e, true, rev);
        }
        (store, values)
    }

    #[test]
    fn unknown_detail_name_is_invalid_request() {
        let err = PathDetailEmitter::for_name("no_such_detail").unwrap_err();
        assert_eq!(err, InvalidRequest::UnknownPathDetail("no_such_detail".into()));
    }

    #[test]
    fn edge_key_runs_collapse_repeats() {
        let (store, values) = store_with_ids(4);
        let ctx = DetailContext { attributes: &store, stable_ids: &values };
        let path = [edge(0, false, 1), edge(0, false, 1), edge(1, true, 2), edge(2, false, 3)];

        let mut emitters = emitters_for(&[EDGE_KEY.to_string()]).unwrap();
        let details = walk_path(&path, &mut emitters, &ctx);
        let runs = &details[EDGE_KEY];

        assert_eq!(runs.len(), 3);
        assert_eq!(runs[0], PathDetail { value: DetailValue::Int(0), first: 0, last: 1 });
        assert_eq!(runs[1], PathDetail { value: DetailValue::Int(3), first: 2, last: 2 });
        assert_eq!(runs[2], PathDetail { value: DetailValue::Int(4), first: 3, last: 3 });
    }

    #[test]
    fn stable_id_emitter_follows_traversal_direction() {
        let (store, values) = store_with_ids(2);
        let ctx = DetailContext { attributes: &store, stable_ids: &values };
        let path = [edge(0, false, 1), edge(0, true, 0)];

        let mut emitters = emitters_for(&[STABLE_EDGE_IDS.to_string()]).unwrap();
        let details = walk_path(&path, &mut emitters, &ctx);
        let ids = text_values(&details[STABLE_EDGE_IDS]);

        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(ids[0], values.stable_id(&store, &edge(0, false, 1)));
    }

    #[test]
    fn external_id_prefers_original_edge_for_virtual_edges() {
        let (store, values) = store_with_ids(2);
        let ctx = DetailContext { attributes: &store, stable_ids: &values };
        let path = [virtual_edge(900, 1), edge(1, false, 2)];

        let mut emitters = emitters_for(&[EXTERNAL_EDGE_ID.to_string()]).unwrap();
        let details = walk_path(&path, &mut emitters, &ctx);
        let ids = text_values(&details[EXTERNAL_EDGE_ID]);

        assert_eq!(ids[0], "1");
        // Stored edge falls back to its stable ID, not its index.
        let expected = values.stable_id(&store, &edge(1, false, 2));
        assert_eq!(ids[1], expected);
        assert_eq!(expected.parse::<u64>().unwrap().to_string(), expected);
    }

    #[test]
    fn adj_node_tracks_edge_transitions() {
        let (store, values) = store_with_ids(3);
        let ctx = DetailContext { attributes: &store, stable_ids: &values };
        let path = [edge(0, false, 7), edge(0, false, 7), edge(2, false, 9)];

        let mut emitters = emitters_for(&[ADJ_NODE.to_string()]).unwrap();
        let details = walk_path(&path, &mut emitters, &ctx);
        let runs = &details[ADJ_NODE];

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].value, DetailValue::Int(7));
        assert_eq!(runs[1].value, DetailValue::Int(9));
    }

    #[test]
    fn serializes_to_bare_json_values() {
        let run = PathDetail { value: DetailValue::Text("42".into()), first: 0, last: 3 };
        let json = serde_json::to_string(&run).unwrap();
        assert_eq!(json, r#"{"value":"42","first":0,"last":3}"#);
    }
}
