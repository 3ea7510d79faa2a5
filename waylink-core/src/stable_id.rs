//! Content-derived stable edge identifiers.
//!
//! A stable edge ID is an 8-byte fingerprint of what an edge *is* in the real
//! world — its coarse road class, its endpoints and its bearing — rather than
//! where it happens to sit in graph storage. Rebuilding the graph from fresh
//! map data reassigns every edge index, but leaves these fingerprints intact,
//! so external systems can keep referencing "edge X" across rebuilds.
//!
//! The canonical string hashed here is an interoperability contract: field
//! order, the `Reference` prefix and the fixed six-decimal coordinate
//! formatting must not change, or every persisted ID changes with them.

use xxhash_rust::xxh3::xxh3_64;

use crate::engine::{
    AttributeHandle, EdgeAttributeStore, EdgeId, EdgeState, RoadClass, RoutingEngine,
};
use crate::geo::rounded_azimuth;

/// Bucket a road class into a coarse "form of way", based off of shared
/// streets' definition. Bucketing keeps an edge's identity stable when a
/// rebuild reclassifies a road within the same bucket.
pub fn form_of_way(road_class: RoadClass) -> u8 {
    match road_class {
        RoadClass::Motorway => 1,
        RoadClass::Primary | RoadClass::Trunk => 2,
        RoadClass::Secondary
        | RoadClass::Tertiary
        | RoadClass::Residential
        | RoadClass::Unclassified => 3,
        RoadClass::Roundabout => 4,
        _ => 7,
    }
}

fn canonical_reference(
    fow: u8,
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
) -> String {
    let bearing = rounded_azimuth(start_lat, start_lon, end_lat, end_lon);
    format!("Reference {fow} {start_lon:.6} {start_lat:.6} {end_lon:.6} {end_lat:.6} {bearing}")
}

/// Compute the 8-byte stable ID for one directed edge, most-significant byte
/// first. The direction is expressed by argument order: pass the traversal's
/// entry coordinate as start. For the reverse direction of the same stored
/// edge, swap start and end; the bearing flips by ~180° and the bucket stays,
/// so the two directions hash differently except when the swapped canonical
/// string collapses onto the original (a zero-length edge).
pub fn calculate_stable_edge_id(
    road_class: RoadClass,
    start_lat: f64,
    start_lon: f64,
    end_lat: f64,
    end_lon: f64,
) -> [u8; 8] {
    let reference = canonical_reference(form_of_way(road_class), start_lat, start_lon, end_lat, end_lon);
    xxh3_64(reference.as_bytes()).to_be_bytes()
}

/// Render an ID the way it appears in path details and the link table:
/// the decimal form of the big-endian u64.
pub fn stable_id_string(id: [u8; 8]) -> String {
    u64::from_be_bytes(id).to_string()
}

/// Handles for the 16 unsigned-byte edge attributes the IDs round-trip
/// through (8 per direction). Persisting byte-wise through the host engine's
/// generic attribute store means the engine needs no stable-ID awareness.
#[derive(Debug, Clone)]
pub struct StableIdValues {
    fwd: [AttributeHandle; 8],
    rev: [AttributeHandle; 8],
}

impl StableIdValues {
    /// Register the 16 byte attributes, or re-resolve them if a previous run
    /// already registered them.
    pub fn create(store: &mut dyn EdgeAttributeStore) -> Self {
        let mut fwd = [AttributeHandle(0); 8];
        let mut rev = [AttributeHandle(0); 8];
        for i in 0..8 {
            fwd[i] = store.register_u8(&format!("stable-id-byte-{i}"));
            rev[i] = store.register_u8(&format!("reverse-stable-id-byte-{i}"));
        }
        Self { fwd, rev }
    }

    /// Resolve previously registered attributes without creating them.
    /// Returns `None` if the graph was built without stable IDs.
    pub fn from_store(store: &dyn EdgeAttributeStore) -> Option<Self> {
        let mut fwd = [AttributeHandle(0); 8];
        let mut rev = [AttributeHandle(0); 8];
        for i in 0..8 {
            fwd[i] = store.lookup_u8(&format!("stable-id-byte-{i}"))?;
            rev[i] = store.lookup_u8(&format!("reverse-stable-id-byte-{i}"))?;
        }
        Some(Self { fwd, rev })
    }

    /// Read the stored ID for the traversal direction of `edge` and render
    /// it as its decimal string.
    pub fn stable_id(&self, store: &dyn EdgeAttributeStore, edge: &EdgeState) -> String {
        let handles = if edge.reverse { &self.rev } else { &self.fwd };
        let mut id = [0u8; 8];
        for (byte, handle) in id.iter_mut().zip(handles) {
            *byte = store.get_u8(*handle, edge.edge);
        }
        stable_id_string(id)
    }

    /// Write one direction's ID bytes for an edge. The fixed 8-byte width of
    /// the scheme is enforced by the parameter type.
    pub fn set_stable_id(
        &self,
        store: &mut dyn EdgeAttributeStore,
        edge: EdgeId,
        reverse: bool,
        id: [u8; 8],
    ) {
        let handles = if reverse { &self.rev } else { &self.fwd };
        for (byte, handle) in id.iter().zip(handles) {
            store.set_u8(*handle, edge, *byte);
        }
    }
}

/// Whole-graph assignment pass: compute and persist both directions' IDs for
/// every stored edge. Run once after graph import, before the graph is
/// served or link-mapped.
pub fn assign_stable_ids(engine: &mut dyn RoutingEngine, values: &StableIdValues) {
    let edge_count = engine.edge_count();
    let mut computed = Vec::with_capacity(edge_count);
    for edge in 0..edge_count as EdgeId {
        let state = engine.edge_state(edge, false);
        let (start_lat, start_lon) = engine.node_coord(state.base_node);
        let (end_lat, end_lon) = engine.node_coord(state.adj_node);
        let fwd = calculate_stable_edge_id(state.road_class, start_lat, start_lon, end_lat, end_lon);
        let rev = calculate_stable_edge_id(state.road_class, end_lat, end_lon, start_lat, start_lon);
        computed.push((fwd, rev));
    }

    let store = engine.attributes_mut();
    for (edge, (fwd, rev)) in computed.into_iter().enumerate() {
        values.set_stable_id(store, edge as EdgeId, false, fwd);
        values.set_stable_id(store, edge as EdgeId, true, rev);
    }
    tracing::info!(edges = edge_count, "assigned stable edge IDs");
}
