//! In-memory reference implementation of the engine contract.
//!
//! A plain adjacency-list graph with Dijkstra search and R-tree snapping.
//! It exists so the batch CLI can run self-contained against a small street
//! network loaded from JSON, and so the test suites can exercise every
//! stitching and link-mapping code path deterministically. It is not a
//! production router and makes no attempt at hierarchy-based speedups.

use priority_queue::PriorityQueue;
use rstar::{primitives::GeomWithData, RTree};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use thiserror::Error;

use crate::geo::{azimuth, haversine_distance, heading_delta};

use super::{
    AttributeHandle, DirectionResolution, EdgeAttributeStore, EdgeId, EdgeRestriction, EdgeState,
    NodeId, Path, RoadClass, RoutingEngine, SearchOptions, Snap, SnapFilter,
};

/// Incompatible-direction penalty. Unfavoring discourages, it does not
/// forbid: a route that has no alternative still uses the edge.
const UNFAVOR_FACTOR: u64 = 4;

/// Headings deviating more than this from an edge's bearing mark the edge
/// unfavored during heading enforcement.
const HEADING_TOLERANCE_DEG: f64 = 100.0;

/// Snap candidates farther than this from the query point are rejected.
const MAX_SNAP_DISTANCE_M: f64 = 2_000.0;

/// Simple vector-backed implementation of the generic attribute store:
/// one `Vec<u8>` per registered attribute, indexed by edge.
#[derive(Debug, Clone, Default)]
pub struct VecAttributeStore {
    names: Vec<String>,
    values: Vec<Vec<u8>>,
    edge_count: usize,
}

impl VecAttributeStore {
    pub fn new(edge_count: usize) -> Self {
        Self { names: Vec::new(), values: Vec::new(), edge_count }
    }
}

impl EdgeAttributeStore for VecAttributeStore {
    fn register_u8(&mut self, name: &str) -> AttributeHandle {
        if let Some(handle) = self.lookup_u8(name) {
            return handle;
        }
        self.names.push(name.to_string());
        self.values.push(vec![0; self.edge_count]);
        AttributeHandle(self.names.len() - 1)
    }

    fn lookup_u8(&self, name: &str) -> Option<AttributeHandle> {
        self.names.iter().position(|n| n == name).map(AttributeHandle)
    }

    fn get_u8(&self, handle: AttributeHandle, edge: EdgeId) -> u8 {
        self.values[handle.0][edge as usize]
    }

    fn set_u8(&mut self, handle: AttributeHandle, edge: EdgeId, value: u8) {
        self.values[handle.0][edge as usize] = value;
    }
}

/// Serialized form of a street network, loadable from JSON by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NodeSpec {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub base: NodeId,
    pub adj: NodeId,
    #[serde(default = "default_road_class")]
    pub road_class: String,
    #[serde(default)]
    pub name: Option<String>,
    /// One-way in storage direction (base -> adj).
    #[serde(default)]
    pub oneway: bool,
}

fn default_road_class() -> String {
    "residential".to_string()
}

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("edge {edge} references missing node {node}")]
    MissingNode { edge: usize, node: NodeId },
}

#[derive(Debug, Clone)]
struct StoredEdge {
    base: NodeId,
    adj: NodeId,
    road_class: RoadClass,
    name: Option<String>,
    length_m: f64,
    oneway: bool,
}

/// One search issued against the engine, recorded for inspection by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchRecord {
    pub from: NodeId,
    pub to: NodeId,
    pub departure_millis: Option<u64>,
}

pub struct MemoryEngine {
    nodes: Vec<(f64, f64)>,
    edges: Vec<StoredEdge>,
    /// node -> (edge, other node, reverse traversal) for every admissible
    /// departure from that node.
    adjacency: Vec<Vec<(EdgeId, NodeId, bool)>>,
    attributes: VecAttributeStore,
    rtree: RTree<GeomWithData<[f64; 2], NodeId>>,
    unfavored: FxHashSet<(NodeId, EdgeId)>,
    direction_overrides: FxHashMap<NodeId, DirectionResolution>,
    /// Log of every search issued, in order.
    pub search_log: Vec<SearchRecord>,
}

impl MemoryEngine {
    pub fn from_spec(spec: &NetworkSpec) -> Result<Self, NetworkError> {
        let nodes: Vec<(f64, f64)> = spec.nodes.iter().map(|n| (n.lat, n.lon)).collect();
        let mut edges = Vec::with_capacity(spec.edges.len());
        let mut adjacency = vec![Vec::new(); nodes.len()];

        for (i, e) in spec.edges.iter().enumerate() {
            for node in [e.base, e.adj] {
                if node as usize >= nodes.len() {
                    return Err(NetworkError::MissingNode { edge: i, node });
                }
            }
            let (base_lat, base_lon) = nodes[e.base as usize];
            let (adj_lat, adj_lon) = nodes[e.adj as usize];
            let edge_id = edges.len() as EdgeId;
            edges.push(StoredEdge {
                base: e.base,
                adj: e.adj,
                road_class: RoadClass::from_tag(&e.road_class),
                name: e.name.clone(),
                length_m: haversine_distance(base_lat, base_lon, adj_lat, adj_lon),
                oneway: e.oneway,
            });
            adjacency[e.base as usize].push((edge_id, e.adj, false));
            if !e.oneway {
                adjacency[e.adj as usize].push((edge_id, e.base, true));
            }
        }

        let rtree = RTree::bulk_load(
            nodes
                .iter()
                .enumerate()
                .map(|(i, (lat, lon))| GeomWithData::new([*lon, *lat], i as NodeId))
                .collect(),
        );

        let attributes = VecAttributeStore::new(edges.len());
        Ok(Self {
            nodes,
            edges,
            adjacency,
            attributes,
            rtree,
            unfavored: FxHashSet::default(),
            direction_overrides: FxHashMap::default(),
            search_log: Vec::new(),
        })
    }

    /// Force the direction resolver's answer at a node. Defaults to
    /// unrestricted everywhere; tests use this to model curbside geometry.
    pub fn set_direction_resolution(&mut self, node: NodeId, resolution: DirectionResolution) {
        self.direction_overrides.insert(node, resolution);
    }

    fn speed_kmh(road_class: RoadClass) -> f64 {
        match road_class {
            RoadClass::Motorway => 110.0,
            RoadClass::Trunk => 90.0,
            RoadClass::Primary => 70.0,
            RoadClass::Secondary => 60.0,
            RoadClass::Tertiary => 50.0,
            RoadClass::Unclassified => 50.0,
            RoadClass::Roundabout => 40.0,
            RoadClass::Residential => 30.0,
            RoadClass::Service => 20.0,
            RoadClass::Other => 30.0,
        }
    }

    fn travel_time_millis(&self, edge: EdgeId) -> u64 {
        let stored = &self.edges[edge as usize];
        let meters_per_sec = Self::speed_kmh(stored.road_class) / 3.6;
        (stored.length_m / meters_per_sec * 1000.0).round() as u64
    }

    fn node_matches_filter(&self, node: NodeId, filter: &SnapFilter<'_>) -> bool {
        let incident = &self.adjacency[node as usize];
        match filter {
            SnapFilter::All => !incident.is_empty(),
            SnapFilter::EdgeSet(set) => incident.iter().any(|(e, _, _)| set.contains(e)),
            SnapFilter::NameHint(hint) => {
                let hint = hint.to_lowercase();
                incident.iter().any(|(e, _, _)| {
                    self.edges[*e as usize]
                        .name
                        .as_deref()
                        .is_some_and(|n| n.to_lowercase().contains(&hint))
                })
            }
        }
    }

    fn run_dijkstra(
        &mut self,
        from: NodeId,
        to: NodeId,
        departure_millis: Option<u64>,
        opts: &SearchOptions,
    ) -> Vec<Path> {
        self.search_log.push(SearchRecord { from, to, departure_millis });

        let n = self.nodes.len();
        let mut dist = vec![u64::MAX; n];
        let mut parent: Vec<Option<(NodeId, EdgeId, bool)>> = vec![None; n];
        let mut pq: PriorityQueue<NodeId, Reverse<u64>> = PriorityQueue::new();
        let mut visited = 0usize;
        let mut capped = false;

        dist[from as usize] = 0;
        pq.push(from, Reverse(0));

        while let Some((u, Reverse(d))) = pq.pop() {
            if d > dist[u as usize] {
                continue; // Stale entry
            }
            visited += 1;
            if visited >= opts.max_visited_nodes {
                capped = true;
                break;
            }
            if u == to {
                break;
            }

            for &(edge, v, reverse) in &self.adjacency[u as usize] {
                if u == from {
                    if let EdgeRestriction::Only(required) = opts.from_out_edge {
                        if edge != required {
                            continue;
                        }
                    }
                }
                if v == to {
                    if let EdgeRestriction::Only(required) = opts.to_in_edge {
                        if edge != required {
                            continue;
                        }
                    }
                }

                let mut weight = self.travel_time_millis(edge);
                if self.unfavored.contains(&(u, edge)) {
                    weight *= UNFAVOR_FACTOR;
                }

                let next = d.saturating_add(weight);
                if next < dist[v as usize] {
                    dist[v as usize] = next;
                    parent[v as usize] = Some((u, edge, reverse));
                    pq.push(v, Reverse(next));
                }
            }
        }

        if capped {
            // Surface the exhausted search; the caller inspects
            // visited_nodes against its cap and aborts the request.
            return vec![Path {
                edges: Vec::new(),
                distance_m: 0.0,
                time_millis: 0,
                visited_nodes: visited,
                debug: format!("dijkstra aborted, visited: {visited}"),
            }];
        }

        if dist[to as usize] == u64::MAX {
            return Vec::new();
        }

        // Reconstruct the edge sequence from parent pointers
        let mut states = Vec::new();
        let mut distance_m = 0.0;
        let mut time_millis: i64 = 0;
        let mut current = to;
        while current != from {
            let (prev, edge, reverse) =
                parent[current as usize].expect("parent chain broken during reconstruction");
            let stored = &self.edges[edge as usize];
            states.push(EdgeState {
                edge,
                reverse,
                base_node: prev,
                adj_node: current,
                road_class: stored.road_class,
                original_edge_key: None,
            });
            distance_m += stored.length_m;
            time_millis += self.travel_time_millis(edge) as i64;
            current = prev;
        }
        states.reverse();

        vec![Path {
            edges: states,
            distance_m,
            time_millis,
            visited_nodes: visited,
            debug: format!("dijkstra, visited: {visited}"),
        }]
    }

    fn edge_bearing_at(&self, edge: EdgeId, node: NodeId, arriving: bool) -> f64 {
        let stored = &self.edges[edge as usize];
        let other = if stored.base == node { stored.adj } else { stored.base };
        let (node_lat, node_lon) = self.nodes[node as usize];
        let (other_lat, other_lon) = self.nodes[other as usize];
        if arriving {
            // Bearing of travel into the node
            azimuth(other_lat, other_lon, node_lat, node_lon)
        } else {
            // Bearing of travel away from the node
            azimuth(node_lat, node_lon, other_lat, other_lon)
        }
    }
}

impl RoutingEngine for MemoryEngine {
    fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn edge_count(&self) -> usize {
        self.edges.len()
    }

    fn node_coord(&self, node: NodeId) -> (f64, f64) {
        self.nodes[node as usize]
    }

    fn edge_state(&self, edge: EdgeId, reverse: bool) -> EdgeState {
        let stored = &self.edges[edge as usize];
        let (base_node, adj_node) = if reverse {
            (stored.adj, stored.base)
        } else {
            (stored.base, stored.adj)
        };
        EdgeState {
            edge,
            reverse,
            base_node,
            adj_node,
            road_class: stored.road_class,
            original_edge_key: None,
        }
    }

    fn attributes(&self) -> &dyn EdgeAttributeStore {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut dyn EdgeAttributeStore {
        &mut self.attributes
    }

    fn snap(&mut self, lat: f64, lon: f64, filter: &SnapFilter<'_>) -> Option<Snap> {
        let candidate = self
            .rtree
            .nearest_neighbor_iter(&[lon, lat])
            .find(|c| self.node_matches_filter(c.data, filter));

        // A name hint biases snapping but never makes it fail outright.
        let candidate = match (candidate, filter) {
            (None, SnapFilter::NameHint(_)) => self
                .rtree
                .nearest_neighbor_iter(&[lon, lat])
                .find(|c| self.node_matches_filter(c.data, &SnapFilter::All)),
            (c, _) => c,
        }?;

        let node = candidate.data;
        let (node_lat, node_lon) = self.nodes[node as usize];
        let distance_m = haversine_distance(lat, lon, node_lat, node_lon);
        if distance_m > MAX_SNAP_DISTANCE_M {
            return None;
        }

        let (closest_edge, _, _) = *self.adjacency[node as usize].first()?;
        Some(Snap {
            closest_node: node,
            closest_edge,
            query_point: (lat, lon),
            snapped_point: (node_lat, node_lon),
            distance_m,
        })
    }

    fn search(&mut self, from: NodeId, to: NodeId, opts: &SearchOptions) -> Vec<Path> {
        self.run_dijkstra(from, to, None, opts)
    }

    fn search_at_time(
        &mut self,
        from: NodeId,
        to: NodeId,
        departure_millis: u64,
        opts: &SearchOptions,
    ) -> Vec<Path> {
        // The reference engine's costs are time-invariant; the departure
        // time is recorded so callers' arrival->departure chaining is
        // observable.
        self.run_dijkstra(from, to, Some(departure_millis), opts)
    }

    fn enforce_heading(&mut self, node: NodeId, heading_degrees: f64, is_destination: bool) {
        if heading_degrees.is_nan() {
            return;
        }
        let incident: Vec<EdgeId> =
            self.adjacency[node as usize].iter().map(|(e, _, _)| *e).collect();
        for edge in incident {
            let bearing = self.edge_bearing_at(edge, node, is_destination);
            if heading_delta(bearing, heading_degrees) > HEADING_TOLERANCE_DEG {
                self.unfavored.insert((node, edge));
            }
        }
    }

    fn unfavor_edge_pair(&mut self, node: NodeId, edge: EdgeId) {
        self.unfavored.insert((node, edge));
    }

    fn clear_unfavored_state(&mut self) {
        self.unfavored.clear();
    }

    fn resolve_direction(&self, node: NodeId, _query_point: (f64, f64)) -> DirectionResolution {
        self.direction_overrides
            .get(&node)
            .copied()
            .unwrap_or_else(DirectionResolution::unrestricted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-row grid around the Kansas City test coordinates:
    ///
    /// ```text
    /// 0 -- 1 -- 2
    /// |    |    |
    /// 3 -- 4 -- 5      6 (isolated)
    /// ```
    fn grid_spec() -> NetworkSpec {
        let nodes = vec![
            NodeSpec { lat: 38.9664, lon: -94.7083 },
            NodeSpec { lat: 38.9664, lon: -94.7000 },
            NodeSpec { lat: 38.9664, lon: -94.6917 },
            NodeSpec { lat: 38.9592, lon: -94.7083 },
            NodeSpec { lat: 38.9592, lon: -94.7000 },
            NodeSpec { lat: 38.9592, lon: -94.6917 },
            NodeSpec { lat: 39.2000, lon: -94.2000 },
        ];
        let edge = |base, adj, name: &str| EdgeSpec {
            base,
            adj,
            road_class: "residential".to_string(),
            name: Some(name.to_string()),
            oneway: false,
        };
        NetworkSpec {
            nodes,
            edges: vec![
                edge(0, 1, "86th Street"),
                edge(1, 2, "86th Street"),
                edge(3, 4, "87th Street"),
                edge(4, 5, "87th Street"),
                edge(0, 3, "Maple Avenue"),
                edge(1, 4, "Oak Avenue"),
                edge(2, 5, "Pine Avenue"),
            ],
        }
    }

    #[test]
    fn snap_finds_nearest_node() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        let snap = engine.snap(38.9663, -94.7082, &SnapFilter::All).unwrap();
        assert_eq!(snap.closest_node, 0);
        assert!(snap.distance_m < 50.0);
    }

    #[test]
    fn snap_rejects_far_points() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        assert!(engine.snap(45.0, -100.0, &SnapFilter::All).is_none());
    }

    #[test]
    fn snap_name_hint_biases_but_does_not_fail() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        // Near node 0 but hinting for 87th Street pulls the snap down a row.
        let snap = engine.snap(38.9660, -94.7083, &SnapFilter::NameHint("87th")).unwrap();
        assert_eq!(snap.closest_node, 3);
        // A hint matching nothing falls back to the unbiased snap.
        let snap = engine.snap(38.9660, -94.7083, &SnapFilter::NameHint("no such road")).unwrap();
        assert_eq!(snap.closest_node, 0);
    }

    #[test]
    fn search_finds_shortest_path() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        let paths = engine.search(0, 5, &SearchOptions::default());
        assert_eq!(paths.len(), 1);
        let path = &paths[0];
        assert_eq!(path.edges.len(), 3);
        assert_eq!(path.edges.first().unwrap().base_node, 0);
        assert_eq!(path.edges.last().unwrap().adj_node, 5);
        assert!(path.time_millis > 0);
        assert!(path.distance_m > 0.0);
    }

    #[test]
    fn search_returns_empty_for_disconnected_target() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        assert!(engine.search(0, 6, &SearchOptions::default()).is_empty());
    }

    #[test]
    fn visited_node_cap_aborts_search() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        let opts = SearchOptions { max_visited_nodes: 2, ..Default::default() };
        let paths = engine.search(0, 5, &opts);
        assert_eq!(paths.len(), 1);
        assert!(paths[0].visited_nodes >= 2);
        assert!(paths[0].edges.is_empty());
    }

    #[test]
    fn unfavoring_reroutes_but_never_disconnects() {
        let mut engine = MemoryEngine::from_spec(&grid_spec()).unwrap();
        let direct = engine.search(0, 2, &SearchOptions::default())[0].clone();

        // Unfavor the first edge of the direct route at its start node.
        let first = direct.edges[0].edge;
        engine.unfavor_edge_pair(0, first);
        let rerouted = engine.search(0, 2, &SearchOptions::default())[0].clone();
        assert_ne!(rerouted.edges[0].edge, first);

        engine.clear_unfavored_state();
        let restored = engine.search(0, 2, &SearchOptions::default())[0].clone();
        assert_eq!(restored.edges[0].edge, first);
    }

    #[test]
    fn oneway_edges_are_directional() {
        let mut spec = grid_spec();
        spec.edges[0].oneway = true; // 0 -> 1 only
        let mut engine = MemoryEngine::from_spec(&spec).unwrap();
        let forward = engine.search(0, 1, &SearchOptions::default());
        assert_eq!(forward[0].edges.len(), 1);
        let back = engine.search(1, 0, &SearchOptions::default());
        // Still reachable, but not over the oneway edge.
        assert!(back[0].edges.len() > 1);
    }

    #[test]
    fn from_spec_rejects_dangling_edges() {
        let spec = NetworkSpec {
            nodes: vec![NodeSpec { lat: 0.0, lon: 0.0 }],
            edges: vec![EdgeSpec {
                base: 0,
                adj: 9,
                road_class: "residential".to_string(),
                name: None,
                oneway: false,
            }],
        };
        assert!(matches!(
            MemoryEngine::from_spec(&spec),
            Err(NetworkError::MissingNode { edge: 0, node: 9 })
        ));
    }
}
