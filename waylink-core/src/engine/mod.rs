//! Contract with the host routing engine.
//!
//! waylink augments an existing routing engine; it never owns graph storage
//! or the shortest-path search itself. Everything the stitcher, the stable-ID
//! scheme and the transit link mapper need from that engine is captured by
//! [`RoutingEngine`] and [`EdgeAttributeStore`].
//!
//! Implementations of [`RoutingEngine`] are expected to be per-request query
//! views: snapping a point may materialize virtual edges, and heading
//! enforcement / edge unfavoring mutate query-local state. Concurrent
//! requests must each get their own view over the shared immutable graph.
//!
//! [`memory`] provides a self-contained in-memory implementation used by the
//! CLI batch runs and by the test suites of the downstream crates.

pub mod memory;

use rustc_hash::FxHashSet;

/// Graph node index.
pub type NodeId = u32;

/// Directed-edge pair index. The forward and reverse traversal of the same
/// stored edge share one `EdgeId`; see [`crate::edge_key`] for the combined
/// (edge, direction) key.
pub type EdgeId = u32;

/// Road classification of an edge, as decoded from map data by the host
/// engine. Only the coarse classes that matter for stable-ID bucketing are
/// distinguished; everything else is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoadClass {
    Motorway,
    Trunk,
    Primary,
    Secondary,
    Tertiary,
    Residential,
    Unclassified,
    Roundabout,
    Service,
    Other,
}

impl RoadClass {
    /// Decode an OSM-style highway label.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "motorway" => RoadClass::Motorway,
            "trunk" => RoadClass::Trunk,
            "primary" => RoadClass::Primary,
            "secondary" => RoadClass::Secondary,
            "tertiary" => RoadClass::Tertiary,
            "residential" => RoadClass::Residential,
            "unclassified" => RoadClass::Unclassified,
            "roundabout" => RoadClass::Roundabout,
            "service" => RoadClass::Service,
            _ => RoadClass::Other,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            RoadClass::Motorway => "motorway",
            RoadClass::Trunk => "trunk",
            RoadClass::Primary => "primary",
            RoadClass::Secondary => "secondary",
            RoadClass::Tertiary => "tertiary",
            RoadClass::Residential => "residential",
            RoadClass::Unclassified => "unclassified",
            RoadClass::Roundabout => "roundabout",
            RoadClass::Service => "service",
            RoadClass::Other => "other",
        }
    }
}

/// One directed edge as seen during a path walk or an edge iteration.
///
/// `reverse` is true when the edge is traversed against its stored
/// orientation; `base_node`/`adj_node` are already swapped accordingly, so
/// `base_node` is always the node the traversal enters from.
///
/// `original_edge_key` is set only on virtual edges, the query-time fragments
/// created when a search snaps onto the interior of a stored edge. It carries
/// the combined (edge, direction) key of the stored edge the fragment was
/// split from.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeState {
    pub edge: EdgeId,
    pub reverse: bool,
    pub base_node: NodeId,
    pub adj_node: NodeId,
    pub road_class: RoadClass,
    pub original_edge_key: Option<u64>,
}

/// Handle to one named unsigned-byte edge attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeHandle(pub usize);

/// Generic per-edge attribute storage exposed by the host engine.
///
/// Attributes are registered by name once, at graph build time, and then read
/// or written per edge through their handle. The stable-ID scheme stores its
/// 8 bytes per direction as 16 independent attributes through this interface,
/// so the host engine needs no knowledge of stable IDs at all.
pub trait EdgeAttributeStore {
    /// Register a new u8 attribute, or return the existing handle if an
    /// attribute with this name was already registered.
    fn register_u8(&mut self, name: &str) -> AttributeHandle;

    /// Look up a previously registered attribute by name.
    fn lookup_u8(&self, name: &str) -> Option<AttributeHandle>;

    fn get_u8(&self, handle: AttributeHandle, edge: EdgeId) -> u8;

    fn set_u8(&mut self, handle: AttributeHandle, edge: EdgeId, value: u8);
}

/// Result of snapping a query coordinate onto the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct Snap {
    /// Node the search starts from or ends at. May be a virtual node if the
    /// engine split an edge at the snapped point.
    pub closest_node: NodeId,
    /// The stored edge the point snapped onto.
    pub closest_edge: EdgeId,
    pub query_point: (f64, f64),
    pub snapped_point: (f64, f64),
    pub distance_m: f64,
}

/// Admissibility filter applied while snapping.
pub enum SnapFilter<'a> {
    /// Accept any edge the profile can use.
    All,
    /// Accept only edges from the given set. Used by the transit link mapper
    /// to keep stops on edges a vehicle actually traverses.
    EdgeSet(&'a FxHashSet<EdgeId>),
    /// Bias snapping toward edges whose name resembles the hint.
    NameHint(&'a str),
}

/// Curbside-feasible edge pairs at a snapped point, produced by the engine's
/// direction resolver. `None` on a side means no compatible (in, out) pair
/// exists for arriving/departing on that side of the street.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionResolution {
    pub left: Option<(EdgeId, EdgeId)>,
    pub right: Option<(EdgeId, EdgeId)>,
}

impl DirectionResolution {
    /// No curbside restriction can or needs to be derived at this point.
    pub fn unrestricted() -> Self {
        Self::default()
    }
}

/// Restriction on the first or last edge of a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EdgeRestriction {
    #[default]
    Any,
    Only(EdgeId),
}

/// Per-search options handed to the engine.
#[derive(Debug, Clone, Copy)]
pub struct SearchOptions {
    /// Abort threshold for the search; reaching it is a resource-limit
    /// failure for the whole request.
    pub max_visited_nodes: usize,
    /// Required first edge out of the start node (curbside constraint).
    pub from_out_edge: EdgeRestriction,
    /// Required last edge into the destination node (curbside constraint).
    pub to_in_edge: EdgeRestriction,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            max_visited_nodes: 1_000_000,
            from_out_edge: EdgeRestriction::Any,
            to_in_edge: EdgeRestriction::Any,
        }
    }
}

/// One point-to-point path returned by the engine.
#[derive(Debug, Clone)]
pub struct Path {
    /// Ordered directed edges from start to destination.
    pub edges: Vec<EdgeState>,
    pub distance_m: f64,
    /// Travel time. Signed so that a broken cost model is observable; the
    /// stitcher treats a negative value as a fatal invariant violation.
    pub time_millis: i64,
    /// Nodes settled by the search that produced this path.
    pub visited_nodes: usize,
    pub debug: String,
}

/// The host routing engine, seen through one per-request query view.
pub trait RoutingEngine {
    fn node_count(&self) -> usize;

    fn edge_count(&self) -> usize;

    /// (lat, lon) of a node.
    fn node_coord(&self, node: NodeId) -> (f64, f64);

    /// Directed view of a stored edge.
    fn edge_state(&self, edge: EdgeId, reverse: bool) -> EdgeState;

    fn attributes(&self) -> &dyn EdgeAttributeStore;

    fn attributes_mut(&mut self) -> &mut dyn EdgeAttributeStore;

    /// Nearest-edge lookup. Returns `None` when no admissible edge is within
    /// the engine's snapping radius.
    fn snap(&mut self, lat: f64, lon: f64, filter: &SnapFilter<'_>) -> Option<Snap>;

    /// Point-to-point search. The engine promises a non-empty result for any
    /// pair of successfully snapped endpoints in the same connected
    /// component; an empty result for such a pair is an invariant violation
    /// surfaced by the caller.
    fn search(&mut self, from: NodeId, to: NodeId, opts: &SearchOptions) -> Vec<Path>;

    /// Time-dependent variant of [`search`](Self::search). `departure_millis`
    /// is the absolute departure time at `from`.
    fn search_at_time(
        &mut self,
        from: NodeId,
        to: NodeId,
        departure_millis: u64,
        opts: &SearchOptions,
    ) -> Vec<Path>;

    /// Penalize edges at `node` that are incompatible with the given heading.
    /// A NaN heading is a no-op. `is_destination` selects whether the heading
    /// constrains arrival or departure direction.
    fn enforce_heading(&mut self, node: NodeId, heading_degrees: f64, is_destination: bool);

    /// Penalize continuing through `node` by immediately re-traversing
    /// `edge`; used to propagate a straight-through constraint at via points.
    fn unfavor_edge_pair(&mut self, node: NodeId, edge: EdgeId);

    /// Drop all heading/unfavoring state so constraints cannot leak into the
    /// next leg.
    fn clear_unfavored_state(&mut self);

    /// Curbside helper: which (in, out) edge pairs at `node` are compatible
    /// with arriving/departing on each side of the street, judged from the
    /// original query point.
    fn resolve_direction(&self, node: NodeId, query_point: (f64, f64)) -> DirectionResolution;
}
