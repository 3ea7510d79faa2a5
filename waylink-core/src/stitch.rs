//! Multi-waypoint route stitching.
//!
//! N waypoints become N-1 point-to-point searches that behave as one
//! continuous route. Legs run strictly in order because each leg's
//! constraints depend on the previous leg: pass-through mode unfavors the
//! U-turn back along the previous leg's final edge, and time-dependent
//! searches depart when the previous leg arrived. Constraint state on the
//! query graph is cleared after every leg so nothing leaks into the next.

use rustc_hash::FxHashMap;
use tracing::debug;

use waylink_common::{InvalidRequest, InvariantViolation, PointNotFound, RouteError};

use crate::engine::{
    EdgeRestriction, EdgeState, Path, RoutingEngine, SearchOptions, Snap, SnapFilter,
};
use crate::path_details::{emitters_for, walk_path, DetailContext, PathDetail};
use crate::stable_id::StableIdValues;

/// Which side of the street a waypoint must be approached/left on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Curbside {
    #[default]
    Any,
    Left,
    Right,
}

impl Curbside {
    fn label(self) -> &'static str {
        match self {
            Curbside::Any => "any",
            Curbside::Left => "left",
            Curbside::Right => "right",
        }
    }
}

/// What to do when a curbside constraint has no compatible edge at a point.
/// An explicit configuration choice: fail the whole request, or silently
/// accept any direction at that point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CurbsideHandling {
    #[default]
    FailFast,
    AcceptAny,
}

/// A multi-waypoint routing request.
#[derive(Debug, Clone)]
pub struct RouteRequest {
    /// Ordered (lat, lon) waypoints; at least two.
    pub points: Vec<(f64, f64)>,
    /// Per-waypoint headings in degrees; empty for none. NaN entries leave
    /// the corresponding waypoint unconstrained.
    pub headings: Vec<f64>,
    /// Per-waypoint curbside constraints; empty for none.
    pub curbsides: Vec<Curbside>,
    /// Per-waypoint name hints biasing the snap; empty strings are ignored.
    pub point_hints: Vec<String>,
    /// Propagate a straight-through constraint at intermediate waypoints.
    pub pass_through: bool,
    pub curbside_handling: CurbsideHandling,
    /// Use the engine's time-dependent search. Requires `departure_time_millis`.
    pub time_dependent: bool,
    /// Absolute departure time at the first waypoint.
    pub departure_time_millis: Option<u64>,
    /// Per-leg visited-node cap; reaching it aborts the whole request.
    pub max_visited_nodes: usize,
    /// Path details to compute over the stitched edge sequence.
    pub path_details: Vec<String>,
}

impl RouteRequest {
    /// A plain request between the given points, no constraints.
    pub fn between(points: Vec<(f64, f64)>) -> Self {
        Self {
            points,
            headings: Vec::new(),
            curbsides: Vec::new(),
            point_hints: Vec::new(),
            pass_through: false,
            curbside_handling: CurbsideHandling::default(),
            time_dependent: false,
            departure_time_millis: None,
            max_visited_nodes: 1_000_000,
            path_details: Vec::new(),
        }
    }
}

/// One computed leg of a stitched route.
#[derive(Debug, Clone)]
pub struct RouteLeg {
    pub path: Path,
    /// Absolute departure time of this leg, when time-dependent.
    pub departure_millis: Option<u64>,
    pub debug: String,
}

/// The stitched result: one ordered edge sequence plus per-leg traces.
#[derive(Debug, Clone)]
pub struct StitchedRoute {
    pub legs: Vec<RouteLeg>,
    /// All legs' edges, concatenated in order.
    pub edges: Vec<EdgeState>,
    pub distance_m: f64,
    pub time_millis: i64,
    pub visited_nodes_sum: u64,
    pub visited_nodes_average: f64,
    /// Run-length encoded details over the stitched edge sequence, keyed by
    /// detail name.
    pub details: FxHashMap<&'static str, Vec<PathDetail>>,
}

/// Per-waypoint first/last edge restrictions derived from curbsides.
#[derive(Debug, Clone, Copy, Default)]
struct WaypointRestriction {
    in_edge: EdgeRestriction,
    out_edge: EdgeRestriction,
}

/// The via-routing template: snaps waypoints, applies directional
/// constraints, chains the searches and stitches the result.
pub struct ViaRouter<'a, E: RoutingEngine + ?Sized> {
    engine: &'a mut E,
    stable_ids: &'a StableIdValues,
}

impl<'a, E: RoutingEngine + ?Sized> ViaRouter<'a, E> {
    pub fn new(engine: &'a mut E, stable_ids: &'a StableIdValues) -> Self {
        Self { engine, stable_ids }
    }

    pub fn route(&mut self, req: &RouteRequest) -> Result<StitchedRoute, RouteError> {
        self.validate(req)?;
        // Unknown detail names must fail before any search runs.
        let mut emitters = emitters_for(&req.path_details).map_err(RouteError::InvalidRequest)?;

        let snaps = self.lookup(req)?;
        let restrictions = self.resolve_curbsides(req, &snaps)?;

        let mut legs: Vec<RouteLeg> = Vec::with_capacity(req.points.len() - 1);
        let mut visited_nodes_sum: u64 = 0;
        // Arrival of leg i-1 is the departure of leg i.
        let mut current_departure = req.departure_time_millis;

        for place_index in 1..req.points.len() {
            let from = &snaps[place_index - 1];
            let to = &snaps[place_index];

            if place_index == 1 {
                // Enforce start direction on the first leg only.
                let initial_heading = req.headings.first().copied().unwrap_or(f64::NAN);
                self.engine.enforce_heading(from.closest_node, initial_heading, false);
            } else if req.pass_through {
                // Enforce a straight start after the via stop by unfavoring
                // the U-turn back along the previous leg's final edge.
                if let Some(final_edge) = legs[place_index - 2].path.edges.last() {
                    self.engine.unfavor_edge_pair(from.closest_node, final_edge.edge);
                }
            }

            // Enforce end direction.
            let end_heading = if req.headings.len() == req.points.len() {
                req.headings[place_index]
            } else {
                f64::NAN
            };
            self.engine.enforce_heading(to.closest_node, end_heading, true);

            let opts = SearchOptions {
                max_visited_nodes: req.max_visited_nodes,
                from_out_edge: restrictions[place_index - 1].out_edge,
                to_in_edge: restrictions[place_index].in_edge,
            };

            let mut paths = if req.time_dependent {
                let departure = current_departure
                    .expect("departure time validated before the leg loop");
                self.engine
                    .search_at_time(from.closest_node, to.closest_node, departure, &opts)
            } else {
                self.engine.search(from.closest_node, to.closest_node, &opts)
            };

            // Reset all direction enforcements before the next leg, whether
            // or not this one succeeded.
            self.engine.clear_unfavored_state();

            if paths.is_empty() {
                return Err(InvariantViolation::EmptySearchResult {
                    from_node: from.closest_node,
                    to_node: to.closest_node,
                }
                .into());
            }
            let path = paths.swap_remove(0);

            if path.visited_nodes >= req.max_visited_nodes {
                return Err(RouteError::MaximumNodesExceeded {
                    cap: req.max_visited_nodes,
                    leg: place_index - 1,
                });
            }
            if path.time_millis < 0 {
                return Err(InvariantViolation::NegativeTime {
                    time_millis: path.time_millis,
                    leg: place_index - 1,
                }
                .into());
            }

            visited_nodes_sum += path.visited_nodes as u64;
            debug!(
                leg = place_index - 1,
                visited = path.visited_nodes,
                time_millis = path.time_millis,
                "computed leg"
            );

            let departure_millis = current_departure;
            if req.time_dependent {
                current_departure =
                    current_departure.map(|d| d.saturating_add(path.time_millis.max(0) as u64));
            }
            let debug = path.debug.clone();
            legs.push(RouteLeg { path, departure_millis, debug });
        }

        if legs.len() != req.points.len() - 1 {
            return Err(InvariantViolation::LegCountMismatch {
                points: req.points.len(),
                legs: legs.len(),
            }
            .into());
        }

        let edges: Vec<EdgeState> =
            legs.iter().flat_map(|leg| leg.path.edges.iter().cloned()).collect();
        let distance_m = legs.iter().map(|leg| leg.path.distance_m).sum();
        let time_millis = legs.iter().map(|leg| leg.path.time_millis).sum();

        let details = if emitters.is_empty() {
            FxHashMap::default()
        } else {
            let ctx = DetailContext {
                attributes: self.engine.attributes(),
                stable_ids: self.stable_ids,
            };
            walk_path(&edges, &mut emitters, &ctx)
        };

        let leg_count = legs.len();
        Ok(StitchedRoute {
            legs,
            edges,
            distance_m,
            time_millis,
            visited_nodes_sum,
            visited_nodes_average: visited_nodes_sum as f64 / leg_count as f64,
            details,
        })
    }

    fn validate(&self, req: &RouteRequest) -> Result<(), RouteError> {
        if req.points.len() < 2 {
            return Err(InvalidRequest::TooFewWaypoints(req.points.len()).into());
        }
        if !req.headings.is_empty() && req.headings.len() != req.points.len() {
            return Err(InvalidRequest::HeadingCountMismatch {
                headings: req.headings.len(),
                points: req.points.len(),
            }
            .into());
        }
        if !req.curbsides.is_empty() && req.curbsides.len() != req.points.len() {
            return Err(InvalidRequest::CurbsideCountMismatch {
                curbsides: req.curbsides.len(),
                points: req.points.len(),
            }
            .into());
        }
        if req.time_dependent && req.departure_time_millis.is_none() {
            return Err(InvalidRequest::MissingDepartureTime.into());
        }
        Ok(())
    }

    /// Snap every waypoint, collecting all failures so the caller sees every
    /// bad point in one response.
    fn lookup(&mut self, req: &RouteRequest) -> Result<Vec<Snap>, RouteError> {
        let mut snaps = Vec::with_capacity(req.points.len());
        let mut failures = Vec::new();
        for (index, &(lat, lon)) in req.points.iter().enumerate() {
            let hint = req.point_hints.get(index).map(String::as_str).unwrap_or("");
            let filter = if hint.is_empty() {
                SnapFilter::All
            } else {
                SnapFilter::NameHint(hint)
            };
            match self.engine.snap(lat, lon, &filter) {
                Some(snap) => snaps.push(snap),
                None => failures.push(PointNotFound { index, lat, lon }),
            }
        }
        if failures.is_empty() {
            Ok(snaps)
        } else {
            Err(RouteError::PointsNotFound(failures))
        }
    }

    /// Turn curbside constraints into per-waypoint edge restrictions via the
    /// engine's direction resolver. Curbside and pass-through constraints
    /// are applied independently of each other.
    fn resolve_curbsides(
        &mut self,
        req: &RouteRequest,
        snaps: &[Snap],
    ) -> Result<Vec<WaypointRestriction>, RouteError> {
        if req.curbsides.iter().all(|c| *c == Curbside::Any) {
            return Ok(vec![WaypointRestriction::default(); snaps.len()]);
        }

        let mut restrictions = Vec::with_capacity(snaps.len());
        for (index, snap) in snaps.iter().enumerate() {
            let curbside = req.curbsides.get(index).copied().unwrap_or_default();
            if curbside == Curbside::Any {
                restrictions.push(WaypointRestriction::default());
                continue;
            }
            let resolution = self.engine.resolve_direction(snap.closest_node, snap.query_point);
            let side = match curbside {
                Curbside::Left => resolution.left,
                Curbside::Right => resolution.right,
                Curbside::Any => unreachable!(),
            };
            match side {
                Some((in_edge, out_edge)) => restrictions.push(WaypointRestriction {
                    in_edge: EdgeRestriction::Only(in_edge),
                    out_edge: EdgeRestriction::Only(out_edge),
                }),
                None => match req.curbside_handling {
                    CurbsideHandling::FailFast => {
                        return Err(InvalidRequest::ImpossibleCurbside {
                            index,
                            curbside: curbside.label().to_string(),
                        }
                        .into());
                    }
                    CurbsideHandling::AcceptAny => {
                        restrictions.push(WaypointRestriction::default());
                    }
                },
            }
        }
        Ok(restrictions)
    }
}
