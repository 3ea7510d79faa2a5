//! Error taxonomy for routing requests and batch jobs.
//!
//! The variants are deliberately coarse-grained and map one-to-one onto the
//! caller-visible failure classes:
//!
//! - [`RouteError::InvalidRequest`] — the caller sent something unusable and
//!   retrying the same request will fail again.
//! - [`RouteError::PointsNotFound`] — one or more waypoints could not be
//!   snapped to the graph. All failing points are collected so a single
//!   response reports every bad point, not just the first.
//! - [`RouteError::MaximumNodesExceeded`] — a search hit the visited-node
//!   cap. The whole request is aborted; no partial route is returned.
//! - [`RouteError::Invariant`] — the engine or the stitcher broke one of its
//!   own promises. These indicate a bug, carry the offending inputs, and are
//!   never silently recovered.

use thiserror::Error;

/// A waypoint that could not be snapped to the street network.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("cannot find point {index}: ({lat}, {lon})")]
pub struct PointNotFound {
    /// Zero-based index of the waypoint in the request.
    pub index: usize,
    pub lat: f64,
    pub lon: f64,
}

/// Request-level validation failures. Surfaced directly to the caller and
/// never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvalidRequest {
    #[error("at least 2 points have to be specified, but was: {0}")]
    TooFewWaypoints(usize),

    #[error("if supplied, the number of headings must equal the number of points, but was: {headings} for {points} points")]
    HeadingCountMismatch { headings: usize, points: usize },

    #[error("if supplied, the number of curbsides must equal the number of points, but was: {curbsides} for {points} points")]
    CurbsideCountMismatch { curbsides: usize, points: usize },

    #[error("time-dependent routing requires a departure time")]
    MissingDepartureTime,

    #[error("impossible curbside constraint: 'curbside={curbside}' at point {index}")]
    ImpossibleCurbside { index: usize, curbside: String },

    #[error("unknown path detail: {0}")]
    UnknownPathDetail(String),
}

/// Broken internal promises. Any of these means a bug in the cost model,
/// the engine contract, or the stitching logic itself.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    #[error("at least one path has to be returned for {from_node} -> {to_node}")]
    EmptySearchResult { from_node: u32, to_node: u32 },

    #[error("computed time was negative ({time_millis}ms) for leg {leg}; please report as a bug")]
    NegativeTime { time_millis: i64, leg: usize },

    #[error("there should be exactly one more point than legs; points: {points}, legs: {legs}")]
    LegCountMismatch { points: usize, legs: usize },
}

/// Top-level error for a multi-waypoint routing request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RouteError {
    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    /// Every waypoint that failed to snap, in request order.
    #[error("{} point(s) could not be matched to the street network", .0.len())]
    PointsNotFound(Vec<PointNotFound>),

    #[error("no path found due to maximum nodes exceeded {cap} (leg {leg})")]
    MaximumNodesExceeded { cap: usize, leg: usize },

    #[error(transparent)]
    Invariant(#[from] InvariantViolation),
}
