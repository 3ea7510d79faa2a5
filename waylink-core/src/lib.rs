//! Core routing augmentation for waylink: rebuild-invariant stable edge
//! identifiers, per-edge path details, and the multi-waypoint route stitcher.
//!
//! This crate does not implement shortest-path search or graph storage. Those
//! live in a host routing engine reached through the [`engine`] contract; the
//! code here reads edges, snaps points, and issues point-to-point searches
//! against that contract, then layers identity and stitching semantics on top.

pub mod edge_key;
pub mod engine;
pub mod geo;
pub mod path_details;
pub mod stable_id;
pub mod stitch;

pub use edge_key::{decompose_edge_key, edge_key, resolve_edge_key};
pub use stable_id::{calculate_stable_edge_id, stable_id_string, StableIdValues};
pub use stitch::{RouteRequest, StitchedRoute, ViaRouter};
