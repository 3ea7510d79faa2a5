//! Transit-to-street linking for waylink.
//!
//! An offline batch pass ([`mapper`]) discovers, for every adjacent stop pair
//! used by street-running transit trips, the ordered stable street-edge IDs a
//! vehicle traverses between the stops, and persists them in a key-value
//! table ([`formats`]). At serve time the table is opened read-only into a
//! [`repo::LinkRepository`] and transit itinerary legs are decorated with
//! concrete street geometry ([`decorate`]) without any routing on the query
//! path.

pub mod csv_export;
pub mod decorate;
pub mod feed;
pub mod formats;
pub mod mapper;
pub mod repo;

pub use decorate::{decorate_pt_leg, DecoratedPtLeg, PtLeg};
pub use feed::TransitFeed;
pub use mapper::{map_feeds, LinkMapperConfig, LinkTables};
pub use repo::{LinkRepository, RouteInfo};
