//! Internal transit feed model.
//!
//! The link mapper only needs a narrow slice of GTFS: routes with their
//! type and agency, stops with coordinates, and each trip's ordered stop
//! sequence. [`TransitFeed`] carries exactly that, decoupled from the
//! on-disk feed format; [`TransitFeed::from_gtfs`] fills it from a GTFS
//! zip or directory.

use rustc_hash::{FxHashMap, FxHashSet};
use std::path::Path;
use thiserror::Error;

/// GTFS route types that run on street infrastructure and may therefore be
/// linked to street edges: tram (0), bus (3) and cable car (5). Rail, subway
/// and ferry modes must never be linked.
pub const STREET_BASED_ROUTE_TYPES: [u16; 3] = [0, 3, 5];

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to read GTFS feed '{feed_id}'")]
    Gtfs {
        feed_id: String,
        #[source]
        source: Box<gtfs_structures::Error>,
    },
}

#[derive(Debug, Clone)]
pub struct FeedRoute {
    pub id: String,
    pub agency_name: String,
    pub short_name: String,
    pub long_name: String,
    pub route_type: u16,
}

#[derive(Debug, Clone)]
pub struct FeedStop {
    pub id: String,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone)]
pub struct FeedTrip {
    pub id: String,
    pub route_id: String,
    /// Stop IDs in stop-sequence order.
    pub stop_ids: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TransitFeed {
    pub feed_id: String,
    pub routes: FxHashMap<String, FeedRoute>,
    pub stops: FxHashMap<String, FeedStop>,
    /// Sorted by trip ID for deterministic batch output.
    pub trips: Vec<FeedTrip>,
}

impl TransitFeed {
    /// Load a feed from a GTFS zip file or directory.
    pub fn from_gtfs(feed_id: &str, path: &Path) -> Result<Self, FeedError> {
        let gtfs = gtfs_structures::Gtfs::from_path(path).map_err(|source| FeedError::Gtfs {
            feed_id: feed_id.to_string(),
            source: Box::new(source),
        })?;

        let agency_names: FxHashMap<Option<String>, String> = gtfs
            .agencies
            .iter()
            .map(|a| (a.id.clone(), a.name.clone()))
            .collect();
        let default_agency = gtfs
            .agencies
            .first()
            .map(|a| a.name.clone())
            .unwrap_or_default();

        let routes = gtfs
            .routes
            .iter()
            .map(|(id, route)| {
                let agency_name = agency_names
                    .get(&route.agency_id)
                    .cloned()
                    .unwrap_or_else(|| default_agency.clone());
                (
                    id.clone(),
                    FeedRoute {
                        id: id.clone(),
                        agency_name,
                        short_name: route.short_name.clone().unwrap_or_default(),
                        long_name: route.long_name.clone().unwrap_or_default(),
                        route_type: route_type_code(route.route_type),
                    },
                )
            })
            .collect();

        // Stops without coordinates cannot be routed between; leave them out
        // and let the mapper count the affected pairs.
        let stops = gtfs
            .stops
            .iter()
            .filter_map(|(id, stop)| {
                let (lat, lon) = (stop.latitude?, stop.longitude?);
                Some((
                    id.clone(),
                    FeedStop {
                        id: id.clone(),
                        name: stop.name.clone().unwrap_or_default(),
                        lat,
                        lon,
                    },
                ))
            })
            .collect();

        let mut trips: Vec<FeedTrip> = gtfs
            .trips
            .values()
            .map(|trip| FeedTrip {
                id: trip.id.clone(),
                route_id: trip.route_id.clone(),
                stop_ids: trip
                    .stop_times
                    .iter()
                    .map(|st| st.stop.id.clone())
                    .collect(),
            })
            .collect();
        trips.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self { feed_id: feed_id.to_string(), routes, stops, trips })
    }

    /// IDs of this feed's street-based routes.
    pub fn street_based_route_ids(&self) -> FxHashSet<&str> {
        self.routes
            .values()
            .filter(|r| STREET_BASED_ROUTE_TYPES.contains(&r.route_type))
            .map(|r| r.id.as_str())
            .collect()
    }
}

/// Numeric GTFS route_type code for the parsed enum.
fn route_type_code(route_type: gtfs_structures::RouteType) -> u16 {
    use gtfs_structures::RouteType::*;
    match route_type {
        Tramway => 0,
        Subway => 1,
        Rail => 2,
        Bus => 3,
        Ferry => 4,
        CableCar => 5,
        Gondola => 6,
        Funicular => 7,
        Coach => 200,
        Air => 1100,
        Taxi => 1500,
        Other(code) => i32::from(code).clamp(0, i32::from(u16::MAX)) as u16,
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn street_based_filter_keeps_tram_bus_cable_car() {
        let mut feed = testfeed::feed("kc", &[]);
        testfeed::route(&mut feed, "tram", 0);
        testfeed::route(&mut feed, "subway", 1);
        testfeed::route(&mut feed, "rail", 2);
        testfeed::route(&mut feed, "bus", 3);
        testfeed::route(&mut feed, "ferry", 4);
        testfeed::route(&mut feed, "cablecar", 5);

        let ids = feed.street_based_route_ids();
        assert_eq!(ids.len(), 3);
        assert!(ids.contains("tram") && ids.contains("bus") && ids.contains("cablecar"));
    }

    #[test]
    fn route_type_codes_follow_the_gtfs_table() {
        use gtfs_structures::RouteType;
        assert_eq!(route_type_code(RouteType::Tramway), 0);
        assert_eq!(route_type_code(RouteType::Bus), 3);
        assert_eq!(route_type_code(RouteType::CableCar), 5);
        assert_eq!(route_type_code(RouteType::Other(715)), 715);
    }
}
