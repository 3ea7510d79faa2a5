//! Offline stop-pair link mapping.
//!
//! For every feed, the mapper expands each trip of a street-based route into
//! consecutive stop pairs, routes a car between each unique pair once, and
//! records the ordered stable edge IDs of the discovered path. Stop pairs
//! with no discoverable path are counted and skipped, never stored: absence
//! of a key is the contract for "no street link known".
//!
//! Route metadata is recorded for every route of the feed, street-based or
//! not, so legs of any mode can be decorated at serve time.

use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use tracing::info;

use waylink_core::engine::RoutingEngine;
use waylink_core::path_details::{text_values, STABLE_EDGE_IDS};
use waylink_core::stable_id::StableIdValues;
use waylink_core::stitch::{RouteRequest, ViaRouter};

use crate::feed::TransitFeed;

/// Visited-node budget per stop-pair search. Stop pairs are short hops;
/// anything that blows this budget is as good as unroutable.
pub const DEFAULT_MAX_VISITED_NODES: usize = 10_000;

#[derive(Debug, Clone)]
pub struct LinkMapperConfig {
    pub max_visited_nodes: usize,
}

impl Default for LinkMapperConfig {
    fn default() -> Self {
        Self { max_visited_nodes: DEFAULT_MAX_VISITED_NODES }
    }
}

/// The two logical tables produced by the batch pass. Ordered maps so the
/// persisted file layout is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkTables {
    /// `{feed_id}:{from_stop_id},{to_stop_id}` -> comma-joined stable IDs.
    pub links: BTreeMap<String, String>,
    /// `{feed_id}:{route_id}` -> `agency,short_name,long_name,route_type`.
    pub route_info: BTreeMap<String, String>,
}

impl LinkTables {
    pub fn stop_pair_key(feed_id: &str, from_stop: &str, to_stop: &str) -> String {
        format!("{feed_id}:{from_stop},{to_stop}")
    }

    pub fn route_key(feed_id: &str, route_id: &str) -> String {
        format!("{feed_id}:{route_id}")
    }
}

/// End-of-run statistics for one feed. Omissions live here, not in errors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MapperCounters {
    pub trips_processed: usize,
    pub od_pairs: usize,
    /// Pairs already routed for an earlier trip of this feed.
    pub non_unique_pairs: usize,
    /// Pairs whose stops are the same stop.
    pub self_pairs: usize,
    /// Pairs referencing a stop with no usable coordinates.
    pub missing_stops: usize,
    /// Pairs with no discoverable street path.
    pub routes_not_found: usize,
}

/// Map one feed into `tables`, returning the run's counters.
pub fn map_feed<E: RoutingEngine + ?Sized>(
    engine: &mut E,
    stable_ids: &StableIdValues,
    feed: &TransitFeed,
    config: &LinkMapperConfig,
    tables: &mut LinkTables,
) -> MapperCounters {
    info!(feed = %feed.feed_id, "processing transit feed");

    // Route info is stored for every route type, not just street-based ones.
    for route in feed.routes.values() {
        tables.route_info.insert(
            LinkTables::route_key(&feed.feed_id, &route.id),
            format!(
                "{},{},{},{}",
                route.agency_name, route.short_name, route.long_name, route.route_type
            ),
        );
    }

    let street_routes: FxHashSet<&str> = feed.street_based_route_ids();
    let mut counters = MapperCounters::default();
    let mut router = ViaRouter::new(engine, stable_ids);

    for trip in &feed.trips {
        if !street_routes.contains(trip.route_id.as_str()) {
            continue;
        }
        counters.trips_processed += 1;

        for pair in trip.stop_ids.windows(2) {
            let (from_id, to_id) = (&pair[0], &pair[1]);
            counters.od_pairs += 1;

            if from_id == to_id {
                counters.self_pairs += 1;
                continue;
            }
            let key = LinkTables::stop_pair_key(&feed.feed_id, from_id, to_id);
            if tables.links.contains_key(&key) {
                counters.non_unique_pairs += 1;
                continue;
            }

            let (Some(from), Some(to)) = (feed.stops.get(from_id), feed.stops.get(to_id))
            else {
                counters.missing_stops += 1;
                continue;
            };

            let mut request =
                RouteRequest::between(vec![(from.lat, from.lon), (to.lat, to.lon)]);
            request.max_visited_nodes = config.max_visited_nodes;
            request.path_details = vec![STABLE_EDGE_IDS.to_string()];

            // Any failure here is an expected omission of a best-effort
            // offline pass, not an error: the pair simply stays unlinked.
            let edge_ids = match router.route(&request) {
                Ok(route) => text_values(&route.details[STABLE_EDGE_IDS]),
                Err(_) => Vec::new(),
            };
            if edge_ids.is_empty() {
                counters.routes_not_found += 1;
                continue;
            }
            tables.links.insert(key, edge_ids.join(","));
        }
    }

    info!(
        feed = %feed.feed_id,
        trips = counters.trips_processed,
        od_pairs = counters.od_pairs,
        non_unique = counters.non_unique_pairs,
        not_found = counters.routes_not_found,
        "done processing transit feed"
    );
    counters
}

/// Run the offline pass over a feed set, producing the immutable tables the
/// serving process opens read-only.
pub fn map_feeds<E: RoutingEngine + ?Sized>(
    engine: &mut E,
    stable_ids: &StableIdValues,
    feeds: &[TransitFeed],
    config: &LinkMapperConfig,
) -> LinkTables {
    let mut tables = LinkTables::default();
    for feed in feeds {
        map_feed(engine, stable_ids, feed, config, &mut tables);
    }
    info!(
        feeds = feeds.len(),
        links = tables.links.len(),
        routes = tables.route_info.len(),
        "done creating transit link mappings"
    );
    tables
}
