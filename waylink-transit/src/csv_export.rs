//! CSV export of the link mappings.
//!
//! One row per (route, trip, consecutive stop pair) with the linked street
//! edges, for inspection and downstream bulk loads. Pairs with identical
//! stops and pairs the mapper could not link are skipped.

use std::path::Path;
use tracing::info;

use crate::feed::TransitFeed;
use crate::mapper::LinkTables;

/// Write all link mappings of `feeds` to a CSV file at `path`.
pub fn write_link_csv(
    path: &Path,
    feeds: &[TransitFeed],
    tables: &LinkTables,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "route_id",
        "feed_id",
        "stop_id",
        "next_stop_id",
        "stop_lat",
        "stop_lon",
        "stop_lat_next",
        "stop_lon_next",
        "street_edges",
        "transit_edge",
    ])?;

    let mut rows = 0usize;
    for feed in feeds {
        let street_routes = feed.street_based_route_ids();
        for trip in &feed.trips {
            if !street_routes.contains(trip.route_id.as_str()) {
                continue;
            }
            for pair in trip.stop_ids.windows(2) {
                let (from_id, to_id) = (&pair[0], &pair[1]);
                if from_id == to_id {
                    continue;
                }
                let key = LinkTables::stop_pair_key(&feed.feed_id, from_id, to_id);
                let Some(value) = tables.links.get(&key) else {
                    continue;
                };
                let (Some(from), Some(to)) = (feed.stops.get(from_id), feed.stops.get(to_id))
                else {
                    continue;
                };

                let street_edges = format!(
                    "[{}]",
                    value
                        .split(',')
                        .map(|id| format!("'{id}'"))
                        .collect::<Vec<_>>()
                        .join(",")
                );
                let transit_edge = format!(
                    "{feed}:{route}/{feed}:{from}/{feed}:{to}",
                    feed = feed.feed_id,
                    route = trip.route_id,
                    from = from_id,
                    to = to_id
                );

                let record = [
                    trip.route_id.clone(),
                    feed.feed_id.clone(),
                    from_id.clone(),
                    to_id.clone(),
                    format!("{:.6}", from.lat),
                    format!("{:.6}", from.lon),
                    format!("{:.6}", to.lat),
                    format!("{:.6}", to.lon),
                    street_edges,
                    transit_edge,
                ];
                writer.write_record(&record)?;
                rows += 1;
            }
        }
    }

    writer.flush()?;
    info!(rows, path = %path.display(), "wrote link mapping CSV");
    Ok(())
}
