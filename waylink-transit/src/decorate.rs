//! Serve-time decoration of transit itinerary legs.
//!
//! A public-transit leg spanning stops `s0..sk` is decorated by looking up
//! the persisted edge sequence of each consecutive stop pair and
//! concatenating them. Adjacent segments were routed independently and both
//! include the shared boundary edge, so the join drops a segment's leading
//! edge when it repeats the previous segment's trailing edge — preserving
//! traversal order, never sorting.

use crate::repo::{LinkRepository, RouteInfo};

/// The slice of a transit leg decoration needs: which feed and route it
/// belongs to, and the stops it passes in order.
#[derive(Debug, Clone)]
pub struct PtLeg {
    pub feed_id: String,
    pub route_id: String,
    pub stop_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedPtLeg {
    /// Ordered stable edge IDs under the whole leg. Empty when no stop pair
    /// of the leg has a persisted link.
    pub stable_edge_ids: Vec<String>,
    /// Route metadata, when the feed's route info was recorded.
    pub route: Option<RouteInfo>,
}

/// Concatenate per-pair edge sequences, dropping duplicated boundary edges
/// at the joins.
pub fn concat_deduplicated<I>(segments: I) -> Vec<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out: Vec<String> = Vec::new();
    for segment in segments {
        let mut iter = segment.into_iter();
        if let Some(first) = iter.next() {
            if out.last() != Some(&first) {
                out.push(first);
            }
            out.extend(iter);
        }
    }
    out
}

/// Decorate one transit leg from the read-only link repository. Stop pairs
/// without a persisted link contribute nothing; the rest of the leg is still
/// decorated.
pub fn decorate_pt_leg(repo: &LinkRepository, leg: &PtLeg) -> DecoratedPtLeg {
    let segments = leg
        .stop_ids
        .windows(2)
        .filter_map(|pair| repo.edge_ids_for_stop_pair(&leg.feed_id, &pair[0], &pair[1]));

    DecoratedPtLeg {
        stable_edge_ids: concat_deduplicated(segments),
        route: repo.route_info(&leg.feed_id, &leg.route_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::LinkTables;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn boundary_edges_are_deduplicated_in_order() {
        let joined = concat_deduplicated(vec![ids(&["1", "2", "3"]), ids(&["3", "4"])]);
        assert_eq!(joined, ids(&["1", "2", "3", "4"]));

        // No shared boundary: nothing is dropped.
        let joined = concat_deduplicated(vec![ids(&["1", "2"]), ids(&["4", "5"])]);
        assert_eq!(joined, ids(&["1", "2", "4", "5"]));
    }

    #[test]
    fn dedup_never_reorders_or_grows() {
        let segments = vec![ids(&["9", "7"]), ids(&["7", "5"]), ids(&["5", "3", "1"])];
        let naive: Vec<String> = segments.iter().flatten().cloned().collect();
        let joined = concat_deduplicated(segments);

        assert!(joined.len() <= naive.len());
        assert_eq!(joined, ids(&["9", "7", "5", "3", "1"]));
        // Relative order of the surviving entries matches the naive concat.
        let mut naive_iter = naive.iter();
        for id in &joined {
            assert!(naive_iter.any(|n| n == id));
        }
    }

    #[test]
    fn leg_decoration_skips_unlinked_pairs() {
        let mut tables = LinkTables::default();
        tables.links.insert("kc:a,b".to_string(), "1,2".to_string());
        tables.links.insert("kc:c,d".to_string(), "8,9".to_string());
        tables
            .route_info
            .insert("kc:bus-1".to_string(), "Metro Transit,39,39th Street,3".to_string());
        let repo = LinkRepository::from_tables(tables);

        let leg = PtLeg {
            feed_id: "kc".to_string(),
            route_id: "bus-1".to_string(),
            // b->c has no persisted link.
            stop_ids: ids(&["a", "b", "c", "d"]),
        };
        let decorated = decorate_pt_leg(&repo, &leg);
        assert_eq!(decorated.stable_edge_ids, ids(&["1", "2", "8", "9"]));
        assert_eq!(decorated.route.unwrap().route_short_name, "39");
    }

    #[test]
    fn whole_leg_without_links_decorates_empty() {
        let repo = LinkRepository::from_tables(LinkTables::default());
        let leg = PtLeg {
            feed_id: "kc".to_string(),
            route_id: "ghost".to_string(),
            stop_ids: ids(&["a", "b"]),
        };
        let decorated = decorate_pt_leg(&repo, &leg);
        assert!(decorated.stable_edge_ids.is_empty());
        assert!(decorated.route.is_none());
    }
}
