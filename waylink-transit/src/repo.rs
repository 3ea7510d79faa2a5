//! Read-only view over the persisted link tables.
//!
//! The repository is constructed explicitly at service start — typically
//! [`LinkRepository::open`] on the file the batch job wrote — and injected
//! into whatever decorates transit legs. Nothing mutates it afterwards;
//! refreshing the mappings means re-running the batch job and restarting.

use rustc_hash::FxHashMap;
use std::path::Path;
use tracing::info;

use crate::formats::link_table::{LinkTableError, LinkTableFile};
use crate::mapper::LinkTables;

/// Decoded route metadata for one transit route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub agency_name: String,
    pub route_short_name: String,
    pub route_long_name: String,
    pub route_type: String,
}

pub struct LinkRepository {
    links: FxHashMap<String, String>,
    route_info: FxHashMap<String, String>,
}

impl LinkRepository {
    /// Open a persisted link table read-only.
    pub fn open(path: &Path) -> Result<Self, LinkTableError> {
        let tables = LinkTableFile::read(path)?;
        let repo = Self::from_tables(tables);
        info!(
            links = repo.link_count(),
            routes = repo.route_count(),
            "loaded transit link mappings"
        );
        Ok(repo)
    }

    /// Snapshot freshly built tables without a round-trip through disk.
    pub fn from_tables(tables: LinkTables) -> Self {
        Self {
            links: tables.links.into_iter().collect(),
            route_info: tables.route_info.into_iter().collect(),
        }
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn route_count(&self) -> usize {
        self.route_info.len()
    }

    /// Ordered stable edge IDs between two adjacent stops, if the batch pass
    /// discovered a street path for them.
    pub fn edge_ids_for_stop_pair(
        &self,
        feed_id: &str,
        from_stop: &str,
        to_stop: &str,
    ) -> Option<Vec<String>> {
        let key = LinkTables::stop_pair_key(feed_id, from_stop, to_stop);
        let value = self.links.get(&key)?;
        if value.is_empty() {
            return None;
        }
        Some(value.split(',').map(str::to_string).collect())
    }

    /// Route metadata, split from its `agency,short,long,type` encoding.
    /// Fields beyond the first three keep no embedded commas by contract.
    pub fn route_info(&self, feed_id: &str, route_id: &str) -> Option<RouteInfo> {
        let value = self.route_info.get(&LinkTables::route_key(feed_id, route_id))?;
        let mut fields = value.splitn(4, ',');
        Some(RouteInfo {
            agency_name: fields.next().unwrap_or_default().to_string(),
            route_short_name: fields.next().unwrap_or_default().to_string(),
            route_long_name: fields.next().unwrap_or_default().to_string(),
            route_type: fields.next().unwrap_or_default().to_string(),
        })
    }
}
