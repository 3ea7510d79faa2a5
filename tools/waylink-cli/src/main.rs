//! waylink CLI - offline batch commands around the transit link tables.
//!
//! `gtfs-links` runs the whole offline pass self-contained: it loads a
//! street network into the in-memory reference engine, assigns stable edge
//! IDs, maps every feed's stop pairs and persists the link tables.
//! Deployments embedding a full routing engine run the same library calls
//! against their own [`RoutingEngine`] implementation.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use waylink_core::engine::memory::{MemoryEngine, NetworkSpec};
use waylink_core::engine::RoutingEngine;
use waylink_core::stable_id::{assign_stable_ids, StableIdValues};
use waylink_transit::csv_export::write_link_csv;
use waylink_transit::formats::LinkTableFile;
use waylink_transit::mapper::{map_feeds, LinkMapperConfig};
use waylink_transit::{decorate_pt_leg, LinkRepository, PtLeg, TransitFeed};

#[derive(Parser)]
#[command(name = "waylink")]
#[command(about = "Stable edge IDs and transit-to-street link tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the transit link table from a feed set
    GtfsLinks {
        /// Street network JSON (nodes + edges) for the reference engine
        #[arg(long)]
        network: PathBuf,

        /// GTFS feeds as id=path, repeatable
        #[arg(long = "feed", required = true)]
        feeds: Vec<String>,

        /// Output path for the persisted link table
        #[arg(short, long)]
        out: PathBuf,

        /// Also write the link mappings as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Visited-node budget per stop-pair search
        #[arg(long, default_value_t = waylink_transit::mapper::DEFAULT_MAX_VISITED_NODES)]
        max_visited_nodes: usize,
    },

    /// Summarize a persisted link table, or look up one key
    InspectLinks {
        /// Path to the persisted link table
        #[arg(short, long)]
        table: PathBuf,

        /// Stop-pair key to look up: feed_id:from_stop,to_stop
        #[arg(long)]
        key: Option<String>,
    },

    /// Decorate one transit leg from a persisted link table
    Decorate {
        /// Path to the persisted link table
        #[arg(short, long)]
        table: PathBuf,

        #[arg(long)]
        feed_id: String,

        #[arg(long)]
        route_id: String,

        /// Comma-separated stop IDs, in travel order
        #[arg(long)]
        stops: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match Cli::parse().command {
        Commands::GtfsLinks { network, feeds, out, csv, max_visited_nodes } => {
            build_links(&network, &feeds, &out, csv.as_deref(), max_visited_nodes)
        }
        Commands::InspectLinks { table, key } => inspect_links(&table, key.as_deref()),
        Commands::Decorate { table, feed_id, route_id, stops } => {
            decorate(&table, &feed_id, &route_id, &stops)
        }
    }
}

fn build_links(
    network_path: &Path,
    feed_args: &[String],
    out: &Path,
    csv: Option<&Path>,
    max_visited_nodes: usize,
) -> Result<()> {
    let json = fs::read_to_string(network_path)
        .with_context(|| format!("reading street network {}", network_path.display()))?;
    let spec: NetworkSpec =
        serde_json::from_str(&json).context("parsing street network JSON")?;
    let mut engine = MemoryEngine::from_spec(&spec).context("building street graph")?;
    info!(
        nodes = engine.node_count(),
        edges = engine.edge_count(),
        "loaded street network"
    );

    let values = StableIdValues::create(engine.attributes_mut());
    assign_stable_ids(&mut engine, &values);

    let mut feeds = Vec::with_capacity(feed_args.len());
    for arg in feed_args {
        let Some((feed_id, path)) = arg.split_once('=') else {
            bail!("feed '{arg}' is not of the form id=path");
        };
        let feed = TransitFeed::from_gtfs(feed_id, Path::new(path))
            .with_context(|| format!("loading GTFS feed {feed_id}"))?;
        info!(
            feed = feed_id,
            routes = feed.routes.len(),
            trips = feed.trips.len(),
            stops = feed.stops.len(),
            "loaded GTFS feed"
        );
        feeds.push(feed);
    }

    let config = LinkMapperConfig { max_visited_nodes };
    let tables = map_feeds(&mut engine, &values, &feeds, &config);

    LinkTableFile::write(out, &tables)
        .with_context(|| format!("writing link table {}", out.display()))?;
    info!(
        links = tables.links.len(),
        routes = tables.route_info.len(),
        out = %out.display(),
        "wrote link table"
    );

    if let Some(csv_path) = csv {
        write_link_csv(csv_path, &feeds, &tables)
            .with_context(|| format!("writing link CSV {}", csv_path.display()))?;
    }
    Ok(())
}

fn inspect_links(table: &Path, key: Option<&str>) -> Result<()> {
    let tables = LinkTableFile::read(table)
        .with_context(|| format!("reading link table {}", table.display()))?;

    match key {
        Some(key) => match tables.links.get(key) {
            Some(value) => println!("{key} -> {value}"),
            None => bail!("no link entry for key '{key}'"),
        },
        None => {
            println!("link entries:  {}", tables.links.len());
            println!("route entries: {}", tables.route_info.len());
            let edge_ids: usize = tables
                .links
                .values()
                .map(|v| v.split(',').count())
                .sum();
            println!("street edges referenced (with repeats): {edge_ids}");
        }
    }
    Ok(())
}

fn decorate(table: &Path, feed_id: &str, route_id: &str, stops: &str) -> Result<()> {
    let repo = LinkRepository::open(table)
        .with_context(|| format!("opening link table {}", table.display()))?;

    let leg = PtLeg {
        feed_id: feed_id.to_string(),
        route_id: route_id.to_string(),
        stop_ids: stops.split(',').map(str::to_string).collect(),
    };
    if leg.stop_ids.len() < 2 {
        bail!("need at least two stops, got '{stops}'");
    }

    let decorated = decorate_pt_leg(&repo, &leg);
    serde_json::to_writer_pretty(std::io::stdout().lock(), &serde_json::json!({
        "stable_edge_ids": decorated.stable_edge_ids,
        "agency_name": decorated.route.as_ref().map(|r| r.agency_name.clone()),
        "route_short_name": decorated.route.as_ref().map(|r| r.route_short_name.clone()),
        "route_long_name": decorated.route.as_ref().map(|r| r.route_long_name.clone()),
        "route_type": decorated.route.as_ref().map(|r| r.route_type.clone()),
    }))?;
    println!();
    Ok(())
}
