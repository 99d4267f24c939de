//! Tile compilation pipeline.
//!
//! Drives one tile from JSON description to binary file: build the routing
//! graph from road polylines, correct sharp angles, attach restrictions and
//! through-routes, partition into route centers, serialize.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::warn;

use crate::angles::AngleChecker;
use crate::formats::{TileWriter, TileWriterConfig};
use crate::geo::Coord;
use crate::graph::{RoadNetwork, RoutePoint};
use crate::input::TileDescription;
use crate::partition::{GreedyPartitioner, Partition};
use crate::road::{AccessMask, RoadClass, RoadDef, RoadId};

#[derive(Debug, Clone)]
pub struct CompileConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    pub drive_on_left: bool,
    pub enable_restrictions: bool,
}

#[derive(Debug, Clone)]
pub struct CompileSummary {
    pub nodes: usize,
    pub arcs: usize,
    pub roads: usize,
    pub centers: usize,
    pub adjusted_nodes: usize,
    pub shortfalls: usize,
    pub restrictions_attached: usize,
    pub restrictions_dropped: usize,
    pub through_routes_attached: usize,
    pub file_size: usize,
}

/// Compile one tile description into a binary routing tile.
pub fn compile_tile(config: &CompileConfig) -> Result<CompileSummary> {
    let start = Instant::now();
    println!("Compiling routing tile");
    println!("  Input:  {}", config.input.display());
    println!("  Output: {}", config.output.display());
    println!();

    println!("Loading tile description...");
    let desc = TileDescription::load(&config.input)?;
    println!(
        "  ✓ Loaded {} roads, {} restrictions, {} through-routes",
        desc.roads.len(),
        desc.restrictions.len(),
        desc.through_routes.len()
    );

    println!("Building routing graph...");
    let (mut net, road_ids) = build_network(&desc);
    println!(
        "  ✓ Built {} nodes, {} arcs from {} roads",
        net.nodes.len(),
        net.arcs.len(),
        net.roads.len()
    );

    println!("Correcting sharp angles...");
    let stats = AngleChecker::new().correct(&mut net);
    println!(
        "  ✓ Adjusted {} nodes ({} shortfalls, {} compact)",
        stats.adjusted_nodes, stats.shortfalls, stats.compact_nodes
    );

    let mut attached = 0usize;
    if config.enable_restrictions {
        println!("Attaching restrictions...");
        for r in &desc.restrictions {
            if net.add_restriction(r.from_node, r.to_node, r.via_node, AccessMask(r.except)) {
                attached += 1;
            }
        }
        println!(
            "  ✓ Attached {} of {} restrictions",
            attached,
            desc.restrictions.len()
        );
    }

    // Through-routes are route-following hints, not restrictions; they are
    // attached regardless of the restrictions flag.
    let mut through_routes = 0usize;
    for t in &desc.through_routes {
        match (road_ids.get(&t.road_a), road_ids.get(&t.road_b)) {
            (Some(a), Some(b)) => {
                if net.add_through_route(t.node, a.0, b.0).is_some() {
                    through_routes += 1;
                }
            }
            _ => warn!(
                road_a = t.road_a,
                road_b = t.road_b,
                "through-route references unknown road; dropped"
            ),
        }
    }

    println!("Partitioning into route centers...");
    let centers = GreedyPartitioner::default().partition(&net);
    println!("  ✓ {} route centers", centers.len());

    println!("Writing {}...", config.output.display());
    let tile_name = config
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("tile"));
    let writer = TileWriter::new(TileWriterConfig {
        tile_name,
        drive_on_left: config.drive_on_left,
        enable_restrictions: config.enable_restrictions,
        ..TileWriterConfig::default()
    });
    let image = writer
        .write_to(&config.output, &net, &centers)
        .with_context(|| format!("failed to compile {}", config.input.display()))?;

    let file_size = image.buffer.len();
    println!();
    println!("✅ Tile compiled");
    println!("  Nodes: {}", net.nodes.len());
    println!("  File size: {} bytes", file_size);
    println!("  Time: {:.2}s", start.elapsed().as_secs_f64());

    Ok(CompileSummary {
        nodes: net.nodes.len(),
        arcs: net.arcs.len(),
        roads: net.roads.len(),
        centers: centers.len(),
        adjusted_nodes: stats.adjusted_nodes,
        shortfalls: stats.shortfalls,
        restrictions_attached: attached,
        restrictions_dropped: desc.restrictions.len() - attached,
        through_routes_attached: through_routes,
        file_size,
    })
}

/// Feed every road polyline into the graph builder, keeping the source-id
/// to arena-id mapping for through-route resolution.
fn build_network(desc: &TileDescription) -> (RoadNetwork, FxHashMap<u32, RoadId>) {
    let mut net = RoadNetwork::new();
    let mut road_ids = FxHashMap::default();

    for road in &desc.roads {
        if road.points.len() < 2 {
            warn!(road = road.id, "road has fewer than two points; skipped");
            continue;
        }
        let points: Vec<RoutePoint> = road
            .points
            .iter()
            .map(|p| {
                let coord = Coord::from_degrees(p.lat, p.lon);
                let mut point = if p.node_id != 0 {
                    RoutePoint::routing(coord, p.node_id)
                } else {
                    RoutePoint::shape(coord)
                };
                point.boundary = p.boundary;
                point
            })
            .collect();

        let mut def = RoadDef::new(RoadClass(road.class), road.speed, AccessMask(road.access));
        def.oneway = road.oneway;
        def.toll = road.toll;
        def.roundabout = road.roundabout;
        def.synthesized = road.synthesized;
        def.label_offset = road.label_offset;

        let id = net.add_road(&points, def);
        if road_ids.insert(road.id, id).is_some() {
            warn!(road = road.id, "duplicate source road id");
        }
    }

    net.assert_arc_symmetry();
    (net, road_ids)
}
