//! Two-phase routing-tile writer.
//!
//! Section layout (little-endian throughout):
//!
//! Section 1 (nodes), one block per RouteCenter:
//!   center_lat: i32, center_lon: i32
//!   node_count: u16, tablea_count: u16
//!   node records, then Table A (tablea_count 6-byte records:
//!     road_offset u32 [patched in pass 2], class u8, access u8)
//!
//! Node record:
//!   flags: u8    // 0x01 arcs, 0x02 restrictions, 0x04 boundary,
//!                // 0x08 compact headings
//!   lat: i32, lon: i32
//!   if arcs: arc records, 9 bytes each:
//!     flags: u8        // 0x80 last, 0x40 forward, 0x20 has-shape
//!     tablea_idx: u8
//!     heading: i8      // 256ths of a turn
//!     dest_offset: u24 // section-1-relative
//!     length: u24      // meters, saturating
//!   if restrictions: count u8, then 3-byte records:
//!     from_arc_idx: u8, to_arc_idx: u8, except: u8
//!
//! Section 2 (roads), 12-byte records in road order:
//!   class u8, flags u8, speed u8, access u8,
//!   start_node_offset u32, label_offset u32
//!
//! Section 3 (boundary nodes) and section 4 (high-class boundary nodes,
//! 0x200-aligned): 9-byte records, sorted by the node total order:
//!   lat u24, lon u24 (map units), node_offset u24
//!
//! Pass 1 writes sections 1-4 with blank Table A road offsets, recording
//! node and road offsets as they land. Pass 2 ("write_post") patches the
//! Table A slots with the section-2 offsets, rewrites the header with final
//! section boundaries, and appends the CRC-64 footer. Ordering is
//! load-bearing: the patch pass is only correct once every section is
//! written.

use anyhow::{Context, Result};
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::CapacityError;
use crate::graph::{NodeId, RoadNetwork, RouteNode};
use crate::partition::{boundary_nodes, RouteCenter};
use crate::road::RoadId;

use super::header::{self, HighBounds, TileHeader};
use super::section::{Patch, SectionWriter, TileBuffer};
use super::crc;

const NODE_HAS_ARCS: u8 = 0x01;
const NODE_HAS_RESTRICTIONS: u8 = 0x02;
const NODE_BOUNDARY: u8 = 0x04;
const NODE_COMPACT_HEADINGS: u8 = 0x08;

const ARC_LAST: u8 = 0x80;
const ARC_FORWARD: u8 = 0x40;
const ARC_HAS_SHAPE: u8 = 0x20;

const CENTER_HEADER_SIZE: usize = 12;
const NODE_FIXED_SIZE: usize = 9;
const ARC_RECORD_SIZE: usize = 9;
const RESTRICTION_RECORD_SIZE: usize = 3;
const TABLEA_RECORD_SIZE: usize = 6;
const ROAD_RECORD_SIZE: usize = 12;

const MAX_ARC_LENGTH_M: u32 = 0xFF_FFFF;
const NO_START_NODE: u32 = 0xFFFF_FFFF;

/// Writer limits and build-wide header state.
#[derive(Debug, Clone)]
pub struct TileWriterConfig {
    /// Tile name used in capacity diagnostics.
    pub tile_name: String,
    /// Header flag; must be set identically for every file of one build.
    pub drive_on_left: bool,
    pub enable_restrictions: bool,
    /// Conservative node-section limit, enforced before the hard one.
    pub node_section_soft_limit: u32,
    /// Absolute addressable limit of the 24-bit node offsets.
    pub node_section_hard_limit: u32,
}

impl Default for TileWriterConfig {
    fn default() -> Self {
        Self {
            tile_name: String::from("tile"),
            drive_on_left: false,
            enable_restrictions: true,
            node_section_soft_limit: 0xF0_0000,
            node_section_hard_limit: 0xFF_FFFF,
        }
    }
}

/// The assembled tile image plus the offset maps the tests and the pipeline
/// summary need.
#[derive(Debug)]
pub struct TileImage {
    pub buffer: TileBuffer,
    pub header: TileHeader,
    /// Section-1-relative byte offset of every node, indexed by arena id.
    pub node_offsets: Vec<u32>,
    /// Section-2-relative byte offset of every road record.
    pub road_offsets: Vec<u32>,
}

pub struct TileWriter {
    config: TileWriterConfig,
}

/// Per-center layout computed before any byte is written: the arc records
/// reference nodes of later centers, so all node offsets must be known up
/// front.
struct CenterLayout {
    /// Road → Table A slot, in first-use order.
    tablea: FxHashMap<RoadId, u8>,
    tablea_roads: Vec<RoadId>,
    /// Highest node class inside the center.
    max_class: u8,
    /// Section-relative end offset of the center block.
    end_offset: u32,
}

impl TileWriter {
    pub fn new(config: TileWriterConfig) -> Self {
        Self { config }
    }

    /// Build the tile image in memory (both passes).
    pub fn build(&self, net: &RoadNetwork, centers: &[RouteCenter]) -> Result<TileImage> {
        // Centers are serialized highest-class first so the header's class
        // boundary table partitions the node section.
        let mut order: Vec<usize> = (0..centers.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(center_class(net, &centers[i])));

        let (layouts, node_offsets) = self.layout(net, centers, &order)?;

        let mut buf = TileBuffer::new();
        buf.put_bytes(&vec![0u8; header::LONG_HEADER_LEN as usize]);

        // Pass 1, section 1: nodes grouped into centers, Table A blank.
        let mut tablea_patches: Vec<(Patch, RoadId)> = Vec::new();
        let (nodes_pos, nodes_size) = {
            let mut sect = buf.section();
            for (&center_idx, layout) in order.iter().zip(&layouts) {
                self.write_center(
                    &mut sect,
                    net,
                    &centers[center_idx],
                    layout,
                    &node_offsets,
                    &mut tablea_patches,
                )?;
            }
            (sect.base() as u32, sect.position() as u32)
        };

        // Pass 1, section 2: road records can reference the node offsets
        // recorded above directly.
        let mut road_offsets = Vec::with_capacity(net.roads.len());
        let (roads_pos, roads_size) = {
            let mut sect = buf.section();
            for road in &net.roads {
                let record_start = sect.position();
                road_offsets.push(record_start as u32);
                sect.put_u8(road.class.0);
                sect.put_u8(road.flags_byte());
                sect.put_u8(road.speed);
                sect.put_u8(road.access.0);
                let start = match road.start_node {
                    Some(id) => node_offsets[id.0 as usize],
                    None => NO_START_NODE,
                };
                sect.put_u32(start);
                sect.put_u32(road.label_offset);
                debug_assert_eq!(sect.position() - record_start, ROAD_RECORD_SIZE);
            }
            (sect.base() as u32, sect.position() as u32)
        };

        // Pass 1, sections 3 and 4: boundary tables in node total order.
        let bounds = boundary_nodes(net);
        let (bounds_pos, bounds_size) = {
            let mut sect = buf.section();
            for &id in &bounds {
                write_boundary_record(sect.buffer(), net.node(id), node_offsets[id.0 as usize]);
            }
            (sect.base() as u32, sect.position() as u32)
        };

        buf.align_to(0x200);
        let (high_pos, high_size) = {
            let mut sect = buf.section();
            for &id in &bounds {
                if net.node(id).node_class.above_default() {
                    write_boundary_record(sect.buffer(), net.node(id), node_offsets[id.0 as usize]);
                }
            }
            (sect.base() as u32, sect.position() as u32)
        };

        // Pass 2: resolve the forward references now that every section is
        // in place.
        for (patch, road) in tablea_patches {
            buf.patch_u32(patch, road_offsets[road.0 as usize]);
        }

        let header = TileHeader {
            created_unix: chrono::Utc::now().timestamp() as u64,
            nodes_pos,
            nodes_size,
            drive_on_left: self.config.drive_on_left,
            restrictions_enabled: self.config.enable_restrictions,
            align: 0,
            ptr_mult: 0,
            roads_pos,
            roads_size,
            bounds_pos,
            bounds_size,
            high_bounds: Some(HighBounds {
                pos: high_pos,
                size: high_size,
                class_boundaries: class_boundaries(&layouts, nodes_size),
            }),
        };
        buf.overwrite(0, &header.to_bytes());

        let footer = crc::checksum(buf.as_slice());
        buf.put_u64(footer);

        Ok(TileImage {
            buffer: buf,
            header,
            node_offsets,
            road_offsets,
        })
    }

    /// Build and flush to disk.
    pub fn write_to<P: AsRef<Path>>(
        &self,
        path: P,
        net: &RoadNetwork,
        centers: &[RouteCenter],
    ) -> Result<TileImage> {
        let image = self.build(net, centers)?;
        fs::write(path.as_ref(), image.buffer.as_slice())
            .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(image)
    }

    /// Size every center and assign each node its section-relative offset.
    fn layout(
        &self,
        net: &RoadNetwork,
        centers: &[RouteCenter],
        order: &[usize],
    ) -> Result<(Vec<CenterLayout>, Vec<u32>)> {
        let mut node_offsets = vec![u32::MAX; net.nodes.len()];
        let mut placed = vec![false; net.nodes.len()];
        let mut layouts = Vec::with_capacity(centers.len());
        let mut offset: u64 = 0;

        for &center_idx in order {
            let center = &centers[center_idx];
            if center.nodes.len() > u16::MAX as usize {
                return Err(CapacityError::CenterNodes {
                    tile: self.config.tile_name.clone(),
                    count: center.nodes.len(),
                    limit: u16::MAX as usize,
                }
                .into());
            }

            let mut tablea: FxHashMap<RoadId, u8> = FxHashMap::default();
            let mut tablea_roads = Vec::new();
            let mut max_class = 0u8;
            offset += CENTER_HEADER_SIZE as u64;

            for &id in &center.nodes {
                // A node in two centers would serialize twice and corrupt
                // every reference to it; that is a partitioner defect.
                assert!(
                    !placed[id.0 as usize],
                    "node {:?} appears in two route centers",
                    id
                );
                placed[id.0 as usize] = true;
                node_offsets[id.0 as usize] = offset as u32;

                let node = net.node(id);
                max_class = max_class.max(node.node_class.0);
                if node.restrictions.len() > u8::MAX as usize {
                    return Err(CapacityError::Restrictions {
                        tile: self.config.tile_name.clone(),
                        count: node.restrictions.len(),
                        limit: u8::MAX as usize,
                    }
                    .into());
                }

                for &arc_id in &node.arcs {
                    let road = net.arc(arc_id).road;
                    if !tablea.contains_key(&road) {
                        if tablea.len() > u8::MAX as usize {
                            return Err(CapacityError::TableA {
                                tile: self.config.tile_name.clone(),
                                count: tablea.len() + 1,
                                limit: u8::MAX as usize + 1,
                            }
                            .into());
                        }
                        tablea.insert(road, tablea.len() as u8);
                        tablea_roads.push(road);
                    }
                }
                offset += node_record_size(node) as u64;
            }

            offset += (tablea_roads.len() * TABLEA_RECORD_SIZE) as u64;
            layouts.push(CenterLayout {
                tablea,
                tablea_roads,
                max_class,
                end_offset: offset.min(u32::MAX as u64) as u32,
            });
        }

        // The conservative limit fires first; the hard limit is the format's
        // absolute addressable range.
        for limit in [
            self.config.node_section_soft_limit,
            self.config.node_section_hard_limit,
        ] {
            if offset > limit as u64 {
                return Err(CapacityError::NodeSection {
                    tile: self.config.tile_name.clone(),
                    offset,
                    limit: limit as u64,
                }
                .into());
            }
        }

        assert!(
            placed.iter().all(|&p| p),
            "partitioner left nodes outside every route center"
        );
        Ok((layouts, node_offsets))
    }

    fn write_center(
        &self,
        sect: &mut SectionWriter<'_>,
        net: &RoadNetwork,
        center: &RouteCenter,
        layout: &CenterLayout,
        node_offsets: &[u32],
        tablea_patches: &mut Vec<(Patch, RoadId)>,
    ) -> Result<()> {
        sect.put_i32(center.center.lat);
        sect.put_i32(center.center.lon);
        sect.put_u16(center.nodes.len() as u16);
        sect.put_u16(layout.tablea_roads.len() as u16);

        for &id in &center.nodes {
            debug_assert_eq!(
                sect.position() as u32,
                node_offsets[id.0 as usize],
                "layout and writer disagree on node offset"
            );
            self.write_node(sect.buffer(), net, id, layout, node_offsets)?;
        }

        // Table A: road back-references are unknown until section 2 exists;
        // reserve and patch later.
        for &road in &layout.tablea_roads {
            let patch = sect.reserve_u32();
            tablea_patches.push((patch, road));
            let def = net.road(road);
            sect.put_u8(def.class.0);
            sect.put_u8(def.access.0);
        }

        debug_assert_eq!(sect.position() as u32, layout.end_offset);
        Ok(())
    }

    fn write_node(
        &self,
        buf: &mut TileBuffer,
        net: &RoadNetwork,
        id: NodeId,
        layout: &CenterLayout,
        node_offsets: &[u32],
    ) -> Result<()> {
        let node = net.node(id);

        let mut flags = 0u8;
        if !node.arcs.is_empty() {
            flags |= NODE_HAS_ARCS;
        }
        if !node.restrictions.is_empty() {
            flags |= NODE_HAS_RESTRICTIONS;
        }
        if node.boundary {
            flags |= NODE_BOUNDARY;
        }
        if node.use_compact_headings {
            flags |= NODE_COMPACT_HEADINGS;
        }
        buf.put_u8(flags);
        buf.put_i32(node.coord.lat);
        buf.put_i32(node.coord.lon);

        for (i, &arc_id) in node.arcs.iter().enumerate() {
            let arc = net.arc(arc_id);
            let mut arc_flags = 0u8;
            if i + 1 == node.arcs.len() {
                arc_flags |= ARC_LAST;
            }
            if arc.forward {
                arc_flags |= ARC_FORWARD;
            }
            if arc.is_curved() {
                arc_flags |= ARC_HAS_SHAPE;
            }
            buf.put_u8(arc_flags);
            buf.put_u8(layout.tablea[&arc.road]);
            buf.put_i8(crate::geo::heading_to_byte(arc.initial_heading));
            buf.put_u24(node_offsets[arc.dest.0 as usize]);

            let mut length = arc.length_m.round() as u64;
            if length > MAX_ARC_LENGTH_M as u64 {
                warn!(
                    length_m = length,
                    "arc length exceeds encodable range; saturating"
                );
                length = MAX_ARC_LENGTH_M as u64;
            }
            buf.put_u24(length as u32);
        }

        if !node.restrictions.is_empty() {
            buf.put_u8(node.restrictions.len() as u8);
            for r in &node.restrictions {
                // add_restriction only ever attaches arcs rooted at this
                // node; a miss here is a builder bug.
                let from_idx = arc_index(node, r.from_arc);
                let to_idx = arc_index(node, r.to_arc);
                buf.put_u8(from_idx);
                buf.put_u8(to_idx);
                buf.put_u8(r.except.0);
            }
        }
        Ok(())
    }
}

fn arc_index(node: &RouteNode, arc: crate::graph::ArcId) -> u8 {
    let idx = node
        .arcs
        .iter()
        .position(|&a| a == arc)
        .expect("restriction references an arc foreign to its via node");
    assert!(idx <= u8::MAX as usize, "arc list overflows index byte");
    idx as u8
}

fn node_record_size(node: &RouteNode) -> usize {
    let mut size = NODE_FIXED_SIZE + node.arcs.len() * ARC_RECORD_SIZE;
    if !node.restrictions.is_empty() {
        size += 1 + node.restrictions.len() * RESTRICTION_RECORD_SIZE;
    }
    size
}

fn write_boundary_record(buf: &mut TileBuffer, node: &RouteNode, node_offset: u32) {
    buf.put_u24(node.coord.lat_map_units());
    buf.put_u24(node.coord.lon_map_units());
    buf.put_u24(node_offset);
}

fn center_class(net: &RoadNetwork, center: &RouteCenter) -> u8 {
    center
        .nodes
        .iter()
        .map(|&id| net.node(id).node_class.0)
        .max()
        .unwrap_or(0)
}

/// Cumulative class-boundary offsets, class 4 first, each clamped so no
/// boundary ever exceeds the written node-section size.
fn class_boundaries(layouts: &[CenterLayout], nodes_size: u32) -> [u32; 5] {
    let mut boundaries = [nodes_size; 5];
    for (i, b) in boundaries.iter_mut().enumerate() {
        let class = 4 - i as u8;
        let end = layouts
            .iter()
            .filter(|l| l.max_class >= class)
            .map(|l| l.end_offset)
            .max()
            .unwrap_or(0);
        *b = end.min(nodes_size);
    }
    boundaries
}
