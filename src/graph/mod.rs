//! Routing-graph construction from ordered road geometry.
//!
//! `RoadNetwork` owns arenas of nodes, arcs and road definitions; everything
//! references by stable integer index. Points flagged with a non-zero
//! external node id become (or reuse) a `RouteNode`; intermediate points are
//! shape-only. Each consecutive pair of routing nodes yields a forward and a
//! reverse `RouteArc` spanning the points between them.

pub mod node;
pub mod restrictions;

use std::hash::Hasher;

use rustc_hash::{FxHashMap, FxHashSet, FxHasher};
use tracing::{debug, warn};

use crate::geo::{reverse_heading, Coord};
use crate::road::{RoadDef, RoadId};

pub use node::{ArcId, NodeId, RouteArc, RouteNode, RouteRestriction};

/// One point of a road's ordered geometry. `node_id != 0` marks a routing
/// node assigned by the upstream splitter; coincident junction points of
/// different roads carry the same id.
#[derive(Debug, Clone, Copy)]
pub struct RoutePoint {
    pub coord: Coord,
    pub node_id: u64,
    pub boundary: bool,
}

impl RoutePoint {
    pub fn shape(coord: Coord) -> Self {
        Self {
            coord,
            node_id: 0,
            boundary: false,
        }
    }

    pub fn routing(coord: Coord, node_id: u64) -> Self {
        Self {
            coord,
            node_id,
            boundary: false,
        }
    }

    fn is_routing(&self) -> bool {
        self.node_id != 0
    }
}

/// The node/arc graph of one map tile.
#[derive(Debug, Default)]
pub struct RoadNetwork {
    pub nodes: Vec<RouteNode>,
    pub arcs: Vec<RouteArc>,
    pub roads: Vec<RoadDef>,
    node_index: FxHashMap<u64, NodeId>,
    /// External ids of nodes touched by a road with restricted access.
    restricted_touch: FxHashSet<u64>,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(&self, id: NodeId) -> &RouteNode {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut RouteNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn arc(&self, id: ArcId) -> &RouteArc {
        &self.arcs[id.0 as usize]
    }

    pub fn arc_mut(&mut self, id: ArcId) -> &mut RouteArc {
        &mut self.arcs[id.0 as usize]
    }

    pub fn road(&self, id: RoadId) -> &RoadDef {
        &self.roads[id.0 as usize]
    }

    /// Resolve an external node id to the arena node, if it was ever seen.
    pub fn resolve(&self, external_id: u64) -> Option<NodeId> {
        self.node_index.get(&external_id).copied()
    }

    /// The first outgoing arc from `from` to `to`.
    pub fn arc_between(&self, from: NodeId, to: NodeId) -> Option<ArcId> {
        self.node(from)
            .arcs
            .iter()
            .copied()
            .find(|&a| self.arc(a).dest == to)
    }

    /// Consume one road's point sequence, creating routing nodes and arc
    /// pairs between consecutive routing nodes.
    pub fn add_road(&mut self, points: &[RoutePoint], mut road: RoadDef) -> RoadId {
        let road_id = RoadId(self.roads.len() as u32);

        let routing: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_routing())
            .map(|(i, _)| i)
            .collect();

        // Register nodes first so the canonical start node exists even for
        // a road with a single routing node.
        for &i in &routing {
            let id = self.get_or_create_node(&points[i], &road);
            if road.start_node.is_none() {
                road.start_node = Some(id);
            }
            let class = road.class;
            let node = self.node_mut(id);
            if class > node.node_class {
                node.node_class = class;
            }
            node.boundary |= points[i].boundary;
        }

        for pair in routing.windows(2) {
            let (start, end) = (pair[0], pair[1]);
            self.add_arc_pair(points, start, end, road_id);
        }

        self.roads.push(road);
        road_id
    }

    fn get_or_create_node(&mut self, point: &RoutePoint, road: &RoadDef) -> NodeId {
        if let Some(&id) = self.node_index.get(&point.node_id) {
            // A shared node where some touching road restricts travel is a
            // candidate anchor for turn restrictions.
            if road.access.is_restricted() || self.restricted_touch.contains(&point.node_id) {
                self.node_mut(id).restriction_anchor = true;
            }
            if road.access.is_restricted() {
                self.restricted_touch.insert(point.node_id);
            }
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(RouteNode::new(point.coord));
        self.node_index.insert(point.node_id, id);
        if road.access.is_restricted() {
            self.restricted_touch.insert(point.node_id);
        }
        id
    }

    fn add_arc_pair(
        &mut self,
        points: &[RoutePoint],
        start: usize,
        end: usize,
        road_id: RoadId,
    ) {
        let source = self.node_index[&points[start].node_id];
        let dest = self.node_index[&points[end].node_id];
        let start_coord = points[start].coord;
        let end_coord = points[end].coord;

        if source == dest && start_coord == end_coord {
            warn!(
                road = road_id.0,
                node = ?source,
                "road has identical consecutive routing nodes; linking with zero-length arc"
            );
        }

        let mut length_m = 0.0;
        for w in points[start..=end].windows(2) {
            length_m += w[0].coord.distance(&w[1].coord);
        }
        let direct_length_m = start_coord.distance(&end_coord);

        // Bearings need a point distinct from the node itself; walk past
        // coincident points so degenerate first/last edges still yield a
        // well-defined heading.
        let initial_heading = points[start + 1..=end]
            .iter()
            .find(|p| p.coord != start_coord)
            .map(|p| start_coord.bearing_to(&p.coord))
            .unwrap_or(0.0);
        let final_heading = points[start..end]
            .iter()
            .rev()
            .find(|p| p.coord != end_coord)
            .map(|p| p.coord.bearing_to(&end_coord))
            .unwrap_or(0.0);
        let direct_heading = start_coord.bearing_to(&end_coord);

        let shape: Vec<Coord> = points[start + 1..end].iter().map(|p| p.coord).collect();
        let mut shape_rev = shape.clone();
        shape_rev.reverse();

        let fwd_hash = hash_points(points[start..=end].iter().map(|p| p.coord));
        let rev_hash = hash_points(points[start..=end].iter().rev().map(|p| p.coord));

        if let Some(dup) = self
            .node(source)
            .arcs
            .iter()
            .copied()
            .find(|&a| self.arc(a).dest == dest && self.arc(a).points_hash == fwd_hash)
        {
            debug!(
                road = road_id.0,
                other_road = self.arc(dup).road.0,
                "duplicate arc over identical point sequence"
            );
        }

        let fwd_id = ArcId(self.arcs.len() as u32);
        let rev_id = ArcId(self.arcs.len() as u32 + 1);

        self.arcs.push(RouteArc {
            road: road_id,
            source,
            dest,
            initial_heading,
            final_heading,
            direct_heading,
            length_m,
            direct_length_m,
            shape,
            points_hash: fwd_hash,
            forward: true,
            reverse: rev_id,
        });
        self.arcs.push(RouteArc {
            road: road_id,
            source: dest,
            dest: source,
            initial_heading: reverse_heading(final_heading),
            final_heading: reverse_heading(initial_heading),
            direct_heading: end_coord.bearing_to(&start_coord),
            length_m,
            direct_length_m,
            shape: shape_rev,
            points_hash: rev_hash,
            forward: false,
            reverse: fwd_id,
        });

        self.node_mut(source).arcs.push(fwd_id);
        self.node_mut(dest).arcs.push(rev_id);
        self.node_mut(dest).incoming.push(fwd_id);
        self.node_mut(source).incoming.push(rev_id);
    }

    /// Assert builder invariants: every arc has a reverse counterpart with
    /// swapped endpoints reachable through the destination's arc list. A
    /// violation is a builder bug, not bad input.
    pub fn assert_arc_symmetry(&self) {
        for (i, arc) in self.arcs.iter().enumerate() {
            let rev = self.arc(arc.reverse);
            assert_eq!(rev.source, arc.dest, "arc {} reverse source mismatch", i);
            assert_eq!(rev.dest, arc.source, "arc {} reverse dest mismatch", i);
            assert!(
                self.node(arc.dest).arcs.contains(&arc.reverse),
                "arc {} reverse not registered at destination",
                i
            );
        }
    }
}

fn hash_points(points: impl Iterator<Item = Coord>) -> u64 {
    let mut hasher = FxHasher::default();
    for c in points {
        hasher.write_i32(c.lat);
        hasher.write_i32(c.lon);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coord;
    use crate::road::{AccessMask, RoadClass, RoadDef, MODE_CAR};

    fn road(class: u8) -> RoadDef {
        RoadDef::new(RoadClass(class), 4, AccessMask::all())
    }

    fn pt(lat: f64, lon: f64, id: u64) -> RoutePoint {
        RoutePoint::routing(Coord::from_degrees(lat, lon), id)
    }

    #[test]
    fn test_arc_symmetry_and_pairing() {
        let mut net = RoadNetwork::new();
        net.add_road(
            &[
                pt(50.0, 4.0, 1),
                RoutePoint::shape(Coord::from_degrees(50.0, 4.005)),
                pt(50.0, 4.01, 2),
            ],
            road(2),
        );

        assert_eq!(net.nodes.len(), 2);
        assert_eq!(net.arcs.len(), 2);
        net.assert_arc_symmetry();

        let fwd = net.arc(ArcId(0));
        let rev = net.arc(ArcId(1));
        assert!(fwd.forward);
        assert!(!rev.forward);
        assert_eq!(fwd.length_m, rev.length_m);
        assert!((fwd.initial_heading - reverse_heading(rev.final_heading)).abs() < 1e-9);
    }

    #[test]
    fn test_node_identity_across_roads() {
        let mut net = RoadNetwork::new();
        net.add_road(&[pt(50.0, 4.0, 1), pt(50.0, 4.01, 2)], road(2));
        net.add_road(&[pt(50.0, 4.01, 2), pt(50.01, 4.01, 3)], road(3));

        // The shared coordinate resolves to the same arena node.
        assert_eq!(net.nodes.len(), 3);
        let shared = net.resolve(2).unwrap();
        assert_eq!(net.node(shared).arcs.len(), 2);
        // Node class follows the highest touching road.
        assert_eq!(net.node(shared).node_class, RoadClass(3));
    }

    #[test]
    fn test_zero_length_road_still_linked() {
        let mut net = RoadNetwork::new();
        let c = Coord::from_degrees(50.0, 4.0);
        net.add_road(
            &[RoutePoint::routing(c, 1), RoutePoint::routing(c, 1)],
            road(1),
        );
        assert_eq!(net.nodes.len(), 1);
        assert_eq!(net.arcs.len(), 2);
        assert_eq!(net.arc(ArcId(0)).length_m, 0.0);
        net.assert_arc_symmetry();
    }

    #[test]
    fn test_bearing_walks_past_coincident_point() {
        let mut net = RoadNetwork::new();
        let start = Coord::from_degrees(50.0, 4.0);
        // First shape point coincides with the start node; the bearing must
        // come from the next distinct point, due east.
        net.add_road(
            &[
                RoutePoint::routing(start, 1),
                RoutePoint::shape(start),
                RoutePoint::shape(Coord::from_degrees(50.0, 4.005)),
                pt(50.0, 4.01, 2),
            ],
            road(2),
        );
        let fwd = net.arc(ArcId(0));
        assert!((fwd.initial_heading - 90.0).abs() < 0.5, "{}", fwd.initial_heading);
    }

    #[test]
    fn test_start_node_is_first_routing_node() {
        let mut net = RoadNetwork::new();
        let id = net.add_road(&[pt(50.0, 4.0, 7), pt(50.0, 4.01, 8)], road(2));
        assert_eq!(net.road(id).start_node, net.resolve(7));
    }

    #[test]
    fn test_restriction_anchor_marking() {
        let mut net = RoadNetwork::new();
        net.add_road(&[pt(50.0, 4.0, 1), pt(50.0, 4.01, 2)], road(2));
        let mut restricted = road(2);
        restricted.access = AccessMask(MODE_CAR);
        net.add_road(&[pt(50.0, 4.01, 2), pt(50.01, 4.01, 3)], restricted);

        let shared = net.resolve(2).unwrap();
        assert!(net.node(shared).restriction_anchor);
        assert!(!net.node(net.resolve(1).unwrap()).restriction_anchor);
    }

    #[test]
    fn test_curved_arc_lengths() {
        let mut net = RoadNetwork::new();
        // Dog-leg: curve length must exceed the direct length.
        net.add_road(
            &[
                pt(50.0, 4.0, 1),
                RoutePoint::shape(Coord::from_degrees(50.01, 4.005)),
                pt(50.0, 4.01, 2),
            ],
            road(2),
        );
        let arc = net.arc(ArcId(0));
        assert!(arc.is_curved());
        assert!(arc.length_m > arc.direct_length_m * 1.5);
    }
}
