//! RouteCenter partitioning.
//!
//! The node section is written one RouteCenter at a time: a group of nodes
//! whose mutual arc references stay within the format's addressable range.
//! The grouping heuristic is a pluggable contract; the writer relies only on
//! every node landing in exactly one center.

use crate::geo::Coord;
use crate::graph::{NodeId, RoadNetwork};

/// An address-bounded cluster of nodes, the serialization unit for the node
/// table.
#[derive(Debug)]
pub struct RouteCenter {
    pub center: Coord,
    pub nodes: Vec<NodeId>,
}

pub trait Partition {
    fn partition(&self, net: &RoadNetwork) -> Vec<RouteCenter>;
}

/// Groups nodes in arena order with a per-center cap. Arena order follows
/// road-walk order, which keeps intra-center arcs local without committing
/// to a spatial heuristic.
#[derive(Debug, Clone)]
pub struct GreedyPartitioner {
    pub max_nodes: usize,
}

impl Default for GreedyPartitioner {
    fn default() -> Self {
        Self { max_nodes: 255 }
    }
}

impl Partition for GreedyPartitioner {
    fn partition(&self, net: &RoadNetwork) -> Vec<RouteCenter> {
        let mut centers = Vec::new();
        let mut ids: Vec<NodeId> = (0..net.nodes.len() as u32).map(NodeId).collect();
        while !ids.is_empty() {
            let rest = ids.split_off(ids.len().min(self.max_nodes));
            let group = std::mem::replace(&mut ids, rest);
            centers.push(RouteCenter {
                center: midpoint(net, &group),
                nodes: group,
            });
        }
        centers
    }
}

fn midpoint(net: &RoadNetwork, nodes: &[NodeId]) -> Coord {
    debug_assert!(!nodes.is_empty());
    let mut lat = 0i64;
    let mut lon = 0i64;
    for &id in nodes {
        let c = net.node(id).coord;
        lat += c.lat as i64;
        lon += c.lon as i64;
    }
    let n = nodes.len() as i64;
    Coord::new((lat / n) as i32, (lon / n) as i32)
}

/// Tile-boundary nodes in the total node order used by the boundary tables:
/// map-unit latitude, then longitude, then arena index.
pub fn boundary_nodes(net: &RoadNetwork) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = (0..net.nodes.len() as u32)
        .map(NodeId)
        .filter(|&id| net.node(id).boundary)
        .collect();
    nodes.sort_by_key(|&id| {
        let c = net.node(id).coord;
        (c.lat_map_units(), c.lon_map_units(), id.0)
    });
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{RoadNetwork, RoutePoint};
    use crate::road::{AccessMask, RoadClass, RoadDef};

    fn chain(n: u64) -> RoadNetwork {
        let mut net = RoadNetwork::new();
        let points: Vec<RoutePoint> = (0..n)
            .map(|i| {
                RoutePoint::routing(
                    Coord::from_degrees(50.0, 4.0 + i as f64 * 0.001),
                    i + 1,
                )
            })
            .collect();
        net.add_road(&points, RoadDef::new(RoadClass(2), 4, AccessMask::all()));
        net
    }

    #[test]
    fn test_every_node_in_exactly_one_center() {
        let net = chain(10);
        let centers = GreedyPartitioner { max_nodes: 3 }.partition(&net);
        assert_eq!(centers.len(), 4);

        let mut seen = vec![0usize; net.nodes.len()];
        for c in &centers {
            assert!(c.nodes.len() <= 3);
            for &id in &c.nodes {
                seen[id.0 as usize] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1), "node in two centers");
    }

    #[test]
    fn test_boundary_nodes_sorted() {
        let mut net = RoadNetwork::new();
        let mut west = RoutePoint::routing(Coord::from_degrees(50.0, 4.0), 1);
        west.boundary = true;
        let mut east = RoutePoint::routing(Coord::from_degrees(50.0, 4.02), 3);
        east.boundary = true;
        // Inserted east-first; the boundary order must not follow insertion.
        net.add_road(
            &[east, RoutePoint::routing(Coord::from_degrees(50.0, 4.01), 2), west],
            RoadDef::new(RoadClass(2), 4, AccessMask::all()),
        );

        let bounds = boundary_nodes(&net);
        assert_eq!(bounds.len(), 2);
        assert_eq!(bounds[0], net.resolve(1).unwrap());
        assert_eq!(bounds[1], net.resolve(3).unwrap());
    }
}
