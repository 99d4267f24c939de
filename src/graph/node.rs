//! Routing-graph vertices and directed arcs.

use crate::geo::Coord;
use crate::road::{AccessMask, RoadClass, RoadId};

/// Index of a node in the network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index of an arc in the network arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArcId(pub u32);

/// A turn restriction attached to its via node: turning from the arc that
/// arrived (stored as the reverse arc via→from) onto `to_arc` is forbidden
/// except for the modes in `except`.
#[derive(Debug, Clone, Copy)]
pub struct RouteRestriction {
    pub from_arc: ArcId,
    pub to_arc: ArcId,
    pub except: AccessMask,
}

/// A routing-graph vertex bound to exactly one geographic point.
#[derive(Debug)]
pub struct RouteNode {
    pub coord: Coord,
    /// Node lies on the tile edge and may connect to an adjacent tile.
    pub boundary: bool,
    /// Highest road class touching this node.
    pub node_class: RoadClass,
    /// Eligible for the lower-precision heading encoding.
    pub use_compact_headings: bool,
    /// A road with travel restrictions shares this node with another road.
    pub restriction_anchor: bool,
    /// Outgoing arcs, in insertion order.
    pub arcs: Vec<ArcId>,
    /// Incoming arcs; used to validate and adjust headings, never serialized.
    pub incoming: Vec<ArcId>,
    pub restrictions: Vec<RouteRestriction>,
    pub through_routes: Vec<(RoadId, RoadId)>,
}

impl RouteNode {
    pub fn new(coord: Coord) -> Self {
        Self {
            coord,
            boundary: false,
            node_class: RoadClass::default(),
            use_compact_headings: false,
            restriction_anchor: false,
            arcs: Vec::new(),
            incoming: Vec::new(),
            restrictions: Vec::new(),
            through_routes: Vec::new(),
        }
    }
}

/// One directed traversal between two nodes. Arcs are always created in
/// forward/reverse pairs sharing the same underlying road segment.
#[derive(Debug)]
pub struct RouteArc {
    pub road: RoadId,
    pub source: NodeId,
    pub dest: NodeId,
    /// Bearing leaving the source node, degrees in (-180, 180].
    pub initial_heading: f64,
    /// Bearing arriving at the destination node.
    pub final_heading: f64,
    /// Straight-line bearing source→dest, used when the segment is curved.
    pub direct_heading: f64,
    /// Length along the curve in meters.
    pub length_m: f64,
    /// Straight-line length between the end nodes in meters.
    pub direct_length_m: f64,
    /// Interior curve points (excludes the end nodes). Empty for straight arcs.
    pub shape: Vec<Coord>,
    /// Hash of the underlying point sequence, for duplicate-arc detection.
    pub points_hash: u64,
    /// True for the arc that follows the road's stored point order.
    pub forward: bool,
    /// The paired arc in the opposite direction.
    pub reverse: ArcId,
}

impl RouteArc {
    /// True when the segment deviates from the straight line between its
    /// end nodes.
    pub fn is_curved(&self) -> bool {
        !self.shape.is_empty()
    }
}
