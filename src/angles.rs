//! Sharp-angle correction over arc groups.
//!
//! The on-device router scores turns from coarse, rounded headings; angles
//! below a minimum incur synthetic time penalties that make correct routes
//! look worse than detours. The corrector widens angles that are artifacts
//! of cartographic simplification without touching connectivity: it only
//! ever shifts stored headings.
//!
//! A node's outgoing arcs are sorted by initial heading and merged into
//! groups of effectively-identical direction (duplicate mappings of the same
//! physical road). Each angularly-adjacent group pair gets a minimum
//! acceptable angle; pairs below it borrow slack from the neighboring gaps.

use tracing::{debug, warn};

use crate::geo::{normalize_heading, reverse_heading};
use crate::graph::{ArcId, NodeId, RoadNetwork};
use crate::road::RoadClass;

/// Correction thresholds in degrees.
#[derive(Debug, Clone)]
pub struct AngleCheckerConfig {
    /// Arcs whose headings differ by less than this merge into one group.
    pub group_merge_deg: f64,
    /// Minimum acceptable angle between adjacent groups: 4 units of the
    /// 256-step on-device heading.
    pub sharp_min_deg: f64,
    /// Minimum angle at which the lower-precision heading encoding is safe:
    /// one unit of the 16-step compact heading.
    pub compact_min_deg: f64,
}

impl Default for AngleCheckerConfig {
    fn default() -> Self {
        Self {
            group_merge_deg: 1.0,
            sharp_min_deg: 4.0 * 360.0 / 256.0,
            compact_min_deg: 360.0 / 16.0,
        }
    }
}

/// Outcome counters for one correction run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrectionStats {
    /// Nodes where at least one heading was shifted.
    pub adjusted_nodes: usize,
    /// Wanted corrections that could not be fully satisfied.
    pub shortfalls: usize,
    /// Nodes marked eligible for compact heading encoding.
    pub compact_nodes: usize,
}

pub struct AngleChecker {
    config: AngleCheckerConfig,
}

struct ArcGroup {
    arcs: Vec<ArcId>,
    heading: f64,
}

impl AngleChecker {
    pub fn new() -> Self {
        Self {
            config: AngleCheckerConfig::default(),
        }
    }

    pub fn with_config(config: AngleCheckerConfig) -> Self {
        Self { config }
    }

    /// Correct sharp angles in place over the whole network.
    pub fn correct(&self, net: &mut RoadNetwork) -> CorrectionStats {
        let mut stats = CorrectionStats::default();
        for i in 0..net.nodes.len() {
            let node = NodeId(i as u32);
            if net.node(node).arcs.len() < 2 {
                continue;
            }
            self.correct_node(net, node, &mut stats);
        }
        stats
    }

    fn correct_node(&self, net: &mut RoadNetwork, node: NodeId, stats: &mut CorrectionStats) {
        let mut groups = self.build_groups(net, node);
        if groups.len() < 2 {
            return;
        }

        let adjusted = if groups.len() == 2 {
            self.widen_pair(net, &mut groups, stats)
        } else {
            self.borrow_slack(net, &mut groups, stats)
        };
        if adjusted {
            stats.adjusted_nodes += 1;
        }

        // Compact headings are only safe when every angle at the node
        // survives the coarser 16-step rounding.
        let min_gap = gaps(&groups)
            .into_iter()
            .fold(f64::INFINITY, f64::min);
        if min_gap >= self.config.compact_min_deg {
            net.node_mut(node).use_compact_headings = true;
            stats.compact_nodes += 1;
        }
    }

    /// Sort outgoing arcs by initial heading and merge near-identical
    /// directions, including across the ±180° seam.
    fn build_groups(&self, net: &RoadNetwork, node: NodeId) -> Vec<ArcGroup> {
        let mut arcs: Vec<(f64, ArcId)> = net
            .node(node)
            .arcs
            .iter()
            .map(|&a| (net.arc(a).initial_heading, a))
            .collect();
        arcs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut groups: Vec<ArcGroup> = Vec::new();
        for (heading, arc) in arcs {
            match groups.last_mut() {
                Some(g) if heading - g.heading < self.config.group_merge_deg => {
                    g.arcs.push(arc);
                }
                _ => groups.push(ArcGroup {
                    arcs: vec![arc],
                    heading,
                }),
            }
        }
        if groups.len() >= 2 {
            let wrap = groups[0].heading + 360.0 - groups.last().unwrap().heading;
            if wrap < self.config.group_merge_deg {
                let last = groups.pop().unwrap();
                groups[0].arcs.extend(last.arcs);
            }
        }
        groups
    }

    /// Two directions only: redistribute the correction equally, half to
    /// each side.
    fn widen_pair(
        &self,
        net: &mut RoadNetwork,
        groups: &mut [ArcGroup],
        stats: &mut CorrectionStats,
    ) -> bool {
        let min = self.pair_min(net, &groups[0], &groups[1]);
        let diff = groups[1].heading - groups[0].heading;
        let gap = diff.min(360.0 - diff);
        if gap >= min {
            return false;
        }

        let need = min - gap;
        // The half-correction may not exceed the opposite angle's own slack.
        let opposite = 360.0 - gap;
        let room = (opposite - min).max(0.0);
        let take = need.min(room);
        if take < need {
            warn!(gap, min, "sharp angle cannot be fully widened");
            stats.shortfalls += 1;
        }

        let (lo, hi) = if diff <= 180.0 { (0, 1) } else { (1, 0) };
        shift_group(net, &mut groups[lo], -take / 2.0);
        shift_group(net, &mut groups[hi], take / 2.0);
        true
    }

    /// Three or more directions: widen every under-minimum gap by borrowing
    /// from the two angularly-adjacent gaps.
    fn borrow_slack(
        &self,
        net: &mut RoadNetwork,
        groups: &mut [ArcGroup],
        stats: &mut CorrectionStats,
    ) -> bool {
        let n = groups.len();
        let mut gap = gaps(groups);
        let min: Vec<f64> = (0..n)
            .map(|i| self.pair_min(net, &groups[i], &groups[(i + 1) % n]))
            .collect();
        let mut adjusted = false;

        for i in 0..n {
            if gap[i] >= min[i] {
                continue;
            }
            let need = min[i] - gap[i];
            let pred = (i + n - 1) % n;
            let succ = (i + 1) % n;
            let slack_pred = (gap[pred] - min[pred]).max(0.0);
            let slack_succ = (gap[succ] - min[succ]).max(0.0);

            // Prefer the neighbor with more to give; on a tie, move the
            // lower-class/slower side so the major road keeps its heading.
            let pred_first = if slack_pred != slack_succ {
                slack_pred > slack_succ
            } else {
                group_rank(net, &groups[i]) <= group_rank(net, &groups[succ])
            };

            let (take_pred, take_succ) = if pred_first {
                let a = need.min(slack_pred);
                (a, (need - a).min(slack_succ))
            } else {
                let b = need.min(slack_succ);
                ((need - b).min(slack_pred), b)
            };

            if take_pred + take_succ < need {
                warn!(
                    gap = gap[i],
                    min = min[i],
                    "sharp angle correction short by {:.2}°",
                    need - take_pred - take_succ
                );
                stats.shortfalls += 1;
            }
            if take_pred == 0.0 && take_succ == 0.0 {
                continue;
            }
            debug!(
                gap = gap[i],
                take_pred, take_succ, "widening sharp angle between arc groups"
            );

            // Rotating group i backward eats the predecessor gap; rotating
            // group i+1 forward eats the successor gap.
            shift_group(net, &mut groups[i], -take_pred);
            shift_group(net, &mut groups[succ], take_succ);
            gap[pred] -= take_pred;
            gap[i] += take_pred + take_succ;
            gap[succ] -= take_succ;
            adjusted = true;
        }
        adjusted
    }

    /// Minimum acceptable angle for a pair of adjacent arc groups. Zero when
    /// nothing can ever route through the pair.
    fn pair_min(&self, net: &RoadNetwork, a: &ArcGroup, b: &ArcGroup) -> f64 {
        // Matched one-way pair: if no direction of travel can enter via one
        // group and leave via the other, the pair is never scored as a turn.
        let usable = (can_enter(net, a) && can_exit(net, b))
            || (can_enter(net, b) && can_exit(net, a));
        if !usable {
            return 0.0;
        }
        // No common travel mode between the two sides.
        let (mask_a, mask_b) = (access_of(net, a), access_of(net, b));
        if !mask_a.intersects(mask_b) {
            return 0.0;
        }
        // Service/parking-grade roads are exempt.
        if max_speed(net, a) == 0 || max_speed(net, b) == 0 {
            return 0.0;
        }
        self.config.sharp_min_deg
    }
}

impl Default for AngleChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Cyclic gaps between adjacent group headings; sums to 360.
fn gaps(groups: &[ArcGroup]) -> Vec<f64> {
    let n = groups.len();
    (0..n)
        .map(|i| {
            if i + 1 < n {
                groups[i + 1].heading - groups[i].heading
            } else {
                groups[0].heading + 360.0 - groups[n - 1].heading
            }
        })
        .collect()
}

/// Shift every arc of a group by the same signed delta, keeping the paired
/// reverse arcs' final headings consistent.
fn shift_group(net: &mut RoadNetwork, group: &mut ArcGroup, delta: f64) {
    if delta == 0.0 {
        return;
    }
    group.heading += delta;
    for &arc_id in &group.arcs {
        let new_heading = normalize_heading(net.arc(arc_id).initial_heading + delta);
        net.arc_mut(arc_id).initial_heading = new_heading;
        let reverse = net.arc(arc_id).reverse;
        net.arc_mut(reverse).final_heading = reverse_heading(new_heading);
    }
}

/// Travel can arrive at the node along this group's segment.
fn can_enter(net: &RoadNetwork, group: &ArcGroup) -> bool {
    group.arcs.iter().any(|&a| {
        let arc = net.arc(a);
        !net.road(arc.road).oneway || !arc.forward
    })
}

/// Travel can leave the node along this group's segment.
fn can_exit(net: &RoadNetwork, group: &ArcGroup) -> bool {
    group.arcs.iter().any(|&a| {
        let arc = net.arc(a);
        !net.road(arc.road).oneway || arc.forward
    })
}

fn access_of(net: &RoadNetwork, group: &ArcGroup) -> crate::road::AccessMask {
    let mut mask = 0u8;
    for &a in &group.arcs {
        mask |= net.road(net.arc(a).road).access.0;
    }
    crate::road::AccessMask(mask)
}

fn max_speed(net: &RoadNetwork, group: &ArcGroup) -> u8 {
    group
        .arcs
        .iter()
        .map(|&a| net.road(net.arc(a).road).speed)
        .max()
        .unwrap_or(0)
}

fn group_rank(net: &RoadNetwork, group: &ArcGroup) -> (RoadClass, u8) {
    group
        .arcs
        .iter()
        .map(|&a| {
            let road = net.road(net.arc(a).road);
            (road.class, road.speed)
        })
        .max()
        .unwrap_or((RoadClass(0), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coord;
    use crate::graph::{RoadNetwork, RoutePoint};
    use crate::road::{AccessMask, RoadClass, RoadDef, MODE_CAR, MODE_FOOT};

    const ORIGIN: (f64, f64) = (50.0, 4.0);

    /// A road leaving the shared junction (external id 1) towards `heading`
    /// degrees, plus a far endpoint.
    fn spoke(net: &mut RoadNetwork, heading_deg: f64, ext_id: u64, road: RoadDef) {
        let d = 0.01;
        let rad = heading_deg.to_radians();
        // Small-angle plane approximation is plenty for test geometry.
        let lat = ORIGIN.0 + d * rad.cos();
        let lon = ORIGIN.1 + d * rad.sin() / ORIGIN.0.to_radians().cos();
        net.add_road(
            &[
                RoutePoint::routing(Coord::from_degrees(ORIGIN.0, ORIGIN.1), 1),
                RoutePoint::routing(Coord::from_degrees(lat, lon), ext_id),
            ],
            road,
        );
    }

    fn plain(class: u8, speed: u8) -> RoadDef {
        RoadDef::new(RoadClass(class), speed, AccessMask::all())
    }

    fn junction_gaps(net: &RoadNetwork) -> Vec<f64> {
        let node = net.resolve(1).unwrap();
        let mut headings: Vec<f64> = net
            .node(node)
            .arcs
            .iter()
            .map(|&a| net.arc(a).initial_heading)
            .collect();
        headings.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let n = headings.len();
        (0..n)
            .map(|i| {
                if i + 1 < n {
                    headings[i + 1] - headings[i]
                } else {
                    headings[0] + 360.0 - headings[n - 1]
                }
            })
            .collect()
    }

    #[test]
    fn test_two_arc_widening_is_symmetric() {
        let mut net = RoadNetwork::new();
        spoke(&mut net, 0.0, 2, plain(2, 4));
        spoke(&mut net, 3.0, 3, plain(2, 4));

        let checker = AngleChecker::new();
        let stats = checker.correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 1);

        let node = net.resolve(1).unwrap();
        let h: Vec<f64> = net
            .node(node)
            .arcs
            .iter()
            .map(|&a| net.arc(a).initial_heading)
            .collect();
        let gap = (h[1] - h[0]).abs();
        let min = AngleCheckerConfig::default().sharp_min_deg;
        assert!((gap - min).abs() < 0.01, "gap {}", gap);
        // Both sides moved by the same amount.
        assert!((h[0] - -(min - 3.0) / 2.0).abs() < 0.15, "{:?}", h);
    }

    #[test]
    fn test_reverse_final_heading_tracks_shift() {
        let mut net = RoadNetwork::new();
        spoke(&mut net, 0.0, 2, plain(2, 4));
        spoke(&mut net, 3.0, 3, plain(2, 4));
        AngleChecker::new().correct(&mut net);

        net.assert_arc_symmetry();
        for arc in &net.arcs {
            let rev = &net.arcs[arc.reverse.0 as usize];
            assert!((rev.final_heading - reverse_heading(arc.initial_heading)).abs() < 1e-9);
        }
    }

    #[test]
    fn test_headings_stay_normalized() {
        let mut net = RoadNetwork::new();
        spoke(&mut net, 179.0, 2, plain(2, 4));
        spoke(&mut net, -179.0, 3, plain(2, 4));
        spoke(&mut net, 0.0, 4, plain(2, 4));
        AngleChecker::new().correct(&mut net);

        for arc in &net.arcs {
            assert!(arc.initial_heading > -180.0 && arc.initial_heading <= 180.0);
            assert!(arc.final_heading > -180.0 && arc.final_heading <= 180.0);
        }
    }

    #[test]
    fn test_no_common_mode_exempt() {
        let mut net = RoadNetwork::new();
        let mut car_only = plain(2, 4);
        car_only.access = AccessMask(MODE_CAR);
        let mut foot_only = plain(2, 4);
        foot_only.access = AccessMask(MODE_FOOT);
        spoke(&mut net, 0.0, 2, car_only);
        spoke(&mut net, 2.0, 3, foot_only);

        let stats = AngleChecker::new().correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 0);
    }

    #[test]
    fn test_zero_speed_exempt() {
        let mut net = RoadNetwork::new();
        spoke(&mut net, 0.0, 2, plain(2, 4));
        spoke(&mut net, 2.0, 3, plain(0, 0));

        let stats = AngleChecker::new().correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 0);
    }

    #[test]
    fn test_matched_oneway_pair_exempt() {
        let mut net = RoadNetwork::new();
        // Both roads leave the junction and are oneway away from it: the
        // pair can never be traversed as a turn.
        let mut oneway = plain(2, 4);
        oneway.oneway = true;
        spoke(&mut net, 0.0, 2, oneway.clone());
        spoke(&mut net, 2.0, 3, oneway);

        let stats = AngleChecker::new().correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 0);
    }

    #[test]
    fn test_borrows_from_major_roads_free_side() {
        // Side St at 0°, Main St (oneway into the junction,
        // higher class) at 5°, Main St's continuation at 185°. The 5° gap
        // widens to the minimum by shifting Main St's heading into the wide
        // gap on its far side; Side St keeps its heading.
        let mut net = RoadNetwork::new();
        spoke(&mut net, 0.0, 2, plain(0, 2)); // Side St
        let mut main = plain(3, 6);
        main.oneway = true;
        spoke(&mut net, 5.0, 3, main.clone());
        spoke(&mut net, 185.0, 4, main);

        let side_heading_before = net.arcs[0].initial_heading;
        let stats = AngleChecker::new().correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 1);
        assert_eq!(stats.shortfalls, 0);

        let min = AngleCheckerConfig::default().sharp_min_deg;
        let gaps = junction_gaps(&net);
        for g in &gaps {
            assert!(*g >= min - 0.01, "gap {} below minimum", g);
        }
        // Side St untouched.
        assert!((net.arcs[0].initial_heading - side_heading_before).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_arcs_group_together() {
        let mut net = RoadNetwork::new();
        // Two mappings of the same physical road within 1°, plus a third
        // direction; grouping must not count the duplicates as a sharp pair.
        spoke(&mut net, 0.0, 2, plain(2, 4));
        spoke(&mut net, 0.5, 3, plain(2, 4));
        spoke(&mut net, 120.0, 4, plain(2, 4));

        let stats = AngleChecker::new().correct(&mut net);
        assert_eq!(stats.adjusted_nodes, 0);
        assert_eq!(stats.compact_nodes, 1);
    }

    #[test]
    fn test_compact_marking_thresholds() {
        let cfg = AngleCheckerConfig::default();

        let mut wide = RoadNetwork::new();
        spoke(&mut wide, 0.0, 2, plain(2, 4));
        spoke(&mut wide, 120.0, 3, plain(2, 4));
        spoke(&mut wide, 240.0, 4, plain(2, 4));
        AngleChecker::new().correct(&mut wide);
        assert!(wide.node(wide.resolve(1).unwrap()).use_compact_headings);

        // A 10° angle clears the sharp minimum but not the compact one.
        assert!(10.0 > cfg.sharp_min_deg && 10.0 < cfg.compact_min_deg);
        let mut narrow = RoadNetwork::new();
        spoke(&mut narrow, 0.0, 2, plain(2, 4));
        spoke(&mut narrow, 10.0, 3, plain(2, 4));
        spoke(&mut narrow, 180.0, 4, plain(2, 4));
        AngleChecker::new().correct(&mut narrow);
        assert!(!narrow.node(narrow.resolve(1).unwrap()).use_compact_headings);
    }

    #[test]
    fn test_shortfall_logged_not_fatal() {
        // Five directions packed into a narrow fan: not enough slack
        // anywhere, the corrector records shortfalls and keeps going.
        let mut net = RoadNetwork::new();
        for (i, h) in [0.0, 2.0, 4.0, 6.0, 8.0].iter().enumerate() {
            spoke(&mut net, *h, (i + 2) as u64, plain(2, 4));
        }
        let stats = AngleChecker::new().correct(&mut net);
        assert!(stats.shortfalls > 0);
    }
}
