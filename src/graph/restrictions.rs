//! Turn-restriction and through-route attachment.
//!
//! Restrictions arrive already coordinate-resolved from relation processing
//! as (from-node, to-node, via-node, except-mask) triples. Anything that does
//! not resolve against the built graph is dropped with a diagnostic; bad
//! input must never abort a build.

use tracing::warn;

use crate::road::AccessMask;

use super::{NodeId, RoadNetwork, RouteRestriction};

impl RoadNetwork {
    /// Attach a turn restriction at its via node. Returns `true` if the
    /// restriction was attached.
    ///
    /// The from-arc is stored relative to arrival at the via node, i.e. as
    /// the reverse arc via→from; the to-arc is the forward arc via→to.
    pub fn add_restriction(
        &mut self,
        from_id: u64,
        to_id: u64,
        via_id: u64,
        except: AccessMask,
    ) -> bool {
        let (from, to, via) = match (
            self.resolve(from_id),
            self.resolve(to_id),
            self.resolve(via_id),
        ) {
            (Some(f), Some(t), Some(v)) => (f, t, v),
            _ => {
                warn!(
                    from = from_id,
                    to = to_id,
                    via = via_id,
                    "restriction references unknown node; dropped"
                );
                return false;
            }
        };

        let from_arc = match self.arc_between(via, from) {
            Some(a) => a,
            None => {
                warn!(via = via_id, from = from_id, "restriction from-arc not found; dropped");
                return false;
            }
        };
        let to_arc = match self.arc_between(via, to) {
            Some(a) => a,
            None => {
                warn!(via = via_id, to = to_id, "restriction to-arc not found; dropped");
                return false;
            }
        };

        // A restriction onto a oneway road entered from its disallowed end
        // can never apply to vehicles. Keep it only when the exception mask
        // already reduces it to pedestrians.
        let target = self.arc(to_arc);
        if self.road(target.road).oneway && !target.forward {
            if except.covers_all_but_foot() {
                warn!(
                    via = via_id,
                    to = to_id,
                    "restriction enters oneway road against its direction; kept for pedestrians"
                );
            } else {
                warn!(
                    via = via_id,
                    to = to_id,
                    "restriction enters oneway road against its direction; dropped"
                );
                return false;
            }
        }

        debug_assert_eq!(self.arc(from_arc).source, via);
        debug_assert_eq!(self.arc(to_arc).source, via);

        self.node_mut(via).restrictions.push(RouteRestriction {
            from_arc,
            to_arc,
            except,
        });
        true
    }

    /// Record that two road ids form one logical through-route at a junction.
    /// Returns the node the hint was attached to, if it resolved.
    pub fn add_through_route(&mut self, node_id: u64, road_a: u32, road_b: u32) -> Option<NodeId> {
        let Some(node) = self.resolve(node_id) else {
            warn!(node = node_id, "through-route references unknown node; dropped");
            return None;
        };
        self.node_mut(node)
            .through_routes
            .push((crate::road::RoadId(road_a), crate::road::RoadId(road_b)));
        Some(node)
    }
}
