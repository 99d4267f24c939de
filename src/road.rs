//! Road metadata consumed by the graph builder and the road-section writer.
//!
//! A `RoadDef` is produced by the upstream style/conversion stage; the graph
//! holds `RoadId` indices into the network's road table, never references.

use serde::{Deserialize, Serialize};

use crate::graph::NodeId;

/// Travel mode bits: bit0=car, bit1=bike, bit2=foot.
pub const MODE_CAR: u8 = 0b001;
pub const MODE_BIKE: u8 = 0b010;
pub const MODE_FOOT: u8 = 0b100;

const ALL_MODES: u8 = MODE_CAR | MODE_BIKE | MODE_FOOT;

/// Bitmask of travel modes allowed on a road (or excepted from a restriction).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessMask(pub u8);

impl AccessMask {
    pub fn all() -> Self {
        Self(ALL_MODES)
    }

    pub fn none() -> Self {
        Self(0)
    }

    pub fn contains(&self, mode: u8) -> bool {
        self.0 & mode != 0
    }

    /// True if the two masks share at least one travel mode.
    pub fn intersects(&self, other: AccessMask) -> bool {
        self.0 & other.0 != 0
    }

    /// True if every mode except foot is covered by this mask.
    pub fn covers_all_but_foot(&self) -> bool {
        self.0 & (ALL_MODES & !MODE_FOOT) == ALL_MODES & !MODE_FOOT
    }

    /// True if some mode is missing, i.e. the road restricts travel.
    pub fn is_restricted(&self) -> bool {
        self.0 != ALL_MODES
    }
}

/// Road class 0 (residential/default) to 4 (major artery). Classes above 0
/// feed the high-class boundary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoadClass(pub u8);

impl RoadClass {
    pub const MAX: RoadClass = RoadClass(4);

    pub fn above_default(&self) -> bool {
        self.0 > 0
    }
}

/// Index of a road in the network's road table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoadId(pub u32);

/// An inclusive house-number range carried opaquely for the address stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberRange {
    pub left_start: u32,
    pub left_end: u32,
    pub right_start: u32,
    pub right_end: u32,
}

/// Static attributes of one source road.
#[derive(Debug, Clone)]
pub struct RoadDef {
    pub class: RoadClass,
    /// Road speed grade; 0 marks service/parking-grade roads that are exempt
    /// from sharp-angle correction.
    pub speed: u8,
    pub access: AccessMask,
    pub oneway: bool,
    pub toll: bool,
    pub roundabout: bool,
    /// Road synthesized by the compiler rather than present in the source.
    pub synthesized: bool,
    /// Offset of the road's name in the label section, attached upstream.
    pub label_offset: u32,
    pub numbers: Vec<NumberRange>,
    /// Canonical first routing node, set by the graph builder and
    /// back-referenced by the road-section record.
    pub start_node: Option<NodeId>,
}

impl RoadDef {
    pub fn new(class: RoadClass, speed: u8, access: AccessMask) -> Self {
        Self {
            class,
            speed,
            access,
            oneway: false,
            toll: false,
            roundabout: false,
            synthesized: false,
            label_offset: 0,
            numbers: Vec::new(),
            start_node: None,
        }
    }

    /// Flag byte of the road-section record.
    pub fn flags_byte(&self) -> u8 {
        let mut flags = 0u8;
        if self.oneway {
            flags |= 0x01;
        }
        if self.toll {
            flags |= 0x02;
        }
        if self.roundabout {
            flags |= 0x04;
        }
        if self.synthesized {
            flags |= 0x08;
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_mask_intersection() {
        let car_only = AccessMask(MODE_CAR);
        let foot_bike = AccessMask(MODE_BIKE | MODE_FOOT);
        assert!(!car_only.intersects(foot_bike));
        assert!(AccessMask::all().intersects(car_only));
        assert!(!AccessMask::none().intersects(AccessMask::all()));
    }

    #[test]
    fn test_covers_all_but_foot() {
        assert!(AccessMask(MODE_CAR | MODE_BIKE).covers_all_but_foot());
        assert!(AccessMask::all().covers_all_but_foot());
        assert!(!AccessMask(MODE_CAR).covers_all_but_foot());
    }

    #[test]
    fn test_road_flags_byte() {
        let mut road = RoadDef::new(RoadClass(2), 4, AccessMask::all());
        road.oneway = true;
        road.roundabout = true;
        assert_eq!(road.flags_byte(), 0x05);
    }
}
