//! Tile description input.
//!
//! One JSON document per tile, produced by the style/conversion stage and
//! the spatial splitter: roads with node-annotated point sequences, plus
//! already coordinate-resolved restriction and through-route triples.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileDescription {
    pub roads: Vec<RoadInput>,
    #[serde(default)]
    pub restrictions: Vec<RestrictionInput>,
    #[serde(default)]
    pub through_routes: Vec<ThroughRouteInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadInput {
    /// Source road id, referenced by through-route declarations.
    pub id: u32,
    pub class: u8,
    pub speed: u8,
    /// Travel-mode bitmask: bit0=car, bit1=bike, bit2=foot.
    #[serde(default = "full_access")]
    pub access: u8,
    #[serde(default)]
    pub oneway: bool,
    #[serde(default)]
    pub toll: bool,
    #[serde(default)]
    pub roundabout: bool,
    #[serde(default)]
    pub synthesized: bool,
    #[serde(default)]
    pub label_offset: u32,
    pub points: Vec<PointInput>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PointInput {
    pub lat: f64,
    pub lon: f64,
    /// Non-zero marks a routing node; coincident junction points of
    /// different roads carry the same id.
    #[serde(default)]
    pub node_id: u64,
    #[serde(default)]
    pub boundary: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RestrictionInput {
    pub from_node: u64,
    pub to_node: u64,
    pub via_node: u64,
    /// Modes the restriction does not apply to.
    #[serde(default)]
    pub except: u8,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ThroughRouteInput {
    pub node: u64,
    pub road_a: u32,
    pub road_b: u32,
}

fn full_access() -> u8 {
    crate::road::AccessMask::all().0
}

impl TileDescription {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())
            .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
        serde_json::from_str(&data)
            .with_context(|| format!("invalid tile description {}", path.as_ref().display()))
    }
}
