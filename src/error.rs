//! Typed errors for the failure classes the build orchestrator must match on.
//!
//! Capacity violations are fatal for the current tile and mean the input
//! must go back to the spatial splitter for finer subdivision; they are never
//! retried or truncated here. Everything else rides on `anyhow` at the
//! application boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CapacityError {
    #[error(
        "node section offset {offset:#x} exceeds addressable limit {limit:#x} \
         for tile '{tile}'; re-split the tile into smaller areas"
    )]
    NodeSection {
        tile: String,
        offset: u64,
        limit: u64,
    },

    #[error("route center holds {count} nodes, exceeding the {limit} per-center limit for tile '{tile}'")]
    CenterNodes {
        tile: String,
        count: usize,
        limit: usize,
    },

    #[error("route center needs {count} Table A entries, exceeding the {limit} limit for tile '{tile}'")]
    TableA {
        tile: String,
        count: usize,
        limit: usize,
    },

    #[error("node has {count} restrictions, exceeding the {limit} per-node limit for tile '{tile}'")]
    Restrictions {
        tile: String,
        count: usize,
        limit: usize,
    },
}
