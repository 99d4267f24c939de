pub mod angles;
pub mod cli;
pub mod compile;
pub mod error;
pub mod formats;
pub mod geo;
pub mod graph;
pub mod input;
pub mod partition;
pub mod road;

pub use compile::{compile_tile, CompileConfig, CompileSummary};
pub use error::CapacityError;
pub use graph::RoadNetwork;
