//! Binary routing-tile format: section writer, header, two-phase tile writer.

pub mod crc;
pub mod header;
pub mod section;
pub mod tile;

pub use header::{HighBounds, TileHeader};
pub use section::{Patch, SectionWriter, TileBuffer};
pub use tile::{TileImage, TileWriter, TileWriterConfig};
