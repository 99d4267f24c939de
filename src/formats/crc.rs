//! CRC-64-ISO checksum for the tile footer.

use crc::{Crc, CRC_64_GO_ISO};

const CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_GO_ISO);

/// Checksum a fully assembled byte run.
pub fn checksum(data: &[u8]) -> u64 {
    CRC64.checksum(data)
}
