//! Routing-tile file header.
//!
//! Format (little-endian):
//!
//! Common prefix (16 bytes, shared by this format family):
//!   magic:        u32 = 0x4C49544E  // "NTIL"
//!   version:      u16 = 1
//!   header_len:   u16
//!   created_unix: u64
//!
//! Header body (to byte 52):
//!   nodes_pos:          u32   // section 1 start
//!   nodes_size:         u32
//!   flags:              u16   // bit0 drive-on-left, bit1 restrictions
//!   align:              u8
//!   ptr_mult:           u8
//!   tablea_record_len:  u16   // = 6
//!   roads_pos:          u32   // section 2 start
//!   roads_size:         u32
//!   reserved:           u32
//!   bounds_pos:         u32   // section 3 start
//!   bounds_size:        u32
//!   bounds_item_size:   u16   // = 9
//!
//! Long header (header_len >= 82) continues:
//!   high_bounds_pos:       u32   // section 4 start, 0x200-aligned
//!   high_bounds_size:      u32
//!   high_bounds_item_size: u16   // = 9
//!   class_boundaries:      [5]u32  // cumulative node-section offsets,
//!                                  // class 4 down to 0, clamped to
//!                                  // nodes_size
//!
//! Footer (end of file): file_crc64 u64, CRC-64-ISO over everything before.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::crc;

pub const MAGIC: u32 = 0x4C49544E; // "NTIL"
pub const VERSION: u16 = 1;
pub const SHORT_HEADER_LEN: u16 = 52;
pub const LONG_HEADER_LEN: u16 = 82;
pub const TABLEA_RECORD_LEN: u16 = 6;
pub const BOUNDS_ITEM_SIZE: u16 = 9;

const FLAG_DRIVE_ON_LEFT: u16 = 0x0001;
const FLAG_RESTRICTIONS: u16 = 0x0002;

/// High-class boundary descriptor, present only in long headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighBounds {
    pub pos: u32,
    pub size: u32,
    /// Cumulative end offsets partitioning the node section by road class,
    /// class 4 first.
    pub class_boundaries: [u32; 5],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileHeader {
    pub created_unix: u64,
    pub nodes_pos: u32,
    pub nodes_size: u32,
    pub drive_on_left: bool,
    pub restrictions_enabled: bool,
    pub align: u8,
    pub ptr_mult: u8,
    pub roads_pos: u32,
    pub roads_size: u32,
    pub bounds_pos: u32,
    pub bounds_size: u32,
    pub high_bounds: Option<HighBounds>,
}

impl TileHeader {
    pub fn header_len(&self) -> u16 {
        if self.high_bounds.is_some() {
            LONG_HEADER_LEN
        } else {
            SHORT_HEADER_LEN
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(LONG_HEADER_LEN as usize);
        bytes.extend_from_slice(&MAGIC.to_le_bytes());
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&self.header_len().to_le_bytes());
        bytes.extend_from_slice(&self.created_unix.to_le_bytes());

        bytes.extend_from_slice(&self.nodes_pos.to_le_bytes());
        bytes.extend_from_slice(&self.nodes_size.to_le_bytes());
        let mut flags = 0u16;
        if self.drive_on_left {
            flags |= FLAG_DRIVE_ON_LEFT;
        }
        if self.restrictions_enabled {
            flags |= FLAG_RESTRICTIONS;
        }
        bytes.extend_from_slice(&flags.to_le_bytes());
        bytes.push(self.align);
        bytes.push(self.ptr_mult);
        bytes.extend_from_slice(&TABLEA_RECORD_LEN.to_le_bytes());
        bytes.extend_from_slice(&self.roads_pos.to_le_bytes());
        bytes.extend_from_slice(&self.roads_size.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes()); // reserved
        bytes.extend_from_slice(&self.bounds_pos.to_le_bytes());
        bytes.extend_from_slice(&self.bounds_size.to_le_bytes());
        bytes.extend_from_slice(&BOUNDS_ITEM_SIZE.to_le_bytes());

        if let Some(high) = &self.high_bounds {
            bytes.extend_from_slice(&high.pos.to_le_bytes());
            bytes.extend_from_slice(&high.size.to_le_bytes());
            bytes.extend_from_slice(&BOUNDS_ITEM_SIZE.to_le_bytes());
            for b in high.class_boundaries {
                bytes.extend_from_slice(&b.to_le_bytes());
            }
        }

        assert_eq!(bytes.len(), self.header_len() as usize);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        anyhow::ensure!(
            bytes.len() >= SHORT_HEADER_LEN as usize,
            "header too short: {} bytes",
            bytes.len()
        );

        let magic = u32::from_le_bytes(bytes[0..4].try_into()?);
        anyhow::ensure!(magic == MAGIC, "invalid magic number: {:08x}", magic);
        let version = u16::from_le_bytes(bytes[4..6].try_into()?);
        anyhow::ensure!(version == VERSION, "unsupported version: {}", version);
        let header_len = u16::from_le_bytes(bytes[6..8].try_into()?);
        anyhow::ensure!(
            bytes.len() >= header_len as usize,
            "truncated header: {} of {} bytes",
            bytes.len(),
            header_len
        );

        let flags = u16::from_le_bytes(bytes[24..26].try_into()?);
        let tablea_record_len = u16::from_le_bytes(bytes[28..30].try_into()?);
        anyhow::ensure!(
            tablea_record_len == TABLEA_RECORD_LEN,
            "unexpected Table A record length: {}",
            tablea_record_len
        );

        // The high-class boundary descriptor exists only if the header
        // declares itself long enough to contain it.
        let high_bounds = if header_len >= LONG_HEADER_LEN {
            let mut class_boundaries = [0u32; 5];
            for (i, b) in class_boundaries.iter_mut().enumerate() {
                *b = u32::from_le_bytes(bytes[62 + i * 4..66 + i * 4].try_into()?);
            }
            Some(HighBounds {
                pos: u32::from_le_bytes(bytes[52..56].try_into()?),
                size: u32::from_le_bytes(bytes[56..60].try_into()?),
                class_boundaries,
            })
        } else {
            None
        };

        Ok(Self {
            created_unix: u64::from_le_bytes(bytes[8..16].try_into()?),
            nodes_pos: u32::from_le_bytes(bytes[16..20].try_into()?),
            nodes_size: u32::from_le_bytes(bytes[20..24].try_into()?),
            drive_on_left: flags & FLAG_DRIVE_ON_LEFT != 0,
            restrictions_enabled: flags & FLAG_RESTRICTIONS != 0,
            align: bytes[26],
            ptr_mult: bytes[27],
            roads_pos: u32::from_le_bytes(bytes[30..34].try_into()?),
            roads_size: u32::from_le_bytes(bytes[34..38].try_into()?),
            bounds_pos: u32::from_le_bytes(bytes[42..46].try_into()?),
            bounds_size: u32::from_le_bytes(bytes[46..50].try_into()?),
            high_bounds,
        })
    }
}

/// Read a tile file's header, verifying the footer checksum.
pub fn read<P: AsRef<Path>>(path: P) -> Result<TileHeader> {
    let data = fs::read(path.as_ref())
        .with_context(|| format!("failed to read {}", path.as_ref().display()))?;
    anyhow::ensure!(data.len() > SHORT_HEADER_LEN as usize + 8, "file too short");

    let (content, footer) = data.split_at(data.len() - 8);
    let stored_crc = u64::from_le_bytes(footer.try_into()?);
    let computed_crc = crc::checksum(content);
    anyhow::ensure!(
        stored_crc == computed_crc,
        "file CRC mismatch: expected {:016x}, got {:016x}",
        stored_crc,
        computed_crc
    );

    TileHeader::from_bytes(content)
}
