//! In-memory section writer with pass-2 patch placeholders.
//!
//! The whole tile is assembled in one buffer; each section writes through a
//! bounded sub-view that tracks the section's base, so offsets recorded by
//! components are section-relative on disk while staying absolute in memory.
//! Forward references are reserved as `Patch` placeholders during pass 1 and
//! resolved during pass 2 by mutating the buffer, never by seeking a file.

/// A reserved slot in the output buffer, resolved during the second pass.
#[derive(Debug, Clone, Copy)]
#[must_use = "a reserved patch slot must be resolved in pass 2"]
pub struct Patch {
    pos: usize,
}

/// The growing tile image.
#[derive(Debug, Default)]
pub struct TileBuffer {
    buf: Vec<u8>,
}

impl TileBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_i8(&mut self, v: i8) {
        self.buf.push(v as u8);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Low three bytes, little-endian. Callers enforce range before writing.
    pub fn put_u24(&mut self, v: u32) {
        debug_assert!(v <= 0xFF_FFFF);
        self.buf.extend_from_slice(&v.to_le_bytes()[..3]);
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pad with zero bytes until the absolute position is a multiple of
    /// `align`.
    pub fn align_to(&mut self, align: usize) {
        while self.buf.len() % align != 0 {
            self.buf.push(0);
        }
    }

    /// Reserve a 4-byte slot to be patched in pass 2.
    pub fn reserve_u32(&mut self) -> Patch {
        let pos = self.buf.len();
        self.buf.extend_from_slice(&[0u8; 4]);
        Patch { pos }
    }

    /// Resolve a reserved slot.
    pub fn patch_u32(&mut self, patch: Patch, v: u32) {
        self.buf[patch.pos..patch.pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    /// Overwrite previously written bytes in place (header rewrite).
    pub fn overwrite(&mut self, pos: usize, bytes: &[u8]) {
        self.buf[pos..pos + bytes.len()].copy_from_slice(bytes);
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// A bounded sub-view whose recorded offsets are relative to the current
    /// position.
    pub fn section(&mut self) -> SectionWriter<'_> {
        let base = self.buf.len();
        SectionWriter { buf: self, base }
    }
}

/// Sub-view over the tile buffer for one section.
pub struct SectionWriter<'a> {
    buf: &'a mut TileBuffer,
    base: usize,
}

impl<'a> SectionWriter<'a> {
    /// Absolute start of this section in the file.
    pub fn base(&self) -> usize {
        self.base
    }

    /// Bytes written into this section so far; the section-relative offset
    /// of the next write.
    pub fn position(&self) -> usize {
        self.buf.len() - self.base
    }

    pub fn buffer(&mut self) -> &mut TileBuffer {
        self.buf
    }
}

impl std::ops::Deref for SectionWriter<'_> {
    type Target = TileBuffer;

    fn deref(&self) -> &TileBuffer {
        self.buf
    }
}

impl std::ops::DerefMut for SectionWriter<'_> {
    fn deref_mut(&mut self) -> &mut TileBuffer {
        self.buf
    }
}
