use std::io::{self, Read, Write};

use serde::Serialize;

use crate::endian::Endian;

pub const BLOCK_SIZE: usize = 8;

const OFFSET_BITS: u32 = 42;
const OFFSET_MASK: u64 = (1 << OFFSET_BITS) - 1;

/// One entry of the block table.
///
/// ```text
/// 31- 0 oooooooo oooooooo oooooooo oooooooo
/// 63-32 ssssssss ssssssss ssssssoo oooooooo
/// ```
/// The unit of either field is not known, so the raw value is what gets
/// stored and round-tripped; the accessors return the unscaled bit fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct Block(pub u64);

impl Block {
    #[inline]
    pub fn raw(self) -> u64 { self.0 }

    /// Bits 0..42.
    #[inline]
    pub fn offset_field(self) -> u64 { self.0 & OFFSET_MASK }

    /// Bits 42..64.
    #[inline]
    pub fn size_field(self) -> u32 { (self.0 >> OFFSET_BITS) as u32 }

    pub fn write<W: Write>(&self, mut writer: W, endian: Endian) -> io::Result<()> {
        endian.write_u64(&mut writer, self.0)
    }

    pub fn read<R: Read>(mut reader: R, endian: Endian) -> io::Result<Self> {
        Ok(Block(endian.read_u64(&mut reader)?))
    }
}
