//! File header and the small fixed-size sections around the directory.
//!
//! # Layout
//! ```text
//! FileHeader        16 B   magic, major, minor, flags, resource_count, reserved
//! ResourceHeader[]  48 B each
//! VersionInfo        6 B   if FileFlags::VERSION_INFO
//! ExtensionHeader    4 B   if FileFlags::EXTENSION_HEADER
//! BlockTableHeader   8 B   if FileFlags::BLOCK_TABLE, then 8 B per block
//! key material     128 B   if FileFlags::OBFUSCATED_DIRECTORY
//! ```
//! Everything after the magic uses the byte order the magic was found in.

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::Serialize;

use crate::endian::Endian;
use crate::error::{PackageError, Result};

/// `KPKA` on disk when little-endian.
pub const SIGNATURE: u32 = 0x414B_504B;
pub const MAJOR_VERSION: u8 = 4;
pub const MINOR_VERSION: u8 = 1;

pub const FILE_HEADER_SIZE: usize = 16;
pub const VERSION_INFO_SIZE: usize = 6;
pub const EXTENSION_HEADER_SIZE: usize = 4;
pub const BLOCK_TABLE_HEADER_SIZE: usize = 8;

// ── File flags ────────────────────────────────────────────────────────────────

/// Section-presence bits of the file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct FileFlags(u16);

impl FileFlags {
    pub const NONE:                 FileFlags = FileFlags(0);
    pub const BLOCK_TABLE:          FileFlags = FileFlags(1 << 1);
    pub const VERSION_INFO:         FileFlags = FileFlags(1 << 2);
    pub const OBFUSCATED_DIRECTORY: FileFlags = FileFlags(1 << 3);
    pub const EXTENSION_HEADER:     FileFlags = FileFlags(1 << 4);

    /// Every bit this build understands.  Bit 0 marks the name-table
    /// revision, which is not supported and therefore not listed.
    pub const KNOWN: FileFlags = FileFlags(
        Self::BLOCK_TABLE.0
            | Self::VERSION_INFO.0
            | Self::OBFUSCATED_DIRECTORY.0
            | Self::EXTENSION_HEADER.0,
    );

    /// Reject any bit outside [`FileFlags::KNOWN`].
    pub fn from_bits(bits: u16) -> Result<Self> {
        if bits & !Self::KNOWN.0 != 0 {
            return Err(PackageError::UnknownFileFlags(bits));
        }
        Ok(FileFlags(bits))
    }

    #[inline] pub fn bits(self) -> u16 { self.0 }
    #[inline] pub fn contains(self, other: FileFlags) -> bool { self.0 & other.0 == other.0 }
    #[inline] pub fn insert(&mut self, other: FileFlags) { self.0 |= other.0 }
}

// ── File header ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    pub endian:         Endian,
    pub flags:          FileFlags,
    pub resource_count: usize,
    pub reserved:       u32,
}

impl FileHeader {
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        let endian = self.endian;
        let count = i32::try_from(self.resource_count)
            .map_err(|_| PackageError::Unsupported("more than i32::MAX resources"))?;
        endian.write_u32(&mut writer, SIGNATURE)?;
        writer.write_u8(MAJOR_VERSION)?;
        writer.write_u8(MINOR_VERSION)?;
        endian.write_u16(&mut writer, self.flags.bits())?;
        endian.write_i32(&mut writer, count)?;
        endian.write_u32(&mut writer, self.reserved)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        let endian = if magic == SIGNATURE {
            Endian::Little
        } else if magic.swap_bytes() == SIGNATURE {
            Endian::Big
        } else {
            return Err(PackageError::BadSignature(magic));
        };

        let major = reader.read_u8()?;
        let minor = reader.read_u8()?;
        if major != MAJOR_VERSION || minor != MINOR_VERSION {
            return Err(PackageError::UnsupportedVersion { major, minor });
        }

        let flags = FileFlags::from_bits(endian.read_u16(&mut reader)?)?;
        let count = endian.read_i32(&mut reader)?;
        let resource_count = usize::try_from(count)
            .map_err(|_| PackageError::NegativeCount { what: "resource", count: count as i64 })?;
        let reserved = endian.read_u32(&mut reader)?;

        Ok(Self { endian, flags, resource_count, reserved })
    }
}

// ── Version info ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub tag:       u32,
    pub type_code: u8,
    pub version:   u8,
}

impl VersionInfo {
    pub fn write<W: Write>(&self, mut writer: W, endian: Endian) -> io::Result<()> {
        endian.write_u32(&mut writer, self.tag)?;
        writer.write_u8(self.type_code)?;
        writer.write_u8(self.version)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R, endian: Endian) -> io::Result<Self> {
        Ok(Self {
            tag:       endian.read_u32(&mut reader)?,
            type_code: reader.read_u8()?,
            version:   reader.read_u8()?,
        })
    }
}

// ── Extension header ──────────────────────────────────────────────────────────

/// Opaque field present only in the newest revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExtensionHeader(pub u32);

impl ExtensionHeader {
    pub fn write<W: Write>(&self, mut writer: W, endian: Endian) -> io::Result<()> {
        endian.write_u32(&mut writer, self.0)
    }

    pub fn read<R: Read>(mut reader: R, endian: Endian) -> io::Result<Self> {
        Ok(Self(endian.read_u32(&mut reader)?))
    }
}

// ── Block table header ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTableHeader {
    pub block_size:  u32,
    pub block_count: usize,
}

impl BlockTableHeader {
    pub fn write<W: Write>(&self, mut writer: W, endian: Endian) -> Result<()> {
        let count = i32::try_from(self.block_count)
            .map_err(|_| PackageError::Unsupported("more than i32::MAX blocks"))?;
        endian.write_u32(&mut writer, self.block_size)?;
        endian.write_i32(&mut writer, count)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R, endian: Endian) -> Result<Self> {
        let block_size = endian.read_u32(&mut reader)?;
        let count = endian.read_i32(&mut reader)?;
        let block_count = usize::try_from(count)
            .map_err(|_| PackageError::NegativeCount { what: "block", count: count as i64 })?;
        Ok(Self { block_size, block_count })
    }
}
