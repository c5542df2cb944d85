//! Resource directory: one fixed 48-byte record per resource.
//!
//! # Record layout
//! ```text
//! u64 name_hash
//! i64 data_offset          absolute, from start of file
//! i64 compressed_size
//! i64 uncompressed_size
//! u64 flags                see ResourceFlags
//! u32 content_hash
//! u32 group_hash
//! ```

use std::io::{Cursor, Read, Write};

use serde::Serialize;

use crate::codec::CompressionScheme;
use crate::crypto::CryptoScheme;
use crate::endian::Endian;
use crate::error::{PackageError, Result};

pub const RESOURCE_HEADER_SIZE: usize = 48;

/// Group hash written when no grouping applies.
pub const DEFAULT_GROUP_HASH: u32 = 0xCCCC_CCCC;

// ── ResourceFlags ─────────────────────────────────────────────────────────────

const COMPRESSION_SHIFT: u32 = 0;
const COMPRESSION_MASK:  u64 = 0xF;
const CRYPTO_SHIFT:      u32 = 16;
const CRYPTO_MASK:       u64 = 0xF;

/// Bits that may be set in a valid record.
///
/// ```text
/// 31- 0 ???????? ????cccc rrrrrrrr rrrrssss
/// 63-32 ???????? ???????? ???????? ????????
/// s = compression scheme, c = crypto scheme, r = reserved, ? = invalid
/// ```
pub const VALID_FLAGS_MASK: u64 = 0x000F_FFFF;

const RESERVED_MASK: u64 =
    VALID_FLAGS_MASK & !(COMPRESSION_MASK << COMPRESSION_SHIFT) & !(CRYPTO_MASK << CRYPTO_SHIFT);

/// Decoded per-resource flag word.  Reserved bits are carried through
/// untouched so a rewritten record matches the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ResourceFlags {
    compression: CompressionScheme,
    crypto:      CryptoScheme,
    reserved:    u64,
}

impl ResourceFlags {
    pub fn new(compression: CompressionScheme, crypto: CryptoScheme) -> Self {
        Self { compression, crypto, reserved: 0 }
    }

    pub fn from_raw(raw: u64) -> Result<Self> {
        if raw & !VALID_FLAGS_MASK != 0 {
            return Err(PackageError::InvalidResourceFlags { name_hash: 0, flags: raw });
        }
        Ok(Self {
            compression: CompressionScheme::from_code(((raw >> COMPRESSION_SHIFT) & COMPRESSION_MASK) as u8)?,
            crypto:      CryptoScheme::from_code(((raw >> CRYPTO_SHIFT) & CRYPTO_MASK) as u8)?,
            reserved:    raw & RESERVED_MASK,
        })
    }

    pub fn raw(self) -> u64 {
        ((self.compression.code() as u64) << COMPRESSION_SHIFT)
            | ((self.crypto.code() as u64) << CRYPTO_SHIFT)
            | self.reserved
    }

    #[inline] pub fn compression(self) -> CompressionScheme { self.compression }
    #[inline] pub fn crypto(self) -> CryptoScheme { self.crypto }
    #[inline] pub fn reserved(self) -> u64 { self.reserved }

    pub fn with_compression(mut self, compression: CompressionScheme) -> Self {
        self.compression = compression;
        self
    }
}

// ── ResourceHeader ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceHeader {
    pub name_hash:         u64,
    pub data_offset:       i64,
    pub compressed_size:   i64,
    pub uncompressed_size: i64,
    pub flags:             ResourceFlags,
    pub content_hash:      u32,
    pub group_hash:        u32,
}

impl ResourceHeader {
    pub fn new(name_hash: u64) -> Self {
        Self {
            name_hash,
            data_offset:       0,
            compressed_size:   0,
            uncompressed_size: 0,
            flags:             ResourceFlags::default(),
            content_hash:      0,
            group_hash:        DEFAULT_GROUP_HASH,
        }
    }

    #[inline] pub fn compression(&self) -> CompressionScheme { self.flags.compression() }
    #[inline] pub fn crypto(&self) -> CryptoScheme { self.flags.crypto() }

    /// Offset one past the last stored byte.
    pub fn data_end(&self) -> Option<i64> {
        self.data_offset.checked_add(self.compressed_size)
    }

    pub fn write<W: Write>(&self, mut writer: W, endian: Endian) -> Result<()> {
        endian.write_u64(&mut writer, self.name_hash)?;
        endian.write_i64(&mut writer, self.data_offset)?;
        endian.write_i64(&mut writer, self.compressed_size)?;
        endian.write_i64(&mut writer, self.uncompressed_size)?;
        endian.write_u64(&mut writer, self.flags.raw())?;
        endian.write_u32(&mut writer, self.content_hash)?;
        endian.write_u32(&mut writer, self.group_hash)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R, endian: Endian) -> Result<Self> {
        let name_hash         = endian.read_u64(&mut reader)?;
        let data_offset       = endian.read_i64(&mut reader)?;
        let compressed_size   = endian.read_i64(&mut reader)?;
        let uncompressed_size = endian.read_i64(&mut reader)?;
        let raw_flags         = endian.read_u64(&mut reader)?;
        let content_hash      = endian.read_u32(&mut reader)?;
        let group_hash        = endian.read_u32(&mut reader)?;

        let flags = ResourceFlags::from_raw(raw_flags).map_err(|e| match e {
            PackageError::InvalidResourceFlags { flags, .. } => {
                PackageError::InvalidResourceFlags { name_hash, flags }
            }
            other => other,
        })?;

        Ok(Self {
            name_hash,
            data_offset,
            compressed_size,
            uncompressed_size,
            flags,
            content_hash,
            group_hash,
        })
    }
}

// ── Directory codec ───────────────────────────────────────────────────────────

/// Decode `count` records from a (de-obfuscated) directory buffer.
pub fn read_directory(buf: &[u8], count: usize, endian: Endian) -> Result<Vec<ResourceHeader>> {
    if buf.len() < count * RESOURCE_HEADER_SIZE {
        return Err(PackageError::truncated("resource directory"));
    }
    let mut cursor = Cursor::new(buf);
    (0..count).map(|_| ResourceHeader::read(&mut cursor, endian)).collect()
}

/// Encode `resources` in ascending name-hash order.
pub fn write_directory(resources: &[ResourceHeader], endian: Endian) -> Result<Vec<u8>> {
    let mut sorted: Vec<&ResourceHeader> = resources.iter().collect();
    sorted.sort_by_key(|r| r.name_hash);

    let mut buf = Vec::with_capacity(resources.len() * RESOURCE_HEADER_SIZE);
    for resource in sorted {
        resource.write(&mut buf, endian)?;
    }
    Ok(buf)
}
