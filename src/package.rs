//! In-memory package model and the header region codec.
//!
//! The header region is everything before the first payload byte: file
//! header, directory, optional sections and key material.  Its size depends
//! only on counts and flags, which is what lets the writer reserve it before
//! any payload offset is known (see [`estimate_header_size`]).

use std::io::{Cursor, Read, Write};

use tracing::{debug, warn};

use crate::block::{Block, BLOCK_SIZE};
use crate::crypto::bogocrypt::Bogocrypt;
use crate::crypto::signed::{self, DigestDecryptor};
use crate::crypto::{apply_xor_table, XorTable, KEY_MATERIAL_LEN};
use crate::endian::Endian;
use crate::error::{PackageError, Result};
use crate::index::{read_directory, write_directory, ResourceHeader, RESOURCE_HEADER_SIZE};
use crate::superblock::{
    BlockTableHeader, ExtensionHeader, FileFlags, FileHeader, VersionInfo,
    BLOCK_TABLE_HEADER_SIZE, EXTENSION_HEADER_SIZE, FILE_HEADER_SIZE, VERSION_INFO_SIZE,
};

/// How the directory is hidden on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Obfuscation {
    #[default]
    None,
    /// Keystream from a stored random seed.
    Legacy,
    /// Keystream from an RSA-signed digest; read-only.
    Signed,
}

impl Obfuscation {
    pub fn name(self) -> &'static str {
        match self {
            Obfuscation::None   => "none",
            Obfuscation::Legacy => "legacy",
            Obfuscation::Signed => "signed",
        }
    }
}

/// Block table of the block-storage revision.  Parsed and written back
/// verbatim; payloads addressed through it are never decoded.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockTable {
    pub block_size: u32,
    pub blocks:     Vec<Block>,
}

/// Exact size of the header region for the given section counts.
pub fn estimate_header_size(
    resource_count: usize,
    has_version:    bool,
    has_extension:  bool,
    block_count:    Option<usize>,
    obfuscated:     bool,
) -> usize {
    let mut size = FILE_HEADER_SIZE + resource_count * RESOURCE_HEADER_SIZE;
    if has_version {
        size += VERSION_INFO_SIZE;
    }
    if has_extension {
        size += EXTENSION_HEADER_SIZE;
    }
    if let Some(count) = block_count {
        size += BLOCK_TABLE_HEADER_SIZE + count * BLOCK_SIZE;
    }
    if obfuscated {
        size += KEY_MATERIAL_LEN;
    }
    size
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Package {
    pub endian:       Endian,
    pub resources:    Vec<ResourceHeader>,
    pub version:      Option<VersionInfo>,
    pub extension:    Option<ExtensionHeader>,
    pub obfuscation:  Obfuscation,
    pub block_table:  Option<BlockTable>,
    /// Trailing key material.  Filled on read; on write it is the legacy
    /// seed to use, or `None` to draw a fresh one.
    pub key_material: Option<[u8; KEY_MATERIAL_LEN]>,
    /// The file header's reserved word, carried through unchanged.
    pub reserved:     u32,
}

impl Package {
    pub fn new(endian: Endian) -> Self {
        Self { endian, ..Self::default() }
    }

    pub fn file_flags(&self) -> FileFlags {
        let mut flags = FileFlags::NONE;
        if self.block_table.is_some() {
            flags.insert(FileFlags::BLOCK_TABLE);
        }
        if self.version.is_some() {
            flags.insert(FileFlags::VERSION_INFO);
        }
        if self.obfuscation != Obfuscation::None {
            flags.insert(FileFlags::OBFUSCATED_DIRECTORY);
        }
        if self.extension.is_some() {
            flags.insert(FileFlags::EXTENSION_HEADER);
        }
        flags
    }

    pub fn header_size(&self) -> usize {
        estimate_header_size(
            self.resources.len(),
            self.version.is_some(),
            self.extension.is_some(),
            self.block_table.as_ref().map(|t| t.blocks.len()),
            self.obfuscation != Obfuscation::None,
        )
    }

    pub fn find(&self, name_hash: u64) -> Option<&ResourceHeader> {
        self.resources.iter().find(|r| r.name_hash == name_hash)
    }

    /// Check every payload range against the container length.
    pub fn check_bounds(&self, file_len: u64) -> Result<()> {
        for r in &self.resources {
            let in_bounds = r.data_offset >= 0
                && r.compressed_size >= 0
                && r.uncompressed_size >= 0
                && r.data_end().is_some_and(|end| end as u64 <= file_len);
            if !in_bounds {
                return Err(PackageError::OutOfBounds {
                    name_hash: r.name_hash,
                    offset:    r.data_offset,
                    size:      r.compressed_size,
                    file_len,
                });
            }
        }
        Ok(())
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    /// Encode the header region.  Resources are emitted sorted by name hash.
    pub fn serialize<W: Write>(&self, mut writer: W) -> Result<()> {
        let bytes = self.to_header_bytes()?;
        writer.write_all(&bytes)?;
        Ok(())
    }

    /// Fail early if this package's obfuscation mode cannot be written.
    pub fn check_writable(&self) -> Result<()> {
        match self.obfuscation {
            Obfuscation::Signed => Err(PackageError::Unsupported(
                "writing a signed directory requires the publisher's private key",
            )),
            Obfuscation::Legacy if self.extension.is_some() => Err(PackageError::Unsupported(
                "legacy obfuscation cannot be combined with the extension header",
            )),
            _ => Ok(()),
        }
    }

    pub fn to_header_bytes(&self) -> Result<Vec<u8>> {
        self.check_writable()?;
        match self.obfuscation {
            Obfuscation::None | Obfuscation::Signed => self.encode_header(None),
            Obfuscation::Legacy => {
                let (seed, crypt) = match self.key_material {
                    Some(seed) => (seed, Bogocrypt::new(&seed)),
                    None => Bogocrypt::generate()?,
                };
                self.encode_header(Some((crypt.table(), &seed)))
            }
        }
    }

    fn encode_header(&self, obfuscation: Option<(&XorTable, &[u8; KEY_MATERIAL_LEN])>) -> Result<Vec<u8>> {
        let endian = self.endian;
        let mut flags = self.file_flags();
        if obfuscation.is_some() {
            flags.insert(FileFlags::OBFUSCATED_DIRECTORY);
        }

        let mut out = Vec::with_capacity(self.header_size());
        FileHeader {
            endian,
            flags,
            resource_count: self.resources.len(),
            reserved: self.reserved,
        }
        .write(&mut out)?;

        let mut directory = write_directory(&self.resources, endian)?;
        if let Some((table, _)) = obfuscation {
            apply_xor_table(table, &mut directory);
        }
        out.extend_from_slice(&directory);

        if let Some(version) = &self.version {
            version.write(&mut out, endian)?;
        }
        if let Some(extension) = &self.extension {
            extension.write(&mut out, endian)?;
        }
        if let Some(table) = &self.block_table {
            BlockTableHeader { block_size: table.block_size, block_count: table.blocks.len() }
                .write(&mut out, endian)?;
            for block in &table.blocks {
                block.write(&mut out, endian)?;
            }
        }
        if let Some((_, key_material)) = obfuscation {
            out.extend_from_slice(key_material);
        }

        debug!(
            resources = self.resources.len(),
            flags = flags.bits(),
            bytes = out.len(),
            "encoded package header"
        );
        Ok(out)
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    /// Decode a header region.  Signed packages need `decryptor`.
    pub fn deserialize<R: Read>(mut reader: R, decryptor: Option<&dyn DigestDecryptor>) -> Result<Self> {
        let header = FileHeader::read(&mut reader)?;
        let endian = header.endian;
        let flags = header.flags;

        let directory_len = header.resource_count * RESOURCE_HEADER_SIZE;
        let mut directory = Vec::new();
        (&mut reader).take(directory_len as u64).read_to_end(&mut directory)?;
        if directory.len() != directory_len {
            return Err(PackageError::truncated("resource directory"));
        }

        let version = if flags.contains(FileFlags::VERSION_INFO) {
            Some(VersionInfo::read(&mut reader, endian)?)
        } else {
            None
        };

        let extension = if flags.contains(FileFlags::EXTENSION_HEADER) {
            Some(ExtensionHeader::read(&mut reader, endian)?)
        } else {
            None
        };

        let block_table = if flags.contains(FileFlags::BLOCK_TABLE) {
            let table = BlockTableHeader::read(&mut reader, endian)?;
            let mut raw = Vec::new();
            (&mut reader).take((table.block_count * BLOCK_SIZE) as u64).read_to_end(&mut raw)?;
            if raw.len() != table.block_count * BLOCK_SIZE {
                return Err(PackageError::truncated("block table"));
            }
            let mut cursor = Cursor::new(raw);
            let blocks = (0..table.block_count)
                .map(|_| Block::read(&mut cursor, endian))
                .collect::<std::io::Result<Vec<_>>>()?;
            Some(BlockTable { block_size: table.block_size, blocks })
        } else {
            None
        };

        let mut key_material = None;
        let obfuscation = if flags.contains(FileFlags::OBFUSCATED_DIRECTORY) {
            let mut material = [0u8; KEY_MATERIAL_LEN];
            reader.read_exact(&mut material)?;
            key_material = Some(material);

            if extension.is_some() {
                let decryptor = decryptor.ok_or(PackageError::Unsupported(
                    "signed directory cannot be read without a digest decryptor",
                ))?;
                signed::deobfuscate(decryptor, &material, &mut directory)?;
                Obfuscation::Signed
            } else {
                Bogocrypt::new(&material).apply(&mut directory);
                Obfuscation::Legacy
            }
        } else {
            Obfuscation::None
        };

        let resources = read_directory(&directory, header.resource_count, endian)?;
        if header.reserved != 0 {
            warn!(reserved = header.reserved, "non-zero reserved word in file header");
        }

        debug!(
            endian = endian.name(),
            resources = resources.len(),
            obfuscation = obfuscation.name(),
            blocks = block_table.as_ref().map_or(0, |t| t.blocks.len()),
            "decoded package header"
        );

        Ok(Self {
            endian,
            resources,
            version,
            extension,
            obfuscation,
            block_table,
            key_material,
            reserved: header.reserved,
        })
    }
}
