//! Streaming package engine: writer and reader.
//!
//! # Writer
//! [`PackageWriter`] works in two phases.  On creation it reserves the exact
//! header region at offset 0 (its size depends only on the resource count
//! and the enabled sections).  Each [`PackageWriter::add_resource`] then
//! streams one payload at the current position, hashing the uncompressed
//! bytes and compressing them on the way through.  [`PackageWriter::finish`]
//! seeks back to 0 and writes the header and directory in place.
//!
//! # Reader
//! [`PackageReader`] decodes the header region, validates every payload range
//! against the stream length and then serves payloads on demand.  Every
//! payload access seeks to the resource's `data_offset` first, so calls may
//! be made in any order.  Body decryption always runs before decompression.
//!
//! Packages carrying a block table can be listed but not extracted: payload
//! access on them fails with an unsupported-operation error.

use std::collections::{HashMap, HashSet};
use std::io::{self, BufRead, Cursor, Read, Seek, SeekFrom, Write};

use tracing::{debug, trace};

use crate::codec::{get_codec, CompressionScheme, HashingReader};
use crate::crypto::resource::decrypt_framed;
use crate::crypto::signed::DigestDecryptor;
use crate::crypto::{CryptoScheme, KEY_MATERIAL_LEN};
use crate::detect::{guess_extension, BEST_GUESS_LENGTH};
use crate::endian::Endian;
use crate::error::{PackageError, Result};
use crate::index::{ResourceFlags, ResourceHeader, DEFAULT_GROUP_HASH};
use crate::package::{Obfuscation, Package};
use crate::superblock::{ExtensionHeader, VersionInfo};

/// Directory under which resources without a known path are named.
pub const UNKNOWN_PREFIX: &str = "__UNKNOWN";

/// Upper bound on output buffer preallocation; larger payloads grow as they decode.
const PREALLOC_LIMIT: u64 = 1 << 20;

// ── Options ──────────────────────────────────────────────────────────────────

/// Everything about a new package that is not a resource.
#[derive(Debug, Clone, Default)]
pub struct PackOptions {
    pub endian:      Endian,
    /// `Signed` cannot be written.
    pub obfuscation: Obfuscation,
    /// Legacy obfuscation seed; `None` draws a random one.
    pub seed:        Option<[u8; KEY_MATERIAL_LEN]>,
    pub version:     Option<VersionInfo>,
    pub extension:   Option<ExtensionHeader>,
    /// Compression level for every resource; `None` uses each codec's
    /// default (zstd 3, deflate 9).
    pub level:       Option<i32>,
}

// ── Writer ───────────────────────────────────────────────────────────────────

pub struct PackageWriter<W: Write + Seek> {
    writer:   W,
    package:  Package,
    expected: usize,
    level:    Option<i32>,
    seen:     HashSet<u64>,
}

impl<W: Write + Seek> PackageWriter<W> {
    /// Start a package that will hold exactly `resource_count` resources.
    pub fn new(mut writer: W, options: PackOptions, resource_count: usize) -> Result<Self> {
        let package = Package {
            endian:       options.endian,
            version:      options.version,
            extension:    options.extension,
            obfuscation:  options.obfuscation,
            key_material: options.seed,
            ..Package::default()
        };
        package.check_writable()?;

        let reserved = crate::package::estimate_header_size(
            resource_count,
            package.version.is_some(),
            package.extension.is_some(),
            None,
            package.obfuscation != Obfuscation::None,
        );
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&vec![0u8; reserved])?; // overwritten by finish()

        debug!(resources = resource_count, header_bytes = reserved, "reserved package header");
        Ok(Self {
            writer,
            package,
            expected: resource_count,
            level: options.level,
            seen: HashSet::with_capacity(resource_count),
        })
    }

    /// Resources added so far, in insertion order.
    pub fn resources(&self) -> &[ResourceHeader] {
        &self.package.resources
    }

    /// Stream `length` bytes from `reader` as the payload of `name_hash`.
    pub fn add_resource<R: Read>(
        &mut self,
        name_hash:   u64,
        reader:      R,
        length:      u64,
        compression: CompressionScheme,
    ) -> Result<&ResourceHeader> {
        if self.package.resources.len() == self.expected {
            return Err(PackageError::CountMismatch {
                expected: self.expected,
                actual:   self.expected + 1,
            });
        }
        if !self.seen.insert(name_hash) {
            return Err(PackageError::DuplicateResource(name_hash));
        }

        let data_offset = self.writer.stream_position()?;
        let codec = get_codec(compression);
        let level = self.level.unwrap_or_else(|| codec.default_level());

        let mut hashing = HashingReader::new(reader.take(length));
        let written = codec.compress(&mut hashing, &mut self.writer, level)?;
        if hashing.len() != length {
            return Err(PackageError::truncated("resource input"));
        }

        let resource = ResourceHeader {
            name_hash,
            data_offset:       to_i64(data_offset)?,
            compressed_size:   to_i64(written)?,
            uncompressed_size: to_i64(length)?,
            flags:             ResourceFlags::new(compression, CryptoScheme::None),
            content_hash:      hashing.content_hash(),
            group_hash:        DEFAULT_GROUP_HASH,
        };
        trace!(
            name_hash = format_args!("{name_hash:016X}"),
            offset = data_offset,
            stored = written,
            size = length,
            scheme = compression.name(),
            "wrote resource"
        );

        self.package.resources.push(resource);
        Ok(&self.package.resources[self.package.resources.len() - 1])
    }

    pub fn add_resource_bytes(
        &mut self,
        name_hash:   u64,
        data:        &[u8],
        compression: CompressionScheme,
    ) -> Result<&ResourceHeader> {
        self.add_resource(name_hash, data, data.len() as u64, compression)
    }

    /// Write the header region at offset 0 and hand back the stream,
    /// positioned at its end.
    pub fn finish(mut self) -> Result<W> {
        let actual = self.package.resources.len();
        if actual != self.expected {
            return Err(PackageError::CountMismatch { expected: self.expected, actual });
        }

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        self.package.serialize(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;

        debug!(resources = actual, bytes = end, "finished package");
        Ok(self.writer)
    }
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| PackageError::Unsupported("payload offset beyond i64::MAX"))
}

// ── Naming ───────────────────────────────────────────────────────────────────

/// Maps a resource name hash to its path, when known.
pub trait NameResolver {
    fn resolve(&self, name_hash: u64) -> Option<String>;
}

impl NameResolver for HashMap<u64, String> {
    fn resolve(&self, name_hash: u64) -> Option<String> {
        self.get(&name_hash).cloned()
    }
}

impl<F> NameResolver for F
where
    F: Fn(u64) -> Option<String>,
{
    fn resolve(&self, name_hash: u64) -> Option<String> {
        self(name_hash)
    }
}

/// Parse a name list: one `<hash:hex> <path>` pair per line.
///
/// Blank lines and lines starting with `#` are skipped.
pub fn read_name_list<R: BufRead>(reader: R) -> io::Result<HashMap<u64, String>> {
    let mut names = HashMap::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let parsed = line
            .split_once(char::is_whitespace)
            .and_then(|(hash, path)| {
                let hash = hash.trim_start_matches("0x");
                u64::from_str_radix(hash, 16).ok().map(|h| (h, path.trim()))
            });
        match parsed {
            Some((hash, path)) if !path.is_empty() => {
                names.insert(hash, path.to_owned());
            }
            _ => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("name list line {}: expected `<hash> <path>`", number + 1),
                ))
            }
        }
    }
    Ok(names)
}

// ── Reader ───────────────────────────────────────────────────────────────────

pub struct PackageReader<R: Read + Seek> {
    reader:   R,
    package:  Package,
    file_len: u64,
}

impl<R: Read + Seek> PackageReader<R> {
    pub fn new(reader: R) -> Result<Self> {
        Self::with_decryptor(reader, None)
    }

    /// Open a package.  Signed directories need `decryptor`; everything
    /// else ignores it.
    pub fn with_decryptor(mut reader: R, decryptor: Option<&dyn DigestDecryptor>) -> Result<Self> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;

        let package = Package::deserialize(&mut reader, decryptor)?;
        package.check_bounds(file_len)?;

        Ok(Self { reader, package, file_len })
    }

    pub fn package(&self) -> &Package { &self.package }
    pub fn endian(&self) -> Endian { self.package.endian }
    pub fn file_len(&self) -> u64 { self.file_len }

    /// Directory entries in on-disk (name hash) order.
    pub fn resources(&self) -> &[ResourceHeader] {
        &self.package.resources
    }

    pub fn find(&self, name_hash: u64) -> Option<&ResourceHeader> {
        self.package.find(name_hash)
    }

    /// Directory entries sorted by payload offset, for sequential reads.
    pub fn by_offset(&self) -> Vec<ResourceHeader> {
        let mut resources = self.package.resources.clone();
        resources.sort_by_key(|r| (r.data_offset, r.name_hash));
        resources
    }

    pub fn into_inner(self) -> R { self.reader }

    // ── Payload access ───────────────────────────────────────────────────────

    /// Decode a whole payload into memory.
    pub fn read_resource(&mut self, resource: &ResourceHeader) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity((resource.uncompressed_size as u64).min(PREALLOC_LIMIT) as usize);
        self.extract_to(resource, &mut out)?;
        Ok(out)
    }

    /// Decode a whole payload into `sink`.
    pub fn extract_to(&mut self, resource: &ResourceHeader, sink: &mut dyn Write) -> Result<()> {
        self.decode(resource, resource.uncompressed_size as u64, sink)?;
        trace!(
            name_hash = format_args!("{:016X}", resource.name_hash),
            size = resource.uncompressed_size,
            "extracted resource"
        );
        Ok(())
    }

    /// Decode at most the first `len` bytes of a payload.
    pub fn read_prefix(&mut self, resource: &ResourceHeader, len: usize) -> Result<Vec<u8>> {
        let len = (len as u64).min(resource.uncompressed_size as u64);
        let mut out = Vec::with_capacity(len.min(PREALLOC_LIMIT) as usize);
        self.decode(resource, len, &mut out)?;
        Ok(out)
    }

    /// Path of `resource`: the resolver's answer, or
    /// `__UNKNOWN/<HASH><ext>` with the extension sniffed from the payload.
    pub fn resource_name(&mut self, resource: &ResourceHeader, resolver: &dyn NameResolver) -> Result<String> {
        if let Some(name) = resolver.resolve(resource.name_hash) {
            return Ok(name);
        }
        let prefix = self.read_prefix(resource, BEST_GUESS_LENGTH)?;
        Ok(format!(
            "{UNKNOWN_PREFIX}/{:016X}{}",
            resource.name_hash,
            guess_extension(&prefix)
        ))
    }

    fn decode(&mut self, resource: &ResourceHeader, len: u64, sink: &mut dyn Write) -> Result<()> {
        if self.package.block_table.is_some() {
            return Err(PackageError::Unsupported(
                "payloads of block-table packages cannot be decoded",
            ));
        }

        let codec = get_codec(resource.compression());
        self.reader.seek(SeekFrom::Start(resource.data_offset as u64))?;
        let mut stored = (&mut self.reader).take(resource.compressed_size as u64);

        if resource.crypto().is_encrypted() {
            let mut ciphertext = Vec::with_capacity(resource.compressed_size as usize);
            stored.read_to_end(&mut ciphertext)?;
            if ciphertext.len() as i64 != resource.compressed_size {
                return Err(PackageError::truncated("encrypted resource body"));
            }
            let plain = decrypt_framed(&ciphertext, self.package.endian)?;
            codec.decompress(&mut Cursor::new(plain), sink, len)?;
        } else {
            codec.decompress(&mut stored, sink, len)?;
        }
        Ok(())
    }
}
