//! High-level [`Archive`] API over files on disk.
//!
//! ```no_run
//! use akpk::archive::Archive;
//! use akpk::codec::CompressionScheme;
//! use akpk::io_stream::PackOptions;
//! use std::collections::HashMap;
//!
//! // Write
//! let mut ar = Archive::create("out.pak", PackOptions::default(), 1)?;
//! ar.add_resource(0x1234, b"Hello, world!", CompressionScheme::Zstd)?;
//! ar.finish()?;
//!
//! // Read
//! let mut ar = Archive::open("out.pak")?;
//! assert_eq!(ar.read_resource(0x1234)?, b"Hello, world!");
//! let names: HashMap<u64, String> = HashMap::new();
//! for info in ar.list(&names)? {
//!     println!("{} {}", info.hash, info.name);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::codec::CompressionScheme;
use crate::crypto::signed::DigestDecryptor;
use crate::crypto::CryptoScheme;
use crate::error::{ErrorKind, PackageError, Result};
use crate::index::ResourceHeader;
use crate::io_stream::{NameResolver, PackOptions, PackageReader, PackageWriter, UNKNOWN_PREFIX};
use crate::package::Package;

// ── ResourceInfo ──────────────────────────────────────────────────────────────

/// Listing entry returned by [`Archive::list`].
#[derive(Debug, Clone, Serialize)]
pub struct ResourceInfo {
    pub hash:              String,
    pub name:              String,
    pub offset:            i64,
    pub compressed_size:   i64,
    pub uncompressed_size: i64,
    pub compression:       CompressionScheme,
    pub crypto:            CryptoScheme,
    pub content_hash:      u32,
    pub group_hash:        u32,
}

impl ResourceInfo {
    fn new(r: &ResourceHeader, name: String) -> Self {
        ResourceInfo {
            hash:              format!("{:016X}", r.name_hash),
            name,
            offset:            r.data_offset,
            compressed_size:   r.compressed_size,
            uncompressed_size: r.uncompressed_size,
            compression:       r.compression(),
            crypto:            r.crypto(),
            content_hash:      r.content_hash,
            group_hash:        r.group_hash,
        }
    }
}

// ── ArchiveMode ───────────────────────────────────────────────────────────────

enum ArchiveMode {
    Read(PackageReader<BufReader<File>>),
    Write(PackageWriter<BufWriter<File>>),
}

// ── Archive ───────────────────────────────────────────────────────────────────

pub struct Archive {
    path: PathBuf,
    mode: ArchiveMode,
}

impl Archive {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_decryptor(path, None)
    }

    /// Open a package whose directory may be signed.
    pub fn open_with_decryptor<P: AsRef<Path>>(path: P, decryptor: Option<&dyn DigestDecryptor>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let reader = PackageReader::with_decryptor(BufReader::new(File::open(&path)?), decryptor)?;
        debug!(path = %path.display(), resources = reader.resources().len(), "opened package");
        Ok(Self { path, mode: ArchiveMode::Read(reader) })
    }

    /// Create a package that will hold exactly `resource_count` resources.
    pub fn create<P: AsRef<Path>>(path: P, options: PackOptions, resource_count: usize) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let writer = PackageWriter::new(BufWriter::new(File::create(&path)?), options, resource_count)?;
        Ok(Self { path, mode: ArchiveMode::Write(writer) })
    }

    // ── Write ─────────────────────────────────────────────────────────────────

    pub fn add_resource(&mut self, name_hash: u64, data: &[u8], compression: CompressionScheme) -> Result<()> {
        match &mut self.mode {
            ArchiveMode::Write(w) => w.add_resource_bytes(name_hash, data, compression).map(|_| ()),
            ArchiveMode::Read(_)  => Err(read_only()),
        }
    }

    /// Stream the contents of `source` as one resource.
    pub fn add_file<P: AsRef<Path>>(
        &mut self,
        name_hash:   u64,
        source:      P,
        compression: CompressionScheme,
    ) -> Result<()> {
        let file = File::open(source)?;
        let length = file.metadata()?.len();
        match &mut self.mode {
            ArchiveMode::Write(w) => w
                .add_resource(name_hash, BufReader::new(file), length, compression)
                .map(|_| ()),
            ArchiveMode::Read(_) => Err(read_only()),
        }
    }

    /// Write the header and close the file.
    pub fn finish(self) -> Result<()> {
        match self.mode {
            ArchiveMode::Write(w) => {
                let mut file = w.finish()?;
                file.flush()?;
                Ok(())
            }
            ArchiveMode::Read(_) => Err(read_only()),
        }
    }

    // ── Read ──────────────────────────────────────────────────────────────────

    fn reader(&mut self) -> Result<&mut PackageReader<BufReader<File>>> {
        match &mut self.mode {
            ArchiveMode::Read(r)  => Ok(r),
            ArchiveMode::Write(_) => Err(write_only()),
        }
    }

    pub fn package(&self) -> Option<&Package> {
        match &self.mode {
            ArchiveMode::Read(r)  => Some(r.package()),
            ArchiveMode::Write(_) => None,
        }
    }

    /// Directory listing in on-disk order, with resolved or guessed names.
    ///
    /// Block-table packages cannot be sniffed, so their unknown names carry
    /// no extension.
    pub fn list(&mut self, resolver: &dyn NameResolver) -> Result<Vec<ResourceInfo>> {
        let reader = self.reader()?;
        let resources = reader.resources().to_vec();
        let mut out = Vec::with_capacity(resources.len());
        for r in &resources {
            let name = match reader.resource_name(r, resolver) {
                Ok(name) => name,
                Err(e) if e.kind() == ErrorKind::Unsupported => {
                    format!("{UNKNOWN_PREFIX}/{:016X}", r.name_hash)
                }
                Err(e) => return Err(e),
            };
            out.push(ResourceInfo::new(r, name));
        }
        Ok(out)
    }

    pub fn stat(&self, name_hash: u64) -> Option<ResourceHeader> {
        match &self.mode {
            ArchiveMode::Read(r)  => r.find(name_hash).copied(),
            ArchiveMode::Write(w) => w.resources().iter().find(|r| r.name_hash == name_hash).copied(),
        }
    }

    pub fn read_resource(&mut self, name_hash: u64) -> Result<Vec<u8>> {
        let reader = self.reader()?;
        let resource = *reader.find(name_hash).ok_or(PackageError::NotFound(name_hash))?;
        reader.read_resource(&resource)
    }

    /// Decode one resource straight into a file.
    pub fn extract_resource<P: AsRef<Path>>(&mut self, name_hash: u64, dest: P) -> Result<()> {
        let reader = self.reader()?;
        let resource = *reader.find(name_hash).ok_or(PackageError::NotFound(name_hash))?;
        let mut out = BufWriter::new(File::create(dest)?);
        reader.extract_to(&resource, &mut out)?;
        out.flush()?;
        Ok(())
    }

    /// Extract every resource under `dest`, in payload order.  Returns the
    /// relative paths written.
    pub fn extract_all<P: AsRef<Path>>(&mut self, dest: P, resolver: &dyn NameResolver) -> Result<Vec<PathBuf>> {
        let dest = dest.as_ref();
        let reader = self.reader()?;
        let mut written = Vec::new();
        for r in reader.by_offset() {
            let relative = sanitize(&reader.resource_name(&r, resolver)?);
            let target = dest.join(&relative);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = BufWriter::new(File::create(&target)?);
            reader.extract_to(&r, &mut out)?;
            out.flush()?;
            written.push(relative);
        }
        Ok(written)
    }

    // ── Metadata ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }
}

/// Keep only the plain components of a resource path.
fn sanitize(name: &str) -> PathBuf {
    Path::new(name)
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

fn read_only() -> PackageError { PackageError::Unsupported("archive is open for reading") }
fn write_only() -> PackageError { PackageError::Unsupported("archive is open for writing") }
