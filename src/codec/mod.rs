//! Compression dispatch and content hashing.
//!
//! The compression scheme lives in the low nibble of a resource's flags.
//! Only three codes exist; the rest of the nibble is reserved and a reader
//! MUST reject it rather than pass the bytes through.
//!
//! | code | scheme  | stream format            |
//! |------|---------|--------------------------|
//! | 0    | none    | stored verbatim          |
//! | 1    | deflate | raw deflate, no zlib header |
//! | 2    | zstd    | zstd frames              |
//!
//! # Content hash
//! Every resource records a 32-bit hash of its *uncompressed* bytes:
//! `xxh32(le_bytes(xxh64(data, 0xFFFFFFFF)), 0xFFFFFFFF)`.  The 64-bit pass is
//! streamed through [`HashingReader`] while the payload is being encoded.

use std::io::{self, Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use serde::Serialize;
use thiserror::Error;
use xxhash_rust::xxh32::xxh32;
use xxhash_rust::xxh64::Xxh64;

use crate::error::PackageError;

/// Seed of both content-hash passes.
pub const CONTENT_HASH_SEED: u32 = 0xFFFF_FFFF;

const COPY_BUFFER_SIZE: usize = 64 * 1024;

// ── CompressionScheme ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionScheme {
    #[default]
    None,
    Deflate,
    Zstd,
}

impl CompressionScheme {
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            CompressionScheme::None    => 0,
            CompressionScheme::Deflate => 1,
            CompressionScheme::Zstd    => 2,
        }
    }

    /// Resolve a 4-bit scheme code.  Reserved codes are an error.
    pub fn from_code(code: u8) -> Result<Self, PackageError> {
        match code {
            0 => Ok(CompressionScheme::None),
            1 => Ok(CompressionScheme::Deflate),
            2 => Ok(CompressionScheme::Zstd),
            _ => Err(PackageError::UnknownCompression(code)),
        }
    }

    /// Human-readable name (diagnostics and CLI).
    pub fn name(self) -> &'static str {
        match self {
            CompressionScheme::None    => "none",
            CompressionScheme::Deflate => "deflate",
            CompressionScheme::Zstd    => "zstd",
        }
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    #[error("Decompressed stream ended after {actual} of {expected} bytes")]
    ShortOutput { expected: u64, actual: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<CodecError> for PackageError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Io(e) => PackageError::from(e),
            CodecError::ShortOutput { .. } => PackageError::Truncated(
                io::Error::new(io::ErrorKind::UnexpectedEof, e.to_string()),
            ),
            other => PackageError::Compression(other.to_string()),
        }
    }
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn default_level(&self) -> i32;

    /// Compress all of `input` into `output`; returns the bytes written.
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: i32) -> Result<u64, CodecError>;

    /// Write exactly `size` decompressed bytes to `output`.
    ///
    /// Decoding stops at `size` even if the stream holds more; a stream that
    /// ends early is [`CodecError::ShortOutput`].
    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write, size: u64) -> Result<(), CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn default_level(&self) -> i32 { 0 }
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, _: i32) -> Result<u64, CodecError> {
        Ok(io::copy(input, output)?)
    }
    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write, size: u64) -> Result<(), CodecError> {
        copy_exact(input, output, size)
    }
}

pub struct DeflateCodec;
impl Codec for DeflateCodec {
    fn default_level(&self) -> i32 { 9 }
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: i32) -> Result<u64, CodecError> {
        let mut counter = CountingWriter::new(output);
        let mut encoder = DeflateEncoder::new(&mut counter, Compression::new(level.clamp(0, 9) as u32));
        io::copy(input, &mut encoder)?;
        encoder.finish().map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(counter.count())
    }
    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write, size: u64) -> Result<(), CodecError> {
        copy_exact(&mut DeflateDecoder::new(input), output, size)
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn default_level(&self) -> i32 { 3 }
    fn compress(&self, input: &mut dyn Read, output: &mut dyn Write, level: i32) -> Result<u64, CodecError> {
        let mut counter = CountingWriter::new(output);
        zstd::stream::copy_encode(input, &mut counter, level)
            .map_err(|e| CodecError::Compression(e.to_string()))?;
        Ok(counter.count())
    }
    fn decompress(&self, input: &mut dyn Read, output: &mut dyn Write, size: u64) -> Result<(), CodecError> {
        let mut decoder = zstd::stream::read::Decoder::new(input)
            .map_err(|e| CodecError::Decompression(e.to_string()))?;
        copy_exact(&mut decoder, output, size)
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a scheme to a built-in codec.
pub fn get_codec(scheme: CompressionScheme) -> Box<dyn Codec> {
    match scheme {
        CompressionScheme::None    => Box::new(NoneCodec),
        CompressionScheme::Deflate => Box::new(DeflateCodec),
        CompressionScheme::Zstd    => Box::new(ZstdCodec),
    }
}

// ── Streaming helpers ────────────────────────────────────────────────────────

/// Copy exactly `size` bytes, treating decoder failures as corrupt data.
fn copy_exact(input: &mut dyn Read, output: &mut dyn Write, size: u64) -> Result<(), CodecError> {
    let mut buf = vec![0u8; COPY_BUFFER_SIZE.min(size as usize)];
    let mut done = 0u64;
    while done < size {
        let want = (size - done).min(buf.len() as u64) as usize;
        let read = match input.read(&mut buf[..want]) {
            Ok(0) => return Err(CodecError::ShortOutput { expected: size, actual: done }),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(CodecError::Io(e)),
            Err(e) => return Err(CodecError::Decompression(e.to_string())),
        };
        output.write_all(&buf[..read])?;
        done += read as u64;
    }
    Ok(())
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    fn new(inner: W) -> Self { Self { inner, count: 0 } }
    fn count(&self) -> u64 { self.count }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> { self.inner.flush() }
}

/// Reader adapter that feeds everything it yields into the content hash.
pub struct HashingReader<R> {
    inner:  R,
    hasher: Xxh64,
    len:    u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, hasher: Xxh64::new(CONTENT_HASH_SEED as u64), len: 0 }
    }

    /// Bytes read so far.
    pub fn len(&self) -> u64 { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// XXH64 of the bytes read so far.
    pub fn digest64(&self) -> u64 { self.hasher.digest() }

    /// The 32-bit `ContentHash` of the bytes read so far.
    pub fn content_hash(&self) -> u32 { reduce_digest(self.digest64()) }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.len += n as u64;
        Ok(n)
    }
}

/// Fold a 64-bit content digest to the 32-bit field stored in the directory.
pub fn reduce_digest(digest64: u64) -> u32 {
    xxh32(&digest64.to_le_bytes(), CONTENT_HASH_SEED)
}

/// `ContentHash` of an in-memory buffer.
pub fn content_hash(data: &[u8]) -> u32 {
    reduce_digest(xxhash_rust::xxh64::xxh64(data, CONTENT_HASH_SEED as u64))
}
