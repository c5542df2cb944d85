//! Error type shared by every layer of the package codec.
//!
//! Failures fall into four kinds (see [`ErrorKind`]).  None of them are
//! recoverable within the operation that raised them: a package that fails
//! to decode yields no partial model.

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PackageError>;

/// Coarse classification of a [`PackageError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes do not describe a package this crate understands.
    Format,
    /// The input ended before a declared structure or payload did.
    Truncated,
    /// The operation is deliberately not implemented for this package.
    Unsupported,
    /// Any other I/O failure from the underlying stream.
    Io,
}

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Invalid package signature {0:#010x}")]
    BadSignature(u32),

    #[error("Unsupported package version {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    #[error("Unknown file flags {0:#06x}")]
    UnknownFileFlags(u16),

    #[error("Negative {what} count: {count}")]
    NegativeCount { what: &'static str, count: i64 },

    #[error("Resource {name_hash:016X} has invalid flags {flags:#018x}")]
    InvalidResourceFlags { name_hash: u64, flags: u64 },

    #[error("Unknown compression scheme {0}")]
    UnknownCompression(u8),

    #[error("Unknown crypto scheme {0}")]
    UnknownCrypto(u8),

    #[error("Resource {name_hash:016X} spans {offset}+{size}, beyond end of file ({file_len} bytes)")]
    OutOfBounds { name_hash: u64, offset: i64, size: i64, file_len: u64 },

    #[error("Resource {0:016X} not found")]
    NotFound(u64),

    #[error("Duplicate resource {0:016X}")]
    DuplicateResource(u64),

    #[error("Expected {expected} resources, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Encrypted group {0} has a zero divisor")]
    ZeroDivisor(usize),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Truncated input: {0}")]
    Truncated(io::Error),

    #[error("Unsupported operation: {0}")]
    Unsupported(&'static str),

    #[error("IO error: {0}")]
    Io(io::Error),
}

impl PackageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PackageError::Truncated(_)   => ErrorKind::Truncated,
            PackageError::Unsupported(_) => ErrorKind::Unsupported,
            PackageError::Io(_)          => ErrorKind::Io,
            PackageError::NotFound(_)    => ErrorKind::Io,
            _                            => ErrorKind::Format,
        }
    }

    pub(crate) fn truncated(what: &str) -> Self {
        PackageError::Truncated(io::Error::new(io::ErrorKind::UnexpectedEof, what.to_owned()))
    }
}

impl From<io::Error> for PackageError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            PackageError::Truncated(e)
        } else {
            PackageError::Io(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_maps_to_truncated() {
        let e: PackageError = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert_eq!(e.kind(), ErrorKind::Truncated);

        let e: PackageError = io::Error::new(io::ErrorKind::PermissionDenied, "no").into();
        assert_eq!(e.kind(), ErrorKind::Io);
    }

    #[test]
    fn format_kinds() {
        assert_eq!(PackageError::BadSignature(0).kind(), ErrorKind::Format);
        assert_eq!(PackageError::UnknownCrypto(9).kind(), ErrorKind::Format);
        assert_eq!(PackageError::Unsupported("x").kind(), ErrorKind::Unsupported);
        assert_eq!(PackageError::NotFound(7).kind(), ErrorKind::Io);
    }
}
