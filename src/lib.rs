pub mod error;
pub mod endian;
pub mod superblock;
pub mod block;
pub mod index;
pub mod codec;
pub mod crypto;
pub mod package;
pub mod detect;
pub mod io_stream;
pub mod archive;

pub use error::{ErrorKind, PackageError, Result};
pub use endian::Endian;
pub use codec::{CompressionScheme, get_codec, content_hash};
pub use crypto::CryptoScheme;
pub use crypto::signed::{DigestDecryptor, RsaDigestDecryptor};
pub use index::{ResourceFlags, ResourceHeader};
pub use package::{Obfuscation, Package, estimate_header_size};
pub use detect::guess_extension;
pub use io_stream::{NameResolver, PackOptions, PackageReader, PackageWriter};
pub use archive::Archive;
