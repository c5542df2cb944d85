//! Big-integer keystream engine shared by the directory obfuscation schemes
//! and resource body decryption.
//!
//! Every key in the format is a public modulus/exponent pair stored as
//! unsigned little-endian bytes, and every big integer read from a package is
//! little-endian as well.  Nothing here offers confidentiality: the schemes
//! only exist to make the data opaque to casual inspection.
//!
//! XOR keystream (both directory schemes):
//!
//! ```text
//! out[i] = in[i] ^ ((table[i % 32] * table[i % 29] + i) mod 256)
//! ```

use num_bigint::BigUint;
use num_traits::Zero;
use serde::Serialize;

use crate::error::PackageError;

pub mod bogocrypt;
pub mod resource;
pub mod signed;

/// Body encryption variant, bits 16..20 of a resource's flags.
///
/// The variants differ only in which resources use them; decryption is the
/// same for all four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CryptoScheme {
    #[default]
    None,
    Type1,
    Type2,
    Type3,
    Type4,
}

impl CryptoScheme {
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            CryptoScheme::None  => 0,
            CryptoScheme::Type1 => 1,
            CryptoScheme::Type2 => 2,
            CryptoScheme::Type3 => 3,
            CryptoScheme::Type4 => 4,
        }
    }

    pub fn from_code(code: u8) -> Result<Self, PackageError> {
        match code {
            0 => Ok(CryptoScheme::None),
            1 => Ok(CryptoScheme::Type1),
            2 => Ok(CryptoScheme::Type2),
            3 => Ok(CryptoScheme::Type3),
            4 => Ok(CryptoScheme::Type4),
            _ => Err(PackageError::UnknownCrypto(code)),
        }
    }

    #[inline]
    pub fn is_encrypted(self) -> bool { self != CryptoScheme::None }
}

/// Byte length of the key material trailing an obfuscated directory.
pub const KEY_MATERIAL_LEN: usize = 128;

/// Byte length of the table that drives the XOR keystream.
pub const XOR_TABLE_LEN: usize = 32;

pub type XorTable = [u8; XOR_TABLE_LEN];

/// A public modulus/exponent pair.
#[derive(Debug, Clone)]
pub struct KeyPair {
    modulus:  BigUint,
    exponent: BigUint,
}

impl KeyPair {
    /// Build a key pair from unsigned little-endian byte strings.
    ///
    /// Returns `None` for a zero modulus.
    pub fn from_le_bytes(modulus: &[u8], exponent: &[u8]) -> Option<Self> {
        let modulus = BigUint::from_bytes_le(modulus);
        if modulus.is_zero() {
            return None;
        }
        Some(Self { modulus, exponent: BigUint::from_bytes_le(exponent) })
    }

    /// Key pair for one of the format's built-in non-zero constants.
    pub(crate) fn fixed(modulus: &[u8], exponent: &[u8]) -> Self {
        Self {
            modulus:  BigUint::from_bytes_le(modulus),
            exponent: BigUint::from_bytes_le(exponent),
        }
    }

    pub fn modulus(&self) -> &BigUint { &self.modulus }
    pub fn exponent(&self) -> &BigUint { &self.exponent }

    #[inline]
    pub fn modpow(&self, base: &BigUint) -> BigUint {
        base.modpow(&self.exponent, &self.modulus)
    }

    /// `modpow` over a little-endian byte string.
    pub fn modpow_le(&self, bytes: &[u8]) -> BigUint {
        self.modpow(&BigUint::from_bytes_le(bytes))
    }
}

/// Little-endian bytes of `value`, zero-padded or truncated to `len`.
pub fn le_bytes_exact(value: &BigUint, len: usize) -> Vec<u8> {
    let mut bytes = value.to_bytes_le();
    bytes.resize(len, 0);
    bytes
}

/// The first 32 little-endian bytes of `value`, zero-padded.
pub fn xor_table(value: &BigUint) -> XorTable {
    let mut table = [0u8; XOR_TABLE_LEN];
    table.copy_from_slice(&le_bytes_exact(value, XOR_TABLE_LEN));
    table
}

/// Apply the keystream derived from `table` to `data` in place.
///
/// The transform is its own inverse.
pub fn apply_xor_table(table: &XorTable, data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        let x = (table[i % 32] as usize * table[i % 29] as usize).wrapping_add(i);
        *byte ^= x as u8;
    }
}
