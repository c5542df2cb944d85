//! Resource body decryption.
//!
//! # Layout
//! ```text
//! i64 plaintext_len                      (package byte order)
//! group[ceil(plaintext_len / 8)]
//!   u8 key[64]     little-endian integer K
//!   u8 value[64]   little-endian integer V
//! ```
//! Each group yields the 8 low bytes of `V / (K^E mod M)`; the last group
//! yields only `plaintext_len % 8` bytes when the length is not a multiple of
//! eight.  All four crypto schemes share this key and algorithm.

use std::io::Cursor;
use std::sync::OnceLock;

use num_bigint::BigUint;
use num_traits::Zero;

use super::{le_bytes_exact, KeyPair};
use crate::endian::Endian;
use crate::error::{PackageError, Result};

/// Ciphertext bytes consumed per group.
pub const GROUP_LEN: usize = 128;
/// Plaintext bytes produced per full group.
pub const CHUNK_LEN: usize = 8;

const HALF_LEN: usize = GROUP_LEN / 2;

const BODY_MODULUS: [u8; 32] = [
    0x13, 0xD7, 0x9C, 0x89, 0x88, 0x91, 0x48, 0x10,
    0xD7, 0xAA, 0x78, 0xAE, 0xF8, 0x59, 0xDF, 0x7D,
    0x3C, 0x43, 0xA0, 0xD0, 0xBB, 0x36, 0x77, 0xB5,
    0xF0, 0x5C, 0x02, 0xAF, 0x65, 0xD8, 0x77, 0x03,
];

const BODY_EXPONENT: [u8; 32] = [
    0xC0, 0xC2, 0x77, 0x1F, 0x5B, 0x34, 0x6A, 0x01,
    0xC7, 0xD4, 0xD7, 0x85, 0x2E, 0x42, 0x2B, 0x3B,
    0x16, 0x3A, 0x17, 0x13, 0x16, 0xEA, 0x83, 0x30,
    0x30, 0xDF, 0x3F, 0xF4, 0x25, 0x93, 0x20, 0x01,
];

pub(crate) fn body_key() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| KeyPair::fixed(&BODY_MODULUS, &BODY_EXPONENT))
}

/// Number of ciphertext bytes needed for `size` plaintext bytes, or `None`
/// when that count does not fit in `usize`.
pub fn ciphertext_len(size: usize) -> Option<usize> {
    size.div_ceil(CHUNK_LEN).checked_mul(GROUP_LEN)
}

/// Decrypt `size` plaintext bytes from unframed ciphertext groups.
pub fn decrypt(ciphertext: &[u8], size: usize) -> Result<Vec<u8>> {
    let needed = ciphertext_len(size)
        .filter(|&needed| needed <= ciphertext.len())
        .ok_or_else(|| PackageError::truncated("encrypted resource body"))?;

    let key = body_key();
    let mut out = Vec::with_capacity(size);
    for (index, group) in ciphertext[..needed].chunks_exact(GROUP_LEN).enumerate() {
        let k = BigUint::from_bytes_le(&group[..HALF_LEN]);
        let v = BigUint::from_bytes_le(&group[HALF_LEN..]);

        let divisor = key.modpow(&k);
        if divisor.is_zero() {
            return Err(PackageError::ZeroDivisor(index));
        }

        let take = (size - out.len()).min(CHUNK_LEN);
        out.extend_from_slice(&le_bytes_exact(&(v / divisor), take));
    }
    Ok(out)
}

/// Decrypt a stored body: a plaintext length prefix followed by groups.
pub fn decrypt_framed(stored: &[u8], endian: Endian) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(stored);
    let size = endian.read_i64(&mut cursor)?;
    let size = usize::try_from(size)
        .map_err(|_| PackageError::NegativeCount { what: "decrypted byte", count: size })?;
    decrypt(&stored[cursor.position() as usize..], size)
}
