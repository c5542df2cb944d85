//! Directory obfuscation for the signed (extension-header) revision.
//!
//! The 128 bytes trailing the header are an RSA ciphertext.  Decrypting them
//! with the publisher's public key yields a 32-byte digest that is used
//! directly as the XOR keystream table.  Producing that ciphertext needs the
//! private key, so packages of this revision can be read but never written.

use super::{apply_xor_table, xor_table, KeyPair, XorTable, KEY_MATERIAL_LEN};
use crate::error::{PackageError, Result};

/// Recovers the keystream digest from a signed package's key material.
pub trait DigestDecryptor {
    fn decrypt(&self, ciphertext: &[u8; KEY_MATERIAL_LEN]) -> Result<XorTable>;
}

impl<F> DigestDecryptor for F
where
    F: Fn(&[u8; KEY_MATERIAL_LEN]) -> Result<XorTable>,
{
    fn decrypt(&self, ciphertext: &[u8; KEY_MATERIAL_LEN]) -> Result<XorTable> {
        self(ciphertext)
    }
}

/// Textbook `c^e mod n` decryption with a caller-supplied public key.
///
/// The digest is the low 32 bytes of the result in little-endian order.
#[derive(Debug, Clone)]
pub struct RsaDigestDecryptor {
    key: KeyPair,
}

impl RsaDigestDecryptor {
    /// `modulus` and `exponent` are unsigned little-endian byte strings.
    pub fn new(modulus: &[u8], exponent: &[u8]) -> Result<Self> {
        let key = KeyPair::from_le_bytes(modulus, exponent)
            .ok_or(PackageError::Unsupported("RSA modulus must be non-zero"))?;
        Ok(Self { key })
    }
}

impl DigestDecryptor for RsaDigestDecryptor {
    fn decrypt(&self, ciphertext: &[u8; KEY_MATERIAL_LEN]) -> Result<XorTable> {
        Ok(xor_table(&self.key.modpow_le(ciphertext)))
    }
}

/// Restore a signed package's directory in place.
pub fn deobfuscate(
    decryptor:    &dyn DigestDecryptor,
    key_material: &[u8; KEY_MATERIAL_LEN],
    directory:    &mut [u8],
) -> Result<()> {
    let table = decryptor.decrypt(key_material)?;
    apply_xor_table(&table, directory);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigUint;

    #[test]
    fn closure_decryptor_supplies_table() {
        let table = [7u8; 32];
        let decryptor = move |_: &[u8; KEY_MATERIAL_LEN]| -> Result<XorTable> { Ok(table) };

        let original = vec![0u8; 64];
        let mut data = original.clone();
        deobfuscate(&decryptor, &[0u8; KEY_MATERIAL_LEN], &mut data).unwrap();

        let mut expected = original;
        apply_xor_table(&table, &mut expected);
        assert_eq!(data, expected);
    }

    #[test]
    fn rsa_decryptor_uses_public_exponent() {
        // n = 3233 (61 * 53), e = 17: 65^17 mod 3233 = 2790
        let decryptor = RsaDigestDecryptor::new(&3233u32.to_le_bytes(), &[17]).unwrap();
        let mut ciphertext = [0u8; KEY_MATERIAL_LEN];
        ciphertext[0] = 65;
        let table = decryptor.decrypt(&ciphertext).unwrap();
        assert_eq!(table, xor_table(&BigUint::from(2790u32)));
        assert_eq!(&table[..2], &2790u16.to_le_bytes());
    }

    #[test]
    fn rsa_decryptor_rejects_zero_modulus() {
        assert!(RsaDigestDecryptor::new(&[0; 4], &[1]).is_err());
    }

    #[test]
    fn decryptor_errors_propagate() {
        let decryptor = |_: &[u8; KEY_MATERIAL_LEN]| -> Result<XorTable> {
            Err(PackageError::Unsupported("no key"))
        };
        let mut data = [1u8; 4];
        assert!(deobfuscate(&decryptor, &[0; KEY_MATERIAL_LEN], &mut data).is_err());
        assert_eq!(data, [1u8; 4]);
    }
}
