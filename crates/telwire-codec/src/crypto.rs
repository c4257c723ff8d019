use std::fmt;

use aes::Aes128;
use cipher::block_padding::{NoPadding, Pkcs7};
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::codec::{BLOCK_SIZE, IV_LEN};
use crate::error::{FrameError, KeyError, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

/// AES-128 key length in bytes.
pub const ENCRYPTION_KEY_LEN: usize = 16;

/// The two pre-shared secrets, validated once at construction.
///
/// Immutable and cheap to clone; sessions share it read-only.
#[derive(Clone)]
pub struct KeyMaterial {
    encryption: [u8; ENCRYPTION_KEY_LEN],
    integrity: Vec<u8>,
}

impl KeyMaterial {
    /// Build key material from raw bytes.
    pub fn new(encryption: &[u8], integrity: &[u8]) -> std::result::Result<Self, KeyError> {
        let encryption: [u8; ENCRYPTION_KEY_LEN] = encryption
            .try_into()
            .map_err(|_| KeyError::EncryptionKeyLength(encryption.len()))?;
        if integrity.is_empty() {
            return Err(KeyError::EmptyIntegrityKey);
        }
        Ok(Self {
            encryption,
            integrity: integrity.to_vec(),
        })
    }

    /// Build key material from hex-encoded strings.
    pub fn from_hex(encryption: &str, integrity: &str) -> std::result::Result<Self, KeyError> {
        Self::new(&hex::decode(encryption.trim())?, &hex::decode(integrity.trim())?)
    }

    pub fn encryption_key(&self) -> &[u8; ENCRYPTION_KEY_LEN] {
        &self.encryption
    }

    pub fn integrity_key(&self) -> &[u8] {
        &self.integrity
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key bytes.
        f.debug_struct("KeyMaterial").finish_non_exhaustive()
    }
}

/// HMAC-SHA256 over the ciphertext only; IV and length prefix are not covered.
///
/// Comparison is constant time via `Mac::verify_slice`. Any length mismatch
/// verifies false.
pub fn verify_tag(ciphertext: &[u8], tag: &[u8], integrity_key: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(integrity_key) else {
        return false;
    };
    mac.update(ciphertext);
    mac.verify_slice(tag).is_ok()
}

/// Compute the integrity tag for a ciphertext.
pub fn compute_tag(ciphertext: &[u8], integrity_key: &[u8]) -> [u8; 32] {
    // HMAC accepts keys of any length; this cannot fail.
    let mut mac =
        HmacSha256::new_from_slice(integrity_key).expect("HMAC key of any length is valid");
    mac.update(ciphertext);
    mac.finalize().into_bytes().into()
}

/// AES-128-CBC decryption, unpadded.
///
/// The wire format carries no padding information; the consumer truncates the
/// plaintext to the fixed record length instead of stripping padding. Output
/// length equals input length.
pub fn decrypt(
    ciphertext: &[u8],
    iv: &[u8; IV_LEN],
    encryption_key: &[u8; ENCRYPTION_KEY_LEN],
) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(FrameError::MalformedFrame {
            len: ciphertext.len(),
        });
    }
    Aes128CbcDec::new(encryption_key.into(), iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| FrameError::MalformedFrame {
            len: ciphertext.len(),
        })
}

/// AES-128-CBC encryption with PKCS#7 padding, as the sensor-side encoder
/// produces it (a 22-byte record becomes 32 ciphertext bytes).
pub fn encrypt(
    plaintext: &[u8],
    iv: &[u8; IV_LEN],
    encryption_key: &[u8; ENCRYPTION_KEY_LEN],
) -> Vec<u8> {
    Aes128CbcEnc::new(encryption_key.into(), iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}
