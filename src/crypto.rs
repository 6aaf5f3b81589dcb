//! AEAD payload encryption and content-addressing.
//!
//! Grounded on `SSS.go` for the envelope format (`nonce ‖ ciphertext‖tag`,
//! AES-256-GCM, random 96-bit nonce) and on `core/Crypto.go` for the content
//! hash (a CIDv1 "raw"-codec multihash over the ciphertext, never a fixed
//! debug label).

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use cid::multihash::Multihash;
use cid::Cid;
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{DfsError, DfsResult};

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const SHA2_256_CODE: u64 = 0x12;
const RAW_CODEC: u64 = 0x55;

/// The AEAD key and the ciphertext envelope produced by [`encrypt`].
pub struct Ciphertext {
    pub key: [u8; KEY_LEN],
    /// `nonce ‖ ciphertext‖tag`.
    pub envelope: Vec<u8>,
}

/// Encrypt `plaintext` with a freshly generated random key and nonce.
pub fn encrypt(plaintext: &[u8]) -> DfsResult<Ciphertext> {
    let mut key_bytes = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key_bytes);
    let key = Key::<Aes256Gcm>::from_slice(&key_bytes);
    let cipher = Aes256Gcm::new(key);

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| DfsError::Encryption(e.to_string()))?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce_bytes);
    envelope.extend_from_slice(&ciphertext);

    Ok(Ciphertext {
        key: key_bytes,
        envelope,
    })
}

/// Decrypt an envelope (`nonce ‖ ciphertext‖tag`) with the reconstructed key.
pub fn decrypt(key: &[u8], envelope: &[u8]) -> DfsResult<Vec<u8>> {
    if key.len() != KEY_LEN {
        return Err(DfsError::Decryption(format!(
            "expected a {KEY_LEN}-byte key, got {}",
            key.len()
        )));
    }
    if envelope.len() < NONCE_LEN {
        return Err(DfsError::Decryption("envelope shorter than nonce".into()));
    }

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|e| DfsError::Decryption(e.to_string()))
}

/// Compute the content hash of a ciphertext envelope: a CIDv1 value using the
/// "raw" multicodec over a SHA-256 multihash digest.
pub fn content_hash(ciphertext: &[u8]) -> String {
    let digest = Sha256::digest(ciphertext);
    let mh = Multihash::<64>::wrap(SHA2_256_CODE, &digest)
        .expect("sha2-256 digest always fits a 64-byte multihash");
    Cid::new_v1(RAW_CODEC, mh).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let plaintext = b"the overlay disperses this payload";
        let ct = encrypt(plaintext).unwrap();
        let recovered = decrypt(&ct.key, &ct.envelope).unwrap();
        assert_eq!(recovered, plaintext);
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let ct = encrypt(b"secret").unwrap();
        let mut wrong_key = ct.key;
        wrong_key[0] ^= 0xFF;
        assert!(decrypt(&wrong_key, &ct.envelope).is_err());
    }

    #[test]
    fn hash_is_over_ciphertext_not_a_fixed_label() {
        let a = encrypt(b"payload one").unwrap();
        let b = encrypt(b"payload two").unwrap();
        assert_ne!(content_hash(&a.envelope), content_hash(&b.envelope));
    }
}
