//! Escrow key derivation: content hash → storage id, auth token, wrap key
//!
//! Every derivation consumes the content hash in its 64-byte lowercase hex
//! form, which is what existing clients hash and concatenate. Because the hex
//! hash follows the secret, `secret || hash_hex` is always at least 64 bytes
//! and the wrap key is always a full 32 bytes.
//!
//! The wrap key is a concatenate-and-truncate construction, not a KDF. It is
//! kept bit-for-bit so artifacts stay interoperable with deployed keystores.

use kesc_core::{AuthToken, StorageId};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::keys::{Secret, WrapKey};
use crate::KEY_SIZE;

/// SHA-256 of a message ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

/// Hash a ciphertext.
pub fn content_hash(ciphertext: &[u8]) -> ContentHash {
    ContentHash(Sha256::digest(ciphertext).into())
}

/// SU = SHA-256(hash_hex)
pub fn storage_id(hash: &ContentHash) -> StorageId {
    StorageId::from_bytes(Sha256::digest(hash.to_hex().as_bytes()).into())
}

/// ST = SHA-256(hash_hex || secret)
pub fn auth_token(hash: &ContentHash, secret: &Secret) -> AuthToken {
    let mut hasher = Sha256::new();
    hasher.update(hash.to_hex().as_bytes());
    hasher.update(secret.as_bytes());
    AuthToken::from_bytes(hasher.finalize().into())
}

/// KH = (secret || hash_hex)[..32]
pub fn wrap_key(hash: &ContentHash, secret: &Secret) -> WrapKey {
    let mut material = Zeroizing::new(Vec::with_capacity(secret.as_bytes().len() + 64));
    material.extend_from_slice(secret.as_bytes());
    material.extend_from_slice(hash.to_hex().as_bytes());

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&material[..KEY_SIZE]);
    WrapKey::from_bytes(key)
}

/// Everything a client derives from one ciphertext and secret.
#[derive(Debug)]
pub struct Derived {
    pub storage_id: StorageId,
    pub auth_token: AuthToken,
    pub wrap_key: WrapKey,
}

impl Derived {
    pub fn new(ciphertext: &[u8], secret: &Secret) -> Self {
        let hash = content_hash(ciphertext);
        Self {
            storage_id: storage_id(&hash),
            auth_token: auth_token(&hash, secret),
            wrap_key: wrap_key(&hash, secret),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Reference values computed with Python hashlib over b"hello escrow".
    const CT: &[u8] = b"hello escrow";
    const HASH_HEX: &str = "d2659077bef2743ef8ce3d153ddd70ed56d5d5ff502afee693544c77d6055451";
    const SU_HEX: &str = "25bfbd9d2159037c17fe6cc837e120f3339740431fa3b4b4dea591b063640803";
    const ST_HEX_K: &str = "cc2196bf7d5595a2a4e77cf565032c04759cc9c74542bf36f2ab84e1c72d751b";

    #[test]
    fn test_reference_vectors() {
        let secret = Secret::new(b"k").unwrap();
        let hash = content_hash(CT);

        assert_eq!(hash.to_hex(), HASH_HEX);
        assert_eq!(storage_id(&hash).to_hex(), SU_HEX);
        assert_eq!(auth_token(&hash, &secret).to_hex(), ST_HEX_K);
        assert_eq!(
            wrap_key(&hash, &secret).as_bytes(),
            b"kd2659077bef2743ef8ce3d153ddd70e"
        );
    }

    #[test]
    fn test_full_length_secret_fills_wrap_key() {
        let secret = Secret::new(b"0123456789abcdef0123456789abcdef").unwrap();
        let hash = content_hash(CT);
        assert_eq!(
            wrap_key(&hash, &secret).as_bytes(),
            b"0123456789abcdef0123456789abcdef"
        );
    }

    #[test]
    fn test_storage_id_independent_of_secret() {
        let a = Derived::new(CT, &Secret::new(b"alpha").unwrap());
        let b = Derived::new(CT, &Secret::new(b"beta").unwrap());
        assert_eq!(a.storage_id, b.storage_id);
        assert!(!a.auth_token.matches(&b.auth_token));
        assert_ne!(a.wrap_key.as_bytes(), b.wrap_key.as_bytes());
    }

    #[test]
    fn test_token_never_equals_storage_id() {
        let d = Derived::new(CT, &Secret::new(b"k").unwrap());
        assert_ne!(d.auth_token.as_bytes(), d.storage_id.as_bytes());
    }

    #[test]
    fn test_bit_flip_changes_everything() {
        let secret = Secret::new(b"k").unwrap();
        let mut flipped = CT.to_vec();
        flipped[0] ^= 0x01;

        let a = Derived::new(CT, &secret);
        let b = Derived::new(&flipped, &secret);
        assert_ne!(a.storage_id, b.storage_id);
        assert!(!a.auth_token.matches(&b.auth_token));
    }
}
