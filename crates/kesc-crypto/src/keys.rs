//! Key material: the user secret, per-message session keys, and wrap keys

use kesc_core::{EscrowError, EscrowResult};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::{KEY_SIZE, MAX_SECRET_LEN};

/// The user's escrow secret (1..=32 bytes). Zeroized on drop.
pub struct Secret {
    bytes: Zeroizing<Vec<u8>>,
}

impl Secret {
    /// Rejects empty secrets and secrets longer than 32 bytes.
    ///
    /// An empty secret would make the auth token equal to the public storage id.
    pub fn new(bytes: &[u8]) -> EscrowResult<Self> {
        if bytes.is_empty() || bytes.len() > MAX_SECRET_LEN {
            return Err(EscrowError::KeyLength(bytes.len()));
        }
        Ok(Self {
            bytes: Zeroizing::new(bytes.to_vec()),
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A per-message 256-bit session key. Zeroized on drop.
pub struct SessionKey {
    bytes: [u8; KEY_SIZE],
}

impl SessionKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Accepts exactly [`KEY_SIZE`] bytes, as produced by unwrapping.
    pub fn from_slice(bytes: &[u8]) -> EscrowResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|_| EscrowError::KeyLength(bytes.len()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key that wraps the session key inside the escrowed envelope. Zeroized on drop.
pub struct WrapKey {
    bytes: [u8; KEY_SIZE],
}

impl WrapKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for WrapKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for WrapKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WrapKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generate a random 256-bit session key from the OS RNG.
pub fn generate_session_key() -> SessionKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    SessionKey::from_bytes(bytes)
}
