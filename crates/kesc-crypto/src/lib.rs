//! kesc-crypto: client-side crypto for split-key escrow
//!
//! Per message:
//! ```text
//! SessionKey (256-bit random)
//!   └── msg envelope = AES-256-EAX(session_key, plaintext)        kept by the user
//! ContentHash = SHA-256(msg.ciphertext), hex
//!   ├── StorageId (SU) = SHA-256(hash_hex)                          public lookup key
//!   ├── AuthToken (ST) = SHA-256(hash_hex || secret)                sent per request
//!   └── WrapKey  (KH)  = (secret || hash_hex)[..32]
//!         └── wrapped key = AES-256-EAX(wrap_key, session_key)      held by the keystore
//! ```

pub mod derive;
pub mod envelope;
pub mod keys;

pub use derive::{auth_token, content_hash, storage_id, wrap_key, ContentHash, Derived};
pub use envelope::{open, seal};
pub use keys::{generate_session_key, Secret, SessionKey, WrapKey};

/// Size of a session key and of a wrap key in bytes (256-bit)
pub const KEY_SIZE: usize = 32;

/// Longest secret accepted for derivation
pub const MAX_SECRET_LEN: usize = 32;

pub use kesc_core::types::{NONCE_SIZE, TAG_SIZE};
