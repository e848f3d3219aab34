//! kesc-client: split-key escrow client
//!
//! [`EscrowClient`] encrypts a payload under a fresh session key and leaves
//! custody of that key with a keystore, wrapped under a key only the holder
//! of the secret and the ciphertext can re-derive. The keystore is reached
//! through the [`KeyStore`] seam: [`HttpKeyStore`] talks to a remote `kescd`,
//! and `Arc<EscrowStore>` serves an in-process store.

pub mod client;
pub mod http;
pub mod keystore;

pub use client::EscrowClient;
pub use http::HttpKeyStore;
pub use keystore::KeyStore;
