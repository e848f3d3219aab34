//! Escrow client orchestration
//!
//! Store:    session key → seal payload → derive (SU, ST, KH) from the
//!           payload ciphertext → wrap session key under KH → add(SU, WS, ST)
//! Retrieve: derive (SU, ST, KH) from the held ciphertext → fetch(SU, ST)
//!           → unwrap session key → open payload

use std::num::NonZeroU64;

use kesc_core::{EntryInfo, Envelope, EscrowError, EscrowResult};
use kesc_crypto::{generate_session_key, open, seal, Derived, Secret, SessionKey};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::keystore::KeyStore;

/// Client half of the escrow protocol, generic over where keys are held.
pub struct EscrowClient<S> {
    store: S,
}

impl<S: KeyStore> EscrowClient<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encrypt `plaintext` and escrow its session key.
    ///
    /// Returns the message envelope, which the caller keeps. Nothing is
    /// returned if the keystore refuses the entry (e.g. `Conflict`).
    pub async fn encrypt_and_store(
        &self,
        secret: &Secret,
        plaintext: &[u8],
        remove_after: Option<NonZeroU64>,
    ) -> EscrowResult<Envelope> {
        let session_key = generate_session_key();
        let message = seal(session_key.as_bytes(), plaintext)?;

        let derived = Derived::new(&message.ciphertext, secret);
        let wrapped = seal(derived.wrap_key.as_bytes(), session_key.as_bytes())?;

        self.store
            .add(derived.storage_id, wrapped, derived.auth_token, remove_after)
            .await?;

        info!(
            su = %derived.storage_id.short(),
            bytes = plaintext.len(),
            remove_after = ?remove_after,
            "payload encrypted, session key escrowed"
        );
        Ok(message)
    }

    /// Recover the plaintext of `message` using the escrowed session key.
    ///
    /// A successful fetch leaves the entry in place.
    pub async fn retrieve_and_decrypt(
        &self,
        secret: &Secret,
        message: &Envelope,
    ) -> EscrowResult<Vec<u8>> {
        let derived = Derived::new(&message.ciphertext, secret);
        let wrapped = self
            .store
            .fetch(&derived.storage_id, &derived.auth_token)
            .await?;

        let raw = Zeroizing::new(open(derived.wrap_key.as_bytes(), &wrapped)?);
        let session_key = SessionKey::from_slice(&raw).map_err(|_| {
            debug!(len = raw.len(), "unwrapped session key has wrong length");
            EscrowError::Authentication
        })?;

        let plaintext = open(session_key.as_bytes(), message)?;
        debug!(su = %derived.storage_id.short(), "payload decrypted");
        Ok(plaintext)
    }

    /// Delete the escrow entry for `message`. The payload becomes unrecoverable.
    pub async fn remove(&self, secret: &Secret, message: &Envelope) -> EscrowResult<()> {
        let derived = Derived::new(&message.ciphertext, secret);
        self.store
            .delete(&derived.storage_id, &derived.auth_token)
            .await?;
        info!(su = %derived.storage_id.short(), "escrow entry removed");
        Ok(())
    }

    /// Bookkeeping for `message`. An unknown entry reports `exists: false`.
    pub async fn info(&self, message: &Envelope) -> EscrowResult<EntryInfo> {
        let hash = kesc_crypto::content_hash(&message.ciphertext);
        let id = kesc_crypto::storage_id(&hash);
        match self.store.inspect(&id).await {
            Ok(info) => Ok(info),
            Err(EscrowError::NotFound) => Ok(EntryInfo::absent()),
            Err(e) => Err(e),
        }
    }
}
