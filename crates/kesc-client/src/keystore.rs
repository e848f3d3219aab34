//! Keystore seam between the client and wherever escrow entries live

use std::future::Future;
use std::num::NonZeroU64;
use std::sync::Arc;

use kesc_core::{AuthToken, EntryInfo, Envelope, EscrowResult, StorageId};
use kesc_store::{EscrowEntry, EscrowStore};

/// Remote custody of wrapped session keys, addressed by storage id.
///
/// Implementations surface protocol failures as the matching
/// [`kesc_core::EscrowError`] variant (`Conflict`, `NotFound`,
/// `Authentication`, `AuthEvicted`).
pub trait KeyStore {
    fn add(
        &self,
        id: StorageId,
        wrapped_key: Envelope,
        token: AuthToken,
        remove_after: Option<NonZeroU64>,
    ) -> impl Future<Output = EscrowResult<()>> + Send;

    fn fetch(
        &self,
        id: &StorageId,
        token: &AuthToken,
    ) -> impl Future<Output = EscrowResult<Envelope>> + Send;

    fn delete(
        &self,
        id: &StorageId,
        token: &AuthToken,
    ) -> impl Future<Output = EscrowResult<()>> + Send;

    fn inspect(&self, id: &StorageId) -> impl Future<Output = EscrowResult<EntryInfo>> + Send;
}

impl KeyStore for Arc<EscrowStore> {
    async fn add(
        &self,
        id: StorageId,
        wrapped_key: Envelope,
        token: AuthToken,
        remove_after: Option<NonZeroU64>,
    ) -> EscrowResult<()> {
        EscrowStore::add(self, id, EscrowEntry::new(wrapped_key, token, remove_after))
    }

    async fn fetch(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<Envelope> {
        EscrowStore::fetch(self, id, token)
    }

    async fn delete(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<()> {
        EscrowStore::delete(self, id, token)
    }

    async fn inspect(&self, id: &StorageId) -> EscrowResult<EntryInfo> {
        EscrowStore::inspect(self, id)
    }
}
