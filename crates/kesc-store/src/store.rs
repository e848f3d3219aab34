//! Sharded escrow store.
//!
//! Each storage id lives in exactly one shard and every operation holds that
//! shard's lock for its whole check-and-mutate sequence, so add, fetch,
//! delete, and inspect are atomic per id. Distinct shards never block each
//! other. Locks are never held across an `.await`.
//!
//! The live-entry count is an atomic updated under the owning shard's lock,
//! so reading it never touches a shard.

use std::collections::hash_map::{Entry, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use kesc_core::{AuthToken, EntryInfo, Envelope, EscrowError, EscrowResult, StorageId};
use tracing::{debug, info, warn};

use crate::entry::EscrowEntry;

/// Default shard count
pub const DEFAULT_SHARDS: usize = 16;

type Shard = HashMap<StorageId, EscrowEntry>;

/// In-memory keyed map from storage id to escrow entry.
pub struct EscrowStore {
    shards: Vec<Mutex<Shard>>,
    live: AtomicUsize,
}

impl Default for EscrowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EscrowStore {
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_SHARDS)
    }

    /// Create a store with `shards` independently locked partitions (at least one).
    pub fn with_shards(shards: usize) -> Self {
        let shards = shards.max(1);
        EscrowStore {
            shards: (0..shards).map(|_| Mutex::new(HashMap::new())).collect(),
            live: AtomicUsize::new(0),
        }
    }

    fn shard(&self, id: &StorageId) -> MutexGuard<'_, Shard> {
        let bytes = id.as_bytes();
        let idx = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize
            % self.shards.len();
        // every mutation is a single map or counter update, so a poisoned shard is still consistent
        self.shards[idx]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a new entry. Create-only: an existing id is never overwritten.
    pub fn add(&self, id: StorageId, entry: EscrowEntry) -> EscrowResult<()> {
        let mut shard = self.shard(&id);
        match shard.entry(id) {
            Entry::Occupied(_) => {
                warn!(su = %id.short(), "add rejected: storage id conflict");
                Err(EscrowError::Conflict)
            }
            Entry::Vacant(slot) => {
                let remove_after = entry.remove_after();
                slot.insert(entry);
                self.live.fetch_add(1, Ordering::Relaxed);
                info!(su = %id.short(), remove_after = ?remove_after, "escrow entry added");
                Ok(())
            }
        }
    }

    /// Release the wrapped session key to a holder of the matching token.
    ///
    /// The entry is retained on success. A wrong token counts as one failure
    /// and may evict the entry.
    pub fn fetch(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<Envelope> {
        let mut shard = self.shard(id);
        let entry = shard.get_mut(id).ok_or(EscrowError::NotFound)?;
        if entry.token_matches(token) {
            debug!(su = %id.short(), "wrapped key released");
            return Ok(entry.wrapped_key().clone());
        }
        Err(reject(&mut shard, id, &self.live))
    }

    /// Remove the entry for a holder of the matching token.
    pub fn delete(&self, id: &StorageId, token: &AuthToken) -> EscrowResult<()> {
        let mut shard = self.shard(id);
        let entry = shard.get_mut(id).ok_or(EscrowError::NotFound)?;
        if entry.token_matches(token) {
            shard.remove(id);
            self.live.fetch_sub(1, Ordering::Relaxed);
            info!(su = %id.short(), "escrow entry removed");
            return Ok(());
        }
        Err(reject(&mut shard, id, &self.live))
    }

    /// Bookkeeping metadata for `id`. Requires no proof and never mutates.
    pub fn inspect(&self, id: &StorageId) -> EscrowResult<EntryInfo> {
        self.shard(id)
            .get(id)
            .map(EscrowEntry::info)
            .ok_or(EscrowError::NotFound)
    }

    /// Number of live entries across all shards. Takes no lock.
    pub fn len(&self) -> usize {
        self.live.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Count a failed token check on a present entry, evicting it at its threshold.
fn reject(shard: &mut Shard, id: &StorageId, live: &AtomicUsize) -> EscrowError {
    let Some(entry) = shard.get_mut(id) else {
        return EscrowError::NotFound;
    };
    if entry.record_failure() {
        let fails = entry.fail_count();
        shard.remove(id);
        live.fetch_sub(1, Ordering::Relaxed);
        warn!(su = %id.short(), fails, "auth failure limit reached, entry evicted");
        EscrowError::AuthEvicted
    } else {
        debug!(su = %id.short(), fails = entry.fail_count(), "auth failure recorded");
        EscrowError::Authentication
    }
}
