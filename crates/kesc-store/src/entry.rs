use std::num::NonZeroU64;

use kesc_core::{AuthToken, EntryInfo, Envelope};

/// One escrowed session key and its access bookkeeping.
#[derive(Debug, Clone)]
pub struct EscrowEntry {
    wrapped_key: Envelope,
    token: AuthToken,
    remove_after: Option<NonZeroU64>,
    fail_count: u64,
}

impl EscrowEntry {
    pub fn new(wrapped_key: Envelope, token: AuthToken, remove_after: Option<NonZeroU64>) -> Self {
        Self {
            wrapped_key,
            token,
            remove_after,
            fail_count: 0,
        }
    }

    pub fn wrapped_key(&self) -> &Envelope {
        &self.wrapped_key
    }

    pub fn fail_count(&self) -> u64 {
        self.fail_count
    }

    pub fn remove_after(&self) -> Option<NonZeroU64> {
        self.remove_after
    }

    pub(crate) fn token_matches(&self, token: &AuthToken) -> bool {
        self.token.matches(token)
    }

    /// Count a rejected token. Returns true once the entry has crossed its
    /// remove-after threshold and must be evicted.
    pub(crate) fn record_failure(&mut self) -> bool {
        self.fail_count = self.fail_count.saturating_add(1);
        self.remove_after
            .is_some_and(|limit| self.fail_count >= limit.get())
    }

    pub fn info(&self) -> EntryInfo {
        EntryInfo {
            exists: true,
            fail_count: self.fail_count,
            remove_after: self.remove_after,
        }
    }
}
