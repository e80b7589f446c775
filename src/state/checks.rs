// src/state/checks.rs

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::Hash;

/// Set of redeemed check hashes.
#[derive(Clone)]
pub struct UsedChecks {
    store: StoreView,
    overlay: Overlay<Hash, bool>,
}

journaled!(UsedChecks => overlay);

impl UsedChecks {
    pub fn new(store: StoreView) -> Self {
        Self { store, overlay: Overlay::new(vec![keys::USED_CHECK], keys::used_check, keys::used_check_hash) }
    }

    pub fn is_used(&self, hash: &Hash) -> Result<bool, TxError> {
        Ok(self.overlay.get(&self.store, hash)?.unwrap_or(false))
    }

    pub fn mark_used(&mut self, hash: Hash) {
        self.overlay.set(hash, true);
    }

    pub fn all(&self) -> Result<Vec<Hash>, TxError> {
        Ok(self.overlay.all(&self.store)?.into_keys().collect())
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        self.overlay.flush(&self.store)
    }
}
