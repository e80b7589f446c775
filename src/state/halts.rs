// src/state/halts.rs

use std::collections::BTreeMap;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::PubKey;

/// Candidates voting to halt the chain at a given height.
#[derive(Clone)]
pub struct HaltVotes {
    store: StoreView,
    overlay: Overlay<u64, Vec<PubKey>>,
}

journaled!(HaltVotes => overlay);

impl HaltVotes {
    pub fn new(store: StoreView) -> Self {
        Self { store, overlay: Overlay::new(vec![keys::HALT], |h: &u64| keys::halt(*h), keys::halt_height) }
    }

    pub fn get(&self, height: u64) -> Result<Vec<PubKey>, TxError> {
        Ok(self.overlay.get(&self.store, &height)?.unwrap_or_default())
    }

    pub fn add(&mut self, height: u64, pubkey: PubKey) -> Result<(), TxError> {
        let mut votes = self.get(height)?;
        if votes.contains(&pubkey) {
            return Err(TxError::HaltAlreadyExists(height));
        }
        votes.push(pubkey);
        self.overlay.set(height, votes);
        Ok(())
    }

    pub fn take(&mut self, height: u64) -> Result<Vec<PubKey>, TxError> {
        let votes = self.get(height)?;
        if !votes.is_empty() {
            self.overlay.remove(height);
        }
        Ok(votes)
    }

    pub fn put(&mut self, height: u64, votes: Vec<PubKey>) {
        self.overlay.set(height, votes);
    }

    pub fn all(&self) -> Result<BTreeMap<u64, Vec<PubKey>>, TxError> {
        Ok(self.overlay.all(&self.store)?)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        self.overlay.flush(&self.store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MerkleStore;

    #[test]
    fn one_vote_per_candidate_and_height() {
        let mut h = HaltVotes::new(StoreView::live(MerkleStore::new(0)));
        h.add(100, PubKey([1; 32])).unwrap();
        assert_eq!(h.add(100, PubKey([1; 32])).unwrap_err().code(), 117);
        h.add(100, PubKey([2; 32])).unwrap();
        assert_eq!(h.take(100).unwrap().len(), 2);
        assert!(h.get(100).unwrap().is_empty());
    }
}
