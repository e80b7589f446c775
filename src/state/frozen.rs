// src/state/frozen.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{Address, Amount, AmountStr, CoinId, PubKey};

/// Value waiting in the unbonding queue.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenFund {
    pub owner: Address,
    pub candidate: Option<PubKey>,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
    /// Target candidate of a stake move; the value is re-delegated on release.
    pub move_to: Option<PubKey>,
}

#[derive(Clone)]
pub struct FrozenFunds {
    store: StoreView,
    overlay: Overlay<u64, Vec<FrozenFund>>,
}

journaled!(FrozenFunds => overlay);

impl FrozenFunds {
    pub fn new(store: StoreView) -> Self {
        Self { store, overlay: Overlay::new(vec![keys::FROZEN], |h: &u64| keys::frozen(*h), keys::frozen_height) }
    }

    pub fn get(&self, height: u64) -> Result<Vec<FrozenFund>, TxError> {
        Ok(self.overlay.get(&self.store, &height)?.unwrap_or_default())
    }

    pub fn add(&mut self, height: u64, fund: FrozenFund) -> Result<(), TxError> {
        let mut list = self.get(height)?;
        list.push(fund);
        self.overlay.set(height, list);
        Ok(())
    }

    /// Removes and returns everything unlocking at `height`.
    pub fn take(&mut self, height: u64) -> Result<Vec<FrozenFund>, TxError> {
        let list = self.get(height)?;
        if !list.is_empty() {
            self.overlay.remove(height);
        }
        Ok(list)
    }

    pub fn put(&mut self, height: u64, list: Vec<FrozenFund>) {
        if list.is_empty() {
            self.overlay.remove(height);
        } else {
            self.overlay.set(height, list);
        }
    }

    pub fn all(&self) -> Result<BTreeMap<u64, Vec<FrozenFund>>, TxError> {
        Ok(self.overlay.all(&self.store)?)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        self.overlay.flush(&self.store)
    }
}
