// src/pos/validators.rs

use std::collections::BTreeMap;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::crypto::validator_address;
use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, DirtyValue};
use crate::store::{keys, StoreView};
use crate::types::{Address, Amount, AmountStr, PubKey};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub pubkey: PubKey,
    pub reward_address: Address,
    #[serde_as(as = "AmountStr")]
    pub total_bip_stake: Amount,
    #[serde_as(as = "AmountStr")]
    pub accum_reward: Amount,
    /// Bit `h % window` is set when the validator missed block `h`.
    pub absence: BitVec<u8, Lsb0>,
    pub pending_removal: bool,
    /// Candidate key the pending reward is paid to after a key rotation.
    #[serde(default)]
    pub rotated_to: Option<PubKey>,
}

impl Validator {
    pub fn new(pubkey: PubKey, reward_address: Address, total_bip_stake: Amount, window: usize) -> Self {
        Self {
            pubkey,
            reward_address,
            total_bip_stake,
            accum_reward: 0,
            absence: bitvec![u8, Lsb0; 0; window],
            pending_removal: false,
            rotated_to: None,
        }
    }

    pub fn address(&self) -> Address {
        validator_address(&self.pubkey)
    }

    /// Records whether block `height` was signed and returns the number of misses in the window.
    pub fn record(&mut self, height: u64, signed: bool) -> usize {
        let window = self.absence.len();
        if window == 0 {
            return 0;
        }
        let slot = (height % window as u64) as usize;
        self.absence.set(slot, !signed);
        self.absence.count_ones()
    }

    pub fn signed_at(&self, height: u64) -> bool {
        let window = self.absence.len() as u64;
        if window == 0 {
            return true;
        }
        self.absence.get((height % window) as usize).map_or(true, |missed| !*missed)
    }

    pub fn missed(&self) -> usize {
        self.absence.count_ones()
    }

    pub fn reset_absence(&mut self) {
        self.absence.fill(false);
    }
}

/// The active set together with the consensus-address index built when it was chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
    pub index: BTreeMap<Address, PubKey>,
}

impl ValidatorSet {
    pub fn new(validators: Vec<Validator>) -> Self {
        let index = validators.iter().map(|v| (v.address(), v.pubkey)).collect();
        Self { validators, index }
    }

    pub fn total_power(&self) -> Amount {
        self.validators.iter().fold(0u128, |acc, v| acc.saturating_add(v.total_bip_stake))
    }

    pub fn position(&self, pubkey: &PubKey) -> Option<usize> {
        self.validators.iter().position(|v| v.pubkey == *pubkey)
    }

    pub fn get(&self, pubkey: &PubKey) -> Option<&Validator> {
        self.position(pubkey).map(|i| &self.validators[i])
    }

    pub fn get_mut(&mut self, pubkey: &PubKey) -> Option<&mut Validator> {
        let i = self.position(pubkey)?;
        Some(&mut self.validators[i])
    }

    pub fn by_address(&self, address: &Address) -> Option<PubKey> {
        self.index.get(address).copied()
    }

    pub fn any_pending_removal(&self) -> bool {
        self.validators.iter().any(|v| v.pending_removal)
    }
}

#[derive(Clone)]
pub struct Validators {
    store: StoreView,
    dirty: DirtyValue<ValidatorSet>,
}

journaled!(Validators => dirty);

impl Validators {
    pub fn new(store: StoreView) -> Self {
        Self { store, dirty: DirtyValue::default() }
    }

    pub fn get(&self) -> Result<ValidatorSet, TxError> {
        match self.dirty.get() {
            Some(s) => Ok(s.clone()),
            None => Ok(self.store.get_decoded(&keys::validators())?.unwrap_or_default()),
        }
    }

    pub fn put(&mut self, set: ValidatorSet) {
        self.dirty.set(set);
    }

    /// Marks the validator for removal at the next recomputation; no-op for non-validators.
    pub fn mark_for_removal(&mut self, pubkey: &PubKey) -> Result<bool, TxError> {
        let mut set = self.get()?;
        match set.get_mut(pubkey) {
            Some(v) => {
                v.pending_removal = true;
                self.put(set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Retires `old` at the next recomputation and routes its accumulated
    /// reward to the candidate now registered under `new`.
    pub fn rotate(&mut self, old: &PubKey, new: PubKey) -> Result<bool, TxError> {
        let mut set = self.get()?;
        match set.get_mut(old) {
            Some(v) => {
                v.pending_removal = true;
                v.rotated_to = Some(new);
                self.put(set);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        match self.dirty.take() {
            Some(set) => {
                self.store.put_encoded(keys::validators(), &set)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
