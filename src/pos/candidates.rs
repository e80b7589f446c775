// src/pos/candidates.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{Address, Amount, AmountStr, CoinId, PubKey};

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CandidateStatus {
    Offline,
    Online,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub owner: Address,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
    /// Base-coin value as of the last recalculation.
    #[serde_as(as = "AmountStr")]
    pub bip_value: Amount,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub pubkey: PubKey,
    pub owner: Address,
    pub reward_address: Address,
    pub control_address: Address,
    pub commission: u32,
    pub stakes: Vec<Stake>,
    #[serde_as(as = "AmountStr")]
    pub total_bip_stake: Amount,
    pub status: CandidateStatus,
    pub created_at: u64,
    pub last_commission_edit: u64,
    pub jailed_until: u64,
}

impl Candidate {
    pub fn new(
        pubkey: PubKey,
        owner: Address,
        reward_address: Address,
        control_address: Address,
        commission: u32,
        height: u64,
    ) -> Self {
        Self {
            pubkey,
            owner,
            reward_address,
            control_address,
            commission,
            stakes: Vec::new(),
            total_bip_stake: 0,
            status: CandidateStatus::Offline,
            created_at: height,
            last_commission_edit: height,
            jailed_until: 0,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == CandidateStatus::Online
    }

    pub fn is_jailed(&self, height: u64) -> bool {
        height < self.jailed_until
    }

    /// Owner or control address may toggle status.
    pub fn can_control(&self, who: &Address) -> bool {
        self.owner == *who || self.control_address == *who
    }

    pub fn stake_index(&self, owner: &Address, coin: CoinId) -> Option<usize> {
        self.stakes.iter().position(|s| s.owner == *owner && s.coin == coin)
    }

    pub fn stake_value(&self, owner: &Address, coin: CoinId) -> Amount {
        self.stake_index(owner, coin).map(|i| self.stakes[i].value).unwrap_or(0)
    }

    /// Adds to the (owner, coin) stake, creating it when missing.
    pub fn add_stake(&mut self, owner: Address, coin: CoinId, value: Amount, bip_value: Amount) {
        match self.stake_index(&owner, coin) {
            Some(i) => {
                let s = &mut self.stakes[i];
                s.value = s.value.saturating_add(value);
                s.bip_value = s.bip_value.saturating_add(bip_value);
            }
            None => self.stakes.push(Stake { owner, coin, value, bip_value }),
        }
        self.refresh_total();
    }

    /// Removes `value` from the stake, dropping it when it reaches zero.
    pub fn sub_stake(&mut self, owner: &Address, coin: CoinId, value: Amount) -> Result<(), TxError> {
        let i = self.stake_index(owner, coin).ok_or(TxError::StakeNotFound)?;
        let s = &mut self.stakes[i];
        if s.value < value {
            return Err(TxError::InsufficientStake { has: s.value, requested: value });
        }
        // bip value shrinks proportionally until the next recalculation
        let bip_removed = if s.value == 0 { 0 } else { mul_div(s.bip_value, value, s.value) };
        s.value -= value;
        s.bip_value -= bip_removed.min(s.bip_value);
        if s.value == 0 {
            self.stakes.remove(i);
        }
        self.refresh_total();
        Ok(())
    }

    /// Bip value of the weakest stake, or `None` while there is room for more delegators.
    pub fn min_stake_when_full(&self, max_delegators: usize) -> Option<Amount> {
        if self.stakes.len() < max_delegators {
            return None;
        }
        self.stakes.iter().map(|s| s.bip_value).min()
    }

    pub fn refresh_total(&mut self) {
        self.total_bip_stake = self.stakes.iter().fold(0u128, |acc, s| acc.saturating_add(s.bip_value));
    }

    /// Stakes ordered from the smallest bip value; ties broken by owner then coin.
    pub fn stakes_by_weight(&self) -> Vec<Stake> {
        let mut v = self.stakes.clone();
        v.sort_by(|a, b| {
            a.bip_value
                .cmp(&b.bip_value)
                .then_with(|| a.owner.cmp(&b.owner))
                .then_with(|| a.coin.cmp(&b.coin))
        });
        v
    }
}

/// `a * b / c` without intermediate overflow.
pub fn mul_div(a: Amount, b: Amount, c: Amount) -> Amount {
    use primitive_types::U256;
    if c == 0 {
        return 0;
    }
    let r = U256::from(a) * U256::from(b) / U256::from(c);
    if r.bits() > 128 {
        Amount::MAX
    } else {
        r.low_u128()
    }
}

#[derive(Clone)]
pub struct Candidates {
    store: StoreView,
    overlay: Overlay<PubKey, Candidate>,
}

journaled!(Candidates => overlay);

impl Candidates {
    pub fn new(store: StoreView) -> Self {
        Self { store, overlay: Overlay::new(vec![keys::CANDIDATE], keys::candidate, keys::candidate_pubkey) }
    }

    pub fn get(&self, pubkey: &PubKey) -> Result<Option<Candidate>, TxError> {
        Ok(self.overlay.get(&self.store, pubkey)?)
    }

    pub fn get_or_err(&self, pubkey: &PubKey) -> Result<Candidate, TxError> {
        self.get(pubkey)?.ok_or(TxError::CandidateNotFound)
    }

    pub fn exists(&self, pubkey: &PubKey) -> Result<bool, TxError> {
        Ok(self.get(pubkey)?.is_some())
    }

    pub fn put(&mut self, candidate: Candidate) {
        self.overlay.set(candidate.pubkey, candidate);
    }

    pub fn remove(&mut self, pubkey: PubKey) {
        self.overlay.remove(pubkey);
    }

    pub fn all(&self) -> Result<BTreeMap<PubKey, Candidate>, TxError> {
        Ok(self.overlay.all(&self.store)?)
    }

    pub fn count(&self) -> Result<usize, TxError> {
        Ok(self.all()?.len())
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        self.overlay.flush(&self.store)
    }
}
