// src/state/accounts.rs

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::crypto::multisig_address;
use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{Address, Amount, AmountStr, CoinId};

pub const MAX_MULTISIG_OWNERS: usize = 32;
pub const MAX_MULTISIG_WEIGHT: u32 = 1023;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Multisig {
    pub threshold: u32,
    pub weights: Vec<u32>,
    pub addresses: Vec<Address>,
}

impl Multisig {
    /// Structural checks shared by create and edit.
    pub fn validate(&self) -> Result<(), TxError> {
        let n = self.addresses.len();
        if n > MAX_MULTISIG_OWNERS {
            return Err(TxError::TooLargeOwnersList(n));
        }
        if n != self.weights.len() {
            return Err(TxError::DifferentCountAddressesAndWeights { addresses: n, weights: self.weights.len() });
        }
        if n == 0 {
            return Err(TxError::IncorrectWeights("owners list is empty".into()));
        }
        if let Some(w) = self.weights.iter().find(|w| **w > MAX_MULTISIG_WEIGHT) {
            return Err(TxError::IncorrectWeights(format!("weight {w} exceeds {MAX_MULTISIG_WEIGHT}")));
        }
        let mut seen = BTreeSet::new();
        for a in &self.addresses {
            if !seen.insert(*a) {
                return Err(TxError::DuplicatedAddresses(*a));
            }
        }
        let total = self.total_weight();
        if total < u64::from(self.threshold) {
            return Err(TxError::IncorrectTotalWeights { total, threshold: self.threshold });
        }
        Ok(())
    }

    pub fn total_weight(&self) -> u64 {
        self.weights.iter().map(|w| u64::from(*w)).sum()
    }

    pub fn weight_of(&self, who: &Address) -> Option<u32> {
        self.addresses.iter().position(|a| a == who).map(|i| self.weights[i])
    }

    pub fn address(&self) -> Address {
        multisig_address(self.threshold, &self.weights, &self.addresses)
    }
}

#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub nonce: u64,
    #[serde_as(as = "BTreeMap<_, AmountStr>")]
    pub balances: BTreeMap<CoinId, Amount>,
    pub multisig: Option<Multisig>,
}

impl Account {
    pub fn balance(&self, coin: CoinId) -> Amount {
        self.balances.get(&coin).copied().unwrap_or(0)
    }

    /// Pruned on commit when this holds.
    pub fn is_empty(&self) -> bool {
        self.nonce == 0 && self.multisig.is_none() && self.balances.values().all(|v| *v == 0)
    }
}

#[derive(Clone)]
pub struct Accounts {
    store: StoreView,
    overlay: Overlay<Address, Account>,
}

journaled!(Accounts => overlay);

impl Accounts {
    pub fn new(store: StoreView) -> Self {
        Self { store, overlay: Overlay::new(vec![keys::ACCOUNT], keys::account, keys::account_address) }
    }

    /// Owned copy of the account; absent accounts read as empty.
    pub fn get(&self, addr: &Address) -> Result<Account, TxError> {
        Ok(self.overlay.get(&self.store, addr)?.unwrap_or_default())
    }

    pub fn exists(&self, addr: &Address) -> Result<bool, TxError> {
        Ok(self.overlay.get(&self.store, addr)?.is_some())
    }

    pub fn put(&mut self, addr: Address, account: Account) {
        self.overlay.set(addr, account);
    }

    pub fn balance(&self, addr: &Address, coin: CoinId) -> Result<Amount, TxError> {
        Ok(self.get(addr)?.balance(coin))
    }

    pub fn nonce(&self, addr: &Address) -> Result<u64, TxError> {
        Ok(self.get(addr)?.nonce)
    }

    pub fn set_nonce(&mut self, addr: &Address, nonce: u64) -> Result<(), TxError> {
        let mut acc = self.get(addr)?;
        acc.nonce = nonce;
        self.put(*addr, acc);
        Ok(())
    }

    pub fn add_balance(&mut self, addr: &Address, coin: CoinId, amount: Amount) -> Result<(), TxError> {
        if amount == 0 {
            return Ok(());
        }
        let mut acc = self.get(addr)?;
        let slot = acc.balances.entry(coin).or_insert(0);
        *slot = slot.checked_add(amount).ok_or_else(|| TxError::Internal("balance overflow".into()))?;
        self.put(*addr, acc);
        Ok(())
    }

    pub fn sub_balance(&mut self, addr: &Address, coin: CoinId, amount: Amount) -> Result<(), TxError> {
        if amount == 0 {
            return Ok(());
        }
        let mut acc = self.get(addr)?;
        let has = acc.balance(coin);
        if has < amount {
            return Err(TxError::InsufficientFunds { address: *addr, coin, needed: amount, has });
        }
        if has == amount {
            acc.balances.remove(&coin);
        } else {
            acc.balances.insert(coin, has - amount);
        }
        self.put(*addr, acc);
        Ok(())
    }

    /// Removes the whole balance of `coin` and returns it.
    pub fn take_balance(&mut self, addr: &Address, coin: CoinId) -> Result<Amount, TxError> {
        let mut acc = self.get(addr)?;
        let v = acc.balances.remove(&coin).unwrap_or(0);
        if v > 0 {
            self.put(*addr, acc);
        }
        Ok(v)
    }

    pub fn set_multisig(&mut self, addr: &Address, multisig: Multisig) -> Result<(), TxError> {
        let mut acc = self.get(addr)?;
        acc.multisig = Some(multisig);
        self.put(*addr, acc);
        Ok(())
    }

    pub fn all(&self) -> Result<BTreeMap<Address, Account>, TxError> {
        Ok(self.overlay.all(&self.store)?)
    }

    /// Holders of a coin, ascending by address.
    pub fn holders_of(&self, coin: CoinId) -> Result<Vec<(Address, Amount)>, TxError> {
        Ok(self
            .all()?
            .into_iter()
            .filter_map(|(a, acc)| {
                let v = acc.balance(coin);
                (v > 0).then_some((a, v))
            })
            .collect())
    }

    /// Drops dirty accounts that became empty, then flushes.
    pub fn commit(&mut self) -> Result<usize, StoreError> {
        let dirty: Vec<Address> = self.overlay.dirty_keys().copied().collect();
        for a in dirty {
            if matches!(self.overlay.get(&self.store, &a)?, Some(acc) if acc.is_empty()) {
                self.overlay.remove(a);
            }
        }
        self.overlay.flush(&self.store)
    }
}
