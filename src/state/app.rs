// src/state/app.rs

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, DirtyValue};
use crate::store::{keys, StoreView};
use crate::types::{Amount, AmountStr, CoinId};

/// Scalar chain-wide counters stored under a single key.
#[serde_as]
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCounters {
    pub max_gas: u64,
    /// Base coin removed from circulation: slashes, burned remainders and swept reserves.
    #[serde_as(as = "AmountStr")]
    pub total_slashed: Amount,
    /// Base coin ever created: genesis supply plus block rewards.
    #[serde_as(as = "AmountStr")]
    pub emission: Amount,
    pub last_coin_id: u32,
    pub last_pool_id: u32,
}

#[derive(Clone)]
pub struct App {
    store: StoreView,
    dirty: DirtyValue<AppCounters>,
}

journaled!(App => dirty);

impl App {
    pub fn new(store: StoreView) -> Self {
        Self { store, dirty: DirtyValue::default() }
    }

    pub fn get(&self) -> Result<AppCounters, TxError> {
        match self.dirty.get() {
            Some(c) => Ok(c.clone()),
            None => Ok(self.store.get_decoded(&keys::app())?.unwrap_or_default()),
        }
    }

    pub fn put(&mut self, counters: AppCounters) {
        self.dirty.set(counters);
    }

    fn update(&mut self, f: impl FnOnce(&mut AppCounters)) -> Result<AppCounters, TxError> {
        let mut c = self.get()?;
        f(&mut c);
        self.put(c.clone());
        Ok(c)
    }

    pub fn max_gas(&self) -> Result<u64, TxError> {
        Ok(self.get()?.max_gas)
    }

    pub fn set_max_gas(&mut self, gas: u64) -> Result<(), TxError> {
        self.update(|c| c.max_gas = gas).map(|_| ())
    }

    pub fn add_total_slashed(&mut self, amount: Amount) -> Result<(), TxError> {
        self.update(|c| c.total_slashed = c.total_slashed.saturating_add(amount)).map(|_| ())
    }

    pub fn add_emission(&mut self, amount: Amount) -> Result<(), TxError> {
        self.update(|c| c.emission = c.emission.saturating_add(amount)).map(|_| ())
    }

    pub fn next_coin_id(&mut self) -> Result<CoinId, TxError> {
        self.update(|c| c.last_coin_id += 1).map(|c| CoinId(c.last_coin_id))
    }

    pub fn next_pool_id(&mut self) -> Result<u32, TxError> {
        self.update(|c| c.last_pool_id += 1).map(|c| c.last_pool_id)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        match self.dirty.take() {
            Some(c) => {
                self.store.put_encoded(keys::app(), &c)?;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
