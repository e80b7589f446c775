// src/state/export.rs

//! Full-state snapshot used for genesis and for offline inspection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::StateError;
use crate::pos::candidates::Candidate;
use crate::pos::validators::ValidatorSet;
use crate::state::accounts::Account;
use crate::state::app::AppCounters;
use crate::state::checker::collect_holdings;
use crate::state::coins::{Coin, SymbolEntry};
use crate::state::commission::{PriceTable, PriceVote};
use crate::state::frozen::FrozenFund;
use crate::state::swap::Pool;
use crate::state::State;
use crate::types::{Address, PubKey};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrozenAt {
    pub height: u64,
    pub funds: Vec<FrozenFund>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaltsAt {
    pub height: u64,
    pub votes: Vec<PubKey>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceVotesAt {
    pub height: u64,
    pub votes: Vec<PriceVote>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub height: u64,
    pub accounts: BTreeMap<Address, Account>,
    pub coins: Vec<Coin>,
    pub symbols: BTreeMap<String, SymbolEntry>,
    pub pools: Vec<Pool>,
    pub candidates: Vec<Candidate>,
    pub validators: ValidatorSet,
    pub frozen: Vec<FrozenAt>,
    /// Hex-encoded hashes of redeemed checks.
    pub used_checks: Vec<String>,
    pub app: AppCounters,
    pub prices: PriceTable,
    pub price_votes: Vec<PriceVotesAt>,
    pub halts: Vec<HaltsAt>,
}

impl Snapshot {
    pub fn to_json(&self) -> Result<String, StateError> {
        serde_json::to_string_pretty(self).map_err(|e| StateError::Genesis(e.to_string()))
    }

    pub fn from_json(s: &str) -> Result<Self, StateError> {
        serde_json::from_str(s).map_err(|e| StateError::Genesis(e.to_string()))
    }
}

/// Reads every entity visible through `state`, overlays included.
pub fn export(state: &State, height: u64) -> Result<Snapshot, StateError> {
    Ok(Snapshot {
        height,
        accounts: state.accounts.all()?,
        coins: state.coins.all()?.into_values().collect(),
        symbols: state.coins.all_symbols()?,
        pools: state.swap.all()?.into_values().collect(),
        candidates: state.candidates.all()?.into_values().collect(),
        validators: state.validators.get()?,
        frozen: state.frozen.all()?.into_iter().map(|(height, funds)| FrozenAt { height, funds }).collect(),
        used_checks: state.checks.all()?.iter().map(hex::encode).collect(),
        app: state.app.get()?,
        prices: state.commission.prices()?,
        price_votes: state
            .commission
            .all_votes()?
            .into_iter()
            .map(|(height, votes)| PriceVotesAt { height, votes })
            .collect(),
        halts: state.halts.all()?.into_iter().map(|(height, votes)| HaltsAt { height, votes }).collect(),
    })
}

/// Loads `snapshot` into the overlays of `state`. A zero emission is
/// replaced by the base coin actually held, so imported supplies start balanced.
pub fn import(state: &mut State, snapshot: Snapshot) -> Result<(), StateError> {
    for (addr, account) in snapshot.accounts {
        state.accounts.put(addr, account);
    }
    for coin in snapshot.coins {
        if coin.id.is_base() {
            return Err(StateError::Genesis("coin id 0 is reserved for the base coin".into()));
        }
        state.coins.put(coin);
    }
    for (symbol, entry) in snapshot.symbols {
        state.coins.put_symbol(symbol, entry);
    }
    for pool in snapshot.pools {
        state.swap.put(pool);
    }
    for cand in snapshot.candidates {
        state.candidates.put(cand);
    }
    state.validators.put(ValidatorSet::new(snapshot.validators.validators));
    for FrozenAt { height, funds } in snapshot.frozen {
        state.frozen.put(height, funds);
    }
    for raw in snapshot.used_checks {
        let bytes = hex::decode(raw.trim_start_matches("0x")).map_err(|e| StateError::Genesis(e.to_string()))?;
        let hash: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StateError::Genesis("used check hash must be 32 bytes".into()))?;
        state.checks.mark_used(hash);
    }
    state.commission.set_prices(snapshot.prices);
    for PriceVotesAt { height, votes } in snapshot.price_votes {
        state.commission.put_votes(height, votes);
    }
    for HaltsAt { height, votes } in snapshot.halts {
        state.halts.put(height, votes);
    }

    let mut app = snapshot.app;
    if app.emission == 0 {
        app.emission = collect_holdings(state)?.base_total().saturating_add(app.total_slashed);
    }
    state.app.put(app);
    Ok(())
}
