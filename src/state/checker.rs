// src/state/checker.rs

//! Global supply checks run after commit.

use std::collections::BTreeMap;

use tracing::{debug, error};

use crate::config::EngineConfig;
use crate::error::{InvariantError, StateError};
use crate::state::State;
use crate::types::{Amount, CoinId};

/// Sums of everything that holds value, per coin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Holdings {
    pub per_coin: BTreeMap<CoinId, Amount>,
    /// Base locked as coin reserves, plus rewards accrued but not yet paid.
    pub base_backing: Amount,
}

impl Holdings {
    fn add(&mut self, coin: CoinId, amount: Amount) {
        let e = self.per_coin.entry(coin).or_insert(0);
        *e = e.saturating_add(amount);
    }

    pub fn of(&self, coin: CoinId) -> Amount {
        self.per_coin.get(&coin).copied().unwrap_or(0)
    }

    /// Base held anywhere: balances, stakes, frozen funds, pools, reserves and accrued rewards.
    pub fn base_total(&self) -> Amount {
        self.of(CoinId::BASE).saturating_add(self.base_backing)
    }
}

/// Walks balances, stakes, frozen funds, pool reserves, coin reserves and
/// validator accumulators.
pub fn collect_holdings(state: &State) -> Result<Holdings, StateError> {
    let mut h = Holdings::default();
    for account in state.accounts.all()?.values() {
        for (coin, value) in &account.balances {
            h.add(*coin, *value);
        }
    }
    for cand in state.candidates.all()?.values() {
        for s in &cand.stakes {
            h.add(s.coin, s.value);
        }
    }
    for funds in state.frozen.all()?.values() {
        for f in funds {
            h.add(f.coin, f.value);
        }
    }
    for pool in state.swap.all()?.values() {
        h.add(pool.coin0, pool.reserve0);
        h.add(pool.coin1, pool.reserve1);
    }
    for coin in state.coins.all()?.values().filter(|c| !c.deleted) {
        h.base_backing = h.base_backing.saturating_add(coin.reserve);
    }
    for v in state.validators.get()?.validators {
        h.base_backing = h.base_backing.saturating_add(v.accum_reward);
    }
    Ok(h)
}

fn judge(cfg: &EngineConfig, diff: Amount, fault: InvariantError) -> Result<(), StateError> {
    if diff > cfg.invariant_halt_tolerance {
        error!(%fault, "state diverged beyond halt tolerance");
        return Err(fault.into());
    }
    if diff > cfg.invariant_log_tolerance {
        error!(%fault, "state divergence");
    }
    Ok(())
}

/// Every live coin's volume must equal its holdings, and base in
/// circulation must equal emission minus slashed. Divergences above the
/// log tolerance are logged; above the halt tolerance they fail.
pub fn check_invariants(state: &State, cfg: &EngineConfig) -> Result<Holdings, StateError> {
    let holdings = collect_holdings(state)?;

    for coin in state.coins.all()?.values().filter(|c| !c.deleted) {
        let held = holdings.of(coin.id);
        let diff = coin.volume.abs_diff(held);
        if diff > 0 {
            judge(cfg, diff, InvariantError::CoinSupply { coin: coin.id, volume: coin.volume, holdings: held, diff })?;
        }
    }

    let app = state.app.get()?;
    let expected = app.emission.saturating_sub(app.total_slashed);
    let found = holdings.base_total();
    let diff = expected.abs_diff(found);
    if diff > 0 {
        judge(cfg, diff, InvariantError::BaseSupply { expected, found, diff })?;
    }
    debug!(version = state.version(), coins = holdings.per_coin.len(), "invariants hold");
    Ok(holdings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::coins::NewCoin;
    use crate::types::{coins, Address};

    fn seeded() -> State {
        let mut st = State::in_memory(0);
        st.accounts.add_balance(&Address([1; 20]), CoinId::BASE, coins(50)).unwrap();
        st.coins
            .insert(
                CoinId(1),
                NewCoin {
                    symbol: "ABC".into(),
                    name: String::new(),
                    volume: coins(10),
                    reserve: coins(10_000),
                    crr: 50,
                    max_supply: coins(1_000),
                    mintable: false,
                    burnable: false,
                    owner: None,
                },
            )
            .unwrap();
        st.accounts.add_balance(&Address([1; 20]), CoinId(1), coins(10)).unwrap();
        st.app.add_emission(coins(10_050)).unwrap();
        st
    }

    #[test]
    fn balanced_state_passes() {
        let st = seeded();
        let h = check_invariants(&st, &EngineConfig::default()).unwrap();
        assert_eq!(h.base_total(), coins(10_050));
    }

    #[test]
    fn small_drift_is_tolerated_large_drift_fails() {
        let mut st = seeded();
        let cfg = EngineConfig::default();
        st.accounts.add_balance(&Address([2; 20]), CoinId::BASE, 10).unwrap();
        assert!(check_invariants(&st, &cfg).is_ok());

        st.accounts.add_balance(&Address([2; 20]), CoinId(1), coins(2)).unwrap();
        let err = check_invariants(&st, &cfg).unwrap_err();
        assert!(matches!(err, StateError::Invariant(InvariantError::CoinSupply { .. })));
    }
}
