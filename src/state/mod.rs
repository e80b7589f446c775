// src/state/mod.rs

//! Ledger state: one overlay-backed subsystem per entity kind over a shared
//! [`StoreView`]. Per-transaction rollback goes through the overlays'
//! [`overlay::Journal`], so undoing a transaction costs what it touched.

use tracing::debug;

use crate::error::{StateError, TxError};
use crate::events::Event;
use crate::pos::candidates::Candidates;
use crate::pos::validators::Validators;
use crate::store::{MerkleStore, StoreView};
use crate::types::{Address, Amount, CoinId, Hash};

pub mod accounts;
pub mod app;
pub mod checker;
pub mod checks;
pub mod coins;
pub mod commission;
pub mod export;
pub mod formula;
pub mod frozen;
pub mod halts;
pub mod overlay;
pub mod swap;

use accounts::Accounts;
use app::App;
use checks::UsedChecks;
use coins::Coins;
use commission::Commission;
use frozen::FrozenFunds;
use halts::HaltVotes;
use overlay::journaled;
use swap::Swap;

#[derive(Clone)]
pub struct State {
    store: StoreView,
    pub accounts: Accounts,
    pub coins: Coins,
    pub swap: Swap,
    pub candidates: Candidates,
    pub validators: Validators,
    pub frozen: FrozenFunds,
    pub checks: UsedChecks,
    pub halts: HaltVotes,
    pub commission: Commission,
    pub app: App,
}

journaled!(State => accounts, coins, swap, candidates, validators, frozen, checks, halts, commission, app);

/// Result of [`State::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    pub root: Hash,
    pub version: u64,
    pub events: Vec<Event>,
}

impl State {
    pub fn new(store: StoreView) -> Self {
        Self {
            accounts: Accounts::new(store.clone()),
            coins: Coins::new(store.clone()),
            swap: Swap::new(store.clone()),
            candidates: Candidates::new(store.clone()),
            validators: Validators::new(store.clone()),
            frozen: FrozenFunds::new(store.clone()),
            checks: UsedChecks::new(store.clone()),
            halts: HaltVotes::new(store.clone()),
            commission: Commission::new(store.clone()),
            app: App::new(store.clone()),
            store,
        }
    }

    /// Fresh in-memory state.
    pub fn in_memory(keep_last: u64) -> Self {
        Self::new(StoreView::live(MerkleStore::new(keep_last)))
    }

    /// Read-only state over the last committed version.
    pub fn check_view(&self) -> State {
        State::new(self.store.snapshot())
    }

    pub fn at_version(&self, version: u64) -> Result<State, StateError> {
        Ok(State::new(self.store.snapshot_at(version)?))
    }

    pub fn is_read_only(&self) -> bool {
        self.store.is_read_only()
    }

    pub fn version(&self) -> u64 {
        self.store.version()
    }

    pub fn store(&self) -> &StoreView {
        &self.store
    }

    /// Base always exists; other coins must be live.
    pub fn coin_exists(&self, id: CoinId) -> Result<bool, TxError> {
        if id.is_base() {
            return Ok(true);
        }
        self.coins.exists(id)
    }

    pub fn require_coin(&self, id: CoinId) -> Result<(), TxError> {
        if self.coin_exists(id)? {
            Ok(())
        } else {
            Err(TxError::CoinNotExists(id.to_string()))
        }
    }

    /// Base-coin value of `amount` of `coin` sold on its own: through the
    /// bonding curve, or the coin/base pool for reserve-less tokens.
    pub fn bip_value(&self, coin: CoinId, amount: Amount) -> Result<Amount, TxError> {
        if coin.is_base() || amount == 0 {
            return Ok(amount);
        }
        let c = self.coins.get_live(coin)?;
        if c.has_reserve() {
            return c.sale_return(amount.min(c.volume));
        }
        match self.swap.get(coin, CoinId::BASE)? {
            Some(pool) => Ok(pool.calculate_buy_for_sell(coin, amount).unwrap_or(0)),
            None => Ok(0),
        }
    }

    /// Converts every balance, stake and frozen fund in `id` into base through
    /// the sale curve and marks the coin deleted. Returns `false` when the coin
    /// was already deleted or still backs pool liquidity.
    pub fn delete_coin(&mut self, id: CoinId) -> Result<bool, TxError> {
        if id.is_base() {
            return Ok(false);
        }
        let Some(mut coin) = self.coins.get(id)? else {
            return Ok(false);
        };
        if coin.deleted {
            return Ok(false);
        }
        let in_pools = self.swap.all()?.values().any(|p| p.pair().contains(id) && p.reserve_of(id) > 0);
        if in_pools {
            debug!(coin = %id, "coin still backs pool liquidity, deletion skipped");
            return Ok(false);
        }

        for (addr, value) in self.accounts.holders_of(id)? {
            let base = sell(&mut coin, value)?;
            self.accounts.sub_balance(&addr, id, value)?;
            self.accounts.add_balance(&addr, CoinId::BASE, base)?;
        }

        for (_, mut cand) in self.candidates.all()? {
            let held: Vec<(Address, Amount)> =
                cand.stakes.iter().filter(|s| s.coin == id).map(|s| (s.owner, s.value)).collect();
            if held.is_empty() {
                continue;
            }
            for (owner, value) in held {
                let base = sell(&mut coin, value)?;
                cand.sub_stake(&owner, id, value)?;
                if base > 0 {
                    cand.add_stake(owner, CoinId::BASE, base, base);
                }
            }
            self.candidates.put(cand);
        }

        for (height, mut funds) in self.frozen.all()? {
            let mut touched = false;
            for f in funds.iter_mut().filter(|f| f.coin == id) {
                f.value = sell(&mut coin, f.value)?;
                f.coin = CoinId::BASE;
                touched = true;
            }
            if touched {
                funds.retain(|f| f.value > 0);
                self.frozen.put(height, funds);
            }
        }

        if coin.reserve > 0 {
            self.app.add_total_slashed(coin.reserve)?;
        }
        self.coins.put(coin);
        self.coins.mark_deleted(id)
    }

    /// Sweeps drained coins, flushes every overlay in a fixed order and
    /// persists a new store version.
    pub fn commit(&mut self) -> Result<CommitInfo, StateError> {
        let mut events = Vec::new();
        // Covers both zero-volume coins and reserve coins starved below
        // MIN_COIN_RESERVE by slashing; holders of the latter are paid out in base.
        for id in self.coins.drained()? {
            let symbol = self.coins.get(id)?.map(|c| c.full_symbol()).unwrap_or_default();
            if self.delete_coin(id)? {
                events.push(Event::CoinDeleted { coin: id, symbol });
            }
        }

        let mut written = 0;
        written += self.accounts.commit()?;
        written += self.app.commit()?;
        written += self.candidates.commit()?;
        written += self.checks.commit()?;
        written += self.coins.commit()?;
        written += self.commission.commit()?;
        written += self.frozen.commit()?;
        written += self.halts.commit()?;
        written += self.swap.commit()?;
        written += self.validators.commit()?;

        let (root, version) = self.store.commit()?;
        debug!(version, root = %hex::encode(root), written, "state committed");
        Ok(CommitInfo { root, version, events })
    }
}

// Sells `value` of `coin` against its own curve, updating the local copy.
fn sell(coin: &mut coins::Coin, value: Amount) -> Result<Amount, TxError> {
    if value == 0 {
        return Ok(0);
    }
    let base = if coin.has_reserve() { coin.sale_return(value.min(coin.volume))? } else { 0 };
    coin.volume = coin.volume.saturating_sub(value);
    coin.reserve = coin.reserve.saturating_sub(base);
    Ok(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::candidates::Candidate;
    use crate::state::overlay::Journal;
    use crate::state::coins::NewCoin;
    use crate::state::frozen::FrozenFund;
    use crate::types::{coins as units, PubKey};

    fn sample_coin() -> NewCoin {
        NewCoin {
            symbol: "TEST".into(),
            name: "Test".into(),
            volume: units(100),
            reserve: units(10_000),
            crr: 50,
            max_supply: units(1_000_000),
            mintable: false,
            burnable: false,
            owner: None,
        }
    }

    #[test]
    fn rollback_undoes_every_subsystem() {
        let mut st = State::in_memory(0);
        let a = Address([1; 20]);
        st.accounts.add_balance(&a, CoinId::BASE, 10).unwrap();

        st.checkpoint();
        st.accounts.add_balance(&a, CoinId::BASE, 5).unwrap();
        let id = st.app.next_coin_id().unwrap();
        st.coins.insert(id, sample_coin()).unwrap();
        st.candidates.put(Candidate::new(PubKey([9; 32]), a, a, a, 10, 1));
        st.rollback();

        assert_eq!(st.accounts.balance(&a, CoinId::BASE).unwrap(), 10);
        assert_eq!(st.app.get().unwrap().last_coin_id, 0);
        assert!(!st.coins.symbol_taken("TEST").unwrap());
        assert!(!st.candidates.exists(&PubKey([9; 32])).unwrap());

        st.checkpoint();
        st.accounts.add_balance(&a, CoinId::BASE, 5).unwrap();
        st.release();
        assert_eq!(st.accounts.balance(&a, CoinId::BASE).unwrap(), 15);
    }

    #[test]
    fn check_view_is_read_only_and_sees_committed_only() {
        let mut st = State::in_memory(0);
        let a = Address([1; 20]);
        st.accounts.add_balance(&a, CoinId::BASE, 10).unwrap();
        st.commit().unwrap();
        st.accounts.add_balance(&a, CoinId::BASE, 5).unwrap();
        let mut view = st.check_view();
        assert!(view.is_read_only());
        assert_eq!(view.accounts.balance(&a, CoinId::BASE).unwrap(), 10);
        view.accounts.add_balance(&a, CoinId::BASE, 1).unwrap();
        assert!(view.commit().is_err());
    }

    #[test]
    fn deletion_sweep_converts_holdings_once() {
        let mut st = State::in_memory(0);
        let id = CoinId(1);
        st.coins.insert(id, sample_coin()).unwrap();
        let holder = Address([1; 20]);
        let staker = Address([2; 20]);
        let frozen_owner = Address([3; 20]);
        st.accounts.add_balance(&holder, id, units(50)).unwrap();
        let mut cand = Candidate::new(PubKey([9; 32]), staker, staker, staker, 10, 1);
        cand.add_stake(staker, id, units(30), 0);
        st.candidates.put(cand);
        st.frozen
            .add(100, FrozenFund { owner: frozen_owner, candidate: None, coin: id, value: units(20), move_to: None })
            .unwrap();

        assert!(st.delete_coin(id).unwrap());
        assert!(!st.delete_coin(id).unwrap());

        let got_holder = st.accounts.balance(&holder, CoinId::BASE).unwrap();
        let stake = st.candidates.get_or_err(&PubKey([9; 32])).unwrap().stake_value(&staker, CoinId::BASE);
        let fund = st.frozen.get(100).unwrap()[0].value;
        // the whole reserve is handed out: the last sale takes the remaining volume
        assert_eq!(got_holder + stake + fund, units(10_000));
        assert_eq!(st.accounts.balance(&holder, id).unwrap(), 0);
        assert!(!st.coins.symbol_taken("TEST").unwrap());
    }

    #[test]
    fn commit_deletes_drained_coins() {
        let mut st = State::in_memory(0);
        let id = CoinId(1);
        let mut new_coin = sample_coin();
        new_coin.crr = 0;
        new_coin.reserve = 0;
        st.coins.insert(id, new_coin).unwrap();
        st.coins.sub_volume(id, units(100)).unwrap();
        let info = st.commit().unwrap();
        assert_eq!(info.events, vec![Event::CoinDeleted { coin: id, symbol: "TEST".into() }]);
        assert!(!st.coin_exists(id).unwrap());
        assert!(st.coin_exists(CoinId::BASE).unwrap());
    }
}
