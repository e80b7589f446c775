// src/pos/staking.rs

//! Delegation, unbonding, stake valuation and set maintenance.

use std::collections::BTreeMap;

use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::TxError;
use crate::events::Event;
use crate::pos::candidates::{mul_div, Candidate, Stake};
use crate::pos::schedule::{candidates_cap, validators_count};
use crate::pos::validators::{Validator, ValidatorSet};
use crate::pos::ValidatorUpdate;
use crate::state::frozen::FrozenFund;
use crate::state::State;
use crate::types::{Address, Amount, CoinId, PubKey, UNIT};

/// Moves `value` of `coin` from the owner's balance into a stake.
pub fn delegate(
    state: &mut State,
    cfg: &EngineConfig,
    owner: Address,
    pubkey: &PubKey,
    coin: CoinId,
    value: Amount,
) -> Result<(), TxError> {
    if value == 0 {
        return Err(TxError::StakeShouldBePositive);
    }
    state.require_coin(coin)?;
    let mut cand = state.candidates.get_or_err(pubkey)?;

    let bip = state.bip_value(coin, value)?;
    if cand.stake_index(&owner, coin).is_none() {
        if let Some(min) = cand.min_stake_when_full(cfg.max_delegators) {
            if bip <= min {
                return Err(TxError::TooLowStake { min_bip: min, got_bip: bip });
            }
        }
    }

    state.accounts.sub_balance(&owner, coin, value)?;
    cand.add_stake(owner, coin, value, bip);
    state.candidates.put(cand);
    Ok(())
}

/// Removes `value` from a stake and queues it for release after the unbond period.
pub fn unbond(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    owner: Address,
    pubkey: &PubKey,
    coin: CoinId,
    value: Amount,
) -> Result<u64, TxError> {
    if value == 0 {
        return Err(TxError::StakeShouldBePositive);
    }
    let mut cand = state.candidates.get_or_err(pubkey)?;
    cand.sub_stake(&owner, coin, value)?;
    state.candidates.put(cand);

    let release_at = height + cfg.unbond_period;
    state
        .frozen
        .add(release_at, FrozenFund { owner, candidate: Some(*pubkey), coin, value, move_to: None })?;
    Ok(release_at)
}

/// Takes stake from one candidate and schedules it onto another.
#[allow(clippy::too_many_arguments)]
pub fn move_stake(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    owner: Address,
    from: &PubKey,
    to: &PubKey,
    coin: CoinId,
    value: Amount,
) -> Result<u64, TxError> {
    if value == 0 {
        return Err(TxError::StakeShouldBePositive);
    }
    if !state.candidates.exists(to)? {
        return Err(TxError::CandidateNotFound);
    }
    let mut cand = state.candidates.get_or_err(from)?;
    cand.sub_stake(&owner, coin, value)?;
    state.candidates.put(cand);

    let release_at = height + cfg.move_stake_period;
    state
        .frozen
        .add(release_at, FrozenFund { owner, candidate: Some(*from), coin, value, move_to: Some(*to) })?;
    Ok(release_at)
}

/// Pays out (or re-delegates) everything frozen until `height`.
pub fn release_frozen(state: &mut State, height: u64, events: &mut Vec<Event>) -> Result<usize, TxError> {
    let funds = state.frozen.take(height)?;
    let n = funds.len();
    for f in funds {
        if let Some(to) = f.move_to {
            if let Some(mut cand) = state.candidates.get(&to)? {
                let bip = state.bip_value(f.coin, f.value)?;
                cand.add_stake(f.owner, f.coin, f.value, bip);
                state.candidates.put(cand);
                events.push(Event::StakeMove {
                    address: f.owner,
                    coin: f.coin,
                    amount: f.value,
                    from: f.candidate.unwrap_or_default(),
                    to,
                });
                continue;
            }
        }
        state.accounts.add_balance(&f.owner, f.coin, f.value)?;
        events.push(Event::Unbond {
            address: f.owner,
            coin: f.coin,
            amount: f.value,
            validator: f.candidate.unwrap_or_default(),
        });
    }
    Ok(n)
}

/// Revalues every stake against the aggregate amount staked in its coin,
/// so a coin is priced as if all of its stakes were sold at once.
pub fn recalc_stakes(state: &mut State) -> Result<(), TxError> {
    let mut candidates = state.candidates.all()?;

    let mut totals: BTreeMap<CoinId, Amount> = BTreeMap::new();
    for cand in candidates.values() {
        for s in &cand.stakes {
            let t = totals.entry(s.coin).or_insert(0);
            *t = t.saturating_add(s.value);
        }
    }
    let mut valuation: BTreeMap<CoinId, (Amount, Amount)> = BTreeMap::new();
    for (coin, total) in totals {
        let bip = state.bip_value(coin, total)?;
        valuation.insert(coin, (total, bip));
    }

    for cand in candidates.values_mut() {
        for s in cand.stakes.iter_mut() {
            if let Some((total, bip)) = valuation.get(&s.coin) {
                s.bip_value = mul_div(*bip, s.value, *total);
            }
        }
        cand.refresh_total();
    }
    for (_, cand) in candidates {
        state.candidates.put(cand);
    }
    Ok(())
}

/// Refunds the weakest stakes of candidates holding more than `max_delegators`.
pub fn evict_excess_delegators(state: &mut State, cfg: &EngineConfig, events: &mut Vec<Event>) -> Result<(), TxError> {
    for (_, mut cand) in state.candidates.all()? {
        if cand.stakes.len() <= cfg.max_delegators {
            continue;
        }
        let excess = cand.stakes.len() - cfg.max_delegators;
        let kicked: Vec<Stake> = cand.stakes_by_weight().into_iter().take(excess).collect();
        for s in kicked {
            cand.sub_stake(&s.owner, s.coin, s.value)?;
            state.accounts.add_balance(&s.owner, s.coin, s.value)?;
            warn!(candidate = %cand.pubkey, owner = %s.owner, coin = %s.coin, value = s.value, "stake evicted");
            events.push(Event::StakeKick { address: s.owner, coin: s.coin, amount: s.value, validator: cand.pubkey });
        }
        state.candidates.put(cand);
    }
    Ok(())
}

/// Drops the weakest candidates above the height-dependent cap; their stakes are unbonded.
pub fn evict_excess_candidates(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
) -> Result<Vec<PubKey>, TxError> {
    let cap = candidates_cap(height, cfg.set_size_step);
    let all = state.candidates.all()?;
    if all.len() <= cap {
        return Ok(Vec::new());
    }
    let mut ranked: Vec<Candidate> = all.into_values().collect();
    ranked.sort_by(|a, b| a.total_bip_stake.cmp(&b.total_bip_stake).then_with(|| a.pubkey.cmp(&b.pubkey)));
    let excess = ranked.len() - cap;

    let release_at = height + cfg.unbond_period;
    let mut removed = Vec::with_capacity(excess);
    for cand in ranked.into_iter().take(excess) {
        for s in &cand.stakes {
            state.frozen.add(
                release_at,
                FrozenFund { owner: s.owner, candidate: Some(cand.pubkey), coin: s.coin, value: s.value, move_to: None },
            )?;
        }
        warn!(candidate = %cand.pubkey, stake = cand.total_bip_stake, "candidate evicted");
        state.candidates.remove(cand.pubkey);
        removed.push(cand.pubkey);
    }
    Ok(removed)
}

fn power(bip: Amount) -> u64 {
    u64::try_from(bip / UNIT).unwrap_or(u64::MAX)
}

/// Picks the top online, unjailed candidates by bip stake. Returns the
/// updates for the consensus engine: new powers plus zero for dropped keys.
pub fn recompute_validators(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
) -> Result<Vec<ValidatorUpdate>, TxError> {
    let old = state.validators.get()?;
    let mut eligible: Vec<Candidate> = state
        .candidates
        .all()?
        .into_values()
        .filter(|c| c.is_online() && !c.is_jailed(height) && c.total_bip_stake > 0)
        .collect();
    eligible.sort_by(|a, b| b.total_bip_stake.cmp(&a.total_bip_stake).then_with(|| a.pubkey.cmp(&b.pubkey)));
    eligible.truncate(validators_count(height, cfg.set_size_step));

    let mut next = Vec::with_capacity(eligible.len());
    for c in &eligible {
        let mut v = Validator::new(c.pubkey, c.reward_address, c.total_bip_stake, cfg.absent_window);
        if let Some(prev) = old.get(&c.pubkey) {
            v.accum_reward = prev.accum_reward;
            if prev.absence.len() == v.absence.len() {
                v.absence = prev.absence.clone();
            }
        }
        next.push(v);
    }
    let next = ValidatorSet::new(next);

    let mut updates: Vec<ValidatorUpdate> =
        next.validators.iter().map(|v| ValidatorUpdate { pubkey: v.pubkey, power: power(v.total_bip_stake) }).collect();
    for v in &old.validators {
        if next.get(&v.pubkey).is_none() {
            if v.accum_reward > 0 {
                state.app.add_total_slashed(v.accum_reward)?;
            }
            updates.push(ValidatorUpdate { pubkey: v.pubkey, power: 0 });
        }
    }

    if old.validators.iter().map(|v| v.pubkey).ne(next.validators.iter().map(|v| v.pubkey)) {
        info!(height, count = next.validators.len(), "validator set changed");
    }
    state.validators.put(next);
    Ok(updates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::candidates::CandidateStatus;
    use crate::types::coins;

    fn setup() -> (State, EngineConfig, PubKey, Address) {
        let mut st = State::in_memory(0);
        let owner = Address([1; 20]);
        let pk = PubKey([7; 32]);
        st.candidates.put(Candidate::new(pk, owner, owner, owner, 10, 1));
        st.accounts.add_balance(&owner, CoinId::BASE, coins(1_000)).unwrap();
        (st, EngineConfig::default(), pk, owner)
    }

    #[test]
    fn delegate_moves_balance_into_stake() {
        let (mut st, cfg, pk, owner) = setup();
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        assert_eq!(st.accounts.balance(&owner, CoinId::BASE).unwrap(), coins(900));
        let c = st.candidates.get_or_err(&pk).unwrap();
        assert_eq!(c.stake_value(&owner, CoinId::BASE), coins(100));
        assert_eq!(c.total_bip_stake, coins(100));
        assert_eq!(delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, 0).unwrap_err().code(), 408);
        assert_eq!(delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(901)).unwrap_err().code(), 107);
    }

    #[test]
    fn full_candidate_rejects_weaker_newcomers() {
        let (mut st, mut cfg, pk, owner) = setup();
        cfg.max_delegators = 1;
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        let other = Address([2; 20]);
        st.accounts.add_balance(&other, CoinId::BASE, coins(500)).unwrap();
        let err = delegate(&mut st, &cfg, other, &pk, CoinId::BASE, coins(100)).unwrap_err();
        assert_eq!(err.code(), 409);
        delegate(&mut st, &cfg, other, &pk, CoinId::BASE, coins(101)).unwrap();
        // existing stakes can always grow
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(1)).unwrap();
    }

    #[test]
    fn unbond_freezes_until_release() {
        let (mut st, cfg, pk, owner) = setup();
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        let at = unbond(&mut st, &cfg, 10, owner, &pk, CoinId::BASE, coins(40)).unwrap();
        assert_eq!(at, 10 + cfg.unbond_period);
        assert_eq!(st.accounts.balance(&owner, CoinId::BASE).unwrap(), coins(900));
        let mut events = Vec::new();
        assert_eq!(release_frozen(&mut st, at, &mut events).unwrap(), 1);
        assert_eq!(st.accounts.balance(&owner, CoinId::BASE).unwrap(), coins(940));
        assert!(matches!(events[0], Event::Unbond { .. }));
    }

    #[test]
    fn moved_stake_lands_on_target() {
        let (mut st, cfg, pk, owner) = setup();
        let target = PubKey([8; 32]);
        st.candidates.put(Candidate::new(target, owner, owner, owner, 5, 1));
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        let at = move_stake(&mut st, &cfg, 1, owner, &pk, &target, CoinId::BASE, coins(100)).unwrap();
        assert!(st.candidates.get_or_err(&pk).unwrap().stakes.is_empty());
        let mut events = Vec::new();
        release_frozen(&mut st, at, &mut events).unwrap();
        assert_eq!(st.candidates.get_or_err(&target).unwrap().stake_value(&owner, CoinId::BASE), coins(100));
        assert_eq!(st.accounts.balance(&owner, CoinId::BASE).unwrap(), coins(900));
    }

    #[test]
    fn eviction_refunds_the_smallest() {
        let (mut st, mut cfg, pk, owner) = setup();
        let small = Address([2; 20]);
        st.accounts.add_balance(&small, CoinId::BASE, coins(10)).unwrap();
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        delegate(&mut st, &cfg, small, &pk, CoinId::BASE, coins(10)).unwrap();
        cfg.max_delegators = 1;
        let mut events = Vec::new();
        evict_excess_delegators(&mut st, &cfg, &mut events).unwrap();
        assert_eq!(st.accounts.balance(&small, CoinId::BASE).unwrap(), coins(10));
        assert_eq!(st.candidates.get_or_err(&pk).unwrap().stakes.len(), 1);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn validator_set_takes_online_candidates_only() {
        let (mut st, cfg, pk, owner) = setup();
        delegate(&mut st, &cfg, owner, &pk, CoinId::BASE, coins(100)).unwrap();
        assert!(recompute_validators(&mut st, &cfg, 1).unwrap().is_empty());

        let mut c = st.candidates.get_or_err(&pk).unwrap();
        c.status = CandidateStatus::Online;
        st.candidates.put(c);
        let updates = recompute_validators(&mut st, &cfg, 2).unwrap();
        assert_eq!(updates, vec![ValidatorUpdate { pubkey: pk, power: 100 }]);

        let mut c = st.candidates.get_or_err(&pk).unwrap();
        c.status = CandidateStatus::Offline;
        st.candidates.put(c);
        let updates = recompute_validators(&mut st, &cfg, 3).unwrap();
        assert_eq!(updates, vec![ValidatorUpdate { pubkey: pk, power: 0 }]);
        assert!(st.validators.get().unwrap().validators.is_empty());
    }
}
