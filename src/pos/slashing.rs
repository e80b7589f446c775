// src/pos/slashing.rs

//! Absence tracking and punishment of misbehaving validators.

use std::collections::BTreeSet;

use tracing::info;

use crate::config::EngineConfig;
use crate::error::TxError;
use crate::events::Event;
use crate::pos::candidates::CandidateStatus;
use crate::pos::{Evidence, VoteInfo};
use crate::state::frozen::FrozenFund;
use crate::state::State;
use crate::types::{Amount, CoinId, PubKey};

pub const ABSENCE_SLASH_PERCENT: Amount = 1;
pub const BYZANTINE_SLASH_PERCENT: Amount = 5;

/// Takes `amount` of `coin` out of circulation. Reserve coins are sold
/// through their curve and the released base is counted as slashed.
pub fn burn(state: &mut State, coin: CoinId, amount: Amount) -> Result<(), TxError> {
    if amount == 0 {
        return Ok(());
    }
    if coin.is_base() {
        return state.app.add_total_slashed(amount);
    }
    let c = state.coins.get_live(coin)?;
    if c.has_reserve() {
        let released = c.sale_return(amount.min(c.volume))?;
        state.coins.sub_volume(coin, amount)?;
        state.coins.sub_reserve(coin, released)?;
        state.app.add_total_slashed(released)
    } else {
        state.coins.sub_volume(coin, amount)
    }
}

fn jail(state: &mut State, cfg: &EngineConfig, height: u64, pubkey: &PubKey, events: &mut Vec<Event>) -> Result<(), TxError> {
    let mut set = state.validators.get()?;
    if let Some(v) = set.get_mut(pubkey) {
        v.pending_removal = true;
        v.reset_absence();
        state.validators.put(set);
    }
    let until = height + cfg.jail_period;
    events.push(Event::Jail { validator: *pubkey, until });
    Ok(())
}

/// Burns 1% of every stake, switches the candidate off and jails it.
pub fn punish_absence(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    pubkey: &PubKey,
    events: &mut Vec<Event>,
) -> Result<(), TxError> {
    let mut cand = state.candidates.get_or_err(pubkey)?;
    let mut slashed = 0u128;
    for s in cand.stakes.clone() {
        let cut = s.value * ABSENCE_SLASH_PERCENT / 100;
        if cut == 0 {
            continue;
        }
        cand.sub_stake(&s.owner, s.coin, cut)?;
        burn(state, s.coin, cut)?;
        slashed = slashed.saturating_add(cut);
        events.push(Event::Slash { address: s.owner, coin: s.coin, amount: cut, validator: *pubkey });
    }
    cand.status = CandidateStatus::Offline;
    cand.jailed_until = height + cfg.jail_period;
    state.candidates.put(cand);
    jail(state, cfg, height, pubkey, events)?;
    info!(height, candidate = %pubkey, slashed, until = height + cfg.jail_period, "validator slashed for absence");
    Ok(())
}

/// Burns 5% of every stake and unbonds the rest; the candidate keeps no stakes.
pub fn punish_byzantine(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    pubkey: &PubKey,
    events: &mut Vec<Event>,
) -> Result<(), TxError> {
    let mut cand = state.candidates.get_or_err(pubkey)?;
    let release_at = height + cfg.unbond_period;
    for s in std::mem::take(&mut cand.stakes) {
        let cut = s.value * BYZANTINE_SLASH_PERCENT / 100;
        burn(state, s.coin, cut)?;
        if cut > 0 {
            events.push(Event::Slash { address: s.owner, coin: s.coin, amount: cut, validator: *pubkey });
        }
        let rest = s.value - cut;
        if rest > 0 {
            state.frozen.add(
                release_at,
                FrozenFund { owner: s.owner, candidate: Some(*pubkey), coin: s.coin, value: rest, move_to: None },
            )?;
        }
    }
    cand.refresh_total();
    cand.status = CandidateStatus::Offline;
    cand.jailed_until = height + cfg.jail_period;
    state.candidates.put(cand);
    jail(state, cfg, height, pubkey, events)?;
    info!(height, candidate = %pubkey, until = height + cfg.jail_period, "validator slashed for double signing");
    Ok(())
}

/// Records block `height` in every validator's absence window. Validators
/// without a signed vote count as absent. Returns the punished keys.
pub fn process_absence(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    votes: &[VoteInfo],
    events: &mut Vec<Event>,
) -> Result<Vec<PubKey>, TxError> {
    let mut set = state.validators.get()?;
    if set.validators.is_empty() {
        return Ok(Vec::new());
    }
    let signed: BTreeSet<PubKey> =
        votes.iter().filter(|v| v.signed).filter_map(|v| set.by_address(&v.address)).collect();

    let mut punished = Vec::new();
    for v in set.validators.iter_mut() {
        if v.pending_removal {
            continue;
        }
        let missed = v.record(height, signed.contains(&v.pubkey));
        if missed > cfg.absent_threshold {
            punished.push(v.pubkey);
        }
    }
    state.validators.put(set);

    for pk in &punished {
        if state.candidates.exists(pk)? {
            punish_absence(state, cfg, height, pk, events)?;
        }
    }
    Ok(punished)
}

/// Punishes validators named in double-sign evidence. Candidates already
/// jailed at `height` have been punished and are skipped.
pub fn process_evidence(
    state: &mut State,
    cfg: &EngineConfig,
    height: u64,
    evidence: &[Evidence],
    events: &mut Vec<Event>,
) -> Result<Vec<PubKey>, TxError> {
    let set = state.validators.get()?;
    let mut punished = Vec::new();
    for e in evidence {
        let Some(pk) = set.by_address(&e.address) else {
            continue;
        };
        let Some(cand) = state.candidates.get(&pk)? else {
            continue;
        };
        if cand.is_jailed(height) || punished.contains(&pk) {
            continue;
        }
        punish_byzantine(state, cfg, height, &pk, events)?;
        punished.push(pk);
    }
    Ok(punished)
}
