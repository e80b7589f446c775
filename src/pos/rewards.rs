// src/pos/rewards.rs

use tracing::debug;

use crate::config::EngineConfig;
use crate::error::TxError;
use crate::events::{Event, RewardRole};
use crate::pos::candidates::mul_div;
use crate::pos::schedule::block_reward;
use crate::pos::validators::Validator;
use crate::state::State;
use crate::types::{Amount, CoinId};

fn eligible(v: &Validator, height: u64) -> bool {
    !v.pending_removal && v.signed_at(height)
}

/// Mints the block reward and spreads it, together with the commissions
/// collected in the block, over the validators that signed `height`.
/// Returns the emitted amount.
pub fn accrue_block_reward(state: &mut State, height: u64, collected: Amount) -> Result<Amount, TxError> {
    let emitted = block_reward(height);
    state.app.add_emission(emitted)?;
    let total = emitted.saturating_add(collected);
    if total == 0 {
        return Ok(emitted);
    }

    let mut set = state.validators.get()?;
    let power: Amount = set
        .validators
        .iter()
        .filter(|v| eligible(v, height))
        .fold(0u128, |a, v| a.saturating_add(v.total_bip_stake));
    if power == 0 {
        debug!(height, total, "no signing power, block reward burned");
        state.app.add_total_slashed(total)?;
        return Ok(emitted);
    }

    let mut handed = 0u128;
    for v in set.validators.iter_mut().filter(|v| eligible(v, height)) {
        let share = mul_div(total, v.total_bip_stake, power);
        v.accum_reward = v.accum_reward.saturating_add(share);
        handed += share;
    }
    state.validators.put(set);
    if total > handed {
        state.app.add_total_slashed(total - handed)?;
    }
    Ok(emitted)
}

/// Pays every validator's accumulated reward: DAO, developers, the
/// validator's commission, then delegators pro rata by bip stake.
/// Unallocated rounding goes to the slashed counter.
pub fn pay_rewards(state: &mut State, cfg: &EngineConfig, events: &mut Vec<Event>) -> Result<(), TxError> {
    let mut set = state.validators.get()?;
    for v in set.validators.iter_mut() {
        let reward = std::mem::take(&mut v.accum_reward);
        if reward == 0 {
            continue;
        }
        let Some(cand) = state.candidates.get(&v.rotated_to.unwrap_or(v.pubkey))? else {
            state.app.add_total_slashed(reward)?;
            continue;
        };

        let mut remaining = reward;

        let dao = reward * Amount::from(cfg.dao_percent) / 100;
        state.accounts.add_balance(&cfg.dao_address, CoinId::BASE, dao)?;
        events.push(Event::Reward { role: RewardRole::Dao, address: cfg.dao_address, amount: dao, validator: v.pubkey });
        remaining -= dao;

        let dev = reward * Amount::from(cfg.developers_percent) / 100;
        state.accounts.add_balance(&cfg.developers_address, CoinId::BASE, dev)?;
        events.push(Event::Reward {
            role: RewardRole::Developers,
            address: cfg.developers_address,
            amount: dev,
            validator: v.pubkey,
        });
        remaining = remaining.checked_sub(dev).ok_or_else(|| TxError::NegativeRewardRemainder(dev - remaining))?;

        let commission = remaining * Amount::from(cand.commission) / 100;
        state.accounts.add_balance(&cand.reward_address, CoinId::BASE, commission)?;
        events.push(Event::Reward {
            role: RewardRole::Validator,
            address: cand.reward_address,
            amount: commission,
            validator: v.pubkey,
        });
        remaining -= commission;

        let pool = remaining;
        let mut paid = 0u128;
        if cand.total_bip_stake > 0 {
            for s in &cand.stakes {
                let share = mul_div(pool, s.bip_value, cand.total_bip_stake);
                if share == 0 {
                    continue;
                }
                state.accounts.add_balance(&s.owner, CoinId::BASE, share)?;
                events.push(Event::Reward { role: RewardRole::Delegator, address: s.owner, amount: share, validator: v.pubkey });
                paid += share;
            }
        }
        let rest = pool.checked_sub(paid).ok_or_else(|| TxError::NegativeRewardRemainder(paid - pool))?;
        if rest > 0 {
            state.app.add_total_slashed(rest)?;
        }
    }
    state.validators.put(set);
    Ok(())
}
