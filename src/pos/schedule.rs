// src/pos/schedule.rs

//! Height-driven schedules: block emission and validator / candidate set sizes.

use crate::types::{coins, Amount};

pub const FIRST_REWARD: u128 = 333;
pub const REWARD_STEP: u64 = 200_000;
pub const LAST_REWARD_BLOCK: u64 = 43_702_611;
pub const LAST_REWARD: u128 = 68;

pub const MIN_VALIDATORS: u64 = 16;
pub const MAX_VALIDATORS: u64 = 64;
pub const MIN_CANDIDATES: u64 = 64;
pub const MAX_CANDIDATES: u64 = 256;

/// Base coin created at `height`.
pub fn block_reward(height: u64) -> Amount {
    if height > LAST_REWARD_BLOCK {
        return 0;
    }
    if height == LAST_REWARD_BLOCK {
        return coins(LAST_REWARD);
    }
    let steps = u128::from(height / REWARD_STEP);
    coins(FIRST_REWARD.saturating_sub(steps).max(1))
}

/// Size of the active validator set at `height`.
pub fn validators_count(height: u64, step: u64) -> usize {
    let n = MIN_VALIDATORS + 4 * (height / step.max(1));
    n.min(MAX_VALIDATORS) as usize
}

/// Maximum number of registered candidates at `height`.
pub fn candidates_cap(height: u64, step: u64) -> usize {
    let n = MIN_CANDIDATES + 16 * (height / step.max(1));
    n.min(MAX_CANDIDATES) as usize
}
