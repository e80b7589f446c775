// src/pos/mod.rs

//! Proof-of-stake subsystem: candidates, the validator set, stakes,
//! rewards, slashing and block-level votes.

use serde::{Deserialize, Serialize};

use crate::types::{Address, PubKey};

pub mod candidates;
pub mod governance;
pub mod rewards;
pub mod schedule;
pub mod slashing;
pub mod staking;
pub mod validators;

/// Voting power change handed back to the consensus engine. Power 0 removes the validator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pubkey: PubKey,
    pub power: u64,
}

/// Whether the validator with consensus address `address` signed the previous block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub address: Address,
    pub signed: bool,
}

/// Double-sign evidence reported by consensus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub address: Address,
    pub height: u64,
}
