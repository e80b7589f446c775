// src/tx/candidate.rs

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::info;

use crate::error::TxError;
use crate::pos::candidates::{Candidate, CandidateStatus};
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, AmountStr, CoinId, PubKey};

pub const MAX_COMMISSION: u32 = 100;

fn check_commission(commission: u32) -> Result<(), TxError> {
    if commission > MAX_COMMISSION {
        return Err(TxError::WrongCommission(commission));
    }
    Ok(())
}

fn owned(state: &State, pubkey: &PubKey, who: &Address) -> Result<Candidate, TxError> {
    let cand = state.candidates.get_or_err(pubkey)?;
    if cand.owner != *who {
        return Err(TxError::IsNotOwnerOfCandidate);
    }
    Ok(cand)
}

fn controlled(state: &State, pubkey: &PubKey, who: &Address) -> Result<Candidate, TxError> {
    let cand = state.candidates.get_or_err(pubkey)?;
    if !cand.can_control(who) {
        return Err(TxError::IsNotOwnerOfCandidate);
    }
    Ok(cand)
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclareCandidacyData {
    /// Reward address.
    pub address: Address,
    pub pubkey: PubKey,
    pub commission: u32,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub stake: Amount,
}

impl TxHandler for DeclareCandidacyData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.declare_candidacy
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        check_commission(self.commission)?;
        if state.candidates.exists(&self.pubkey)? {
            return Err(TxError::CandidateExists);
        }
        if self.stake == 0 {
            return Err(TxError::StakeShouldBePositive);
        }
        state.require_coin(self.coin)?;

        let bip = state.bip_value(self.coin, self.stake)?;
        state.accounts.sub_balance(&ctx.sender, self.coin, self.stake)?;
        let mut cand = Candidate::new(self.pubkey, ctx.sender, self.address, ctx.sender, self.commission, ctx.height);
        cand.add_stake(ctx.sender, self.coin, self.stake, bip);
        state.candidates.put(cand);
        info!(pubkey = %self.pubkey, owner = %ctx.sender, "candidate declared");
        Ok(vec![tag("tx.public_key", self.pubkey)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCandidateOnData {
    pub pubkey: PubKey,
}

impl TxHandler for SetCandidateOnData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.set_candidate_on
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let mut cand = controlled(state, &self.pubkey, &ctx.sender)?;
        if cand.is_jailed(ctx.height) {
            return Err(TxError::CandidateJailed(cand.jailed_until));
        }
        cand.status = CandidateStatus::Online;
        state.candidates.put(cand);
        Ok(vec![tag("tx.public_key", self.pubkey)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCandidateOffData {
    pub pubkey: PubKey,
}

impl TxHandler for SetCandidateOffData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.set_candidate_off
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let mut cand = controlled(state, &self.pubkey, &ctx.sender)?;
        cand.status = CandidateStatus::Offline;
        state.candidates.put(cand);
        state.validators.mark_for_removal(&self.pubkey)?;
        Ok(vec![tag("tx.public_key", self.pubkey)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCandidateData {
    pub pubkey: PubKey,
    pub reward_address: Address,
    pub owner_address: Address,
    pub control_address: Address,
}

impl TxHandler for EditCandidateData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.edit_candidate
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let mut cand = owned(state, &self.pubkey, &ctx.sender)?;
        cand.reward_address = self.reward_address;
        cand.owner = self.owner_address;
        cand.control_address = self.control_address;
        state.candidates.put(cand);
        Ok(vec![tag("tx.public_key", self.pubkey)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCandidatePublicKeyData {
    pub pubkey: PubKey,
    pub new_pubkey: PubKey,
}

impl TxHandler for EditCandidatePublicKeyData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.edit_candidate_public_key
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let mut cand = owned(state, &self.pubkey, &ctx.sender)?;
        if self.pubkey == self.new_pubkey || state.candidates.exists(&self.new_pubkey)? {
            return Err(TxError::PubKeyInUse);
        }
        state.candidates.remove(self.pubkey);
        // the old key leaves the set at the next recompute, its reward follows the candidate
        state.validators.rotate(&self.pubkey, self.new_pubkey)?;
        cand.pubkey = self.new_pubkey;
        cand.status = CandidateStatus::Offline;
        state.candidates.put(cand);
        info!(old = %self.pubkey, new = %self.new_pubkey, "candidate key rotated");
        Ok(vec![tag("tx.public_key", self.new_pubkey)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCandidateCommissionData {
    pub pubkey: PubKey,
    pub commission: u32,
}

impl TxHandler for EditCandidateCommissionData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.edit_candidate_commission
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        check_commission(self.commission)?;
        let mut cand = owned(state, &self.pubkey, &ctx.sender)?;
        let next = cand.last_commission_edit.saturating_add(ctx.cfg.commission_edit_period);
        if ctx.height < next {
            return Err(TxError::PeriodLimitReached(next));
        }
        cand.commission = self.commission;
        cand.last_commission_edit = ctx.height;
        state.candidates.put(cand);
        Ok(vec![tag("tx.public_key", self.pubkey), tag("tx.commission", self.commission)])
    }
}
