// src/tx/governance.rs

use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::state::commission::{PriceTable, PriceVote};
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, PubKey};

fn require_owner(state: &State, pubkey: &PubKey, who: &Address) -> Result<(), TxError> {
    if state.candidates.get_or_err(pubkey)?.owner != *who {
        return Err(TxError::IsNotOwnerOfCandidate);
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetHaltBlockData {
    pub pubkey: PubKey,
    pub height: u64,
}

impl TxHandler for SetHaltBlockData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.set_halt_block
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.height <= ctx.height {
            return Err(TxError::WrongHaltHeight { current: ctx.height, got: self.height });
        }
        require_owner(state, &self.pubkey, &ctx.sender)?;
        state.halts.add(self.height, self.pubkey)?;
        Ok(vec![tag("tx.public_key", self.pubkey), tag("tx.halt_height", self.height)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCommissionData {
    pub pubkey: PubKey,
    pub height: u64,
    pub prices: PriceTable,
}

impl TxHandler for VoteCommissionData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.vote_commission
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.height <= ctx.height {
            return Err(TxError::VoteExpired { current: ctx.height, height: self.height });
        }
        require_owner(state, &self.pubkey, &ctx.sender)?;
        state.require_coin(self.prices.coin)?;
        state.commission.add_vote(self.height, PriceVote { pubkey: self.pubkey, prices: self.prices.clone() })?;
        Ok(vec![tag("tx.public_key", self.pubkey), tag("tx.vote_height", self.height)])
    }
}
