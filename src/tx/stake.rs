// src/tx/stake.rs

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::TxError;
use crate::pos::staking;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Amount, AmountStr, CoinId, PubKey};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateData {
    pub pubkey: PubKey,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

impl TxHandler for DelegateData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.delegate
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        staking::delegate(state, ctx.cfg, ctx.sender, &self.pubkey, self.coin, self.value)?;
        Ok(vec![tag("tx.public_key", self.pubkey), tag("tx.coin_id", self.coin)])
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnbondData {
    pub pubkey: PubKey,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

impl TxHandler for UnbondData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.unbond
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let release_at = staking::unbond(state, ctx.cfg, ctx.height, ctx.sender, &self.pubkey, self.coin, self.value)?;
        Ok(vec![tag("tx.public_key", self.pubkey), tag("tx.unlock_block", release_at)])
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveStakeData {
    pub from: PubKey,
    pub to: PubKey,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

impl TxHandler for MoveStakeData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.move_stake
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let release_at =
            staking::move_stake(state, ctx.cfg, ctx.height, ctx.sender, &self.from, &self.to, self.coin, self.value)?;
        Ok(vec![tag("tx.from_public_key", self.from), tag("tx.to_public_key", self.to), tag("tx.unlock_block", release_at)])
    }
}
