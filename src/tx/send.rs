// src/tx/send.rs

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::TxError;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, AmountStr, CoinId};

pub const MAX_MULTISEND_RECIPIENTS: usize = 100;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendData {
    pub coin: CoinId,
    pub to: Address,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

fn transfer(state: &mut State, from: &Address, item: &SendData) -> Result<(), TxError> {
    state.require_coin(item.coin)?;
    state.accounts.sub_balance(from, item.coin, item.value)?;
    state.accounts.add_balance(&item.to, item.coin, item.value)
}

impl TxHandler for SendData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.send
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        transfer(state, &ctx.sender, self)?;
        Ok(vec![tag("tx.to", self.to), tag("tx.coin_id", self.coin)])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultisendData {
    pub list: Vec<SendData>,
}

impl TxHandler for MultisendData {
    fn price(&self, prices: &PriceTable) -> Amount {
        let extra = self.list.len().saturating_sub(1) as Amount;
        prices.multisend_base.saturating_add(prices.multisend_delta.saturating_mul(extra))
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.list.is_empty() || self.list.len() > MAX_MULTISEND_RECIPIENTS {
            return Err(TxError::InvalidMultisendData(format!(
                "{} recipients, expected 1..={MAX_MULTISEND_RECIPIENTS}",
                self.list.len()
            )));
        }
        for item in &self.list {
            transfer(state, &ctx.sender, item)?;
        }
        let to: Vec<String> = self.list.iter().map(|i| i.to.to_string()).collect();
        Ok(vec![tag("tx.to", to.join(","))])
    }
}
