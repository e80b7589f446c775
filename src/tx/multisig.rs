// src/tx/multisig.rs

use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::state::accounts::Multisig;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMultisigData {
    pub threshold: u32,
    pub weights: Vec<u32>,
    pub addresses: Vec<Address>,
}

impl CreateMultisigData {
    fn multisig(&self) -> Multisig {
        Multisig { threshold: self.threshold, weights: self.weights.clone(), addresses: self.addresses.clone() }
    }
}

impl TxHandler for CreateMultisigData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.create_multisig
    }

    fn run(&self, _ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let ms = self.multisig();
        ms.validate()?;
        let address = ms.address();
        if state.accounts.get(&address)?.multisig.is_some() {
            return Err(TxError::MultisigExists(address));
        }
        state.accounts.set_multisig(&address, ms)?;
        Ok(vec![tag("tx.created_multisig", address)])
    }
}

/// Replaces the owners of the sending multisig. The address stays the same.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditMultisigData {
    pub threshold: u32,
    pub weights: Vec<u32>,
    pub addresses: Vec<Address>,
}

impl TxHandler for EditMultisigData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.edit_multisig
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if state.accounts.get(&ctx.sender)?.multisig.is_none() {
            return Err(TxError::MultisigNotExists(ctx.sender));
        }
        let ms = Multisig { threshold: self.threshold, weights: self.weights.clone(), addresses: self.addresses.clone() };
        ms.validate()?;
        state.accounts.set_multisig(&ctx.sender, ms)?;
        Ok(vec![tag("tx.multisig", ctx.sender)])
    }
}
