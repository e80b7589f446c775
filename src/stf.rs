// src/stf.rs

//! Single-transaction state transition: envelope checks, sender recovery,
//! commission, then the type handler. Writes happen under a journal
//! checkpoint that is rolled back when any step fails.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::config::{EngineConfig, MAX_PAYLOAD_LENGTH, MAX_SERVICE_DATA_LENGTH, MAX_TX_LENGTH};
use crate::crypto::SignatureVerifier;
use crate::error::TxError;
use crate::fees::{charge, quote, table_price, to_base, CommissionQuote};
use crate::state::overlay::Journal;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, Transaction, TxData, TxHandler};
use crate::types::{Address, Amount};

pub const CODE_OK: u32 = 0;

/// Outcome reported back to consensus for every transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub code: u32,
    pub log: String,
    pub info: String,
    pub gas_used: u64,
    pub gas_wanted: u64,
    pub tags: Tags,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.code == CODE_OK
    }

    fn rejected(err: &TxError, gas_wanted: u64) -> Self {
        Response {
            code: err.code(),
            log: err.to_string(),
            info: json!({ "code": err.code(), "internal": err.is_internal() }).to_string(),
            gas_used: 0,
            gas_wanted,
            tags: Vec::new(),
        }
    }
}

/// Per-call inputs owned by the block driver.
pub struct TxContext<'a> {
    pub height: u64,
    pub check_only: bool,
    pub cfg: &'a EngineConfig,
    pub verifier: &'a dyn SignatureVerifier,
    /// Base-coin commission collected in this block.
    pub reward_accumulator: &'a mut Amount,
    /// Gas consumed in this block so far.
    pub block_gas: &'a mut u64,
}

/// Applies `raw` to `state`. On any failure `state` is left untouched.
pub fn apply(state: &mut State, raw: &[u8], ctx: &mut TxContext<'_>) -> Response {
    let mut gas_wanted = 0;
    match try_apply(state, raw, ctx, &mut gas_wanted) {
        Ok(resp) => resp,
        Err(err) => {
            debug!(height = ctx.height, code = err.code(), error = %err, check_only = ctx.check_only, "tx rejected");
            Response::rejected(&err, gas_wanted)
        }
    }
}

fn try_apply(state: &mut State, raw: &[u8], ctx: &mut TxContext<'_>, gas_wanted: &mut u64) -> Result<Response, TxError> {
    if raw.len() > MAX_TX_LENGTH {
        return Err(TxError::TxTooLarge { size: raw.len(), max: MAX_TX_LENGTH });
    }
    let tx = Transaction::decode(raw)?;
    if tx.chain_id != ctx.cfg.chain_id {
        return Err(TxError::WrongChainId { expected: ctx.cfg.chain_id, got: tx.chain_id });
    }
    if tx.payload.len() > MAX_PAYLOAD_LENGTH {
        return Err(TxError::PayloadTooLarge { size: tx.payload.len(), max: MAX_PAYLOAD_LENGTH });
    }
    if tx.service_data.len() > MAX_SERVICE_DATA_LENGTH {
        return Err(TxError::ServiceDataTooLarge { size: tx.service_data.len(), max: MAX_SERVICE_DATA_LENGTH });
    }
    if tx.gas_price == 0 {
        return Err(TxError::TooLowGasPrice);
    }

    let kind = tx.kind()?;
    let gas = kind.gas();
    *gas_wanted = gas;
    let data = tx.decode_data()?;
    let sender = tx.sender(state, ctx.verifier)?;

    let expected = state.accounts.nonce(&sender)?.saturating_add(1);
    if tx.nonce != expected {
        return Err(TxError::WrongNonce { expected, got: tx.nonce });
    }

    if !ctx.check_only {
        let max_gas = state.app.max_gas()?;
        if max_gas > 0 && ctx.block_gas.saturating_add(gas) > max_gas {
            return Err(TxError::BlockGasLimitReached(max_gas));
        }
    }
    state.require_coin(tx.gas_coin)?;

    state.checkpoint();
    let (commission, mut tags) = match execute(state, &tx, &data, sender, ctx) {
        Ok(done) => {
            state.release();
            done
        }
        Err(err) => {
            state.rollback();
            return Err(err);
        }
    };

    *ctx.reward_accumulator = ctx.reward_accumulator.saturating_add(commission.base);
    *ctx.block_gas = ctx.block_gas.saturating_add(gas);

    let mut all = vec![tag("tx.type", format!("{:#04x}", kind.byte())), tag("tx.from", sender)];
    all.append(&mut tags);
    all.push(tag("tx.commission_coin", commission.coin));
    all.push(tag("tx.commission_amount", commission.value));
    all.push(tag("tx.commission_in_base_coin", commission.base));
    all.push(tag("tx.commission_conversion", commission.source.as_str()));

    Ok(Response { code: CODE_OK, log: String::new(), info: String::new(), gas_used: gas, gas_wanted: gas, tags: all })
}

// Commission then handler; the caller owns the checkpoint.
fn execute(
    state: &mut State,
    tx: &Transaction,
    data: &TxData,
    sender: Address,
    ctx: &TxContext<'_>,
) -> Result<(CommissionQuote, Tags), TxError> {
    let mut exec = Exec { sender, height: ctx.height, tx, cfg: ctx.cfg, verifier: ctx.verifier };

    let payer = data.payer(&exec, state)?;
    let prices = state.commission.prices()?;
    let extra_bytes = tx.payload.len() + tx.service_data.len();
    let in_table_coin = table_price(&prices, data.price(&prices), extra_bytes, tx.gas_price);
    let base = to_base(state, &prices, in_table_coin)?;
    let commission = quote(state, tx.gas_coin, base)?;
    charge(state, &payer, &commission)?;

    let tags = data.run(&mut exec, state)?;
    state.accounts.set_nonce(&sender, tx.nonce)?;
    Ok((commission, tags))
}
