// src/tx/convert.rs

//! Conversions through bonding curves: base <-> coin and coin -> coin via base.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::TxError;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Amount, AmountStr, CoinId};

/// Sells `amount` of `coin` into its reserve and returns the base released.
pub fn sell_for_base(state: &mut State, coin: CoinId, amount: Amount) -> Result<Amount, TxError> {
    let c = state.coins.get_live(coin)?;
    let ret = c.sale_return(amount)?;
    c.check_reserve_after(ret)?;
    state.coins.sub_volume(coin, amount)?;
    state.coins.sub_reserve(coin, ret)?;
    Ok(ret)
}

/// Deposits `base` into the reserve of `coin` and returns the coins minted.
pub fn buy_with_base(state: &mut State, coin: CoinId, base: Amount) -> Result<Amount, TxError> {
    let c = state.coins.get_live(coin)?;
    let ret = c.purchase_return(base)?;
    c.check_supply_after(ret)?;
    state.coins.add_reserve(coin, base)?;
    state.coins.add_volume(coin, ret)?;
    Ok(ret)
}

/// Converts `amount` of `from` into `to`, both sides through their curves.
pub fn convert_exact_in(state: &mut State, from: CoinId, to: CoinId, amount: Amount) -> Result<Amount, TxError> {
    let base = if from.is_base() { amount } else { sell_for_base(state, from, amount)? };
    if to.is_base() {
        Ok(base)
    } else {
        buy_with_base(state, to, base)
    }
}

/// Amount of `from` needed to receive exactly `want` of `to`.
pub fn quote_exact_out(state: &State, from: CoinId, to: CoinId, want: Amount) -> Result<Amount, TxError> {
    let base = if to.is_base() {
        want
    } else {
        let c = state.coins.get_live(to)?;
        c.check_supply_after(want)?;
        c.purchase_amount(want)?
    };
    if from.is_base() {
        return Ok(base);
    }
    let c = state.coins.get_live(from)?;
    c.check_reserve_after(base)?;
    c.sale_amount(base)
}

fn check_pair(state: &State, sell: CoinId, buy: CoinId) -> Result<(), TxError> {
    if sell == buy {
        return Err(TxError::CrossConvert(sell));
    }
    state.require_coin(sell)?;
    state.require_coin(buy)?;
    for id in [sell, buy] {
        if !id.is_base() && !state.coins.get_live(id)?.has_reserve() {
            return Err(TxError::CoinHasNoReserve(id));
        }
    }
    Ok(())
}

fn sell(ctx: &Exec<'_>, state: &mut State, from: CoinId, to: CoinId, value: Amount, min: Amount) -> Result<Tags, TxError> {
    check_pair(state, from, to)?;
    state.accounts.sub_balance(&ctx.sender, from, value)?;
    let ret = convert_exact_in(state, from, to, value)?;
    if ret < min {
        return Err(TxError::MinimumValueToBuyReached { minimum: min, got: ret });
    }
    state.accounts.add_balance(&ctx.sender, to, ret)?;
    Ok(vec![tag("tx.coin_to_sell", from), tag("tx.coin_to_buy", to), tag("tx.return", ret)])
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellCoinData {
    pub coin_to_sell: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value_to_sell: Amount,
    pub coin_to_buy: CoinId,
    #[serde_as(as = "AmountStr")]
    pub minimum_value_to_buy: Amount,
}

impl TxHandler for SellCoinData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.sell_bancor
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        sell(ctx, state, self.coin_to_sell, self.coin_to_buy, self.value_to_sell, self.minimum_value_to_buy)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellAllCoinData {
    pub coin_to_sell: CoinId,
    pub coin_to_buy: CoinId,
    #[serde_as(as = "AmountStr")]
    pub minimum_value_to_buy: Amount,
}

impl TxHandler for SellAllCoinData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.sell_all_bancor
    }

    // sells what is left after the commission was charged
    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let value = state.accounts.balance(&ctx.sender, self.coin_to_sell)?;
        if value == 0 {
            return Err(TxError::InsufficientFunds { address: ctx.sender, coin: self.coin_to_sell, needed: 1, has: 0 });
        }
        sell(ctx, state, self.coin_to_sell, self.coin_to_buy, value, self.minimum_value_to_buy)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyCoinData {
    pub coin_to_buy: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value_to_buy: Amount,
    pub coin_to_sell: CoinId,
    #[serde_as(as = "AmountStr")]
    pub maximum_value_to_sell: Amount,
}

impl TxHandler for BuyCoinData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.buy_bancor
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        check_pair(state, self.coin_to_sell, self.coin_to_buy)?;
        let need = quote_exact_out(state, self.coin_to_sell, self.coin_to_buy, self.value_to_buy)?;
        if need > self.maximum_value_to_sell {
            return Err(TxError::MaximumValueToSellReached { maximum: self.maximum_value_to_sell, needed: need });
        }
        state.accounts.sub_balance(&ctx.sender, self.coin_to_sell, need)?;

        let base = if self.coin_to_sell.is_base() {
            need
        } else {
            let base = if self.coin_to_buy.is_base() {
                self.value_to_buy
            } else {
                state.coins.get_live(self.coin_to_buy)?.purchase_amount(self.value_to_buy)?
            };
            state.coins.sub_volume(self.coin_to_sell, need)?;
            state.coins.sub_reserve(self.coin_to_sell, base)?;
            base
        };
        if !self.coin_to_buy.is_base() {
            state.coins.add_reserve(self.coin_to_buy, base)?;
            state.coins.add_volume(self.coin_to_buy, self.value_to_buy)?;
        }
        state.accounts.add_balance(&ctx.sender, self.coin_to_buy, self.value_to_buy)?;
        Ok(vec![tag("tx.coin_to_buy", self.coin_to_buy), tag("tx.coin_to_sell", self.coin_to_sell), tag("tx.return", need)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::coins::NewCoin;
    use crate::types::coins;

    fn curve(st: &mut State, id: u32, crr: u32) -> CoinId {
        let id = CoinId(id);
        st.coins
            .insert(
                id,
                NewCoin {
                    symbol: format!("COIN{}", id.0),
                    name: String::new(),
                    volume: coins(1_000),
                    reserve: coins(20_000),
                    crr,
                    max_supply: coins(1_000_000),
                    mintable: false,
                    burnable: false,
                    owner: None,
                },
            )
            .unwrap();
        id
    }

    #[test]
    fn exact_in_then_exact_out_agree() {
        let mut st = State::in_memory(0);
        let a = curve(&mut st, 1, 50);
        let b = curve(&mut st, 2, 30);
        let need = quote_exact_out(&st, a, b, coins(5)).unwrap();
        let got = convert_exact_in(&mut st.clone(), a, b, need).unwrap();
        assert!(got >= coins(5));
    }

    #[test]
    fn selling_below_minimum_reserve_fails() {
        let mut st = State::in_memory(0);
        let a = curve(&mut st, 1, 100);
        // linear curve: 1 coin = 20 base, 600 coins release 12000 base
        assert_eq!(sell_for_base(&mut st, a, coins(600)).unwrap_err().code(), 115);
        assert_eq!(sell_for_base(&mut st, a, coins(100)).unwrap(), coins(2_000));
    }
}
