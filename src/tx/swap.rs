// src/tx/swap.rs

//! Pool creation, liquidity provision and routed swaps.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::debug;

use crate::error::TxError;
use crate::state::coins::{NewCoin, MAX_COIN_SUPPLY};
use crate::state::commission::PriceTable;
use crate::state::swap::{initial_liquidity, validate_route, Pool, MINIMUM_LIQUIDITY};
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, AmountStr, CoinId, PairKey};

pub fn liquidity_symbol(pool_id: u32) -> String {
    format!("LP-{pool_id}")
}

fn route_price(base: Amount, delta: Amount, route: &[CoinId]) -> Amount {
    let extra_hops = route.len().saturating_sub(2) as Amount;
    base.saturating_add(delta.saturating_mul(extra_hops))
}

fn require_route(state: &State, route: &[CoinId]) -> Result<(), TxError> {
    validate_route(route)?;
    for c in route {
        state.require_coin(*c)?;
    }
    Ok(())
}

/// `(coin0, coin1)` amounts reordered from the caller's order into the pool's.
fn in_pool_order(pool: &Pool, first: CoinId, a: Amount, b: Amount) -> (Amount, Amount) {
    if first == pool.coin0 {
        (a, b)
    } else {
        (b, a)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSwapPoolData {
    pub coin0: CoinId,
    pub coin1: CoinId,
    #[serde_as(as = "AmountStr")]
    pub volume0: Amount,
    #[serde_as(as = "AmountStr")]
    pub volume1: Amount,
}

impl TxHandler for CreateSwapPoolData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.create_swap_pool
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.coin0 == self.coin1 {
            return Err(TxError::CrossConvert(self.coin0));
        }
        state.require_coin(self.coin0)?;
        state.require_coin(self.coin1)?;
        if state.swap.get(self.coin0, self.coin1)?.is_some() {
            return Err(TxError::PairAlreadyExists(self.coin0, self.coin1));
        }
        let liquidity = initial_liquidity(self.volume0, self.volume1).ok_or(TxError::InsufficientLiquidityMinted)?;
        if liquidity <= MINIMUM_LIQUIDITY {
            return Err(TxError::InsufficientLiquidityMinted);
        }

        state.accounts.sub_balance(&ctx.sender, self.coin0, self.volume0)?;
        state.accounts.sub_balance(&ctx.sender, self.coin1, self.volume1)?;

        let pool_id = state.app.next_pool_id()?;
        let lp = state.app.next_coin_id()?;
        state.coins.insert(
            lp,
            NewCoin {
                symbol: liquidity_symbol(pool_id),
                name: format!("Liquidity pool {pool_id}"),
                volume: liquidity,
                reserve: 0,
                crr: 0,
                max_supply: MAX_COIN_SUPPLY,
                mintable: false,
                burnable: false,
                owner: None,
            },
        )?;

        let PairKey(coin0, coin1) = PairKey::new(self.coin0, self.coin1);
        let mut pool = Pool { id: pool_id, coin0, coin1, reserve0: 0, reserve1: 0, liquidity_coin: lp, liquidity };
        let (r0, r1) = in_pool_order(&pool, self.coin0, self.volume0, self.volume1);
        pool.reserve0 = r0;
        pool.reserve1 = r1;
        state.swap.put(pool);

        state.accounts.add_balance(&ctx.sender, lp, liquidity - MINIMUM_LIQUIDITY)?;
        state.accounts.add_balance(&Address::ZERO, lp, MINIMUM_LIQUIDITY)?;
        debug!(pool = pool_id, %coin0, %coin1, %liquidity, "swap pool created");
        Ok(vec![
            tag("tx.pool_id", pool_id),
            tag("tx.pool_token_id", lp),
            tag("tx.liquidity", liquidity - MINIMUM_LIQUIDITY),
        ])
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddLiquidityData {
    pub coin0: CoinId,
    pub coin1: CoinId,
    #[serde_as(as = "AmountStr")]
    pub volume0: Amount,
    #[serde_as(as = "AmountStr")]
    pub maximum_volume1: Amount,
}

impl TxHandler for AddLiquidityData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.add_liquidity
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.coin0 == self.coin1 {
            return Err(TxError::CrossConvert(self.coin0));
        }
        let mut pool = state.swap.get_or_err(self.coin0, self.coin1)?;
        let (amount0, amount1, minted) = pool.calculate_mint(self.coin0, self.volume0, self.maximum_volume1)?;

        state.accounts.sub_balance(&ctx.sender, self.coin0, amount0)?;
        state.accounts.sub_balance(&ctx.sender, self.coin1, amount1)?;
        let (d0, d1) = in_pool_order(&pool, self.coin0, amount0, amount1);
        pool.reserve0 += d0;
        pool.reserve1 += d1;
        pool.liquidity += minted;
        let lp = pool.liquidity_coin;
        state.swap.put(pool);

        state.coins.add_volume(lp, minted)?;
        state.accounts.add_balance(&ctx.sender, lp, minted)?;
        Ok(vec![tag("tx.pool_token_id", lp), tag("tx.liquidity", minted), tag("tx.volume1", amount1)])
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLiquidityData {
    pub coin0: CoinId,
    pub coin1: CoinId,
    #[serde_as(as = "AmountStr")]
    pub liquidity: Amount,
    #[serde_as(as = "AmountStr")]
    pub minimum_volume0: Amount,
    #[serde_as(as = "AmountStr")]
    pub minimum_volume1: Amount,
}

impl TxHandler for RemoveLiquidityData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.remove_liquidity
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.coin0 == self.coin1 {
            return Err(TxError::CrossConvert(self.coin0));
        }
        let mut pool = state.swap.get_or_err(self.coin0, self.coin1)?;
        let lp = pool.liquidity_coin;
        let has = state.accounts.balance(&ctx.sender, lp)?;
        if has < self.liquidity {
            return Err(TxError::InsufficientLiquidityBalance { has, requested: self.liquidity });
        }
        let (out0, out1) = pool.calculate_burn(self.liquidity)?;
        // back into the caller's coin order
        let (v0, v1) = in_pool_order(&pool, self.coin0, out0, out1);
        if v0 < self.minimum_volume0 {
            return Err(TxError::MinimumValueToBuyReached { minimum: self.minimum_volume0, got: v0 });
        }
        if v1 < self.minimum_volume1 {
            return Err(TxError::MinimumValueToBuyReached { minimum: self.minimum_volume1, got: v1 });
        }

        state.accounts.sub_balance(&ctx.sender, lp, self.liquidity)?;
        state.coins.sub_volume(lp, self.liquidity)?;
        pool.reserve0 -= out0;
        pool.reserve1 -= out1;
        pool.liquidity -= self.liquidity;
        state.swap.put(pool);

        state.accounts.add_balance(&ctx.sender, self.coin0, v0)?;
        state.accounts.add_balance(&ctx.sender, self.coin1, v1)?;
        Ok(vec![tag("tx.volume0", v0), tag("tx.volume1", v1)])
    }
}

fn sell_route(ctx: &Exec<'_>, state: &mut State, route: &[CoinId], value: Amount, min: Amount) -> Result<Tags, TxError> {
    require_route(state, route)?;
    let (first, last) = (route[0], route[route.len() - 1]);
    state.accounts.sub_balance(&ctx.sender, first, value)?;
    let out = state.swap.execute_route(route, value)?;
    if out < min {
        return Err(TxError::MinimumValueToBuyReached { minimum: min, got: out });
    }
    state.accounts.add_balance(&ctx.sender, last, out)?;
    Ok(vec![tag("tx.coin_to_sell", first), tag("tx.coin_to_buy", last), tag("tx.return", out)])
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellSwapPoolData {
    pub coins: Vec<CoinId>,
    #[serde_as(as = "AmountStr")]
    pub value_to_sell: Amount,
    #[serde_as(as = "AmountStr")]
    pub minimum_value_to_buy: Amount,
}

impl TxHandler for SellSwapPoolData {
    fn price(&self, prices: &PriceTable) -> Amount {
        route_price(prices.sell_pool_base, prices.sell_pool_delta, &self.coins)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        sell_route(ctx, state, &self.coins, self.value_to_sell, self.minimum_value_to_buy)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellAllSwapPoolData {
    pub coins: Vec<CoinId>,
    #[serde_as(as = "AmountStr")]
    pub minimum_value_to_buy: Amount,
}

impl TxHandler for SellAllSwapPoolData {
    fn price(&self, prices: &PriceTable) -> Amount {
        route_price(prices.sell_all_pool_base, prices.sell_all_pool_delta, &self.coins)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        require_route(state, &self.coins)?;
        let first = self.coins[0];
        let value = state.accounts.balance(&ctx.sender, first)?;
        if value == 0 {
            return Err(TxError::InsufficientFunds { address: ctx.sender, coin: first, needed: 1, has: 0 });
        }
        sell_route(ctx, state, &self.coins, value, self.minimum_value_to_buy)
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuySwapPoolData {
    pub coins: Vec<CoinId>,
    #[serde_as(as = "AmountStr")]
    pub value_to_buy: Amount,
    #[serde_as(as = "AmountStr")]
    pub maximum_value_to_sell: Amount,
}

impl TxHandler for BuySwapPoolData {
    fn price(&self, prices: &PriceTable) -> Amount {
        route_price(prices.buy_pool_base, prices.buy_pool_delta, &self.coins)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        require_route(state, &self.coins)?;
        let ins = state.swap.quote_buy(&self.coins, self.value_to_buy)?;
        let need = ins[0];
        if need > self.maximum_value_to_sell {
            return Err(TxError::MaximumValueToSellReached { maximum: self.maximum_value_to_sell, needed: need });
        }
        let (first, last) = (self.coins[0], self.coins[self.coins.len() - 1]);
        state.accounts.sub_balance(&ctx.sender, first, need)?;
        // rounding up on every hop may deliver slightly more than asked
        let out = state.swap.execute_route(&self.coins, need)?;
        if out < self.value_to_buy {
            return Err(TxError::InsufficientOutputAmount);
        }
        state.accounts.add_balance(&ctx.sender, last, out)?;
        Ok(vec![tag("tx.coin_to_sell", first), tag("tx.coin_to_buy", last), tag("tx.return", need)])
    }
}
