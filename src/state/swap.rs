// src/state/swap.rs

//! Constant-product pools keyed by ordered coin pair.

use std::collections::BTreeMap;

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{Amount, AmountStr, CoinId, PairKey};

/// Liquidity locked forever to the zero address on the first mint.
pub const MINIMUM_LIQUIDITY: Amount = 1_000;
pub const MAX_ROUTE_COINS: usize = 5;

const FEE_NUM: u64 = 9_970;
const FEE_DEN: u64 = 10_000;

fn to_amount(x: U256) -> Option<Amount> {
    if x.bits() > 128 {
        None
    } else {
        Some(x.low_u128())
    }
}

/// Output for an exact input, 0.3% fee skimmed from the input.
pub fn amount_out(reserve_in: Amount, reserve_out: Amount, amount_in: Amount) -> Option<Amount> {
    if amount_in == 0 || reserve_in == 0 || reserve_out == 0 {
        return None;
    }
    let in_fee = U256::from(amount_in) * U256::from(FEE_NUM);
    let num = U256::from(reserve_out) * in_fee;
    let den = U256::from(reserve_in) * U256::from(FEE_DEN) + in_fee;
    to_amount(num / den)
}

/// Input needed for an exact output, rounded up by one unit.
pub fn amount_in(reserve_in: Amount, reserve_out: Amount, amount_out: Amount) -> Option<Amount> {
    if amount_out == 0 || reserve_in == 0 || amount_out >= reserve_out {
        return None;
    }
    let num = U256::from(reserve_in) * U256::from(amount_out) * U256::from(FEE_DEN);
    let den = U256::from(reserve_out - amount_out) * U256::from(FEE_NUM);
    to_amount(num / den + U256::one())
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: u32,
    pub coin0: CoinId,
    pub coin1: CoinId,
    #[serde_as(as = "AmountStr")]
    pub reserve0: Amount,
    #[serde_as(as = "AmountStr")]
    pub reserve1: Amount,
    pub liquidity_coin: CoinId,
    /// Mirrors the volume of the liquidity coin.
    #[serde_as(as = "AmountStr")]
    pub liquidity: Amount,
}

impl Pool {
    pub fn pair(&self) -> PairKey {
        PairKey(self.coin0, self.coin1)
    }

    pub fn reserve_of(&self, coin: CoinId) -> Amount {
        if coin == self.coin0 {
            self.reserve0
        } else {
            self.reserve1
        }
    }

    /// `(reserve_in, reserve_out)` for a swap paying `coin_in`.
    pub fn reserves_for(&self, coin_in: CoinId) -> (Amount, Amount) {
        if coin_in == self.coin0 {
            (self.reserve0, self.reserve1)
        } else {
            (self.reserve1, self.reserve0)
        }
    }

    pub fn other(&self, coin: CoinId) -> CoinId {
        if coin == self.coin0 {
            self.coin1
        } else {
            self.coin0
        }
    }

    fn product(&self) -> U256 {
        U256::from(self.reserve0) * U256::from(self.reserve1)
    }

    /// Output of selling `amount` of `coin_in` into this pool.
    pub fn calculate_buy_for_sell(&self, coin_in: CoinId, amount: Amount) -> Result<Amount, TxError> {
        let (r_in, r_out) = self.reserves_for(coin_in);
        let out = amount_out(r_in, r_out, amount).ok_or(TxError::InsufficientInputAmount)?;
        if out == 0 || out >= r_out {
            return Err(TxError::InsufficientLiquidity(self.coin0, self.coin1));
        }
        Ok(out)
    }

    /// Input of `coin_in` needed to receive exactly `amount` of the other coin.
    pub fn calculate_sell_for_buy(&self, coin_in: CoinId, amount: Amount) -> Result<Amount, TxError> {
        let (r_in, r_out) = self.reserves_for(coin_in);
        if amount == 0 {
            return Err(TxError::InsufficientOutputAmount);
        }
        amount_in(r_in, r_out, amount).ok_or(TxError::InsufficientLiquidity(self.coin0, self.coin1))
    }

    /// The pool after one swap step `amount_in` of `coin_in` for `amount_out`.
    /// Fails if the constant product would decrease.
    pub fn add_swap_step(&self, coin_in: CoinId, amount_in: Amount, amount_out: Amount) -> Result<Pool, TxError> {
        let mut next = self.clone();
        let broken = || TxError::ConstantProductViolated(self.coin0, self.coin1);
        if coin_in == self.coin0 {
            next.reserve0 = next.reserve0.checked_add(amount_in).ok_or_else(broken)?;
            next.reserve1 = next.reserve1.checked_sub(amount_out).ok_or(TxError::InsufficientLiquidity(self.coin0, self.coin1))?;
        } else {
            next.reserve1 = next.reserve1.checked_add(amount_in).ok_or_else(broken)?;
            next.reserve0 = next.reserve0.checked_sub(amount_out).ok_or(TxError::InsufficientLiquidity(self.coin0, self.coin1))?;
        }
        if next.reserve0 == 0 || next.reserve1 == 0 {
            return Err(TxError::InsufficientLiquidity(self.coin0, self.coin1));
        }
        if next.product() < self.product() {
            return Err(broken());
        }
        Ok(next)
    }

    /// Deposit of `amount` of `coin` at the current ratio: returns the amount
    /// taken, the matching amount of the other coin and the liquidity minted.
    pub fn calculate_mint(&self, coin: CoinId, amount: Amount, max_other: Amount) -> Result<(Amount, Amount, Amount), TxError> {
        let (r_this, r_other) = self.reserves_for(coin);
        if r_this == 0 || self.liquidity == 0 {
            return Err(TxError::InsufficientLiquidity(self.coin0, self.coin1));
        }
        let other = to_amount(U256::from(amount) * U256::from(r_other) / U256::from(r_this) + U256::one())
            .ok_or(TxError::InsufficientInputAmount)?;
        if other > max_other {
            return Err(TxError::MaximumValueToSellReached { maximum: max_other, needed: other });
        }
        let liquidity = to_amount(U256::from(amount) * U256::from(self.liquidity) / U256::from(r_this))
            .ok_or(TxError::InsufficientLiquidityMinted)?;
        if liquidity == 0 {
            return Err(TxError::InsufficientLiquidityMinted);
        }
        Ok((amount, other, liquidity))
    }

    /// Amounts of `(coin0, coin1)` released for burning `liquidity`.
    pub fn calculate_burn(&self, liquidity: Amount) -> Result<(Amount, Amount), TxError> {
        if liquidity == 0 || liquidity > self.liquidity {
            return Err(TxError::InsufficientLiquidityBurned);
        }
        let total = U256::from(self.liquidity);
        let a0 = to_amount(U256::from(liquidity) * U256::from(self.reserve0) / total)
            .ok_or(TxError::InsufficientLiquidityBurned)?;
        let a1 = to_amount(U256::from(liquidity) * U256::from(self.reserve1) / total)
            .ok_or(TxError::InsufficientLiquidityBurned)?;
        if a0 == 0 || a1 == 0 {
            return Err(TxError::InsufficientLiquidityBurned);
        }
        Ok((a0, a1))
    }
}

/// `sqrt(a * b)`, the liquidity minted by the first deposit.
pub fn initial_liquidity(a: Amount, b: Amount) -> Option<Amount> {
    to_amount((U256::from(a) * U256::from(b)).integer_sqrt())
}

/// Checks a route of 2..=5 distinct-per-hop coins.
pub fn validate_route(coins: &[CoinId]) -> Result<(), TxError> {
    if coins.len() < 2 {
        return Err(TxError::WrongRoute("route needs at least two coins".into()));
    }
    if coins.len() > MAX_ROUTE_COINS {
        return Err(TxError::WrongRoute(format!("route longer than {MAX_ROUTE_COINS} coins")));
    }
    for hop in coins.windows(2) {
        if hop[0] == hop[1] {
            return Err(TxError::CrossConvert(hop[0]));
        }
    }
    if coins.first() == coins.last() {
        return Err(TxError::CrossConvert(coins[0]));
    }
    Ok(())
}

#[derive(Clone)]
pub struct Swap {
    store: StoreView,
    pools: Overlay<PairKey, Pool>,
    ids: Overlay<u32, PairKey>,
}

journaled!(Swap => pools, ids);

impl Swap {
    pub fn new(store: StoreView) -> Self {
        Self {
            pools: Overlay::new(vec![keys::POOL], keys::pool, keys::pool_pair),
            ids: Overlay::new(vec![keys::POOL_ID], |id: &u32| keys::pool_id(*id), keys::pool_id_value),
            store,
        }
    }

    pub fn get(&self, a: CoinId, b: CoinId) -> Result<Option<Pool>, TxError> {
        Ok(self.pools.get(&self.store, &PairKey::new(a, b))?)
    }

    pub fn get_or_err(&self, a: CoinId, b: CoinId) -> Result<Pool, TxError> {
        self.get(a, b)?.ok_or(TxError::PairNotExists(a, b))
    }

    pub fn by_id(&self, id: u32) -> Result<Option<Pool>, TxError> {
        match self.ids.get(&self.store, &id)? {
            Some(pair) => Ok(self.pools.get(&self.store, &pair)?),
            None => Ok(None),
        }
    }

    pub fn put(&mut self, pool: Pool) {
        self.ids.set(pool.id, pool.pair());
        self.pools.set(pool.pair(), pool);
    }

    pub fn all(&self) -> Result<BTreeMap<PairKey, Pool>, TxError> {
        Ok(self.pools.all(&self.store)?)
    }

    /// Quotes a multi-hop exact-input swap, returning every hop's output.
    pub fn quote_sell(&self, route: &[CoinId], amount: Amount) -> Result<Vec<Amount>, TxError> {
        validate_route(route)?;
        let mut outs = Vec::with_capacity(route.len() - 1);
        let mut value = amount;
        for hop in route.windows(2) {
            let pool = self.get_or_err(hop[0], hop[1])?;
            value = pool.calculate_buy_for_sell(hop[0], value)?;
            outs.push(value);
        }
        Ok(outs)
    }

    /// Quotes a multi-hop exact-output swap, returning every hop's input (first hop first).
    pub fn quote_buy(&self, route: &[CoinId], amount: Amount) -> Result<Vec<Amount>, TxError> {
        validate_route(route)?;
        let mut ins = vec![0; route.len() - 1];
        let mut value = amount;
        for (i, hop) in route.windows(2).enumerate().rev() {
            let pool = self.get_or_err(hop[0], hop[1])?;
            value = pool.calculate_sell_for_buy(hop[0], value)?;
            ins[i] = value;
        }
        Ok(ins)
    }

    /// Executes a route hop by hop given the per-hop inputs; returns the final output.
    pub fn execute_route(&mut self, route: &[CoinId], first_in: Amount) -> Result<Amount, TxError> {
        validate_route(route)?;
        let mut value = first_in;
        for hop in route.windows(2) {
            let pool = self.get_or_err(hop[0], hop[1])?;
            let out = pool.calculate_buy_for_sell(hop[0], value)?;
            let next = pool.add_swap_step(hop[0], value, out)?;
            self.put(next);
            value = out;
        }
        Ok(value)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        Ok(self.ids.flush(&self.store)? + self.pools.flush(&self.store)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pool(r0: Amount, r1: Amount) -> Pool {
        Pool {
            id: 1,
            coin0: CoinId(0),
            coin1: CoinId(1),
            reserve0: r0,
            reserve1: r1,
            liquidity_coin: CoinId(2),
            liquidity: initial_liquidity(r0, r1).unwrap(),
        }
    }

    #[test]
    fn fee_formula_matches_reference() {
        let p = pool(100, 1000);
        let out = p.calculate_buy_for_sell(CoinId(0), 10).unwrap();
        assert_eq!(out, 1000 * 9970 * 10 / (100 * 10000 + 9970 * 10));
        let next = p.add_swap_step(CoinId(0), 10, out).unwrap();
        assert!(next.product() >= p.product());
    }

    #[test]
    fn exact_out_costs_at_least_exact_in() {
        let p = pool(1_000_000, 3_000_000);
        let need = p.calculate_sell_for_buy(CoinId(0), 30_000).unwrap();
        assert!(p.calculate_buy_for_sell(CoinId(0), need).unwrap() >= 30_000);
        assert!(p.calculate_buy_for_sell(CoinId(0), need - 2).unwrap() < 30_000);
    }

    #[test]
    fn swap_step_rejects_product_decrease() {
        let p = pool(1_000, 1_000);
        let err = p.add_swap_step(CoinId(0), 1, 10).unwrap_err();
        assert_eq!(err.code(), 900);
    }

    #[test]
    fn draining_the_pool_is_rejected() {
        let p = pool(1_000, 1_000);
        assert!(p.calculate_sell_for_buy(CoinId(0), 1_000).is_err());
        assert_eq!(p.add_swap_step(CoinId(0), 1_000_000, 1_000).unwrap_err().code(), 704);
    }

    #[test]
    fn mint_and_burn_are_proportional() {
        let p = pool(1_000_000, 4_000_000);
        assert_eq!(p.liquidity, 2_000_000);
        let (a, b, liq) = p.calculate_mint(CoinId(0), 100_000, 500_000).unwrap();
        assert_eq!((a, b, liq), (100_000, 400_001, 200_000));
        assert_eq!(p.calculate_mint(CoinId(0), 100_000, 400_000).unwrap_err().code(), 301);
        assert_eq!(p.calculate_burn(200_000).unwrap(), (100_000, 400_000));
        assert_eq!(p.calculate_burn(0).unwrap_err().code(), 706);
    }

    #[test]
    fn route_rules() {
        assert!(validate_route(&[CoinId(1), CoinId(2)]).is_ok());
        assert_eq!(validate_route(&[CoinId(1)]).unwrap_err().code(), 708);
        assert_eq!(validate_route(&[CoinId(1), CoinId(1)]).unwrap_err().code(), 302);
        assert_eq!(validate_route(&[CoinId(1), CoinId(2), CoinId(1)]).unwrap_err().code(), 302);
        let long: Vec<CoinId> = (1..=6).map(CoinId).collect();
        assert_eq!(validate_route(&long).unwrap_err().code(), 708);
    }

    proptest! {
        #[test]
        fn product_never_decreases(
            r0 in 1_000u128..1_000_000_000_000u128,
            r1 in 1_000u128..1_000_000_000_000u128,
            swaps in proptest::collection::vec((any::<bool>(), 1u128..1_000_000_000u128), 1..20),
        ) {
            let mut p = pool(r0, r1);
            for (zero_for_one, amount) in swaps {
                let coin_in = if zero_for_one { CoinId(0) } else { CoinId(1) };
                let before = p.product();
                if let Ok(out) = p.calculate_buy_for_sell(coin_in, amount) {
                    p = p.add_swap_step(coin_in, amount, out).unwrap();
                    prop_assert!(p.product() >= before);
                }
            }
        }
    }
}
