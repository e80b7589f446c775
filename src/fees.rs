// src/fees.rs

//! Commission pricing: what a transaction costs in base coin, and how the
//! payer's gas coin is converted to cover it.

use serde::{Deserialize, Serialize};

use crate::error::TxError;
use crate::pos::candidates::mul_div;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::types::{Address, Amount, CoinId};

/// Liquidity that converts the gas coin into base.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CommissionSource {
    Base,
    Bancor,
    Pool,
}

impl CommissionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionSource::Base => "base",
            CommissionSource::Bancor => "bancor",
            CommissionSource::Pool => "pool",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommissionQuote {
    pub coin: CoinId,
    /// Amount of `coin` debited from the payer.
    pub value: Amount,
    /// Amount of base released to the reward accumulator.
    pub base: Amount,
    pub source: CommissionSource,
}

/// Table price plus per-byte cost of the free-form fields, in the table's coin.
pub fn table_price(prices: &PriceTable, type_price: Amount, extra_bytes: usize, gas_price: u64) -> Amount {
    let bytes = prices.payload_byte.saturating_mul(extra_bytes as Amount);
    type_price.saturating_add(bytes).saturating_mul(Amount::from(gas_price))
}

/// Converts a table-denominated price into base using the spot price of
/// the reference coin / base pool. Without that pool the table is read as base.
pub fn to_base(state: &State, prices: &PriceTable, value: Amount) -> Result<Amount, TxError> {
    if prices.coin.is_base() {
        return Ok(value);
    }
    match state.swap.get(prices.coin, CoinId::BASE)? {
        Some(pool) => {
            let (r_ref, r_base) = pool.reserves_for(prices.coin);
            Ok(mul_div(value, r_base, r_ref))
        }
        None => Ok(value),
    }
}

/// Prices `base` in `gas_coin`. With two viable sources the cheaper one wins, ties go to the curve.
pub fn quote(state: &State, gas_coin: CoinId, base: Amount) -> Result<CommissionQuote, TxError> {
    if gas_coin.is_base() || base == 0 {
        return Ok(CommissionQuote { coin: gas_coin, value: base, base, source: CommissionSource::Base });
    }
    let coin = state.coins.get_live(gas_coin)?;

    let bancor = if coin.has_reserve() {
        coin.sale_amount(base).and_then(|v| coin.check_reserve_after(base).map(|_| v))
    } else {
        Err(TxError::CoinHasNoReserve(gas_coin))
    };
    let pool = match state.swap.get(gas_coin, CoinId::BASE)? {
        Some(p) => p
            .calculate_sell_for_buy(gas_coin, base)
            .and_then(|v| p.add_swap_step(gas_coin, v, base).map(|_| v)),
        None => Err(TxError::PairNotExists(gas_coin, CoinId::BASE)),
    };

    let pick = |value, source| CommissionQuote { coin: gas_coin, value, base, source };
    match (bancor, pool) {
        (Ok(b), Ok(p)) if p < b => Ok(pick(p, CommissionSource::Pool)),
        (Ok(b), _) => Ok(pick(b, CommissionSource::Bancor)),
        (Err(_), Ok(p)) => Ok(pick(p, CommissionSource::Pool)),
        (Err(eb), Err(ep)) => Err(TxError::CommissionCoinNotSufficient {
            coin: gas_coin,
            reason: format!("bancor: {eb}; pool: {ep}"),
        }),
    }
}

/// Debits the quoted commission from `payer` and moves the liquidity it
/// was quoted against. The base amount is the caller's to credit.
pub fn charge(state: &mut State, payer: &Address, q: &CommissionQuote) -> Result<(), TxError> {
    state.accounts.sub_balance(payer, q.coin, q.value)?;
    match q.source {
        CommissionSource::Base => {}
        CommissionSource::Bancor => {
            state.coins.sub_volume(q.coin, q.value)?;
            state.coins.sub_reserve(q.coin, q.base)?;
        }
        CommissionSource::Pool => {
            let pool = state.swap.get_or_err(q.coin, CoinId::BASE)?;
            let next = pool.add_swap_step(q.coin, q.value, q.base)?;
            state.swap.put(next);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::coins::NewCoin;
    use crate::state::swap::Pool;
    use crate::types::coins;

    fn with_coin(st: &mut State, reserve: Amount) -> CoinId {
        let id = CoinId(1);
        st.coins
            .insert(
                id,
                NewCoin {
                    symbol: "GAS".into(),
                    name: String::new(),
                    volume: coins(1_000),
                    reserve,
                    crr: 100,
                    max_supply: coins(1_000_000),
                    mintable: false,
                    burnable: false,
                    owner: None,
                },
            )
            .unwrap();
        id
    }

    fn with_pool(st: &mut State, coin: CoinId, r_coin: Amount, r_base: Amount) {
        st.swap.put(Pool {
            id: 1,
            coin0: CoinId::BASE,
            coin1: coin,
            reserve0: r_base,
            reserve1: r_coin,
            liquidity_coin: CoinId(9),
            liquidity: coins(1),
        });
    }

    #[test]
    fn base_gas_is_taken_as_is() {
        let st = State::in_memory(0);
        let q = quote(&st, CoinId::BASE, 7).unwrap();
        assert_eq!((q.value, q.source), (7, CommissionSource::Base));
    }

    #[test]
    fn cheaper_source_wins() {
        let mut st = State::in_memory(0);
        // curve price 1000 coins : 20000 base, i.e. 1 coin = 20 base
        let id = with_coin(&mut st, coins(20_000));
        let q = quote(&st, id, coins(1)).unwrap();
        assert_eq!(q.source, CommissionSource::Bancor);
        assert_eq!(q.value, coins(1) / 20);

        // pool price 1 coin = 100 base beats the curve
        with_pool(&mut st, id, coins(10), coins(1_000));
        let q = quote(&st, id, coins(1)).unwrap();
        assert_eq!(q.source, CommissionSource::Pool);
        assert!(q.value < coins(1) / 20);
    }

    #[test]
    fn curve_at_minimum_reserve_falls_back_to_pool_or_fails() {
        let mut st = State::in_memory(0);
        let id = with_coin(&mut st, coins(10_000));
        let err = quote(&st, id, coins(1)).unwrap_err();
        assert_eq!(err.code(), 118);
        with_pool(&mut st, id, coins(1_000), coins(1_000));
        assert_eq!(quote(&st, id, coins(1)).unwrap().source, CommissionSource::Pool);
    }

    #[test]
    fn charge_moves_curve_liquidity() {
        let mut st = State::in_memory(0);
        let id = with_coin(&mut st, coins(20_000));
        let payer = Address([1; 20]);
        st.accounts.add_balance(&payer, id, coins(1_000)).unwrap();
        let q = quote(&st, id, coins(20)).unwrap();
        charge(&mut st, &payer, &q).unwrap();
        let c = st.coins.get_live(id).unwrap();
        assert_eq!(c.reserve, coins(20_000) - coins(20));
        assert_eq!(c.volume, coins(1_000) - q.value);
        assert_eq!(st.accounts.balance(&payer, id).unwrap(), coins(1_000) - q.value);
    }

    #[test]
    fn reference_coin_prices_follow_spot() {
        let mut st = State::in_memory(0);
        let id = with_coin(&mut st, coins(20_000));
        let table = PriceTable { coin: id, ..PriceTable::default() };
        assert_eq!(to_base(&st, &table, 10).unwrap(), 10);
        with_pool(&mut st, id, coins(10), coins(30));
        assert_eq!(to_base(&st, &table, 10).unwrap(), 30);
        assert_eq!(table_price(&table, 5, 2, 3), (5 + 2 * table.payload_byte) * 3);
    }
}
