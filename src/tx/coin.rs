// src/tx/coin.rs

//! Coin and token lifecycle: creation, recreation, ownership, mint and burn.

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::debug;

use crate::error::TxError;
use crate::state::coins::{Coin, NewCoin};
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, AmountStr, CoinId};

fn owned_by(state: &State, symbol: &str, who: &Address) -> Result<Coin, TxError> {
    let id = state.coins.id_by_symbol(symbol)?.ok_or_else(|| TxError::CoinNotExists(symbol.to_string()))?;
    let coin = state.coins.get_live(id)?;
    if coin.owner.as_ref() != Some(who) {
        return Err(TxError::IsNotOwnerOfCoin(symbol.to_string()));
    }
    Ok(coin)
}

fn created_tags(coin: &Coin) -> Tags {
    vec![tag("tx.coin_id", coin.id), tag("tx.coin_symbol", &coin.symbol)]
}

/// Pays the reserve, registers the coin and credits the initial volume.
fn create(ctx: &Exec<'_>, state: &mut State, new_coin: NewCoin) -> Result<Coin, TxError> {
    new_coin.validate()?;
    if state.coins.symbol_taken(&new_coin.symbol)? {
        return Err(TxError::CoinAlreadyExists(new_coin.symbol));
    }
    if new_coin.reserve > 0 {
        state.accounts.sub_balance(&ctx.sender, CoinId::BASE, new_coin.reserve)?;
    }
    let volume = new_coin.volume;
    let id = state.app.next_coin_id()?;
    let coin = state.coins.insert(id, new_coin)?;
    state.accounts.add_balance(&ctx.sender, id, volume)?;
    debug!(coin = %id, symbol = %coin.symbol, "coin created");
    Ok(coin)
}

fn recreate(ctx: &Exec<'_>, state: &mut State, new_coin: NewCoin) -> Result<Coin, TxError> {
    new_coin.validate()?;
    owned_by(state, &new_coin.symbol, &ctx.sender)?;
    if new_coin.reserve > 0 {
        state.accounts.sub_balance(&ctx.sender, CoinId::BASE, new_coin.reserve)?;
    }
    let volume = new_coin.volume;
    let id = state.app.next_coin_id()?;
    let (old, new) = state.coins.recreate(id, new_coin)?;
    state.accounts.add_balance(&ctx.sender, id, volume)?;
    debug!(old = %old.id, archived_as = %old.full_symbol(), new = %id, "coin recreated");
    Ok(new)
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCoinData {
    pub name: String,
    pub symbol: String,
    #[serde_as(as = "AmountStr")]
    pub initial_amount: Amount,
    #[serde_as(as = "AmountStr")]
    pub initial_reserve: Amount,
    pub crr: u32,
    #[serde_as(as = "AmountStr")]
    pub max_supply: Amount,
}

impl CreateCoinData {
    fn new_coin(&self, owner: Address) -> NewCoin {
        NewCoin {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            volume: self.initial_amount,
            reserve: self.initial_reserve,
            crr: self.crr,
            max_supply: self.max_supply,
            mintable: false,
            burnable: false,
            owner: Some(owner),
        }
    }

    fn validate_crr(&self) -> Result<(), TxError> {
        // a zero crr would silently create a token
        if self.crr == 0 {
            return Err(TxError::WrongCrr(0));
        }
        Ok(())
    }
}

impl TxHandler for CreateCoinData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.ticker_price(&self.symbol).saturating_add(prices.create_coin)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        self.validate_crr()?;
        let coin = create(ctx, state, self.new_coin(ctx.sender))?;
        Ok(created_tags(&coin))
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecreateCoinData {
    pub name: String,
    pub symbol: String,
    #[serde_as(as = "AmountStr")]
    pub initial_amount: Amount,
    #[serde_as(as = "AmountStr")]
    pub initial_reserve: Amount,
    pub crr: u32,
    #[serde_as(as = "AmountStr")]
    pub max_supply: Amount,
}

impl TxHandler for RecreateCoinData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.recreate_coin
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        if self.crr == 0 {
            return Err(TxError::WrongCrr(0));
        }
        let new_coin = NewCoin {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            volume: self.initial_amount,
            reserve: self.initial_reserve,
            crr: self.crr,
            max_supply: self.max_supply,
            mintable: false,
            burnable: false,
            owner: Some(ctx.sender),
        };
        let coin = recreate(ctx, state, new_coin)?;
        Ok(created_tags(&coin))
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateTokenData {
    pub name: String,
    pub symbol: String,
    #[serde_as(as = "AmountStr")]
    pub initial_amount: Amount,
    #[serde_as(as = "AmountStr")]
    pub max_supply: Amount,
    pub mintable: bool,
    pub burnable: bool,
}

impl CreateTokenData {
    fn new_coin(&self, owner: Address) -> NewCoin {
        NewCoin {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            volume: self.initial_amount,
            reserve: 0,
            crr: 0,
            max_supply: self.max_supply,
            mintable: self.mintable,
            burnable: self.burnable,
            owner: Some(owner),
        }
    }
}

impl TxHandler for CreateTokenData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.ticker_price(&self.symbol).saturating_add(prices.create_token)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let coin = create(ctx, state, self.new_coin(ctx.sender))?;
        Ok(created_tags(&coin))
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecreateTokenData {
    pub name: String,
    pub symbol: String,
    #[serde_as(as = "AmountStr")]
    pub initial_amount: Amount,
    #[serde_as(as = "AmountStr")]
    pub max_supply: Amount,
    pub mintable: bool,
    pub burnable: bool,
}

impl TxHandler for RecreateTokenData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.recreate_token
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let new_coin = NewCoin {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            volume: self.initial_amount,
            reserve: 0,
            crr: 0,
            max_supply: self.max_supply,
            mintable: self.mintable,
            burnable: self.burnable,
            owner: Some(ctx.sender),
        };
        let coin = recreate(ctx, state, new_coin)?;
        Ok(created_tags(&coin))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditCoinOwnerData {
    pub symbol: String,
    pub new_owner: Address,
}

impl TxHandler for EditCoinOwnerData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.edit_ticker_owner
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let coin = owned_by(state, &self.symbol, &ctx.sender)?;
        state.coins.set_owner(coin.id, self.new_owner)?;
        Ok(vec![tag("tx.coin_id", coin.id), tag("tx.new_owner", self.new_owner)])
    }
}

fn token(state: &State, id: CoinId) -> Result<Coin, TxError> {
    if id.is_base() {
        return Err(TxError::CoinIsNotToken(id));
    }
    let coin = state.coins.get_live(id)?;
    if !coin.is_token() {
        return Err(TxError::CoinIsNotToken(id));
    }
    Ok(coin)
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintTokenData {
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

impl TxHandler for MintTokenData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.mint_token
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let coin = token(state, self.coin)?;
        if !coin.mintable {
            return Err(TxError::CoinNotMintable(self.coin));
        }
        if coin.owner != Some(ctx.sender) {
            return Err(TxError::IsNotOwnerOfCoin(coin.full_symbol()));
        }
        state.coins.add_volume(self.coin, self.value)?;
        state.accounts.add_balance(&ctx.sender, self.coin, self.value)?;
        Ok(vec![tag("tx.coin_id", self.coin)])
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnTokenData {
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
}

impl TxHandler for BurnTokenData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.burn_token
    }

    /// Any holder may burn a burnable token, from their own balance only.
    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let coin = token(state, self.coin)?;
        if !coin.burnable {
            return Err(TxError::CoinNotBurnable(self.coin));
        }
        state.accounts.sub_balance(&ctx.sender, self.coin, self.value)?;
        state.coins.sub_volume(self.coin, self.value)?;
        Ok(vec![tag("tx.coin_id", self.coin)])
    }
}
