// src/state/coins.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use tracing::info;

use crate::error::{StoreError, TxError};
use crate::state::formula;
use crate::state::overlay::{journaled, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{coins, is_valid_symbol, Address, Amount, AmountStr, CoinId};

pub const MIN_COIN_RESERVE: Amount = coins(10_000);
pub const MIN_COIN_SUPPLY: Amount = coins(1);
pub const MAX_COIN_SUPPLY: Amount = coins(1_000_000_000_000_000);
pub const MAX_COIN_NAME_LEN: usize = 64;
pub const MIN_CRR: u32 = 10;
pub const MAX_CRR: u32 = 100;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub id: CoinId,
    pub symbol: String,
    pub name: String,
    #[serde_as(as = "AmountStr")]
    pub volume: Amount,
    #[serde_as(as = "AmountStr")]
    pub reserve: Amount,
    /// 0 for reserve-less tokens.
    pub crr: u32,
    #[serde_as(as = "AmountStr")]
    pub max_supply: Amount,
    pub mintable: bool,
    pub burnable: bool,
    pub owner: Option<Address>,
    /// 0 for the live coin, archive number otherwise.
    pub version: u32,
    pub deleted: bool,
}

impl Coin {
    pub fn is_token(&self) -> bool {
        self.crr == 0 && !self.id.is_base()
    }

    pub fn has_reserve(&self) -> bool {
        self.crr > 0
    }

    pub fn full_symbol(&self) -> String {
        if self.version == 0 {
            self.symbol.clone()
        } else {
            format!("{}-{}", self.symbol, self.version)
        }
    }

    fn require_reserve(&self) -> Result<(), TxError> {
        if self.has_reserve() {
            Ok(())
        } else {
            Err(TxError::CoinHasNoReserve(self.id))
        }
    }

    /// Base released for selling `amount` of this coin.
    pub fn sale_return(&self, amount: Amount) -> Result<Amount, TxError> {
        self.require_reserve()?;
        formula::sale_return(self.volume, self.reserve, self.crr, amount).ok_or(TxError::CoinReserveNotSufficient {
            has: self.volume,
            required: amount,
        })
    }

    /// Coins burned to release `want` base.
    pub fn sale_amount(&self, want: Amount) -> Result<Amount, TxError> {
        self.require_reserve()?;
        formula::sale_amount(self.volume, self.reserve, self.crr, want).ok_or(TxError::CoinReserveNotSufficient {
            has: self.reserve,
            required: want,
        })
    }

    /// Coins minted for depositing `deposit` base.
    pub fn purchase_return(&self, deposit: Amount) -> Result<Amount, TxError> {
        self.require_reserve()?;
        formula::purchase_return(self.volume, self.reserve, self.crr, deposit)
            .ok_or(TxError::CoinSupplyOverflow { max: self.max_supply, resulting: Amount::MAX })
    }

    /// Base needed to mint exactly `want` coins.
    pub fn purchase_amount(&self, want: Amount) -> Result<Amount, TxError> {
        self.require_reserve()?;
        formula::purchase_amount(self.volume, self.reserve, self.crr, want)
            .ok_or(TxError::CoinReserveOverflow { coin: self.id })
    }

    /// Fails when removing `amount` from the reserve would leave less than the minimum.
    pub fn check_reserve_after(&self, amount: Amount) -> Result<(), TxError> {
        let after = self.reserve.saturating_sub(amount);
        if amount > self.reserve || after < MIN_COIN_RESERVE {
            return Err(TxError::CoinReserveUnderflow { reserve_after: after, min: MIN_COIN_RESERVE });
        }
        Ok(())
    }

    pub fn check_supply_after(&self, added: Amount) -> Result<(), TxError> {
        let resulting = self.volume.saturating_add(added);
        if resulting > self.max_supply {
            return Err(TxError::CoinSupplyOverflow { max: self.max_supply, resulting });
        }
        Ok(())
    }
}

/// Parameters of a new coin or token, before an id is assigned.
#[derive(Clone, Debug)]
pub struct NewCoin {
    pub symbol: String,
    pub name: String,
    pub volume: Amount,
    pub reserve: Amount,
    pub crr: u32,
    pub max_supply: Amount,
    pub mintable: bool,
    pub burnable: bool,
    pub owner: Option<Address>,
}

impl NewCoin {
    pub fn validate(&self) -> Result<(), TxError> {
        if !is_valid_symbol(&self.symbol) {
            return Err(TxError::InvalidCoinSymbol(self.symbol.clone()));
        }
        if self.name.len() > MAX_COIN_NAME_LEN {
            return Err(TxError::InvalidCoinName(self.name.len()));
        }
        if self.max_supply > MAX_COIN_SUPPLY {
            return Err(TxError::WrongCoinSupply(format!("max supply above {MAX_COIN_SUPPLY}")));
        }
        if self.volume < MIN_COIN_SUPPLY || self.volume > self.max_supply {
            return Err(TxError::WrongCoinSupply(format!(
                "initial amount must be within [{MIN_COIN_SUPPLY}, {}]",
                self.max_supply
            )));
        }
        if self.crr == 0 {
            return Ok(());
        }
        if !(MIN_CRR..=MAX_CRR).contains(&self.crr) {
            return Err(TxError::WrongCrr(self.crr));
        }
        if self.reserve < MIN_COIN_RESERVE {
            return Err(TxError::WrongCoinSupply(format!("initial reserve below {MIN_COIN_RESERVE}")));
        }
        Ok(())
    }
}

/// Symbol index entry. `coin` is `None` once the live coin was deleted;
/// `archived` keeps counting so archive names are never reused.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub coin: Option<CoinId>,
    pub archived: u32,
}

#[derive(Clone)]
pub struct Coins {
    store: StoreView,
    coins: Overlay<CoinId, Coin>,
    symbols: Overlay<String, SymbolEntry>,
}

journaled!(Coins => coins, symbols);

impl Coins {
    pub fn new(store: StoreView) -> Self {
        Self {
            coins: Overlay::new(vec![keys::COIN], |id: &CoinId| keys::coin(*id), keys::coin_id),
            symbols: Overlay::new(vec![keys::SYMBOL], |s: &String| keys::symbol(s), keys::symbol_name),
            store,
        }
    }

    pub fn get(&self, id: CoinId) -> Result<Option<Coin>, TxError> {
        Ok(self.coins.get(&self.store, &id)?)
    }

    /// Live (not deleted) coin or `CoinNotExists`.
    pub fn get_live(&self, id: CoinId) -> Result<Coin, TxError> {
        match self.get(id)? {
            Some(c) if !c.deleted => Ok(c),
            _ => Err(TxError::CoinNotExists(id.to_string())),
        }
    }

    pub fn exists(&self, id: CoinId) -> Result<bool, TxError> {
        Ok(matches!(self.get(id)?, Some(c) if !c.deleted))
    }

    pub fn put(&mut self, coin: Coin) {
        self.coins.set(coin.id, coin);
    }

    pub fn symbol_entry(&self, symbol: &str) -> Result<Option<SymbolEntry>, TxError> {
        Ok(self.symbols.get(&self.store, &symbol.to_string())?)
    }

    /// Resolves `TICKER` to the live coin and `TICKER-<n>` to an archive.
    pub fn id_by_symbol(&self, symbol: &str) -> Result<Option<CoinId>, TxError> {
        Ok(self.symbol_entry(symbol)?.and_then(|e| e.coin))
    }

    pub fn symbol_taken(&self, symbol: &str) -> Result<bool, TxError> {
        Ok(self.id_by_symbol(symbol)?.is_some())
    }

    pub fn all(&self) -> Result<BTreeMap<CoinId, Coin>, TxError> {
        Ok(self.coins.all(&self.store)?)
    }

    pub fn all_symbols(&self) -> Result<BTreeMap<String, SymbolEntry>, TxError> {
        Ok(self.symbols.all(&self.store)?)
    }

    pub fn put_symbol(&mut self, symbol: String, entry: SymbolEntry) {
        self.symbols.set(symbol, entry);
    }

    /// Registers a brand-new coin under `id`. The caller checked symbol availability.
    pub fn insert(&mut self, id: CoinId, new_coin: NewCoin) -> Result<Coin, TxError> {
        let mut entry = self.symbol_entry(&new_coin.symbol)?.unwrap_or_default();
        entry.coin = Some(id);
        self.symbols.set(new_coin.symbol.clone(), entry);
        let coin = Coin {
            id,
            symbol: new_coin.symbol,
            name: new_coin.name,
            volume: new_coin.volume,
            reserve: new_coin.reserve,
            crr: new_coin.crr,
            max_supply: new_coin.max_supply,
            mintable: new_coin.mintable,
            burnable: new_coin.burnable,
            owner: new_coin.owner,
            version: 0,
            deleted: false,
        };
        self.put(coin.clone());
        Ok(coin)
    }

    /// Archives the live coin behind `symbol` as `SYMBOL-<n>` and registers
    /// `new_coin` as the new live coin under `id`.
    pub fn recreate(&mut self, id: CoinId, new_coin: NewCoin) -> Result<(Coin, Coin), TxError> {
        let mut entry = self
            .symbol_entry(&new_coin.symbol)?
            .ok_or_else(|| TxError::CoinNotExists(new_coin.symbol.clone()))?;
        let old_id = entry.coin.ok_or_else(|| TxError::CoinNotExists(new_coin.symbol.clone()))?;
        let mut old = self.get_live(old_id)?;

        entry.archived += 1;
        old.version = entry.archived;
        old.owner = None;
        let archived_symbol = old.full_symbol();
        self.symbols.set(archived_symbol, SymbolEntry { coin: Some(old_id), archived: 0 });
        self.put(old.clone());

        entry.coin = Some(id);
        self.symbols.set(new_coin.symbol.clone(), entry);
        let new = Coin {
            id,
            symbol: new_coin.symbol,
            name: new_coin.name,
            volume: new_coin.volume,
            reserve: new_coin.reserve,
            crr: new_coin.crr,
            max_supply: new_coin.max_supply,
            mintable: new_coin.mintable,
            burnable: new_coin.burnable,
            owner: new_coin.owner,
            version: 0,
            deleted: false,
        };
        self.put(new.clone());
        Ok((old, new))
    }

    pub fn set_owner(&mut self, id: CoinId, owner: Address) -> Result<(), TxError> {
        let mut c = self.get_live(id)?;
        c.owner = Some(owner);
        self.put(c);
        Ok(())
    }

    pub fn add_volume(&mut self, id: CoinId, amount: Amount) -> Result<(), TxError> {
        let mut c = self.get_live(id)?;
        c.check_supply_after(amount)?;
        c.volume += amount;
        self.put(c);
        Ok(())
    }

    pub fn sub_volume(&mut self, id: CoinId, amount: Amount) -> Result<(), TxError> {
        let mut c = self.get_live(id)?;
        c.volume = c
            .volume
            .checked_sub(amount)
            .ok_or_else(|| TxError::Internal(format!("volume of coin {id} underflows")))?;
        self.put(c);
        Ok(())
    }

    pub fn add_reserve(&mut self, id: CoinId, amount: Amount) -> Result<(), TxError> {
        let mut c = self.get_live(id)?;
        c.reserve = c
            .reserve
            .checked_add(amount)
            .ok_or_else(|| TxError::Internal(format!("reserve of coin {id} overflows")))?;
        self.put(c);
        Ok(())
    }

    pub fn sub_reserve(&mut self, id: CoinId, amount: Amount) -> Result<(), TxError> {
        let mut c = self.get_live(id)?;
        c.reserve = c
            .reserve
            .checked_sub(amount)
            .ok_or_else(|| TxError::Internal(format!("reserve of coin {id} underflows")))?;
        self.put(c);
        Ok(())
    }

    /// Flags the coin deleted and frees its live symbol. Returns false if it
    /// was already deleted.
    pub fn mark_deleted(&mut self, id: CoinId) -> Result<bool, TxError> {
        let Some(mut c) = self.get(id)? else {
            return Ok(false);
        };
        if c.deleted {
            return Ok(false);
        }
        if let Some(mut entry) = self.symbol_entry(&c.full_symbol())? {
            if entry.coin == Some(id) {
                entry.coin = None;
                self.symbols.set(c.full_symbol(), entry);
            }
        }
        c.deleted = true;
        c.volume = 0;
        c.reserve = 0;
        info!(coin = %id, symbol = %c.full_symbol(), "coin deleted");
        self.put(c);
        Ok(true)
    }

    /// Touched coins that are due for deletion: zero volume, or a reserve
    /// pushed under the minimum (slashing sells through the curve).
    pub fn drained(&self) -> Result<Vec<CoinId>, TxError> {
        let dirty: Vec<CoinId> = self.coins.dirty_keys().copied().collect();
        let mut out = Vec::new();
        for id in dirty {
            if id.is_base() {
                continue;
            }
            if let Some(c) = self.get(id)? {
                let starved = c.has_reserve() && c.reserve < MIN_COIN_RESERVE;
                if !c.deleted && (c.volume == 0 || starved) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        Ok(self.symbols.flush(&self.store)? + self.coins.flush(&self.store)?)
    }
}
