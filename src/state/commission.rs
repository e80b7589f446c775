// src/state/commission.rs

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::error::{StoreError, TxError};
use crate::state::overlay::{journaled, DirtyValue, Overlay};
use crate::store::{keys, StoreView};
use crate::types::{Amount, AmountStr, CoinId, PubKey};

const MILLI: Amount = 1_000_000_000_000_000;

/// Per-transaction-type prices, denominated in `coin`, before the gas price multiplier.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub payload_byte: Amount,
    #[serde_as(as = "AmountStr")]
    pub send: Amount,
    #[serde_as(as = "AmountStr")]
    pub buy_bancor: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_bancor: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_all_bancor: Amount,
    #[serde_as(as = "AmountStr")]
    pub buy_pool_base: Amount,
    #[serde_as(as = "AmountStr")]
    pub buy_pool_delta: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_pool_base: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_pool_delta: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_all_pool_base: Amount,
    #[serde_as(as = "AmountStr")]
    pub sell_all_pool_delta: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_ticker3: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_ticker4: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_ticker5: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_ticker6: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_ticker7_10: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_coin: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_token: Amount,
    #[serde_as(as = "AmountStr")]
    pub recreate_coin: Amount,
    #[serde_as(as = "AmountStr")]
    pub recreate_token: Amount,
    #[serde_as(as = "AmountStr")]
    pub declare_candidacy: Amount,
    #[serde_as(as = "AmountStr")]
    pub delegate: Amount,
    #[serde_as(as = "AmountStr")]
    pub unbond: Amount,
    #[serde_as(as = "AmountStr")]
    pub redeem_check: Amount,
    #[serde_as(as = "AmountStr")]
    pub set_candidate_on: Amount,
    #[serde_as(as = "AmountStr")]
    pub set_candidate_off: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_multisig: Amount,
    #[serde_as(as = "AmountStr")]
    pub multisend_base: Amount,
    #[serde_as(as = "AmountStr")]
    pub multisend_delta: Amount,
    #[serde_as(as = "AmountStr")]
    pub edit_candidate: Amount,
    #[serde_as(as = "AmountStr")]
    pub set_halt_block: Amount,
    #[serde_as(as = "AmountStr")]
    pub edit_ticker_owner: Amount,
    #[serde_as(as = "AmountStr")]
    pub edit_multisig: Amount,
    #[serde_as(as = "AmountStr")]
    pub edit_candidate_public_key: Amount,
    #[serde_as(as = "AmountStr")]
    pub create_swap_pool: Amount,
    #[serde_as(as = "AmountStr")]
    pub add_liquidity: Amount,
    #[serde_as(as = "AmountStr")]
    pub remove_liquidity: Amount,
    #[serde_as(as = "AmountStr")]
    pub edit_candidate_commission: Amount,
    #[serde_as(as = "AmountStr")]
    pub move_stake: Amount,
    #[serde_as(as = "AmountStr")]
    pub mint_token: Amount,
    #[serde_as(as = "AmountStr")]
    pub burn_token: Amount,
    #[serde_as(as = "AmountStr")]
    pub vote_commission: Amount,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            coin: CoinId::BASE,
            payload_byte: 2 * MILLI,
            send: 10 * MILLI,
            buy_bancor: 100 * MILLI,
            sell_bancor: 100 * MILLI,
            sell_all_bancor: 100 * MILLI,
            buy_pool_base: 100 * MILLI,
            buy_pool_delta: 50 * MILLI,
            sell_pool_base: 100 * MILLI,
            sell_pool_delta: 50 * MILLI,
            sell_all_pool_base: 100 * MILLI,
            sell_all_pool_delta: 50 * MILLI,
            create_ticker3: 1_000_000_000 * MILLI,
            create_ticker4: 100_000_000 * MILLI,
            create_ticker5: 10_000_000 * MILLI,
            create_ticker6: 1_000_000 * MILLI,
            create_ticker7_10: 100_000 * MILLI,
            create_coin: 0,
            create_token: 0,
            recreate_coin: 10_000_000 * MILLI,
            recreate_token: 10_000_000 * MILLI,
            declare_candidacy: 10_000 * MILLI,
            delegate: 200 * MILLI,
            unbond: 200 * MILLI,
            redeem_check: 30 * MILLI,
            set_candidate_on: 100 * MILLI,
            set_candidate_off: 100 * MILLI,
            create_multisig: 100 * MILLI,
            multisend_base: 10 * MILLI,
            multisend_delta: 5 * MILLI,
            edit_candidate: 10_000 * MILLI,
            set_halt_block: 1_000 * MILLI,
            edit_ticker_owner: 10_000_000 * MILLI,
            edit_multisig: 1_000 * MILLI,
            edit_candidate_public_key: 100_000_000 * MILLI,
            create_swap_pool: 1_000 * MILLI,
            add_liquidity: 100 * MILLI,
            remove_liquidity: 100 * MILLI,
            edit_candidate_commission: 10_000 * MILLI,
            move_stake: 200 * MILLI,
            mint_token: 100 * MILLI,
            burn_token: 100 * MILLI,
            vote_commission: 1_000 * MILLI,
        }
    }
}

impl PriceTable {
    /// Creation price by ticker length; shorter tickers cost more.
    pub fn ticker_price(&self, symbol: &str) -> Amount {
        match symbol.len() {
            3 => self.create_ticker3,
            4 => self.create_ticker4,
            5 => self.create_ticker5,
            6 => self.create_ticker6,
            _ => self.create_ticker7_10,
        }
    }
}

/// A candidate's vote for a new price table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceVote {
    pub pubkey: PubKey,
    pub prices: PriceTable,
}

#[derive(Clone)]
pub struct Commission {
    store: StoreView,
    current: DirtyValue<PriceTable>,
    votes: Overlay<u64, Vec<PriceVote>>,
}

journaled!(Commission => current, votes);

impl Commission {
    pub fn new(store: StoreView) -> Self {
        Self {
            store,
            current: DirtyValue::default(),
            votes: Overlay::new(
                vec![keys::COMMISSION, b'v'],
                |h: &u64| keys::commission_votes(*h),
                keys::commission_votes_height,
            ),
        }
    }

    /// The table in force; defaults until the first accepted vote.
    pub fn prices(&self) -> Result<PriceTable, TxError> {
        match self.current.get() {
            Some(t) => Ok(t.clone()),
            None => Ok(self.store.get_decoded(&keys::commission_prices())?.unwrap_or_default()),
        }
    }

    pub fn set_prices(&mut self, table: PriceTable) {
        self.current.set(table);
    }

    pub fn votes(&self, height: u64) -> Result<Vec<PriceVote>, TxError> {
        Ok(self.votes.get(&self.store, &height)?.unwrap_or_default())
    }

    pub fn add_vote(&mut self, height: u64, vote: PriceVote) -> Result<(), TxError> {
        let mut list = self.votes(height)?;
        if list.iter().any(|v| v.pubkey == vote.pubkey) {
            return Err(TxError::VoteAlreadyExists(height));
        }
        list.push(vote);
        self.votes.set(height, list);
        Ok(())
    }

    pub fn take_votes(&mut self, height: u64) -> Result<Vec<PriceVote>, TxError> {
        let list = self.votes(height)?;
        if !list.is_empty() {
            self.votes.remove(height);
        }
        Ok(list)
    }

    pub fn put_votes(&mut self, height: u64, votes: Vec<PriceVote>) {
        self.votes.set(height, votes);
    }

    pub fn all_votes(&self) -> Result<BTreeMap<u64, Vec<PriceVote>>, TxError> {
        Ok(self.votes.all(&self.store)?)
    }

    pub fn commit(&mut self) -> Result<usize, StoreError> {
        let mut n = self.votes.flush(&self.store)?;
        if let Some(t) = self.current.take() {
            self.store.put_encoded(keys::commission_prices(), &t)?;
            n += 1;
        }
        Ok(n)
    }
}
