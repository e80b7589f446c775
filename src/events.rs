// src/events.rs

use serde::{Deserialize, Serialize};
use serde_with::serde_as;

use crate::types::{Address, Amount, AmountStr, CoinId, PubKey};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RewardRole {
    Dao,
    Developers,
    Validator,
    Delegator,
}

/// Economic side effects not visible in a transaction response.
/// Collected per block and drained by the block driver.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Reward {
        role: RewardRole,
        address: Address,
        #[serde_as(as = "AmountStr")]
        amount: Amount,
        validator: PubKey,
    },
    Slash {
        address: Address,
        coin: CoinId,
        #[serde_as(as = "AmountStr")]
        amount: Amount,
        validator: PubKey,
    },
    Unbond {
        address: Address,
        coin: CoinId,
        #[serde_as(as = "AmountStr")]
        amount: Amount,
        validator: PubKey,
    },
    StakeMove {
        address: Address,
        coin: CoinId,
        #[serde_as(as = "AmountStr")]
        amount: Amount,
        from: PubKey,
        to: PubKey,
    },
    /// A stake pushed out of a full candidate and refunded.
    StakeKick {
        address: Address,
        coin: CoinId,
        #[serde_as(as = "AmountStr")]
        amount: Amount,
        validator: PubKey,
    },
    Jail {
        validator: PubKey,
        until: u64,
    },
    CoinDeleted {
        coin: CoinId,
        symbol: String,
    },
    CommissionPricesUpdated {
        height: u64,
    },
}
