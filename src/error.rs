// src/error.rs

use thiserror::Error;

use crate::config::ConfigError;
use crate::types::{Address, Amount, CoinId};

/// Failure of a single transaction. The numeric `code()` is part of the
/// external response contract and must stay stable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TxError {
    // ---- structural / general (1xx) ----
    #[error("unexpected nonce: expected {expected}, got {got}")]
    WrongNonce { expected: u64, got: u64 },
    #[error("coin {0} does not exist")]
    CoinNotExists(String),
    #[error("coin reserve is not sufficient: has {has}, required {required}")]
    CoinReserveNotSufficient { has: Amount, required: Amount },
    #[error("coin {coin} reserve would overflow")]
    CoinReserveOverflow { coin: CoinId },
    #[error("tx size {size} exceeds {max} bytes")]
    TxTooLarge { size: usize, max: usize },
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("insufficient funds for {address}: needs {needed} of coin {coin}, has {has}")]
    InsufficientFunds { address: Address, coin: CoinId, needed: Amount, has: Amount },
    #[error("payload size {size} exceeds {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("service data size {size} exceeds {max} bytes")]
    ServiceDataTooLarge { size: usize, max: usize },
    #[error("invalid multisend data: {0}")]
    InvalidMultisendData(String),
    #[error("coin supply overflow: max {max}, resulting {resulting}")]
    CoinSupplyOverflow { max: Amount, resulting: Amount },
    #[error("gas price must be positive")]
    TooLowGasPrice,
    #[error("wrong chain id: expected {expected}, got {got}")]
    WrongChainId { expected: u8, got: u8 },
    #[error("coin reserve underflow: reserve would drop to {reserve_after}, minimum is {min}")]
    CoinReserveUnderflow { reserve_after: Amount, min: Amount },
    #[error("halt height must be greater than current height {current}, got {got}")]
    WrongHaltHeight { current: u64, got: u64 },
    #[error("halt vote already exists for this candidate at height {0}")]
    HaltAlreadyExists(u64),
    #[error("commission coin {coin} is not sufficient: {reason}")]
    CommissionCoinNotSufficient { coin: CoinId, reason: String },
    #[error("vote height {height} is not in the future (current {current})")]
    VoteExpired { current: u64, height: u64 },
    #[error("vote already exists for this candidate at height {0}")]
    VoteAlreadyExists(u64),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("block gas limit {0} reached")]
    BlockGasLimitReached(u64),

    // ---- coins (2xx) ----
    #[error("coin {0} has no reserve")]
    CoinHasNoReserve(CoinId),
    #[error("coin with symbol {0} already exists")]
    CoinAlreadyExists(String),
    #[error("crr must be between 10 and 100, got {0}")]
    WrongCrr(u32),
    #[error("invalid coin symbol {0}")]
    InvalidCoinSymbol(String),
    #[error("coin name is too long: {0} bytes")]
    InvalidCoinName(usize),
    #[error("wrong coin supply: {0}")]
    WrongCoinSupply(String),
    #[error("sender is not the owner of {0}")]
    IsNotOwnerOfCoin(String),
    #[error("coin {0} is not mintable")]
    CoinNotMintable(CoinId),
    #[error("coin {0} is not burnable")]
    CoinNotBurnable(CoinId),
    #[error("coin {0} is not a token")]
    CoinIsNotToken(CoinId),
    #[error("coin {0} is a token")]
    CoinIsToken(CoinId),

    // ---- conversion (3xx) ----
    #[error("maximum value to sell reached: maximum {maximum}, needed {needed}")]
    MaximumValueToSellReached { maximum: Amount, needed: Amount },
    #[error("cannot convert coin {0} into itself")]
    CrossConvert(CoinId),
    #[error("minimum value to buy reached: minimum {minimum}, got {got}")]
    MinimumValueToBuyReached { minimum: Amount, got: Amount },

    // ---- staking (4xx) ----
    #[error("candidate with this public key already exists")]
    CandidateExists,
    #[error("commission must be between 0 and 100, got {0}")]
    WrongCommission(u32),
    #[error("candidate not found")]
    CandidateNotFound,
    #[error("stake not found")]
    StakeNotFound,
    #[error("insufficient stake: has {has}, requested {requested}")]
    InsufficientStake { has: Amount, requested: Amount },
    #[error("sender is not the owner of the candidate")]
    IsNotOwnerOfCandidate,
    #[error("public key is already in use")]
    PubKeyInUse,
    #[error("stake must be positive")]
    StakeShouldBePositive,
    #[error("stake is too low: must exceed {min_bip} in base coin value, got {got_bip}")]
    TooLowStake { min_bip: Amount, got_bip: Amount },
    #[error("commission can be edited again at height {0}")]
    PeriodLimitReached(u64),
    #[error("candidate is jailed until height {0}")]
    CandidateJailed(u64),

    // ---- checks (5xx) ----
    #[error("invalid check lock proof")]
    CheckInvalidLock,
    #[error("check expired at height {0}")]
    CheckExpired(u64),
    #[error("check already used")]
    CheckUsed,
    #[error("gas price for check redemption must be 1, got {0}")]
    TooHighGasPrice(u64),
    #[error("gas coin of the check is {expected}, tx uses {got}")]
    WrongGasCoin { expected: CoinId, got: CoinId },
    #[error("check nonce is too long: {0} bytes")]
    TooLongNonce(usize),

    // ---- multisig (6xx) ----
    #[error("incorrect weights: {0}")]
    IncorrectWeights(String),
    #[error("multisig {0} already exists")]
    MultisigExists(Address),
    #[error("multisig {0} does not exist")]
    MultisigNotExists(Address),
    #[error("incorrect multisignature")]
    IncorrectMultiSignature,
    #[error("owners list is too large: {0}")]
    TooLargeOwnersList(usize),
    #[error("addresses ({addresses}) and weights ({weights}) count differ")]
    DifferentCountAddressesAndWeights { addresses: usize, weights: usize },
    #[error("total weight {total} is lower than threshold {threshold}")]
    IncorrectTotalWeights { total: u64, threshold: u32 },
    #[error("not enough multisig votes: {got} of {threshold}")]
    NotEnoughMultisigVotes { got: u64, threshold: u32 },
    #[error("duplicated address {0}")]
    DuplicatedAddresses(Address),

    // ---- swap pools (7xx) ----
    #[error("swap pool between {0} and {1} does not exist")]
    PairNotExists(CoinId, CoinId),
    #[error("swap pool between {0} and {1} already exists")]
    PairAlreadyExists(CoinId, CoinId),
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    #[error("insufficient output amount")]
    InsufficientOutputAmount,
    #[error("insufficient liquidity in pool {0}-{1}")]
    InsufficientLiquidity(CoinId, CoinId),
    #[error("insufficient liquidity minted")]
    InsufficientLiquidityMinted,
    #[error("insufficient liquidity burned")]
    InsufficientLiquidityBurned,
    #[error("insufficient liquidity balance: has {has}, requested {requested}")]
    InsufficientLiquidityBalance { has: Amount, requested: Amount },
    #[error("invalid swap route: {0}")]
    WrongRoute(String),

    // ---- internal consistency (9xx) ----
    #[error("constant product invariant violated in pool {0}-{1}")]
    ConstantProductViolated(CoinId, CoinId),
    #[error("reward distribution exceeded the distributable amount by {0}")]
    NegativeRewardRemainder(Amount),
    #[error("internal error: {0}")]
    Internal(String),
}

impl TxError {
    pub fn code(&self) -> u32 {
        use TxError::*;
        match self {
            WrongNonce { .. } => 101,
            CoinNotExists(_) => 102,
            CoinReserveNotSufficient { .. } => 103,
            CoinReserveOverflow { .. } => 104,
            TxTooLarge { .. } => 105,
            DecodeError(_) => 106,
            InsufficientFunds { .. } => 107,
            PayloadTooLarge { .. } => 109,
            ServiceDataTooLarge { .. } => 110,
            InvalidMultisendData(_) => 111,
            CoinSupplyOverflow { .. } => 112,
            TooLowGasPrice => 113,
            WrongChainId { .. } => 114,
            CoinReserveUnderflow { .. } => 115,
            WrongHaltHeight { .. } => 116,
            HaltAlreadyExists(_) => 117,
            CommissionCoinNotSufficient { .. } => 118,
            VoteExpired { .. } => 119,
            VoteAlreadyExists(_) => 120,
            InvalidSignature(_) => 121,
            BlockGasLimitReached(_) => 122,

            CoinHasNoReserve(_) => 200,
            CoinAlreadyExists(_) => 201,
            WrongCrr(_) => 202,
            InvalidCoinSymbol(_) => 203,
            InvalidCoinName(_) => 204,
            WrongCoinSupply(_) => 205,
            IsNotOwnerOfCoin(_) => 206,
            CoinNotMintable(_) => 207,
            CoinNotBurnable(_) => 208,
            CoinIsNotToken(_) => 209,
            CoinIsToken(_) => 210,

            MaximumValueToSellReached { .. } => 301,
            CrossConvert(_) => 302,
            MinimumValueToBuyReached { .. } => 303,

            CandidateExists => 401,
            WrongCommission(_) => 402,
            CandidateNotFound => 403,
            StakeNotFound => 404,
            InsufficientStake { .. } => 405,
            IsNotOwnerOfCandidate => 406,
            PubKeyInUse => 407,
            StakeShouldBePositive => 408,
            TooLowStake { .. } => 409,
            PeriodLimitReached(_) => 413,
            CandidateJailed(_) => 414,

            CheckInvalidLock => 501,
            CheckExpired(_) => 502,
            CheckUsed => 503,
            TooHighGasPrice(_) => 504,
            WrongGasCoin { .. } => 505,
            TooLongNonce(_) => 506,

            IncorrectWeights(_) => 601,
            MultisigExists(_) => 602,
            MultisigNotExists(_) => 603,
            IncorrectMultiSignature => 604,
            TooLargeOwnersList(_) => 605,
            DifferentCountAddressesAndWeights { .. } => 606,
            IncorrectTotalWeights { .. } => 607,
            NotEnoughMultisigVotes { .. } => 608,
            DuplicatedAddresses(_) => 609,

            PairNotExists(..) => 700,
            PairAlreadyExists(..) => 701,
            InsufficientInputAmount => 702,
            InsufficientOutputAmount => 703,
            InsufficientLiquidity(..) => 704,
            InsufficientLiquidityMinted => 705,
            InsufficientLiquidityBurned => 706,
            InsufficientLiquidityBalance { .. } => 707,
            WrongRoute(_) => 708,

            ConstantProductViolated(..) => 900,
            NegativeRewardRemainder(_) => 901,
            Internal(_) => 999,
        }
    }

    /// Internal-consistency faults are not the sender's fault.
    pub fn is_internal(&self) -> bool {
        self.code() >= 900
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store view is read-only")]
    ReadOnly,
    #[error("version {0} is not available")]
    VersionNotFound(u64),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encode: {0}")]
    Encode(String),
    #[error("decode: {0}")]
    Decode(String),
}

/// Errors raised outside a single transaction: block hooks, commit, genesis.
#[derive(Debug, Error)]
pub enum StateError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error("invalid genesis: {0}")]
    Genesis(String),
    #[error("invariant check failed: {0}")]
    Invariant(#[from] InvariantError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvariantError {
    #[error("coin {coin}: volume {volume} but holdings sum to {holdings} (diff {diff})")]
    CoinSupply { coin: CoinId, volume: Amount, holdings: Amount, diff: Amount },
    #[error("base supply: expected {expected}, found {found} (diff {diff})")]
    BaseSupply { expected: Amount, found: Amount, diff: Amount },
}

/// Errors of the block driver.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("expected block {expected}, got {got}")]
    UnexpectedHeight { expected: u64, got: u64 },
    #[error("no block in progress")]
    NoBlock,
    #[error("block hook failed: {0}")]
    Hook(#[from] TxError),
    #[error(transparent)]
    State(#[from] StateError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for TxError {
    fn from(e: StoreError) -> Self {
        TxError::Internal(e.to_string())
    }
}

impl From<CodecError> for TxError {
    fn from(e: CodecError) -> Self {
        TxError::Internal(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_family() {
        assert_eq!(TxError::WrongNonce { expected: 1, got: 2 }.code(), 101);
        assert_eq!(TxError::CrossConvert(CoinId(1)).code(), 302);
        assert_eq!(TxError::TooLowStake { min_bip: 1, got_bip: 0 }.code(), 409);
        assert!(TxError::ConstantProductViolated(CoinId(0), CoinId(1)).is_internal());
        assert!(!TxError::CandidateNotFound.is_internal());
    }
}
