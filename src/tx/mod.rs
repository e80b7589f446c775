// src/tx/mod.rs

//! Transaction envelope, the closed set of payloads and their handlers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::codec;
use crate::config::{EngineConfig, MAX_TX_LENGTH};
use crate::crypto::{hash_bytes_sha256, MultiSignature, SignatureVerifier, SingleSignature};
use crate::error::TxError;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::types::{Address, Amount, CoinId, Hash};

pub mod candidate;
pub mod check;
pub mod coin;
pub mod convert;
pub mod governance;
pub mod multisig;
pub mod send;
pub mod stake;
pub mod swap;

pub const SIGNATURE_SINGLE: u8 = 1;
pub const SIGNATURE_MULTI: u8 = 2;

/// Wire type byte of every supported transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TxType {
    Send = 0x01,
    SellCoin = 0x02,
    SellAllCoin = 0x03,
    BuyCoin = 0x04,
    CreateCoin = 0x05,
    DeclareCandidacy = 0x06,
    Delegate = 0x07,
    Unbond = 0x08,
    RedeemCheck = 0x09,
    SetCandidateOnline = 0x0A,
    SetCandidateOffline = 0x0B,
    CreateMultisig = 0x0C,
    Multisend = 0x0D,
    EditCandidate = 0x0E,
    SetHaltBlock = 0x0F,
    RecreateCoin = 0x10,
    EditCoinOwner = 0x11,
    EditMultisig = 0x12,
    EditCandidatePublicKey = 0x14,
    AddLiquidity = 0x15,
    RemoveLiquidity = 0x16,
    SellSwapPool = 0x17,
    BuySwapPool = 0x18,
    SellAllSwapPool = 0x19,
    EditCandidateCommission = 0x1A,
    MoveStake = 0x1B,
    MintToken = 0x1C,
    BurnToken = 0x1D,
    CreateToken = 0x1E,
    RecreateToken = 0x1F,
    VoteCommission = 0x20,
    CreateSwapPool = 0x22,
}

impl TxType {
    pub fn from_byte(b: u8) -> Option<Self> {
        use TxType::*;
        Some(match b {
            0x01 => Send,
            0x02 => SellCoin,
            0x03 => SellAllCoin,
            0x04 => BuyCoin,
            0x05 => CreateCoin,
            0x06 => DeclareCandidacy,
            0x07 => Delegate,
            0x08 => Unbond,
            0x09 => RedeemCheck,
            0x0A => SetCandidateOnline,
            0x0B => SetCandidateOffline,
            0x0C => CreateMultisig,
            0x0D => Multisend,
            0x0E => EditCandidate,
            0x0F => SetHaltBlock,
            0x10 => RecreateCoin,
            0x11 => EditCoinOwner,
            0x12 => EditMultisig,
            0x14 => EditCandidatePublicKey,
            0x15 => AddLiquidity,
            0x16 => RemoveLiquidity,
            0x17 => SellSwapPool,
            0x18 => BuySwapPool,
            0x19 => SellAllSwapPool,
            0x1A => EditCandidateCommission,
            0x1B => MoveStake,
            0x1C => MintToken,
            0x1D => BurnToken,
            0x1E => CreateToken,
            0x1F => RecreateToken,
            0x20 => VoteCommission,
            0x22 => CreateSwapPool,
            _ => return None,
        })
    }

    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Gas units counted against the block limit.
    pub fn gas(self) -> u64 {
        use TxType::*;
        match self {
            Send | Multisend => 10,
            RedeemCheck => 30,
            SellCoin | SellAllCoin | BuyCoin | SellSwapPool | BuySwapPool | SellAllSwapPool => 100,
            AddLiquidity | RemoveLiquidity | MintToken | BurnToken => 100,
            SetCandidateOnline | SetCandidateOffline | CreateMultisig => 100,
            Delegate | Unbond | MoveStake => 200,
            _ => 1_000,
        }
    }
}

/// Signed envelope as delivered by consensus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub nonce: u64,
    pub chain_id: u8,
    pub gas_price: u64,
    pub gas_coin: CoinId,
    pub tx_type: u8,
    pub data: Vec<u8>,
    pub payload: Vec<u8>,
    pub service_data: Vec<u8>,
    pub signature_type: u8,
    pub signature_data: Vec<u8>,
}

impl Transaction {
    /// Decodes an untrusted envelope; payload schemas are decoded separately.
    pub fn decode(raw: &[u8]) -> Result<Self, TxError> {
        if raw.len() > MAX_TX_LENGTH {
            return Err(TxError::TxTooLarge { size: raw.len(), max: MAX_TX_LENGTH });
        }
        codec::decode_limited(raw, MAX_TX_LENGTH as u64).map_err(|e| TxError::DecodeError(e.to_string()))
    }

    pub fn encode(&self) -> Result<Vec<u8>, TxError> {
        Ok(codec::encode(self)?)
    }

    pub fn signing_hash(&self) -> Hash {
        hash_bytes_sha256(&codec::tx_signing_bytes(self))
    }

    pub fn kind(&self) -> Result<TxType, TxError> {
        TxType::from_byte(self.tx_type).ok_or_else(|| TxError::DecodeError(format!("unknown tx type {:#04x}", self.tx_type)))
    }

    pub fn decode_data(&self) -> Result<TxData, TxError> {
        TxData::decode(self.kind()?, &self.data)
    }

    /// Recovers the sending address. Multisig senders need signers whose
    /// weights reach the threshold, each signer counted once.
    pub fn sender(&self, state: &State, verifier: &dyn SignatureVerifier) -> Result<Address, TxError> {
        let hash = self.signing_hash();
        match self.signature_type {
            SIGNATURE_SINGLE => {
                let sig: SingleSignature =
                    codec::decode(&self.signature_data).map_err(|e| TxError::DecodeError(e.to_string()))?;
                verifier.recover(&hash, &sig).map_err(|e| TxError::InvalidSignature(e.to_string()))
            }
            SIGNATURE_MULTI => {
                let ms: MultiSignature =
                    codec::decode(&self.signature_data).map_err(|e| TxError::DecodeError(e.to_string()))?;
                let multisig = state.accounts.get(&ms.multisig)?.multisig.ok_or(TxError::MultisigNotExists(ms.multisig))?;
                let mut seen = BTreeSet::new();
                let mut weight = 0u64;
                for sig in &ms.signatures {
                    let signer = verifier.recover(&hash, sig).map_err(|_| TxError::IncorrectMultiSignature)?;
                    if !seen.insert(signer) {
                        return Err(TxError::IncorrectMultiSignature);
                    }
                    weight += u64::from(multisig.weight_of(&signer).ok_or(TxError::IncorrectMultiSignature)?);
                }
                if weight < u64::from(multisig.threshold) {
                    return Err(TxError::NotEnoughMultisigVotes { got: weight, threshold: multisig.threshold });
                }
                Ok(ms.multisig)
            }
            other => Err(TxError::DecodeError(format!("unknown signature type {other}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

pub type Tags = Vec<Tag>;

pub fn tag(key: &str, value: impl ToString) -> Tag {
    Tag { key: key.to_string(), value: value.to_string() }
}

/// Everything a handler may read besides the state it mutates.
pub struct Exec<'a> {
    pub sender: Address,
    pub height: u64,
    pub tx: &'a Transaction,
    pub cfg: &'a EngineConfig,
    pub verifier: &'a dyn SignatureVerifier,
}

/// Per-type behaviour. Commission is charged by the pipeline between
/// [`TxHandler::payer`] and [`TxHandler::run`].
pub trait TxHandler {
    /// Table price before byte costs and the gas price multiplier.
    fn price(&self, prices: &PriceTable) -> Amount;

    /// Address the commission is taken from.
    fn payer(&self, ctx: &Exec<'_>, _state: &State) -> Result<Address, TxError> {
        Ok(ctx.sender)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError>;
}

/// Decoded payload, one variant per [`TxType`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TxData {
    Send(send::SendData),
    Multisend(send::MultisendData),
    SellCoin(convert::SellCoinData),
    SellAllCoin(convert::SellAllCoinData),
    BuyCoin(convert::BuyCoinData),
    CreateCoin(coin::CreateCoinData),
    RecreateCoin(coin::RecreateCoinData),
    CreateToken(coin::CreateTokenData),
    RecreateToken(coin::RecreateTokenData),
    EditCoinOwner(coin::EditCoinOwnerData),
    MintToken(coin::MintTokenData),
    BurnToken(coin::BurnTokenData),
    DeclareCandidacy(candidate::DeclareCandidacyData),
    SetCandidateOnline(candidate::SetCandidateOnData),
    SetCandidateOffline(candidate::SetCandidateOffData),
    EditCandidate(candidate::EditCandidateData),
    EditCandidatePublicKey(candidate::EditCandidatePublicKeyData),
    EditCandidateCommission(candidate::EditCandidateCommissionData),
    Delegate(stake::DelegateData),
    Unbond(stake::UnbondData),
    MoveStake(stake::MoveStakeData),
    RedeemCheck(check::RedeemCheckData),
    CreateMultisig(multisig::CreateMultisigData),
    EditMultisig(multisig::EditMultisigData),
    CreateSwapPool(swap::CreateSwapPoolData),
    AddLiquidity(swap::AddLiquidityData),
    RemoveLiquidity(swap::RemoveLiquidityData),
    SellSwapPool(swap::SellSwapPoolData),
    BuySwapPool(swap::BuySwapPoolData),
    SellAllSwapPool(swap::SellAllSwapPoolData),
    SetHaltBlock(governance::SetHaltBlockData),
    VoteCommission(governance::VoteCommissionData),
}

fn data<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, TxError> {
    codec::decode_limited(bytes, MAX_TX_LENGTH as u64).map_err(|e| TxError::DecodeError(e.to_string()))
}

macro_rules! dispatch {
    ($value:expr, $d:ident => $body:expr) => {
        match $value {
            TxData::Send($d) => $body,
            TxData::Multisend($d) => $body,
            TxData::SellCoin($d) => $body,
            TxData::SellAllCoin($d) => $body,
            TxData::BuyCoin($d) => $body,
            TxData::CreateCoin($d) => $body,
            TxData::RecreateCoin($d) => $body,
            TxData::CreateToken($d) => $body,
            TxData::RecreateToken($d) => $body,
            TxData::EditCoinOwner($d) => $body,
            TxData::MintToken($d) => $body,
            TxData::BurnToken($d) => $body,
            TxData::DeclareCandidacy($d) => $body,
            TxData::SetCandidateOnline($d) => $body,
            TxData::SetCandidateOffline($d) => $body,
            TxData::EditCandidate($d) => $body,
            TxData::EditCandidatePublicKey($d) => $body,
            TxData::EditCandidateCommission($d) => $body,
            TxData::Delegate($d) => $body,
            TxData::Unbond($d) => $body,
            TxData::MoveStake($d) => $body,
            TxData::RedeemCheck($d) => $body,
            TxData::CreateMultisig($d) => $body,
            TxData::EditMultisig($d) => $body,
            TxData::CreateSwapPool($d) => $body,
            TxData::AddLiquidity($d) => $body,
            TxData::RemoveLiquidity($d) => $body,
            TxData::SellSwapPool($d) => $body,
            TxData::BuySwapPool($d) => $body,
            TxData::SellAllSwapPool($d) => $body,
            TxData::SetHaltBlock($d) => $body,
            TxData::VoteCommission($d) => $body,
        }
    };
}

impl TxData {
    pub fn decode(kind: TxType, bytes: &[u8]) -> Result<Self, TxError> {
        use TxType as T;
        Ok(match kind {
            T::Send => TxData::Send(data(bytes)?),
            T::Multisend => TxData::Multisend(data(bytes)?),
            T::SellCoin => TxData::SellCoin(data(bytes)?),
            T::SellAllCoin => TxData::SellAllCoin(data(bytes)?),
            T::BuyCoin => TxData::BuyCoin(data(bytes)?),
            T::CreateCoin => TxData::CreateCoin(data(bytes)?),
            T::RecreateCoin => TxData::RecreateCoin(data(bytes)?),
            T::CreateToken => TxData::CreateToken(data(bytes)?),
            T::RecreateToken => TxData::RecreateToken(data(bytes)?),
            T::EditCoinOwner => TxData::EditCoinOwner(data(bytes)?),
            T::MintToken => TxData::MintToken(data(bytes)?),
            T::BurnToken => TxData::BurnToken(data(bytes)?),
            T::DeclareCandidacy => TxData::DeclareCandidacy(data(bytes)?),
            T::SetCandidateOnline => TxData::SetCandidateOnline(data(bytes)?),
            T::SetCandidateOffline => TxData::SetCandidateOffline(data(bytes)?),
            T::EditCandidate => TxData::EditCandidate(data(bytes)?),
            T::EditCandidatePublicKey => TxData::EditCandidatePublicKey(data(bytes)?),
            T::EditCandidateCommission => TxData::EditCandidateCommission(data(bytes)?),
            T::Delegate => TxData::Delegate(data(bytes)?),
            T::Unbond => TxData::Unbond(data(bytes)?),
            T::MoveStake => TxData::MoveStake(data(bytes)?),
            T::RedeemCheck => TxData::RedeemCheck(data(bytes)?),
            T::CreateMultisig => TxData::CreateMultisig(data(bytes)?),
            T::EditMultisig => TxData::EditMultisig(data(bytes)?),
            T::CreateSwapPool => TxData::CreateSwapPool(data(bytes)?),
            T::AddLiquidity => TxData::AddLiquidity(data(bytes)?),
            T::RemoveLiquidity => TxData::RemoveLiquidity(data(bytes)?),
            T::SellSwapPool => TxData::SellSwapPool(data(bytes)?),
            T::BuySwapPool => TxData::BuySwapPool(data(bytes)?),
            T::SellAllSwapPool => TxData::SellAllSwapPool(data(bytes)?),
            T::SetHaltBlock => TxData::SetHaltBlock(data(bytes)?),
            T::VoteCommission => TxData::VoteCommission(data(bytes)?),
        })
    }

    /// Canonical payload bytes, the inverse of [`TxData::decode`].
    pub fn encode(&self) -> Result<Vec<u8>, TxError> {
        Ok(dispatch!(self, d => codec::encode(d))?)
    }

    pub fn kind(&self) -> TxType {
        use TxType as T;
        match self {
            TxData::Send(_) => T::Send,
            TxData::Multisend(_) => T::Multisend,
            TxData::SellCoin(_) => T::SellCoin,
            TxData::SellAllCoin(_) => T::SellAllCoin,
            TxData::BuyCoin(_) => T::BuyCoin,
            TxData::CreateCoin(_) => T::CreateCoin,
            TxData::RecreateCoin(_) => T::RecreateCoin,
            TxData::CreateToken(_) => T::CreateToken,
            TxData::RecreateToken(_) => T::RecreateToken,
            TxData::EditCoinOwner(_) => T::EditCoinOwner,
            TxData::MintToken(_) => T::MintToken,
            TxData::BurnToken(_) => T::BurnToken,
            TxData::DeclareCandidacy(_) => T::DeclareCandidacy,
            TxData::SetCandidateOnline(_) => T::SetCandidateOnline,
            TxData::SetCandidateOffline(_) => T::SetCandidateOffline,
            TxData::EditCandidate(_) => T::EditCandidate,
            TxData::EditCandidatePublicKey(_) => T::EditCandidatePublicKey,
            TxData::EditCandidateCommission(_) => T::EditCandidateCommission,
            TxData::Delegate(_) => T::Delegate,
            TxData::Unbond(_) => T::Unbond,
            TxData::MoveStake(_) => T::MoveStake,
            TxData::RedeemCheck(_) => T::RedeemCheck,
            TxData::CreateMultisig(_) => T::CreateMultisig,
            TxData::EditMultisig(_) => T::EditMultisig,
            TxData::CreateSwapPool(_) => T::CreateSwapPool,
            TxData::AddLiquidity(_) => T::AddLiquidity,
            TxData::RemoveLiquidity(_) => T::RemoveLiquidity,
            TxData::SellSwapPool(_) => T::SellSwapPool,
            TxData::BuySwapPool(_) => T::BuySwapPool,
            TxData::SellAllSwapPool(_) => T::SellAllSwapPool,
            TxData::SetHaltBlock(_) => T::SetHaltBlock,
            TxData::VoteCommission(_) => T::VoteCommission,
        }
    }
}

impl TxHandler for TxData {
    fn price(&self, prices: &PriceTable) -> Amount {
        dispatch!(self, d => d.price(prices))
    }

    fn payer(&self, ctx: &Exec<'_>, state: &State) -> Result<Address, TxError> {
        dispatch!(self, d => d.payer(ctx, state))
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        dispatch!(self, d => d.run(ctx, state))
    }
}
