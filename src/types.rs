// src/types.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_with::{DeserializeAs, SerializeAs};
use thiserror::Error;

pub type Hash = [u8; 32];

/// Amounts are carried in the smallest indivisible unit.
pub type Amount = u128;

/// One whole coin expressed in units.
pub const UNIT: Amount = 1_000_000_000_000_000_000;

/// Whole coins to units, saturating.
#[inline]
pub const fn coins(n: u128) -> Amount {
    n.saturating_mul(UNIT)
}

/// `serde_with` adapter: decimal string in JSON, native `u128` in the canonical codec.
pub struct AmountStr;

impl SerializeAs<Amount> for AmountStr {
    fn serialize_as<S: Serializer>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(value)
        } else {
            serializer.serialize_u128(*value)
        }
    }
}

impl<'de> DeserializeAs<'de, Amount> for AmountStr {
    fn deserialize_as<D: Deserializer<'de>>(deserializer: D) -> Result<Amount, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            u128::deserialize(deserializer)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected 0x-prefixed hex")]
    MissingPrefix,
    #[error("invalid hex: {0}")]
    Hex(String),
    #[error("expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

macro_rules! hex_bytes_type {
    ($name:ident, $len:expr) => {
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
                if bytes.len() != $len {
                    return Err(ParseError::Length { expected: $len, got: bytes.len() });
                }
                let mut out = [0u8; $len];
                out.copy_from_slice(bytes);
                Ok(Self(out))
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0u8; $len])
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let body = s.strip_prefix("0x").ok_or(ParseError::MissingPrefix)?;
                let bytes = hex::decode(body).map_err(|e| ParseError::Hex(e.to_string()))?;
                Self::from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        // Hex strings for JSON snapshots, raw fixed-size tuples for the canonical codec.
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_hex())
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    <[u8; $len]>::deserialize(deserializer).map(Self)
                }
            }
        }
    };
}

hex_bytes_type!(Address, 20);
hex_bytes_type!(PubKey, 32);

impl Address {
    pub const ZERO: Address = Address([0u8; 20]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

/// Stable coin identity. Never reused, even after the coin is deleted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoinId(pub u32);

impl CoinId {
    pub const BASE: CoinId = CoinId(0);

    #[inline]
    pub fn is_base(&self) -> bool {
        self.0 == 0
    }

    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for CoinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoinId({})", self.0)
    }
}

impl From<u32> for CoinId {
    fn from(v: u32) -> Self {
        CoinId(v)
    }
}

/// Unordered coin pair normalised so that `0 < 1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey(pub CoinId, pub CoinId);

impl PairKey {
    pub fn new(a: CoinId, b: CoinId) -> Self {
        if a <= b { PairKey(a, b) } else { PairKey(b, a) }
    }

    /// True when `coin` is the first (smaller id) side of the pair.
    pub fn is_first(&self, coin: CoinId) -> bool {
        self.0 == coin
    }

    pub fn contains(&self, coin: CoinId) -> bool {
        self.0 == coin || self.1 == coin
    }
}

/// Ticker rule: 3..=10 chars of `A-Z` / `0-9`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    (3..=10).contains(&symbol.len())
        && symbol.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}
