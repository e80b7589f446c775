// src/codec.rs

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::CodecError;
use crate::tx::check::Check;
use crate::tx::Transaction;
use crate::types::{Address, Amount};

pub const CODEC_VERSION: u8 = 1;
pub const DOM_TX: &[u8] = b"TX";
pub const DOM_CHECK: &[u8] = b"CHECK";
pub const DOM_MULTISIG: &[u8] = b"MSIG";
pub const DOM_LOCK: &[u8] = b"LOCK";

// Canonical codec: fixed-width little-endian integers, no trailing bytes.
fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
        .reject_trailing_bytes()
}

/// Canonical encoding used for persistence and hashing.
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    options().serialize(value).map_err(|e| CodecError::Encode(e.to_string()))
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    options().deserialize(bytes).map_err(|e| CodecError::Decode(e.to_string()))
}

/// Decode untrusted input; allocation is bounded by `limit` bytes.
pub fn decode_limited<T: DeserializeOwned>(bytes: &[u8], limit: u64) -> Result<T, CodecError> {
    options()
        .with_limit(limit)
        .deserialize(bytes)
        .map_err(|e| CodecError::Decode(e.to_string()))
}

// --- helpers: write primitives deterministically ---

pub fn put_u64(dst: &mut Vec<u8>, x: u64) {
    dst.extend_from_slice(&x.to_le_bytes());
}

pub fn put_u32(dst: &mut Vec<u8>, x: u32) {
    dst.extend_from_slice(&x.to_le_bytes());
}

pub fn put_u128(dst: &mut Vec<u8>, x: Amount) {
    dst.extend_from_slice(&x.to_le_bytes());
}

pub fn put_bytes(dst: &mut Vec<u8>, bytes: &[u8]) {
    put_u32(dst, bytes.len() as u32);
    dst.extend_from_slice(bytes);
}

// --- signing preimages ---

/// Everything except the signature data itself.
pub fn tx_signing_bytes(tx: &Transaction) -> Vec<u8> {
    let mut v = vec![CODEC_VERSION];
    v.extend_from_slice(DOM_TX);
    put_u64(&mut v, tx.nonce);
    v.push(tx.chain_id);
    put_u64(&mut v, tx.gas_price);
    put_u32(&mut v, tx.gas_coin.0);
    v.push(tx.tx_type);
    put_bytes(&mut v, &tx.data);
    put_bytes(&mut v, &tx.payload);
    put_bytes(&mut v, &tx.service_data);
    v.push(tx.signature_type);
    v
}

/// Check body as signed by the issuer (lock key included, issuer signature excluded).
pub fn check_signing_bytes(check: &Check) -> Vec<u8> {
    let mut v = vec![CODEC_VERSION];
    v.extend_from_slice(DOM_CHECK);
    put_bytes(&mut v, &check.nonce);
    v.push(check.chain_id);
    put_u64(&mut v, check.due_block);
    put_u32(&mut v, check.coin.0);
    put_u128(&mut v, check.value);
    put_u32(&mut v, check.gas_coin.0);
    v.extend_from_slice(check.lock.as_bytes());
    v
}

/// What the redeemer proves knowledge of the passphrase over.
pub fn lock_proof_bytes(redeemer: &Address) -> Vec<u8> {
    let mut v = vec![CODEC_VERSION];
    v.extend_from_slice(DOM_LOCK);
    v.extend_from_slice(redeemer.as_bytes());
    v
}

pub fn multisig_preimage(threshold: u32, weights: &[u32], addresses: &[Address]) -> Vec<u8> {
    let mut v = vec![CODEC_VERSION];
    v.extend_from_slice(DOM_MULTISIG);
    put_u32(&mut v, threshold);
    put_u32(&mut v, weights.len() as u32);
    for w in weights {
        put_u32(&mut v, *w);
    }
    put_u32(&mut v, addresses.len() as u32);
    for a in addresses {
        v.extend_from_slice(a.as_bytes());
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CoinId;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        a: u64,
        coin: CoinId,
        who: Address,
        amount: Amount,
    }

    #[test]
    fn fixed_width_layout() {
        let s = Sample { a: 1, coin: CoinId(2), who: Address([9; 20]), amount: 3 };
        let bytes = encode(&s).unwrap();
        // u64 + u32 + 20 raw bytes + u128
        assert_eq!(bytes.len(), 8 + 4 + 20 + 16);
        assert_eq!(decode::<Sample>(&bytes).unwrap(), s);
    }

    #[test]
    fn rejects_trailing_bytes() {
        let mut bytes = encode(&7u64).unwrap();
        bytes.push(0);
        let err = decode::<u64>(&bytes).unwrap_err();
        assert!(err.to_string().contains("decode"));
    }

    #[test]
    fn limited_decode_caps_allocation() {
        let big: Vec<u8> = vec![1; 4096];
        let bytes = encode(&big).unwrap();
        assert!(decode_limited::<Vec<u8>>(&bytes, 1024).is_err());
        assert_eq!(decode_limited::<Vec<u8>>(&bytes, 8192).unwrap().len(), 4096);
    }

    #[test]
    fn multisig_preimage_depends_on_order() {
        let a = Address([1; 20]);
        let b = Address([2; 20]);
        assert_ne!(
            multisig_preimage(2, &[1, 1], &[a, b]),
            multisig_preimage(2, &[1, 1], &[b, a]),
        );
    }
}
