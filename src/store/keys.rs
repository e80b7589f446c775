// src/store/keys.rs
//
// One-byte namespace prefixes. Integer components are big-endian so that
// byte order equals numeric order.

use crate::types::{Address, CoinId, Hash, PairKey, PubKey};

pub const ACCOUNT: u8 = b'a';
pub const COIN: u8 = b'c';
pub const SYMBOL: u8 = b's';
pub const FROZEN: u8 = b'f';
pub const CANDIDATE: u8 = b'k';
pub const VALIDATORS: u8 = b'v';
pub const USED_CHECK: u8 = b'u';
pub const APP: u8 = b'x';
pub const POOL: u8 = b'p';
pub const POOL_ID: u8 = b'q';
pub const COMMISSION: u8 = b'm';
pub const HALT: u8 = b'h';

fn with_prefix(prefix: u8, body: &[u8]) -> Vec<u8> {
    let mut k = Vec::with_capacity(1 + body.len());
    k.push(prefix);
    k.extend_from_slice(body);
    k
}

pub fn account(addr: &Address) -> Vec<u8> {
    with_prefix(ACCOUNT, addr.as_bytes())
}

pub fn coin(id: CoinId) -> Vec<u8> {
    with_prefix(COIN, &id.to_be_bytes())
}

pub fn symbol(symbol: &str) -> Vec<u8> {
    with_prefix(SYMBOL, symbol.as_bytes())
}

pub fn frozen(height: u64) -> Vec<u8> {
    with_prefix(FROZEN, &height.to_be_bytes())
}

pub fn candidate(pubkey: &PubKey) -> Vec<u8> {
    with_prefix(CANDIDATE, pubkey.as_bytes())
}

pub fn validators() -> Vec<u8> {
    vec![VALIDATORS]
}

pub fn used_check(hash: &Hash) -> Vec<u8> {
    with_prefix(USED_CHECK, hash)
}

pub fn app() -> Vec<u8> {
    vec![APP]
}

pub fn pool(pair: &PairKey) -> Vec<u8> {
    let mut body = [0u8; 8];
    body[..4].copy_from_slice(&pair.0.to_be_bytes());
    body[4..].copy_from_slice(&pair.1.to_be_bytes());
    with_prefix(POOL, &body)
}

pub fn pool_id(id: u32) -> Vec<u8> {
    with_prefix(POOL_ID, &id.to_be_bytes())
}

pub fn commission_prices() -> Vec<u8> {
    vec![COMMISSION, b'p']
}

pub fn commission_votes(height: u64) -> Vec<u8> {
    let mut k = vec![COMMISSION, b'v'];
    k.extend_from_slice(&height.to_be_bytes());
    k
}

pub fn halt(height: u64) -> Vec<u8> {
    with_prefix(HALT, &height.to_be_bytes())
}

fn body(key: &[u8], prefix: &[u8]) -> Option<Vec<u8>> {
    key.strip_prefix(prefix).map(|b| b.to_vec())
}

fn be_u64(bytes: &[u8]) -> Option<u64> {
    let b: [u8; 8] = bytes.try_into().ok()?;
    Some(u64::from_be_bytes(b))
}

fn be_u32(bytes: &[u8]) -> Option<u32> {
    let b: [u8; 4] = bytes.try_into().ok()?;
    Some(u32::from_be_bytes(b))
}

/// Inverse of [`frozen`].
pub fn frozen_height(key: &[u8]) -> Option<u64> {
    be_u64(&body(key, &[FROZEN])?)
}

pub fn halt_height(key: &[u8]) -> Option<u64> {
    be_u64(&body(key, &[HALT])?)
}

pub fn commission_votes_height(key: &[u8]) -> Option<u64> {
    be_u64(&body(key, &[COMMISSION, b'v'])?)
}

pub fn account_address(key: &[u8]) -> Option<Address> {
    Address::from_slice(&body(key, &[ACCOUNT])?).ok()
}

pub fn coin_id(key: &[u8]) -> Option<CoinId> {
    be_u32(&body(key, &[COIN])?).map(CoinId)
}

pub fn symbol_name(key: &[u8]) -> Option<String> {
    String::from_utf8(body(key, &[SYMBOL])?).ok()
}

pub fn candidate_pubkey(key: &[u8]) -> Option<PubKey> {
    PubKey::from_slice(&body(key, &[CANDIDATE])?).ok()
}

pub fn used_check_hash(key: &[u8]) -> Option<Hash> {
    body(key, &[USED_CHECK])?.try_into().ok()
}

pub fn pool_pair(key: &[u8]) -> Option<PairKey> {
    let b = body(key, &[POOL])?;
    if b.len() != 8 {
        return None;
    }
    Some(PairKey(CoinId(be_u32(&b[..4])?), CoinId(be_u32(&b[4..])?)))
}

pub fn pool_id_value(key: &[u8]) -> Option<u32> {
    be_u32(&body(key, &[POOL_ID])?)
}
