//src/crypto.rs

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::codec::multisig_preimage;
use crate::types::{Address, Hash, PubKey};

const DOM_MERKLE_NODE: &[u8] = b"MRKL";
const DOM_LEAF: &[u8] = b"LEAF";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigError {
    #[error("malformed public key")]
    BadPublicKey,
    #[error("signature does not verify")]
    BadSignature,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleSignature {
    pub pubkey: PubKey,
    #[serde_as(as = "Bytes")]
    pub signature: [u8; 64],
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiSignature {
    pub multisig: Address,
    pub signatures: Vec<SingleSignature>,
}

/// Recovers the signer address of a message hash. Signature cryptography
/// is a collaborator concern; the engine only needs this capability.
pub trait SignatureVerifier: Send + Sync {
    fn recover(&self, msg_hash: &Hash, sig: &SingleSignature) -> Result<Address, SigError>;
}

/// Default verifier: ed25519 keys, address = last 20 bytes of SHA-256(pubkey).
#[derive(Clone, Copy, Debug, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn recover(&self, msg_hash: &Hash, sig: &SingleSignature) -> Result<Address, SigError> {
        verify_ed25519(&sig.pubkey.0, &sig.signature, msg_hash)?;
        Ok(address_from_pubkey(&sig.pubkey))
    }
}

pub fn verify_ed25519(pubkey: &[u8; 32], sig_bytes: &[u8; 64], msg: &[u8]) -> Result<(), SigError> {
    let pk = VerifyingKey::from_bytes(pubkey).map_err(|_| SigError::BadPublicKey)?;
    let sig = Signature::from_bytes(sig_bytes);
    pk.verify(msg, &sig).map_err(|_| SigError::BadSignature)
}

pub fn hash_bytes_sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

fn hash(bytes: &[u8]) -> Hash {
    hash_bytes_sha256(bytes)
}

/// Account address of an ed25519 key.
pub fn address_from_pubkey(pubkey: &PubKey) -> Address {
    let h = hash(pubkey.as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&h[12..]);
    Address(out)
}

/// Consensus address of a validator key (first 20 bytes, as consensus engines report it).
pub fn validator_address(pubkey: &PubKey) -> Address {
    let h = hash(pubkey.as_bytes());
    let mut out = [0u8; 20];
    out.copy_from_slice(&h[..20]);
    Address(out)
}

/// Deterministic multisig address for a (threshold, weights, owners) tuple.
pub fn multisig_address(threshold: u32, weights: &[u32], addresses: &[Address]) -> Address {
    let h = hash(&multisig_preimage(threshold, weights, addresses));
    let mut out = [0u8; 20];
    out.copy_from_slice(&h[12..]);
    Address(out)
}

/// Leaf of the state tree: H("LEAF" || len(key) || key || value).
pub fn leaf_hash(key: &[u8], value: &[u8]) -> Hash {
    let mut buf = Vec::with_capacity(DOM_LEAF.len() + 4 + key.len() + value.len());
    buf.extend_from_slice(DOM_LEAF);
    buf.extend_from_slice(&(key.len() as u32).to_le_bytes());
    buf.extend_from_slice(key);
    buf.extend_from_slice(value);
    hash(&buf)
}

fn parent_hash(left: &Hash, right: &Hash) -> Hash {
    let mut buf = Vec::with_capacity(4 + 32 + 32);
    buf.extend_from_slice(DOM_MERKLE_NODE);
    buf.extend_from_slice(left);
    buf.extend_from_slice(right);
    hash(&buf)
}

pub fn merkle_root(leaves: &[Hash]) -> Hash {
    match leaves.len() {
        // empty tree: hash of empty bytes
        0 => hash(&[]),
        1 => leaves[0],
        _ => {
            let mut level: Vec<Hash> = leaves.to_vec();
            while level.len() > 1 {
                if level.len() % 2 == 1 {
                    let last = level[level.len() - 1];
                    level.push(last);
                }
                level = level
                    .chunks(2)
                    .map(|pair| parent_hash(&pair[0], &pair[1]))
                    .collect();
            }
            level[0]
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_sig::*;
    use super::*;

    #[test]
    fn verifier_recovers_signer_address() {
        let (sk, pk) = keypair_from_seed([7u8; 32]);
        let msg = hash_bytes_sha256(b"hello");
        let sig = sign(&sk, &msg);
        let addr = Ed25519Verifier.recover(&msg, &sig).expect("valid");
        assert_eq!(addr, address_from_pubkey(&pk));
    }

    #[test]
    fn verifier_rejects_other_message() {
        let (sk, _) = keypair_from_seed([7u8; 32]);
        let sig = sign(&sk, &hash_bytes_sha256(b"hello"));
        let err = Ed25519Verifier.recover(&hash_bytes_sha256(b"bye"), &sig).unwrap_err();
        assert_eq!(err, SigError::BadSignature);
    }

    #[test]
    fn merkle_root_shapes() {
        let a = hash(b"a");
        let b = hash(b"b");
        let c = hash(b"c");
        assert_eq!(merkle_root(&[]), hash(&[]));
        assert_eq!(merkle_root(&[a]), a);
        assert_eq!(merkle_root(&[a, b]), parent_hash(&a, &b));
        // odd levels duplicate the last node
        assert_eq!(
            merkle_root(&[a, b, c]),
            parent_hash(&parent_hash(&a, &b), &parent_hash(&c, &c))
        );
    }

    #[test]
    fn account_and_validator_addresses_differ() {
        let pk = PubKey([3u8; 32]);
        assert_ne!(address_from_pubkey(&pk), validator_address(&pk));
    }
}
