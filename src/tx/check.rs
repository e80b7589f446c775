// src/tx/check.rs

//! Bearer checks: an issuer pre-signs a transfer that whoever knows the
//! passphrase can redeem once before the due block.

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, Bytes};

use crate::codec::{self, check_signing_bytes, lock_proof_bytes};
use crate::config::MAX_TX_LENGTH;
use crate::crypto::{hash_bytes_sha256, verify_ed25519, SignatureVerifier, SingleSignature};
use crate::error::TxError;
use crate::state::commission::PriceTable;
use crate::state::State;
use crate::tx::{tag, Exec, Tags, TxHandler};
use crate::types::{Address, Amount, AmountStr, CoinId, Hash, PubKey};

pub const MAX_CHECK_NONCE_LEN: usize = 16;

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub nonce: Vec<u8>,
    pub chain_id: u8,
    pub due_block: u64,
    pub coin: CoinId,
    #[serde_as(as = "AmountStr")]
    pub value: Amount,
    pub gas_coin: CoinId,
    /// Public key derived from the passphrase.
    pub lock: PubKey,
    pub signature: SingleSignature,
}

impl Check {
    pub fn decode(raw: &[u8]) -> Result<Self, TxError> {
        codec::decode_limited(raw, MAX_TX_LENGTH as u64).map_err(|e| TxError::DecodeError(e.to_string()))
    }

    pub fn signing_hash(&self) -> Hash {
        hash_bytes_sha256(&check_signing_bytes(self))
    }

    /// Key under which a redeemed check is remembered.
    pub fn hash(&self) -> Hash {
        self.signing_hash()
    }

    pub fn issuer(&self, verifier: &dyn SignatureVerifier) -> Result<Address, TxError> {
        verifier
            .recover(&self.signing_hash(), &self.signature)
            .map_err(|e| TxError::InvalidSignature(e.to_string()))
    }
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedeemCheckData {
    pub raw_check: Vec<u8>,
    /// Passphrase key's signature over the redeemer address.
    #[serde_as(as = "Bytes")]
    pub proof: [u8; 64],
}

impl RedeemCheckData {
    /// Decodes and validates the check against the redeeming tx. Returns it with its issuer.
    fn verified(&self, ctx: &Exec<'_>, state: &State) -> Result<(Check, Address), TxError> {
        let check = Check::decode(&self.raw_check)?;
        if check.chain_id != ctx.cfg.chain_id {
            return Err(TxError::WrongChainId { expected: ctx.cfg.chain_id, got: check.chain_id });
        }
        if check.nonce.len() > MAX_CHECK_NONCE_LEN {
            return Err(TxError::TooLongNonce(check.nonce.len()));
        }
        if ctx.tx.gas_price != 1 {
            return Err(TxError::TooHighGasPrice(ctx.tx.gas_price));
        }
        if check.gas_coin != ctx.tx.gas_coin {
            return Err(TxError::WrongGasCoin { expected: check.gas_coin, got: ctx.tx.gas_coin });
        }
        state.require_coin(check.coin)?;
        let issuer = check.issuer(ctx.verifier)?;
        if check.due_block < ctx.height {
            return Err(TxError::CheckExpired(check.due_block));
        }
        if state.checks.is_used(&check.hash())? {
            return Err(TxError::CheckUsed);
        }
        let proof_hash = hash_bytes_sha256(&lock_proof_bytes(&ctx.sender));
        verify_ed25519(&check.lock.0, &self.proof, &proof_hash).map_err(|_| TxError::CheckInvalidLock)?;
        Ok((check, issuer))
    }
}

impl TxHandler for RedeemCheckData {
    fn price(&self, prices: &PriceTable) -> Amount {
        prices.redeem_check
    }

    /// The issuer pays the commission.
    fn payer(&self, ctx: &Exec<'_>, state: &State) -> Result<Address, TxError> {
        self.verified(ctx, state).map(|(_, issuer)| issuer)
    }

    fn run(&self, ctx: &mut Exec<'_>, state: &mut State) -> Result<Tags, TxError> {
        let (check, issuer) = self.verified(ctx, state)?;
        state.accounts.sub_balance(&issuer, check.coin, check.value)?;
        state.accounts.add_balance(&ctx.sender, check.coin, check.value)?;
        state.checks.mark_used(check.hash());
        Ok(vec![
            tag("tx.from", issuer),
            tag("tx.to", ctx.sender),
            tag("tx.coin_id", check.coin),
        ])
    }
}
