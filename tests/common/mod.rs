//! Shared harness for the integration tests: deterministic ed25519 keys,
//! signed envelopes and a genesis-to-block driver.

#![allow(dead_code)]

use ed25519_dalek::{Signer, SigningKey};

use pos_ledger::chain::{Blockchain, EndBlock};
use pos_ledger::codec;
use pos_ledger::config::EngineConfig;
use pos_ledger::crypto::{address_from_pubkey, hash_bytes_sha256, validator_address, MultiSignature, SingleSignature};
use pos_ledger::pos::candidates::{Candidate, CandidateStatus};
use pos_ledger::state::coins::NewCoin;
use pos_ledger::pos::validators::{Validator, ValidatorSet};
use pos_ledger::pos::VoteInfo;
use pos_ledger::state::export::export;
use pos_ledger::state::State;
use pos_ledger::stf::Response;
use pos_ledger::tx::{Transaction, TxData, SIGNATURE_MULTI, SIGNATURE_SINGLE};
use pos_ledger::types::{Address, Amount, CoinId, Hash, PubKey};

pub struct Key {
    pub sk: SigningKey,
    pub pubkey: PubKey,
    pub address: Address,
}

impl Key {
    pub fn from_seed(seed: u8) -> Self {
        let sk = SigningKey::from_bytes(&[seed; 32]);
        let pubkey = PubKey(sk.verifying_key().to_bytes());
        Self { address: address_from_pubkey(&pubkey), pubkey, sk }
    }

    pub fn sign(&self, msg: &Hash) -> SingleSignature {
        SingleSignature { pubkey: self.pubkey, signature: self.sk.sign(msg).to_bytes() }
    }

    /// Signs over the redeemer address, as a check lock proof.
    pub fn lock_proof(&self, redeemer: &Address) -> [u8; 64] {
        let hash = hash_bytes_sha256(&codec::lock_proof_bytes(redeemer));
        self.sk.sign(&hash).to_bytes()
    }
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        unbond_period: 3,
        move_stake_period: 2,
        jail_period: 10,
        absent_window: 4,
        absent_threshold: 2,
        commission_edit_period: 5,
        ..EngineConfig::default()
    }
}

pub fn unsigned(nonce: u64, gas_coin: CoinId, data: &TxData) -> Transaction {
    Transaction {
        nonce,
        chain_id: EngineConfig::default().chain_id,
        gas_price: 1,
        gas_coin,
        tx_type: data.kind().byte(),
        data: data.encode().expect("payload encodes"),
        payload: Vec::new(),
        service_data: Vec::new(),
        signature_type: SIGNATURE_SINGLE,
        signature_data: Vec::new(),
    }
}

pub fn sign_tx(key: &Key, mut tx: Transaction) -> Vec<u8> {
    tx.signature_type = SIGNATURE_SINGLE;
    let sig = key.sign(&tx.signing_hash());
    tx.signature_data = codec::encode(&sig).expect("signature encodes");
    tx.encode().expect("tx encodes")
}

pub fn signed(key: &Key, nonce: u64, data: TxData) -> Vec<u8> {
    sign_tx(key, unsigned(nonce, CoinId::BASE, &data))
}

pub fn signed_multi(multisig: Address, signers: &[&Key], nonce: u64, data: TxData) -> Vec<u8> {
    let mut tx = unsigned(nonce, CoinId::BASE, &data);
    tx.signature_type = SIGNATURE_MULTI;
    let hash = tx.signing_hash();
    let ms = MultiSignature { multisig, signatures: signers.iter().map(|k| k.sign(&hash)).collect() };
    tx.signature_data = codec::encode(&ms).expect("multisignature encodes");
    tx.encode().expect("tx encodes")
}

/// Adds an online candidate self-staked in base and puts it in the validator set.
pub fn seed_validator(state: &mut State, cfg: &EngineConfig, key: &Key, stake: Amount) {
    let mut cand = Candidate::new(key.pubkey, key.address, key.address, key.address, 10, 0);
    cand.add_stake(key.address, CoinId::BASE, stake, stake);
    cand.status = CandidateStatus::Online;
    state.candidates.put(cand);

    let mut set = state.validators.get().expect("validator set readable");
    set.validators.push(Validator::new(key.pubkey, key.address, stake, cfg.absent_window));
    state.validators.put(ValidatorSet::new(set.validators));
}

/// Registers a coin at genesis under the next free id and credits its whole volume to `holder`.
pub fn seed_coin(state: &mut State, new_coin: NewCoin, holder: &Address) -> CoinId {
    let id = state.app.next_coin_id().expect("counters readable");
    let volume = new_coin.volume;
    state.coins.insert(id, new_coin).expect("coin inserts");
    state.accounts.add_balance(holder, id, volume).expect("balance credits");
    id
}

pub fn token(symbol: &str, volume: Amount) -> NewCoin {
    NewCoin {
        symbol: symbol.into(),
        name: symbol.to_lowercase(),
        volume,
        reserve: 0,
        crr: 0,
        max_supply: volume * 10,
        mintable: true,
        burnable: true,
        owner: None,
    }
}

pub fn curve_coin(symbol: &str, volume: Amount, reserve: Amount, crr: u32) -> NewCoin {
    NewCoin {
        symbol: symbol.into(),
        name: symbol.to_lowercase(),
        volume,
        reserve,
        crr,
        max_supply: volume * 1_000,
        mintable: false,
        burnable: false,
        owner: None,
    }
}

/// Builds genesis from whatever `setup` writes into a scratch state.
pub fn genesis(cfg: EngineConfig, setup: impl FnOnce(&mut State)) -> Blockchain {
    let mut scratch = State::in_memory(0);
    setup(&mut scratch);
    let snapshot = export(&scratch, 0).expect("scratch state exports");
    let mut chain = Blockchain::new(cfg).expect("config is valid");
    chain.init_genesis(snapshot).expect("genesis loads");
    chain
}

/// Votes in which every current validator signed.
pub fn all_signed(chain: &Blockchain) -> Vec<VoteInfo> {
    votes_except(chain, &[])
}

pub fn votes_except(chain: &Blockchain, absent: &[PubKey]) -> Vec<VoteInfo> {
    let set = chain.state().validators.get().expect("validator set readable");
    set.validators
        .iter()
        .map(|v| VoteInfo { address: validator_address(&v.pubkey), signed: !absent.contains(&v.pubkey) })
        .collect()
}

/// Runs one full block with everyone signing.
pub fn run_block(chain: &mut Blockchain, txs: &[Vec<u8>]) -> (Vec<Response>, EndBlock) {
    let votes = all_signed(chain);
    run_block_with(chain, &votes, txs)
}

pub fn run_block_with(chain: &mut Blockchain, votes: &[VoteInfo], txs: &[Vec<u8>]) -> (Vec<Response>, EndBlock) {
    let height = chain.height() + 1;
    chain.begin_block(height, votes, &[]).expect("begin block");
    let responses = txs.iter().map(|raw| chain.deliver_tx(raw)).collect();
    let end = chain.end_block().expect("end block");
    chain.commit().expect("commit");
    (responses, end)
}

pub fn assert_ok(resp: &Response) {
    assert!(resp.is_ok(), "code {}: {}", resp.code, resp.log);
}
