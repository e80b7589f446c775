// src/chain.rs

//! Block driver: genesis, begin/deliver/end/commit, and the concurrent
//! check pipeline over the last committed version.

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::crypto::{Ed25519Verifier, SignatureVerifier};
use crate::error::ChainError;
use crate::events::Event;
use crate::pos::governance::{apply_halt_votes, apply_price_votes};
use crate::pos::rewards::{accrue_block_reward, pay_rewards};
use crate::pos::slashing::{process_absence, process_evidence};
use crate::pos::staking::{
    evict_excess_candidates, evict_excess_delegators, recalc_stakes, recompute_validators, release_frozen,
};
use crate::pos::{Evidence, ValidatorUpdate, VoteInfo};
use crate::state::checker::check_invariants;
use crate::state::export::{export, import, Snapshot};
use crate::state::{CommitInfo, State};
use crate::stf::{apply, Response, TxContext};
use crate::types::{Amount, UNIT};

/// What `end_block` hands back to consensus.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EndBlock {
    pub validator_updates: Vec<ValidatorUpdate>,
    pub events: Vec<Event>,
}

pub struct Blockchain {
    state: State,
    cfg: EngineConfig,
    verifier: Box<dyn SignatureVerifier>,
    check_state: Mutex<State>,
    /// Last committed height.
    height: u64,
    /// Block between `begin_block` and `commit`.
    current: Option<u64>,
    accumulator: Amount,
    block_gas: u64,
    events: Vec<Event>,
}

fn power(stake: Amount) -> u64 {
    u64::try_from(stake / UNIT).unwrap_or(u64::MAX)
}

impl Blockchain {
    pub fn new(cfg: EngineConfig) -> Result<Self, ChainError> {
        Self::with_verifier(cfg, Box::new(Ed25519Verifier))
    }

    pub fn with_verifier(cfg: EngineConfig, verifier: Box<dyn SignatureVerifier>) -> Result<Self, ChainError> {
        cfg.validate()?;
        let state = State::in_memory(cfg.keep_last_states);
        let check_state = Mutex::new(state.check_view());
        Ok(Self {
            state,
            cfg,
            verifier,
            check_state,
            height: 0,
            current: None,
            accumulator: 0,
            block_gas: 0,
            events: Vec::new(),
        })
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Loads the genesis snapshot and commits it. Returns the initial validator powers.
    pub fn init_genesis(&mut self, snapshot: Snapshot) -> Result<Vec<ValidatorUpdate>, ChainError> {
        let height = snapshot.height;
        import(&mut self.state, snapshot)?;
        if self.state.app.max_gas()? == 0 {
            self.state.app.set_max_gas(self.cfg.max_gas)?;
        }
        let committed = self.state.commit()?;
        check_invariants(&self.state, &self.cfg)?;
        self.height = height;
        self.reset_check_state();

        let set = self.state.validators.get()?;
        info!(height, root = %hex::encode(committed.root), validators = set.validators.len(), "genesis loaded");
        Ok(set
            .validators
            .iter()
            .map(|v| ValidatorUpdate { pubkey: v.pubkey, power: power(v.total_bip_stake) })
            .collect())
    }

    /// Runs the start-of-block hooks. Returns `true` when the chain must halt at `height`.
    pub fn begin_block(&mut self, height: u64, votes: &[VoteInfo], evidence: &[Evidence]) -> Result<bool, ChainError> {
        let expected = self.height + 1;
        if height != expected || self.current.is_some() {
            return Err(ChainError::UnexpectedHeight { expected, got: height });
        }
        self.current = Some(height);
        self.accumulator = 0;
        self.block_gas = 0;

        let released = release_frozen(&mut self.state, height, &mut self.events)?;
        let absent = process_absence(&mut self.state, &self.cfg, height, votes, &mut self.events)?;
        let byzantine = process_evidence(&mut self.state, &self.cfg, height, evidence, &mut self.events)?;
        apply_price_votes(&mut self.state, height, &mut self.events)?;
        let halt = apply_halt_votes(&mut self.state, height)?;
        if halt {
            warn!(height, "halt votes reached two thirds of power");
        }
        debug!(height, released, absent = absent.len(), byzantine = byzantine.len(), "block begun");
        Ok(halt)
    }

    pub fn deliver_tx(&mut self, raw: &[u8]) -> Response {
        let height = self.current.unwrap_or(self.height + 1);
        let mut ctx = TxContext {
            height,
            check_only: false,
            cfg: &self.cfg,
            verifier: self.verifier.as_ref(),
            reward_accumulator: &mut self.accumulator,
            block_gas: &mut self.block_gas,
        };
        apply(&mut self.state, raw, &mut ctx)
    }

    /// Validates `raw` against the last committed state plus earlier
    /// checked transactions. Never touches the live state.
    pub fn check_tx(&self, raw: &[u8]) -> Response {
        let mut accumulator = 0;
        let mut block_gas = 0;
        let mut ctx = TxContext {
            height: self.height + 1,
            check_only: true,
            cfg: &self.cfg,
            verifier: self.verifier.as_ref(),
            reward_accumulator: &mut accumulator,
            block_gas: &mut block_gas,
        };
        let mut check = self.check_state.lock();
        apply(&mut check, raw, &mut ctx)
    }

    /// Distributes the block reward and, on reward cycles or when a
    /// validator is leaving, pays rewards and recomputes the set.
    pub fn end_block(&mut self) -> Result<EndBlock, ChainError> {
        let height = self.current.ok_or(ChainError::NoBlock)?;
        let collected = std::mem::take(&mut self.accumulator);
        let emitted = accrue_block_reward(&mut self.state, height, collected)?;

        let leaving = self.state.validators.get()?.any_pending_removal();
        let mut updates = Vec::new();
        if height % self.cfg.reward_cycle == 0 || leaving {
            pay_rewards(&mut self.state, &self.cfg, &mut self.events)?;
            recalc_stakes(&mut self.state)?;
            evict_excess_delegators(&mut self.state, &self.cfg, &mut self.events)?;
            let evicted = evict_excess_candidates(&mut self.state, &self.cfg, height)?;
            updates = recompute_validators(&mut self.state, &self.cfg, height)?;
            info!(height, updates = updates.len(), evicted = evicted.len(), "validator set recomputed");
        }
        debug!(height, emitted, collected, gas = self.block_gas, "block ended");
        Ok(EndBlock { validator_updates: updates, events: std::mem::take(&mut self.events) })
    }

    /// Persists the block and refreshes the check pipeline.
    pub fn commit(&mut self) -> Result<CommitInfo, ChainError> {
        let height = self.current.take().ok_or(ChainError::NoBlock)?;
        let committed = self.state.commit()?;
        self.height = height;
        let interval = self.cfg.invariant_check_interval;
        if interval > 0 && height % interval == 0 {
            check_invariants(&self.state, &self.cfg)?;
        }
        self.reset_check_state();
        self.block_gas = 0;
        info!(height, version = committed.version, root = %hex::encode(committed.root), "block committed");
        Ok(committed)
    }

    pub fn export(&self) -> Result<Snapshot, ChainError> {
        Ok(export(&self.state, self.height)?)
    }

    fn reset_check_state(&mut self) {
        *self.check_state.lock() = self.state.check_view();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_must_arrive_in_order() {
        let mut chain = Blockchain::new(EngineConfig::default()).unwrap();
        assert!(matches!(chain.end_block(), Err(ChainError::NoBlock)));
        assert!(matches!(
            chain.begin_block(2, &[], &[]),
            Err(ChainError::UnexpectedHeight { expected: 1, got: 2 })
        ));
        assert!(!chain.begin_block(1, &[], &[]).unwrap());
        assert!(chain.begin_block(1, &[], &[]).is_err());
        let end = chain.end_block().unwrap();
        assert!(end.validator_updates.is_empty());
        chain.commit().unwrap();
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn emission_without_signers_is_burned() {
        let mut chain = Blockchain::new(EngineConfig::default()).unwrap();
        chain.begin_block(1, &[], &[]).unwrap();
        chain.end_block().unwrap();
        chain.commit().unwrap();
        let app = chain.state().app.get().unwrap();
        assert!(app.emission > 0);
        assert_eq!(app.emission, app.total_slashed);
    }
}
