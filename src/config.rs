// src/config.rs

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use thiserror::Error;

use crate::types::{coins, Address, Amount};

pub const MAX_TX_LENGTH: usize = 1024;
pub const MAX_PAYLOAD_LENGTH: usize = 128;
pub const MAX_SERVICE_DATA_LENGTH: usize = 128;

/// Default chain id (mainnet = 1, testnet = 2).
pub const CHAIN_ID: u8 = 1;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables of the engine. Everything here is consensus-relevant except
/// `keep_last_states` and the invariant checker settings.
#[serde_as]
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub chain_id: u8,
    /// Committed versions retained for check views; older ones are pruned.
    pub keep_last_states: u64,

    pub unbond_period: u64,
    pub move_stake_period: u64,
    pub jail_period: u64,
    /// Rewards are paid and the validator set recomputed every `reward_cycle` blocks.
    pub reward_cycle: u64,
    pub absent_window: usize,
    pub absent_threshold: usize,
    pub max_delegators: usize,
    pub commission_edit_period: u64,
    /// Height step of the validator / candidate set size schedule.
    pub set_size_step: u64,

    pub dao_address: Address,
    pub developers_address: Address,
    pub dao_percent: u32,
    pub developers_percent: u32,

    /// Initial block gas limit (state keeps the live value).
    pub max_gas: u64,

    /// Run the global invariant checker every N committed blocks (0 = never).
    pub invariant_check_interval: u64,
    #[serde_as(as = "DisplayFromStr")]
    pub invariant_log_tolerance: Amount,
    #[serde_as(as = "DisplayFromStr")]
    pub invariant_halt_tolerance: Amount,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chain_id: CHAIN_ID,
            keep_last_states: 120,
            unbond_period: 518_400,
            move_stake_period: 518_400,
            jail_period: 1_440,
            reward_cycle: 12,
            absent_window: 24,
            absent_threshold: 12,
            max_delegators: 1_000,
            commission_edit_period: 3_100,
            set_size_step: 518_400,
            dao_address: Address([0xDA; 20]),
            developers_address: Address([0xDE; 20]),
            dao_percent: 10,
            developers_percent: 10,
            max_gas: 100_000,
            invariant_check_interval: 1,
            invariant_log_tolerance: 1_000,
            invariant_halt_tolerance: coins(1),
        }
    }
}

impl EngineConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: EngineConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dao_percent + self.developers_percent > 100 {
            return Err(ConfigError::Invalid("dao + developers share exceeds 100%".into()));
        }
        if self.absent_window == 0 || self.absent_threshold >= self.absent_window {
            return Err(ConfigError::Invalid("absent threshold must be below a non-empty window".into()));
        }
        if self.reward_cycle == 0 || self.set_size_step == 0 {
            return Err(ConfigError::Invalid("reward cycle and set size step must be positive".into()));
        }
        if self.max_delegators == 0 {
            return Err(ConfigError::Invalid("max delegators must be positive".into()));
        }
        if self.invariant_log_tolerance > self.invariant_halt_tolerance {
            return Err(ConfigError::Invalid("log tolerance above halt tolerance".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = EngineConfig::from_json(r#"{ "unbond_period": 10, "invariant_halt_tolerance": "5000" }"#)
            .expect("valid");
        assert_eq!(cfg.unbond_period, 10);
        assert_eq!(cfg.invariant_halt_tolerance, 5_000);
        assert_eq!(cfg.reward_cycle, 12);
    }

    #[test]
    fn rejects_bad_split() {
        let err = EngineConfig::from_json(r#"{ "dao_percent": 60, "developers_percent": 60 }"#).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn rejects_threshold_outside_window() {
        let err = EngineConfig::from_json(r#"{ "absent_window": 4, "absent_threshold": 4 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
