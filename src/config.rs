//! Configuration recognized by the masternode core (§6): `enabled`,
//! `passphrase`, `cra_address`, plus the two timer periods, which default to
//! the spec constants when omitted.

use crate::address::Address;
use crate::constants::masternode::{HEARTBEAT_TIMER_PERIOD_SECS, WATCHDOG_TIMER_PERIOD_SECS};
use crate::error::MasternodeError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasternodeConfig {
    /// If false, no agent is created.
    pub enabled: bool,
    /// Used to unlock the wallet for each sign call.
    pub passphrase: String,
    /// The masternode's operator address; must match a wallet the account
    /// manager can find.
    pub cra_address: Address,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_watchdog_interval")]
    pub watchdog_interval_secs: u64,
}

fn default_heartbeat_interval() -> u64 {
    HEARTBEAT_TIMER_PERIOD_SECS
}

fn default_watchdog_interval() -> u64 {
    WATCHDOG_TIMER_PERIOD_SECS
}

impl MasternodeConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            passphrase: String::new(),
            cra_address: Address::new([0u8; 20]),
            heartbeat_interval_secs: default_heartbeat_interval(),
            watchdog_interval_secs: default_watchdog_interval(),
        }
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, MasternodeError> {
        let contents = fs::read_to_string(path)?;
        let config: MasternodeConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), MasternodeError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}
