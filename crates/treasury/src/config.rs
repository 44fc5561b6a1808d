//! Treasury configuration

use crate::errors::{Result, TreasuryError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tally_types::{module_account, Address, MICROS_PER_SEC};
use tracing::info;

/// Default delay between gaining a name and starting to accrue: 7 days.
pub const DEFAULT_NAME_ENROLLMENT_GRACE_US: u64 = 7 * 24 * 60 * 60 * MICROS_PER_SEC;

/// Protocol-owned accounts the treasury moves funds between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleAccounts {
    /// Custody of name-pool rewards.
    pub name_rewards: Address,
    /// Custody of savings principal.
    pub savings_custody: Address,
    /// Custody of savings interest.
    pub savings_rewards: Address,
    /// Custody of accumulated validator rewards.
    pub validator_rewards: Address,
    /// Where collected funds arrive each block.
    pub fee_collector: Address,
}

impl Default for ModuleAccounts {
    fn default() -> Self {
        Self {
            name_rewards: module_account("name_rewards"),
            savings_custody: module_account("savings_custody"),
            savings_rewards: module_account("savings_rewards"),
            validator_rewards: module_account("validator_rewards"),
            fee_collector: module_account("fee_collector"),
        }
    }
}

impl ModuleAccounts {
    fn all(&self) -> [(&'static str, Address); 5] {
        [
            ("name_rewards", self.name_rewards),
            ("savings_custody", self.savings_custody),
            ("savings_rewards", self.savings_rewards),
            ("validator_rewards", self.validator_rewards),
            ("fee_collector", self.fee_collector),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreasuryConfig {
    pub name_enrollment_grace_us: u64,
    pub accounts: ModuleAccounts,
}

impl Default for TreasuryConfig {
    fn default() -> Self {
        Self {
            name_enrollment_grace_us: DEFAULT_NAME_ENROLLMENT_GRACE_US,
            accounts: ModuleAccounts::default(),
        }
    }
}

impl TreasuryConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TreasuryConfig = toml::from_str(content)
            .map_err(|e| TreasuryError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(target: "treasury", "Loading configuration from: {}", path.display());

        let content = std::fs::read_to_string(path)
            .map_err(|e| TreasuryError::Config(format!("Failed to read config file: {e}")))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for (name, account) in self.accounts.all() {
            if !seen.insert(account) {
                return Err(TreasuryError::Config(format!(
                    "module account {name} ({account}) is used twice"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_distinct() {
        let config = TreasuryConfig::default();
        config.validate().unwrap();
        assert_eq!(config.name_enrollment_grace_us, 604_800_000_000);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = TreasuryConfig::from_toml_str("name_enrollment_grace_us = 5000000\n").unwrap();
        assert_eq!(config.name_enrollment_grace_us, 5_000_000);
        assert_eq!(config.accounts, ModuleAccounts::default());
    }

    #[test]
    fn test_duplicate_accounts_rejected() {
        let fee = ModuleAccounts::default().fee_collector;
        let toml = format!(
            "[accounts]\nname_rewards = \"{fee}\"\n"
        );
        assert!(matches!(
            TreasuryConfig::from_toml_str(&toml),
            Err(TreasuryError::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("treasury.toml");
        std::fs::write(&path, "name_enrollment_grace_us = 42\n").unwrap();
        assert_eq!(TreasuryConfig::load(&path).unwrap().name_enrollment_grace_us, 42);
        assert!(TreasuryConfig::load(dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(TreasuryConfig::from_toml_str("name_enrollment_grace_us = \"soon\"").is_err());
    }
}
