//! Host configuration.
//!
//! Loaded from JSON; every field is optional and falls back to its default.
//!
//! ```json
//! {
//!   "vault": { "min_check_in_interval_secs": 72000, "late_policy": "reject" },
//!   "issuer": { "reservation_fee": 1300000 },
//!   "max_transaction_age_secs": 120
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use streak_vault_escrow::VaultConfig;
use streak_vault_issuer::IssuerConfig;

use crate::error::ConfigError;

/// How long a signed transaction stays acceptable, in seconds.
pub const DEFAULT_MAX_TRANSACTION_AGE_SECS: i64 = 120;

/// Configuration for the [`Host`](crate::Host).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Vault program settings.
    pub vault: VaultConfig,
    /// Issuer program settings.
    pub issuer: IssuerConfig,
    /// Maximum distance between a transaction's `issued_at` and host time.
    pub max_transaction_age_secs: i64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            issuer: IssuerConfig::default(),
            max_transaction_age_secs: DEFAULT_MAX_TRANSACTION_AGE_SECS,
        }
    }
}

impl HostConfig {
    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse, and validate a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject settings no program could run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vault.min_check_in_interval_secs < 0 {
            return Err(ConfigError::Invalid(
                "vault.min_check_in_interval_secs must not be negative".into(),
            ));
        }
        if let Some(max) = self.vault.max_check_in_interval_secs {
            if max < self.vault.min_check_in_interval_secs {
                return Err(ConfigError::Invalid(format!(
                    "vault.max_check_in_interval_secs ({}) is below the minimum ({})",
                    max, self.vault.min_check_in_interval_secs
                )));
            }
        }
        if self.max_transaction_age_secs < 0 {
            return Err(ConfigError::Invalid(
                "max_transaction_age_secs must not be negative".into(),
            ));
        }
        Ok(())
    }
}
