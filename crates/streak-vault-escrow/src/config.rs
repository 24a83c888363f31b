//! Vault program configuration.

use serde::{Deserialize, Serialize};
use streak_vault_core::Lamports;

/// Minimum spacing between check-ins: 20 hours.
pub const MIN_CHECK_IN_INTERVAL_SECS: i64 = 20 * 60 * 60;

/// Longest gap that still continues a streak: 48 hours.
pub const MAX_CHECK_IN_INTERVAL_SECS: i64 = 48 * 60 * 60;

/// Lamports locked in a vault entry's address while it is open.
pub const VAULT_RESERVATION_FEE: Lamports = 1_600_000;

/// What a check-in past the maximum interval does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatePolicy {
    /// Accept the check-in and restart the streak at 1.
    #[default]
    Reset,
    /// Reject the check-in with `TooLate`; the entry is left unchanged.
    Reject,
}

/// Configuration for the vault program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Seconds that must pass between check-ins.
    pub min_check_in_interval_secs: i64,
    /// Seconds after which a check-in is late. `None` disables the bound.
    pub max_check_in_interval_secs: Option<i64>,
    /// Handling of late check-ins.
    pub late_policy: LatePolicy,
    /// Charged to the owner at initialize, refunded at withdraw.
    pub reservation_fee: Lamports,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            min_check_in_interval_secs: MIN_CHECK_IN_INTERVAL_SECS,
            max_check_in_interval_secs: Some(MAX_CHECK_IN_INTERVAL_SECS),
            late_policy: LatePolicy::Reset,
            reservation_fee: VAULT_RESERVATION_FEE,
        }
    }
}
