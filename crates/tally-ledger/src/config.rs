use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Tunables for the reward flows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Balance seeded into a new user's points record.
    pub starting_balance: u64,
    /// Credited to the referrer when a new user registers with their code.
    pub referral_bonus: u64,
    /// Length of the daily-bonus eligibility window, in seconds.
    pub bonus_interval_secs: u64,
    /// Reward for a streak of one.
    pub daily_bonus_base: u64,
    /// Extra reward per additional day of unbroken streak.
    pub daily_bonus_step: u64,
    /// Length of generated referral codes.
    pub referral_code_len: usize,
    /// Fresh codes tried before registration gives up on a collision.
    pub referral_code_attempts: u32,
    /// Times a flow is run before a transient failure is surfaced.
    pub max_attempts: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 1000,
            referral_bonus: 500,
            bonus_interval_secs: 24 * 60 * 60,
            daily_bonus_base: 1000,
            daily_bonus_step: 1000,
            referral_code_len: 8,
            referral_code_attempts: 5,
            max_attempts: 3,
        }
    }
}

impl LedgerConfig {
    /// The eligibility interval `T` as a duration.
    pub fn bonus_interval(&self) -> Duration {
        i64::try_from(self.bonus_interval_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}
