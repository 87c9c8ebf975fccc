//! Daily-bonus eligibility and reward arithmetic.
//!
//! Both the read-only status check and the collection flow classify the
//! current moment with [`BonusWindow::classify`]; neither has its own notion
//! of eligibility.

use chrono::{DateTime, Duration, Utc};
use tally_types::Bonus;

use crate::config::LedgerConfig;

/// Where `now` falls relative to the last collection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BonusWindow {
    /// No bonus record yet.
    First,
    /// Less than one interval since the last collection (or the clock went
    /// backwards). Eligible again at `next_eligible_at`.
    TooSoon { next_eligible_at: DateTime<Utc> },
    /// Between one and two intervals: the streak continues.
    Continue,
    /// Two intervals or more: the streak restarts.
    Broken,
}

impl BonusWindow {
    pub fn classify(bonus: Option<&Bonus>, now: DateTime<Utc>, interval: Duration) -> Self {
        let Some(bonus) = bonus else {
            return Self::First;
        };
        let elapsed = now.signed_duration_since(bonus.last_login);
        if elapsed < interval {
            Self::TooSoon {
                next_eligible_at: bonus
                    .last_login
                    .checked_add_signed(interval)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            }
        } else if elapsed < interval.checked_add(&interval).unwrap_or(Duration::MAX) {
            Self::Continue
        } else {
            Self::Broken
        }
    }

    pub fn is_eligible(&self) -> bool {
        !matches!(self, Self::TooSoon { .. })
    }

    /// The streak after collecting in this window, or `None` if collection
    /// is not allowed.
    pub fn next_streak(&self, current: u32) -> Option<u32> {
        match self {
            Self::TooSoon { .. } => None,
            Self::Continue => Some(current.saturating_add(1)),
            Self::First | Self::Broken => Some(1),
        }
    }
}

/// Points paid for collecting with the given post-increment streak.
///
/// `base + step * (streak - 1)`; with the defaults, 1000 per day of streak.
pub fn daily_bonus_reward(streak: u32, config: &LedgerConfig) -> u64 {
    let extra_days = u64::from(streak.saturating_sub(1));
    config
        .daily_bonus_base
        .saturating_add(config.daily_bonus_step.saturating_mul(extra_days))
}
