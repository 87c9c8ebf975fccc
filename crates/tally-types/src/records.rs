use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::{TaskId, UserId};

/// Profile fields supplied at registration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: Option<String>,
    pub onboarding: bool,
}

/// A registered user.
///
/// `referrals` holds weak references: the ids of users who registered with
/// this user's code, in registration order. `tasks_completed` is the single
/// source of truth for "has this task already paid out".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub referral_code: String,
    pub referrals: Vec<UserId>,
    pub tasks_completed: BTreeSet<TaskId>,
    pub onboarding: bool,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A fresh user with no referrals and no completed tasks.
    pub fn new(
        username: impl Into<String>,
        referral_code: impl Into<String>,
        profile: Profile,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: UserId::new(),
            username: username.into(),
            referral_code: referral_code.into(),
            referrals: Vec::new(),
            tasks_completed: BTreeSet::new(),
            onboarding: profile.onboarding,
            display_name: profile.display_name,
            created_at,
        }
    }

    pub fn has_completed(&self, task: &TaskId) -> bool {
        self.tasks_completed.contains(task)
    }
}

/// Points balance, one per user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Points {
    pub user_id: UserId,
    pub points: u64,
    /// Owned by the energy system; the ledger never reads or writes it.
    pub energy_stamp: Option<DateTime<Utc>>,
}

impl Points {
    pub fn new(user_id: UserId, points: u64) -> Self {
        Self {
            user_id,
            points,
            energy_stamp: None,
        }
    }

    /// Add `amount` to the balance. Balances only ever grow.
    pub fn credit(&mut self, amount: u64) -> Result<u64, TypeError> {
        self.points = self
            .points
            .checked_add(amount)
            .ok_or(TypeError::BalanceOverflow {
                balance: self.points,
                amount,
            })?;
        Ok(self.points)
    }
}

/// Daily-bonus streak state. Absent until the first collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bonus {
    pub user_id: UserId,
    pub last_login: DateTime<Utc>,
    pub login_streak: u32,
}

/// A catalog task.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    /// Reward paid once per user on completion.
    pub points: u64,
    pub created_at: DateTime<Utc>,
}
