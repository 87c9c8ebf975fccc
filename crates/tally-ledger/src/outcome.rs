use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tally_types::{Profile, UserId};

/// Input to [`RewardLedger::register`](crate::RewardLedger::register).
#[derive(Clone, Debug, Default)]
pub struct Registration {
    pub username: String,
    /// Code of the user who referred this one, if any.
    pub referral_code: Option<String>,
    pub profile: Profile,
}

impl Registration {
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            ..Self::default()
        }
    }

    pub fn with_referral_code(mut self, code: impl Into<String>) -> Self {
        self.referral_code = Some(code.into());
        self
    }

    pub fn with_profile(mut self, profile: Profile) -> Self {
        self.profile = profile;
        self
    }
}

/// Result of a registration attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created {
        user_id: UserId,
        referral_code: String,
        /// The referrer who was paid, if the supplied code resolved.
        referred_by: Option<UserId>,
    },
    /// The username is taken. Nothing was written.
    AlreadyExists,
}

impl RegistrationOutcome {
    pub fn created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Result of a successful task completion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub task_slug: String,
    pub reward: u64,
    pub total_points: u64,
}

/// Read-only view of a user's daily-bonus state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusStatus {
    pub is_eligible: bool,
    pub login_streak: u32,
    /// When the next collection opens; `None` if it is open now.
    pub next_eligible_at: Option<DateTime<Utc>>,
}

/// Result of a successful daily-bonus collection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusCollection {
    pub login_streak: u32,
    pub bonus_points: u64,
    pub total_points: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_builder() {
        let registration = Registration::new("bob")
            .with_referral_code("AbC12345")
            .with_profile(Profile {
                display_name: Some("Bob".into()),
                onboarding: true,
            });
        assert_eq!(registration.username, "bob");
        assert_eq!(registration.referral_code.as_deref(), Some("AbC12345"));
        assert!(registration.profile.onboarding);

        assert!(Registration::new("carol").referral_code.is_none());
    }

    #[test]
    fn only_created_reports_created() {
        let created = RegistrationOutcome::Created {
            user_id: UserId::new(),
            referral_code: "code".into(),
            referred_by: None,
        };
        assert!(created.created());
        assert!(!RegistrationOutcome::AlreadyExists.created());
    }
}
