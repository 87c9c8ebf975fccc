use std::fmt;

use tally_types::{TaskId, UserId};

/// A unit of conflict detection.
///
/// Primary keys cover whole records; index keys cover lookups by a unique
/// field, so a transaction that observed "no user named X" conflicts with one
/// that creates X. `TaskList` covers catalog scans.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordKey {
    User(UserId),
    Points(UserId),
    Bonus(UserId),
    Task(TaskId),
    Username(String),
    ReferralCode(String),
    Slug(String),
    TaskList,
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{}", id.short_id()),
            Self::Points(id) => write!(f, "points:{}", id.short_id()),
            Self::Bonus(id) => write!(f, "bonus:{}", id.short_id()),
            Self::Task(id) => write!(f, "task:{}", id.short_id()),
            Self::Username(name) => write!(f, "username:{name}"),
            Self::ReferralCode(code) => write!(f, "referral-code:{code}"),
            Self::Slug(slug) => write!(f, "slug:{slug}"),
            Self::TaskList => write!(f, "tasks"),
        }
    }
}
