//! Committed table state and the write set applied to it.

use std::collections::{BTreeMap, HashMap};

use tally_types::{Bonus, Points, Task, TaskId, User, UserId};

use crate::error::{StoreError, StoreResult};
use crate::key::RecordKey;
use crate::snapshot::Snapshot;

/// Committed records plus unique-field indexes.
#[derive(Clone, Debug, Default)]
pub struct Tables {
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) points: BTreeMap<UserId, Points>,
    pub(crate) bonuses: BTreeMap<UserId, Bonus>,
    pub(crate) tasks: BTreeMap<TaskId, Task>,
    pub(crate) usernames: HashMap<String, UserId>,
    pub(crate) referral_codes: HashMap<String, UserId>,
    pub(crate) slugs: HashMap<String, TaskId>,
}

/// Writes buffered by one transaction, keyed by primary key.
#[derive(Clone, Debug, Default)]
pub struct WriteSet {
    pub(crate) users: BTreeMap<UserId, User>,
    pub(crate) points: BTreeMap<UserId, Points>,
    pub(crate) bonuses: BTreeMap<UserId, Bonus>,
    pub(crate) tasks: BTreeMap<TaskId, Task>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.points.is_empty()
            && self.bonuses.is_empty()
            && self.tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.users.len() + self.points.len() + self.bonuses.len() + self.tasks.len()
    }
}

impl Tables {
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Check the write set against unique and referential constraints.
    ///
    /// Runs before [`Tables::apply`]; once it passes, applying cannot fail.
    pub fn check(&self, writes: &WriteSet) -> StoreResult<()> {
        let mut usernames: HashMap<&str, UserId> = HashMap::new();
        let mut codes: HashMap<&str, UserId> = HashMap::new();
        for user in writes.users.values() {
            claim(&mut usernames, &self.usernames, "username", &user.username, user.id)?;
            claim(&mut codes, &self.referral_codes, "referral_code", &user.referral_code, user.id)?;
        }

        let mut slugs: HashMap<&str, TaskId> = HashMap::new();
        for task in writes.tasks.values() {
            claim(&mut slugs, &self.slugs, "slug", &task.slug, task.id)?;
        }

        let user_exists = |id: &UserId| self.users.contains_key(id) || writes.users.contains_key(id);
        for points in writes.points.values() {
            if !user_exists(&points.user_id) {
                return Err(StoreError::Integrity(format!(
                    "points record for unknown user {}",
                    points.user_id
                )));
            }
        }
        for bonus in writes.bonuses.values() {
            if !user_exists(&bonus.user_id) {
                return Err(StoreError::Integrity(format!(
                    "bonus record for unknown user {}",
                    bonus.user_id
                )));
            }
        }
        Ok(())
    }

    /// Apply a checked write set. Returns every key whose version must move.
    pub fn apply(&mut self, writes: WriteSet) -> Vec<RecordKey> {
        let mut touched = Vec::with_capacity(writes.len() * 3);

        for (id, user) in writes.users {
            if let Some(previous) = self.users.get(&id) {
                if previous.username != user.username {
                    self.usernames.remove(&previous.username);
                    touched.push(RecordKey::Username(previous.username.clone()));
                }
                if previous.referral_code != user.referral_code {
                    self.referral_codes.remove(&previous.referral_code);
                    touched.push(RecordKey::ReferralCode(previous.referral_code.clone()));
                }
            }
            self.usernames.insert(user.username.clone(), id);
            self.referral_codes.insert(user.referral_code.clone(), id);
            touched.push(RecordKey::User(id));
            touched.push(RecordKey::Username(user.username.clone()));
            touched.push(RecordKey::ReferralCode(user.referral_code.clone()));
            self.users.insert(id, user);
        }

        for (id, points) in writes.points {
            touched.push(RecordKey::Points(id));
            self.points.insert(id, points);
        }

        for (id, bonus) in writes.bonuses {
            touched.push(RecordKey::Bonus(id));
            self.bonuses.insert(id, bonus);
        }

        if !writes.tasks.is_empty() {
            touched.push(RecordKey::TaskList);
        }
        for (id, task) in writes.tasks {
            if let Some(previous) = self.tasks.get(&id) {
                if previous.slug != task.slug {
                    self.slugs.remove(&previous.slug);
                    touched.push(RecordKey::Slug(previous.slug.clone()));
                }
            }
            self.slugs.insert(task.slug.clone(), id);
            touched.push(RecordKey::Task(id));
            touched.push(RecordKey::Slug(task.slug.clone()));
            self.tasks.insert(id, task);
        }

        touched
    }

    /// Rebuild tables (and their indexes) from a persisted snapshot.
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let mut writes = WriteSet::default();
        for user in snapshot.users {
            writes.users.insert(user.id, user);
        }
        for points in snapshot.points {
            writes.points.insert(points.user_id, points);
        }
        for bonus in snapshot.bonuses {
            writes.bonuses.insert(bonus.user_id, bonus);
        }
        for task in snapshot.tasks {
            writes.tasks.insert(task.id, task);
        }

        let mut tables = Self::default();
        tables.check(&writes)?;
        tables.apply(writes);
        Ok(tables)
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            format: Snapshot::FORMAT,
            users: self.users.values().cloned().collect(),
            points: self.points.values().cloned().collect(),
            bonuses: self.bonuses.values().cloned().collect(),
            tasks: self.tasks.values().cloned().collect(),
        }
    }
}

/// Reserve `value` for `owner`, failing if another record already holds it
/// either in the committed index or earlier in the same write set.
fn claim<'a, Id: Copy + PartialEq>(
    pending: &mut HashMap<&'a str, Id>,
    committed: &HashMap<String, Id>,
    field: &'static str,
    value: &'a str,
    owner: Id,
) -> StoreResult<()> {
    let taken_by_other = |holder: &Id| *holder != owner;
    if committed.get(value).is_some_and(taken_by_other)
        || pending.get(value).is_some_and(taken_by_other)
    {
        return Err(StoreError::UniqueViolation {
            field,
            value: value.to_string(),
        });
    }
    pending.insert(value, owner);
    Ok(())
}
