use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use tally_types::{Bonus, Points, Task, User, UserId};

use crate::error::{StoreError, StoreResult};
use crate::key::RecordKey;
use crate::snapshot;
use crate::tables::{Tables, WriteSet};
use crate::traits::{LedgerStore, LedgerTransaction};

/// In-memory ledger store with optimistic concurrency control.
///
/// Transactions read committed state directly, remember the version of every
/// key they looked at, and buffer their writes. Commit takes the single
/// write lock, re-checks those versions, and either applies the whole write
/// set or fails with [`StoreError::Conflict`]. When opened with a snapshot
/// path, every commit is also persisted before it becomes visible.
pub struct InMemoryLedgerStore {
    shared: Arc<Shared>,
}

struct Shared {
    state: RwLock<StoreState>,
    snapshot_path: Option<PathBuf>,
    next_tx: AtomicU64,
}

#[derive(Default)]
struct StoreState {
    tables: Tables,
    versions: HashMap<RecordKey, u64>,
    revision: u64,
}

impl StoreState {
    fn version(&self, key: &RecordKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

impl Shared {
    fn read(&self) -> StoreResult<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| StoreError::Unavailable("store read lock poisoned".into()))
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| StoreError::Unavailable("store write lock poisoned".into()))
    }
}

impl InMemoryLedgerStore {
    /// Create a new empty, purely in-memory store.
    pub fn new() -> Self {
        Self::with_state(Tables::default(), None)
    }

    /// Open a store persisted at `path`, loading the existing snapshot if
    /// there is one.
    ///
    /// Every commit rewrites and fsyncs the whole snapshot while holding the
    /// store's write lock, blocking the calling thread and every other
    /// transaction until it finishes. Suitable for low write throughput only.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let tables = snapshot::load(&path)?.unwrap_or_default();
        tracing::info!(
            path = %path.display(),
            users = tables.user_count(),
            tasks = tables.task_count(),
            "opened ledger snapshot"
        );
        Ok(Self::with_state(tables, Some(path)))
    }

    fn with_state(tables: Tables, snapshot_path: Option<PathBuf>) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(StoreState {
                    tables,
                    ..StoreState::default()
                }),
                snapshot_path,
                next_tx: AtomicU64::new(1),
            }),
        }
    }

    /// Number of committed transactions that carried writes.
    pub fn revision(&self) -> u64 {
        self.shared.read().map(|s| s.revision).unwrap_or(0)
    }

    /// Number of committed users.
    pub fn user_count(&self) -> usize {
        self.shared.read().map(|s| s.tables.user_count()).unwrap_or(0)
    }

    /// Number of committed catalog tasks.
    pub fn task_count(&self) -> usize {
        self.shared.read().map(|s| s.tables.task_count()).unwrap_or(0)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.shared.snapshot_path.as_deref()
    }
}

impl Default for InMemoryLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryLedgerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryLedgerStore")
            .field("revision", &self.revision())
            .field("users", &self.user_count())
            .field("snapshot_path", &self.shared.snapshot_path)
            .finish()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        let id = self.shared.next_tx.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(tx = id, "begin transaction");
        Ok(InMemoryTransaction {
            id,
            shared: Arc::clone(&self.shared),
            reads: HashMap::new(),
            writes: WriteSet::default(),
            finished: false,
        })
    }
}

/// A transaction against [`InMemoryLedgerStore`].
pub struct InMemoryTransaction {
    id: u64,
    shared: Arc<Shared>,
    reads: HashMap<RecordKey, u64>,
    writes: WriteSet,
    finished: bool,
}

impl InMemoryTransaction {
    /// Record the version of `key` the first time this transaction sees it.
    fn observe(&mut self, state: &StoreState, key: RecordKey) {
        let version = state.version(&key);
        self.reads.entry(key).or_insert(version);
    }

    fn lookup_user(
        &mut self,
        index_key: RecordKey,
        matches: impl Fn(&User) -> bool,
        resolve: impl Fn(&Tables) -> Option<UserId>,
    ) -> StoreResult<Option<User>> {
        if let Some(user) = self.writes.users.values().find(|u| matches(u)) {
            return Ok(Some(user.clone()));
        }

        let shared = Arc::clone(&self.shared);
        let state = shared.read()?;
        self.observe(&state, index_key);
        let Some(id) = resolve(&state.tables) else {
            return Ok(None);
        };
        self.observe(&state, RecordKey::User(id));
        // A pending rewrite of this user no longer matches the lookup.
        if self.writes.users.contains_key(&id) {
            return Ok(None);
        }
        Ok(state.tables.users.get(&id).cloned())
    }

    fn validate(&self, state: &StoreState) -> StoreResult<()> {
        for (key, seen) in &self.reads {
            if state.version(key) != *seen {
                return Err(StoreError::Conflict {
                    key: key.to_string(),
                });
            }
        }
        Ok(())
    }

    fn commit_inner(&mut self) -> StoreResult<()> {
        self.finished = true;
        if self.writes.is_empty() {
            tracing::trace!(tx = self.id, "commit read-only transaction");
            return Ok(());
        }

        let writes = std::mem::take(&mut self.writes);
        let write_count = writes.len();
        let mut state = self.shared.write()?;

        self.validate(&state)?;
        state.tables.check(&writes)?;

        let touched = match &self.shared.snapshot_path {
            Some(path) => {
                let mut staged = state.tables.clone();
                let touched = staged.apply(writes);
                snapshot::write(path, &staged).map_err(|e| {
                    StoreError::Unavailable(format!("snapshot write failed: {e}"))
                })?;
                state.tables = staged;
                touched
            }
            None => state.tables.apply(writes),
        };

        for key in touched {
            *state.versions.entry(key).or_insert(0) += 1;
        }
        state.revision += 1;

        tracing::debug!(
            tx = self.id,
            writes = write_count,
            revision = state.revision,
            "committed transaction"
        );
        Ok(())
    }
}

#[async_trait]
impl LedgerTransaction for InMemoryTransaction {
    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        self.lookup_user(
            RecordKey::Username(username.to_string()),
            |u| u.username == username,
            |t| t.usernames.get(username).copied(),
        )
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>> {
        if let Some(user) = self.writes.users.get(&id) {
            return Ok(Some(user.clone()));
        }
        let shared = Arc::clone(&self.shared);
        let state = shared.read()?;
        self.observe(&state, RecordKey::User(id));
        Ok(state.tables.users.get(&id).cloned())
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> StoreResult<Option<User>> {
        self.lookup_user(
            RecordKey::ReferralCode(code.to_string()),
            |u| u.referral_code == code,
            |t| t.referral_codes.get(code).copied(),
        )
    }

    async fn find_task_by_slug(&mut self, slug: &str) -> StoreResult<Option<Task>> {
        if let Some(task) = self.writes.tasks.values().find(|t| t.slug == slug) {
            return Ok(Some(task.clone()));
        }
        let shared = Arc::clone(&self.shared);
        let state = shared.read()?;
        self.observe(&state, RecordKey::Slug(slug.to_string()));
        let Some(id) = state.tables.slugs.get(slug).copied() else {
            return Ok(None);
        };
        self.observe(&state, RecordKey::Task(id));
        if self.writes.tasks.contains_key(&id) {
            return Ok(None);
        }
        Ok(state.tables.tasks.get(&id).cloned())
    }

    async fn find_points_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Points>> {
        if let Some(points) = self.writes.points.get(&user_id) {
            return Ok(Some(points.clone()));
        }
        let shared = Arc::clone(&self.shared);
        let state = shared.read()?;
        self.observe(&state, RecordKey::Points(user_id));
        Ok(state.tables.points.get(&user_id).cloned())
    }

    async fn find_bonus_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Bonus>> {
        if let Some(bonus) = self.writes.bonuses.get(&user_id) {
            return Ok(Some(bonus.clone()));
        }
        let shared = Arc::clone(&self.shared);
        let state = shared.read()?;
        self.observe(&state, RecordKey::Bonus(user_id));
        Ok(state.tables.bonuses.get(&user_id).cloned())
    }

    async fn list_tasks(&mut self) -> StoreResult<Vec<Task>> {
        let mut tasks = {
            let shared = Arc::clone(&self.shared);
            let state = shared.read()?;
            self.observe(&state, RecordKey::TaskList);
            state.tables.tasks.clone()
        };
        for (id, task) in &self.writes.tasks {
            tasks.insert(*id, task.clone());
        }
        let mut tasks: Vec<Task> = tasks.into_values().collect();
        tasks.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(tasks)
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        self.writes.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn save_points(&mut self, points: &Points) -> StoreResult<()> {
        self.writes.points.insert(points.user_id, points.clone());
        Ok(())
    }

    async fn save_bonus(&mut self, bonus: &Bonus) -> StoreResult<()> {
        self.writes.bonuses.insert(bonus.user_id, bonus.clone());
        Ok(())
    }

    async fn save_task(&mut self, task: &Task) -> StoreResult<()> {
        self.writes.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn commit(mut self) -> StoreResult<()> {
        self.commit_inner()
    }

    async fn abort(mut self) {
        self.finished = true;
        tracing::trace!(
            tx = self.id,
            discarded = self.writes.len(),
            "abort transaction"
        );
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished && !self.writes.is_empty() {
            tracing::warn!(
                tx = self.id,
                discarded = self.writes.len(),
                "transaction dropped without commit; writes discarded"
            );
        }
    }
}

impl std::fmt::Debug for InMemoryTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTransaction")
            .field("id", &self.id)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .finish()
    }
}
