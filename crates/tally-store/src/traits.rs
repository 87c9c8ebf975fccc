use async_trait::async_trait;
use tally_types::{Bonus, Points, Task, User, UserId};

use crate::error::StoreResult;

/// A backend able to open ledger transactions.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    type Tx: LedgerTransaction;

    /// Open a new transaction. Nothing is locked until commit.
    async fn begin(&self) -> StoreResult<Self::Tx>;
}

/// One atomic unit of work against the ledger tables.
///
/// All implementations must satisfy these invariants:
/// - Reads observe the transaction's own pending writes.
/// - `commit` applies every buffered write or none of them.
/// - `commit` fails with a retryable error if anything the transaction read
///   changed underneath it, so a committed transaction is serializable.
/// - Dropping the transaction without calling `commit` is equivalent to
///   `abort`.
#[async_trait]
pub trait LedgerTransaction: Send {
    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>>;

    async fn find_user_by_referral_code(&mut self, code: &str) -> StoreResult<Option<User>>;

    /// `slug` must already be normalized; the store matches it verbatim.
    async fn find_task_by_slug(&mut self, slug: &str) -> StoreResult<Option<Task>>;

    async fn find_points_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Points>>;

    async fn find_bonus_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Bonus>>;

    /// All catalog tasks ordered by slug.
    async fn list_tasks(&mut self) -> StoreResult<Vec<Task>>;

    /// Insert or replace a user record.
    async fn save_user(&mut self, user: &User) -> StoreResult<()>;

    /// Insert or replace a points record.
    async fn save_points(&mut self, points: &Points) -> StoreResult<()>;

    /// Insert or replace a bonus record.
    async fn save_bonus(&mut self, bonus: &Bonus) -> StoreResult<()>;

    /// Insert or replace a catalog task.
    async fn save_task(&mut self, task: &Task) -> StoreResult<()>;

    /// Validate and apply every buffered write atomically.
    async fn commit(self) -> StoreResult<()>;

    /// Discard every buffered write.
    async fn abort(self);
}
