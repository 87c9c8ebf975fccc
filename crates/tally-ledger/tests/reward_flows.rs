use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tally_catalog::{NewTask, TaskRegistry};
use tally_store::{
    InMemoryLedgerStore, InMemoryTransaction, LedgerStore, LedgerTransaction, StoreError,
    StoreResult,
};
use tally_types::{Bonus, ManualClock, Points, Task, User, UserId};

use tally_ledger::{
    BonusCollection, ErrorKind, LedgerConfig, LedgerError, RegistrationOutcome, RewardLedger,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
}

async fn seed_user_and_task(store: &Arc<InMemoryLedgerStore>, clock: &Arc<ManualClock>) {
    let ledger = RewardLedger::new(store.clone(), clock.clone(), LedgerConfig::default());
    ledger.register_with_referral("alice", None).await.unwrap();
    TaskRegistry::new(store.clone(), clock.clone())
        .create_task(NewTask::new("Follow Us", 250))
        .await
        .unwrap();
}

async fn load_user(store: &InMemoryLedgerStore, username: &str) -> User {
    let mut tx = store.begin().await.unwrap();
    let user = tx.find_user_by_username(username).await.unwrap().unwrap();
    tx.abort().await;
    user
}

const CONCURRENT_CALLS: usize = 16;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_reward_exactly_once() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    seed_user_and_task(&store, &clock).await;
    let ledger = Arc::new(RewardLedger::new(
        store.clone(),
        clock.clone(),
        LedgerConfig::default(),
    ));

    let mut handles = Vec::new();
    for _ in 0..CONCURRENT_CALLS {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.complete_task("alice", "follow-us").await
        }));
    }

    let (mut completed, mut already_completed) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => completed += 1,
            Err(LedgerError::AlreadyCompleted { .. }) => already_completed += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(completed, 1);
    assert_eq!(already_completed, CONCURRENT_CALLS - 1);
    assert_eq!(ledger.balance("alice").await.unwrap(), 1250);
    assert_eq!(load_user(&store, "alice").await.tasks_completed.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bonus_collections_pay_once() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = Arc::new(RewardLedger::new(store, clock, LedgerConfig::default()));
    ledger.register_with_referral("alice", None).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..CONCURRENT_CALLS {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            ledger.collect_daily_bonus("alice").await
        }));
    }

    let (mut collected, mut refused) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(collection) => {
                assert_eq!(collection.login_streak, 1);
                collected += 1;
            }
            Err(LedgerError::BonusAlreadyCollected { .. }) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(collected, 1);
    assert_eq!(refused, CONCURRENT_CALLS - 1);
    assert_eq!(ledger.balance("alice").await.unwrap(), 2000);
    let status = ledger.check_bonus_status("alice").await.unwrap();
    assert_eq!(status.login_streak, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_create_one_user_and_one_payout() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = Arc::new(RewardLedger::new(
        store.clone(),
        clock,
        LedgerConfig::default(),
    ));
    let RegistrationOutcome::Created { referral_code, .. } =
        ledger.register_with_referral("alice", None).await.unwrap()
    else {
        panic!("alice should be new");
    };

    let mut handles = Vec::new();
    for _ in 0..CONCURRENT_CALLS {
        let ledger = ledger.clone();
        let code = referral_code.clone();
        handles.push(tokio::spawn(async move {
            ledger.register_with_referral("bob", Some(&code)).await
        }));
    }

    let (mut created, mut existing) = (0, 0);
    for handle in handles {
        match handle.await.unwrap() {
            Ok(RegistrationOutcome::Created { .. }) => created += 1,
            Ok(RegistrationOutcome::AlreadyExists) => existing += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(existing, CONCURRENT_CALLS - 1);
    assert_eq!(store.user_count(), 2);
    assert_eq!(ledger.balance("alice").await.unwrap(), 1500);
    assert_eq!(ledger.balance("bob").await.unwrap(), 1000);
    assert_eq!(load_user(&store, "alice").await.referrals.len(), 1);
}

#[tokio::test]
async fn streak_follows_collection_gaps() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = RewardLedger::new(store, clock.clone(), LedgerConfig::default());
    ledger.register_with_referral("alice", None).await.unwrap();

    let first = ledger.collect_daily_bonus("alice").await.unwrap();
    assert_eq!(first.login_streak, 1);

    clock.set(t0() + Duration::hours(12));
    let err = ledger.collect_daily_bonus("alice").await.unwrap_err();
    assert!(matches!(err, LedgerError::BonusAlreadyCollected { .. }));

    clock.set(t0() + Duration::hours(36));
    assert_eq!(ledger.collect_daily_bonus("alice").await.unwrap().login_streak, 2);

    clock.set(t0() + Duration::hours(72));
    assert_eq!(ledger.collect_daily_bonus("alice").await.unwrap().login_streak, 1);
}

#[tokio::test]
async fn bonus_rewards_scale_with_streak() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = RewardLedger::new(store, clock.clone(), LedgerConfig::default());
    ledger.register_with_referral("alice", None).await.unwrap();

    let mut rewards = Vec::new();
    for _ in 0..10 {
        rewards.push(ledger.collect_daily_bonus("alice").await.unwrap().bonus_points);
        clock.advance(Duration::hours(24));
    }

    assert_eq!(rewards[0], 1000);
    assert_eq!(rewards[1], 2000);
    assert_eq!(rewards[4], 5000);
    assert_eq!(rewards[9], 10000);
    assert_eq!(
        ledger.balance("alice").await.unwrap(),
        1000 + rewards.iter().sum::<u64>()
    );
}

/// Store wrapper whose transactions fail every points write.
struct FailingPointsStore {
    inner: InMemoryLedgerStore,
    error: fn() -> StoreError,
    attempts: AtomicU32,
}

struct FailingPointsTx {
    inner: InMemoryTransaction,
    error: fn() -> StoreError,
}

#[async_trait]
impl LedgerStore for FailingPointsStore {
    type Tx = FailingPointsTx;

    async fn begin(&self) -> StoreResult<FailingPointsTx> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(FailingPointsTx {
            inner: self.inner.begin().await?,
            error: self.error,
        })
    }
}

#[async_trait]
impl LedgerTransaction for FailingPointsTx {
    async fn find_user_by_username(&mut self, username: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_username(username).await
    }

    async fn find_user_by_id(&mut self, id: UserId) -> StoreResult<Option<User>> {
        self.inner.find_user_by_id(id).await
    }

    async fn find_user_by_referral_code(&mut self, code: &str) -> StoreResult<Option<User>> {
        self.inner.find_user_by_referral_code(code).await
    }

    async fn find_task_by_slug(&mut self, slug: &str) -> StoreResult<Option<Task>> {
        self.inner.find_task_by_slug(slug).await
    }

    async fn find_points_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Points>> {
        self.inner.find_points_by_user_id(user_id).await
    }

    async fn find_bonus_by_user_id(&mut self, user_id: UserId) -> StoreResult<Option<Bonus>> {
        self.inner.find_bonus_by_user_id(user_id).await
    }

    async fn list_tasks(&mut self) -> StoreResult<Vec<Task>> {
        self.inner.list_tasks().await
    }

    async fn save_user(&mut self, user: &User) -> StoreResult<()> {
        self.inner.save_user(user).await
    }

    async fn save_points(&mut self, _points: &Points) -> StoreResult<()> {
        Err((self.error)())
    }

    async fn save_bonus(&mut self, bonus: &Bonus) -> StoreResult<()> {
        self.inner.save_bonus(bonus).await
    }

    async fn save_task(&mut self, task: &Task) -> StoreResult<()> {
        self.inner.save_task(task).await
    }

    async fn commit(self) -> StoreResult<()> {
        self.inner.commit().await
    }

    async fn abort(self) {
        self.inner.abort().await
    }
}

async fn failing_fixture(error: fn() -> StoreError) -> (Arc<FailingPointsStore>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(t0()));
    let seeded = Arc::new(InMemoryLedgerStore::new());
    seed_user_and_task(&seeded, &clock).await;
    let inner = Arc::try_unwrap(seeded).expect("no other handles to the seeded store");
    let store = Arc::new(FailingPointsStore {
        inner,
        error,
        attempts: AtomicU32::new(0),
    });
    (store, clock)
}

#[tokio::test]
async fn failed_points_write_leaves_no_trace() {
    let (store, clock) = failing_fixture(|| StoreError::Integrity("points write refused".into())).await;
    let revision = store.inner.revision();
    let ledger = RewardLedger::new(store.clone(), clock, LedgerConfig::default());

    let err = ledger.complete_task("alice", "follow-us").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Fatal);
    assert_eq!(store.attempts.load(Ordering::SeqCst), 1);

    assert_eq!(store.inner.revision(), revision);
    assert!(load_user(&store.inner, "alice").await.tasks_completed.is_empty());
}

#[tokio::test]
async fn transient_points_failure_is_retried_then_surfaced() {
    let (store, clock) = failing_fixture(|| StoreError::Unavailable("disk full".into())).await;
    let revision = store.inner.revision();
    let ledger = RewardLedger::new(store.clone(), clock, LedgerConfig::default());

    let err = ledger.collect_daily_bonus("alice").await.unwrap_err();
    assert!(err.is_transient());
    assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
    assert_eq!(store.inner.revision(), revision);

    let mut tx = store.inner.begin().await.unwrap();
    let alice = tx.find_user_by_username("alice").await.unwrap().unwrap();
    assert!(tx.find_bonus_by_user_id(alice.id).await.unwrap().is_none());
    assert_eq!(
        tx.find_points_by_user_id(alice.id).await.unwrap().unwrap().points,
        1000
    );
    tx.abort().await;
}

#[tokio::test]
async fn referral_pays_exactly_once() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = RewardLedger::new(store.clone(), clock, LedgerConfig::default());

    let RegistrationOutcome::Created { referral_code, .. } =
        ledger.register_with_referral("alice", None).await.unwrap()
    else {
        panic!("alice should be new");
    };
    ledger.register_with_referral("carol", None).await.unwrap();

    ledger
        .register_with_referral("bob", Some(&referral_code))
        .await
        .unwrap();
    assert_eq!(ledger.balance("alice").await.unwrap(), 1500);
    assert_eq!(load_user(&store, "alice").await.referrals.len(), 1);

    let before_alice = load_user(&store, "alice").await;
    let before_carol = load_user(&store, "carol").await;
    ledger
        .register_with_referral("dave", Some("ZZZZZZZZ"))
        .await
        .unwrap();
    assert_eq!(load_user(&store, "alice").await, before_alice);
    assert_eq!(load_user(&store, "carol").await, before_carol);
    assert_eq!(ledger.balance("alice").await.unwrap(), 1500);
    assert_eq!(ledger.balance("carol").await.unwrap(), 1000);
    assert_eq!(ledger.balance("dave").await.unwrap(), 1000);
}

#[tokio::test]
async fn duplicate_registration_is_soft_and_mutates_nothing() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = RewardLedger::new(store.clone(), clock, LedgerConfig::default());

    let RegistrationOutcome::Created { referral_code, .. } =
        ledger.register_with_referral("alice", None).await.unwrap()
    else {
        panic!("alice should be new");
    };
    ledger.register_with_referral("bob", None).await.unwrap();
    let revision = store.revision();

    let outcome = ledger
        .register_with_referral("bob", Some(&referral_code))
        .await
        .unwrap();
    assert_eq!(outcome, RegistrationOutcome::AlreadyExists);
    assert!(!outcome.created());
    assert_eq!(store.revision(), revision);
    assert_eq!(store.user_count(), 2);
    assert_eq!(ledger.balance("alice").await.unwrap(), 1000);
}

#[tokio::test]
async fn alice_collects_over_two_days() {
    let store = Arc::new(InMemoryLedgerStore::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let ledger = RewardLedger::new(store, clock.clone(), LedgerConfig::default());
    ledger.register_with_referral("alice", None).await.unwrap();

    assert_eq!(
        ledger.collect_daily_bonus("alice").await.unwrap(),
        BonusCollection {
            login_streak: 1,
            bonus_points: 1000,
            total_points: 2000,
        }
    );

    clock.set(t0() + Duration::hours(10));
    let err = ledger.collect_daily_bonus("alice").await.unwrap_err();
    assert!(matches!(err, LedgerError::BonusAlreadyCollected { .. }));
    assert_eq!(ledger.balance("alice").await.unwrap(), 2000);

    clock.set(t0() + Duration::hours(25));
    assert_eq!(
        ledger.collect_daily_bonus("alice").await.unwrap(),
        BonusCollection {
            login_streak: 2,
            bonus_points: 2000,
            total_points: 4000,
        }
    );
}
