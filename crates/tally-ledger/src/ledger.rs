//! The reward flows.
//!
//! Each public method is one unit of work: it opens a transaction, performs
//! every lookup and rule check, buffers its writes, and commits. Any error
//! before commit aborts the transaction, so a rejected request leaves the
//! store untouched. Transient failures re-run the whole flow, bounded by
//! [`LedgerConfig::max_attempts`].

use std::future::Future;
use std::sync::Arc;

use tally_catalog::slugify;
use tally_store::{LedgerStore, LedgerTransaction};
use tally_types::{Bonus, Clock, Points, User};

use crate::config::LedgerConfig;
use crate::error::{Entity, ErrorKind, LedgerError, LedgerResult};
use crate::outcome::{
    BonusCollection, BonusStatus, Registration, RegistrationOutcome, TaskCompletion,
};
use crate::referral::generate_referral_code;
use crate::streak::{daily_bonus_reward, BonusWindow};

/// Rewards ledger over a [`LedgerStore`].
pub struct RewardLedger<S: LedgerStore> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: LedgerConfig,
}

impl<S: LedgerStore> RewardLedger<S> {
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>, config: LedgerConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Award a catalog task's points to a user, at most once per user.
    ///
    /// `task_slug` is normalized before lookup, so a task title works too.
    pub async fn complete_task(
        &self,
        username: &str,
        task_slug: &str,
    ) -> LedgerResult<TaskCompletion> {
        let slug = slugify(task_slug);
        let slug = slug.as_str();
        let completion = self
            .with_retry("complete_task", move || async move {
                let mut tx = self.store.begin().await?;
                let outcome = self.complete_task_in(&mut tx, username, slug).await;
                finish(tx, outcome).await
            })
            .await?;

        tracing::info!(
            username,
            task = %completion.task_slug,
            reward = completion.reward,
            total = completion.total_points,
            "task completed"
        );
        Ok(completion)
    }

    /// Whether `username` may collect the daily bonus right now. Writes nothing.
    pub async fn check_bonus_status(&self, username: &str) -> LedgerResult<BonusStatus> {
        self.with_retry("check_bonus_status", move || async move {
            let mut tx = self.store.begin().await?;
            let status = self.bonus_status_in(&mut tx, username).await;
            tx.abort().await;
            status
        })
        .await
    }

    /// Collect the daily bonus, extending or restarting the login streak.
    pub async fn collect_daily_bonus(&self, username: &str) -> LedgerResult<BonusCollection> {
        let collection = self
            .with_retry("collect_daily_bonus", move || async move {
                let mut tx = self.store.begin().await?;
                let outcome = self.collect_daily_bonus_in(&mut tx, username).await;
                finish(tx, outcome).await
            })
            .await?;

        tracing::info!(
            username,
            streak = collection.login_streak,
            bonus = collection.bonus_points,
            total = collection.total_points,
            "daily bonus collected"
        );
        Ok(collection)
    }

    /// Create a user, paying the referrer if `registration` carries a code
    /// that resolves.
    ///
    /// A taken username is not an error: the outcome is
    /// [`RegistrationOutcome::AlreadyExists`] and nothing is written. An
    /// unknown referral code is ignored.
    pub async fn register(&self, registration: &Registration) -> LedgerResult<RegistrationOutcome> {
        let outcome = self
            .with_retry("register", move || async move {
                let mut tx = self.store.begin().await?;
                match self.register_in(&mut tx, registration).await {
                    Ok(RegistrationOutcome::AlreadyExists) => {
                        tx.abort().await;
                        Ok(RegistrationOutcome::AlreadyExists)
                    }
                    other => finish(tx, other).await,
                }
            })
            .await?;

        match &outcome {
            RegistrationOutcome::Created {
                user_id,
                referred_by,
                ..
            } => tracing::info!(
                username = %registration.username,
                user_id = %user_id,
                referred = referred_by.is_some(),
                "user registered"
            ),
            RegistrationOutcome::AlreadyExists => tracing::debug!(
                username = %registration.username,
                "registration skipped; username taken"
            ),
        }
        Ok(outcome)
    }

    /// Shorthand for [`register`](Self::register) with just a username and
    /// an optional referral code.
    pub async fn register_with_referral(
        &self,
        username: &str,
        referral_code: Option<&str>,
    ) -> LedgerResult<RegistrationOutcome> {
        let registration = match referral_code {
            Some(code) => Registration::new(username).with_referral_code(code),
            None => Registration::new(username),
        };
        self.register(&registration).await
    }

    /// Current points balance of `username`.
    pub async fn balance(&self, username: &str) -> LedgerResult<u64> {
        self.with_retry("balance", move || async move {
            let mut tx = self.store.begin().await?;
            let balance = self.balance_in(&mut tx, username).await;
            tx.abort().await;
            balance
        })
        .await
    }

    async fn complete_task_in(
        &self,
        tx: &mut S::Tx,
        username: &str,
        slug: &str,
    ) -> LedgerResult<TaskCompletion> {
        let task = tx
            .find_task_by_slug(slug)
            .await?
            .ok_or_else(|| LedgerError::not_found(Entity::Task, slug))?;
        let mut user = find_user(tx, username).await?;

        if user.has_completed(&task.id) {
            tracing::debug!(username, task = slug, "task already completed");
            return Err(LedgerError::AlreadyCompleted {
                username: username.to_string(),
                task: task.slug,
            });
        }

        let mut points = find_points(tx, &user).await?;
        let total_points = points.credit(task.points)?;
        user.tasks_completed.insert(task.id);

        tx.save_user(&user).await?;
        tx.save_points(&points).await?;
        Ok(TaskCompletion {
            task_slug: task.slug,
            reward: task.points,
            total_points,
        })
    }

    async fn bonus_status_in(&self, tx: &mut S::Tx, username: &str) -> LedgerResult<BonusStatus> {
        let user = find_user(tx, username).await?;
        let bonus = tx.find_bonus_by_user_id(user.id).await?;
        let window = BonusWindow::classify(
            bonus.as_ref(),
            self.clock.now(),
            self.config.bonus_interval(),
        );

        Ok(BonusStatus {
            is_eligible: window.is_eligible(),
            login_streak: bonus.map_or(0, |b| b.login_streak),
            next_eligible_at: match window {
                BonusWindow::TooSoon { next_eligible_at } => Some(next_eligible_at),
                _ => None,
            },
        })
    }

    async fn collect_daily_bonus_in(
        &self,
        tx: &mut S::Tx,
        username: &str,
    ) -> LedgerResult<BonusCollection> {
        let now = self.clock.now();
        let user = find_user(tx, username).await?;
        let mut points = find_points(tx, &user).await?;
        let bonus = tx.find_bonus_by_user_id(user.id).await?;

        let window = BonusWindow::classify(bonus.as_ref(), now, self.config.bonus_interval());
        let current = bonus.as_ref().map_or(0, |b| b.login_streak);
        let Some(login_streak) = window.next_streak(current) else {
            tracing::debug!(username, ?window, "daily bonus not yet available");
            return Err(LedgerError::BonusAlreadyCollected {
                username: username.to_string(),
            });
        };

        let bonus_points = daily_bonus_reward(login_streak, &self.config);
        let total_points = points.credit(bonus_points)?;
        let bonus = Bonus {
            user_id: user.id,
            last_login: now,
            login_streak,
        };

        tx.save_bonus(&bonus).await?;
        tx.save_points(&points).await?;
        Ok(BonusCollection {
            login_streak,
            bonus_points,
            total_points,
        })
    }

    async fn register_in(
        &self,
        tx: &mut S::Tx,
        registration: &Registration,
    ) -> LedgerResult<RegistrationOutcome> {
        if tx
            .find_user_by_username(&registration.username)
            .await?
            .is_some()
        {
            return Ok(RegistrationOutcome::AlreadyExists);
        }

        let referral_code = self.allocate_referral_code(tx).await?;
        let user = User::new(
            registration.username.as_str(),
            referral_code.as_str(),
            registration.profile.clone(),
            self.clock.now(),
        );
        let points = Points::new(user.id, self.config.starting_balance);

        let mut referred_by = None;
        let supplied = registration
            .referral_code
            .as_deref()
            .filter(|code| !code.is_empty());
        if let Some(code) = supplied {
            match tx.find_user_by_referral_code(code).await? {
                Some(mut referrer) => {
                    let mut referrer_points = find_points(tx, &referrer).await?;
                    referrer_points.credit(self.config.referral_bonus)?;
                    referrer.referrals.push(user.id);
                    tx.save_user(&referrer).await?;
                    tx.save_points(&referrer_points).await?;
                    referred_by = Some(referrer.id);
                }
                None => tracing::debug!(code, "referral code matched no user; ignoring"),
            }
        }

        tx.save_user(&user).await?;
        tx.save_points(&points).await?;
        Ok(RegistrationOutcome::Created {
            user_id: user.id,
            referral_code,
            referred_by,
        })
    }

    /// A referral code no committed or pending user holds. The transaction
    /// observes each candidate, so a concurrent claim fails the commit.
    async fn allocate_referral_code(&self, tx: &mut S::Tx) -> LedgerResult<String> {
        let attempts = self.config.referral_code_attempts.max(1);
        for attempt in 1..=attempts {
            let code = generate_referral_code(self.config.referral_code_len);
            if tx.find_user_by_referral_code(&code).await?.is_none() {
                return Ok(code);
            }
            tracing::warn!(attempt, "referral code collision");
        }
        Err(LedgerError::ReferralCodeExhausted { attempts })
    }

    async fn balance_in(&self, tx: &mut S::Tx, username: &str) -> LedgerResult<u64> {
        let user = find_user(tx, username).await?;
        Ok(find_points(tx, &user).await?.points)
    }

    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut attempt: F) -> LedgerResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = LedgerResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut n = 1;
        loop {
            match attempt().await {
                Err(e) if e.is_transient() && n < max_attempts => {
                    tracing::warn!(op, attempt = n, error = %e, "transient failure; retrying");
                    n += 1;
                }
                Err(e) => {
                    if e.kind() == ErrorKind::Fatal {
                        tracing::error!(op, error = %e, "ledger flow failed");
                    }
                    return Err(e);
                }
                ok => return ok,
            }
        }
    }
}

async fn find_user<Tx: LedgerTransaction>(tx: &mut Tx, username: &str) -> LedgerResult<User> {
    tx.find_user_by_username(username)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::User, username))
}

async fn find_points<Tx: LedgerTransaction>(tx: &mut Tx, user: &User) -> LedgerResult<Points> {
    tx.find_points_by_user_id(user.id)
        .await?
        .ok_or_else(|| LedgerError::not_found(Entity::Points, &user.username))
}

/// Commit on success, abort on failure.
async fn finish<Tx: LedgerTransaction, T>(tx: Tx, outcome: LedgerResult<T>) -> LedgerResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(e) => {
            tx.abort().await;
            Err(e)
        }
    }
}
