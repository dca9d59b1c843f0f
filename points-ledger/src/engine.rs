//! Award/spend engine
//!
//! This module ties together storage, policy, clock, and locking into the
//! two operations every other subsystem calls: [`RewardsLedger::award`] and
//! [`RewardsLedger::spend`].
//!
//! # Atomicity
//!
//! Both operations run entirely under the calling user's lock: daily reset,
//! cap validation, mutation, and the durable commit. The commit itself is a
//! single RocksDB `WriteBatch`, so a failed commit leaves the aggregate and
//! the ledger unchanged. Rejections return before any write.
//!
//! # Example
//!
//! ```no_run
//! use points_ledger::{Config, RewardsLedger, Source, UserId};
//! use std::collections::HashMap;
//!
//! #[tokio::main]
//! async fn main() -> points_ledger::Result<()> {
//!     let ledger = RewardsLedger::open(Config::default())?;
//!
//!     let user = UserId::new("rider-42");
//!     let result = ledger
//!         .award(&user, Source::Game, 50, "level 1 complete", HashMap::new())
//!         .await?;
//!     assert!(result.success);
//!
//!     Ok(())
//! }
//! ```

use crate::{
    clock::{Clock, SystemClock, TimePolicy},
    config::RuntimeConfig,
    locks::LockTable,
    metrics::Metrics,
    policy::PolicyTable,
    types::{
        AwardResult, BalanceAggregate, DailyCounter, Direction, HistoryPage, HistoryQuery,
        LedgerEntry, LedgerTotals, SpendResult, UserId,
    },
    Config, Error, Result, Source, Storage,
};
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::Duration;
use uuid::Uuid;

/// Main ledger interface
pub struct RewardsLedger {
    /// Durable aggregate + entry store
    storage: Arc<Storage>,

    /// Per-user exclusive locks
    locks: LockTable,

    /// Per-source earning limits
    policy: PolicyTable,

    /// Injected time source
    clock: Arc<dyn Clock>,

    /// Reward-day boundary policy
    time_policy: TimePolicy,

    /// Prometheus collectors
    metrics: Metrics,

    /// Lock/retry tuning
    runtime: RuntimeConfig,
}

impl std::fmt::Debug for RewardsLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewardsLedger")
            .field("storage", &self.storage)
            .field("locked_users", &self.locks.tracked_users())
            .field("time_policy", &self.time_policy)
            .finish()
    }
}

/// Reject ids the storage layer cannot represent safely
///
/// Index keys are `user_id || NUL || entry_id`, so an id containing NUL
/// would alias another user's scan prefix. Auth-layer ids are opaque
/// strings; they get checked here, once, at the operation boundary.
fn validate_user_id(user_id: &UserId) -> Result<()> {
    if user_id.as_str().is_empty() {
        return Err(Error::InvalidArgument(
            "User id must not be empty".to_string(),
        ));
    }
    if user_id.as_str().contains('\0') {
        return Err(Error::InvalidArgument(
            "User id must not contain NUL bytes".to_string(),
        ));
    }
    Ok(())
}

impl RewardsLedger {
    /// Open ledger with configuration
    pub fn open(config: Config) -> Result<Self> {
        let time_policy = TimePolicy::with_offset_minutes(config.timezone_offset_minutes)
            .ok_or_else(|| {
                Error::Config(format!(
                    "Invalid timezone offset: {} minutes",
                    config.timezone_offset_minutes
                ))
            })?;

        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            storage,
            locks: LockTable::new(),
            policy: config.policy,
            clock: Arc::new(SystemClock),
            time_policy,
            metrics,
            runtime: config.runtime,
        })
    }

    /// Replace the time source (tests drive a manual clock)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Prometheus collectors
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Award points to a user from one source
    ///
    /// The requested amount is clamped to the source's per-action cap, then
    /// validated against the daily cap and cooldown. Rejections carry a
    /// structured message and leave no trace in the ledger.
    pub async fn award(
        &self,
        user_id: &UserId,
        source: Source,
        requested_amount: u64,
        reason: &str,
        metadata: HashMap<String, String>,
    ) -> Result<AwardResult> {
        validate_user_id(user_id)?;
        if requested_amount == 0 {
            return Err(Error::InvalidArgument(
                "Award amount must be positive".to_string(),
            ));
        }

        let started = Instant::now();
        let _guard = self
            .locks
            .acquire(user_id, Duration::from_millis(self.runtime.lock_timeout_ms))
            .await?;

        let now = self.clock.now();
        let today = self.time_policy.local_date(now);
        let policy = self.policy.get(source);

        // Load or lazily create the aggregate
        let mut aggregate = self
            .storage
            .get_aggregate(user_id)?
            .unwrap_or_else(|| BalanceAggregate::new(user_id.clone()));

        // Daily reset: stale counters start a fresh day. Only persisted if
        // the award commits; a rejected call must leave stored state intact.
        self.reset_stale_counters(&mut aggregate, today);

        // Cooldown gate
        if policy.cooldown_secs > 0 {
            if let Some(last) = aggregate.last_award_at.get(&source) {
                let elapsed = now.signed_duration_since(*last).num_seconds();
                let cooldown = policy.cooldown_secs as i64;
                if elapsed < cooldown {
                    let wait = (cooldown - elapsed).max(1);
                    self.metrics.record_rejection();
                    tracing::debug!(
                        user_id = %user_id,
                        source = %source,
                        wait_secs = wait,
                        "Award rejected: cooldown active"
                    );
                    return Ok(AwardResult::rejected(
                        format!("Cooldown active for {}: retry in {}s", source, wait),
                        false,
                        aggregate.total_balance,
                        aggregate.source_balance(source),
                    ));
                }
            }
        }

        // Per-action clamp
        let final_amount = requested_amount.min(policy.per_action_cap);

        // Daily cap
        if let Some(daily_cap) = policy.daily_cap {
            let counter = aggregate
                .daily_counters
                .entry(source)
                .or_insert_with(|| DailyCounter {
                    earned_today: 0,
                    limit_per_day: daily_cap,
                    last_reset_date: today,
                });
            counter.limit_per_day = daily_cap;

            if counter.earned_today + final_amount > daily_cap {
                let remaining = daily_cap.saturating_sub(counter.earned_today);
                self.metrics.record_rejection();
                tracing::debug!(
                    user_id = %user_id,
                    source = %source,
                    remaining,
                    "Award rejected: daily cap reached"
                );
                return Ok(AwardResult::rejected(
                    format!(
                        "Daily limit reached for {}: {} points remaining today",
                        source, remaining
                    ),
                    true,
                    aggregate.total_balance,
                    aggregate.source_balance(source),
                ));
            }
        }

        // Apply
        let balance_before = aggregate.total_balance;
        aggregate.total_balance += final_amount;
        aggregate.total_earned_lifetime += final_amount;
        *aggregate.source_balances.entry(source).or_insert(0) += final_amount;
        if let Some(counter) = aggregate.daily_counters.get_mut(&source) {
            counter.earned_today += final_amount;
        }
        aggregate.last_award_at.insert(source, now);

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            direction: Direction::Earned,
            source: Some(source),
            amount: final_amount as i64,
            balance_before,
            balance_after: aggregate.total_balance,
            reason: reason.to_string(),
            metadata,
            created_at: now,
        };

        self.commit_with_retry(&aggregate, &entry).await?;

        self.metrics.record_award(final_amount);
        self.metrics
            .record_op_duration(started.elapsed().as_secs_f64());
        tracing::info!(
            user_id = %user_id,
            source = %source,
            points = final_amount,
            new_balance = aggregate.total_balance,
            "Points awarded"
        );

        Ok(AwardResult {
            success: true,
            points_awarded: final_amount,
            new_total_balance: aggregate.total_balance,
            new_source_balance: aggregate.source_balance(source),
            message: format!("Awarded {} points from {}", final_amount, source),
            limit_reached: false,
        })
    }

    /// Spend points from a user's total balance
    ///
    /// Sub-balances are lifetime-earned statistics and are not debited.
    pub async fn spend(
        &self,
        user_id: &UserId,
        amount: u64,
        reason: &str,
        metadata: HashMap<String, String>,
    ) -> Result<SpendResult> {
        validate_user_id(user_id)?;
        if amount == 0 {
            return Err(Error::InvalidArgument(
                "Spend amount must be positive".to_string(),
            ));
        }

        let started = Instant::now();
        let _guard = self
            .locks
            .acquire(user_id, Duration::from_millis(self.runtime.lock_timeout_ms))
            .await?;

        let mut aggregate = self
            .storage
            .get_aggregate(user_id)?
            .ok_or_else(|| Error::NotFound(user_id.to_string()))?;

        if aggregate.total_balance < amount {
            self.metrics.record_rejection();
            return Err(Error::InsufficientBalance {
                requested: amount,
                available: aggregate.total_balance,
            });
        }

        let balance_before = aggregate.total_balance;
        aggregate.total_balance -= amount;

        let entry = LedgerEntry {
            entry_id: Uuid::now_v7(),
            user_id: user_id.clone(),
            direction: Direction::Spent,
            source: None,
            amount: -(amount as i64),
            balance_before,
            balance_after: aggregate.total_balance,
            reason: reason.to_string(),
            metadata,
            created_at: self.clock.now(),
        };

        self.commit_with_retry(&aggregate, &entry).await?;

        self.metrics.record_spend();
        self.metrics
            .record_op_duration(started.elapsed().as_secs_f64());
        tracing::info!(
            user_id = %user_id,
            points = amount,
            new_balance = aggregate.total_balance,
            "Points spent"
        );

        Ok(SpendResult {
            success: true,
            points_spent: amount,
            new_total_balance: aggregate.total_balance,
            message: format!("Spent {} points", amount),
        })
    }

    /// Current balance aggregate for a user
    pub fn balance(&self, user_id: &UserId) -> Result<BalanceAggregate> {
        validate_user_id(user_id)?;
        self.storage
            .get_aggregate(user_id)?
            .ok_or_else(|| Error::NotFound(user_id.to_string()))
    }

    /// Paginated, filtered ledger history for a user
    pub fn history(&self, user_id: &UserId, query: &HistoryQuery) -> Result<HistoryPage> {
        validate_user_id(user_id)?;
        self.storage.history(user_id, query)
    }

    /// Aggregate sums over a user's entries (dashboard surface)
    pub fn totals(&self, user_id: &UserId) -> Result<LedgerTotals> {
        validate_user_id(user_id)?;
        self.storage.totals_for_user(user_id)
    }

    /// Replay a user's entries and check them against the stored aggregate
    ///
    /// Conservation invariant: summing the signed amounts of every entry in
    /// creation order must reproduce `total_balance` exactly, and the sum of
    /// earned amounts must reproduce `total_earned_lifetime`.
    pub fn verify_conservation(&self, user_id: &UserId) -> Result<()> {
        let aggregate = self.balance(user_id)?;
        let entries = self.storage.entries_for_user(user_id)?;

        let mut replayed: i64 = 0;
        let mut earned: u64 = 0;
        for entry in &entries {
            replayed += entry.amount;
            if entry.direction == Direction::Earned {
                earned += entry.amount.unsigned_abs();
            }
        }

        if replayed != aggregate.total_balance as i64 {
            return Err(Error::InvariantViolation(format!(
                "Replayed balance {} != stored balance {} for user {}",
                replayed, aggregate.total_balance, user_id
            )));
        }
        if earned != aggregate.total_earned_lifetime {
            return Err(Error::InvariantViolation(format!(
                "Replayed lifetime earned {} != stored {} for user {}",
                earned, aggregate.total_earned_lifetime, user_id
            )));
        }

        Ok(())
    }

    /// Reset every tracked counter whose last reset is before `today`
    fn reset_stale_counters(&self, aggregate: &mut BalanceAggregate, today: NaiveDate) {
        for (source, counter) in aggregate.daily_counters.iter_mut() {
            if counter.last_reset_date < today {
                counter.earned_today = 0;
                counter.last_reset_date = today;
                if let Some(cap) = self.policy.get(*source).daily_cap {
                    counter.limit_per_day = cap;
                }
            }
        }
    }

    /// Durable commit with bounded retry
    ///
    /// Storage errors are treated as transient and retried with exponential
    /// backoff plus jitter; anything else propagates immediately.
    async fn commit_with_retry(
        &self,
        aggregate: &BalanceAggregate,
        entry: &LedgerEntry,
    ) -> Result<()> {
        let attempts = self.runtime.commit_retry_attempts.max(1);
        let mut backoff_ms = self.runtime.commit_retry_base_ms.max(1);
        let mut last_err = String::new();

        for attempt in 1..=attempts {
            match self.storage.append_entry_atomic(aggregate, entry) {
                Ok(()) => return Ok(()),
                Err(Error::Storage(msg)) => {
                    tracing::warn!(
                        user_id = %entry.user_id,
                        attempt,
                        error = %msg,
                        "Ledger commit failed, retrying"
                    );
                    last_err = msg;
                    if attempt < attempts {
                        let jitter = rand::thread_rng().gen_range(0..=backoff_ms / 2);
                        tokio::time::sleep(Duration::from_millis(backoff_ms + jitter)).await;
                        backoff_ms = backoff_ms.saturating_mul(2);
                    }
                }
                Err(e) => return Err(e),
            }
        }

        Err(Error::Transient(format!(
            "Commit failed after {} attempts: {}",
            attempts, last_err
        )))
    }

    /// Instant used for entry timestamps (exposed for workflow crates)
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
