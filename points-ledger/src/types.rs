//! Core types for the points ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (integer points, no floats)

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// User identifier (opaque, assigned by the auth layer)
///
/// Ledger operations reject empty ids and ids containing NUL; anything
/// else passes through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Create new user ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw bytes, used as the storage key prefix
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Named origin of earned points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Gameplay rewards
    Game,
    /// Ad-view rewards
    Ads,
    /// Referral bonuses (referrer and referred)
    Referrals,
    /// Daily login bonus
    Daily,
    /// Manual admin adjustment
    Admin,
}

impl Source {
    /// Stable string code (wire/storage/metrics label)
    pub fn code(&self) -> &'static str {
        match self {
            Source::Game => "game",
            Source::Ads => "ads",
            Source::Referrals => "referrals",
            Source::Daily => "daily",
            Source::Admin => "admin",
        }
    }

    /// Parse from string code
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "game" => Some(Source::Game),
            "ads" => Some(Source::Ads),
            "referrals" => Some(Source::Referrals),
            "daily" => Some(Source::Daily),
            "admin" => Some(Source::Admin),
            _ => None,
        }
    }

    /// All known sources
    pub fn all() -> [Source; 5] {
        [
            Source::Game,
            Source::Ads,
            Source::Referrals,
            Source::Daily,
            Source::Admin,
        ]
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Direction of a balance change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Direction {
    /// Points credited by an Award
    Earned = 1,
    /// Points debited by a Spend
    Spent = 2,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Earned => write!(f, "earned"),
            Direction::Spent => write!(f, "spent"),
        }
    }
}

/// One immutable, append-only record of a balance change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub entry_id: Uuid,

    /// User whose balance changed
    pub user_id: UserId,

    /// Earned or spent
    pub direction: Direction,

    /// Origin of the points (None for spends, which debit the total only)
    pub source: Option<Source>,

    /// Signed amount: positive for earned, negative for spent
    pub amount: i64,

    /// Total balance before this entry was applied
    pub balance_before: u64,

    /// Total balance after this entry was applied
    pub balance_after: u64,

    /// Human-readable reason ("level 1 complete", "sticker pack", ...)
    pub reason: String,

    /// Additional metadata from the calling layer
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Entry creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Per-source daily earning counter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounter {
    /// Points earned from this source since the last reset
    pub earned_today: u64,

    /// Daily cap in force when the counter was last touched
    pub limit_per_day: u64,

    /// Calendar date (per the ledger's timezone policy) of the last reset
    pub last_reset_date: NaiveDate,
}

/// Mutable per-user state tracked by the ledger
///
/// Created lazily on a user's first Award, mutated only under that user's
/// lock, never deleted. `source_balances` are lifetime-earned counters per
/// source and are never decremented by Spend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceAggregate {
    /// User this aggregate belongs to
    pub user_id: UserId,

    /// Redeemable balance
    pub total_balance: u64,

    /// Lifetime earned points (monotonically non-decreasing)
    pub total_earned_lifetime: u64,

    /// Cumulative points earned per source
    pub source_balances: HashMap<Source, u64>,

    /// Daily counters, present only for daily-capped sources
    pub daily_counters: HashMap<Source, DailyCounter>,

    /// Last successful award per source (cooldown bookkeeping)
    pub last_award_at: HashMap<Source, DateTime<Utc>>,
}

impl BalanceAggregate {
    /// Fresh aggregate with zeroed fields
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_balance: 0,
            total_earned_lifetime: 0,
            source_balances: HashMap::new(),
            daily_counters: HashMap::new(),
            last_award_at: HashMap::new(),
        }
    }

    /// Cumulative points earned from one source
    pub fn source_balance(&self, source: Source) -> u64 {
        self.source_balances.get(&source).copied().unwrap_or(0)
    }

    /// Points earned today from one source (0 if untracked or unused)
    pub fn earned_today(&self, source: Source) -> u64 {
        self.daily_counters
            .get(&source)
            .map(|c| c.earned_today)
            .unwrap_or(0)
    }
}

/// Outcome of an Award call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResult {
    /// Whether points were credited
    pub success: bool,

    /// Points actually credited (after per-action clamp; 0 on rejection)
    pub points_awarded: u64,

    /// Total balance after the call
    pub new_total_balance: u64,

    /// Source sub-balance after the call
    pub new_source_balance: u64,

    /// Structured reason, suitable for user-facing rendering
    pub message: String,

    /// True when the daily cap blocked the award
    pub limit_reached: bool,
}

impl AwardResult {
    /// Rejection result: nothing credited, balances unchanged
    pub fn rejected(
        message: impl Into<String>,
        limit_reached: bool,
        total_balance: u64,
        source_balance: u64,
    ) -> Self {
        Self {
            success: false,
            points_awarded: 0,
            new_total_balance: total_balance,
            new_source_balance: source_balance,
            message: message.into(),
            limit_reached,
        }
    }
}

/// Outcome of a Spend call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpendResult {
    /// Whether points were debited
    pub success: bool,

    /// Points debited
    pub points_spent: u64,

    /// Total balance after the call
    pub new_total_balance: u64,

    /// Structured reason, suitable for user-facing rendering
    pub message: String,
}

/// Filter and pagination for ledger history queries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HistoryQuery {
    /// Only entries from this source
    pub source: Option<Source>,

    /// Only entries with this direction
    pub direction: Option<Direction>,

    /// Only entries created at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Only entries created before this instant
    pub to: Option<DateTime<Utc>>,

    /// Entries to skip (creation order)
    pub offset: usize,

    /// Maximum entries to return (0 = unlimited)
    pub limit: usize,
}

/// One page of ledger history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryPage {
    /// Matching entries in creation order
    pub entries: Vec<LedgerEntry>,

    /// Total entries matching the filter (before pagination)
    pub total_matched: usize,
}

/// Aggregate sums over a user's ledger entries (dashboard surface)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerTotals {
    /// Points earned, broken down by source
    pub earned_by_source: HashMap<Source, u64>,

    /// All points ever earned
    pub total_earned: u64,

    /// All points ever spent
    pub total_spent: u64,

    /// Number of ledger entries
    pub entry_count: usize,
}
