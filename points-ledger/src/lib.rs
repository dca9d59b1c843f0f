//! Transit Rewards Points Ledger
//!
//! Award/spend accounting for the in-app points currency, with per-source
//! daily caps, per-action caps, cooldowns, and an immutable audit trail.
//!
//! # Architecture
//!
//! - **Append-only ledger**: every balance change is one immutable entry
//! - **Per-user exclusivity**: a sharded lock table serializes calls per
//!   user; different users proceed fully in parallel
//! - **Atomic commits**: aggregate + entry + index in one `WriteBatch`
//! - **Injected clock**: the daily-reset boundary is a test-controllable
//!   clock + timezone policy, never raw wall time
//!
//! # Invariants
//!
//! - Conservation: replaying a user's entries reproduces `total_balance`
//! - Cap enforcement: daily earnings per source never exceed the daily cap
//! - Append-only: entries are never modified or deleted

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod locks;
pub mod metrics;
pub mod policy;
pub mod storage;
pub mod types;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock, TimePolicy};
pub use config::Config;
pub use engine::RewardsLedger;
pub use error::{Error, Result};
pub use policy::{LimitPolicy, PolicyTable};
pub use storage::Storage;
pub use types::{
    AwardResult, BalanceAggregate, DailyCounter, Direction, HistoryPage, HistoryQuery,
    LedgerEntry, LedgerTotals, Source, SpendResult, UserId,
};
