//! Referral cascade workflow
//!
//! When a user completes profile setup with a referral code, a multi-step
//! workflow runs against the points ledger: record the referral, bump the
//! referrer's counter, award both sides, and notify the missions system.
//!
//! The cascade is deliberately **not** atomic across steps: each Award is
//! independently atomic, and a step failure never rolls back the steps that
//! already applied. Instead of failing silently, every step's outcome is
//! recorded and returned to the caller as a [`CascadeOutcome`], so retries
//! and reconciliation stay possible.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod cascade;
pub mod error;
pub mod types;

// Re-exports
pub use cascade::{MissionSink, NoopMissions, ReferralCascade};
pub use error::{Error, Result};
pub use types::{
    CascadeConfig, CascadeOutcome, CascadeStep, ReferralRecord, StepOutcome, StepStatus,
};
