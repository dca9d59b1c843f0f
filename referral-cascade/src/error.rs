//! Error types for the referral cascade

use thiserror::Error;

/// Result type for cascade operations
pub type Result<T> = std::result::Result<T, Error>;

/// Cascade errors
///
/// These cover the validation phase only: once validation passes, step
/// failures are reported through `CascadeOutcome`, not as errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Referral code does not resolve to any user
    #[error("Invalid referral code: {0}")]
    InvalidCode(String),

    /// Referral code already registered to another user
    #[error("Referral code already taken: {0}")]
    CodeTaken(String),

    /// A user cannot refer themselves
    #[error("Self-referral is not allowed")]
    SelfReferral,

    /// Each user may be referred exactly once, permanently
    #[error("User already referred: {0}")]
    AlreadyReferred(String),

    /// Ledger failure surfaced before any step applied
    #[error("Ledger error: {0}")]
    Ledger(#[from] points_ledger::Error),
}
