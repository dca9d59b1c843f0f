//! Types for the referral cascade

use points_ledger::UserId;
use serde::{Deserialize, Serialize};

/// Referral state tracked per user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferralRecord {
    /// Who referred this user (set at most once)
    pub referred_by: Option<UserId>,

    /// How many users this user has successfully referred
    pub referral_count: u64,
}

/// Bonus amounts granted by the cascade
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeConfig {
    /// Points awarded to the referrer
    pub referrer_bonus: u64,

    /// Points awarded to the newly referred user
    pub referred_bonus: u64,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            referrer_bonus: 100,
            referred_bonus: 50,
        }
    }
}

/// One step of the cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CascadeStep {
    /// Set `referred_by` on the new user
    RecordReferredBy,
    /// Increment the referrer's referral counter
    IncrementReferrerCount,
    /// Award the referrer their bonus
    AwardReferrer,
    /// Award the referred user their welcome bonus
    AwardReferred,
    /// Notify the missions/streak system
    NotifyMissions,
}

/// Outcome of one cascade step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Step applied
    Completed,
    /// Step failed; earlier steps are not rolled back
    Failed(String),
}

/// Step paired with its recorded outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepOutcome {
    /// Which step ran
    pub step: CascadeStep,

    /// How it went
    pub status: StepStatus,
}

/// Result of a completed cascade run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeOutcome {
    /// The resolved referrer
    pub referrer: UserId,

    /// Every step's recorded outcome, in execution order
    pub steps: Vec<StepOutcome>,

    /// True when at least one step failed (partial success)
    pub partial: bool,
}

impl CascadeOutcome {
    /// Status of one step, if it ran
    pub fn step_status(&self, step: CascadeStep) -> Option<&StepStatus> {
        self.steps.iter().find(|s| s.step == step).map(|s| &s.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bonuses() {
        let config = CascadeConfig::default();
        assert_eq!(config.referrer_bonus, 100);
        assert_eq!(config.referred_bonus, 50);
    }

    #[test]
    fn test_step_status_lookup() {
        let outcome = CascadeOutcome {
            referrer: UserId::new("ref"),
            steps: vec![
                StepOutcome {
                    step: CascadeStep::RecordReferredBy,
                    status: StepStatus::Completed,
                },
                StepOutcome {
                    step: CascadeStep::AwardReferrer,
                    status: StepStatus::Failed("storage down".to_string()),
                },
            ],
            partial: true,
        };

        assert_eq!(
            outcome.step_status(CascadeStep::RecordReferredBy),
            Some(&StepStatus::Completed)
        );
        assert!(matches!(
            outcome.step_status(CascadeStep::AwardReferrer),
            Some(&StepStatus::Failed(_))
        ));
        assert_eq!(outcome.step_status(CascadeStep::NotifyMissions), None);
    }
}
