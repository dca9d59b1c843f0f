//! The referral cascade itself
//!
//! Validation is all-or-nothing: an invalid code, self-referral, or an
//! already-referred user is a hard error and nothing applies. After that,
//! every step runs regardless of earlier failures, and the caller gets the
//! full step-by-step record.

use crate::{
    error::{Error, Result},
    types::{CascadeConfig, CascadeOutcome, CascadeStep, ReferralRecord, StepOutcome, StepStatus},
};
use dashmap::DashMap;
use points_ledger::{RewardsLedger, Source, UserId};
use std::collections::HashMap;
use std::sync::Arc;

/// Hook for the referral-streak/missions side effect
///
/// The missions system lives outside this crate; implementations forward
/// the event wherever it needs to go. A failure is recorded in the cascade
/// outcome, never propagated.
pub trait MissionSink: Send + Sync {
    /// Called once per successful referral with the referrer's new total
    fn referral_recorded(
        &self,
        referrer: &UserId,
        total_referrals: u64,
    ) -> std::result::Result<(), String>;
}

/// Mission sink that drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMissions;

impl MissionSink for NoopMissions {
    fn referral_recorded(
        &self,
        _referrer: &UserId,
        _total_referrals: u64,
    ) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Referral workflow over the points ledger
pub struct ReferralCascade {
    ledger: Arc<RewardsLedger>,
    config: CascadeConfig,

    /// code -> owning user
    codes: DashMap<String, UserId>,

    /// per-user referral state
    records: DashMap<UserId, ReferralRecord>,

    missions: Arc<dyn MissionSink>,
}

impl std::fmt::Debug for ReferralCascade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferralCascade")
            .field("config", &self.config)
            .field("codes", &self.codes.len())
            .field("records", &self.records.len())
            .finish()
    }
}

impl ReferralCascade {
    /// New cascade over `ledger`
    pub fn new(
        ledger: Arc<RewardsLedger>,
        config: CascadeConfig,
        missions: Arc<dyn MissionSink>,
    ) -> Self {
        Self {
            ledger,
            config,
            codes: DashMap::new(),
            records: DashMap::new(),
            missions,
        }
    }

    /// Register a user's referral code
    ///
    /// Re-registering the same code for the same user is a no-op; claiming
    /// another user's code is rejected.
    pub fn register_code(&self, user_id: &UserId, code: &str) -> Result<()> {
        match self.codes.entry(code.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(existing) => {
                if existing.get() == user_id {
                    Ok(())
                } else {
                    Err(Error::CodeTaken(code.to_string()))
                }
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(user_id.clone());
                Ok(())
            }
        }
    }

    /// Current referral state for a user
    pub fn referral_record(&self, user_id: &UserId) -> Option<ReferralRecord> {
        self.records.get(user_id).map(|r| r.value().clone())
    }

    /// Run the cascade for a user who completed profile setup with `code`
    ///
    /// Steps after validation are best-effort: applied Awards are never
    /// rolled back, and any failed step marks the outcome partial.
    pub async fn complete_profile(&self, new_user: &UserId, code: &str) -> Result<CascadeOutcome> {
        // Validation phase: hard errors, nothing applied
        let referrer = self
            .codes
            .get(code)
            .map(|r| r.value().clone())
            .ok_or_else(|| Error::InvalidCode(code.to_string()))?;

        if referrer == *new_user {
            return Err(Error::SelfReferral);
        }

        // Check-and-set under the map shard lock so two concurrent
        // completions for the same user cannot both pass.
        {
            let mut record = self.records.entry(new_user.clone()).or_default();
            if record.referred_by.is_some() {
                return Err(Error::AlreadyReferred(new_user.to_string()));
            }
            record.referred_by = Some(referrer.clone());
        }

        let mut steps = vec![StepOutcome {
            step: CascadeStep::RecordReferredBy,
            status: StepStatus::Completed,
        }];

        let referral_count = {
            let mut record = self.records.entry(referrer.clone()).or_default();
            record.referral_count += 1;
            record.referral_count
        };
        steps.push(StepOutcome {
            step: CascadeStep::IncrementReferrerCount,
            status: StepStatus::Completed,
        });

        // Award the referrer
        let mut metadata = HashMap::new();
        metadata.insert("referred_user".to_string(), new_user.to_string());
        let status = self
            .run_award(&referrer, self.config.referrer_bonus, "successful referral", metadata)
            .await;
        steps.push(StepOutcome {
            step: CascadeStep::AwardReferrer,
            status,
        });

        // Award the referred user
        let mut metadata = HashMap::new();
        metadata.insert("referrer".to_string(), referrer.to_string());
        let status = self
            .run_award(
                new_user,
                self.config.referred_bonus,
                "referral welcome bonus",
                metadata,
            )
            .await;
        steps.push(StepOutcome {
            step: CascadeStep::AwardReferred,
            status,
        });

        // Missions/streak side effect
        let status = match self.missions.referral_recorded(&referrer, referral_count) {
            Ok(()) => StepStatus::Completed,
            Err(msg) => StepStatus::Failed(msg),
        };
        steps.push(StepOutcome {
            step: CascadeStep::NotifyMissions,
            status,
        });

        let partial = steps
            .iter()
            .any(|s| matches!(s.status, StepStatus::Failed(_)));
        if partial {
            tracing::warn!(
                new_user = %new_user,
                referrer = %referrer,
                "Referral cascade completed partially"
            );
        } else {
            tracing::info!(
                new_user = %new_user,
                referrer = %referrer,
                referral_count,
                "Referral cascade completed"
            );
        }

        Ok(CascadeOutcome {
            referrer,
            steps,
            partial,
        })
    }

    async fn run_award(
        &self,
        user_id: &UserId,
        amount: u64,
        reason: &str,
        metadata: HashMap<String, String>,
    ) -> StepStatus {
        match self
            .ledger
            .award(user_id, Source::Referrals, amount, reason, metadata)
            .await
        {
            Ok(result) if result.success => StepStatus::Completed,
            Ok(result) => StepStatus::Failed(result.message),
            Err(e) => StepStatus::Failed(e.to_string()),
        }
    }
}
