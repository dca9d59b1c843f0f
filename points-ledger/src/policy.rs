//! Per-source earning limit policy
//!
//! Static configuration consulted on every Award: daily caps, per-action
//! caps, and cooldowns. Admin-editable out of band, read-only at request
//! time.

use crate::types::Source;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Limits for a single source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitPolicy {
    /// Maximum points per calendar day (None = uncapped, no daily counter)
    pub daily_cap: Option<u64>,

    /// Maximum points a single Award may grant
    pub per_action_cap: u64,

    /// Minimum seconds between successful awards (0 = disabled)
    pub cooldown_secs: u64,
}

impl LimitPolicy {
    /// Whether this source keeps a daily counter
    pub fn tracks_daily(&self) -> bool {
        self.daily_cap.is_some()
    }
}

/// Limit policies for every known source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyTable {
    policies: HashMap<Source, LimitPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let policies = Source::all()
            .into_iter()
            .map(|source| (source, Self::default_policy(source)))
            .collect();
        Self { policies }
    }
}

// Config files may override only some sources; the rest must keep their
// defaults, so parsed entries merge over a full table.
impl<'de> Deserialize<'de> for PolicyTable {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            policies: HashMap<Source, LimitPolicy>,
        }

        let raw = Raw::deserialize(deserializer)?;
        Ok(Self::with_overrides(raw.policies))
    }
}

impl PolicyTable {
    /// Build a table from explicit per-source entries
    ///
    /// Sources missing from `entries` fall back to the defaults.
    pub fn with_overrides(entries: HashMap<Source, LimitPolicy>) -> Self {
        let mut table = Self::default();
        table.policies.extend(entries);
        table
    }

    /// Policy for one source
    ///
    /// A source absent from the table gets its built-in default.
    pub fn get(&self, source: Source) -> LimitPolicy {
        self.policies
            .get(&source)
            .copied()
            .unwrap_or_else(|| Self::default_policy(source))
    }

    fn default_policy(source: Source) -> LimitPolicy {
        match source {
            Source::Game => LimitPolicy {
                daily_cap: Some(200),
                per_action_cap: 50,
                cooldown_secs: 0,
            },
            Source::Ads => LimitPolicy {
                daily_cap: Some(100),
                per_action_cap: 25,
                cooldown_secs: 30,
            },
            Source::Daily => LimitPolicy {
                daily_cap: Some(50),
                per_action_cap: 50,
                cooldown_secs: 0,
            },
            Source::Referrals => LimitPolicy {
                daily_cap: None,
                per_action_cap: 100,
                cooldown_secs: 0,
            },
            Source::Admin => LimitPolicy {
                daily_cap: None,
                per_action_cap: 10_000,
                cooldown_secs: 0,
            },
        }
    }
}
