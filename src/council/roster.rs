//! Roster selection.
//!
//! K_i: Every tier maps to a fixed, non-empty, ordered list of models.
//! K_i: The mapping is frozen at construction; same tier → same list.
//! I^R: Rosters can be overridden per tier from config.

use crate::models::{ConfigError, Tier, TiersConfig};
use std::collections::HashMap;

const LITE_ROSTER: &[&str] = &["openai/gpt-4o-mini", "anthropic/claude-3-haiku"];

const PRO_ROSTER: &[&str] = &[
    "openai/gpt-4o-mini",
    "anthropic/claude-3-haiku",
    "google/gemini-flash-1.5",
];

const META_ROSTER: &[&str] = &[
    "openai/gpt-4o-mini",
    "anthropic/claude-3-haiku",
    "google/gemini-flash-1.5",
    "meta-llama/llama-3.1-8b-instruct",
    "mistralai/mistral-7b-instruct",
];

/// Built-in roster for a tier.
pub fn default_roster(tier: Tier) -> &'static [&'static str] {
    match tier {
        Tier::Lite => LITE_ROSTER,
        Tier::Pro => PRO_ROSTER,
        Tier::Meta => META_ROSTER,
    }
}

/// Immutable `Tier → roster` lookup.
#[derive(Debug, Clone)]
pub struct RosterSelector {
    rosters: HashMap<Tier, Vec<String>>,
}

impl Default for RosterSelector {
    fn default() -> Self {
        let rosters = Tier::ALL
            .into_iter()
            .map(|tier| {
                let models = default_roster(tier).iter().map(|m| m.to_string()).collect();
                (tier, models)
            })
            .collect();
        Self { rosters }
    }
}

impl RosterSelector {
    /// Built-in rosters with per-tier overrides applied.
    ///
    /// B_i(every override is non-empty) → Result
    pub fn from_config(tiers: &TiersConfig) -> Result<Self, ConfigError> {
        let mut selector = Self::default();
        for tier in Tier::ALL {
            let Some(models) = tiers.get(tier) else {
                continue;
            };
            let models: Vec<String> = models
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if models.is_empty() {
                return Err(ConfigError::EmptyRoster(tier));
            }
            selector.rosters.insert(tier, models);
        }
        Ok(selector)
    }

    /// Roster for a tier, in probe order.
    pub fn roster(&self, tier: Tier) -> &[String] {
        // Every tier is populated by Default and overrides only replace entries
        self.rosters.get(&tier).map(Vec::as_slice).unwrap_or_default()
    }

    /// Resolve a tier by name.
    ///
    /// B_i(name is a known tier) → Result
    pub fn resolve(&self, tier_name: &str) -> Result<(Tier, &[String]), ConfigError> {
        let tier: Tier = tier_name.parse()?;
        Ok((tier, self.roster(tier)))
    }
}
