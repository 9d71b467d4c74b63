//! Service tiers.
//!
//! K_i: The set of tiers is closed and known at compile time.
//! B_i: Tier names arriving as text may be unrecognized → Result

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Caller-selected service level deciding which models sit on the roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// Two fast, cheap models
    Lite,
    /// Three models
    Pro,
    /// The full five-model council
    #[default]
    Meta,
}

impl Tier {
    /// All tiers, smallest first.
    pub const ALL: [Tier; 3] = [Tier::Lite, Tier::Pro, Tier::Meta];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Lite => "lite",
            Tier::Pro => "pro",
            Tier::Meta => "meta",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lite" => Ok(Tier::Lite),
            "pro" | "standard" => Ok(Tier::Pro),
            "meta" | "ultra" => Ok(Tier::Meta),
            _ => Err(ConfigError::UnknownTier(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_aliases() {
        assert_eq!("lite".parse::<Tier>().unwrap(), Tier::Lite);
        assert_eq!("Pro".parse::<Tier>().unwrap(), Tier::Pro);
        assert_eq!("standard".parse::<Tier>().unwrap(), Tier::Pro);
        assert_eq!(" META ".parse::<Tier>().unwrap(), Tier::Meta);
        assert_eq!("ultra".parse::<Tier>().unwrap(), Tier::Meta);
    }

    #[test]
    fn test_unknown_tier_is_config_error() {
        let err = "platinum".parse::<Tier>().unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTier(ref name) if name == "platinum"));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>().unwrap(), tier);
        }
    }
}
