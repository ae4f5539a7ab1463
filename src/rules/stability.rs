use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::principle::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatOutcome {
    Favorable,
    Mixed,
    Unfavorable,
}

impl CombatOutcome {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.60 {
            CombatOutcome::Favorable
        } else if score >= 0.40 {
            CombatOutcome::Mixed
        } else {
            CombatOutcome::Unfavorable
        }
    }

    /// Instability drift mirroring the outcome sign.
    pub fn instability_sign(self) -> i32 {
        match self {
            CombatOutcome::Favorable => -1,
            CombatOutcome::Mixed => 0,
            CombatOutcome::Unfavorable => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Safe,
    Push,
    Overdrive,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityProfile {
    pub score_bonus: f64,
    pub stability_cost: f64,
    pub backlash_chance: f64,
}

impl Intensity {
    pub fn profile(self) -> IntensityProfile {
        match self {
            Intensity::Safe => IntensityProfile {
                score_bonus: 0.0,
                stability_cost: 15.0,
                backlash_chance: 0.0,
            },
            Intensity::Push => IntensityProfile {
                score_bonus: 0.02,
                stability_cost: 22.0,
                backlash_chance: 0.05,
            },
            Intensity::Overdrive => IntensityProfile {
                score_bonus: 0.05,
                stability_cost: 30.0,
                backlash_chance: 0.20,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intensity::Safe => "safe",
            Intensity::Push => "push",
            Intensity::Overdrive => "overdrive",
        }
    }
}

impl FromStr for Intensity {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "safe" => Ok(Intensity::Safe),
            "push" => Ok(Intensity::Push),
            "overdrive" => Ok(Intensity::Overdrive),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilityTier {
    Normal,
    Unstable,
    Critical,
    Broken,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierEffects {
    pub score_modifier: f64,
    pub misfire_chance: f64,
    pub overdrive_available: bool,
}

impl StabilityTier {
    pub fn from_stability(stability: f64) -> Self {
        if stability >= 60.0 {
            StabilityTier::Normal
        } else if stability >= 30.0 {
            StabilityTier::Unstable
        } else if stability >= 10.0 {
            StabilityTier::Critical
        } else {
            StabilityTier::Broken
        }
    }

    pub fn effects(self) -> TierEffects {
        match self {
            StabilityTier::Normal => TierEffects {
                score_modifier: 0.0,
                misfire_chance: 0.0,
                overdrive_available: true,
            },
            StabilityTier::Unstable => TierEffects {
                score_modifier: 0.05,
                misfire_chance: 0.10,
                overdrive_available: true,
            },
            StabilityTier::Critical => TierEffects {
                score_modifier: 0.15,
                misfire_chance: 0.25,
                overdrive_available: false,
            },
            StabilityTier::Broken => TierEffects {
                score_modifier: 0.30,
                misfire_chance: 0.50,
                overdrive_available: false,
            },
        }
    }

    /// Downgrades overdrive to push when the tier forbids it.
    pub fn gate_intensity(self, requested: Intensity) -> Intensity {
        if requested == Intensity::Overdrive && !self.effects().overdrive_available {
            Intensity::Push
        } else {
            requested
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StabilityTier::Normal => "steady",
            StabilityTier::Unstable => "wavering",
            StabilityTier::Critical => "fraying",
            StabilityTier::Broken => "shattered",
        }
    }
}

/// Backlash fires when the roll lands under the intensity's chance less the
/// player's earned risk reduction.
pub fn backlash_fires(intensity: Intensity, risk_reduction: f64, roll: f64) -> bool {
    let chance = (intensity.profile().backlash_chance - risk_reduction.max(0.0)).max(0.0);
    roll < chance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_buckets_at_boundaries() {
        assert_eq!(CombatOutcome::from_score(0.60), CombatOutcome::Favorable);
        assert_eq!(CombatOutcome::from_score(0.5999), CombatOutcome::Mixed);
        assert_eq!(CombatOutcome::from_score(0.40), CombatOutcome::Mixed);
        assert_eq!(CombatOutcome::from_score(0.3999), CombatOutcome::Unfavorable);
    }

    #[test]
    fn tiers_and_overdrive_gate() {
        assert_eq!(StabilityTier::from_stability(60.0), StabilityTier::Normal);
        assert_eq!(StabilityTier::from_stability(30.0), StabilityTier::Unstable);
        assert_eq!(StabilityTier::from_stability(10.0), StabilityTier::Critical);
        assert_eq!(StabilityTier::from_stability(9.9), StabilityTier::Broken);
        assert_eq!(
            StabilityTier::Critical.gate_intensity(Intensity::Overdrive),
            Intensity::Push
        );
        assert_eq!(
            StabilityTier::Unstable.gate_intensity(Intensity::Overdrive),
            Intensity::Overdrive
        );
    }

    #[test]
    fn risk_reduction_lowers_backlash() {
        assert!(backlash_fires(Intensity::Overdrive, 0.0, 0.15));
        assert!(!backlash_fires(Intensity::Overdrive, 0.10, 0.15));
        assert!(!backlash_fires(Intensity::Safe, 0.0, 0.0));
    }
}
