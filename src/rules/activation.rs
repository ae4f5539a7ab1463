use serde::{Deserialize, Serialize};

use crate::simulation::unique_skill::{GrowthStage, UniqueSkill};

pub const BACKFIRE_HP_COST: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    Full,
    Weakened,
    Misfire,
    Backfire,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FatigueRow {
    pub effectiveness: f64,
    pub stability_cost: f64,
    pub misfire_chance: f64,
    pub backfire_chance: f64,
}

/// Indexed by the 1-based activation count within the chapter.
pub fn usage_fatigue(use_index: u32) -> FatigueRow {
    match use_index {
        0 | 1 => FatigueRow {
            effectiveness: 1.0,
            stability_cost: 0.0,
            misfire_chance: 0.0,
            backfire_chance: 0.0,
        },
        2 => FatigueRow {
            effectiveness: 0.8,
            stability_cost: 5.0,
            misfire_chance: 0.05,
            backfire_chance: 0.0,
        },
        3 => FatigueRow {
            effectiveness: 0.5,
            stability_cost: 12.0,
            misfire_chance: 0.20,
            backfire_chance: 0.05,
        },
        _ => FatigueRow {
            effectiveness: 0.2,
            stability_cost: 20.0,
            misfire_chance: 0.40,
            backfire_chance: 0.15,
        },
    }
}

/// (effectiveness multiplier, added misfire chance)
pub fn resilience_gate(resilience: f64) -> (f64, f64) {
    if resilience >= 80.0 {
        (1.0, 0.0)
    } else if resilience >= 50.0 {
        (0.85, 0.05)
    } else if resilience >= 20.0 {
        (0.65, 0.15)
    } else {
        (0.40, 0.30)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivationInputs {
    pub use_index: u32,
    pub resilience: f64,
    pub skill_instability: f64,
    pub player_instability: f64,
    pub player_stability: f64,
}

impl ActivationInputs {
    pub fn for_skill(skill: &UniqueSkill, player_instability: f64, player_stability: f64) -> Self {
        Self {
            use_index: skill.uses_this_chapter + 1,
            resilience: skill.resilience,
            skill_instability: skill.instability,
            player_instability,
            player_stability,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationResult {
    pub outcome: ActivationOutcome,
    pub effectiveness: f64,
    pub stability_cost: f64,
    pub hp_cost: f64,
    pub misfire_chance: f64,
    pub backfire_chance: f64,
}

/// Stacks the fatigue, resilience and instability layers, then resolves one roll.
pub fn check_activation(inputs: &ActivationInputs, roll: f64) -> ActivationResult {
    let fatigue = usage_fatigue(inputs.use_index);
    let (resilience_mult, resilience_misfire) = resilience_gate(inputs.resilience.clamp(0.0, 100.0));

    let mut effectiveness = fatigue.effectiveness * resilience_mult;
    let mut stability_cost = fatigue.stability_cost;
    let mut misfire = fatigue.misfire_chance + resilience_misfire;
    let mut backfire = fatigue.backfire_chance;

    if inputs.skill_instability >= 70.0 {
        misfire += 0.12;
    } else if inputs.skill_instability >= 40.0 {
        misfire += 0.05;
    }
    if inputs.player_instability >= 80.0 {
        backfire += 0.25;
    } else if inputs.player_instability >= 60.0 {
        backfire += 0.10;
    }
    if inputs.player_stability < 30.0 {
        misfire += 0.10;
        stability_cost *= 1.5;
    }

    let mut hp_cost = 0.0;
    let outcome = if roll < backfire {
        ActivationOutcome::Backfire
    } else if roll < backfire + misfire {
        ActivationOutcome::Misfire
    } else if effectiveness < 0.8 {
        ActivationOutcome::Weakened
    } else {
        ActivationOutcome::Full
    };

    match outcome {
        ActivationOutcome::Backfire => {
            effectiveness = 0.0;
            stability_cost *= 2.0;
            hp_cost = BACKFIRE_HP_COST;
        }
        ActivationOutcome::Misfire => effectiveness = 0.0,
        ActivationOutcome::Weakened | ActivationOutcome::Full => {}
    }

    ActivationResult {
        outcome,
        effectiveness,
        stability_cost,
        hp_cost,
        misfire_chance: misfire,
        backfire_chance: backfire,
    }
}

/// Post-chapter resilience drift.
pub fn drift_resilience(resilience: f64, uses_this_chapter: u32, coherence: f64, instability: f64) -> f64 {
    let mut next = resilience;
    if uses_this_chapter >= 3 {
        next -= 5.0;
    }
    if coherence < 50.0 {
        next -= 2.0;
    }
    if instability >= 60.0 {
        next -= 1.0;
    }
    if coherence >= 80.0 {
        next += 3.0;
    }
    next.clamp(0.0, 100.0)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "permission", rename_all = "snake_case")]
pub enum MutationPermission {
    Allowed,
    AllowedWithWarning { warning: String },
    Denied { reason: String },
}

pub fn check_mutation_allowed(skill: &UniqueSkill, stage: GrowthStage) -> MutationPermission {
    if skill.mutation_locked {
        return MutationPermission::Denied {
            reason: "mutation locked".to_string(),
        };
    }
    match stage {
        GrowthStage::Seed => MutationPermission::Allowed,
        GrowthStage::Bloom => MutationPermission::AllowedWithWarning {
            warning: "bloomed skill will lose its bloom shape".to_string(),
        },
        GrowthStage::Aspect | GrowthStage::Ultimate => MutationPermission::Denied {
            reason: format!("{} skills cannot mutate", stage.label()),
        },
    }
}
