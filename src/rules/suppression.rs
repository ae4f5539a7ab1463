use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::principle::ParseEnumError;
use crate::simulation::unique_skill::{SkillCategory, UniqueSkill, WeaknessType};

const BLIND_SPOT_BONUS: f64 = 15.0;
const WEAKNESS_BONUS: f64 = 10.0;
const EXPLOIT_CAP: f64 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionKind {
    Skill,
    Seal,
    Field,
}

impl SuppressionKind {
    pub fn power_multiplier(self) -> f64 {
        match self {
            SuppressionKind::Skill => 1.0,
            SuppressionKind::Seal => 1.5,
            SuppressionKind::Field => 2.0,
        }
    }
}

impl FromStr for SuppressionKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "skill" => Ok(SuppressionKind::Skill),
            "seal" => Ok(SuppressionKind::Seal),
            "field" => Ok(SuppressionKind::Field),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

/// Source categories that can exploit each weakness type.
pub fn weakness_exploiters(weakness: WeaknessType) -> &'static [SkillCategory] {
    match weakness {
        WeaknessType::SensoryTax => &[SkillCategory::Perception, SkillCategory::Manifestation],
        WeaknessType::ResonanceDrain => &[SkillCategory::Manipulation],
        WeaknessType::Tethered => &[SkillCategory::Contract, SkillCategory::Manipulation],
        WeaknessType::DelayedCast => &[SkillCategory::Perception],
        WeaknessType::EmotionalOverload => &[SkillCategory::Contract],
        WeaknessType::ConditionalTrigger => &[SkillCategory::Obfuscation],
        WeaknessType::IdentityBleed => &[SkillCategory::Obfuscation, SkillCategory::Contract],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionSource {
    pub kind: SuppressionKind,
    pub power: f64,
    /// Category of the enemy's unique-tier ability, when it has one.
    pub category: Option<SkillCategory>,
    pub enemy_has_unique: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionLevel {
    None,
    Suppressed,
    Sealed,
    Nullified,
}

impl SuppressionLevel {
    /// Sealed and nullified block the clause bonus and ultimate/divine use.
    pub fn blocks_ultimate(self) -> bool {
        matches!(self, SuppressionLevel::Sealed | SuppressionLevel::Nullified)
    }

    pub fn label(self) -> &'static str {
        match self {
            SuppressionLevel::None => "unbound",
            SuppressionLevel::Suppressed => "dampened",
            SuppressionLevel::Sealed => "sealed",
            SuppressionLevel::Nullified => "silenced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "phases", rename_all = "snake_case")]
pub enum SuppressionDuration {
    Phases(u8),
    FieldLifetime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuppressionResult {
    pub level: SuppressionLevel,
    pub effectiveness_modifier: f64,
    pub duration: SuppressionDuration,
    pub effective_power: f64,
    pub gap: f64,
}

impl SuppressionResult {
    pub fn none() -> Self {
        Self {
            level: SuppressionLevel::None,
            effectiveness_modifier: 1.0,
            duration: SuppressionDuration::Phases(0),
            effective_power: 0.0,
            gap: 0.0,
        }
    }
}

pub fn exploit_bonus(skill: &UniqueSkill, source_category: Option<SkillCategory>) -> f64 {
    let Some(category) = source_category else {
        return 0.0;
    };
    let mut bonus = 0.0;
    if category == skill.axis_blind_spot {
        bonus += BLIND_SPOT_BONUS;
    }
    if weakness_exploiters(skill.weakness_type).contains(&category) {
        bonus += WEAKNESS_BONUS;
    }
    bonus.min(EXPLOIT_CAP)
}

/// Buckets the gap between an external force and the skill's resistance.
pub fn resolve_suppression(skill: &UniqueSkill, source: &SuppressionSource) -> SuppressionResult {
    if source.kind == SuppressionKind::Skill && !source.enemy_has_unique {
        return SuppressionResult::none();
    }

    let effective_power =
        source.power.max(0.0) * source.kind.power_multiplier() + exploit_bonus(skill, source.category);
    let gap = effective_power - skill.suppression_resistance;

    let (level, effectiveness_modifier, duration) = if gap < 0.0 {
        (SuppressionLevel::None, 1.0, SuppressionDuration::Phases(0))
    } else if gap < 30.0 {
        let phases = if gap < 15.0 { 2 } else { 3 };
        (
            SuppressionLevel::Suppressed,
            (1.0 - gap / 100.0).max(0.2),
            SuppressionDuration::Phases(phases),
        )
    } else if gap < 60.0 {
        let phases = if gap < 45.0 { 3 } else { 5 };
        (SuppressionLevel::Sealed, 0.0, SuppressionDuration::Phases(phases))
    } else {
        (SuppressionLevel::Nullified, 0.0, SuppressionDuration::FieldLifetime)
    };

    tracing::debug!(
        target: "progression::unique",
        skill = %skill.name,
        level = ?level,
        gap,
        "suppression.resolved"
    );

    SuppressionResult {
        level,
        effectiveness_modifier,
        duration,
        effective_power,
        gap,
    }
}
