use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::archons::DivineAbility;
use crate::rules::activation::ActivationOutcome;
use crate::rules::principle::{ParseEnumError, Principle};
use crate::rules::stability::{CombatOutcome, Intensity};
use crate::rules::suppression::{SuppressionResult, SuppressionSource};
use crate::simulation::player::DefeatTier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterType {
    Minor,
    Duel,
    Boss,
    Climax,
}

impl EncounterType {
    pub fn phase_count(self) -> usize {
        match self {
            EncounterType::Minor => 1,
            EncounterType::Duel => 2,
            EncounterType::Boss => 3,
            EncounterType::Climax => 4,
        }
    }

    pub fn decision_points(self) -> usize {
        self.phase_count() - 1
    }
}

impl FromStr for EncounterType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "minor" => Ok(EncounterType::Minor),
            "duel" => Ok(EncounterType::Duel),
            "boss" => Ok(EncounterType::Boss),
            "climax" => Ok(EncounterType::Climax),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatAction {
    Strike,
    Shift,
    Stabilize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Approach {
    pub action: CombatAction,
    pub intensity: Intensity,
    /// Owned skill id, its skin, or a bare principle key.
    pub skill_name: String,
    #[serde(default)]
    pub use_unique: bool,
    #[serde(default)]
    pub invoke_divine: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnemyKind {
    Normal,
    Elite,
    General { general_id: String },
    Boss { boss_id: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyProfile {
    pub name: String,
    pub principle: Principle,
    pub threat_level: f64,
    #[serde(flatten)]
    pub kind: EnemyKind,
    #[serde(default)]
    pub suppression: Option<SuppressionSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombatRequest {
    pub encounter_type: EncounterType,
    pub enemy: EnemyProfile,
    pub approach: Approach,
    #[serde(default)]
    pub followup_approaches: Vec<Approach>,
    pub floor: u8,
    pub crng_roll: f64,
}

impl CombatRequest {
    /// Phase 0 uses the opening approach; later phases take the matching
    /// follow-up or repeat the opening.
    pub fn approach_for_phase(&self, phase: usize) -> &Approach {
        if phase == 0 {
            return &self.approach;
        }
        self.followup_approaches
            .get(phase - 1)
            .unwrap_or(&self.approach)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UniqueUse {
    pub outcome: ActivationOutcome,
    pub effectiveness: f64,
    pub bonus: f64,
    pub sub_skill_bonus: f64,
    pub clause_bonus: f64,
    pub ultimate_surge: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseResult {
    pub index: usize,
    pub action: CombatAction,
    pub intensity: Intensity,
    pub principle_used: Principle,
    pub enemy_principle: Principle,
    pub score: f64,
    pub outcome: CombatOutcome,
    pub tier_misfire: bool,
    pub backlash: bool,
    pub stability_cost: f64,
    pub hp_cost: f64,
    pub resonance_before: f64,
    pub resonance_after: f64,
    pub enemy_hp_after: f64,
    pub principle_shift: Option<Principle>,
    pub unique: Option<UniqueUse>,
    pub fate_fired: bool,
    /// Adaptation carried into the next phase's score.
    pub next_phase_adaptation: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionOption {
    pub action: CombatAction,
    pub intensity: Intensity,
    pub stability_preview: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionPoint {
    pub after_phase: usize,
    pub options: Vec<DecisionOption>,
    pub boss_tell: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WeaponCombatContext {
    pub name: String,
    pub grade: String,
    pub signature: Option<String>,
    pub build_fit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatBrief {
    pub encounter_type: EncounterType,
    pub phases: Vec<PhaseResult>,
    pub decision_points: Vec<DecisionPoint>,
    pub final_outcome: CombatOutcome,
    pub narrative_cues: Vec<String>,
    pub total_stability_cost: f64,
    pub total_hp_cost: f64,
    pub resonance_growth: f64,
    pub instability_sum: f64,
    pub unique_outcome: Option<ActivationOutcome>,
    pub suppression: Option<SuppressionResult>,
    pub weapon_context: Option<WeaponCombatContext>,
    pub divine_ability: Option<DivineAbility>,
    pub fate_fired: bool,
    pub defeat: Option<DefeatTier>,
    pub won: bool,
    pub boss_cleared: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encounter_shapes() {
        assert_eq!(EncounterType::Minor.decision_points(), 0);
        assert_eq!(EncounterType::Climax.phase_count(), 4);
        assert_eq!(EncounterType::Boss.decision_points(), 2);
    }

    #[test]
    fn followups_fall_back_to_opening() {
        let opening = Approach {
            action: CombatAction::Strike,
            intensity: Intensity::Push,
            skill_name: "energy".to_string(),
            use_unique: false,
            invoke_divine: false,
        };
        let shift = Approach {
            action: CombatAction::Shift,
            ..opening.clone()
        };
        let request = CombatRequest {
            encounter_type: EncounterType::Boss,
            enemy: EnemyProfile {
                name: "Warden".to_string(),
                principle: Principle::Matter,
                threat_level: 0.4,
                kind: EnemyKind::Normal,
                suppression: None,
            },
            approach: opening.clone(),
            followup_approaches: vec![shift.clone()],
            floor: 1,
            crng_roll: 0.5,
        };
        assert_eq!(request.approach_for_phase(0), &opening);
        assert_eq!(request.approach_for_phase(1), &shift);
        assert_eq!(request.approach_for_phase(2), &opening);
    }

    #[test]
    fn enemy_kind_is_tagged() {
        let enemy: EnemyProfile = serde_json::from_str(
            r#"{"name":"Regent","principle":"void","threat_level":0.55,"kind":"boss","boss_id":"hollow_regent"}"#,
        )
        .expect("parse");
        assert_eq!(
            enemy.kind,
            EnemyKind::Boss {
                boss_id: "hollow_regent".to_string()
            }
        );
    }
}
