use std::collections::BTreeMap;

use serde::Serialize;

use crate::rules::principle::Principle;
use crate::rules::resonance::to_prose_bucket;
use crate::rules::stability::{CombatOutcome, StabilityTier};
use crate::rules::suppression::SuppressionLevel;
use crate::simulation::combat::{CombatBrief, WeaponCombatContext};
use crate::simulation::growth::GrowthEvent;
use crate::simulation::identity::{DriftLevel, IdentityDelta};
use crate::simulation::player::{DefeatTier, PlayerState};
use crate::simulation::villain::{
    current_anomaly_seeds, Allegiance, EmissaryContext, IdentityMutation,
};
use crate::simulation::weapon::{Weapon, MAX_LORE_FRAGMENTS};
use crate::systems::chapter::NarrativeDirective;

/// Writer-facing view of one chapter. Labels only: no scores, no fate
/// buffer, nothing the prose could quote as a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriterContextBundle {
    pub identity: IdentityContext,
    pub resonance: ResonanceContext,
    pub combat: Option<CombatContext>,
    pub unique_skill: Option<UniqueSkillContext>,
    pub weapons: Vec<WeaponContext>,
    pub villain: VillainContext,
    pub growth: Vec<GrowthEvent>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityContext {
    pub coherence: &'static str,
    pub instability: &'static str,
    pub decision_quality: &'static str,
    pub breakthrough: &'static str,
    pub notoriety: &'static str,
    pub alignment: &'static str,
    pub drift: DriftLevel,
    pub confrontation: bool,
    pub questioned_value: Option<String>,
    pub scarred: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResonanceContext {
    pub dominant: Principle,
    pub principles: BTreeMap<Principle, &'static str>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CombatContext {
    pub outcome: CombatOutcome,
    pub cues: Vec<String>,
    pub stability: &'static str,
    pub condition: &'static str,
    pub weapon: Option<WeaponCombatContext>,
    pub divine_ability: Option<&'static str>,
    pub boss_tells: Vec<String>,
    pub defeat: Option<DefeatTier>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UniqueSkillContext {
    pub name: String,
    pub stage: &'static str,
    pub domain_passive: String,
    pub clause: String,
    pub sub_skills: Vec<String>,
    pub suppression: &'static str,
    pub fractured: bool,
    pub weakness_relaxed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeaponContext {
    pub name: String,
    pub grade: &'static str,
    pub bond: &'static str,
    pub signature: Option<String>,
    pub awakened_passive: Option<String>,
    pub lore: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VillainContext {
    pub allegiance: Allegiance,
    pub empire_pull: &'static str,
    pub anchor: &'static str,
    pub gray_zone: bool,
    pub hunter: Option<String>,
    pub mutations: Vec<IdentityMutation>,
    pub thresholds: Vec<String>,
    pub emissaries: Vec<EmissaryContext>,
    pub anomaly_seeds: Vec<String>,
}

fn scalar_label(value: f64) -> &'static str {
    if value < 20.0 {
        "faint"
    } else if value < 40.0 {
        "low"
    } else if value < 60.0 {
        "moderate"
    } else if value < 80.0 {
        "high"
    } else {
        "overwhelming"
    }
}

fn alignment_label(value: f64) -> &'static str {
    if value < -60.0 {
        "ruthless"
    } else if value < -20.0 {
        "hardened"
    } else if value <= 20.0 {
        "balanced"
    } else if value <= 60.0 {
        "principled"
    } else {
        "luminous"
    }
}

fn condition_label(hp_ratio: f64) -> &'static str {
    if hp_ratio >= 0.75 {
        "unhurt"
    } else if hp_ratio >= 0.40 {
        "bloodied"
    } else if hp_ratio > 0.0 {
        "failing"
    } else {
        "fallen"
    }
}

fn bond_label(bond: f64) -> &'static str {
    if bond < 40.0 {
        "distant"
    } else if bond < 80.0 {
        "trusted"
    } else if bond <= 100.0 {
        "bonded"
    } else {
        "transcendent"
    }
}

fn lore_label(weapon: &Weapon) -> &'static str {
    if !weapon.is_archon_fragment || weapon.lore_fragments_revealed == 0 {
        "sealed"
    } else if weapon.lore_fragments_revealed < MAX_LORE_FRAGMENTS {
        "stirring"
    } else {
        "revealed"
    }
}

fn weapon_context(weapon: &Weapon) -> WeaponContext {
    WeaponContext {
        name: weapon.name.clone(),
        grade: weapon.grade.label(),
        bond: bond_label(weapon.bond_score),
        signature: weapon.signature_move.as_ref().map(|sig| sig.name.clone()),
        awakened_passive: weapon.awakened_passive.clone(),
        lore: lore_label(weapon),
    }
}

pub fn build_writer_context(
    player: &PlayerState,
    combat: Option<&CombatBrief>,
    growth: &[GrowthEvent],
    delta: &IdentityDelta,
    directives: &[NarrativeDirective],
) -> WriterContextBundle {
    let suppression = combat
        .and_then(|brief| brief.suppression)
        .map_or(SuppressionLevel::None, |result| result.level);

    let identity = IdentityContext {
        coherence: scalar_label(player.coherence),
        instability: scalar_label(player.instability),
        decision_quality: scalar_label(player.dqs),
        breakthrough: scalar_label(player.breakthrough),
        notoriety: scalar_label(player.notoriety),
        alignment: alignment_label(player.alignment),
        drift: delta.drift_detected,
        confrontation: delta.confrontation_triggered,
        questioned_value: player.villain.questioned_value.clone(),
        scarred: !player.scars.is_empty(),
    };

    let resonance = ResonanceContext {
        dominant: player.dominant_principle(),
        principles: player
            .principle_resonance
            .0
            .iter()
            .map(|(principle, value)| (*principle, to_prose_bucket(*value)))
            .collect(),
    };

    let combat = combat.map(|brief| CombatContext {
        outcome: brief.final_outcome,
        cues: brief.narrative_cues.clone(),
        stability: StabilityTier::from_stability(player.stability).label(),
        condition: condition_label(player.combat_metrics().hp_ratio()),
        weapon: brief.weapon_context.clone(),
        divine_ability: brief.divine_ability.map(|ability| ability.name),
        boss_tells: brief
            .decision_points
            .iter()
            .filter_map(|point| point.boss_tell.clone())
            .collect(),
        defeat: brief.defeat,
    });

    let unique_skill = player.unique_skill.as_ref().map(|skill| {
        let stage = player
            .unique_skill_growth
            .as_ref()
            .map_or("seed", |growth| growth.current_stage.label());
        let sub_skills = if suppression == SuppressionLevel::Nullified {
            Vec::new()
        } else {
            skill.sub_skills.iter().map(|sub| sub.name.clone()).collect()
        };
        UniqueSkillContext {
            name: skill.name.clone(),
            stage,
            domain_passive: skill.domain_passive.clone(),
            clause: skill.unique_clause.description.clone(),
            sub_skills,
            suppression: suppression.label(),
            fractured: skill.fracture,
            weakness_relaxed: skill.weakness_relaxed,
        }
    });

    let slots = &player.equipped_weapons;
    let weapons = [&slots.primary, &slots.secondary, &slots.utility]
        .into_iter()
        .filter_map(|slot| slot.as_ref())
        .map(weapon_context)
        .collect();

    let mut thresholds = Vec::new();
    let mut emissaries = Vec::new();
    for directive in directives {
        match directive {
            NarrativeDirective::VillainThreshold { flag } => thresholds.push(flag.clone()),
            NarrativeDirective::Emissary { context } => emissaries.push(context.clone()),
            _ => {}
        }
    }
    let villain = VillainContext {
        allegiance: player.villain.allegiance,
        empire_pull: scalar_label(player.empire_resonance),
        anchor: scalar_label(player.identity_anchor),
        gray_zone: thresholds
            .iter()
            .any(|flag| flag == crate::data::villains::GRAY_ZONE_FLAG),
        hunter: player.villain.hunter.clone(),
        mutations: player.villain.mutations.iter().copied().collect(),
        thresholds,
        emissaries,
        anomaly_seeds: current_anomaly_seeds(player),
    };

    WriterContextBundle {
        identity,
        resonance,
        combat,
        unique_skill,
        weapons,
        villain,
        growth: growth.to_vec(),
    }
}
