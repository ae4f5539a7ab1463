use std::collections::BTreeMap;

use crate::data::bosses::{boss_by_id, BossTemplate};
use crate::data::config::{CombatConfig, EngineConfig};
use crate::rules::activation::{check_activation, ActivationInputs, ActivationOutcome};
use crate::rules::principle::{counter_principle, get_principle_interaction, resolve_principle, Principle};
use crate::rules::resonance::{
    apply_milestone_rewards, check_mastery_milestones, update_after_combat_mastered, CombatLogEntry,
    OverdriveResult, BASE_RESONANCE_FLOOR,
};
use crate::rules::stability::{backlash_fires, CombatOutcome, Intensity, StabilityTier};
use crate::rules::suppression::{
    resolve_suppression, SuppressionDuration, SuppressionLevel, SuppressionResult,
};
use crate::simulation::combat::{
    Approach, CombatAction, CombatBrief, CombatRequest, DecisionOption, DecisionPoint,
    EncounterType, EnemyKind, PhaseResult, UniqueUse, WeaponCombatContext,
};
use crate::simulation::player::{DefeatTier, PlayerState, ScarRecord};
use crate::simulation::rolls::RollSource;
use crate::simulation::unique_skill::{BloomPath, ClauseContext, GrowthStage};
use crate::simulation::weapon::{build_fit, season_for, use_divine_ability};

pub const ULTIMATE_BONUS_CAP: f64 = 0.08;
const SUB_SKILL_STEP: f64 = 0.01;
const SUB_SKILL_CAP: f64 = 0.03;
const CLAUSE_BONUS: f64 = 0.05;
const ENEMY_START: f64 = 100.0;

pub fn unique_stage_base(stage: GrowthStage) -> f64 {
    match stage {
        GrowthStage::Seed => 0.04,
        GrowthStage::Bloom => 0.05,
        GrowthStage::Aspect => 0.065,
        GrowthStage::Ultimate => 0.08,
    }
}

/// Principle an approach fights with: an owned skill, a bare principle key,
/// or the player's dominant principle when neither resolves.
fn phase_principle(player: &PlayerState, approach: &Approach, enemy_principle: Principle) -> Principle {
    if approach.action == CombatAction::Shift {
        return counter_principle(enemy_principle);
    }
    if let Some(skill) = player.owned_skill(&approach.skill_name) {
        return skill.principle;
    }
    resolve_principle(&approach.skill_name).unwrap_or_else(|| player.dominant_principle())
}

struct ActiveSuppression {
    result: SuppressionResult,
    phases_left: usize,
}

impl ActiveSuppression {
    fn level(&self) -> SuppressionLevel {
        if self.phases_left == 0 {
            SuppressionLevel::None
        } else {
            self.result.level
        }
    }

    fn modifier(&self) -> f64 {
        if self.phases_left == 0 {
            1.0
        } else {
            self.result.effectiveness_modifier
        }
    }
}

struct UniqueCosts {
    stability: f64,
    hp: f64,
}

fn unique_contribution(
    player: &mut PlayerState,
    approach: &Approach,
    suppression: &ActiveSuppression,
    season: u32,
    rolls: &mut dyn RollSource,
) -> Option<(UniqueUse, UniqueCosts)> {
    let level = suppression.level();
    let modifier = suppression.modifier();
    let clause_ctx = ClauseContext {
        hp_ratio: player.combat_metrics().hp_ratio(),
        stability: player.stability,
        instability: player.instability,
        coherence: player.coherence,
    };
    let (player_instability, player_stability, skill_effectiveness) =
        (player.instability, player.stability, player.skill_effectiveness);
    let growth = player.unique_skill_growth.clone().unwrap_or_default();
    let skill = player.unique_skill.as_mut()?;

    if growth.ultimate_forged
        && skill.ultimate_ability_used_season != Some(season)
        && !level.blocks_ultimate()
    {
        skill.ultimate_ability_used_season = Some(season);
        tracing::info!(target: "progression::unique", skill = %skill.name, season, "unique.ultimate_surge");
        return Some((
            UniqueUse {
                outcome: ActivationOutcome::Full,
                effectiveness: 1.0,
                bonus: ULTIMATE_BONUS_CAP,
                sub_skill_bonus: 0.0,
                clause_bonus: 0.0,
                ultimate_surge: true,
            },
            UniqueCosts {
                stability: 0.0,
                hp: 0.0,
            },
        ));
    }

    if !approach.use_unique {
        return None;
    }

    let inputs = ActivationInputs::for_skill(skill, player_instability, player_stability);
    let activation = check_activation(&inputs, rolls.roll());
    skill.uses_this_chapter += 1;

    let effectiveness = activation.effectiveness * skill_effectiveness;
    let bonus = (unique_stage_base(growth.current_stage) * effectiveness * modifier).min(ULTIMATE_BONUS_CAP);
    let landed = effectiveness > 0.0;
    let sub_skill_bonus = if landed && level != SuppressionLevel::Nullified {
        (SUB_SKILL_STEP * skill.combat_sub_skill_count() as f64).min(SUB_SKILL_CAP) * modifier
    } else {
        0.0
    };
    let clause_bonus = if landed && !level.blocks_ultimate() && skill.unique_clause.predicate.holds(&clause_ctx) {
        CLAUSE_BONUS * modifier
    } else {
        0.0
    };

    tracing::debug!(
        target: "progression::unique",
        skill = %skill.name,
        outcome = ?activation.outcome,
        bonus,
        "unique.activated"
    );

    Some((
        UniqueUse {
            outcome: activation.outcome,
            effectiveness,
            bonus,
            sub_skill_bonus,
            clause_bonus,
            ultimate_surge: false,
        },
        UniqueCosts {
            stability: activation.stability_cost,
            hp: activation.hp_cost,
        },
    ))
}

/// Applies the nth-defeat consequences and returns the tier reached.
pub fn apply_defeat(player: &mut PlayerState, chapter: u32, config: &CombatConfig) -> DefeatTier {
    player.defeat_count += 1;
    let tier = DefeatTier::for_defeat_count(player.defeat_count);
    let dominant = player.dominant_principle();
    let shrink_dominant = |player: &mut PlayerState, factor: f64| {
        let current = player.principle_resonance.get(dominant);
        player
            .principle_resonance
            .set(dominant, (current * factor).max(BASE_RESONANCE_FLOOR.min(current)));
    };

    match tier {
        DefeatTier::Scar => {
            player.hp_max *= 0.90;
            player.recovery_rate = 0.60;
            shrink_dominant(player, 0.85);
        }
        DefeatTier::Fracture => {
            player.hp_max *= 0.90;
            player.recovery_rate = 0.50;
            player.instability += 15.0;
            player.skill_effectiveness *= 0.80;
        }
        DefeatTier::BreakingPoint => {
            player.hp_max *= 0.85;
            player.recovery_rate = 0.40;
            player.instability += 25.0;
            shrink_dominant(player, 0.80);
            player.skill_effectiveness *= 0.70;
        }
        DefeatTier::SoulDeath => {
            player.soul_dead = true;
        }
    }

    player.hp = if player.soul_dead {
        0.0
    } else {
        (player.hp_max * player.recovery_rate).max(config.hp_floor)
    };
    player.scars.push(ScarRecord { chapter, tier });
    player.clamp_scalars();
    tracing::info!(
        target: "progression::combat",
        tier = ?tier,
        defeats = player.defeat_count,
        "combat.defeat"
    );
    tier
}

fn decision_point(
    player: &PlayerState,
    after_phase: usize,
    boss: Option<&BossTemplate>,
    boss_phase: usize,
    shifted: bool,
    config: &CombatConfig,
) -> DecisionPoint {
    let tier = StabilityTier::from_stability(player.stability);
    let strike_intensity = if tier.effects().overdrive_available {
        Intensity::Overdrive
    } else {
        Intensity::Push
    };
    let preview = |action: CombatAction, intensity: Intensity| {
        let mut cost = intensity.profile().stability_cost;
        if action == CombatAction::Stabilize {
            cost = (cost - config.stabilize_cost_relief).max(0.0);
        }
        DecisionOption {
            action,
            intensity,
            stability_preview: StabilityTier::from_stability(player.stability - cost)
                .label()
                .to_string(),
        }
    };
    let boss_tell = boss.and_then(|template| {
        let index = if shifted { boss_phase } else { boss_phase + 1 };
        template.phases.get(index).map(|phase| phase.tell.to_string())
    });
    DecisionPoint {
        after_phase,
        options: vec![
            preview(CombatAction::Strike, strike_intensity),
            preview(CombatAction::Shift, Intensity::Push),
            preview(CombatAction::Stabilize, Intensity::Safe),
        ],
        boss_tell,
    }
}

/// Runs every phase of one encounter against the player record.
pub fn resolve_combat(
    player: &mut PlayerState,
    request: &CombatRequest,
    chapter: u32,
    config: &EngineConfig,
    rolls: &mut dyn RollSource,
) -> CombatBrief {
    let tuning = &config.combat;
    let season = season_for(chapter);
    let floor = request.floor.clamp(1, 5);
    let crng = request.crng_roll.clamp(0.0, 1.0);
    let threat = request.enemy.threat_level.clamp(0.0, 1.0);
    let boss = match &request.enemy.kind {
        EnemyKind::Boss { boss_id } => boss_by_id(boss_id),
        _ => None,
    };
    let mut enemy_principle = boss
        .and_then(|template| template.opening_principle())
        .unwrap_or(request.enemy.principle);

    let mut cues = Vec::new();
    let suppression = match (player.unique_skill.as_ref(), request.enemy.suppression.as_ref()) {
        (Some(skill), Some(source)) => Some(resolve_suppression(skill, source)),
        _ => None,
    };
    let mut active_suppression = ActiveSuppression {
        result: suppression.unwrap_or_else(SuppressionResult::none),
        phases_left: match suppression.map(|s| s.duration) {
            Some(SuppressionDuration::Phases(n)) => usize::from(n),
            Some(SuppressionDuration::FieldLifetime) => usize::MAX,
            None => 0,
        },
    };
    if let Some(result) = suppression.filter(|s| s.level != SuppressionLevel::None) {
        cues.push(format!("unique_{}", result.level.label()));
    }

    let divine_ability = if request.approach.invoke_divine {
        player
            .equipped_weapons
            .primary
            .as_mut()
            .and_then(|weapon| use_divine_ability(weapon, chapter, active_suppression.level()))
    } else {
        None
    };
    if let Some(ability) = divine_ability {
        cues.push(format!("divine_ability:{}", ability.name));
    }

    let weapon_context = player.equipped_weapons.primary.as_ref().map(|weapon| WeaponCombatContext {
        name: weapon.name.clone(),
        grade: weapon.grade.label().to_string(),
        signature: weapon.signature_move.as_ref().map(|sig| sig.name.clone()),
        build_fit: String::new(),
    });

    let scar_adaptation = player
        .unique_skill_growth
        .as_ref()
        .filter(|growth| growth.bloom_path == Some(BloomPath::Scar))
        .map_or(0.0, |growth| growth.scar_adaptation);

    let mut enemy_hp = ENEMY_START;
    let mut enemy_stability = ENEMY_START;
    let mut resistance: BTreeMap<Principle, f64> = BTreeMap::new();
    let mut boss_phase = 0usize;
    let mut carry = 0.0;
    let mut phases: Vec<PhaseResult> = Vec::new();
    let mut decision_points = Vec::new();
    let mut log = Vec::new();
    let mut instability_sum = 0.0;
    let mut unique_outcome = None;
    let mut fate_fired = false;
    let mut defeat = None;
    let mut unique_used = false;

    for index in 0..request.encounter_type.phase_count() {
        let approach = request.approach_for_phase(index);
        let tier = StabilityTier::from_stability(player.stability);
        let effects = tier.effects();
        let intensity = tier.gate_intensity(approach.intensity);
        let profile = intensity.profile();
        let faced = enemy_principle;
        let principle = phase_principle(player, approach, faced);
        let interaction = get_principle_interaction(principle, faced).advantage_mod;

        let tier_misfire = rolls.roll() < effects.misfire_chance;
        let intensity_bonus = if tier_misfire { 0.0 } else { profile.score_bonus };

        let unique = unique_contribution(player, approach, &active_suppression, season, rolls);
        if let Some((used, _)) = unique.as_ref() {
            unique_used = true;
            unique_outcome = Some(used.outcome);
        }
        let unique_score = unique
            .as_ref()
            .map_or(0.0, |(u, _)| u.bonus + u.sub_skill_bonus + u.clause_bonus);

        let primary = player.equipped_weapons.primary.as_ref();
        let gear = build_fit(primary, principle, unique_used)
            .raw
            .min(tuning.build_fit_effective_cap);

        let environment = -0.01 * f64::from(floor - 1) - 0.02 * boss_phase as f64;
        let enemy_resistance = resistance.get(&principle).copied().unwrap_or(0.0);
        let stabilize_penalty = if approach.action == CombatAction::Stabilize {
            tuning.stabilize_score_penalty
        } else {
            0.0
        };
        let resonance_before = player.principle_resonance.get(principle);

        let raw = tuning.base_score
            + tuning.resonance_weight * resonance_before
            + tuning.dqs_weight * player.dqs / 100.0
            + tuning.stability_weight * player.stability / 100.0
            + interaction
            + intensity_bonus
            + unique_score
            + gear
            + environment
            + tuning.crng_weight * crng
            + carry
            + scar_adaptation
            - tuning.threat_weight * threat
            - enemy_resistance
            - stabilize_penalty
            - effects.score_modifier;
        let score = raw.clamp(0.0, 1.0);
        let outcome = CombatOutcome::from_score(score);

        let backlash = backlash_fires(intensity, player.mastery.overdrive_risk_reduction, rolls.roll());
        let mut stability_cost = profile.stability_cost;
        if approach.action == CombatAction::Stabilize {
            stability_cost = (stability_cost - tuning.stabilize_cost_relief).max(0.0);
        }
        if backlash {
            stability_cost *= tuning.backlash_stability_multiplier;
        }
        let mut hp_cost = if outcome == CombatOutcome::Unfavorable {
            tuning.unfavorable_hp_cost
        } else {
            0.0
        };
        if backlash {
            hp_cost += tuning.backlash_hp_tax;
        }
        if let Some((_, costs)) = unique.as_ref() {
            stability_cost += costs.stability;
            hp_cost += costs.hp;
        }

        player.stability = (player.stability - stability_cost).max(0.0);
        instability_sum += f64::from(outcome.instability_sign());
        player.principle_resonance = update_after_combat_mastered(
            &player.principle_resonance,
            principle,
            outcome,
            floor,
            &player.mastery,
        );
        let resonance_after = player.principle_resonance.get(principle);

        enemy_hp = (enemy_hp - score * tuning.enemy_hp_scale).max(0.0);
        enemy_stability = (enemy_stability - score * tuning.enemy_stability_scale).max(0.0);
        let step = resistance.entry(principle).or_insert(0.0);
        *step = (*step + tuning.resistance_step).min(tuning.resistance_max);

        let mut principle_shift = None;
        if let Some(template) = boss {
            let next = template.phase_index_for_hp(enemy_hp);
            if next > boss_phase {
                boss_phase = next;
                enemy_principle = template.phases[next].principle;
                resistance.clear();
                principle_shift = Some(enemy_principle);
                cues.push(format!("boss_shift:{}", enemy_principle));
            }
        }

        let mut next_phase_adaptation = 0.0;
        let mut phase_fate = false;
        if player.hp - hp_cost <= 0.0 {
            if player.fate_buffer >= config.fate.save_threshold {
                player.fate_buffer = (player.fate_buffer - config.fate.save_cost).max(0.0);
                player.hp = config.fate.saved_hp;
                next_phase_adaptation = config.fate.adapt_bonus;
                phase_fate = true;
                fate_fired = true;
                cues.push("fate_burst".to_string());
                tracing::info!(target: "progression::combat", phase = index, "combat.fate_burst");
            } else {
                let tier = apply_defeat(player, chapter, tuning);
                cues.push(format!("defeat:{:?}", tier).to_lowercase());
                defeat = Some(tier);
            }
        } else {
            player.hp -= hp_cost;
        }
        carry = next_phase_adaptation;

        let overdrive = if intensity != Intensity::Overdrive {
            OverdriveResult::NotUsed
        } else if tier_misfire || backlash {
            OverdriveResult::Misfired
        } else {
            OverdriveResult::Clean
        };
        log.push(CombatLogEntry {
            principle,
            backlash,
            overdrive,
        });
        active_suppression.phases_left = active_suppression.phases_left.saturating_sub(1);

        tracing::debug!(
            target: "progression::combat",
            phase = index,
            principle = %principle,
            score,
            outcome = ?outcome,
            backlash,
            "combat.phase"
        );

        phases.push(PhaseResult {
            index,
            action: approach.action,
            intensity,
            principle_used: principle,
            enemy_principle: faced,
            score,
            outcome,
            tier_misfire,
            backlash,
            stability_cost,
            hp_cost,
            resonance_before,
            resonance_after,
            enemy_hp_after: enemy_hp,
            principle_shift,
            unique: unique.map(|(u, _)| u),
            fate_fired: phase_fate,
            next_phase_adaptation,
        });

        if defeat.is_some() || enemy_hp <= 0.0 {
            break;
        }
        if index < request.encounter_type.decision_points() {
            decision_points.push(decision_point(
                player,
                index,
                boss,
                boss_phase,
                principle_shift.is_some(),
                tuning,
            ));
        }
    }

    let mean = phases.iter().map(|phase| phase.score).sum::<f64>() / phases.len().max(1) as f64;
    let final_outcome = if defeat.is_some() {
        CombatOutcome::Unfavorable
    } else {
        CombatOutcome::from_score(mean)
    };
    let won = final_outcome == CombatOutcome::Favorable
        && request.encounter_type != EncounterType::Minor;
    let boss_cleared = boss.is_some() && (won || enemy_hp <= 0.0) && defeat.is_none();
    cues.push(format!("outcome:{:?}", final_outcome).to_lowercase());

    let dominant = player.dominant_principle();
    let milestones = check_mastery_milestones(
        &mut player.mastery,
        &player.principle_resonance,
        &log,
        floor,
        boss_cleared,
        dominant,
    );
    apply_milestone_rewards(&mut player.principle_resonance, &player.mastery, &milestones, floor);

    let weapon_context = weapon_context.map(|mut ctx| {
        let fit = build_fit(
            player.equipped_weapons.primary.as_ref(),
            phases.first().map_or(dominant, |p| p.principle_used),
            unique_used,
        );
        ctx.build_fit = if fit.effective >= tuning.build_fit_effective_cap {
            "perfect".to_string()
        } else if fit.effective > 0.0 {
            "attuned".to_string()
        } else {
            "unattuned".to_string()
        };
        ctx
    });

    tracing::info!(
        target: "progression::combat",
        encounter = ?request.encounter_type,
        outcome = ?final_outcome,
        phases = phases.len(),
        "combat.resolved"
    );

    CombatBrief {
        encounter_type: request.encounter_type,
        total_stability_cost: phases.iter().map(|p| p.stability_cost).sum(),
        total_hp_cost: phases.iter().map(|p| p.hp_cost).sum(),
        resonance_growth: phases.iter().map(|p| p.resonance_after - p.resonance_before).sum(),
        phases,
        decision_points,
        final_outcome,
        narrative_cues: cues,
        instability_sum,
        unique_outcome,
        suppression,
        weapon_context,
        divine_ability,
        fate_fired,
        defeat,
        won,
        boss_cleared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::principle::PrinciplePair;
    use crate::rules::suppression::{SuppressionKind, SuppressionSource};
    use crate::simulation::combat::EnemyProfile;
    use crate::simulation::rolls::FixedRolls;
    use crate::simulation::unique_skill::{SkillCategory, UniqueSkill, UniqueSkillGrowthState, WeaknessType};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn strike(skill: &str, intensity: Intensity) -> Approach {
        Approach {
            action: CombatAction::Strike,
            intensity,
            skill_name: skill.to_string(),
            use_unique: false,
            invoke_divine: false,
        }
    }

    fn minor(principle: Principle, threat_level: f64, approach: Approach, crng_roll: f64) -> CombatRequest {
        CombatRequest {
            encounter_type: EncounterType::Minor,
            enemy: EnemyProfile {
                name: "Drifter".to_string(),
                principle,
                threat_level,
                kind: EnemyKind::Normal,
                suppression: None,
            },
            approach,
            followup_approaches: Vec::new(),
            floor: 1,
            crng_roll,
        }
    }

    #[test]
    fn coherent_strike_scores_favorable() {
        let mut player = PlayerState {
            coherence: 80.0,
            instability: 10.0,
            dqs: 60.0,
            fate_buffer: 50.0,
            ..PlayerState::default()
        };
        player.principle_resonance.set(Principle::Energy, 0.45);
        let request = minor(Principle::Void, 0.4, strike("energy", Intensity::Push), 0.30);
        let mut rolls = FixedRolls::constant(0.5);

        let brief = resolve_combat(&mut player, &request, 1, &EngineConfig::default(), &mut rolls);

        let phase = &brief.phases[0];
        assert!(approx(phase.score, 0.6625));
        assert_eq!(brief.final_outcome, CombatOutcome::Favorable);
        assert!(approx(player.principle_resonance.get(Principle::Energy), 0.48));
        assert!(approx(player.stability, 78.0));
        assert!(approx(brief.instability_sum, -1.0));
        assert!(!brief.won);
        assert!(brief.decision_points.is_empty());
    }

    #[test]
    fn fate_buffer_absorbs_lethal_phase() {
        let mut player = PlayerState {
            hp: 12.0,
            fate_buffer: 60.0,
            ..PlayerState::default()
        };
        let request = minor(Principle::Energy, 1.0, strike("energy", Intensity::Safe), 0.0);
        let mut rolls = FixedRolls::constant(0.5);

        let brief = resolve_combat(&mut player, &request, 3, &EngineConfig::default(), &mut rolls);

        assert_eq!(brief.phases[0].outcome, CombatOutcome::Unfavorable);
        assert!(brief.fate_fired);
        assert!(approx(player.hp, 10.0));
        assert!(approx(player.fate_buffer, 20.0));
        assert!(approx(brief.phases[0].next_phase_adaptation, 0.30));
        assert_eq!(player.defeat_count, 0);
        assert!(brief.defeat.is_none());
    }

    #[test]
    fn empty_buffer_runs_the_defeat_cascade() {
        let mut player = PlayerState {
            hp: 12.0,
            fate_buffer: 10.0,
            ..PlayerState::default()
        };
        player.principle_resonance.set(Principle::Order, 0.40);
        let request = minor(Principle::Energy, 1.0, strike("energy", Intensity::Safe), 0.0);
        let mut rolls = FixedRolls::constant(0.5);

        let brief = resolve_combat(&mut player, &request, 4, &EngineConfig::default(), &mut rolls);

        assert_eq!(brief.defeat, Some(DefeatTier::Scar));
        assert_eq!(player.defeat_count, 1);
        assert!(approx(player.hp_max, 90.0));
        assert!(approx(player.hp, 54.0));
        assert!(approx(player.principle_resonance.get(Principle::Order), 0.395 * 0.85));
        assert_eq!(player.scars.len(), 1);
        assert!(!brief.fate_fired);
    }

    #[test]
    fn fourth_defeat_ends_the_story() {
        let mut player = PlayerState {
            defeat_count: 3,
            ..PlayerState::default()
        };
        let tier = apply_defeat(&mut player, 9, &CombatConfig::default());
        assert_eq!(tier, DefeatTier::SoulDeath);
        assert!(player.soul_dead);
        assert!(approx(player.hp, 0.0));
    }

    #[test]
    fn boss_rotates_principles_and_telegraphs() {
        let mut player = PlayerState {
            dqs: 100.0,
            tower_floor: 2,
            ..PlayerState::default()
        };
        player.principle_resonance.set(Principle::Void, 0.70);
        let opening = strike("void", Intensity::Overdrive);
        let request = CombatRequest {
            encounter_type: EncounterType::Boss,
            enemy: EnemyProfile {
                name: "Choir of Static".to_string(),
                principle: Principle::Order,
                threat_level: 0.0,
                kind: EnemyKind::Boss {
                    boss_id: "choir_of_static".to_string(),
                },
                suppression: None,
            },
            approach: opening,
            followup_approaches: Vec::new(),
            floor: 2,
            crng_roll: 1.0,
        };
        let mut rolls = FixedRolls::constant(0.5);

        let brief = resolve_combat(&mut player, &request, 12, &EngineConfig::default(), &mut rolls);

        assert_eq!(brief.phases[0].enemy_principle, Principle::Energy);
        assert_eq!(brief.phases[0].principle_shift, Some(Principle::Flux));
        let tell = brief.decision_points[0].boss_tell.as_deref().unwrap_or_default();
        assert!(tell.contains("voices split"));
        assert_eq!(brief.decision_points[0].options.len(), 3);
        assert!(brief.won);
        assert!(brief.boss_cleared);
        assert!(player.mastery.floor_attunements.contains(&2));
    }

    #[test]
    fn multi_phase_climax_counts_as_one_trial_combat() {
        let mut player = PlayerState::default();
        player.principle_resonance.set(Principle::Energy, 0.30);
        player.principle_resonance.set(Principle::Void, 0.30);
        let mut request = minor(Principle::Matter, 0.3, strike("energy", Intensity::Safe), 0.4);
        request.encounter_type = EncounterType::Climax;
        request.followup_approaches = vec![
            strike("void", Intensity::Safe),
            strike("energy", Intensity::Safe),
            strike("void", Intensity::Safe),
        ];
        let mut rolls = FixedRolls::constant(0.9);

        let brief = resolve_combat(&mut player, &request, 6, &EngineConfig::default(), &mut rolls);

        assert!(brief.phases.len() >= 2);
        assert!(brief.phases.iter().all(|phase| !phase.backlash));
        let progress = &player.mastery.trial_progress[&PrinciplePair::EnergyVoid];
        assert_eq!(progress.count, 1);
        assert!(progress.left_used && progress.right_used);
    }

    fn unique_player() -> PlayerState {
        PlayerState {
            unique_skill: Some(UniqueSkill::new(
                "Glass Verdict",
                SkillCategory::Manifestation,
                WeaknessType::SensoryTax,
                SkillCategory::Perception,
            )),
            unique_skill_growth: Some(UniqueSkillGrowthState::default()),
            ..PlayerState::default()
        }
    }

    #[test]
    fn nullified_unique_contributes_nothing() {
        let mut player = unique_player();
        let mut approach = strike("energy", Intensity::Push);
        approach.use_unique = true;
        let mut request = minor(Principle::Matter, 0.3, approach, 0.5);
        request.enemy.suppression = Some(SuppressionSource {
            kind: SuppressionKind::Field,
            power: 100.0,
            category: None,
            enemy_has_unique: false,
        });
        let mut rolls = FixedRolls::constant(0.9);

        let brief = resolve_combat(&mut player, &request, 2, &EngineConfig::default(), &mut rolls);

        let unique = brief.phases[0].unique.expect("unique attempted");
        assert!(approx(unique.bonus + unique.sub_skill_bonus + unique.clause_bonus, 0.0));
        assert_eq!(brief.suppression.map(|s| s.level), Some(SuppressionLevel::Nullified));
        assert!(brief.narrative_cues.iter().any(|cue| cue == "unique_silenced"));
    }

    #[test]
    fn ultimate_surges_once_per_season() {
        let mut player = unique_player();
        if let Some(growth) = player.unique_skill_growth.as_mut() {
            growth.current_stage = GrowthStage::Ultimate;
            growth.ultimate_forged = true;
        }
        let request = minor(Principle::Matter, 0.3, strike("energy", Intensity::Safe), 0.5);
        let mut rolls = FixedRolls::constant(0.9);
        let config = EngineConfig::default();

        let first = resolve_combat(&mut player, &request, 3, &config, &mut rolls);
        let surge = first.phases[0].unique.expect("surge");
        assert!(surge.ultimate_surge);
        assert!(approx(surge.bonus, ULTIMATE_BONUS_CAP));

        let second = resolve_combat(&mut player, &request, 4, &config, &mut rolls);
        assert!(second.phases[0].unique.is_none());

        let next_season = resolve_combat(&mut player, &request, 21, &config, &mut rolls);
        assert!(next_season.phases[0].unique.is_some_and(|u| u.ultimate_surge));
    }
}
