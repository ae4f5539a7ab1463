use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::archons::ArchonKey;
use crate::data::config::{CombatConfig, EngineConfig};
use crate::data::villains::TrackedEvent;
use crate::rules::activation::drift_resilience;
use crate::simulation::combat::{CombatBrief, CombatRequest, EncounterType};
use crate::simulation::growth::{
    advance_ultimate, defer_aspect, forge_aspect, update_per_scene, GrowthEvent, SceneSignal,
};
use crate::simulation::identity::{
    apply_identity_delta, compute_identity_delta, ActionCategory, AiProposal, ChoiceInput,
    ClassifiedAction, CombatSummary, CrngEvent, DeltaInputs, IdentityDelta, RouterOutput,
};
use crate::simulation::player::{DefeatTier, PlayerState};
use crate::simulation::rolls::RollSource;
use crate::simulation::unique_skill::TraumaSeverity;
use crate::simulation::villain::{
    advance_veiled_will, apply_mutation, apply_tracked_event, check_thresholds, defect,
    emissary_reveal, EmissaryContext, EmissaryReveal, IdentityMutation, VillainEventInput,
};
use crate::simulation::weapon::{
    apply_bond_event, archon_ready, classify_archon_signal, decay_bond, forge_archon_fragment,
    reveal_lore, signature_request, ArchonReadings, BondEvent, EvolutionGate, SignatureRequest,
    TransitionResult,
};
use crate::systems::combat_loop::resolve_combat;
use crate::systems::writer_context::{build_writer_context, WriterContextBundle};

/// Outcome-affecting facts about the chapter, reported by the host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterFlags {
    pub has_combat: bool,
    pub is_turning_point: bool,
    pub near_death: bool,
    pub theft_attempt: bool,
    pub crng_event: Option<CrngEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AspectDecision {
    Forge { choice: String },
    Defer,
}

/// Everything one chapter tick consumes besides the player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterInputs {
    pub choice: ChoiceInput,
    pub classified_action: ClassifiedAction,
    #[serde(default)]
    pub flags: ChapterFlags,
    #[serde(default)]
    pub combat_request: Option<CombatRequest>,
    #[serde(default)]
    pub router: Option<RouterOutput>,
    #[serde(default)]
    pub ai_proposal: Option<AiProposal>,
    #[serde(default)]
    pub villain_events: Vec<VillainEventInput>,
    #[serde(default)]
    pub accept_conversion: bool,
    #[serde(default)]
    pub defect: bool,
    #[serde(default)]
    pub aspect_decision: Option<AspectDecision>,
    #[serde(default)]
    pub ultimate_absorb: Option<String>,
}

impl ChapterInputs {
    pub fn new(choice: ChoiceInput, classified_action: ClassifiedAction) -> Self {
        Self {
            choice,
            classified_action,
            flags: ChapterFlags::default(),
            combat_request: None,
            router: None,
            ai_proposal: None,
            villain_events: Vec::new(),
            accept_conversion: false,
            defect: false,
            aspect_decision: None,
            ultimate_absorb: None,
        }
    }
}

/// Instructions for the narrative layer. Transitions that need generated
/// prose are requested here and applied by the host afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "directive", rename_all = "snake_case")]
pub enum NarrativeDirective {
    SoulLinkReady { weapon: String },
    AwakeningReady { weapon: String },
    GenerateSignature { request: SignatureRequest },
    ArchonFragmentReady { archon: ArchonKey },
    LoreRevealed { weapon: String },
    Confrontation,
    VillainThreshold { flag: String },
    Emissary { context: EmissaryContext },
    Mutation { mutation: IdentityMutation },
    Defected { hunter: Option<String> },
    VeiledWillAdvanced { phase: u8 },
    StoryEnded,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterOutcome {
    pub player: PlayerState,
    pub combat: Option<CombatBrief>,
    pub growth_events: Vec<GrowthEvent>,
    pub identity_delta: IdentityDelta,
    pub directives: Vec<NarrativeDirective>,
    pub writer_context: WriterContextBundle,
}

fn trauma_for(tier: DefeatTier) -> TraumaSeverity {
    match tier {
        DefeatTier::Scar => TraumaSeverity::Wound,
        DefeatTier::Fracture => TraumaSeverity::Break,
        DefeatTier::BreakingPoint | DefeatTier::SoulDeath => TraumaSeverity::Shatter,
    }
}

fn archon_readings(player: &PlayerState) -> ArchonReadings {
    ArchonReadings {
        alignment: player.alignment,
        coherence: player.coherence,
        breakthrough: player.breakthrough,
        instability: player.instability,
        notoriety: player.notoriety,
    }
}

fn archon_claimed_flag(key: ArchonKey) -> String {
    format!("archon_claimed:{}", key.as_str())
}

/// Runs one chapter against a copy of the record and returns the new record
/// with everything the narrative layer needs. The input record is never
/// modified; a caller that drops the outcome persists nothing.
pub fn run_chapter_tick(
    previous: &PlayerState,
    inputs: &ChapterInputs,
    config: &EngineConfig,
    rolls: &mut dyn RollSource,
) -> ChapterOutcome {
    let mut player = previous.clone();
    let mut directives = Vec::new();

    if player.soul_dead {
        tracing::warn!(target: "progression::chapter", player = %player.name, "chapter.after_soul_death");
        directives.push(NarrativeDirective::StoryEnded);
        let writer_context =
            build_writer_context(&player, None, &[], &IdentityDelta::default(), &directives);
        return ChapterOutcome {
            player,
            combat: None,
            growth_events: Vec::new(),
            identity_delta: IdentityDelta::default(),
            directives,
            writer_context,
        };
    }

    let chapter = player.chapter + 1;
    let soul_choice = inputs.classified_action.category == ActionCategory::SoulChoice;
    if let Some(skill) = player.unique_skill.as_mut() {
        skill.uses_this_chapter = 0;
    }

    // combat
    let brief = match (inputs.flags.has_combat, inputs.combat_request.as_ref()) {
        (true, Some(request)) => Some(resolve_combat(&mut player, request, chapter, config, rolls)),
        (true, None) => {
            tracing::warn!(target: "progression::chapter", chapter, "combat.missing_request");
            None
        }
        (false, _) => None,
    };
    let climax = brief
        .as_ref()
        .is_some_and(|b| b.encounter_type == EncounterType::Climax);
    if climax {
        player.past_climax = true;
    }
    let defeat = brief.as_ref().and_then(|b| b.defeat);
    let near_death = inputs.flags.near_death
        || (brief.is_some()
            && defeat.is_none()
            && player.combat_metrics().hp_ratio() < config.growth.near_death_ratio);

    if defeat == Some(DefeatTier::SoulDeath) {
        directives.push(NarrativeDirective::StoryEnded);
        player.clamp_scalars();
        player.chapter = chapter;
        tracing::warn!(target: "progression::chapter", player = %player.name, chapter, "chapter.soul_death");
        let writer_context =
            build_writer_context(&player, brief.as_ref(), &[], &IdentityDelta::default(), &directives);
        return ChapterOutcome {
            player,
            combat: brief,
            growth_events: Vec::new(),
            identity_delta: IdentityDelta::default(),
            directives,
            writer_context,
        };
    }

    // weapons
    tick_weapons(
        &mut player,
        inputs,
        brief.is_some(),
        near_death,
        soul_choice,
        chapter,
        config,
        &mut directives,
    );

    // unique-skill growth
    let growth_events = tick_growth(
        &mut player,
        inputs,
        chapter,
        soul_choice,
        defeat,
        near_death,
        climax,
        config,
    );

    // identity delta
    let summary = brief.as_ref().map(|b| CombatSummary {
        encounter_type: b.encounter_type,
        final_outcome: b.final_outcome,
        instability_sum: b.instability_sum,
        won: b.won,
    });
    let delta = compute_identity_delta(
        &player,
        &DeltaInputs {
            chapter,
            choice: &inputs.choice,
            category: inputs.classified_action.category,
            router: inputs.router.as_ref(),
            crng: inputs.flags.crng_event.as_ref(),
            combat: summary.as_ref(),
            is_turning_point: inputs.flags.is_turning_point,
            proposal: inputs.ai_proposal.as_ref(),
        },
        &config.fate,
    );
    apply_identity_delta(&mut player, &delta);
    if delta.confrontation_triggered {
        directives.push(NarrativeDirective::Confrontation);
    }
    tick_archons(&mut player, &delta, &mut directives);

    // villain layer reads the post-delta identity
    tick_villain(&mut player, inputs, chapter, &mut directives);

    recover_between_chapters(&mut player, &config.combat);
    player.clamp_scalars();
    player.chapter = chapter;

    let writer_context =
        build_writer_context(&player, brief.as_ref(), &growth_events, &delta, &directives);
    tracing::info!(
        target: "progression::chapter",
        player = %player.name,
        chapter,
        combat = brief.is_some(),
        growth_events = growth_events.len(),
        directives = directives.len(),
        "chapter.ticked"
    );

    ChapterOutcome {
        player,
        combat: brief,
        growth_events,
        identity_delta: delta,
        directives,
        writer_context,
    }
}

#[allow(clippy::too_many_arguments)]
fn tick_weapons(
    player: &mut PlayerState,
    inputs: &ChapterInputs,
    fought: bool,
    near_death: bool,
    soul_choice: bool,
    chapter: u32,
    config: &EngineConfig,
    directives: &mut Vec<NarrativeDirective>,
) {
    let referenced = inputs.classified_action.category == ActionCategory::Equipment
        || inputs.classified_action.skill_reference.as_deref().is_some_and(|reference| {
            player
                .equipped_weapons
                .primary
                .as_ref()
                .is_some_and(|weapon| weapon.name == reference)
        });

    let mut events = Vec::new();
    if fought {
        events.push(BondEvent::CombatEncounter);
    }
    if near_death {
        events.push(BondEvent::NearDeath);
    }
    if referenced {
        events.push(BondEvent::NarrativeReference);
    }
    if inputs.flags.theft_attempt {
        events.push(BondEvent::TheftAttemptFailed);
    }
    if soul_choice {
        events.push(BondEvent::SoulChoice);
    }
    if inputs.flags.is_turning_point {
        events.push(BondEvent::TurningPoint);
    }

    if let Some(primary) = player.equipped_weapons.primary.as_mut() {
        for event in &events {
            apply_bond_event(primary, *event);
        }
        if fought || referenced {
            primary.last_used_chapter = chapter;
        }
    }

    let dominant = player.dominant_principle();
    let gate = EvolutionGate {
        soul_choice_this_chapter: soul_choice,
        unique_stage: player.unique_skill_growth.as_ref().map(|growth| growth.current_stage),
        past_climax: player.past_climax,
    };
    let crystals = &player.crystals;
    for weapon in player.equipped_weapons.all_mut() {
        let decayed = decay_bond(weapon, chapter, dominant, &config.weapon);
        if decayed < 0.0 {
            tracing::debug!(target: "progression::weapon", weapon = %weapon.name, decayed, "weapon.bond_decayed");
        }
        if weapon.soul_link_pending {
            directives.push(NarrativeDirective::SoulLinkReady {
                weapon: weapon.name.clone(),
            });
        }
        if weapon.awaken_pending {
            directives.push(NarrativeDirective::AwakeningReady {
                weapon: weapon.name.clone(),
            });
        }
        if let Some(request) = signature_request(weapon, crystals, &gate, &config.weapon) {
            directives.push(NarrativeDirective::GenerateSignature { request });
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn tick_growth(
    player: &mut PlayerState,
    inputs: &ChapterInputs,
    chapter: u32,
    soul_choice: bool,
    defeat: Option<DefeatTier>,
    near_death: bool,
    climax: bool,
    config: &EngineConfig,
) -> Vec<GrowthEvent> {
    let mut events = Vec::new();
    let coherence = player.coherence;
    let instability = player.instability;
    let equipped = player.equipped_skills.clone();
    let (Some(skill), Some(growth)) =
        (player.unique_skill.as_mut(), player.unique_skill_growth.as_mut())
    else {
        return events;
    };

    match inputs.aspect_decision.as_ref() {
        Some(AspectDecision::Forge { choice }) => {
            if forge_aspect(skill, growth, choice).is_applied() {
                events.push(GrowthEvent::AspectForged {
                    aspect: choice.clone(),
                });
            }
        }
        Some(AspectDecision::Defer) => {
            if growth.aspect_beat > 0 && !growth.aspect_forged {
                events.push(defer_aspect(growth, chapter, &config.growth));
            }
        }
        None => {}
    }

    let signal = SceneSignal {
        chapter,
        coherence,
        soul_choice,
        defeat: defeat.map(trauma_for),
        near_death,
    };
    events.extend(update_per_scene(skill, growth, &signal, &config.growth));
    events.extend(advance_ultimate(
        skill,
        growth,
        climax,
        inputs.ultimate_absorb.as_deref(),
        &equipped,
    ));

    skill.resilience = drift_resilience(skill.resilience, skill.uses_this_chapter, coherence, instability);

    for event in &events {
        if let GrowthEvent::UltimateForged {
            absorbed_skill: Some(id),
            ..
        } = event
        {
            player.consume_skill(id);
        }
    }
    events
}

fn recover_between_chapters(player: &mut PlayerState, tuning: &CombatConfig) {
    let stability = (player.stability + tuning.stability_recovery).min(100.0);
    let hp = (player.hp + tuning.hp_recovery * player.recovery_rate).min(player.hp_max);
    tracing::debug!(
        target: "progression::chapter",
        stability_gain = stability - player.stability,
        hp_gain = hp - player.hp,
        "chapter.recovered"
    );
    player.stability = stability;
    player.hp = hp;
}

fn tick_archons(player: &mut PlayerState, delta: &IdentityDelta, directives: &mut Vec<NarrativeDirective>) {
    let signal = classify_archon_signal(delta);
    if let Some(key) = signal {
        *player.archon_affinity.entry(key).or_insert(0) += 1;
        tracing::debug!(target: "progression::weapon", archon = ?key, "archon.affinity");
    }
    for weapon in player.equipped_weapons.all_mut() {
        if reveal_lore(weapon, signal) {
            directives.push(NarrativeDirective::LoreRevealed {
                weapon: weapon.name.clone(),
            });
        }
    }

    let unclaimed: BTreeMap<ArchonKey, u32> = player
        .archon_affinity
        .iter()
        .filter(|(key, _)| !player.flags.contains(&archon_claimed_flag(**key)))
        .map(|(key, count)| (*key, *count))
        .collect();
    if let Some(archon) = archon_ready(&unclaimed, &archon_readings(player)) {
        directives.push(NarrativeDirective::ArchonFragmentReady { archon });
    }
}

fn tick_villain(
    player: &mut PlayerState,
    inputs: &ChapterInputs,
    chapter: u32,
    directives: &mut Vec<NarrativeDirective>,
) {
    let mut resonance_change = 0.0;
    let mut beat_general = false;
    for event in &inputs.villain_events {
        resonance_change += apply_tracked_event(player, event).resonance_change;
        beat_general |= event.event == TrackedEvent::DefeatedGeneral;
    }

    let mut mutations = Vec::new();
    if beat_general && resonance_change > 0.0 {
        mutations.push(IdentityMutation::MirrorCrack);
    }
    if inputs.accept_conversion {
        mutations.push(IdentityMutation::Conversion);
    }
    if !player.villain.mutations.contains(&IdentityMutation::Resistant) {
        mutations.push(IdentityMutation::Resistant);
    }
    for mutation in mutations {
        match apply_mutation(player, mutation) {
            TransitionResult::Applied => directives.push(NarrativeDirective::Mutation { mutation }),
            TransitionResult::NotApplied { reason } => {
                tracing::debug!(
                    target: "progression::villain",
                    mutation = ?mutation,
                    reason = %reason,
                    "identity.mutation_refused"
                );
            }
        }
    }

    if inputs.defect && defect(player).is_applied() {
        directives.push(NarrativeDirective::Defected {
            hunter: player.villain.hunter.clone(),
        });
    }

    for flag in check_thresholds(player) {
        directives.push(NarrativeDirective::VillainThreshold { flag });
    }

    let mut seen = Vec::new();
    for id in inputs.villain_events.iter().filter_map(|e| e.emissary_id.as_deref()) {
        if seen.contains(&id) {
            continue;
        }
        seen.push(id);
        if let Some(context) = emissary_reveal(player, id) {
            if context.reveal != EmissaryReveal::Hidden {
                directives.push(NarrativeDirective::Emissary { context });
            }
        }
    }

    if let Some(phase) = advance_veiled_will(player, chapter) {
        directives.push(NarrativeDirective::VeiledWillAdvanced { phase });
    }
}

/// Host-side claim of an archon fragment after an `ArchonFragmentReady`
/// directive. The forged weapon takes the first empty slot.
pub fn claim_archon_fragment(player: &mut PlayerState, key: ArchonKey) -> TransitionResult {
    let flag = archon_claimed_flag(key);
    if player.flags.contains(&flag) {
        return TransitionResult::NotApplied {
            reason: "fragment already claimed".to_string(),
        };
    }
    let single: BTreeMap<ArchonKey, u32> = player
        .archon_affinity
        .get(&key)
        .map(|count| (key, *count))
        .into_iter()
        .collect();
    if archon_ready(&single, &archon_readings(player)).is_none() {
        return TransitionResult::NotApplied {
            reason: "archon affinity conditions not met".to_string(),
        };
    }

    let slots = &mut player.equipped_weapons;
    let slot = [&mut slots.primary, &mut slots.secondary, &mut slots.utility]
        .into_iter()
        .find(|slot| slot.is_none());
    let Some(slot) = slot else {
        return TransitionResult::NotApplied {
            reason: "no free weapon slot".to_string(),
        };
    };
    *slot = Some(forge_archon_fragment(key));
    player.flags.insert(flag);
    TransitionResult::Applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::principle::Principle;
    use crate::rules::stability::{Intensity, StabilityTier};
    use crate::simulation::combat::{Approach, CombatAction, EnemyKind, EnemyProfile};
    use crate::simulation::player::NormalSkill;
    use crate::simulation::rolls::FixedRolls;
    use crate::simulation::unique_skill::{
        GrowthStage, SkillCategory, UniqueSkill, UniqueSkillGrowthState, WeaknessType,
    };
    use crate::simulation::weapon::{Weapon, WeaponGrade};

    fn inputs(category: ActionCategory) -> ChapterInputs {
        ChapterInputs::new(
            ChoiceInput {
                text: "step forward".to_string(),
                risk_level: 2,
                consequence_hint: String::new(),
            },
            ClassifiedAction {
                category,
                skill_reference: None,
                intent: String::new(),
            },
        )
    }

    #[test]
    fn tick_never_touches_the_input_record() {
        let player = PlayerState::default();
        let snapshot = player.clone();
        let mut rolls = FixedRolls::constant(0.5);
        let outcome = run_chapter_tick(
            &player,
            &inputs(ActionCategory::Narrative),
            &EngineConfig::default(),
            &mut rolls,
        );
        assert_eq!(player, snapshot);
        assert_eq!(outcome.player.chapter, 1);
        assert!(outcome.combat.is_none());
    }

    #[test]
    fn soul_choice_flags_soul_link_without_changing_grade() {
        let mut player = PlayerState::default();
        player.principle_resonance.set(Principle::Energy, 0.4);
        let mut weapon = Weapon::new("Cinder Hook", WeaponGrade::Resonant, &[Principle::Energy]);
        weapon.bond_score = 78.0;
        player.equipped_weapons.primary = Some(weapon);

        let mut rolls = FixedRolls::constant(0.5);
        let outcome = run_chapter_tick(
            &player,
            &inputs(ActionCategory::SoulChoice),
            &EngineConfig::default(),
            &mut rolls,
        );

        let weapon = outcome.player.equipped_weapons.primary.as_ref().expect("weapon");
        assert_eq!(weapon.bond_score, 84.0);
        assert!(weapon.soul_link_pending);
        assert_eq!(weapon.grade, WeaponGrade::Resonant);
        assert!(outcome
            .directives
            .iter()
            .any(|d| matches!(d, NarrativeDirective::SoulLinkReady { .. })));
    }

    #[test]
    fn combat_feeds_the_identity_delta() {
        let mut player = PlayerState {
            coherence: 80.0,
            instability: 10.0,
            dqs: 60.0,
            fate_buffer: 50.0,
            ..PlayerState::default()
        };
        player.principle_resonance.set(Principle::Energy, 0.45);
        let mut chapter_inputs = inputs(ActionCategory::Combat);
        chapter_inputs.flags.has_combat = true;
        chapter_inputs.combat_request = Some(CombatRequest {
            encounter_type: EncounterType::Minor,
            enemy: EnemyProfile {
                name: "Hollow Scout".to_string(),
                principle: Principle::Void,
                threat_level: 0.4,
                kind: EnemyKind::Normal,
                suppression: None,
            },
            approach: Approach {
                action: CombatAction::Strike,
                intensity: Intensity::Push,
                skill_name: "energy".to_string(),
                use_unique: false,
                invoke_divine: false,
            },
            followup_approaches: Vec::new(),
            floor: 1,
            crng_roll: 0.3,
        });
        let mut rolls = FixedRolls::constant(0.5);

        let outcome = run_chapter_tick(&player, &chapter_inputs, &EngineConfig::default(), &mut rolls);

        assert_eq!(outcome.identity_delta.instability_change, -1.0);
        assert_eq!(outcome.player.instability, 9.0);
        assert!(outcome.combat.is_some());
        assert!(!outcome.identity_delta.confrontation_triggered);
    }

    #[test]
    fn aspect_forge_decision_locks_mutation() {
        let mut skill = UniqueSkill::new(
            "Glass Verdict",
            SkillCategory::Perception,
            WeaknessType::SensoryTax,
            SkillCategory::Contract,
        );
        skill.suppression_resistance = 65.0;
        let growth = UniqueSkillGrowthState {
            current_stage: GrowthStage::Bloom,
            bloom_completed: true,
            aspect_beat: 3,
            ..UniqueSkillGrowthState::default()
        };
        let player = PlayerState {
            unique_skill: Some(skill),
            unique_skill_growth: Some(growth),
            ..PlayerState::default()
        };
        let mut chapter_inputs = inputs(ActionCategory::Narrative);
        chapter_inputs.aspect_decision = Some(AspectDecision::Forge {
            choice: "Aspect of the Unblinking".to_string(),
        });
        let mut rolls = FixedRolls::constant(0.5);

        let outcome = run_chapter_tick(&player, &chapter_inputs, &EngineConfig::default(), &mut rolls);

        assert!(outcome
            .growth_events
            .iter()
            .any(|e| matches!(e, GrowthEvent::AspectForged { .. })));
        assert!(outcome.player.unique_skill.as_ref().is_some_and(|s| s.mutation_locked));
    }

    #[test]
    fn claimed_fragment_lands_in_a_free_slot_once() {
        let mut player = PlayerState {
            alignment: -30.0,
            ..PlayerState::default()
        };
        player.archon_affinity.insert(ArchonKey::Vyrel, 3);

        assert!(claim_archon_fragment(&mut player, ArchonKey::Vyrel).is_applied());
        let weapon = player.equipped_weapons.primary.as_ref().expect("fragment");
        assert!(weapon.is_archon_fragment);
        assert!(!claim_archon_fragment(&mut player, ArchonKey::Vyrel).is_applied());
        assert!(!claim_archon_fragment(&mut player, ArchonKey::Aurion).is_applied());
    }

    fn fight(threat_level: f64, encounter_type: EncounterType, crng_roll: f64) -> CombatRequest {
        CombatRequest {
            encounter_type,
            enemy: EnemyProfile {
                name: "Hollow Scout".to_string(),
                principle: Principle::Void,
                threat_level,
                kind: EnemyKind::Normal,
                suppression: None,
            },
            approach: Approach {
                action: CombatAction::Strike,
                intensity: Intensity::Safe,
                skill_name: "energy".to_string(),
                use_unique: false,
                invoke_divine: false,
            },
            followup_approaches: Vec::new(),
            floor: 1,
            crng_roll,
        }
    }

    #[test]
    fn forged_ultimate_consumes_the_absorbed_skill() {
        let growth = UniqueSkillGrowthState {
            current_stage: GrowthStage::Aspect,
            bloom_completed: true,
            aspect_forged: true,
            aspect_choice: Some("Aspect of the Unblinking".to_string()),
            ultimate_beat: 2,
            ..UniqueSkillGrowthState::default()
        };
        let mut player = PlayerState {
            dqs: 100.0,
            unique_skill: Some(UniqueSkill::new(
                "Glass Verdict",
                SkillCategory::Perception,
                WeaknessType::SensoryTax,
                SkillCategory::Contract,
            )),
            unique_skill_growth: Some(growth),
            ..PlayerState::default()
        };
        player.principle_resonance.set(Principle::Energy, 0.60);
        player.owned_skills = vec![
            NormalSkill {
                catalog_id: "skill_cinder".to_string(),
                skin: "Cinder Lash".to_string(),
                principle: Principle::Energy,
            },
            NormalSkill {
                catalog_id: "skill_tide".to_string(),
                skin: String::new(),
                principle: Principle::Flux,
            },
        ];
        player.equipped_skills = vec!["skill_cinder".to_string(), "skill_tide".to_string()];
        let mut chapter_inputs = inputs(ActionCategory::Combat);
        chapter_inputs.flags.has_combat = true;
        chapter_inputs.combat_request = Some(fight(0.0, EncounterType::Climax, 1.0));
        chapter_inputs.ultimate_absorb = Some("skill_cinder".to_string());
        let mut rolls = FixedRolls::constant(0.9);

        let outcome = run_chapter_tick(&player, &chapter_inputs, &EngineConfig::default(), &mut rolls);

        assert!(outcome.growth_events.iter().any(|e| matches!(
            e,
            GrowthEvent::UltimateForged { absorbed_skill: Some(id), .. } if id == "skill_cinder"
        )));
        let next = &outcome.player;
        assert_eq!(next.equipped_skills, vec!["skill_tide".to_string()]);
        assert!(next.owned_skill("skill_cinder").is_none());
        assert!(next.owned_skill("Cinder Lash").is_none());
        assert!(next.owned_skill("skill_tide").is_some());
    }

    #[test]
    fn quiet_chapter_recovers_stability_and_hp() {
        let player = PlayerState {
            stability: 0.0,
            hp: 40.0,
            recovery_rate: 0.5,
            ..PlayerState::default()
        };
        let tuning = CombatConfig::default();
        let mut rolls = FixedRolls::constant(0.5);

        let outcome = run_chapter_tick(
            &player,
            &inputs(ActionCategory::Narrative),
            &EngineConfig::default(),
            &mut rolls,
        );

        assert_eq!(outcome.player.stability, tuning.stability_recovery);
        assert_eq!(outcome.player.hp, 40.0 + tuning.hp_recovery * 0.5);
        assert_ne!(
            StabilityTier::from_stability(outcome.player.stability),
            StabilityTier::Broken
        );
    }

    #[test]
    fn soul_death_ends_the_tick_before_later_phases() {
        let mut player = PlayerState {
            hp: 12.0,
            fate_buffer: 10.0,
            defeat_count: 3,
            ..PlayerState::default()
        };
        let mut weapon = Weapon::new("Cinder Hook", WeaponGrade::Resonant, &[Principle::Energy]);
        weapon.bond_score = 40.0;
        player.equipped_weapons.primary = Some(weapon);
        let mut chapter_inputs = inputs(ActionCategory::SoulChoice);
        chapter_inputs.flags.has_combat = true;
        chapter_inputs.combat_request = Some(fight(1.0, EncounterType::Minor, 0.0));
        let mut rolls = FixedRolls::constant(0.5);

        let outcome = run_chapter_tick(&player, &chapter_inputs, &EngineConfig::default(), &mut rolls);

        assert_eq!(
            outcome.combat.as_ref().and_then(|brief| brief.defeat),
            Some(DefeatTier::SoulDeath)
        );
        assert!(outcome.player.soul_dead);
        assert_eq!(outcome.player.chapter, 1);
        assert_eq!(outcome.directives, vec![NarrativeDirective::StoryEnded]);
        assert!(outcome.growth_events.is_empty());
        assert_eq!(outcome.identity_delta, IdentityDelta::default());
        let bond = outcome
            .player
            .equipped_weapons
            .primary
            .as_ref()
            .map(|weapon| weapon.bond_score);
        assert_eq!(bond, Some(40.0));
        assert_eq!(outcome.player.hp, 0.0);
    }

    #[test]
    fn soul_dead_records_do_not_advance() {
        let player = PlayerState {
            soul_dead: true,
            chapter: 12,
            ..PlayerState::default()
        };
        let mut rolls = FixedRolls::constant(0.5);
        let outcome = run_chapter_tick(
            &player,
            &inputs(ActionCategory::Narrative),
            &EngineConfig::default(),
            &mut rolls,
        );
        assert_eq!(outcome.player.chapter, 12);
        assert_eq!(outcome.directives, vec![NarrativeDirective::StoryEnded]);
    }
}
