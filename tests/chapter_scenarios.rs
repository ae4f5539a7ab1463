use progression_core::data::archons::ArchonKey;
use progression_core::data::config::EngineConfig;
use progression_core::rules::principle::Principle;
use progression_core::rules::stability::{CombatOutcome, Intensity};
use progression_core::rules::suppression::{
    resolve_suppression, SuppressionDuration, SuppressionKind, SuppressionLevel, SuppressionSource,
};
use progression_core::simulation::combat::{
    Approach, CombatAction, CombatRequest, EncounterType, EnemyKind, EnemyProfile,
};
use progression_core::simulation::growth::GrowthEvent;
use progression_core::simulation::identity::{
    compute_identity_delta, ActionCategory, AiProposal, ChoiceInput, ClassifiedAction, CrngEvent,
    CrngEventType, DeltaInputs, IdentityAlignment, RouterOutput,
};
use progression_core::simulation::player::PlayerState;
use progression_core::simulation::rolls::FixedRolls;
use progression_core::simulation::unique_skill::{
    BloomPath, GrowthStage, SkillCategory, UniqueSkill, UniqueSkillGrowthState, WeaknessType,
};
use progression_core::simulation::weapon::{
    apply_bond_event, apply_soul_link, forge_archon_fragment, use_divine_ability, BondEvent, Weapon,
    WeaponGrade,
};
use progression_core::systems::chapter::{run_chapter_tick, ChapterInputs};

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn choice(risk_level: u8) -> ChoiceInput {
    ChoiceInput {
        text: "walk into the lantern hall".to_string(),
        risk_level,
        consequence_hint: String::new(),
    }
}

fn chapter_inputs(category: ActionCategory, risk_level: u8) -> ChapterInputs {
    ChapterInputs::new(
        choice(risk_level),
        ClassifiedAction {
            category,
            skill_reference: None,
            intent: String::new(),
        },
    )
}

fn minor_fight(principle: Principle, threat_level: f64, skill: &str, intensity: Intensity, crng_roll: f64) -> CombatRequest {
    CombatRequest {
        encounter_type: EncounterType::Minor,
        enemy: EnemyProfile {
            name: "Lantern Shade".to_string(),
            principle,
            threat_level,
            kind: EnemyKind::Normal,
            suppression: None,
        },
        approach: Approach {
            action: CombatAction::Strike,
            intensity,
            skill_name: skill.to_string(),
            use_unique: false,
            invoke_divine: false,
        },
        followup_approaches: Vec::new(),
        floor: 1,
        crng_roll,
    }
}

#[test]
fn coherent_chapter_rewards_the_aligned_choice() {
    let mut player = PlayerState {
        coherence: 80.0,
        instability: 10.0,
        dqs: 60.0,
        fate_buffer: 50.0,
        ..PlayerState::default()
    };
    player.principle_resonance.set(Principle::Energy, 0.45);

    let mut inputs = chapter_inputs(ActionCategory::Combat, 2);
    inputs.router = Some(RouterOutput {
        identity_alignment: IdentityAlignment::Aligned,
        ..RouterOutput::default()
    });
    inputs.flags.has_combat = true;
    inputs.combat_request = Some(minor_fight(Principle::Void, 0.4, "energy", Intensity::Push, 0.30));
    let mut rolls = FixedRolls::constant(0.5);

    let outcome = run_chapter_tick(&player, &inputs, &EngineConfig::default(), &mut rolls);

    let brief = outcome.combat.as_ref().expect("combat brief");
    let score = brief.phases[0].score;
    assert!((0.60..=0.75).contains(&score), "score {score}");
    assert_eq!(brief.final_outcome, CombatOutcome::Favorable);

    let next = &outcome.player;
    let delta = &outcome.identity_delta;
    assert!(approx(next.principle_resonance.get(Principle::Energy), 0.48));
    assert!(approx(brief.total_stability_cost, 22.0));
    assert!(approx(next.stability, 78.0 + EngineConfig::default().combat.stability_recovery));
    assert!(approx(delta.instability_change, -1.0));
    assert!((1.5..=2.0).contains(&delta.dqs_change));
    assert!(approx(delta.coherence_change, 1.0));
    assert!(approx(delta.fate_buffer_change, 3.5));
    assert!(approx(next.fate_buffer, 53.5));
    assert!(!delta.confrontation_triggered);
    assert_eq!(next.chapter, 1);
}

#[test]
fn proposal_crossing_seventy_trips_confrontation() {
    let player = PlayerState {
        instability: 65.0,
        ..PlayerState::default()
    };
    let choice = choice(2);
    let proposal = AiProposal {
        instability_change: Some(8.0),
        pity_reset: Some(true),
        ..AiProposal::default()
    };
    let base = DeltaInputs {
        chapter: 4,
        choice: &choice,
        category: ActionCategory::Narrative,
        router: None,
        crng: None,
        combat: None,
        is_turning_point: false,
        proposal: Some(&proposal),
    };
    let config = EngineConfig::default();

    let delta = compute_identity_delta(&player, &base, &config.fate);
    assert!(approx(delta.instability_change, 8.0));
    assert!(approx(player.instability + delta.instability_change, 73.0));
    assert!(delta.confrontation_triggered);
    assert!(!delta.pity_reset);

    let crng = CrngEvent {
        event_type: CrngEventType::Omen,
        affinity_tag: None,
        triggered: true,
    };
    let with_crng = DeltaInputs {
        crng: Some(&crng),
        ..base
    };
    let delta = compute_identity_delta(&player, &with_crng, &config.fate);
    assert!(delta.pity_reset);
}

#[test]
fn fate_buffer_keeps_the_player_standing() {
    let player = PlayerState {
        hp: 12.0,
        fate_buffer: 60.0,
        ..PlayerState::default()
    };
    let mut inputs = chapter_inputs(ActionCategory::Combat, 2);
    inputs.flags.has_combat = true;
    inputs.combat_request = Some(minor_fight(Principle::Energy, 1.0, "energy", Intensity::Safe, 0.0));
    let mut rolls = FixedRolls::constant(0.5);

    let outcome = run_chapter_tick(&player, &inputs, &EngineConfig::default(), &mut rolls);

    let brief = outcome.combat.as_ref().expect("combat brief");
    assert_eq!(brief.phases[0].outcome, CombatOutcome::Unfavorable);
    assert!(brief.fate_fired);
    assert!(approx(brief.phases[0].next_phase_adaptation, 0.30));
    assert!(brief.defeat.is_none());
    assert!(outcome.player.hp > 0.0);
    assert!(approx(outcome.player.fate_buffer, 20.0));
    assert_eq!(outcome.player.defeat_count, 0);
    assert!(outcome.writer_context.combat.is_some());
}

#[test]
fn low_coherence_streak_reverts_an_echo_bloom() {
    let mut skill = UniqueSkill::new(
        "Quiet Engine",
        SkillCategory::Manifestation,
        WeaknessType::SensoryTax,
        SkillCategory::Perception,
    );
    skill.suppression_resistance = GrowthStage::Bloom.default_resistance();
    let mut player = PlayerState {
        coherence: 30.0,
        unique_skill: Some(skill),
        unique_skill_growth: Some(UniqueSkillGrowthState {
            current_stage: GrowthStage::Bloom,
            bloom_path: Some(BloomPath::Echo),
            bloom_completed: true,
            echo_can_lose: true,
            ..UniqueSkillGrowthState::default()
        }),
        ..PlayerState::default()
    };
    let inputs = chapter_inputs(ActionCategory::Narrative, 2);
    let config = EngineConfig::default();
    let mut rolls = FixedRolls::constant(0.5);

    let mut events = Vec::new();
    for _ in 0..5 {
        let outcome = run_chapter_tick(&player, &inputs, &config, &mut rolls);
        events.extend(outcome.growth_events);
        player = outcome.player;
    }

    let growth = player.unique_skill_growth.as_ref().expect("growth");
    assert_eq!(growth.current_stage, GrowthStage::Seed);
    assert!(!growth.bloom_completed);
    let skill = player.unique_skill.as_ref().expect("skill");
    assert!(approx(skill.suppression_resistance, 50.0));
    assert_eq!(
        events.iter().filter(|e| matches!(e, GrowthEvent::EchoReverted)).count(),
        1
    );
}

#[test]
fn blind_spot_and_weakness_stack_into_suppression() {
    let mut skill = UniqueSkill::new(
        "Quiet Engine",
        SkillCategory::Manifestation,
        WeaknessType::SensoryTax,
        SkillCategory::Perception,
    );
    skill.suppression_resistance = 65.0;
    let source = SuppressionSource {
        kind: SuppressionKind::Skill,
        power: 60.0,
        category: Some(SkillCategory::Perception),
        enemy_has_unique: true,
    };

    let result = resolve_suppression(&skill, &source);

    assert!(approx(result.effective_power, 85.0));
    assert!(approx(result.gap, 20.0));
    assert_eq!(result.level, SuppressionLevel::Suppressed);
    assert_eq!(result.duration, SuppressionDuration::Phases(3));
}

#[test]
fn soul_choice_pushes_bond_past_soul_link() {
    let mut weapon = Weapon::new("Cinder Hook", WeaponGrade::Resonant, &[Principle::Energy]);
    weapon.bond_score = 78.0;

    let update = apply_bond_event(&mut weapon, BondEvent::SoulChoice);

    assert!(approx(update.bond_score, 84.0));
    assert!(update.soul_link_pending);
    assert_eq!(weapon.grade, WeaponGrade::Resonant);

    assert!(apply_soul_link(&mut weapon).is_applied());
    assert_eq!(weapon.grade, WeaponGrade::SoulLinked);
    assert!(!weapon.soul_link_pending);
}

#[test]
fn divine_ability_is_rationed_per_season() {
    let mut weapon = forge_archon_fragment(ArchonKey::Kaelith);

    let first = use_divine_ability(&mut weapon, 3, SuppressionLevel::None);
    assert!(first.is_some());
    assert!(use_divine_ability(&mut weapon, 17, SuppressionLevel::None).is_none());
    let next_season = use_divine_ability(&mut weapon, 21, SuppressionLevel::None);
    assert_eq!(next_season, first);
}
