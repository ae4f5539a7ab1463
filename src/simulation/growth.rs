use serde::Serialize;

use crate::data::config::GrowthConfig;
use crate::simulation::unique_skill::{
    BloomPath, GrowthStage, ScarType, SkillCategory, SubSkill, SubSkillKind, TraumaEntry,
    TraumaSeverity, UniqueSkill, UniqueSkillGrowthState,
};
use crate::simulation::weapon::TransitionResult;

const SCAR_ADAPTATION_PER_TRAUMA: f64 = 0.05;
const SCAR_ADAPTATION_MAX: f64 = 0.15;
const ARC_BEATS: u8 = 3;

/// Severity weights and the scar each severity leans toward.
pub fn scar_severity_config(severity: TraumaSeverity) -> (u32, ScarType) {
    match severity {
        TraumaSeverity::Wound => (1, ScarType::Hardened),
        TraumaSeverity::Break => (2, ScarType::Vigilant),
        TraumaSeverity::Shatter => (3, ScarType::Defiant),
    }
}

/// Scar type of the severity carrying the most summed weight. Ties go to
/// the harsher severity.
pub fn scar_type_for(log: &[TraumaEntry]) -> ScarType {
    let mut best = (0, TraumaSeverity::Wound);
    for severity in [TraumaSeverity::Wound, TraumaSeverity::Break, TraumaSeverity::Shatter] {
        let (weight, _) = scar_severity_config(severity);
        let total = log.iter().filter(|entry| entry.severity == severity).count() as u32 * weight;
        if total > 0 && total >= best.0 {
            best = (total, severity);
        }
    }
    scar_severity_config(best.1).1
}

pub fn scar_adaptation(trauma_count: usize) -> f64 {
    (trauma_count as f64 * SCAR_ADAPTATION_PER_TRAUMA).min(SCAR_ADAPTATION_MAX)
}

fn echo_sub_skill(category: SkillCategory) -> SubSkill {
    let (name, kind) = match category {
        SkillCategory::Perception => ("Afterimage Read", SubSkillKind::Active),
        SkillCategory::Manifestation => ("Second Shape", SubSkillKind::Active),
        SkillCategory::Manipulation => ("Pull of the Thread", SubSkillKind::Active),
        SkillCategory::Contract => ("Answering Clause", SubSkillKind::Reactive),
        SkillCategory::Obfuscation => ("Folded Step", SubSkillKind::Reactive),
    };
    SubSkill {
        name: name.to_string(),
        kind,
        unlocked_at: Some(GrowthStage::Bloom),
    }
}

fn scar_sub_skill(scar: ScarType) -> SubSkill {
    let name = match scar {
        ScarType::Hardened => "Scarred Bulwark",
        ScarType::Vigilant => "Flinch Sense",
        ScarType::Defiant => "Spite Surge",
    };
    SubSkill {
        name: name.to_string(),
        kind: SubSkillKind::Reactive,
        unlocked_at: Some(GrowthStage::Bloom),
    }
}

pub fn aspect_choices(category: SkillCategory) -> [&'static str; 2] {
    match category {
        SkillCategory::Perception => ["Aspect of the Unblinking", "Aspect of the Far Sight"],
        SkillCategory::Manifestation => ["Aspect of the Forge", "Aspect of the Storm"],
        SkillCategory::Manipulation => ["Aspect of the Puppeteer", "Aspect of the Tide"],
        SkillCategory::Contract => ["Aspect of the Binding Word", "Aspect of the Debt"],
        SkillCategory::Obfuscation => ["Aspect of the Mask", "Aspect of the Missing Hour"],
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GrowthEvent {
    Bloom {
        path: BloomPath,
        sub_skill: String,
        scar_type: Option<ScarType>,
    },
    EchoReverted,
    AspectBeat {
        beat: u8,
    },
    AspectDecision {
        choices: [String; 2],
        defer_chapters: u32,
    },
    AspectForged {
        aspect: String,
    },
    AspectDeferred {
        until_chapter: u32,
    },
    UltimateBeat {
        beat: u8,
    },
    UltimateForged {
        form: String,
        absorbed_skill: Option<String>,
    },
}

/// What one scene tells the growth engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSignal {
    pub chapter: u32,
    pub coherence: f64,
    pub soul_choice: bool,
    pub defeat: Option<TraumaSeverity>,
    pub near_death: bool,
}

/// Advances the per-scene counters and fires at most one stage event.
pub fn update_per_scene(
    skill: &mut UniqueSkill,
    growth: &mut UniqueSkillGrowthState,
    signal: &SceneSignal,
    config: &GrowthConfig,
) -> Option<GrowthEvent> {
    if signal.coherence < config.reset_gate {
        growth.low_coherence_streak += 1;
    } else {
        growth.low_coherence_streak = 0;
    }

    if growth.current_stage == GrowthStage::Seed {
        if signal.coherence >= config.echo_gate {
            growth.echo_coherence_streak += 1;
        } else if signal.coherence < config.reset_gate {
            growth.echo_coherence_streak = growth
                .echo_coherence_streak
                .saturating_sub(config.echo_reset_penalty);
        }
        let trauma = signal
            .defeat
            .or(signal.near_death.then_some(TraumaSeverity::Wound));
        if let Some(severity) = trauma {
            growth.trauma_log.push(TraumaEntry {
                chapter: signal.chapter,
                severity,
            });
        }

        if growth.echo_coherence_streak >= config.echo_bloom_streak {
            return Some(bloom(skill, growth, BloomPath::Echo, signal.chapter));
        }
        if growth.trauma_log.len() >= config.trauma_bloom_count {
            return Some(bloom(skill, growth, BloomPath::Scar, signal.chapter));
        }
        return None;
    }

    if can_revert(growth) && growth.low_coherence_streak >= config.revert_streak {
        revert_echo(skill, growth);
        return Some(GrowthEvent::EchoReverted);
    }

    if growth.current_stage == GrowthStage::Bloom && !growth.aspect_forged {
        let blocked = growth
            .aspect_deferred_at
            .is_some_and(|at| signal.chapter < at + config.aspect_retrigger_chapters);
        if blocked || growth.aspect_beat >= ARC_BEATS {
            return None;
        }
        if signal.coherence >= config.aspect_gate || signal.soul_choice {
            growth.aspect_beat += 1;
            if growth.aspect_beat >= ARC_BEATS {
                let [a, b] = aspect_choices(skill.category);
                return Some(GrowthEvent::AspectDecision {
                    choices: [a.to_string(), b.to_string()],
                    defer_chapters: config.aspect_retrigger_chapters,
                });
            }
            return Some(GrowthEvent::AspectBeat {
                beat: growth.aspect_beat,
            });
        }
    }
    None
}

fn can_revert(growth: &UniqueSkillGrowthState) -> bool {
    growth.current_stage == GrowthStage::Bloom
        && growth.bloom_path == Some(BloomPath::Echo)
        && growth.bloom_completed
        && growth.echo_can_lose
        && !growth.aspect_forged
}

pub fn bloom(
    skill: &mut UniqueSkill,
    growth: &mut UniqueSkillGrowthState,
    path: BloomPath,
    chapter: u32,
) -> GrowthEvent {
    growth.current_stage = GrowthStage::Bloom;
    growth.bloom_path = Some(path);
    growth.bloom_completed = true;
    growth.bloom_chapter = Some(chapter);
    growth.low_coherence_streak = 0;
    skill.suppression_resistance = GrowthStage::Bloom.default_resistance();

    let (sub_skill, scar_type) = match path {
        BloomPath::Echo => {
            skill.weakness_relaxed = true;
            (echo_sub_skill(skill.category), None)
        }
        BloomPath::Scar => {
            let scar = scar_type_for(&growth.trauma_log);
            growth.scar_type = Some(scar);
            growth.scar_adaptation = scar_adaptation(growth.trauma_log.len());
            (scar_sub_skill(scar), Some(scar))
        }
    };
    let name = sub_skill.name.clone();
    skill.sub_skills.push(sub_skill);
    tracing::info!(
        target: "progression::growth",
        skill = %skill.name,
        path = ?path,
        sub_skill = %name,
        "unique.bloomed"
    );
    GrowthEvent::Bloom {
        path,
        sub_skill: name,
        scar_type,
    }
}

/// Drops an echo bloom back to seed.
pub fn revert_echo(skill: &mut UniqueSkill, growth: &mut UniqueSkillGrowthState) {
    growth.current_stage = GrowthStage::Seed;
    growth.bloom_path = None;
    growth.bloom_completed = false;
    growth.bloom_chapter = None;
    growth.echo_coherence_streak = 0;
    growth.low_coherence_streak = 0;
    growth.aspect_beat = 0;
    skill.suppression_resistance = GrowthStage::Seed.default_resistance();
    skill.weakness_relaxed = false;
    skill
        .sub_skills
        .retain(|sub| sub.unlocked_at != Some(GrowthStage::Bloom));
    tracing::info!(target: "progression::growth", skill = %skill.name, "unique.echo_reverted");
}

pub fn forge_aspect(
    skill: &mut UniqueSkill,
    growth: &mut UniqueSkillGrowthState,
    choice: &str,
) -> TransitionResult {
    if growth.current_stage != GrowthStage::Bloom || growth.aspect_beat < ARC_BEATS {
        return TransitionResult::NotApplied {
            reason: "aspect decision is not open".to_string(),
        };
    }
    if !aspect_choices(skill.category).contains(&choice) {
        tracing::warn!(target: "progression::growth", aspect = %choice, "aspect.unknown");
        return TransitionResult::NotApplied {
            reason: format!("{choice} is not an offered aspect"),
        };
    }
    growth.current_stage = GrowthStage::Aspect;
    growth.aspect_choice = Some(choice.to_string());
    growth.aspect_forged = true;
    growth.echo_can_lose = false;
    skill.mutation_locked = true;
    skill.suppression_resistance = GrowthStage::Aspect.default_resistance();
    tracing::info!(target: "progression::growth", skill = %skill.name, aspect = %choice, "unique.aspect_forged");
    TransitionResult::Applied
}

pub fn defer_aspect(growth: &mut UniqueSkillGrowthState, chapter: u32, config: &GrowthConfig) -> GrowthEvent {
    growth.aspect_deferred_at = Some(chapter);
    growth.aspect_beat = 0;
    GrowthEvent::AspectDeferred {
        until_chapter: chapter + config.aspect_retrigger_chapters,
    }
}

/// Advances the climax arc. On the third beat the ultimate is forged,
/// absorbing `absorb` or else the lowest equipped skill id.
pub fn advance_ultimate(
    skill: &mut UniqueSkill,
    growth: &mut UniqueSkillGrowthState,
    climax: bool,
    absorb: Option<&str>,
    equipped: &[String],
) -> Option<GrowthEvent> {
    if !climax || growth.current_stage != GrowthStage::Aspect || growth.ultimate_forged {
        return None;
    }
    growth.ultimate_beat += 1;
    if growth.ultimate_beat < ARC_BEATS {
        return Some(GrowthEvent::UltimateBeat {
            beat: growth.ultimate_beat,
        });
    }

    let absorbed = absorb
        .filter(|id| equipped.iter().any(|e| e == id))
        .map(str::to_string)
        .or_else(|| equipped.iter().min().cloned());
    let form = match growth.aspect_choice.as_deref() {
        Some(aspect) => format!("{} Ascendant", aspect.trim_start_matches("Aspect of the ")),
        None => format!("{} Ascendant", skill.name),
    };
    growth.current_stage = GrowthStage::Ultimate;
    growth.ultimate_forged = true;
    growth.ultimate_form = Some(form.clone());
    growth.absorbed_skill = absorbed.clone();
    skill.suppression_resistance = GrowthStage::Ultimate.default_resistance();
    skill.ultimate_ability_used_season = None;
    tracing::info!(
        target: "progression::growth",
        skill = %skill.name,
        form = %form,
        absorbed = ?absorbed,
        "unique.ultimate_forged"
    );
    Some(GrowthEvent::UltimateForged {
        form,
        absorbed_skill: absorbed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::unique_skill::WeaknessType;

    fn skill() -> UniqueSkill {
        UniqueSkill::new(
            "Ember Script",
            SkillCategory::Manifestation,
            WeaknessType::DelayedCast,
            SkillCategory::Obfuscation,
        )
    }

    fn scene(chapter: u32, coherence: f64) -> SceneSignal {
        SceneSignal {
            chapter,
            coherence,
            soul_choice: false,
            defeat: None,
            near_death: false,
        }
    }

    #[test]
    fn echo_bloom_after_ten_coherent_scenes() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        let mut events = Vec::new();
        for chapter in 1..=10 {
            events.extend(update_per_scene(&mut skill, &mut growth, &scene(chapter, 65.0), &config));
        }
        assert_eq!(events.len(), 1);
        assert_eq!(growth.current_stage, GrowthStage::Bloom);
        assert_eq!(growth.bloom_path, Some(BloomPath::Echo));
        assert!(skill.weakness_relaxed);
        assert_eq!(skill.suppression_resistance, 65.0);
        assert!(growth.echo_can_lose);
    }

    #[test]
    fn low_coherence_erodes_echo_streak() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        for chapter in 1..=4 {
            update_per_scene(&mut skill, &mut growth, &scene(chapter, 70.0), &config);
        }
        update_per_scene(&mut skill, &mut growth, &scene(5, 40.0), &config);
        assert_eq!(growth.echo_coherence_streak, 2);
        update_per_scene(&mut skill, &mut growth, &scene(6, 55.0), &config);
        assert_eq!(growth.echo_coherence_streak, 2);
    }

    #[test]
    fn scar_bloom_picks_heaviest_severity() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        let mut signal = scene(1, 40.0);
        signal.near_death = true;
        update_per_scene(&mut skill, &mut growth, &signal, &config);
        update_per_scene(&mut skill, &mut growth, &signal, &config);
        signal.near_death = false;
        signal.defeat = Some(TraumaSeverity::Break);
        let event = update_per_scene(&mut skill, &mut growth, &signal, &config);
        assert!(matches!(
            event,
            Some(GrowthEvent::Bloom {
                path: BloomPath::Scar,
                scar_type: Some(ScarType::Vigilant),
                ..
            })
        ));
        assert!((growth.scar_adaptation - 0.15).abs() < 1e-9);
        assert!(!skill.weakness_relaxed);
        assert_eq!(skill.sub_skills[0].kind, SubSkillKind::Reactive);
    }

    #[test]
    fn scar_type_ties_go_to_harsher() {
        let log = [
            TraumaEntry { chapter: 1, severity: TraumaSeverity::Wound },
            TraumaEntry { chapter: 2, severity: TraumaSeverity::Wound },
            TraumaEntry { chapter: 3, severity: TraumaSeverity::Break },
        ];
        assert_eq!(scar_type_for(&log), ScarType::Vigilant);
    }

    #[test]
    fn scar_bloom_never_reverts() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        growth.trauma_log = vec![TraumaEntry { chapter: 1, severity: TraumaSeverity::Shatter }; 3];
        bloom(&mut skill, &mut growth, BloomPath::Scar, 3);
        for chapter in 4..=12 {
            update_per_scene(&mut skill, &mut growth, &scene(chapter, 10.0), &config);
        }
        assert_eq!(growth.current_stage, GrowthStage::Bloom);
    }

    #[test]
    fn aspect_arc_decision_forge_and_lock() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        bloom(&mut skill, &mut growth, BloomPath::Echo, 1);
        let mut last = None;
        for chapter in 2..=4 {
            last = update_per_scene(&mut skill, &mut growth, &scene(chapter, 75.0), &config);
        }
        let Some(GrowthEvent::AspectDecision { choices, .. }) = last else {
            panic!("expected aspect decision");
        };
        assert!(!forge_aspect(&mut skill, &mut growth, "Aspect of Nothing").is_applied());
        assert!(forge_aspect(&mut skill, &mut growth, &choices[0]).is_applied());
        assert!(skill.mutation_locked);
        assert!(!growth.echo_can_lose);
        assert_eq!(skill.suppression_resistance, 80.0);
    }

    #[test]
    fn aspect_deferral_blocks_for_five_chapters() {
        let config = GrowthConfig::default();
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState::default();
        bloom(&mut skill, &mut growth, BloomPath::Echo, 1);
        defer_aspect(&mut growth, 10, &config);
        assert!(update_per_scene(&mut skill, &mut growth, &scene(14, 90.0), &config).is_none());
        assert_eq!(
            update_per_scene(&mut skill, &mut growth, &scene(15, 90.0), &config),
            Some(GrowthEvent::AspectBeat { beat: 1 })
        );
    }

    #[test]
    fn ultimate_absorbs_chosen_or_first_equipped() {
        let mut skill = skill();
        let mut growth = UniqueSkillGrowthState {
            current_stage: GrowthStage::Aspect,
            aspect_forged: true,
            aspect_choice: Some("Aspect of the Forge".to_string()),
            ..UniqueSkillGrowthState::default()
        };
        let equipped = vec!["skill_wardline".to_string(), "skill_cinder".to_string()];
        assert!(advance_ultimate(&mut skill, &mut growth, false, None, &equipped).is_none());
        advance_ultimate(&mut skill, &mut growth, true, None, &equipped);
        advance_ultimate(&mut skill, &mut growth, true, None, &equipped);
        let event = advance_ultimate(&mut skill, &mut growth, true, Some("skill_unknown"), &equipped);
        assert_eq!(
            event,
            Some(GrowthEvent::UltimateForged {
                form: "Forge Ascendant".to_string(),
                absorbed_skill: Some("skill_cinder".to_string()),
            })
        );
        assert_eq!(skill.suppression_resistance, 95.0);
        assert!(growth.ultimate_forged);
    }
}
