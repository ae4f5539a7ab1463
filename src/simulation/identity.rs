use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::config::FateConfig;
use crate::rules::principle::ParseEnumError;
use crate::rules::stability::CombatOutcome;
use crate::simulation::combat::EncounterType;
use crate::simulation::player::{PlayerState, ALIGNMENT_MAX, ALIGNMENT_MIN, SCALAR_MAX};

pub const CONFRONTATION_INSTABILITY: f64 = 70.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceInput {
    pub text: String,
    pub risk_level: u8,
    #[serde(default)]
    pub consequence_hint: String,
}

impl ChoiceInput {
    pub fn risk(&self) -> u8 {
        self.risk_level.clamp(1, 5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    Narrative,
    Combat,
    SkillUse,
    Social,
    Exploration,
    Stealth,
    Equipment,
    SoulChoice,
    Other,
}

impl FromStr for ActionCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "narrative" => Ok(ActionCategory::Narrative),
            "combat" => Ok(ActionCategory::Combat),
            "skill_use" => Ok(ActionCategory::SkillUse),
            "social" => Ok(ActionCategory::Social),
            "exploration" => Ok(ActionCategory::Exploration),
            "stealth" => Ok(ActionCategory::Stealth),
            "equipment" => Ok(ActionCategory::Equipment),
            "soul_choice" => Ok(ActionCategory::SoulChoice),
            "other" => Ok(ActionCategory::Other),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedAction {
    pub category: ActionCategory,
    #[serde(default)]
    pub skill_reference: Option<String>,
    #[serde(default)]
    pub intent: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityAlignment {
    Aligned,
    #[default]
    Neutral,
    MinorDrift,
    MajorDrift,
    Betrayal,
}

impl IdentityAlignment {
    fn coherence_change(self) -> f64 {
        match self {
            IdentityAlignment::Aligned => 1.0,
            IdentityAlignment::Neutral => 0.0,
            IdentityAlignment::MinorDrift => -3.0,
            IdentityAlignment::MajorDrift => -6.0,
            IdentityAlignment::Betrayal => -10.0,
        }
    }

    fn dqs_term(self) -> f64 {
        match self {
            IdentityAlignment::Aligned => 0.5,
            IdentityAlignment::Neutral => 0.0,
            IdentityAlignment::MinorDrift => -1.0,
            IdentityAlignment::MajorDrift => -1.5,
            IdentityAlignment::Betrayal => -2.0,
        }
    }

    fn instability_term(self) -> f64 {
        match self {
            IdentityAlignment::Aligned | IdentityAlignment::Neutral => 0.0,
            IdentityAlignment::MinorDrift => 2.0,
            IdentityAlignment::MajorDrift => 5.0,
            IdentityAlignment::Betrayal => 8.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsequenceSeverity {
    #[default]
    Minor,
    Moderate,
    Major,
    Critical,
}

/// Output of the external consequence router for one choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterOutput {
    pub identity_alignment: IdentityAlignment,
    pub alignment_shift: f64,
    pub severity: ConsequenceSeverity,
    pub new_flags: Vec<String>,
    pub reactions: Vec<String>,
    pub foreshadowing: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrngEventType {
    Breakthrough,
    Rogue,
    Fortune,
    Omen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrngEvent {
    pub event_type: CrngEventType,
    #[serde(default)]
    pub affinity_tag: Option<String>,
    #[serde(default)]
    pub triggered: bool,
}

/// Partial delta from an external weight agent. Numbers are clamped on
/// arrival and the core-owned flags are always overwritten.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiProposal {
    pub dqs_change: Option<f64>,
    pub coherence_change: Option<f64>,
    pub instability_change: Option<f64>,
    pub breakthrough_change: Option<f64>,
    pub notoriety_change: Option<f64>,
    pub alignment_change: Option<f64>,
    pub fate_buffer_change: Option<f64>,
    pub pity_reset: Option<bool>,
    pub breakthrough_triggered: Option<bool>,
    pub rogue_event_triggered: Option<bool>,
    pub confrontation_triggered: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftLevel {
    #[default]
    None,
    Minor,
    Major,
    Critical,
}

impl DriftLevel {
    pub fn from_coherence_change(change: f64) -> Self {
        if change >= 0.0 {
            DriftLevel::None
        } else if change >= -3.0 {
            DriftLevel::Minor
        } else if change >= -6.0 {
            DriftLevel::Major
        } else {
            DriftLevel::Critical
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityDelta {
    pub dqs_change: f64,
    pub coherence_change: f64,
    pub instability_change: f64,
    pub breakthrough_change: f64,
    pub notoriety_change: f64,
    pub alignment_change: f64,
    pub fate_buffer_change: f64,
    pub pity_reset: bool,
    pub breakthrough_triggered: bool,
    pub rogue_event_triggered: bool,
    pub confrontation_triggered: bool,
    pub drift_detected: DriftLevel,
    pub new_flags: Vec<String>,
}

/// Signed bounds each delta field must respect, whoever proposed it.
pub mod caps {
    pub const COHERENCE: (f64, f64) = (-10.0, 3.0);
    pub const DQS: (f64, f64) = (-5.0, 5.0);
    pub const INSTABILITY: (f64, f64) = (-5.0, 10.0);
    pub const BREAKTHROUGH: (f64, f64) = (0.0, 10.0);
    pub const NOTORIETY: (f64, f64) = (-5.0, 5.0);
    pub const ALIGNMENT: (f64, f64) = (-5.0, 5.0);
    pub const FATE: (f64, f64) = (-40.0, 10.0);
}

/// The chapter's combat as the delta calculator sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatSummary {
    pub encounter_type: EncounterType,
    pub final_outcome: CombatOutcome,
    pub instability_sum: f64,
    pub won: bool,
}

pub struct DeltaInputs<'a> {
    pub chapter: u32,
    pub choice: &'a ChoiceInput,
    pub category: ActionCategory,
    pub router: Option<&'a RouterOutput>,
    pub crng: Option<&'a CrngEvent>,
    pub combat: Option<&'a CombatSummary>,
    pub is_turning_point: bool,
    pub proposal: Option<&'a AiProposal>,
}

fn clamp_change(change: f64, cap: (f64, f64), current: f64, range: (f64, f64)) -> f64 {
    let capped = change.clamp(cap.0, cap.1);
    capped.clamp(range.0 - current, range.1 - current)
}

pub fn compute_identity_delta(player: &PlayerState, inputs: &DeltaInputs<'_>, fate: &FateConfig) -> IdentityDelta {
    let risk = inputs.choice.risk();
    let alignment = inputs
        .router
        .map(|router| router.identity_alignment)
        .unwrap_or_default();
    let soul_choice = inputs.category == ActionCategory::SoulChoice;
    let favorable = inputs
        .combat
        .is_some_and(|combat| combat.final_outcome == CombatOutcome::Favorable);

    let mut coherence = alignment.coherence_change();
    if soul_choice && alignment == IdentityAlignment::Aligned {
        coherence = 3.0;
    }

    let combat_dqs = match inputs.combat.map(|combat| combat.final_outcome) {
        Some(CombatOutcome::Favorable) => 1.5,
        Some(CombatOutcome::Mixed) => 0.5,
        Some(CombatOutcome::Unfavorable) => -1.5,
        None => 0.0,
    };
    let mut dqs = alignment.dqs_term() + combat_dqs;
    if risk >= 4 && favorable {
        dqs += 0.5;
    }

    let mut instability = inputs.combat.map_or(0.0, |combat| combat.instability_sum) + alignment.instability_term();
    if risk == 5 {
        instability += 1.0;
    }

    let mut breakthrough = 0.0;
    if risk >= 4 && favorable {
        breakthrough += 5.0;
    }
    if inputs.is_turning_point {
        breakthrough += 3.0;
    }

    let mut notoriety = 0.0;
    if favorable
        && inputs.combat.is_some_and(|combat| {
            matches!(combat.encounter_type, EncounterType::Boss | EncounterType::Climax)
        })
    {
        notoriety += 1.0;
    }
    if risk >= 4 {
        notoriety += 1.0;
    }

    let alignment_shift = inputs.router.map_or(0.0, |router| router.alignment_shift);

    let mut delta = IdentityDelta {
        dqs_change: dqs,
        coherence_change: coherence,
        instability_change: instability,
        breakthrough_change: breakthrough,
        notoriety_change: notoriety,
        alignment_change: alignment_shift,
        ..IdentityDelta::default()
    };

    if let Some(proposal) = inputs.proposal {
        let overrides = [
            (&mut delta.dqs_change, proposal.dqs_change),
            (&mut delta.coherence_change, proposal.coherence_change),
            (&mut delta.instability_change, proposal.instability_change),
            (&mut delta.breakthrough_change, proposal.breakthrough_change),
            (&mut delta.notoriety_change, proposal.notoriety_change),
            (&mut delta.alignment_change, proposal.alignment_change),
        ];
        for (field, value) in overrides {
            if let Some(value) = value.filter(|v| v.is_finite()) {
                *field = value;
            }
        }
    }

    let range = (0.0, SCALAR_MAX);
    delta.coherence_change = clamp_change(delta.coherence_change, caps::COHERENCE, player.coherence, range);
    delta.dqs_change = clamp_change(delta.dqs_change, caps::DQS, player.dqs, range);
    delta.instability_change = clamp_change(delta.instability_change, caps::INSTABILITY, player.instability, range);
    delta.breakthrough_change =
        clamp_change(delta.breakthrough_change, caps::BREAKTHROUGH, player.breakthrough, range);
    delta.notoriety_change = clamp_change(delta.notoriety_change, caps::NOTORIETY, player.notoriety, range);
    delta.alignment_change = clamp_change(
        delta.alignment_change,
        caps::ALIGNMENT,
        player.alignment,
        (ALIGNMENT_MIN, ALIGNMENT_MAX),
    );

    let proposed_fate = inputs
        .proposal
        .and_then(|proposal| proposal.fate_buffer_change)
        .filter(|v| v.is_finite());
    let fate_change = proposed_fate.unwrap_or_else(|| {
        fate_gain(player, &delta, inputs, fate) - fate_decay(inputs.chapter, risk, fate)
    });
    delta.fate_buffer_change = clamp_change(fate_change, caps::FATE, player.fate_buffer, (0.0, fate.max));

    delta.confrontation_triggered = player.instability < CONFRONTATION_INSTABILITY
        && player.instability + delta.instability_change >= CONFRONTATION_INSTABILITY;
    let crng_fired = inputs.crng.filter(|event| event.triggered);
    delta.pity_reset = crng_fired.is_some();
    delta.breakthrough_triggered = crng_fired.is_some_and(|event| event.event_type == CrngEventType::Breakthrough);
    delta.rogue_event_triggered = crng_fired.is_some_and(|event| event.event_type == CrngEventType::Rogue);
    delta.drift_detected = DriftLevel::from_coherence_change(delta.coherence_change);

    if let Some(router) = inputs.router {
        if router.severity >= ConsequenceSeverity::Major {
            delta.new_flags = router.new_flags.clone();
        }
    }

    tracing::debug!(
        target: "progression::identity",
        coherence = delta.coherence_change,
        instability = delta.instability_change,
        dqs = delta.dqs_change,
        fate = delta.fate_buffer_change,
        drift = ?delta.drift_detected,
        "identity.delta"
    );
    delta
}

fn fate_gain(player: &PlayerState, delta: &IdentityDelta, inputs: &DeltaInputs<'_>, fate: &FateConfig) -> f64 {
    let mut gain = 0.0;
    if delta.coherence_change > 0.0 {
        gain += fate.coherence_gain;
    } else if player.coherence >= fate.high_coherence_at {
        gain += fate.high_coherence_gain;
    }
    if delta.dqs_change > 0.0 {
        gain += fate.dqs_gain;
    }
    if inputs.combat.is_some_and(|combat| combat.won) {
        gain += fate.win_gain;
    }
    gain
}

/// Late-story erosion, scaled by the choice's risk.
pub fn fate_decay(chapter: u32, risk: u8, fate: &FateConfig) -> f64 {
    if chapter < fate.decay_start_chapter {
        return 0.0;
    }
    fate.decay_amount * (1.0 + fate.risk_scale * f64::from(risk))
}

/// Adds the delta to the record and re-clamps. An all-zero delta with no
/// flags leaves the record untouched.
pub fn apply_identity_delta(player: &mut PlayerState, delta: &IdentityDelta) {
    player.dqs += delta.dqs_change;
    player.coherence += delta.coherence_change;
    player.instability += delta.instability_change;
    player.breakthrough += delta.breakthrough_change;
    player.notoriety += delta.notoriety_change;
    player.alignment += delta.alignment_change;
    player.fate_buffer += delta.fate_buffer_change;
    player.clamp_scalars();
    player.flags.extend(delta.new_flags.iter().cloned());
    if delta.confrontation_triggered {
        tracing::info!(target: "progression::identity", instability = player.instability, "identity.confrontation");
    }
}
