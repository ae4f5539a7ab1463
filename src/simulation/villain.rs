use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::villains::{
    anomaly_seeds, emissary, general, ThresholdAxis, TrackedEvent, GENERALS, GRAY_ZONE_FLAG,
    VILLAIN_THRESHOLDS,
};
use crate::simulation::player::{PlayerState, SCALAR_MAX};
use crate::simulation::weapon::TransitionResult;

const CONVERSION_RESONANCE: f64 = 80.0;
const RESISTANT_ANCHOR: f64 = 70.0;
const RESISTANT_COHERENCE_FLOOR: f64 = 50.0;
const DEFECTOR_RESONANCE_COST: f64 = 40.0;
const GRAY_ZONE: (f64, f64) = (40.0, 60.0);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allegiance {
    #[default]
    Independent,
    Agent,
    Defector,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneralRole {
    #[default]
    Commander,
    Hunter,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralRecord {
    pub encountered: bool,
    pub defeated: bool,
    pub rejected: bool,
    pub role: GeneralRole,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityMutation {
    MirrorCrack,
    Conversion,
    Resistant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VillainState {
    pub allegiance: Allegiance,
    pub generals: BTreeMap<String, GeneralRecord>,
    pub emissary_sympathy: BTreeMap<String, f64>,
    pub fired_thresholds: BTreeSet<String>,
    pub mutations: BTreeSet<IdentityMutation>,
    pub questioned_value: Option<String>,
    pub coherence_floor: Option<f64>,
    pub empire_route_unlocked: bool,
    pub hunter: Option<String>,
    pub veiled_will_phase: u8,
}

impl VillainState {
    pub fn generals_defeated(&self) -> usize {
        self.generals.values().filter(|record| record.defeated).count()
    }

    pub fn generals_encountered(&self) -> usize {
        self.generals.values().filter(|record| record.encountered).count()
    }
}

/// One villain-facing event reported by the narrative layer for a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VillainEventInput {
    pub event: TrackedEvent,
    #[serde(default)]
    pub general_id: Option<String>,
    #[serde(default)]
    pub emissary_id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackedEventResult {
    pub resonance_change: f64,
    pub anchor_change: f64,
    pub sympathy_change: f64,
}

pub fn apply_tracked_event(player: &mut PlayerState, input: &VillainEventInput) -> TrackedEventResult {
    let deltas = input.event.deltas();
    let before_resonance = player.empire_resonance;
    let before_anchor = player.identity_anchor;
    player.empire_resonance = (player.empire_resonance + deltas.resonance).clamp(0.0, SCALAR_MAX);
    // anchor only ever rises by rule
    player.identity_anchor = (player.identity_anchor + deltas.anchor.max(0.0)).min(SCALAR_MAX);

    let mut sympathy_change = 0.0;
    if let Some(id) = input.emissary_id.as_deref() {
        if emissary(id).is_some() {
            let entry = player.villain.emissary_sympathy.entry(id.to_string()).or_insert(0.0);
            let before = *entry;
            *entry = (*entry + deltas.sympathy).clamp(0.0, SCALAR_MAX);
            sympathy_change = *entry - before;
        } else {
            tracing::warn!(target: "progression::villain", emissary_id = %id, "emissary.unknown");
        }
    }

    if let Some(id) = input.general_id.as_deref() {
        if general(id).is_some() {
            let record = player.villain.generals.entry(id.to_string()).or_default();
            record.encountered = true;
            if input.event.is_rejection() {
                record.rejected = true;
            }
            if input.event == TrackedEvent::DefeatedGeneral {
                record.defeated = true;
            }
        } else {
            tracing::warn!(target: "progression::villain", general_id = %id, "general.unknown");
        }
    }

    TrackedEventResult {
        resonance_change: player.empire_resonance - before_resonance,
        anchor_change: player.identity_anchor - before_anchor,
        sympathy_change,
    }
}

/// Fires each threshold flag once, plus the gray-zone flag on every tick
/// where both axes sit inside the band.
pub fn check_thresholds(player: &mut PlayerState) -> Vec<String> {
    let mut fired = Vec::new();
    for threshold in VILLAIN_THRESHOLDS {
        let value = match threshold.axis {
            ThresholdAxis::EmpireResonance => player.empire_resonance,
            ThresholdAxis::IdentityAnchor => player.identity_anchor,
        };
        if value >= f64::from(threshold.at) && player.villain.fired_thresholds.insert(threshold.flag.to_string()) {
            player.flags.insert(threshold.flag.to_string());
            fired.push(threshold.flag.to_string());
        }
    }

    let in_band = |value: f64| value >= GRAY_ZONE.0 && value <= GRAY_ZONE.1;
    if in_band(player.empire_resonance) && in_band(player.identity_anchor) {
        fired.push(GRAY_ZONE_FLAG.to_string());
    }
    fired
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissaryReveal {
    Hidden,
    SubtleHints,
    CrisisReveal,
    Recruitment,
}

impl EmissaryReveal {
    pub fn from_sympathy(sympathy: f64) -> Self {
        if sympathy < 20.0 {
            EmissaryReveal::Hidden
        } else if sympathy < 50.0 {
            EmissaryReveal::SubtleHints
        } else if sympathy < 80.0 {
            EmissaryReveal::CrisisReveal
        } else {
            EmissaryReveal::Recruitment
        }
    }

    pub fn choices(self) -> &'static [&'static str] {
        match self {
            EmissaryReveal::Hidden | EmissaryReveal::SubtleHints => &[],
            EmissaryReveal::CrisisReveal => &["confront them", "keep their secret", "turn them in"],
            EmissaryReveal::Recruitment => &["accept their offer", "refuse them", "feign interest"],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissaryContext {
    pub id: String,
    pub name: String,
    pub reveal: EmissaryReveal,
    pub choices: Vec<String>,
}

pub fn emissary_reveal(player: &PlayerState, id: &str) -> Option<EmissaryContext> {
    let Some(def) = emissary(id) else {
        tracing::warn!(target: "progression::villain", emissary_id = %id, "emissary.unknown");
        return None;
    };
    let sympathy = player.villain.emissary_sympathy.get(id).copied().unwrap_or(0.0);
    let reveal = EmissaryReveal::from_sympathy(sympathy);
    Some(EmissaryContext {
        id: def.id.to_string(),
        name: def.name.to_string(),
        reveal,
        choices: reveal.choices().iter().map(|c| c.to_string()).collect(),
    })
}

/// Applies a one-shot identity mutation. A second call for the same
/// mutation changes nothing.
pub fn apply_mutation(player: &mut PlayerState, mutation: IdentityMutation) -> TransitionResult {
    if player.villain.mutations.contains(&mutation) {
        return not_applied("mutation already applied");
    }
    match mutation {
        IdentityMutation::MirrorCrack => {
            if player.villain.generals_defeated() == 0 {
                return not_applied("no general has been defeated");
            }
            player.villain.questioned_value = Some(
                player
                    .identity
                    .current
                    .first()
                    .or_else(|| player.identity.seed.first())
                    .cloned()
                    .unwrap_or_else(|| "conviction".to_string()),
            );
        }
        IdentityMutation::Conversion => {
            if player.villain.allegiance != Allegiance::Independent {
                return not_applied("allegiance already decided");
            }
            if player.empire_resonance < CONVERSION_RESONANCE {
                return not_applied("empire resonance below conversion threshold");
            }
            player.villain.allegiance = Allegiance::Agent;
            player.villain.empire_route_unlocked = true;
        }
        IdentityMutation::Resistant => {
            let encountered: Vec<&GeneralRecord> =
                player.villain.generals.values().filter(|r| r.encountered).collect();
            if player.identity_anchor < RESISTANT_ANCHOR {
                return not_applied("identity anchor below resistant threshold");
            }
            if encountered.is_empty() || encountered.iter().any(|r| !r.rejected) {
                return not_applied("not every encountered general was rejected");
            }
            player.villain.coherence_floor = Some(RESISTANT_COHERENCE_FLOOR);
            player.coherence = player.coherence.max(RESISTANT_COHERENCE_FLOOR);
        }
    }
    player.villain.mutations.insert(mutation);
    tracing::info!(target: "progression::villain", mutation = ?mutation, "identity.mutation");
    TransitionResult::Applied
}

/// Agent to defector. Scars stay, the anchor is left untouched and the
/// next undefeated general takes up the hunt.
pub fn defect(player: &mut PlayerState) -> TransitionResult {
    if player.villain.allegiance != Allegiance::Agent {
        return not_applied("only an agent can defect");
    }
    player.villain.allegiance = Allegiance::Defector;
    player.empire_resonance = (player.empire_resonance - DEFECTOR_RESONANCE_COST).max(0.0);
    if let Some(skill) = player.unique_skill.as_mut() {
        skill.fracture = true;
    }
    let hunter = GENERALS
        .iter()
        .find(|def| {
            !player
                .villain
                .generals
                .get(def.id)
                .is_some_and(|record| record.defeated)
        })
        .map(|def| def.id);
    if let Some(id) = hunter {
        player.villain.generals.entry(id.to_string()).or_default().role = GeneralRole::Hunter;
        player.villain.hunter = Some(id.to_string());
    }
    player.flags.insert("defector".to_string());
    tracing::info!(target: "progression::villain", hunter = ?player.villain.hunter, "allegiance.defected");
    TransitionResult::Applied
}

fn not_applied(reason: &str) -> TransitionResult {
    TransitionResult::NotApplied {
        reason: reason.to_string(),
    }
}

/// Highest Veiled Will phase the current history supports.
pub fn veiled_will_target(player: &PlayerState, chapter: u32) -> u8 {
    let villain = &player.villain;
    let defeated = villain.generals_defeated();
    let all_encountered = GENERALS.iter().all(|def| {
        villain
            .generals
            .get(def.id)
            .is_some_and(|record| record.encountered)
    });
    if all_encountered && chapter >= 15 {
        3
    } else if defeated >= 2 && player.empire_resonance + player.identity_anchor >= 80.0 {
        2
    } else if defeated >= 1 || player.tower_floor >= 3 {
        1
    } else {
        0
    }
}

/// Raises the phase when history supports it. Returns the new phase on change.
pub fn advance_veiled_will(player: &mut PlayerState, chapter: u32) -> Option<u8> {
    let target = veiled_will_target(player, chapter);
    if target <= player.villain.veiled_will_phase {
        return None;
    }
    player.villain.veiled_will_phase = target;
    tracing::info!(target: "progression::villain", phase = target, "veiled_will.advanced");
    Some(target)
}

pub fn current_anomaly_seeds(player: &PlayerState) -> Vec<String> {
    anomaly_seeds(player.villain.veiled_will_phase)
        .iter()
        .map(|seed| seed.to_string())
        .collect()
}
