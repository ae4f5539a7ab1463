use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::rules::principle::{Principle, PrinciplePair, ALL_PAIRS, ALL_PRINCIPLES};
use crate::rules::stability::CombatOutcome;

pub const BASE_RESONANCE_FLOOR: f64 = 0.10;
pub const DUAL_MASTERY_FLOOR_BONUS: f64 = 0.05;
pub const DECAY_PER_COMBAT: f64 = 0.005;
pub const MAX_PERSONAL_CAP_BONUS: f64 = 0.30;

const STABILITY_TRIAL_COMBATS: u32 = 5;
const STABILITY_TRIAL_MIN_RESONANCE: f64 = 0.2;
const STABILITY_TRIAL_BONUS: f64 = 0.1;
const STABILITY_TRIAL_MAX: u32 = 3;
const FLOOR_ATTUNEMENT_BONUS: f64 = 0.10;
const OVERDRIVE_STREAK_TARGET: u32 = 3;
const OVERDRIVE_RISK_STEP: f64 = 0.05;
const OVERDRIVE_GRANTS_MAX: u32 = 2;
const DUAL_MASTERY_THRESHOLD: f64 = 0.5;
const DUAL_MASTERY_MAX_PAIRS: usize = 2;

/// Per-principle mastery values in [0,1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResonanceState(pub BTreeMap<Principle, f64>);

impl Default for ResonanceState {
    fn default() -> Self {
        Self(
            ALL_PRINCIPLES
                .iter()
                .map(|p| (*p, BASE_RESONANCE_FLOOR))
                .collect(),
        )
    }
}

impl ResonanceState {
    pub fn get(&self, principle: Principle) -> f64 {
        self.0.get(&principle).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, principle: Principle, value: f64) {
        self.0.insert(principle, value.clamp(0.0, 1.0));
    }

    /// Argmax of the map; ties resolve to the first principle in canonical order.
    pub fn dominant(&self) -> Principle {
        let mut best = Principle::Order;
        let mut best_value = f64::MIN;
        for principle in ALL_PRINCIPLES {
            let value = self.get(principle);
            if value > best_value {
                best = principle;
                best_value = value;
            }
        }
        best
    }
}

pub fn floor_cap(floor: u8) -> f64 {
    match floor {
        0 | 1 => 0.50,
        2 => 0.70,
        3 => 0.85,
        4 => 0.95,
        _ => 1.00,
    }
}

/// Ceiling for the principle used in combat.
pub fn used_principle_cap(floor: u8, personal_cap_bonus: f64) -> f64 {
    (floor_cap(floor) + personal_cap_bonus.clamp(0.0, MAX_PERSONAL_CAP_BONUS)).min(1.0)
}

pub fn outcome_growth(outcome: CombatOutcome) -> f64 {
    match outcome {
        CombatOutcome::Favorable => 0.03,
        CombatOutcome::Mixed => 0.02,
        CombatOutcome::Unfavorable => 0.01,
    }
}

pub fn update_after_combat(
    resonance: &ResonanceState,
    used_principle: Principle,
    outcome: CombatOutcome,
    floor: u8,
    personal_cap_bonus: f64,
) -> ResonanceState {
    apply_growth_and_decay(
        resonance,
        used_principle,
        outcome,
        floor,
        personal_cap_bonus,
        &BTreeSet::new(),
    )
}

/// Same as [`update_after_combat`] but honours the cap bonus and raised decay
/// floors earned through mastery milestones.
pub fn update_after_combat_mastered(
    resonance: &ResonanceState,
    used_principle: Principle,
    outcome: CombatOutcome,
    floor: u8,
    mastery: &MasteryState,
) -> ResonanceState {
    apply_growth_and_decay(
        resonance,
        used_principle,
        outcome,
        floor,
        mastery.personal_cap_bonus,
        &mastery.dual_mastery_pairs,
    )
}

fn apply_growth_and_decay(
    resonance: &ResonanceState,
    used_principle: Principle,
    outcome: CombatOutcome,
    floor: u8,
    personal_cap_bonus: f64,
    raised_pairs: &BTreeSet<PrinciplePair>,
) -> ResonanceState {
    let mut next = resonance.clone();
    let cap = used_principle_cap(floor, personal_cap_bonus);
    for principle in ALL_PRINCIPLES {
        let current = resonance.get(principle);
        if principle == used_principle {
            next.set(principle, (current + outcome_growth(outcome)).min(cap));
            continue;
        }
        let decay_floor = decay_floor(principle, raised_pairs);
        if current > decay_floor {
            next.set(principle, (current - DECAY_PER_COMBAT).max(decay_floor));
        }
    }
    next
}

pub fn decay_floor(principle: Principle, raised_pairs: &BTreeSet<PrinciplePair>) -> f64 {
    if raised_pairs.contains(&principle.pair()) {
        BASE_RESONANCE_FLOOR + DUAL_MASTERY_FLOOR_BONUS
    } else {
        BASE_RESONANCE_FLOOR
    }
}

/// Qualitative label for writer-facing context.
pub fn to_prose_bucket(value: f64) -> &'static str {
    if value < 0.2 {
        "dormant"
    } else if value < 0.4 {
        "stirring"
    } else if value < 0.6 {
        "attuned"
    } else if value < 0.8 {
        "resonant"
    } else {
        "sovereign"
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialProgress {
    pub count: u32,
    pub left_used: bool,
    pub right_used: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasteryState {
    pub trial_progress: BTreeMap<PrinciplePair, TrialProgress>,
    pub stability_trials_completed: u32,
    pub personal_cap_bonus: f64,
    pub floor_attunements: Vec<u8>,
    pub overdrive_streak: u32,
    pub overdrive_grants: u32,
    pub overdrive_risk_reduction: f64,
    pub dual_mastery_pairs: BTreeSet<PrinciplePair>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverdriveResult {
    NotUsed,
    Clean,
    Misfired,
}

/// One resolved combat phase as seen by the mastery tracker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CombatLogEntry {
    pub principle: Principle,
    pub backlash: bool,
    pub overdrive: OverdriveResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "milestone", rename_all = "snake_case")]
pub enum MasteryMilestone {
    StabilityTrial { pair: PrinciplePair, personal_cap_bonus: f64 },
    FloorAttunement { floor: u8, principle: Principle },
    OverdriveControl { risk_reduction: f64 },
    DualMastery { pair: PrinciplePair },
}

/// Advances every milestone counter from one combat's log and returns the
/// milestones that fired. Counters live on `mastery`; rewards that touch the
/// resonance map are applied by [`apply_milestone_rewards`].
pub fn check_mastery_milestones(
    mastery: &mut MasteryState,
    resonance: &ResonanceState,
    combat_log: &[CombatLogEntry],
    floor: u8,
    boss_cleared: bool,
    dominant_principle: Principle,
) -> Vec<MasteryMilestone> {
    let mut fired = Vec::new();

    advance_stability_trial(mastery, resonance, combat_log, &mut fired);
    for entry in combat_log {
        advance_overdrive_control(mastery, entry.overdrive, &mut fired);
    }

    if boss_cleared {
        if !mastery.floor_attunements.contains(&floor) {
            mastery.floor_attunements.push(floor);
            fired.push(MasteryMilestone::FloorAttunement {
                floor,
                principle: dominant_principle,
            });
        }

        for pair in ALL_PAIRS {
            if mastery.dual_mastery_pairs.len() >= DUAL_MASTERY_MAX_PAIRS {
                break;
            }
            if mastery.dual_mastery_pairs.contains(&pair) {
                continue;
            }
            let (left, right) = pair.sides();
            if resonance.get(left) >= DUAL_MASTERY_THRESHOLD
                && resonance.get(right) >= DUAL_MASTERY_THRESHOLD
            {
                mastery.dual_mastery_pairs.insert(pair);
                fired.push(MasteryMilestone::DualMastery { pair });
            }
        }
    }

    for milestone in &fired {
        tracing::info!(
            target: "progression::resonance",
            milestone = ?milestone,
            "mastery.milestone"
        );
    }
    fired
}

/// One combat is one trial step per opposing pair it touched, however many
/// phases it ran. A backlash in any phase costs every touched pair a step.
fn advance_stability_trial(
    mastery: &mut MasteryState,
    resonance: &ResonanceState,
    combat_log: &[CombatLogEntry],
    fired: &mut Vec<MasteryMilestone>,
) {
    let backlashed = combat_log.iter().any(|entry| entry.backlash);
    let mut touched: BTreeMap<PrinciplePair, (bool, bool)> = BTreeMap::new();
    for entry in combat_log {
        let pair = entry.principle.pair();
        let sides = touched.entry(pair).or_default();
        if entry.principle == pair.sides().0 {
            sides.0 = true;
        } else {
            sides.1 = true;
        }
    }

    for (pair, (left_used, right_used)) in touched {
        if mastery.stability_trials_completed >= STABILITY_TRIAL_MAX {
            return;
        }
        let (left, right) = pair.sides();
        if resonance.get(left) < STABILITY_TRIAL_MIN_RESONANCE
            || resonance.get(right) < STABILITY_TRIAL_MIN_RESONANCE
        {
            continue;
        }

        let progress = mastery.trial_progress.entry(pair).or_default();
        if backlashed {
            progress.count = progress.count.saturating_sub(1);
            continue;
        }
        progress.count += 1;
        progress.left_used |= left_used;
        progress.right_used |= right_used;

        if progress.count >= STABILITY_TRIAL_COMBATS && progress.left_used && progress.right_used {
            *progress = TrialProgress::default();
            mastery.stability_trials_completed += 1;
            mastery.personal_cap_bonus =
                (mastery.personal_cap_bonus + STABILITY_TRIAL_BONUS).min(MAX_PERSONAL_CAP_BONUS);
            fired.push(MasteryMilestone::StabilityTrial {
                pair,
                personal_cap_bonus: mastery.personal_cap_bonus,
            });
        }
    }
}

fn advance_overdrive_control(
    mastery: &mut MasteryState,
    overdrive: OverdriveResult,
    fired: &mut Vec<MasteryMilestone>,
) {
    match overdrive {
        OverdriveResult::NotUsed => {}
        OverdriveResult::Misfired => {
            mastery.overdrive_streak = mastery.overdrive_streak.saturating_sub(1);
        }
        OverdriveResult::Clean => {
            if mastery.overdrive_grants >= OVERDRIVE_GRANTS_MAX {
                return;
            }
            mastery.overdrive_streak += 1;
            if mastery.overdrive_streak >= OVERDRIVE_STREAK_TARGET {
                mastery.overdrive_streak = 0;
                mastery.overdrive_grants += 1;
                mastery.overdrive_risk_reduction =
                    OVERDRIVE_RISK_STEP * f64::from(mastery.overdrive_grants);
                fired.push(MasteryMilestone::OverdriveControl {
                    risk_reduction: mastery.overdrive_risk_reduction,
                });
            }
        }
    }
}

/// Applies the resonance-side rewards of fired milestones.
pub fn apply_milestone_rewards(
    resonance: &mut ResonanceState,
    mastery: &MasteryState,
    milestones: &[MasteryMilestone],
    floor: u8,
) {
    let cap = used_principle_cap(floor, mastery.personal_cap_bonus);
    for milestone in milestones {
        match milestone {
            MasteryMilestone::FloorAttunement { principle, .. } => {
                let current = resonance.get(*principle);
                resonance.set(*principle, (current + FLOOR_ATTUNEMENT_BONUS).min(cap.max(current)));
            }
            MasteryMilestone::DualMastery { pair } => {
                let (left, right) = pair.sides();
                for side in [left, right] {
                    let floor_value = BASE_RESONANCE_FLOOR + DUAL_MASTERY_FLOOR_BONUS;
                    if resonance.get(side) < floor_value {
                        resonance.set(side, floor_value);
                    }
                }
            }
            MasteryMilestone::StabilityTrial { .. } | MasteryMilestone::OverdriveControl { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn growth_respects_floor_cap() {
        let mut res = ResonanceState::default();
        res.set(Principle::Energy, 0.49);
        let next = update_after_combat(&res, Principle::Energy, CombatOutcome::Favorable, 1, 0.0);
        assert!(approx(next.get(Principle::Energy), 0.50));

        let next = update_after_combat(&res, Principle::Energy, CombatOutcome::Favorable, 1, 0.1);
        assert!(approx(next.get(Principle::Energy), 0.52));
    }

    #[test]
    fn unused_principles_decay_to_floor() {
        let mut res = ResonanceState::default();
        res.set(Principle::Void, 0.102);
        res.set(Principle::Order, 0.3);
        let next = update_after_combat(&res, Principle::Energy, CombatOutcome::Mixed, 2, 0.0);
        assert!(approx(next.get(Principle::Void), 0.10));
        assert!(approx(next.get(Principle::Order), 0.295));
        assert!(approx(next.get(Principle::Flux), 0.10));
    }

    #[test]
    fn stability_trial_counts_combats_not_phases() {
        let mut mastery = MasteryState::default();
        let mut res = ResonanceState::default();
        res.set(Principle::Energy, 0.3);
        res.set(Principle::Void, 0.3);
        let entry = |principle, backlash| CombatLogEntry {
            principle,
            backlash,
            overdrive: OverdriveResult::NotUsed,
        };

        let climax = vec![
            entry(Principle::Energy, false),
            entry(Principle::Void, false),
            entry(Principle::Energy, false),
            entry(Principle::Void, false),
        ];
        let fired = check_mastery_milestones(&mut mastery, &res, &climax, 1, false, Principle::Energy);
        assert!(fired.is_empty());
        let progress = &mastery.trial_progress[&PrinciplePair::EnergyVoid];
        assert_eq!(progress.count, 1);
        assert!(progress.left_used && progress.right_used);

        let one = vec![entry(Principle::Energy, false)];
        for _ in 0..2 {
            check_mastery_milestones(&mut mastery, &res, &one, 1, false, Principle::Energy);
        }
        let backlashed = vec![entry(Principle::Energy, false), entry(Principle::Energy, true)];
        check_mastery_milestones(&mut mastery, &res, &backlashed, 1, false, Principle::Energy);
        assert_eq!(mastery.trial_progress[&PrinciplePair::EnergyVoid].count, 2);

        for _ in 0..2 {
            let fired = check_mastery_milestones(&mut mastery, &res, &one, 1, false, Principle::Energy);
            assert!(fired.is_empty());
        }
        let fired = check_mastery_milestones(&mut mastery, &res, &one, 1, false, Principle::Energy);
        assert_eq!(fired.len(), 1);
        assert!(approx(mastery.personal_cap_bonus, 0.1));
    }

    #[test]
    fn stability_trial_never_counts_below_zero() {
        let mut mastery = MasteryState::default();
        let mut res = ResonanceState::default();
        res.set(Principle::Order, 0.25);
        res.set(Principle::Entropy, 0.25);
        let log = vec![CombatLogEntry {
            principle: Principle::Order,
            backlash: true,
            overdrive: OverdriveResult::NotUsed,
        }];
        check_mastery_milestones(&mut mastery, &res, &log, 1, false, Principle::Order);
        assert_eq!(mastery.trial_progress[&PrinciplePair::OrderEntropy].count, 0);
    }

    #[test]
    fn overdrive_control_caps_at_two_grants() {
        let mut mastery = MasteryState::default();
        let res = ResonanceState::default();
        let od = |overdrive| CombatLogEntry {
            principle: Principle::Flux,
            backlash: false,
            overdrive,
        };
        let log: Vec<_> = (0..12).map(|_| od(OverdriveResult::Clean)).collect();
        let fired = check_mastery_milestones(&mut mastery, &res, &log, 1, false, Principle::Flux);
        assert_eq!(fired.len(), 2);
        assert!(approx(mastery.overdrive_risk_reduction, 0.10));
    }

    #[test]
    fn misfire_decrements_overdrive_streak() {
        let mut mastery = MasteryState::default();
        let res = ResonanceState::default();
        let log = vec![
            CombatLogEntry {
                principle: Principle::Flux,
                backlash: false,
                overdrive: OverdriveResult::Clean,
            },
            CombatLogEntry {
                principle: Principle::Flux,
                backlash: false,
                overdrive: OverdriveResult::Clean,
            },
            CombatLogEntry {
                principle: Principle::Flux,
                backlash: false,
                overdrive: OverdriveResult::Misfired,
            },
        ];
        check_mastery_milestones(&mut mastery, &res, &log, 1, false, Principle::Flux);
        assert_eq!(mastery.overdrive_streak, 1);
    }

    #[test]
    fn boss_clear_attunes_once_and_grants_dual_mastery() {
        let mut mastery = MasteryState::default();
        let mut res = ResonanceState::default();
        res.set(Principle::Matter, 0.55);
        res.set(Principle::Flux, 0.5);
        let fired = check_mastery_milestones(&mut mastery, &res, &[], 3, true, Principle::Matter);
        assert_eq!(fired.len(), 2);
        apply_milestone_rewards(&mut res, &mastery, &fired, 3);
        assert!(approx(res.get(Principle::Matter), 0.65));

        let again = check_mastery_milestones(&mut mastery, &res, &[], 3, true, Principle::Matter);
        assert!(again.is_empty());
        assert!(approx(
            decay_floor(Principle::Flux, &mastery.dual_mastery_pairs),
            0.15
        ));
    }

    #[test]
    fn prose_buckets() {
        assert_eq!(to_prose_bucket(0.0), "dormant");
        assert_eq!(to_prose_bucket(0.45), "attuned");
        assert_eq!(to_prose_bucket(1.0), "sovereign");
    }
}
