use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::data::archons::{
    archon_fragment, awakened_passive, ArchonKey, ArchonScalar, DivineAbility,
};
use crate::data::config::WeaponConfig;
use crate::rules::principle::{ParseEnumError, Principle};
use crate::rules::suppression::SuppressionLevel;
use crate::simulation::identity::IdentityDelta;
use crate::simulation::unique_skill::GrowthStage;

pub const BOND_CAP: f64 = 100.0;
pub const AWAKENED_BOND_CAP: f64 = 150.0;
pub const SOUL_LINK_BOND: f64 = 80.0;
pub const AWAKEN_BOND: f64 = 85.0;
pub const V2_BOND: f64 = 101.0;
pub const MAX_LORE_FRAGMENTS: u8 = 5;
const BUILD_FIT_RAW_CAP: f64 = 0.20;
const BUILD_FIT_EFFECTIVE_CAP: f64 = 0.10;
const SHARD_RESONANCE_BONUS: f64 = 0.02;
const RESONANCE_BURST_BONUS: f64 = 0.03;
const CHAPTERS_PER_SEASON: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponGrade {
    Mundane,
    Resonant,
    SoulLinked,
    Awakened,
    ArchonFragment,
}

impl WeaponGrade {
    pub fn combat_bonus(self) -> f64 {
        match self {
            WeaponGrade::Mundane => 0.0,
            WeaponGrade::Resonant => 0.03,
            WeaponGrade::SoulLinked => 0.06,
            WeaponGrade::Awakened => 0.10,
            WeaponGrade::ArchonFragment => 0.14,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            WeaponGrade::Mundane => "mundane",
            WeaponGrade::Resonant => "resonant",
            WeaponGrade::SoulLinked => "soul-linked",
            WeaponGrade::Awakened => "awakened",
            WeaponGrade::ArchonFragment => "archon fragment",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImbuedCore {
    Shard,
    Core,
    Heart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrystalKind {
    TrueCrystal,
    SovereignCrystal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BondEvent {
    CombatEncounter,
    NearDeath,
    NarrativeReference,
    TheftAttemptFailed,
    SoulChoice,
    TurningPoint,
}

impl BondEvent {
    pub fn delta(self) -> f64 {
        match self {
            BondEvent::CombatEncounter => 4.0,
            BondEvent::NearDeath => 8.0,
            BondEvent::NarrativeReference => 5.0,
            BondEvent::TheftAttemptFailed => 4.0,
            BondEvent::SoulChoice => 6.0,
            BondEvent::TurningPoint => 10.0,
        }
    }
}

impl FromStr for BondEvent {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combat_encounter" => Ok(BondEvent::CombatEncounter),
            "near_death" => Ok(BondEvent::NearDeath),
            "narrative_reference" => Ok(BondEvent::NarrativeReference),
            "theft_attempt_failed" => Ok(BondEvent::TheftAttemptFailed),
            "soul_choice" => Ok(BondEvent::SoulChoice),
            "turning_point" => Ok(BondEvent::TurningPoint),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

/// Name and description of an earlier signature tier, kept so the next
/// generation request can chain from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureContext {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureMove {
    pub name: String,
    pub description: String,
    pub evolution_tier: u8,
    #[serde(default)]
    pub v1: Option<SignatureContext>,
    #[serde(default)]
    pub v2: Option<SignatureContext>,
}

pub fn signature_bonus(tier: u8) -> f64 {
    match tier {
        0 => 0.0,
        1 => 0.05,
        2 => 0.07,
        _ => 0.10,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weapon {
    pub name: String,
    pub grade: WeaponGrade,
    pub principles: Vec<Principle>,
    pub bond_score: f64,
    pub imbued_core: Option<ImbuedCore>,
    pub shard_count: u32,
    pub shard_principle: Option<Principle>,
    pub signature_move: Option<SignatureMove>,
    pub awakened_passive: Option<String>,
    pub is_archon_fragment: bool,
    pub archon_source: Option<ArchonKey>,
    pub divine_used_season: Option<u32>,
    pub lore_fragments_revealed: u8,
    pub last_used_chapter: u32,
    pub soul_link_pending: bool,
    pub awaken_pending: bool,
}

impl Default for Weapon {
    fn default() -> Self {
        Self {
            name: String::new(),
            grade: WeaponGrade::Mundane,
            principles: Vec::new(),
            bond_score: 0.0,
            imbued_core: None,
            shard_count: 0,
            shard_principle: None,
            signature_move: None,
            awakened_passive: None,
            is_archon_fragment: false,
            archon_source: None,
            divine_used_season: None,
            lore_fragments_revealed: 0,
            last_used_chapter: 0,
            soul_link_pending: false,
            awaken_pending: false,
        }
    }
}

impl Weapon {
    pub fn new(name: &str, grade: WeaponGrade, principles: &[Principle]) -> Self {
        Self {
            name: name.to_string(),
            grade,
            principles: principles.iter().copied().take(3).collect(),
            ..Self::default()
        }
    }

    pub fn primary_principle(&self) -> Option<Principle> {
        self.principles.first().copied()
    }

    pub fn is_soul_linked(&self) -> bool {
        self.grade >= WeaponGrade::SoulLinked
    }

    pub fn bond_cap(&self) -> f64 {
        if self.grade >= WeaponGrade::Awakened {
            AWAKENED_BOND_CAP
        } else {
            BOND_CAP
        }
    }

    pub fn signature_tier(&self) -> u8 {
        self.signature_move
            .as_ref()
            .map(|sig| sig.evolution_tier)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerWeaponSlots {
    pub primary: Option<Weapon>,
    pub secondary: Option<Weapon>,
    pub utility: Option<Weapon>,
}

impl PlayerWeaponSlots {
    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut Weapon> {
        [&mut self.primary, &mut self.secondary, &mut self.utility]
            .into_iter()
            .filter_map(|slot| slot.as_mut())
    }
}

/// Outcome of a grade or signature transition that may be refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransitionResult {
    Applied,
    NotApplied { reason: String },
}

impl TransitionResult {
    fn refused(reason: &str) -> Self {
        TransitionResult::NotApplied {
            reason: reason.to_string(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionResult::Applied)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BondUpdate {
    pub delta: f64,
    pub bond_score: f64,
    pub soul_link_pending: bool,
    pub awaken_pending: bool,
}

pub fn apply_bond_event(weapon: &mut Weapon, event: BondEvent) -> BondUpdate {
    let before = weapon.bond_score;
    weapon.bond_score = (weapon.bond_score + event.delta()).clamp(0.0, weapon.bond_cap());
    refresh_pending(weapon);
    BondUpdate {
        delta: weapon.bond_score - before,
        bond_score: weapon.bond_score,
        soul_link_pending: weapon.soul_link_pending,
        awaken_pending: weapon.awaken_pending,
    }
}

fn refresh_pending(weapon: &mut Weapon) {
    weapon.soul_link_pending =
        weapon.grade == WeaponGrade::Resonant && weapon.bond_score >= SOUL_LINK_BOND;
    weapon.awaken_pending =
        weapon.grade == WeaponGrade::SoulLinked && weapon.bond_score >= AWAKEN_BOND;
}

/// Per-chapter decay: idle weapons and principle-misaligned weapons lose bond.
pub fn decay_bond(weapon: &mut Weapon, chapter: u32, dominant: Principle, config: &WeaponConfig) -> f64 {
    let before = weapon.bond_score;
    if chapter.saturating_sub(weapon.last_used_chapter) > config.idle_grace_chapters {
        weapon.bond_score -= config.idle_decay;
    }
    let aligned = weapon.principles.is_empty()
        || weapon
            .principles
            .iter()
            .any(|p| *p == dominant || p.is_adjacent(dominant));
    if !aligned {
        weapon.bond_score -= config.misalignment_decay;
    }
    weapon.bond_score = weapon.bond_score.max(0.0);
    refresh_pending(weapon);
    weapon.bond_score - before
}

pub fn apply_soul_link(weapon: &mut Weapon) -> TransitionResult {
    if weapon.grade != WeaponGrade::Resonant {
        return TransitionResult::refused("soul-link requires a resonant weapon");
    }
    if weapon.bond_score < SOUL_LINK_BOND {
        return TransitionResult::refused("bond below soul-link threshold");
    }
    weapon.grade = WeaponGrade::SoulLinked;
    refresh_pending(weapon);
    tracing::info!(target: "progression::weapon", weapon = %weapon.name, "weapon.soul_linked");
    TransitionResult::Applied
}

/// Awakens a soul-linked weapon and assigns its same-cluster passive. The
/// caller then generates the v1 signature via [`signature_request`].
pub fn apply_awakening(weapon: &mut Weapon) -> TransitionResult {
    if weapon.grade != WeaponGrade::SoulLinked {
        return TransitionResult::refused("awakening requires a soul-linked weapon");
    }
    if weapon.bond_score < AWAKEN_BOND {
        return TransitionResult::refused("bond below awakening threshold");
    }
    weapon.grade = WeaponGrade::Awakened;
    weapon.awakened_passive = match weapon.principles.as_slice() {
        [a, b, ..] => awakened_passive(*a, *b).map(str::to_string),
        _ => None,
    };
    refresh_pending(weapon);
    tracing::info!(
        target: "progression::weapon",
        weapon = %weapon.name,
        passive = ?weapon.awakened_passive,
        "weapon.awakened"
    );
    TransitionResult::Applied
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildFit {
    pub grade: f64,
    pub synergy: f64,
    pub shard: f64,
    pub signature: f64,
    pub burst: f64,
    pub raw: f64,
    pub effective: f64,
}

impl BuildFit {
    pub fn zero() -> Self {
        Self {
            grade: 0.0,
            synergy: 0.0,
            shard: 0.0,
            signature: 0.0,
            burst: 0.0,
            raw: 0.0,
            effective: 0.0,
        }
    }
}

pub fn shard_resonance_bonus(weapon: &Weapon) -> f64 {
    match (weapon.shard_principle, weapon.primary_principle()) {
        (Some(shard), Some(primary)) if weapon.shard_count >= 3 && shard == primary => {
            SHARD_RESONANCE_BONUS
        }
        _ => 0.0,
    }
}

/// Grade, principle synergy, shard resonance and the signature move share one
/// capped layer; only `effective` reaches the combat score.
pub fn build_fit(weapon: Option<&Weapon>, used: Principle, unique_used_this_chapter: bool) -> BuildFit {
    let Some(weapon) = weapon else {
        return BuildFit::zero();
    };
    let grade = weapon.grade.combat_bonus();
    let synergy = if weapon.principles.contains(&used) {
        0.04
    } else if weapon.principles.iter().any(|p| p.is_adjacent(used)) {
        0.02
    } else {
        0.0
    };
    let shard = shard_resonance_bonus(weapon);
    let signature = signature_bonus(weapon.signature_tier());
    let burst = if weapon.signature_tier() >= 3 && unique_used_this_chapter {
        RESONANCE_BURST_BONUS
    } else {
        0.0
    };
    let raw = (grade + synergy + shard + signature + burst).min(BUILD_FIT_RAW_CAP);
    BuildFit {
        grade,
        synergy,
        shard,
        signature,
        burst,
        raw,
        effective: raw.min(BUILD_FIT_EFFECTIVE_CAP),
    }
}

/// Everything the external generator needs to write the next signature tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureRequest {
    pub weapon_name: String,
    pub target_tier: u8,
    pub crystal: Option<CrystalKind>,
    pub chained: Vec<SignatureContext>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvolutionGate {
    pub soul_choice_this_chapter: bool,
    pub unique_stage: Option<GrowthStage>,
    pub past_climax: bool,
}

/// Works out whether the weapon is ready for its next signature tier.
pub fn signature_request(
    weapon: &Weapon,
    crystals: &BTreeMap<CrystalKind, u32>,
    gate: &EvolutionGate,
    config: &WeaponConfig,
) -> Option<SignatureRequest> {
    let has = |kind: CrystalKind| crystals.get(&kind).copied().unwrap_or(0) > 0;
    let tier = weapon.signature_tier();
    let (target_tier, crystal) = match tier {
        0 if weapon.grade >= WeaponGrade::Awakened => (1, None),
        1 if weapon.bond_score >= V2_BOND && gate.soul_choice_this_chapter => {
            if has(CrystalKind::TrueCrystal) {
                (2, Some(CrystalKind::TrueCrystal))
            } else if has(CrystalKind::SovereignCrystal) {
                (2, Some(CrystalKind::SovereignCrystal))
            } else {
                return None;
            }
        }
        2 if weapon.bond_score >= config.v3_bond
            && has(CrystalKind::SovereignCrystal)
            && gate.unique_stage.is_some_and(|stage| stage >= GrowthStage::Aspect)
            && gate.past_climax =>
        {
            (3, Some(CrystalKind::SovereignCrystal))
        }
        _ => return None,
    };

    let mut chained = Vec::new();
    if let Some(sig) = weapon.signature_move.as_ref() {
        if target_tier == 3 {
            chained.extend(sig.v1.clone());
        }
        chained.push(SignatureContext {
            name: sig.name.clone(),
            description: sig.description.clone(),
        });
    }

    Some(SignatureRequest {
        weapon_name: weapon.name.clone(),
        target_tier,
        crystal,
        chained,
    })
}

/// Installs a generated signature tier, consuming the request's crystal.
pub fn apply_signature(
    weapon: &mut Weapon,
    crystals: &mut BTreeMap<CrystalKind, u32>,
    request: &SignatureRequest,
    name: &str,
    description: &str,
) -> TransitionResult {
    if request.target_tier != weapon.signature_tier() + 1 {
        return TransitionResult::refused("signature tier out of sequence");
    }
    if let Some(kind) = request.crystal {
        match crystals.get_mut(&kind) {
            Some(count) if *count > 0 => *count -= 1,
            _ => return TransitionResult::refused("required crystal missing"),
        }
    }

    let previous = weapon.signature_move.take();
    let (v1, v2) = match (request.target_tier, previous) {
        (1, _) => (None, None),
        (2, Some(prev)) => (
            Some(SignatureContext {
                name: prev.name,
                description: prev.description,
            }),
            None,
        ),
        (_, Some(prev)) => (
            prev.v1,
            Some(SignatureContext {
                name: prev.name,
                description: prev.description,
            }),
        ),
        (_, None) => (None, None),
    };
    weapon.signature_move = Some(SignatureMove {
        name: name.to_string(),
        description: description.to_string(),
        evolution_tier: request.target_tier,
        v1,
        v2,
    });
    tracing::info!(
        target: "progression::weapon",
        weapon = %weapon.name,
        tier = request.target_tier,
        "signature.evolved"
    );
    TransitionResult::Applied
}

pub fn season_for(total_chapters: u32) -> u32 {
    total_chapters.div_ceil(CHAPTERS_PER_SEASON).max(1)
}

/// Spends the fragment's divine ability for the current season.
pub fn use_divine_ability(
    weapon: &mut Weapon,
    total_chapters: u32,
    suppression: SuppressionLevel,
) -> Option<DivineAbility> {
    if !weapon.is_archon_fragment || suppression.blocks_ultimate() {
        return None;
    }
    let source = weapon.archon_source?;
    let season = season_for(total_chapters);
    if weapon.divine_used_season == Some(season) {
        return None;
    }
    weapon.divine_used_season = Some(season);
    Some(archon_fragment(source).divine_ability)
}

pub fn reveal_lore(weapon: &mut Weapon, signal: Option<ArchonKey>) -> bool {
    if !weapon.is_archon_fragment || signal.is_none() || weapon.archon_source != signal {
        return false;
    }
    if weapon.lore_fragments_revealed >= MAX_LORE_FRAGMENTS {
        return false;
    }
    weapon.lore_fragments_revealed += 1;
    true
}

/// Files one chapter's identity delta under at most one archon.
pub fn classify_archon_signal(delta: &IdentityDelta) -> Option<ArchonKey> {
    if delta.alignment_change < 0.0 {
        Some(ArchonKey::Vyrel)
    } else if delta.breakthrough_change > 0.0 {
        Some(ArchonKey::Kaelith)
    } else if delta.instability_change >= 3.0 {
        Some(ArchonKey::Morrath)
    } else if delta.coherence_change >= 2.0 {
        Some(ArchonKey::Aurion)
    } else if delta.notoriety_change > 0.0 {
        Some(ArchonKey::Seraphel)
    } else {
        None
    }
}

/// Snapshot of the identity scalars the archon conditions read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchonReadings {
    pub alignment: f64,
    pub coherence: f64,
    pub breakthrough: f64,
    pub instability: f64,
    pub notoriety: f64,
}

pub fn archon_ready(affinity: &BTreeMap<ArchonKey, u32>, readings: &ArchonReadings) -> Option<ArchonKey> {
    affinity.iter().find_map(|(key, count)| {
        let def = archon_fragment(*key);
        if *count < def.min_affinity {
            return None;
        }
        let value = match def.condition.scalar {
            ArchonScalar::Alignment => readings.alignment,
            ArchonScalar::Coherence => readings.coherence,
            ArchonScalar::Breakthrough => readings.breakthrough,
            ArchonScalar::Instability => readings.instability,
            ArchonScalar::Notoriety => readings.notoriety,
        };
        let below = def.condition.at_most.map_or(true, |max| value <= max);
        let above = def.condition.at_least.map_or(true, |min| value >= min);
        (below && above).then_some(*key)
    })
}

pub fn forge_archon_fragment(key: ArchonKey) -> Weapon {
    let def = archon_fragment(key);
    tracing::info!(target: "progression::weapon", archon = ?key, "archon.fragment_forged");
    Weapon {
        name: def.weapon_name.to_string(),
        grade: WeaponGrade::ArchonFragment,
        principles: vec![def.principle],
        bond_score: SOUL_LINK_BOND,
        is_archon_fragment: true,
        archon_source: Some(key),
        ..Weapon::default()
    }
}
