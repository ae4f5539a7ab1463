use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::data::archons::ArchonKey;
use crate::data::villains::Archetype;
use crate::rules::principle::Principle;
use crate::rules::resonance::{MasteryState, ResonanceState};
use crate::rules::stability::StabilityTier;
use crate::simulation::unique_skill::{UniqueSkill, UniqueSkillGrowthState};
use crate::simulation::villain::VillainState;
use crate::simulation::weapon::{CrystalKind, PlayerWeaponSlots};

pub const SCALAR_MAX: f64 = 100.0;
pub const ALIGNMENT_MIN: f64 = -100.0;
pub const ALIGNMENT_MAX: f64 = 100.0;

/// A catalog skill the player owns, with the player's own narrative skin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalSkill {
    pub catalog_id: String,
    #[serde(default)]
    pub skin: String,
    pub principle: Principle,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityTraits {
    pub seed: Vec<String>,
    pub current: Vec<String>,
    pub latent: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefeatTier {
    Scar,
    Fracture,
    BreakingPoint,
    SoulDeath,
}

impl DefeatTier {
    pub fn for_defeat_count(count: u32) -> Self {
        match count {
            0 | 1 => DefeatTier::Scar,
            2 => DefeatTier::Fracture,
            3 => DefeatTier::BreakingPoint,
            _ => DefeatTier::SoulDeath,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScarRecord {
    pub chapter: u32,
    pub tier: DefeatTier,
}

/// The whole persisted player record. Scalars sit flat on the record; the
/// resonance map, weapons and unique skill are nested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerState {
    pub name: String,
    pub chapter: u32,
    pub tower_floor: u8,
    pub archetype: Option<Archetype>,

    pub hp: f64,
    pub hp_max: f64,
    pub stability: f64,
    pub recovery_rate: f64,
    pub skill_effectiveness: f64,

    pub coherence: f64,
    pub instability: f64,
    pub dqs: f64,
    pub breakthrough: f64,
    pub notoriety: f64,
    pub alignment: f64,
    pub fate_buffer: f64,
    pub identity_anchor: f64,
    pub empire_resonance: f64,

    pub defeat_count: u32,
    pub scars: Vec<ScarRecord>,
    pub soul_dead: bool,
    pub past_climax: bool,

    pub principle_resonance: ResonanceState,
    pub mastery: MasteryState,
    pub unique_skill: Option<UniqueSkill>,
    pub unique_skill_growth: Option<UniqueSkillGrowthState>,
    pub equipped_weapons: PlayerWeaponSlots,
    pub owned_skills: Vec<NormalSkill>,
    pub equipped_skills: Vec<String>,
    pub archon_affinity: BTreeMap<ArchonKey, u32>,
    pub identity: IdentityTraits,
    pub flags: BTreeSet<String>,
    pub crystals: BTreeMap<CrystalKind, u32>,
    pub villain: VillainState,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            name: String::new(),
            chapter: 0,
            tower_floor: 1,
            archetype: None,
            hp: 100.0,
            hp_max: 100.0,
            stability: 100.0,
            recovery_rate: 1.0,
            skill_effectiveness: 1.0,
            coherence: 50.0,
            instability: 0.0,
            dqs: 50.0,
            breakthrough: 0.0,
            notoriety: 0.0,
            alignment: 0.0,
            fate_buffer: 0.0,
            identity_anchor: 0.0,
            empire_resonance: 0.0,
            defeat_count: 0,
            scars: Vec::new(),
            soul_dead: false,
            past_climax: false,
            principle_resonance: ResonanceState::default(),
            mastery: MasteryState::default(),
            unique_skill: None,
            unique_skill_growth: None,
            equipped_weapons: PlayerWeaponSlots::default(),
            owned_skills: Vec::new(),
            equipped_skills: Vec::new(),
            archon_affinity: BTreeMap::new(),
            identity: IdentityTraits::default(),
            flags: BTreeSet::new(),
            crystals: BTreeMap::new(),
            villain: VillainState::default(),
        }
    }
}

/// Combat-facing view of the record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CombatMetrics {
    pub hp: f64,
    pub hp_max: f64,
    pub stability: f64,
    pub instability: f64,
    pub dqs: f64,
    pub breakthrough: f64,
}

impl CombatMetrics {
    pub fn stability_tier(&self) -> StabilityTier {
        StabilityTier::from_stability(self.stability)
    }

    pub fn hp_ratio(&self) -> f64 {
        if self.hp_max <= 0.0 {
            0.0
        } else {
            self.hp / self.hp_max
        }
    }
}

impl PlayerState {
    pub fn combat_metrics(&self) -> CombatMetrics {
        CombatMetrics {
            hp: self.hp,
            hp_max: self.hp_max,
            stability: self.stability,
            instability: self.instability,
            dqs: self.dqs,
            breakthrough: self.breakthrough,
        }
    }

    pub fn dominant_principle(&self) -> Principle {
        self.principle_resonance.dominant()
    }

    pub fn owned_skill(&self, key: &str) -> Option<&NormalSkill> {
        self.owned_skills
            .iter()
            .find(|skill| skill.catalog_id == key || (!skill.skin.is_empty() && skill.skin == key))
    }

    /// Removes a normal skill from both the loadout and the owned list.
    pub fn consume_skill(&mut self, key: &str) {
        let matches = |skill: &NormalSkill| {
            skill.catalog_id == key || (!skill.skin.is_empty() && skill.skin == key)
        };
        let aliases: Vec<String> = self
            .owned_skills
            .iter()
            .filter(|skill| matches(skill))
            .flat_map(|skill| [skill.catalog_id.clone(), skill.skin.clone()])
            .filter(|id| !id.is_empty())
            .collect();
        self.owned_skills.retain(|skill| !matches(skill));
        self.equipped_skills
            .retain(|id| id != key && !aliases.contains(id));
    }

    /// Re-clamps every scalar into its declared range.
    pub fn clamp_scalars(&mut self) {
        self.hp_max = self.hp_max.clamp(1.0, SCALAR_MAX);
        self.hp = self.hp.clamp(0.0, self.hp_max);
        self.stability = self.stability.clamp(0.0, SCALAR_MAX);
        self.recovery_rate = self.recovery_rate.clamp(0.0, 1.0);
        self.skill_effectiveness = self.skill_effectiveness.clamp(0.0, 1.0);
        for value in [
            &mut self.coherence,
            &mut self.instability,
            &mut self.dqs,
            &mut self.breakthrough,
            &mut self.notoriety,
            &mut self.fate_buffer,
            &mut self.identity_anchor,
            &mut self.empire_resonance,
        ] {
            *value = value.clamp(0.0, SCALAR_MAX);
        }
        self.alignment = self.alignment.clamp(ALIGNMENT_MIN, ALIGNMENT_MAX);
        if let Some(floor) = self.villain.coherence_floor {
            self.coherence = self.coherence.max(floor.min(SCALAR_MAX));
        }
    }
}
