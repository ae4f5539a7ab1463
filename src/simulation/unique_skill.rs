use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::principle::ParseEnumError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Perception,
    Manifestation,
    Manipulation,
    Contract,
    Obfuscation,
}

impl FromStr for SkillCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perception" => Ok(SkillCategory::Perception),
            "manifestation" => Ok(SkillCategory::Manifestation),
            "manipulation" => Ok(SkillCategory::Manipulation),
            "contract" => Ok(SkillCategory::Contract),
            "obfuscation" => Ok(SkillCategory::Obfuscation),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaknessType {
    SensoryTax,
    ResonanceDrain,
    Tethered,
    DelayedCast,
    EmotionalOverload,
    ConditionalTrigger,
    IdentityBleed,
}

impl FromStr for WeaknessType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sensory_tax" => Ok(WeaknessType::SensoryTax),
            "resonance_drain" => Ok(WeaknessType::ResonanceDrain),
            "tethered" => Ok(WeaknessType::Tethered),
            "delayed_cast" => Ok(WeaknessType::DelayedCast),
            "emotional_overload" => Ok(WeaknessType::EmotionalOverload),
            "conditional_trigger" => Ok(WeaknessType::ConditionalTrigger),
            "identity_bleed" => Ok(WeaknessType::IdentityBleed),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrowthStage {
    Seed,
    Bloom,
    Aspect,
    Ultimate,
}

impl GrowthStage {
    /// Default suppression resistance for a skill at this stage.
    pub fn default_resistance(self) -> f64 {
        match self {
            GrowthStage::Seed => 50.0,
            GrowthStage::Bloom => 65.0,
            GrowthStage::Aspect => 80.0,
            GrowthStage::Ultimate => 95.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GrowthStage::Seed => "seed",
            GrowthStage::Bloom => "bloom",
            GrowthStage::Aspect => "aspect",
            GrowthStage::Ultimate => "ultimate",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubSkillKind {
    Passive,
    Active,
    Reactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubSkill {
    pub name: String,
    pub kind: SubSkillKind,
    #[serde(default)]
    pub unlocked_at: Option<GrowthStage>,
}

/// State predicate gating the unique clause's power-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ClausePredicate {
    HpBelowRatio { ratio: f64 },
    StabilityBelow { value: f64 },
    InstabilityAtLeast { value: f64 },
    CoherenceAtLeast { value: f64 },
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClauseContext {
    pub hp_ratio: f64,
    pub stability: f64,
    pub instability: f64,
    pub coherence: f64,
}

impl ClausePredicate {
    pub fn holds(&self, ctx: &ClauseContext) -> bool {
        match *self {
            ClausePredicate::HpBelowRatio { ratio } => ctx.hp_ratio < ratio,
            ClausePredicate::StabilityBelow { value } => ctx.stability < value,
            ClausePredicate::InstabilityAtLeast { value } => ctx.instability >= value,
            ClausePredicate::CoherenceAtLeast { value } => ctx.coherence >= value,
            ClausePredicate::Always => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueClause {
    pub description: String,
    pub predicate: ClausePredicate,
}

impl Default for UniqueClause {
    fn default() -> Self {
        Self {
            description: String::new(),
            predicate: ClausePredicate::Always,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueSkill {
    pub name: String,
    pub category: SkillCategory,
    pub weakness_type: WeaknessType,
    #[serde(default)]
    pub domain_passive: String,
    pub axis_blind_spot: SkillCategory,
    #[serde(default = "seed_resistance")]
    pub suppression_resistance: f64,
    #[serde(default)]
    pub unique_clause: UniqueClause,
    #[serde(default)]
    pub sub_skills: Vec<SubSkill>,
    #[serde(default = "full_resilience")]
    pub resilience: f64,
    #[serde(default)]
    pub instability: f64,
    #[serde(default)]
    pub mutation_locked: bool,
    #[serde(default)]
    pub uses_this_chapter: u32,
    #[serde(default)]
    pub weakness_relaxed: bool,
    #[serde(default)]
    pub fracture: bool,
    #[serde(default)]
    pub ultimate_ability_used_season: Option<u32>,
}

fn seed_resistance() -> f64 {
    GrowthStage::Seed.default_resistance()
}

fn full_resilience() -> f64 {
    100.0
}

impl UniqueSkill {
    pub fn new(
        name: &str,
        category: SkillCategory,
        weakness_type: WeaknessType,
        axis_blind_spot: SkillCategory,
    ) -> Self {
        Self {
            name: name.to_string(),
            category,
            weakness_type,
            domain_passive: String::new(),
            axis_blind_spot,
            suppression_resistance: seed_resistance(),
            unique_clause: UniqueClause::default(),
            sub_skills: Vec::new(),
            resilience: full_resilience(),
            instability: 0.0,
            mutation_locked: false,
            uses_this_chapter: 0,
            weakness_relaxed: false,
            fracture: false,
            ultimate_ability_used_season: None,
        }
    }

    pub fn combat_sub_skill_count(&self) -> usize {
        self.sub_skills
            .iter()
            .filter(|sub| sub.kind != SubSkillKind::Passive)
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BloomPath {
    Echo,
    Scar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraumaSeverity {
    Wound,
    Break,
    Shatter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScarType {
    Hardened,
    Vigilant,
    Defiant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraumaEntry {
    pub chapter: u32,
    pub severity: TraumaSeverity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniqueSkillGrowthState {
    pub current_stage: GrowthStage,
    pub bloom_path: Option<BloomPath>,
    pub bloom_completed: bool,
    pub bloom_chapter: Option<u32>,
    pub echo_coherence_streak: u32,
    pub low_coherence_streak: u32,
    pub trauma_log: Vec<TraumaEntry>,
    pub scar_adaptation: f64,
    pub scar_type: Option<ScarType>,
    pub aspect_beat: u8,
    pub aspect_choice: Option<String>,
    pub aspect_deferred_at: Option<u32>,
    pub aspect_forged: bool,
    pub ultimate_beat: u8,
    pub ultimate_form: Option<String>,
    pub ultimate_forged: bool,
    pub absorbed_skill: Option<String>,
    pub echo_can_lose: bool,
}

impl Default for UniqueSkillGrowthState {
    fn default() -> Self {
        Self {
            current_stage: GrowthStage::Seed,
            bloom_path: None,
            bloom_completed: false,
            bloom_chapter: None,
            echo_coherence_streak: 0,
            low_coherence_streak: 0,
            trauma_log: Vec::new(),
            scar_adaptation: 0.0,
            scar_type: None,
            aspect_beat: 0,
            aspect_choice: None,
            aspect_deferred_at: None,
            aspect_forged: false,
            ultimate_beat: 0,
            ultimate_form: None,
            ultimate_forged: false,
            absorbed_skill: None,
            echo_can_lose: true,
        }
    }
}
