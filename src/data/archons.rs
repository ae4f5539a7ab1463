use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::principle::{ParseEnumError, Principle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchonKey {
    Vyrel,
    Aurion,
    Kaelith,
    Morrath,
    Seraphel,
}

pub const ALL_ARCHONS: [ArchonKey; 5] = [
    ArchonKey::Vyrel,
    ArchonKey::Aurion,
    ArchonKey::Kaelith,
    ArchonKey::Morrath,
    ArchonKey::Seraphel,
];

impl ArchonKey {
    pub fn as_str(self) -> &'static str {
        match self {
            ArchonKey::Vyrel => "vyrel",
            ArchonKey::Aurion => "aurion",
            ArchonKey::Kaelith => "kaelith",
            ArchonKey::Morrath => "morrath",
            ArchonKey::Seraphel => "seraphel",
        }
    }
}

impl FromStr for ArchonKey {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vyrel" => Ok(ArchonKey::Vyrel),
            "aurion" => Ok(ArchonKey::Aurion),
            "kaelith" => Ok(ArchonKey::Kaelith),
            "morrath" => Ok(ArchonKey::Morrath),
            "seraphel" => Ok(ArchonKey::Seraphel),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchonScalar {
    Alignment,
    Coherence,
    Breakthrough,
    Instability,
    Notoriety,
}

/// Identity condition that must hold alongside the affinity count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchonCondition {
    pub scalar: ArchonScalar,
    pub at_most: Option<f64>,
    pub at_least: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DivineAbility {
    pub name: &'static str,
    pub effect: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchonFragmentDef {
    pub key: ArchonKey,
    pub weapon_name: &'static str,
    pub principle: Principle,
    pub min_affinity: u32,
    pub condition: ArchonCondition,
    pub divine_ability: DivineAbility,
}

pub const ARCHON_FRAGMENTS: [ArchonFragmentDef; 5] = [
    ArchonFragmentDef {
        key: ArchonKey::Vyrel,
        weapon_name: "Vyrel's Umbral Thorn",
        principle: Principle::Void,
        min_affinity: 3,
        condition: ArchonCondition {
            scalar: ArchonScalar::Alignment,
            at_most: Some(-20.0),
            at_least: None,
        },
        divine_ability: DivineAbility {
            name: "Eclipse Verdict",
            effect: "erases one enemy phase transition",
        },
    },
    ArchonFragmentDef {
        key: ArchonKey::Aurion,
        weapon_name: "Aurion's Dawnspire",
        principle: Principle::Order,
        min_affinity: 3,
        condition: ArchonCondition {
            scalar: ArchonScalar::Coherence,
            at_most: None,
            at_least: Some(75.0),
        },
        divine_ability: DivineAbility {
            name: "Law of First Light",
            effect: "restores full stability once",
        },
    },
    ArchonFragmentDef {
        key: ArchonKey::Kaelith,
        weapon_name: "Kaelith's Stormglass",
        principle: Principle::Energy,
        min_affinity: 3,
        condition: ArchonCondition {
            scalar: ArchonScalar::Breakthrough,
            at_most: None,
            at_least: Some(50.0),
        },
        divine_ability: DivineAbility {
            name: "Skyfracture",
            effect: "forces a favorable phase",
        },
    },
    ArchonFragmentDef {
        key: ArchonKey::Morrath,
        weapon_name: "Morrath's Ashen Maw",
        principle: Principle::Entropy,
        min_affinity: 3,
        condition: ArchonCondition {
            scalar: ArchonScalar::Instability,
            at_most: None,
            at_least: Some(50.0),
        },
        divine_ability: DivineAbility {
            name: "Unmaking Tide",
            effect: "strips the enemy's resistance map",
        },
    },
    ArchonFragmentDef {
        key: ArchonKey::Seraphel,
        weapon_name: "Seraphel's Veilstring",
        principle: Principle::Flux,
        min_affinity: 3,
        condition: ArchonCondition {
            scalar: ArchonScalar::Notoriety,
            at_most: None,
            at_least: Some(40.0),
        },
        divine_ability: DivineAbility {
            name: "Thousand Masks",
            effect: "nullifies one suppression source",
        },
    },
];

pub fn archon_fragment(key: ArchonKey) -> &'static ArchonFragmentDef {
    match key {
        ArchonKey::Vyrel => &ARCHON_FRAGMENTS[0],
        ArchonKey::Aurion => &ARCHON_FRAGMENTS[1],
        ArchonKey::Kaelith => &ARCHON_FRAGMENTS[2],
        ArchonKey::Morrath => &ARCHON_FRAGMENTS[3],
        ArchonKey::Seraphel => &ARCHON_FRAGMENTS[4],
    }
}

/// Two principles of one cluster combine into an awakened passive.
pub fn awakened_passive(a: Principle, b: Principle) -> Option<&'static str> {
    use Principle::*;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    match (lo, hi) {
        (Order, Matter) => Some("Bastion Lattice"),
        (Order, Energy) => Some("Verdict Arc"),
        (Matter, Energy) => Some("Forgeheart"),
        (Entropy, Flux) => Some("Unravel Tide"),
        (Entropy, Void) => Some("Hollow Bloom"),
        (Flux, Void) => Some("Slipstream Veil"),
        _ => None,
    }
}
