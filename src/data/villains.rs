use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::rules::principle::{ParseEnumError, Principle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackedEvent {
    AgreedWithLogic,
    PartialAgreement,
    QuestionedMotive,
    NeutralResponse,
    AcceptedGift,
    RejectedOffer,
    DefeatedGeneral,
    StrongRejection,
}

impl FromStr for TrackedEvent {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "agreed_with_logic" => Ok(TrackedEvent::AgreedWithLogic),
            "partial_agreement" => Ok(TrackedEvent::PartialAgreement),
            "questioned_motive" => Ok(TrackedEvent::QuestionedMotive),
            "neutral_response" => Ok(TrackedEvent::NeutralResponse),
            "accepted_gift" => Ok(TrackedEvent::AcceptedGift),
            "rejected_offer" => Ok(TrackedEvent::RejectedOffer),
            "defeated_general" => Ok(TrackedEvent::DefeatedGeneral),
            "strong_rejection" => Ok(TrackedEvent::StrongRejection),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEventDeltas {
    pub resonance: f64,
    pub sympathy: f64,
    pub anchor: f64,
}

impl TrackedEvent {
    pub fn deltas(self) -> TrackedEventDeltas {
        let (resonance, sympathy, anchor) = match self {
            TrackedEvent::AgreedWithLogic => (15.0, 5.0, 0.0),
            TrackedEvent::PartialAgreement => (8.0, 3.0, 0.0),
            TrackedEvent::QuestionedMotive => (3.0, 2.0, 2.0),
            TrackedEvent::NeutralResponse => (0.0, 0.0, 0.0),
            TrackedEvent::AcceptedGift => (10.0, 8.0, 0.0),
            TrackedEvent::RejectedOffer => (-5.0, -2.0, 5.0),
            TrackedEvent::DefeatedGeneral => (-5.0, 0.0, 8.0),
            TrackedEvent::StrongRejection => (-15.0, -5.0, 10.0),
        };
        TrackedEventDeltas {
            resonance,
            sympathy,
            anchor,
        }
    }

    /// Events that count as the player turning a general away.
    pub fn is_rejection(self) -> bool {
        matches!(self, TrackedEvent::RejectedOffer | TrackedEvent::StrongRejection)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdAxis {
    EmpireResonance,
    IdentityAnchor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VillainThreshold {
    pub axis: ThresholdAxis,
    pub at: u8,
    pub flag: &'static str,
}

pub const VILLAIN_THRESHOLDS: [VillainThreshold; 11] = [
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 20, flag: "empire_whispers" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 30, flag: "empire_dreams" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 50, flag: "empire_sympathy_visible" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 60, flag: "empire_allies_wary" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 70, flag: "empire_invitation" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 80, flag: "empire_conversion_open" },
    VillainThreshold { axis: ThresholdAxis::EmpireResonance, at: 90, flag: "empire_crown_offered" },
    VillainThreshold { axis: ThresholdAxis::IdentityAnchor, at: 30, flag: "anchor_rooted" },
    VillainThreshold { axis: ThresholdAxis::IdentityAnchor, at: 50, flag: "anchor_steadfast" },
    VillainThreshold { axis: ThresholdAxis::IdentityAnchor, at: 70, flag: "anchor_unyielding" },
    VillainThreshold { axis: ThresholdAxis::IdentityAnchor, at: 90, flag: "anchor_immovable" },
];

pub const GRAY_ZONE_FLAG: &str = "gray_zone";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Vanguard,
    Catalyst,
    Sovereign,
    Seeker,
    Tactician,
    Wanderer,
}

impl FromStr for Archetype {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vanguard" => Ok(Archetype::Vanguard),
            "catalyst" => Ok(Archetype::Catalyst),
            "sovereign" => Ok(Archetype::Sovereign),
            "seeker" => Ok(Archetype::Seeker),
            "tactician" => Ok(Archetype::Tactician),
            "wanderer" => Ok(Archetype::Wanderer),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneralDef {
    pub id: &'static str,
    pub name: &'static str,
    pub principle: Principle,
    pub doctrine: &'static str,
}

pub const GENERALS: [GeneralDef; 4] = [
    GeneralDef {
        id: "general_vess",
        name: "Vess of the Iron Ledger",
        principle: Principle::Order,
        doctrine: "order is mercy given teeth",
    },
    GeneralDef {
        id: "general_korrin",
        name: "Korrin Ashwake",
        principle: Principle::Entropy,
        doctrine: "only what burns down can be rebuilt honestly",
    },
    GeneralDef {
        id: "general_thale",
        name: "Thale the Tideless",
        principle: Principle::Flux,
        doctrine: "loyalty is a current, not a chain",
    },
    GeneralDef {
        id: "general_morwen",
        name: "Morwen Hollowcrown",
        principle: Principle::Void,
        doctrine: "the self is a wound the Empire can close",
    },
];

pub fn general(id: &str) -> Option<&'static GeneralDef> {
    GENERALS.iter().find(|general| general.id == id)
}

/// The general each archetype is first set against.
pub fn assigned_general(archetype: Archetype) -> &'static GeneralDef {
    match archetype {
        Archetype::Vanguard | Archetype::Wanderer => &GENERALS[0],
        Archetype::Catalyst => &GENERALS[1],
        Archetype::Seeker | Archetype::Tactician => &GENERALS[2],
        Archetype::Sovereign => &GENERALS[3],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmissaryDef {
    pub id: &'static str,
    pub name: &'static str,
    pub cover: &'static str,
}

pub const EMISSARIES: [EmissaryDef; 3] = [
    EmissaryDef {
        id: "emissary_lira",
        name: "Lira",
        cover: "a cartographer who keeps turning up on the same floors",
    },
    EmissaryDef {
        id: "emissary_oren",
        name: "Oren",
        cover: "a quartermaster who never charges full price",
    },
    EmissaryDef {
        id: "emissary_sefa",
        name: "Sefa",
        cover: "a healer who asks too gently about your past",
    },
];

pub fn emissary(id: &str) -> Option<&'static EmissaryDef> {
    EMISSARIES.iter().find(|emissary| emissary.id == id)
}

/// Writer-facing anomaly seeds for each Veiled Will phase. Phase 0 has none.
pub fn anomaly_seeds(phase: u8) -> &'static [&'static str] {
    match phase {
        0 => &[],
        1 => &[
            "a stairwell that has one more step than it did yesterday",
            "shadows that lag half a breath behind their owners",
            "a bell that rings at the exact moment nobody is listening",
        ],
        2 => &[
            "Empire banners appearing on floors the Empire never reached",
            "a stranger who knows the player's seed name",
            "dreams that continue from where the last one ended",
        ],
        _ => &[
            "the tower's numbering skips a floor and no one else notices",
            "a voice under the generals' voices, speaking a beat ahead",
            "reflections that refuse to mirror the weapon",
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_table_shape() {
        let resonance = VILLAIN_THRESHOLDS
            .iter()
            .filter(|t| t.axis == ThresholdAxis::EmpireResonance)
            .count();
        assert_eq!(resonance, 7);
        assert_eq!(VILLAIN_THRESHOLDS.len() - resonance, 4);
    }

    #[test]
    fn rejection_events_raise_anchor() {
        assert_eq!(TrackedEvent::StrongRejection.deltas().anchor, 10.0);
        assert_eq!(TrackedEvent::AgreedWithLogic.deltas().resonance, 15.0);
        assert!(TrackedEvent::RejectedOffer.is_rejection());
        assert!(!TrackedEvent::DefeatedGeneral.is_rejection());
    }

    #[test]
    fn rosters_have_fixed_ids() {
        assert!(general("general_thale").is_some());
        assert!(emissary("emissary_oren").is_some());
        assert!(emissary("emissary_unknown").is_none());
        assert_eq!(assigned_general(Archetype::Sovereign).id, "general_morwen");
        assert!(anomaly_seeds(0).is_empty());
    }
}
