use crate::rules::principle::Principle;

/// One rotation point of a floor boss. The boss switches to `principle`
/// once its HP falls to `hp_threshold` or below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossPhase {
    pub hp_threshold: f64,
    pub principle: Principle,
    pub tell: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BossTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub floor: u8,
    pub threat_level: f64,
    pub phases: &'static [BossPhase],
}

impl BossTemplate {
    pub fn opening_principle(&self) -> Option<Principle> {
        self.phases.first().map(|phase| phase.principle)
    }

    /// Index of the deepest phase whose threshold the given HP has crossed.
    pub fn phase_index_for_hp(&self, hp: f64) -> usize {
        self.phases
            .iter()
            .rposition(|phase| hp <= phase.hp_threshold)
            .unwrap_or(0)
    }
}

pub const BOSSES: [BossTemplate; 5] = [
    BossTemplate {
        id: "warden_of_rust",
        name: "Warden of Rust",
        floor: 1,
        threat_level: 0.40,
        phases: &[
            BossPhase {
                hp_threshold: 100.0,
                principle: Principle::Matter,
                tell: "its plating grinds as it braces for a charge",
            },
            BossPhase {
                hp_threshold: 50.0,
                principle: Principle::Entropy,
                tell: "flakes of rust lift from its shell and begin to drift",
            },
        ],
    },
    BossTemplate {
        id: "choir_of_static",
        name: "Choir of Static",
        floor: 2,
        threat_level: 0.45,
        phases: &[
            BossPhase {
                hp_threshold: 100.0,
                principle: Principle::Energy,
                tell: "the hum rises to a single held note",
            },
            BossPhase {
                hp_threshold: 65.0,
                principle: Principle::Flux,
                tell: "the voices split and stop agreeing on a key",
            },
            BossPhase {
                hp_threshold: 30.0,
                principle: Principle::Void,
                tell: "the sound drops out and the silence leans closer",
            },
        ],
    },
    BossTemplate {
        id: "tidebound_magistrate",
        name: "Tidebound Magistrate",
        floor: 3,
        threat_level: 0.50,
        phases: &[
            BossPhase {
                hp_threshold: 100.0,
                principle: Principle::Order,
                tell: "it raises the gavel and the floor tiles align",
            },
            BossPhase {
                hp_threshold: 60.0,
                principle: Principle::Flux,
                tell: "water seeps through the seams of the courtroom",
            },
            BossPhase {
                hp_threshold: 25.0,
                principle: Principle::Entropy,
                tell: "the verdict scroll starts to unravel mid-sentence",
            },
        ],
    },
    BossTemplate {
        id: "hollow_regent",
        name: "Hollow Regent",
        floor: 4,
        threat_level: 0.55,
        phases: &[
            BossPhase {
                hp_threshold: 100.0,
                principle: Principle::Void,
                tell: "the light around the throne bends inward",
            },
            BossPhase {
                hp_threshold: 70.0,
                principle: Principle::Matter,
                tell: "the throne's stone climbs up its arms like armor",
            },
            BossPhase {
                hp_threshold: 40.0,
                principle: Principle::Energy,
                tell: "cracks in the armor glow white",
            },
            BossPhase {
                hp_threshold: 15.0,
                principle: Principle::Void,
                tell: "it stops breathing and the room goes with it",
            },
        ],
    },
    BossTemplate {
        id: "first_architect",
        name: "The First Architect",
        floor: 5,
        threat_level: 0.60,
        phases: &[
            BossPhase {
                hp_threshold: 100.0,
                principle: Principle::Order,
                tell: "blueprints of light sketch the arena around you",
            },
            BossPhase {
                hp_threshold: 75.0,
                principle: Principle::Energy,
                tell: "the lines of the blueprint begin to burn",
            },
            BossPhase {
                hp_threshold: 45.0,
                principle: Principle::Entropy,
                tell: "whole sections of the design erase themselves",
            },
            BossPhase {
                hp_threshold: 20.0,
                principle: Principle::Void,
                tell: "it draws a door in the air and steps half through",
            },
        ],
    },
];

pub fn boss_for_floor(floor: u8) -> Option<&'static BossTemplate> {
    BOSSES.iter().find(|boss| boss.floor == floor)
}

pub fn boss_by_id(id: &str) -> Option<&'static BossTemplate> {
    let found = BOSSES.iter().find(|boss| boss.id == id);
    if found.is_none() {
        tracing::warn!(target: "progression::combat", boss_id = %id, "boss.unknown");
    }
    found
}
