use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned by every `FromStr` impl over a closed table key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown enum value: {value}")]
pub struct ParseEnumError {
    pub value: String,
}

impl ParseEnumError {
    pub fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// The six elemental tags. Declaration order is the canonical iteration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Principle {
    Order,
    Entropy,
    Matter,
    Flux,
    Energy,
    Void,
}

pub const ALL_PRINCIPLES: [Principle; 6] = [
    Principle::Order,
    Principle::Entropy,
    Principle::Matter,
    Principle::Flux,
    Principle::Energy,
    Principle::Void,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cluster {
    Structure,
    Drift,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrinciplePair {
    OrderEntropy,
    MatterFlux,
    EnergyVoid,
}

pub const ALL_PAIRS: [PrinciplePair; 3] = [
    PrinciplePair::OrderEntropy,
    PrinciplePair::MatterFlux,
    PrinciplePair::EnergyVoid,
];

impl PrinciplePair {
    pub fn sides(self) -> (Principle, Principle) {
        match self {
            PrinciplePair::OrderEntropy => (Principle::Order, Principle::Entropy),
            PrinciplePair::MatterFlux => (Principle::Matter, Principle::Flux),
            PrinciplePair::EnergyVoid => (Principle::Energy, Principle::Void),
        }
    }

    pub fn contains(self, principle: Principle) -> bool {
        let (left, right) = self.sides();
        left == principle || right == principle
    }
}

impl Principle {
    pub fn as_str(self) -> &'static str {
        match self {
            Principle::Order => "order",
            Principle::Entropy => "entropy",
            Principle::Matter => "matter",
            Principle::Flux => "flux",
            Principle::Energy => "energy",
            Principle::Void => "void",
        }
    }

    pub fn opposite(self) -> Principle {
        match self {
            Principle::Order => Principle::Entropy,
            Principle::Entropy => Principle::Order,
            Principle::Matter => Principle::Flux,
            Principle::Flux => Principle::Matter,
            Principle::Energy => Principle::Void,
            Principle::Void => Principle::Energy,
        }
    }

    pub fn pair(self) -> PrinciplePair {
        match self {
            Principle::Order | Principle::Entropy => PrinciplePair::OrderEntropy,
            Principle::Matter | Principle::Flux => PrinciplePair::MatterFlux,
            Principle::Energy | Principle::Void => PrinciplePair::EnergyVoid,
        }
    }

    pub fn cluster(self) -> Cluster {
        match self {
            Principle::Order | Principle::Matter | Principle::Energy => Cluster::Structure,
            Principle::Entropy | Principle::Flux | Principle::Void => Cluster::Drift,
        }
    }

    /// The two other members of this principle's cluster.
    pub fn adjacent(self) -> [Principle; 2] {
        let mut out = [self; 2];
        let mut idx = 0;
        for other in ALL_PRINCIPLES {
            if other != self && other.cluster() == self.cluster() {
                out[idx] = other;
                idx += 1;
            }
        }
        out
    }

    pub fn is_adjacent(self, other: Principle) -> bool {
        self != other && self.cluster() == other.cluster()
    }
}

impl fmt::Display for Principle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Principle {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "order" => Ok(Principle::Order),
            "entropy" => Ok(Principle::Entropy),
            "matter" => Ok(Principle::Matter),
            "flux" => Ok(Principle::Flux),
            "energy" => Ok(Principle::Energy),
            "void" => Ok(Principle::Void),
            _ => Err(ParseEnumError::new(s)),
        }
    }
}

/// Parses a principle key coming from an upstream collaborator. Unknown keys
/// are logged and yield `None` so the caller can no-op.
pub fn resolve_principle(raw: &str) -> Option<Principle> {
    match raw.parse::<Principle>() {
        Ok(principle) => Some(principle),
        Err(err) => {
            tracing::warn!(
                target: "progression::resonance",
                key = %err.value,
                "principle.unknown"
            );
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    Neutral,
    Strong,
    Synergy,
    Weak,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrincipleInteraction {
    pub kind: InteractionKind,
    pub advantage_mod: f64,
}

pub const STRONG_MOD: f64 = 0.15;
pub const SYNERGY_MOD: f64 = 0.05;
pub const WEAK_MOD: f64 = -0.10;

pub fn get_principle_interaction(attacker: Principle, defender: Principle) -> PrincipleInteraction {
    let kind = if attacker == defender {
        InteractionKind::Neutral
    } else if attacker.opposite() == defender {
        InteractionKind::Strong
    } else if attacker.is_adjacent(defender) {
        InteractionKind::Synergy
    } else {
        InteractionKind::Weak
    };
    let advantage_mod = match kind {
        InteractionKind::Neutral => 0.0,
        InteractionKind::Strong => STRONG_MOD,
        InteractionKind::Synergy => SYNERGY_MOD,
        InteractionKind::Weak => WEAK_MOD,
    };
    PrincipleInteraction {
        kind,
        advantage_mod,
    }
}

/// The principle with the best interaction against `defender`.
pub fn counter_principle(defender: Principle) -> Principle {
    defender.opposite()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_table_matches_rules() {
        let mut strong = 0;
        let mut synergy = 0;
        let mut weak = 0;
        for a in ALL_PRINCIPLES {
            for d in ALL_PRINCIPLES {
                let hit = get_principle_interaction(a, d);
                let reverse = get_principle_interaction(d, a);
                assert_eq!(hit.kind, reverse.kind, "{a} vs {d} not symmetric");
                match hit.kind {
                    InteractionKind::Neutral => {
                        assert_eq!(a, d);
                        assert_eq!(hit.advantage_mod, -reverse.advantage_mod);
                    }
                    InteractionKind::Strong => {
                        strong += 1;
                        assert_eq!(a.opposite(), d);
                    }
                    InteractionKind::Synergy => {
                        synergy += 1;
                        assert_eq!(a.cluster(), d.cluster());
                    }
                    InteractionKind::Weak => {
                        weak += 1;
                        assert_ne!(a.cluster(), d.cluster());
                        assert_ne!(a.opposite(), d);
                    }
                }
            }
        }
        assert_eq!(strong, 6);
        assert_eq!(synergy, 12);
        assert_eq!(weak, 12);
    }

    #[test]
    fn every_principle_has_two_adjacent_in_cluster() {
        for p in ALL_PRINCIPLES {
            let adj = p.adjacent();
            assert_ne!(adj[0], adj[1]);
            assert!(adj.iter().all(|a| a.cluster() == p.cluster() && *a != p));
            assert_ne!(p.opposite().cluster(), p.cluster());
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_rejects_unknown() {
        assert_eq!("Void".parse::<Principle>(), Ok(Principle::Void));
        assert!(resolve_principle("aether").is_none());
    }
}
