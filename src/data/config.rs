use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid engine config: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    pub base_score: f64,
    pub resonance_weight: f64,
    pub dqs_weight: f64,
    pub stability_weight: f64,
    pub crng_weight: f64,
    pub threat_weight: f64,
    pub unfavorable_hp_cost: f64,
    pub backlash_hp_tax: f64,
    pub backlash_stability_multiplier: f64,
    pub enemy_hp_scale: f64,
    pub enemy_stability_scale: f64,
    pub resistance_step: f64,
    pub resistance_max: f64,
    pub build_fit_effective_cap: f64,
    pub stabilize_score_penalty: f64,
    pub stabilize_cost_relief: f64,
    pub hp_floor: f64,
    pub stability_recovery: f64,
    pub hp_recovery: f64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            base_score: 0.30,
            resonance_weight: 0.25,
            dqs_weight: 0.15,
            stability_weight: 0.10,
            crng_weight: 0.10,
            threat_weight: 0.35,
            unfavorable_hp_cost: 25.0,
            backlash_hp_tax: 8.0,
            backlash_stability_multiplier: 1.5,
            enemy_hp_scale: 45.0,
            enemy_stability_scale: 30.0,
            resistance_step: 0.03,
            resistance_max: 0.12,
            build_fit_effective_cap: 0.10,
            stabilize_score_penalty: 0.05,
            stabilize_cost_relief: 8.0,
            hp_floor: 10.0,
            stability_recovery: 15.0,
            hp_recovery: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FateConfig {
    pub max: f64,
    pub save_threshold: f64,
    pub save_cost: f64,
    pub saved_hp: f64,
    pub adapt_bonus: f64,
    pub decay_start_chapter: u32,
    pub decay_amount: f64,
    pub risk_scale: f64,
    pub coherence_gain: f64,
    pub high_coherence_gain: f64,
    pub high_coherence_at: f64,
    pub dqs_gain: f64,
    pub win_gain: f64,
}

impl Default for FateConfig {
    fn default() -> Self {
        Self {
            max: 100.0,
            save_threshold: 30.0,
            save_cost: 40.0,
            saved_hp: 10.0,
            adapt_bonus: 0.30,
            decay_start_chapter: 15,
            decay_amount: 2.5,
            risk_scale: 0.2,
            coherence_gain: 2.0,
            high_coherence_gain: 3.0,
            high_coherence_at: 80.0,
            dqs_gain: 1.5,
            win_gain: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    pub echo_gate: f64,
    pub reset_gate: f64,
    pub echo_reset_penalty: u32,
    pub echo_bloom_streak: u32,
    pub trauma_bloom_count: usize,
    pub near_death_ratio: f64,
    pub revert_streak: u32,
    pub aspect_gate: f64,
    pub aspect_retrigger_chapters: u32,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            echo_gate: 60.0,
            reset_gate: 50.0,
            echo_reset_penalty: 2,
            echo_bloom_streak: 10,
            trauma_bloom_count: 3,
            near_death_ratio: 0.30,
            revert_streak: 5,
            aspect_gate: 70.0,
            aspect_retrigger_chapters: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponConfig {
    pub idle_grace_chapters: u32,
    pub idle_decay: f64,
    pub misalignment_decay: f64,
    pub v3_bond: f64,
}

impl Default for WeaponConfig {
    fn default() -> Self {
        Self {
            idle_grace_chapters: 3,
            idle_decay: 5.0,
            misalignment_decay: 3.0,
            v3_bond: 120.0,
        }
    }
}

/// Tunable tables for one tick. `EngineConfig::default()` is the canonical set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub combat: CombatConfig,
    pub fate: FateConfig,
    pub growth: GrowthConfig,
    pub weapon: WeaponConfig,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), DataError> {
        let growth = &self.growth;
        if growth.reset_gate > growth.echo_gate {
            return Err(DataError::Validation(format!(
                "growth.reset_gate {} exceeds growth.echo_gate {}",
                growth.reset_gate, growth.echo_gate
            )));
        }
        if growth.echo_bloom_streak == 0 || growth.trauma_bloom_count == 0 || growth.revert_streak == 0 {
            return Err(DataError::Validation(
                "growth streak and trauma counts must be positive".to_string(),
            ));
        }
        let fate = &self.fate;
        if fate.max <= 0.0 || fate.save_cost > fate.max || fate.save_threshold < 0.0 {
            return Err(DataError::Validation(format!(
                "fate buffer table is inconsistent (max {}, save cost {}, threshold {})",
                fate.max, fate.save_cost, fate.save_threshold
            )));
        }
        let combat = &self.combat;
        let non_negative = [
            ("combat.unfavorable_hp_cost", combat.unfavorable_hp_cost),
            ("combat.backlash_hp_tax", combat.backlash_hp_tax),
            ("combat.resistance_max", combat.resistance_max),
            ("combat.build_fit_effective_cap", combat.build_fit_effective_cap),
            ("combat.hp_floor", combat.hp_floor),
            ("combat.stability_recovery", combat.stability_recovery),
            ("combat.hp_recovery", combat.hp_recovery),
            ("weapon.idle_decay", self.weapon.idle_decay),
            ("weapon.misalignment_decay", self.weapon.misalignment_decay),
        ];
        if let Some((name, value)) = non_negative.iter().find(|(_, value)| *value < 0.0) {
            return Err(DataError::Validation(format!("{name} must not be negative, got {value}")));
        }
        Ok(())
    }
}

pub fn load_engine_config(path: impl AsRef<Path>) -> Result<EngineConfig, DataError> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: EngineConfig = serde_json::from_str(&raw).map_err(|source| DataError::Json {
        path: path.display().to_string(),
        source,
    })?;
    config.validate()?;
    tracing::debug!(target: "progression::chapter", path = %path.display(), "config.loaded");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_override_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"combat": {"backlash_hp_tax": 12.0}}"#).expect("parse");
        assert_eq!(config.combat.backlash_hp_tax, 12.0);
        assert_eq!(config.combat.base_score, 0.30);
        assert_eq!(config.fate, FateConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reset_gate_above_echo_gate_is_rejected() {
        let mut config = EngineConfig::default();
        config.growth.reset_gate = 65.0;
        assert!(matches!(config.validate(), Err(DataError::Validation(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_engine_config("./does/not/exist.json").unwrap_err();
        assert!(matches!(err, DataError::Io { .. }));
    }
}
