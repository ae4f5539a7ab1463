pub mod core;
pub mod data;
pub mod rules;
pub mod simulation;
pub mod systems;
pub mod world;

pub use crate::core::serialization::PlayerSave;
pub use crate::data::config::EngineConfig;
pub use crate::simulation::player::PlayerState;
pub use crate::systems::chapter::{run_chapter_tick, ChapterInputs, ChapterOutcome};
