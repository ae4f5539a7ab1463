pub mod archons;
pub mod bosses;
pub mod config;
pub mod villains;

pub use config::{load_engine_config, DataError, EngineConfig};
