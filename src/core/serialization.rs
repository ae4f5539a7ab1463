use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::simulation::player::PlayerState;

pub const PLAYER_SAVE_VERSION: u32 = 1;

/// Versioned envelope around one persisted player record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSave {
    #[serde(default = "default_save_version")]
    pub version: u32,
    pub player_id: String,
    pub player: PlayerState,
}

fn default_save_version() -> u32 {
    PLAYER_SAVE_VERSION
}

impl PlayerSave {
    pub fn new(player_id: impl Into<String>, player: PlayerState) -> Self {
        Self {
            version: PLAYER_SAVE_VERSION,
            player_id: player_id.into(),
            player,
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("save json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("save version {found} is newer than supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },
    #[error("save io at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Serialize a save into pretty JSON.
pub fn encode_save(save: &PlayerSave) -> Result<String, SaveError> {
    Ok(serde_json::to_string_pretty(save)?)
}

/// Parse a save, refusing versions this crate does not know how to read.
/// Fields missing from older saves load at their defaults.
pub fn decode_save(data: &str) -> Result<PlayerSave, SaveError> {
    let save: PlayerSave = serde_json::from_str(data)?;
    if save.version > PLAYER_SAVE_VERSION {
        return Err(SaveError::UnsupportedVersion {
            found: save.version,
            supported: PLAYER_SAVE_VERSION,
        });
    }
    Ok(save)
}

pub fn save_to_path(save: &PlayerSave, path: impl AsRef<Path>) -> Result<(), SaveError> {
    let path = path.as_ref();
    let json = encode_save(save)?;
    fs::write(path, json).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<PlayerSave, SaveError> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|source| SaveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_save(&data)
}
