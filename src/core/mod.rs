pub mod serialization;

pub use serialization::{decode_save, encode_save, PlayerSave, SaveError, PLAYER_SAVE_VERSION};
