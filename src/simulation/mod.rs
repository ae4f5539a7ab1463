pub mod combat;
pub mod growth;
pub mod identity;
pub mod player;
pub mod rolls;
pub mod unique_skill;
pub mod villain;
pub mod weapon;

pub use player::PlayerState;
pub use rolls::{FixedRolls, RollSource, SeededRolls};
