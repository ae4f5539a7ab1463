pub mod repository;
pub mod sqlite;

pub use repository::PlayerRepository;
pub use sqlite::{PlayerDb, PlayerDbError};
