use crate::core::serialization::PlayerSave;

/// Host-side storage for player records. The tick itself never calls this.
pub trait PlayerRepository {
    fn load_player(&self, player_id: &str) -> Result<Option<PlayerSave>, Box<dyn std::error::Error>>;
    fn save_player(&mut self, save: &PlayerSave) -> Result<(), Box<dyn std::error::Error>>;
    fn list_players(&self) -> Result<Vec<String>, Box<dyn std::error::Error>>;
}
