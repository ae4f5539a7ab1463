use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;

use crate::core::serialization::{
    decode_save, encode_save, PlayerSave, SaveError, PLAYER_SAVE_VERSION,
};
use crate::world::repository::PlayerRepository;

const PLAYER_SCHEMA_VERSION: i64 = 1;

const PLAYER_DB_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS player_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  schema_version INTEGER NOT NULL,
  save_version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS players (
  player_id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  chapter INTEGER NOT NULL,
  save_json TEXT NOT NULL
);
"#;

#[derive(Debug, Error)]
pub enum PlayerDbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Save(#[from] SaveError),
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// One JSON save blob per player, keyed by player id.
pub struct PlayerDb {
    conn: Connection,
}

impl PlayerDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PlayerDbError> {
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, PlayerDbError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, PlayerDbError> {
        let mut db = Self { conn };
        db.conn.execute_batch(PLAYER_DB_SCHEMA)?;
        db.ensure_player_meta()?;
        Ok(db)
    }

    pub fn load(&self, player_id: &str) -> Result<Option<PlayerSave>, PlayerDbError> {
        let json = self
            .conn
            .query_row(
                "SELECT save_json FROM players WHERE player_id = ?1",
                params![player_id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        let Some(json) = json else {
            return Ok(None);
        };
        let save = decode_save(&json)?;
        if save.player_id != player_id {
            return Err(PlayerDbError::InvalidData(format!(
                "row {} holds save for {}",
                player_id, save.player_id
            )));
        }
        Ok(Some(save))
    }

    pub fn save(&mut self, save: &PlayerSave) -> Result<(), PlayerDbError> {
        let json = encode_save(save)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO players (player_id, name, chapter, save_json) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(player_id) DO UPDATE SET
               name = excluded.name,
               chapter = excluded.chapter,
               save_json = excluded.save_json",
            params![
                save.player_id,
                save.player.name,
                i64::from(save.player.chapter),
                json
            ],
        )?;
        tx.commit()?;
        tracing::debug!(
            target: "progression::store",
            player_id = %save.player_id,
            chapter = save.player.chapter,
            "player.saved"
        );
        Ok(())
    }

    pub fn list_players(&self) -> Result<Vec<String>, PlayerDbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT player_id FROM players ORDER BY player_id")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn ensure_player_meta(&mut self) -> Result<(), PlayerDbError> {
        let meta = self
            .conn
            .query_row(
                "SELECT schema_version, save_version FROM player_meta WHERE id = 1",
                [],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?;

        let save_version = i64::from(PLAYER_SAVE_VERSION);
        match meta {
            Some((schema, save)) if schema == PLAYER_SCHEMA_VERSION && save <= save_version => {
                if save < save_version {
                    self.conn.execute(
                        "UPDATE player_meta SET save_version = ?1 WHERE id = 1",
                        params![save_version],
                    )?;
                }
                Ok(())
            }
            Some((schema, save)) => Err(PlayerDbError::InvalidData(format!(
                "player_meta version mismatch (schema {}, save {}, expected {}, {})",
                schema, save, PLAYER_SCHEMA_VERSION, save_version
            ))),
            None => {
                self.conn.execute(
                    "INSERT INTO player_meta (id, schema_version, save_version) VALUES (1, ?1, ?2)",
                    params![PLAYER_SCHEMA_VERSION, save_version],
                )?;
                Ok(())
            }
        }
    }
}

impl PlayerRepository for PlayerDb {
    fn load_player(&self, player_id: &str) -> Result<Option<PlayerSave>, Box<dyn std::error::Error>> {
        Ok(self.load(player_id)?)
    }

    fn save_player(&mut self, save: &PlayerSave) -> Result<(), Box<dyn std::error::Error>> {
        Ok(self.save(save)?)
    }

    fn list_players(&self) -> Result<Vec<String>, Box<dyn std::error::Error>> {
        Ok(PlayerDb::list_players(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::player::PlayerState;

    fn save(id: &str, chapter: u32) -> PlayerSave {
        PlayerSave::new(
            id,
            PlayerState {
                name: format!("player {id}"),
                chapter,
                ..PlayerState::default()
            },
        )
    }

    #[test]
    fn saves_load_back_and_overwrite() {
        let mut db = PlayerDb::open_in_memory().expect("open");
        assert!(db.load("a").expect("load").is_none());

        db.save(&save("a", 1)).expect("save");
        db.save(&save("a", 2)).expect("save again");
        db.save(&save("b", 5)).expect("save b");

        let loaded = db.load("a").expect("load").expect("present");
        assert_eq!(loaded.player.chapter, 2);
        assert_eq!(db.list_players().expect("list"), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn mismatched_schema_is_rejected() {
        let path =
            std::env::temp_dir().join(format!("progression-meta-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);
        {
            let conn = Connection::open(&path).expect("open raw");
            conn.execute_batch(PLAYER_DB_SCHEMA).expect("schema");
            conn.execute(
                "INSERT INTO player_meta (id, schema_version, save_version) VALUES (1, 99, 1)",
                [],
            )
            .expect("meta");
        }
        let err = PlayerDb::open(&path).err().expect("mismatch");
        assert!(matches!(err, PlayerDbError::InvalidData(_)));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn repository_trait_delegates() {
        let mut db = PlayerDb::open_in_memory().expect("open");
        let repo: &mut dyn PlayerRepository = &mut db;
        repo.save_player(&save("c", 3)).expect("save");
        assert_eq!(repo.load_player("c").expect("load").map(|s| s.player.chapter), Some(3));
    }
}
