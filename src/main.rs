use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use progression_core::core::serialization::PlayerSave;
use progression_core::data::config::{load_engine_config, EngineConfig};
use progression_core::simulation::player::PlayerState;
use progression_core::simulation::rolls::SeededRolls;
use progression_core::systems::chapter::{run_chapter_tick, ChapterInputs};
use progression_core::world::{PlayerDb, PlayerRepository};
use tracing_subscriber::EnvFilter;

struct Args {
    player: Option<PathBuf>,
    input: Option<PathBuf>,
    config: Option<PathBuf>,
    db: Option<PathBuf>,
    player_id: String,
    seed: u64,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args(env::args().collect());
    let Some(input_path) = args.input.as_ref() else {
        fail("Usage: chapter-sim --input <chapter.json> [--player <player.json>] [--config <engine.json>] [--db <players.db> --id <player-id>] [--seed <n>]");
    };

    let config = match args.config.as_ref() {
        Some(path) => load_engine_config(path).unwrap_or_else(|err| fail(&format!("Failed to load config: {}", err))),
        None => EngineConfig::default(),
    };

    let mut repo: Option<Box<dyn PlayerRepository>> = args.db.as_ref().map(|path| match PlayerDb::open(path) {
        Ok(db) => Box::new(db) as Box<dyn PlayerRepository>,
        Err(err) => fail(&format!("Failed to open player DB: {}", err)),
    });

    let stored = match repo.as_ref() {
        Some(repo) => repo
            .load_player(&args.player_id)
            .unwrap_or_else(|err| fail(&format!("Failed to load player {}: {}", args.player_id, err))),
        None => None,
    };
    let player = match (stored, args.player.as_ref()) {
        (Some(save), _) => save.player,
        (None, Some(path)) => read_json::<PlayerState>(path),
        (None, None) => PlayerState::default(),
    };
    let inputs = read_json::<ChapterInputs>(input_path);

    let mut rolls = SeededRolls::new(args.seed);
    let outcome = run_chapter_tick(&player, &inputs, &config, &mut rolls);

    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{}", json),
        Err(err) => fail(&format!("Failed to render outcome: {}", err)),
    }

    if let Some(repo) = repo.as_mut() {
        let save = PlayerSave::new(args.player_id.clone(), outcome.player);
        if let Err(err) = repo.save_player(&save) {
            fail(&format!("Failed to save player {}: {}", args.player_id, err));
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> T {
    let data = fs::read_to_string(path)
        .unwrap_or_else(|err| fail(&format!("Failed to read {}: {}", path.display(), err)));
    serde_json::from_str(&data)
        .unwrap_or_else(|err| fail(&format!("Failed to parse {}: {}", path.display(), err)))
}

fn fail(message: &str) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn parse_args(args: Vec<String>) -> Args {
    let mut parsed = Args {
        player: None,
        input: None,
        config: None,
        db: None,
        player_id: "player".to_string(),
        seed: 0,
    };
    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--player" => parsed.player = iter.next().map(PathBuf::from),
            "--input" => parsed.input = iter.next().map(PathBuf::from),
            "--config" => parsed.config = iter.next().map(PathBuf::from),
            "--db" => parsed.db = iter.next().map(PathBuf::from),
            "--id" => {
                if let Some(value) = iter.next() {
                    parsed.player_id = value.clone();
                }
            }
            "--seed" => {
                if let Some(value) = iter.next() {
                    parsed.seed = value
                        .parse()
                        .unwrap_or_else(|_| fail(&format!("--seed expects an integer, got {}", value)));
                }
            }
            other => eprintln!("Ignoring unknown argument {}", other),
        }
    }
    parsed
}
