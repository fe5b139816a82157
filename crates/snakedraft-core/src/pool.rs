// Player pool import from CSV.
//
// Expected columns: id, name, primary_position, secondary_position. Positions
// accept either abbreviations (GK, RB, LCB, ...) or slot numbers 1-11; the
// secondary position may be blank.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::directory::League;
use crate::draft::player::{Player, Position};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to read player pool {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

#[derive(Debug, Deserialize)]
struct RawPlayer {
    id: String,
    name: String,
    primary_position: String,
    #[serde(default)]
    secondary_position: Option<String>,
}

fn load_players_from_reader<R: Read>(rdr: R) -> Result<Vec<Player>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut players = Vec::new();
    let mut seen = HashSet::new();

    for result in reader.deserialize::<RawPlayer>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed player row: {}", e);
                continue;
            }
        };
        if raw.id.is_empty() || raw.name.is_empty() {
            warn!("skipping player row with blank id or name");
            continue;
        }
        let Some(primary) = Position::from_str_pos(&raw.primary_position) else {
            warn!(
                "skipping player '{}': unknown position '{}'",
                raw.name, raw.primary_position
            );
            continue;
        };
        let secondary = match raw.secondary_position.as_deref().filter(|s| !s.is_empty()) {
            None => None,
            Some(s) => match Position::from_str_pos(s) {
                Some(pos) => Some(pos),
                None => {
                    warn!("player '{}': ignoring unknown secondary position '{}'", raw.name, s);
                    None
                }
            },
        };
        if !seen.insert(raw.id.clone()) {
            warn!("duplicate player id '{}', keeping the first row", raw.id);
            continue;
        }
        players.push(Player::new(raw.id, raw.name, primary, secondary));
    }
    Ok(players)
}

/// Read a player pool CSV.
pub fn load_players(path: &Path) -> Result<Vec<Player>, PoolError> {
    let file = std::fs::File::open(path).map_err(|e| PoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_players_from_reader(file).map_err(|e| PoolError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

/// Register every player from `path` in `league`. Ids already present are
/// left alone. Returns how many players were added.
pub fn import_into(league: &mut League, path: &Path) -> Result<usize, PoolError> {
    let players = load_players(path)?;
    let total = players.len();
    let added = players
        .into_iter()
        .filter(|p| league.register_player(p.clone()))
        .count();
    info!(
        "Imported {} of {} players from {}",
        added,
        total,
        path.display()
    );
    Ok(added)
}
