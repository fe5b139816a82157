// SQLite persistence layer for draft state.

use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::directory::League;
use crate::draft::player::{PlayerId, TeamId};
use crate::draft::state::DraftState;
use crate::persist::PersistenceSink;

/// One row of the pick log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRecord {
    pub pick_number: usize,
    pub team_id: TeamId,
    pub player_id: PlayerId,
    /// RFC 3339 UTC, filled in by SQLite.
    pub timestamp: String,
}

/// SQLite-backed persistence for the draft state blob, the league directory
/// and an append-only pick log.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Key holding the serialized `DraftState`.
    const STATE_KEY: &'static str = "draft_state";
    /// Key holding the serialized `League`.
    const LEAGUE_KEY: &'static str = "league";
    /// Key holding the current draft id.
    const DRAFT_ID_KEY: &'static str = "current_draft_id";

    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS draft_picks (
                pick_number INTEGER NOT NULL,
                team_id     TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                draft_id    TEXT NOT NULL,
                timestamp   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (pick_number, draft_id)
            );

            CREATE INDEX IF NOT EXISTS idx_draft_picks_draft_id ON draft_picks(draft_id);

            CREATE TABLE IF NOT EXISTS draft_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database mutex poisoned"))
    }

    // ------------------------------------------------------------------
    // Pick log
    // ------------------------------------------------------------------

    /// Append a committed pick to the log. Re-recording the same pick number
    /// for the same draft is a no-op.
    pub fn record_pick(
        &self,
        pick_number: usize,
        team_id: &TeamId,
        player_id: &PlayerId,
        draft_id: &str,
    ) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO draft_picks (pick_number, team_id, player_id, draft_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![pick_number as i64, team_id.as_str(), player_id.as_str(), draft_id],
        )
        .context("failed to record draft pick")?;
        Ok(())
    }

    /// Picks for one draft, ordered by pick number.
    pub fn load_picks(&self, draft_id: &str) -> Result<Vec<PickRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT pick_number, team_id, player_id, timestamp
                 FROM draft_picks WHERE draft_id = ?1 ORDER BY pick_number",
            )
            .context("failed to prepare load_picks query")?;

        let picks = stmt
            .query_map(params![draft_id], |row| {
                let pick_number: i64 = row.get(0)?;
                Ok(PickRecord {
                    pick_number: pick_number as usize,
                    team_id: TeamId(row.get(1)?),
                    player_id: PlayerId(row.get(2)?),
                    timestamp: row.get(3)?,
                })
            })
            .context("failed to query draft picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;

        Ok(picks)
    }

    // ------------------------------------------------------------------
    // Key-value state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`, replacing any previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn()?;
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO draft_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT value FROM draft_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query draft state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    pub fn load_league(&self) -> Result<Option<League>> {
        self.load_state(Self::LEAGUE_KEY)?
            .map(|v| serde_json::from_value(v).context("stored league is malformed"))
            .transpose()
    }

    /// Save the league and the draft state together, so a reader never sees
    /// one without the other.
    pub fn save_snapshot(&self, league: &League, state: &DraftState) -> Result<()> {
        let league_json = serde_json::to_string(league).context("failed to serialize league")?;
        let state_json = serde_json::to_string(state).context("failed to serialize draft state")?;

        let mut conn = self.conn()?;
        let tx = conn.transaction().context("failed to begin transaction")?;
        for (key, value) in [(Self::LEAGUE_KEY, &league_json), (Self::STATE_KEY, &state_json)] {
            tx.execute(
                "INSERT OR REPLACE INTO draft_state (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .with_context(|| format!("failed to save {key}"))?;
        }
        tx.commit().context("failed to commit snapshot")?;
        debug!("Snapshot saved: {} picks", state.history.len());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Draft ID management
    // ------------------------------------------------------------------

    pub fn get_draft_id(&self) -> Result<Option<String>> {
        let value = self.load_state(Self::DRAFT_ID_KEY)?;
        Ok(value.and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    pub fn set_draft_id(&self, draft_id: &str) -> Result<()> {
        self.save_state(
            Self::DRAFT_ID_KEY,
            &serde_json::Value::String(draft_id.to_string()),
        )
    }

    /// A new draft id from the current UTC time, e.g. `draft_20260228_143022_123`.
    pub fn generate_draft_id() -> String {
        chrono::Utc::now().format("draft_%Y%m%d_%H%M%S_%3f").to_string()
    }
}

impl PersistenceSink for Database {
    fn save(&self, state: &DraftState) -> Result<()> {
        let value = serde_json::to_value(state).context("failed to serialize draft state")?;
        self.save_state(Self::STATE_KEY, &value)
    }

    fn load(&self) -> Result<Option<DraftState>> {
        self.load_state(Self::STATE_KEY)?
            .map(|v| serde_json::from_value(v).context("stored draft state is malformed"))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::draft::player::{Player, Position};
    use serde_json::json;

    const TEST_DRAFT_ID: &str = "test_draft_001";

    fn test_db() -> Database {
        Database::open(":memory:").expect("in-memory database should open")
    }

    #[test]
    fn open_creates_tables() {
        let db = test_db();
        let conn = db.conn().unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&"draft_picks".to_string()));
        assert!(tables.contains(&"draft_state".to_string()));
    }

    #[test]
    fn record_and_load_picks() {
        let db = test_db();
        db.record_pick(2, &TeamId::from("team_2"), &PlayerId::from("p7"), TEST_DRAFT_ID)
            .unwrap();
        db.record_pick(1, &TeamId::from("team_1"), &PlayerId::from("p3"), TEST_DRAFT_ID)
            .unwrap();

        let picks = db.load_picks(TEST_DRAFT_ID).unwrap();
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].pick_number, 1);
        assert_eq!(picks[0].team_id, TeamId::from("team_1"));
        assert_eq!(picks[0].player_id, PlayerId::from("p3"));
        assert!(picks[0].timestamp.ends_with('Z'));
        assert_eq!(picks[1].pick_number, 2);
    }

    #[test]
    fn record_pick_is_idempotent() {
        let db = test_db();
        let team = TeamId::from("team_1");
        db.record_pick(1, &team, &PlayerId::from("p1"), TEST_DRAFT_ID).unwrap();
        db.record_pick(1, &team, &PlayerId::from("p9"), TEST_DRAFT_ID).unwrap();
        let picks = db.load_picks(TEST_DRAFT_ID).unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].player_id, PlayerId::from("p1"));
    }

    #[test]
    fn picks_scoped_to_draft_id() {
        let db = test_db();
        let team = TeamId::from("team_1");
        db.record_pick(1, &team, &PlayerId::from("a"), "draft_a").unwrap();
        db.record_pick(1, &team, &PlayerId::from("b"), "draft_b").unwrap();
        db.record_pick(2, &team, &PlayerId::from("c"), "draft_b").unwrap();
        assert_eq!(db.load_picks("draft_a").unwrap().len(), 1);
        assert_eq!(db.load_picks("draft_b").unwrap().len(), 2);
        assert!(db.load_picks("draft_c").unwrap().is_empty());
    }

    #[test]
    fn save_and_load_state_round_trip() {
        let db = test_db();
        db.save_state("k", &json!({"a": 1})).unwrap();
        assert_eq!(db.load_state("k").unwrap(), Some(json!({"a": 1})));
        db.save_state("k", &json!([2])).unwrap();
        assert_eq!(db.load_state("k").unwrap(), Some(json!([2])));
        assert_eq!(db.load_state("missing").unwrap(), None);
    }

    #[test]
    fn sink_round_trips_draft_state() {
        let db = test_db();
        assert_eq!(db.load().unwrap(), None);
        let state = DraftState {
            started: true,
            current_index: 1,
            turn_order: vec![TeamId::from("team_1"), TeamId::from("team_2")],
            reversed: true,
            history: vec![PlayerId::from("p1"), PlayerId::from("p2")],
        };
        db.save(&state).unwrap();
        assert_eq!(db.load().unwrap(), Some(state));
    }

    #[test]
    fn malformed_state_is_an_error() {
        let db = test_db();
        db.save_state("draft_state", &json!({"isStarted": "yes"})).unwrap();
        assert!(db.load().is_err());
    }

    #[test]
    fn snapshot_stores_league_and_state() {
        let db = test_db();
        let mut league = League::with_admins(["admin".to_string()]);
        league.register_player(Player::new("p1", "Ana", Position::Goalkeeper, None));
        let state = DraftState::new();
        db.save_snapshot(&league, &state).unwrap();
        assert_eq!(db.load_league().unwrap(), Some(league));
        assert_eq!(db.load().unwrap(), Some(state));
    }

    #[test]
    fn draft_id_persists_via_state_store() {
        let db = test_db();
        assert_eq!(db.get_draft_id().unwrap(), None);
        db.set_draft_id("draft_x").unwrap();
        assert_eq!(db.get_draft_id().unwrap(), Some("draft_x".to_string()));
    }

    #[test]
    fn generate_draft_id_format() {
        let id = Database::generate_draft_id();
        assert!(id.starts_with("draft_"));
        // draft_YYYYMMDD_HHMMSS_mmm
        assert_eq!(id.len(), "draft_20260228_143022_123".len());
    }
}
