//! SQLite-based activity history.
//!
//! Provides persistent storage for:
//! - Completed runs, focus phases and games
//! - Summary statistics over that history
//! - Key-value store for application state (energy balance, session state)

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::energy::BalanceStore;
use crate::error::{DatabaseError, Result};
use crate::session::{ActivityRecord, ActivityRecorder, RecordedActivity};

const BALANCE_KEY: &str = "energy_balance";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Stats {
    pub runs: u64,
    pub run_seconds: u64,
    pub pomodoros: u64,
    pub focus_minutes: u64,
    pub games: u64,
    pub best_score: u64,
}

/// SQLite database for activity history.
pub struct Database {
    conn: Connection,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Database {
    /// Open the database at `<data_dir>/focusflow.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("focusflow.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS runs (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                started_at    TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                recorded_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS pomodoros (
                id            INTEGER PRIMARY KEY AUTOINCREMENT,
                focus_minutes INTEGER NOT NULL,
                rest_minutes  INTEGER NOT NULL,
                recorded_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS games (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                score       INTEGER NOT NULL,
                seconds     INTEGER NOT NULL,
                recorded_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_recorded_at ON runs(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_pomodoros_recorded_at ON pomodoros(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_games_recorded_at ON games(recorded_at);",
        )?;
        Ok(())
    }

    /// Insert one activity and return its row id within its table.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_record(
        &self,
        at: DateTime<Utc>,
        activity: &ActivityRecord,
    ) -> Result<i64, DatabaseError> {
        let recorded_at = timestamp(at);
        match activity {
            ActivityRecord::Run {
                started_at,
                duration_secs,
            } => self.conn.execute(
                "INSERT INTO runs (started_at, duration_secs, recorded_at) VALUES (?1, ?2, ?3)",
                params![timestamp(*started_at), duration_secs, recorded_at],
            )?,
            ActivityRecord::Pomodoro {
                focus_minutes,
                rest_minutes,
            } => self.conn.execute(
                "INSERT INTO pomodoros (focus_minutes, rest_minutes, recorded_at) VALUES (?1, ?2, ?3)",
                params![focus_minutes, rest_minutes, recorded_at],
            )?,
            ActivityRecord::Game { score, seconds } => self.conn.execute(
                "INSERT INTO games (score, seconds, recorded_at) VALUES (?1, ?2, ?3)",
                params![score, seconds, recorded_at],
            )?,
        };
        Ok(self.conn.last_insert_rowid())
    }

    /// Most recent activities first, across all kinds.
    pub fn recent_records(&self, limit: usize) -> Result<Vec<RecordedActivity>, DatabaseError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, recorded_at, 'run', started_at, duration_secs, 0 FROM runs
             UNION ALL
             SELECT id, recorded_at, 'pomodoro', NULL, focus_minutes, rest_minutes FROM pomodoros
             UNION ALL
             SELECT id, recorded_at, 'game', NULL, score, seconds FROM games
             ORDER BY 2 DESC, 1 DESC
             LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![limit], |row| {
            Ok(RawRecord {
                id: row.get(0)?,
                recorded_at: row.get(1)?,
                kind: row.get(2)?,
                started_at: row.get(3)?,
                first: row.get(4)?,
                second: row.get(5)?,
            })
        })?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    pub fn stats(&self) -> Result<Stats, DatabaseError> {
        let (runs, run_seconds) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(duration_secs), 0) FROM runs",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let (pomodoros, focus_minutes) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(focus_minutes), 0) FROM pomodoros",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        let (games, best_score) = self.conn.query_row(
            "SELECT COUNT(*), COALESCE(MAX(score), 0) FROM games",
            [],
            |row| Ok((row.get::<_, u64>(0)?, row.get::<_, u64>(1)?)),
        )?;
        Ok(Stats {
            runs,
            run_seconds,
            pomodoros,
            focus_minutes,
            games,
            best_score,
        })
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

struct RawRecord {
    id: i64,
    recorded_at: String,
    kind: String,
    started_at: Option<String>,
    first: u64,
    second: u64,
}

impl RawRecord {
    fn into_record(self) -> Result<RecordedActivity, DatabaseError> {
        let narrow = |value: u64| {
            u32::try_from(value).map_err(|e| DatabaseError::CorruptValue {
                key: self.kind.clone(),
                message: e.to_string(),
            })
        };
        let activity = match self.kind.as_str() {
            "run" => ActivityRecord::Run {
                started_at: parse_timestamp(
                    "started_at",
                    self.started_at.as_deref().unwrap_or(&self.recorded_at),
                )?,
                duration_secs: self.first,
            },
            "pomodoro" => ActivityRecord::Pomodoro {
                focus_minutes: narrow(self.first)?,
                rest_minutes: narrow(self.second)?,
            },
            "game" => ActivityRecord::Game {
                score: narrow(self.first)?,
                seconds: narrow(self.second)?,
            },
            other => {
                return Err(DatabaseError::CorruptValue {
                    key: "kind".into(),
                    message: format!("unknown record kind '{other}'"),
                })
            }
        };
        Ok(RecordedActivity {
            id: self.id,
            recorded_at: parse_timestamp("recorded_at", &self.recorded_at)?,
            activity,
        })
    }
}

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(key: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::CorruptValue {
            key: key.to_string(),
            message: e.to_string(),
        })
}

impl ActivityRecorder for Database {
    fn record(&self, at: DateTime<Utc>, activity: &ActivityRecord) -> Result<()> {
        self.insert_record(at, activity)?;
        Ok(())
    }
}

impl BalanceStore for Database {
    fn load_balance(&self) -> Result<Option<u64>> {
        let Some(raw) = self.kv_get(BALANCE_KEY)? else {
            return Ok(None);
        };
        let balance = raw.parse::<u64>().map_err(|e| DatabaseError::CorruptValue {
            key: BALANCE_KEY.into(),
            message: e.to_string(),
        })?;
        Ok(Some(balance))
    }

    fn save_balance(&self, balance: u64) -> Result<()> {
        self.kv_set(BALANCE_KEY, &balance.to_string())?;
        Ok(())
    }
}
