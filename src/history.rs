use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rusqlite::{params, Connection};

use crate::app_dirs::AppDirs;
use crate::session::SessionStore;
use crate::Result;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS attempts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id TEXT NOT NULL,
        trial TEXT NOT NULL,
        kind TEXT NOT NULL,
        attempt_number INTEGER NOT NULL,
        recorded_at TEXT NOT NULL,
        path_length REAL NOT NULL,
        max_deviation REAL NOT NULL,
        average_deviation REAL NOT NULL,
        duration_secs REAL NOT NULL,
        sample_count INTEGER NOT NULL,
        created_at DATETIME DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_attempts_trial ON attempts(trial);
    CREATE INDEX IF NOT EXISTS idx_attempts_session ON attempts(session_id);
"#;

/// Stored summary of one attempt
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptSummary {
    pub session_id: String,
    pub trial: String,
    pub kind: String,
    pub attempt_number: u32,
    pub recorded_at: DateTime<Local>,
    pub path_length: f64,
    pub max_deviation: f64,
    pub average_deviation: f64,
    pub duration_secs: f64,
    pub sample_count: usize,
}

/// Aggregate over every stored attempt of one trial
#[derive(Debug, Clone, PartialEq)]
pub struct TrialSummary {
    pub trial: String,
    pub sessions: i64,
    pub attempts: i64,
    pub mean_max_deviation: f64,
    pub mean_average_deviation: f64,
    pub best_max_deviation: f64,
}

/// Attempt history across sessions
#[derive(Debug)]
pub struct HistoryDb {
    conn: Connection,
}

impl HistoryDb {
    /// Opens (creating if needed) the database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    /// Opens the database under the user's state directory.
    pub fn open_default() -> Result<Self> {
        Self::open(Self::default_path())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    pub fn default_path() -> PathBuf {
        AppDirs::history_db_path().unwrap_or_else(|| PathBuf::from("fingertrace_history.db"))
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(HistoryDb { conn })
    }

    /// Stores every attempt of `store` under `session_id`, in one transaction.
    pub fn record_session(&mut self, store: &SessionStore, session_id: &str) -> Result<usize> {
        let tx = self.conn.transaction()?;
        let mut count = 0;
        for log in store.trials() {
            for attempt in &log.attempts {
                tx.execute(
                    r#"
                    INSERT INTO attempts
                    (session_id, trial, kind, attempt_number, recorded_at, path_length,
                     max_deviation, average_deviation, duration_secs, sample_count)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    "#,
                    params![
                        session_id,
                        log.name,
                        log.kind.to_string(),
                        attempt.attempt_number,
                        attempt.recorded_at.to_rfc3339(),
                        attempt.score.path_length,
                        attempt.score.max_deviation,
                        attempt.score.average_deviation,
                        attempt.score.duration_secs,
                        attempt.score.sample_count as i64,
                    ],
                )?;
                count += 1;
            }
        }
        tx.commit()?;
        log::info!("stored {count} attempts for session {session_id}");
        Ok(count)
    }

    /// Attempts of one trial, oldest first
    pub fn attempts_for_trial(&self, trial: &str) -> Result<Vec<AttemptSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT session_id, trial, kind, attempt_number, recorded_at, path_length,
                   max_deviation, average_deviation, duration_secs, sample_count
            FROM attempts
            WHERE trial = ?1
            ORDER BY recorded_at, attempt_number
            "#,
        )?;

        let rows = stmt.query_map([trial], |row| {
            let stamp: String = row.get(4)?;
            let recorded_at = DateTime::parse_from_rfc3339(&stamp)
                .map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        4,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?
                .with_timezone(&Local);
            Ok(AttemptSummary {
                session_id: row.get(0)?,
                trial: row.get(1)?,
                kind: row.get(2)?,
                attempt_number: row.get(3)?,
                recorded_at,
                path_length: row.get(5)?,
                max_deviation: row.get(6)?,
                average_deviation: row.get(7)?,
                duration_secs: row.get(8)?,
                sample_count: row.get::<_, i64>(9)? as usize,
            })
        })?;

        let mut attempts = Vec::new();
        for attempt in rows {
            attempts.push(attempt?);
        }
        Ok(attempts)
    }

    pub fn trial_summary(&self) -> Result<Vec<TrialSummary>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT
                trial,
                COUNT(DISTINCT session_id),
                COUNT(*),
                AVG(max_deviation),
                AVG(average_deviation),
                MIN(max_deviation)
            FROM attempts
            GROUP BY trial
            ORDER BY trial
            "#,
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(TrialSummary {
                trial: row.get(0)?,
                sessions: row.get(1)?,
                attempts: row.get(2)?,
                mean_max_deviation: row.get(3)?,
                mean_average_deviation: row.get(4)?,
                best_max_deviation: row.get(5)?,
            })
        })?;

        let mut summary = Vec::new();
        for item in rows {
            summary.push(item?);
        }
        Ok(summary)
    }

    pub fn session_count(&self) -> Result<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(DISTINCT session_id) FROM attempts",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn clear_all(&self) -> Result<()> {
        self.conn.execute("DELETE FROM attempts", [])?;
        Ok(())
    }
}
