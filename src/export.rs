//! Flat tabular export of a finished (or in-progress) session.
//!
//! Export only reads what the session store already holds; nothing is
//! regenerated or rescored here.

use crate::geometry::Point3;
use crate::session::{SessionStore, TraceAttempt};
use crate::Result;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const ATTEMPT_TAG: &str = "_attempt_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum_macros::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PathType {
    Guide,
    User,
}

/// One row of `points.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub task: String,
    pub path_type: PathType,
    pub point_idx: usize,
    /// Empty for guide rows
    pub timestamp: Option<f64>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ExportRow {
    pub fn position(&self) -> Point3 {
        Point3::new(self.x, self.y, self.z)
    }
}

/// One row of `attempts.csv`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub task: String,
    pub attempt_number: u32,
    pub timestamp: DateTime<Local>,
    pub total_trace_length: f64,
    pub max_amplitude: f64,
    pub average_amplitude: f64,
}

/// Files written by [`export_to_dir`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPaths {
    pub points: PathBuf,
    pub attempts: PathBuf,
    pub session: PathBuf,
}

/// `task` label used for one attempt of a trial
pub fn task_label(trial_name: &str, attempt_number: u32) -> String {
    format!("{trial_name}{ATTEMPT_TAG}{attempt_number}")
}

/// Splits a `task` label back into trial name and attempt number.
pub fn parse_task_label(task: &str) -> Option<(&str, u32)> {
    let (name, number) = task.rsplit_once(ATTEMPT_TAG)?;
    Some((name, number.parse().ok()?))
}

fn attempt_rows<'a>(
    trial_name: &str,
    attempt: &'a TraceAttempt,
) -> impl Iterator<Item = ExportRow> + 'a {
    let task = task_label(trial_name, attempt.attempt_number);
    let guide = attempt
        .guide
        .points()
        .iter()
        .enumerate()
        .map({
            let task = task.clone();
            move |(i, p)| ExportRow {
                task: task.clone(),
                path_type: PathType::Guide,
                point_idx: i,
                timestamp: None,
                x: p.x,
                y: p.y,
                z: p.z,
            }
        });
    let user = attempt.points.iter().enumerate().map(move |(i, s)| ExportRow {
        task: task.clone(),
        path_type: PathType::User,
        point_idx: i,
        timestamp: Some(s.t),
        x: s.position.x,
        y: s.position.y,
        z: s.position.z,
    });
    guide.chain(user)
}

/// Every guide and user point of the session, trials in configured order.
///
/// Returns `None` when no attempt has been recorded yet.
pub fn export_all(store: &SessionStore) -> Option<Vec<ExportRow>> {
    if store.is_empty() {
        return None;
    }
    let rows = store
        .trials()
        .iter()
        .flat_map(|trial| {
            trial
                .attempts
                .iter()
                .flat_map(move |attempt| attempt_rows(&trial.name, attempt))
        })
        .collect();
    Some(rows)
}

/// Per-attempt summary records, trials in configured order
pub fn attempt_records(store: &SessionStore) -> Vec<AttemptRecord> {
    store
        .trials()
        .iter()
        .flat_map(|trial| {
            trial.attempts.iter().map(move |a| AttemptRecord {
                task: trial.name.clone(),
                attempt_number: a.attempt_number,
                timestamp: a.recorded_at,
                total_trace_length: a.score.path_length,
                max_amplitude: a.score.max_deviation,
                average_amplitude: a.score.average_deviation,
            })
        })
        .collect()
}

pub fn write_points_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn read_points_csv<R: Read>(reader: R) -> Result<Vec<ExportRow>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let rows = rdr.deserialize().collect::<std::result::Result<Vec<ExportRow>, _>>()?;
    Ok(rows)
}

pub fn write_attempts_csv<W: Write>(records: &[AttemptRecord], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_session_json<W: Write>(store: &SessionStore, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, store)?;
    Ok(())
}

/// Guide points of one attempt, as found in exported rows
pub fn guide_points(rows: &[ExportRow], trial_name: &str, attempt_number: u32) -> Vec<Point3> {
    let mut guide: Vec<&ExportRow> = rows
        .iter()
        .filter(|r| r.path_type == PathType::Guide)
        .filter(|r| parse_task_label(&r.task) == Some((trial_name, attempt_number)))
        .collect();
    guide.sort_by_key(|r| r.point_idx);
    guide.into_iter().map(ExportRow::position).collect()
}

/// Writes `points.csv`, `attempts.csv` and `session.json` into `dir`.
///
/// Nothing is written, and `None` returned, when the session has no attempts.
pub fn export_to_dir(store: &SessionStore, dir: &Path) -> Result<Option<ExportPaths>> {
    let Some(rows) = export_all(store) else {
        log::info!("nothing to export");
        return Ok(None);
    };
    fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        points: dir.join("points.csv"),
        attempts: dir.join("attempts.csv"),
        session: dir.join("session.json"),
    };
    write_points_csv(&rows, BufWriter::new(File::create(&paths.points)?))?;
    write_attempts_csv(
        &attempt_records(store),
        BufWriter::new(File::create(&paths.attempts)?),
    )?;
    let mut session = BufWriter::new(File::create(&paths.session)?);
    write_session_json(store, &mut session)?;
    session.flush()?;

    log::info!(
        "exported {} rows from {} attempts to {}",
        rows.len(),
        store.total_attempts(),
        dir.display()
    );
    Ok(Some(paths))
}
