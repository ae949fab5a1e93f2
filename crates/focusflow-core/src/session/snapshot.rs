//! Denormalized projections of session state for out-of-process readers.
//!
//! A companion display (a home-screen widget, a status bar) reads these
//! snapshots from shared storage. They are rewritten on every state
//! change, never ticked: readers derive live values from the timestamps.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::data_dir;
use crate::timer::{IntervalTimer, Phase, PhaseScheduler, TimerStatus};

const SESSION_FILE: &str = "session.json";
const RUNNING_FILE: &str = "running.json";

/// Phase as seen by snapshot readers: both break kinds collapse to `break`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotPhase {
    Focus,
    Break,
}

impl From<Phase> for SnapshotPhase {
    fn from(phase: Phase) -> Self {
        if phase.is_break() {
            SnapshotPhase::Break
        } else {
            SnapshotPhase::Focus
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub phase: SnapshotPhase,
    pub is_running: bool,
    /// Set only while running.
    pub end_instant: Option<DateTime<Utc>>,
    pub completed_focus_count: u32,
}

impl SessionSnapshot {
    pub fn from_scheduler(scheduler: &PhaseScheduler) -> Self {
        let is_running = scheduler.is_running();
        Self {
            phase: scheduler.phase().into(),
            is_running,
            end_instant: if is_running { scheduler.end_instant() } else { None },
            completed_focus_count: scheduler.completed_focus_count(),
        }
    }

    /// Reader-side remaining time: `max(0, end_instant - now)`.
    pub fn remaining_at(&self, now: DateTime<Utc>) -> Option<Duration> {
        let end = self.end_instant.filter(|_| self.is_running)?;
        Some((end - now).to_std().unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Idle,
    Running,
    Paused,
}

impl From<TimerStatus> for RunPhase {
    fn from(status: TimerStatus) -> Self {
        match status {
            TimerStatus::Idle => RunPhase::Idle,
            TimerStatus::Running => RunPhase::Running,
            TimerStatus::Paused => RunPhase::Paused,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningSnapshot {
    pub phase: RunPhase,
    /// Anchor of the live running segment.
    pub start_instant: Option<DateTime<Utc>>,
    /// Elapsed time confirmed before `start_instant`.
    pub elapsed_seconds: f64,
}

impl RunningSnapshot {
    pub fn from_timer(timer: &IntervalTimer) -> Self {
        Self {
            phase: timer.status().into(),
            start_instant: timer.anchor(),
            elapsed_seconds: timer.accumulated().as_secs_f64(),
        }
    }

    /// Reader-side elapsed time at `now`.
    pub fn elapsed_at(&self, now: DateTime<Utc>) -> f64 {
        let live = match (self.phase, self.start_instant) {
            (RunPhase::Running, Some(start)) => {
                (now - start).to_std().unwrap_or_default().as_secs_f64()
            }
            _ => 0.0,
        };
        self.elapsed_seconds + live
    }
}

/// Destination for published snapshots.
pub trait SnapshotSink {
    fn write_session(&self, snapshot: &SessionSnapshot) -> Result<()>;
    fn write_running(&self, snapshot: &RunningSnapshot) -> Result<()>;
}

/// Snapshots as JSON files in a shared directory.
///
/// Files are replaced atomically so a reader never sees a half-written
/// document.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Store under `<data_dir>/shared/`.
    pub fn open_default() -> Result<Self> {
        Self::new(data_dir()?.join("shared"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn read_session(&self) -> Result<Option<SessionSnapshot>> {
        read_json(&self.dir.join(SESSION_FILE))
    }

    pub fn read_running(&self) -> Result<Option<RunningSnapshot>> {
        read_json(&self.dir.join(RUNNING_FILE))
    }

    fn write(&self, name: &str, value: &impl Serialize) -> Result<()> {
        let path = self.dir.join(name);
        let tmp = self.dir.join(format!(".{name}.tmp"));
        fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl SnapshotSink for SnapshotStore {
    fn write_session(&self, snapshot: &SessionSnapshot) -> Result<()> {
        self.write(SESSION_FILE, snapshot)
    }

    fn write_running(&self, snapshot: &RunningSnapshot) -> Result<()> {
        self.write(RUNNING_FILE, snapshot)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
struct Published {
    session: Option<SessionSnapshot>,
    running: Option<RunningSnapshot>,
    writes: usize,
}

/// In-process sink. Clones share the same slots.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshots {
    inner: Rc<RefCell<Published>>,
}

impl MemorySnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self) -> Option<SessionSnapshot> {
        self.inner.borrow().session.clone()
    }

    pub fn running(&self) -> Option<RunningSnapshot> {
        self.inner.borrow().running.clone()
    }

    /// Number of session snapshot writes so far.
    pub fn writes(&self) -> usize {
        self.inner.borrow().writes
    }
}

impl SnapshotSink for MemorySnapshots {
    fn write_session(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.session = Some(snapshot.clone());
        inner.writes += 1;
        Ok(())
    }

    fn write_running(&self, snapshot: &RunningSnapshot) -> Result<()> {
        self.inner.borrow_mut().running = Some(snapshot.clone());
        Ok(())
    }
}
