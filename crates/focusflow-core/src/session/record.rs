use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Raw activity worth keeping in history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivityRecord {
    Run {
        started_at: DateTime<Utc>,
        duration_secs: u64,
    },
    Pomodoro {
        focus_minutes: u32,
        rest_minutes: u32,
    },
    Game {
        score: u32,
        seconds: u32,
    },
}

/// A record as read back from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedActivity {
    pub id: i64,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub activity: ActivityRecord,
}

/// Append-only sink for completed activities. The session engine calls it
/// after crediting energy and ignores (but logs) any failure.
pub trait ActivityRecorder {
    fn record(&self, at: DateTime<Utc>, activity: &ActivityRecord) -> Result<()>;
}

impl<T: ActivityRecorder + ?Sized> ActivityRecorder for Rc<T> {
    fn record(&self, at: DateTime<Utc>, activity: &ActivityRecord) -> Result<()> {
        (**self).record(at, activity)
    }
}
