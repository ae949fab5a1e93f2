//! Anchor-based interval timer.
//!
//! The timer never accumulates time by ticking. Elapsed time is derived from
//! two values: `accumulated` (sum of all finished running segments) and
//! `anchor` (the instant the live segment began):
//!
//! ```text
//! Running { anchor, accumulated }  elapsed = accumulated + (now - anchor)
//! Paused  { accumulated }          elapsed = accumulated
//! Idle                             elapsed = 0
//! ```
//!
//! A missed or late poll therefore can't skew the result, and a state that
//! was serialized before the process was suspended yields the right value
//! once it is reloaded.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --start--> Running --pause--> Paused --resume--> Running
//!   ^                |                  |
//!   +----stop/reset--+------------------+
//! ```

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Shortest countdown the timer accepts. Zero targets are raised to this so
/// completion is always reachable through a poll.
pub const MIN_COUNTDOWN: Duration = Duration::from_secs(1);

/// Coarse status, used in errors and snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        };
        f.write_str(s)
    }
}

/// Counting direction, fixed for the lifetime of one timer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimerMode {
    CountUp,
    Countdown { target: Duration },
}

impl TimerMode {
    pub fn countdown(target: Duration) -> Self {
        TimerMode::Countdown {
            target: target.max(MIN_COUNTDOWN),
        }
    }

    pub fn target(&self) -> Option<Duration> {
        match self {
            TimerMode::CountUp => None,
            TimerMode::Countdown { target } => Some(*target),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Running {
        anchor: DateTime<Utc>,
        accumulated: Duration,
    },
    Paused {
        accumulated: Duration,
    },
}

/// Count-up or countdown timer driven by injected instants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTimer {
    mode: TimerMode,
    state: TimerState,
    /// Bumped whenever a timer session begins or ends. Periodic callbacks
    /// capture it and must be ignored once it has moved on.
    #[serde(default)]
    generation: u64,
}

impl Default for IntervalTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTimer {
    pub fn new() -> Self {
        Self {
            mode: TimerMode::CountUp,
            state: TimerState::Idle,
            generation: 0,
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn mode(&self) -> TimerMode {
        self.mode
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn status(&self) -> TimerStatus {
        match self.state {
            TimerState::Idle => TimerStatus::Idle,
            TimerState::Running { .. } => TimerStatus::Running,
            TimerState::Paused { .. } => TimerStatus::Paused,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status() == TimerStatus::Running
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Start of the live running segment, if any.
    pub fn anchor(&self) -> Option<DateTime<Utc>> {
        match self.state {
            TimerState::Running { anchor, .. } => Some(anchor),
            _ => None,
        }
    }

    /// Elapsed time confirmed by finished segments.
    pub fn accumulated(&self) -> Duration {
        match self.state {
            TimerState::Idle => Duration::ZERO,
            TimerState::Running { accumulated, .. } | TimerState::Paused { accumulated } => {
                accumulated
            }
        }
    }

    /// Elapsed time at `now`. Countdown elapsed never exceeds the target.
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        let raw = match self.state {
            TimerState::Idle => Duration::ZERO,
            TimerState::Running {
                anchor,
                accumulated,
            } => accumulated.saturating_add(segment(anchor, now)),
            TimerState::Paused { accumulated } => accumulated,
        };
        match self.mode.target() {
            Some(target) => raw.min(target),
            None => raw,
        }
    }

    /// Remaining countdown time at `now`, clamped at zero. `None` in count-up mode.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.mode
            .target()
            .map(|target| target.saturating_sub(self.elapsed(now)))
    }

    /// True once a countdown has no time left. Always false in count-up mode
    /// and while idle.
    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.status() != TimerStatus::Idle && self.remaining(now) == Some(Duration::ZERO)
    }

    /// Instant a running countdown reaches zero. Derived from the anchor, so
    /// it does not move between polls.
    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        let target = self.mode.target()?;
        match self.state {
            TimerState::Running {
                anchor,
                accumulated,
            } => {
                let left = TimeDelta::from_std(target.saturating_sub(accumulated)).ok()?;
                anchor.checked_add_signed(left)
            }
            _ => None,
        }
    }

    /// 0.0 ..= 1.0 progress of a countdown.
    pub fn progress(&self, now: DateTime<Utc>) -> Option<f64> {
        let target = self.mode.target()?;
        Some((self.elapsed(now).as_secs_f64() / target.as_secs_f64()).clamp(0.0, 1.0))
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub fn start(&mut self, mode: TimerMode, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.expect(TimerStatus::Idle, "start")?;
        self.mode = match mode {
            TimerMode::Countdown { target } => TimerMode::countdown(target),
            TimerMode::CountUp => TimerMode::CountUp,
        };
        self.state = TimerState::Running {
            anchor: now,
            accumulated: Duration::ZERO,
        };
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }

    /// Fold the live segment into `accumulated`. Returns elapsed so far.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Duration, TimerError> {
        match self.state {
            TimerState::Running {
                anchor,
                accumulated,
            } => {
                let accumulated = accumulated.saturating_add(segment(anchor, now));
                self.state = TimerState::Paused { accumulated };
                Ok(self.elapsed(now))
            }
            _ => Err(self.invalid("pause")),
        }
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        match self.state {
            TimerState::Paused { accumulated } => {
                self.state = TimerState::Running {
                    anchor: now,
                    accumulated,
                };
                Ok(())
            }
            _ => Err(self.invalid("resume")),
        }
    }

    /// Finish the session and return its elapsed time. Never fails; an idle
    /// timer reports zero.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Duration {
        let elapsed = self.elapsed(now);
        if self.state != TimerState::Idle {
            self.state = TimerState::Idle;
            self.generation = self.generation.wrapping_add(1);
        }
        elapsed
    }

    /// Drop all accumulated time and return to idle.
    pub fn reset(&mut self) {
        self.state = TimerState::Idle;
        self.generation = self.generation.wrapping_add(1);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn expect(&self, status: TimerStatus, operation: &'static str) -> Result<(), TimerError> {
        if self.status() == status {
            Ok(())
        } else {
            Err(self.invalid(operation))
        }
    }

    fn invalid(&self, operation: &'static str) -> TimerError {
        TimerError::InvalidState {
            operation,
            status: self.status(),
        }
    }
}

/// Length of a running segment. A clock that stepped backwards yields zero.
fn segment(anchor: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - anchor).to_std().unwrap_or_default()
}

/// Render a duration as `MM:SS`; minutes are not wrapped into hours.
pub fn format_mmss(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
