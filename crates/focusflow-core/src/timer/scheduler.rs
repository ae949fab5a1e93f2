//! Pomodoro phase state machine.
//!
//! Owns one countdown [`IntervalTimer`] and cycles it through
//! Focus / ShortBreak / LongBreak. Like the timer, it has no thread of its
//! own: the caller polls [`PhaseScheduler::tick`] to surface completion.
//! Polling only *observes* the anchored countdown, so a late or missing
//! poll delays the completion event but never changes the outcome.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::interval::{IntervalTimer, TimerMode, TimerStatus};
use super::phase::{Phase, PhaseSettings, SkipBehavior};
use crate::error::{ConfigError, TimerError};

/// Outcome of a phase reaching zero (or being marked complete).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseCompletion {
    pub completed: Phase,
    pub next: Phase,
    pub completed_focus_count: u32,
    /// Configured focus length, in minutes.
    pub focus_minutes: u32,
    /// Length of the break that follows a completed focus phase; zero when
    /// a break completed.
    pub rest_minutes: u32,
    pub auto_started: bool,
    pub at: DateTime<Utc>,
}

/// Outcome of a manual skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseSkip {
    pub from: Phase,
    pub to: Phase,
    pub auto_started: bool,
    /// Set when the countdown had already reached zero. The phase was
    /// completed with credit instead of skipped.
    pub settled: Option<PhaseCompletion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseScheduler {
    settings: PhaseSettings,
    phase: Phase,
    completed_focus_count: u32,
    timer: IntervalTimer,
}

impl PhaseScheduler {
    /// Create a scheduler at the first Focus phase, idle.
    pub fn new(settings: PhaseSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            settings,
            phase: Phase::Focus,
            completed_focus_count: 0,
            timer: IntervalTimer::new(),
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn completed_focus_count(&self) -> u32 {
        self.completed_focus_count
    }

    pub fn status(&self) -> TimerStatus {
        self.timer.status()
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_running()
    }

    pub fn settings(&self) -> &PhaseSettings {
        &self.settings
    }

    pub fn timer(&self) -> &IntervalTimer {
        &self.timer
    }

    pub fn generation(&self) -> u64 {
        self.timer.generation()
    }

    /// Target of the current phase. A live countdown keeps the target it
    /// started with even if settings changed since.
    pub fn target(&self) -> Duration {
        self.timer
            .mode()
            .target()
            .filter(|_| self.timer.status() != TimerStatus::Idle)
            .unwrap_or_else(|| self.settings.duration_for(self.phase))
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        match self.timer.status() {
            TimerStatus::Idle => self.settings.duration_for(self.phase),
            _ => self.timer.remaining(now).unwrap_or_default(),
        }
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        self.timer.elapsed(now)
    }

    pub fn end_instant(&self) -> Option<DateTime<Utc>> {
        self.timer.end_instant()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start the current phase, or resume it when paused. Starting a phase
    /// that is already running is an error.
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        match self.timer.status() {
            TimerStatus::Paused => self.timer.resume(now),
            _ => {
                let mode = TimerMode::countdown(self.settings.duration_for(self.phase));
                self.timer.start(mode, now)
            }
        }
    }

    /// Pausing a countdown that already reached zero leaves it paused at
    /// zero; the next [`tick`](Self::tick) still completes it. Call
    /// [`settle`](Self::settle) first to complete it right away.
    pub fn pause(&mut self, now: DateTime<Utc>) -> Result<Duration, TimerError> {
        self.timer.pause(now)
    }

    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<(), TimerError> {
        self.timer.resume(now)
    }

    /// Abandon the current phase without credit and load the next one. A
    /// countdown that already reached zero is completed instead, see
    /// [`PhaseSkip::settled`].
    pub fn skip(&mut self, now: DateTime<Utc>) -> PhaseSkip {
        if let Some(completion) = self.settle(now) {
            return PhaseSkip {
                from: completion.completed,
                to: completion.next,
                auto_started: completion.auto_started,
                settled: Some(completion),
            };
        }

        let from = self.phase;
        self.timer.reset();
        self.phase = self.settings.next_phase(from, self.completed_focus_count);

        let auto_started = self.settings.auto_continue
            && self.settings.skip_behavior == SkipBehavior::AutoContinue
            && self.start(now).is_ok();

        debug!(?from, to = ?self.phase, auto_started, "phase skipped");
        PhaseSkip {
            from,
            to: self.phase,
            auto_started,
            settled: None,
        }
    }

    /// Mark the current phase complete before its countdown ran out.
    pub fn complete(&mut self, now: DateTime<Utc>) -> Result<PhaseCompletion, TimerError> {
        if self.timer.status() == TimerStatus::Idle {
            return Err(TimerError::InvalidState {
                operation: "complete",
                status: TimerStatus::Idle,
            });
        }
        Ok(self.finish_phase(now))
    }

    /// Call periodically. Returns `Some` exactly once per countdown that
    /// reaches zero.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Option<PhaseCompletion> {
        self.settle(now)
    }

    /// Complete the current phase if its countdown has reached zero, running
    /// or paused. Commands call this first so a crossing nobody polled for
    /// is still credited.
    pub fn settle(&mut self, now: DateTime<Utc>) -> Option<PhaseCompletion> {
        if self.timer.is_complete(now) {
            Some(self.finish_phase(now))
        } else {
            None
        }
    }

    /// Like [`tick`](Self::tick), but ignored when `generation` belongs to a
    /// timer session that has since been stopped, skipped or reset.
    pub fn tick_scheduled(&mut self, generation: u64, now: DateTime<Utc>) -> Option<PhaseCompletion> {
        if generation != self.timer.generation() {
            debug!(generation, current = self.timer.generation(), "stale tick ignored");
            return None;
        }
        self.tick(now)
    }

    /// Back to the first Focus phase with the count cleared.
    pub fn reset(&mut self) {
        self.timer.reset();
        self.phase = Phase::Focus;
        self.completed_focus_count = 0;
    }

    /// Swap in new settings. A countdown already in progress keeps its target.
    pub fn reconfigure(&mut self, settings: PhaseSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        self.settings = settings;
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// With auto-continue the next phase is anchored at `now`, the instant
    /// the crossing was observed. After a long suspension that is the late
    /// poll, not the moment the countdown reached zero.
    fn finish_phase(&mut self, now: DateTime<Utc>) -> PhaseCompletion {
        let completed = self.phase;
        self.timer.stop(now);

        if completed == Phase::Focus {
            self.completed_focus_count = self.completed_focus_count.saturating_add(1);
        }
        let next = self.settings.next_phase(completed, self.completed_focus_count);
        self.phase = next;

        let auto_started = self.settings.auto_continue && self.start(now).is_ok();

        PhaseCompletion {
            completed,
            next,
            completed_focus_count: self.completed_focus_count,
            focus_minutes: self.settings.minutes_for(Phase::Focus),
            rest_minutes: if completed == Phase::Focus {
                self.settings.minutes_for(next)
            } else {
                0
            },
            auto_started,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::<Utc>::default() + TimeDelta::seconds(secs)
    }

    fn minute_settings() -> PhaseSettings {
        PhaseSettings::from_minutes(1, 1, 2, 2)
    }

    #[test]
    fn new_rejects_invalid_settings() {
        assert!(PhaseScheduler::new(PhaseSettings::from_minutes(25, 0, 15, 4)).is_err());
    }

    #[test]
    fn starts_idle_on_focus() {
        let scheduler = PhaseScheduler::new(PhaseSettings::default()).unwrap();
        assert_eq!(scheduler.phase(), Phase::Focus);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
        assert_eq!(scheduler.remaining(at(0)), Duration::from_secs(25 * 60));
    }

    #[test]
    fn start_while_running_is_invalid() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        assert_eq!(
            scheduler.start(at(1)),
            Err(TimerError::InvalidState {
                operation: "start",
                status: TimerStatus::Running
            })
        );
    }

    #[test]
    fn start_resumes_a_paused_phase() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        scheduler.pause(at(20)).unwrap();
        scheduler.start(at(100)).unwrap();
        assert_eq!(scheduler.remaining(at(110)), Duration::from_secs(30));
    }

    #[test]
    fn natural_completion_fires_once() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        assert!(scheduler.tick(at(59)).is_none());

        let done = scheduler.tick(at(61)).expect("focus should complete");
        assert_eq!(done.completed, Phase::Focus);
        assert_eq!(done.next, Phase::ShortBreak);
        assert_eq!(done.completed_focus_count, 1);
        assert_eq!(done.focus_minutes, 1);
        assert_eq!(done.rest_minutes, 1);
        assert!(!done.auto_started);

        for s in 62..200 {
            assert!(scheduler.tick(at(s)).is_none());
        }
        assert_eq!(scheduler.completed_focus_count(), 1);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
    }

    #[test]
    fn late_poll_still_completes() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        // Suspended for a day; no poll in between.
        let done = scheduler.tick(at(86_400)).unwrap();
        assert_eq!(done.completed, Phase::Focus);
    }

    #[test]
    fn skip_after_crossing_completes_instead() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        let skip = scheduler.skip(at(120));
        let done = skip.settled.expect("crossed countdown is credited");
        assert_eq!(done.completed, Phase::Focus);
        assert_eq!(done.completed_focus_count, 1);
        assert_eq!(skip.to, Phase::ShortBreak);
        assert_eq!(scheduler.phase(), Phase::ShortBreak);
        assert_eq!(scheduler.completed_focus_count(), 1);
    }

    #[test]
    fn countdown_paused_past_zero_completes_on_next_tick() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        scheduler.pause(at(120)).unwrap();
        assert_eq!(scheduler.remaining(at(120)), Duration::ZERO);

        let done = scheduler.tick(at(130)).expect("paused at zero still completes");
        assert_eq!(done.completed_focus_count, 1);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
        assert!(scheduler.tick(at(140)).is_none());
    }

    #[test]
    fn settle_before_zero_is_a_noop() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        assert!(scheduler.settle(at(0)).is_none());
        scheduler.start(at(0)).unwrap();
        assert!(scheduler.settle(at(59)).is_none());
        assert_eq!(scheduler.status(), TimerStatus::Running);
        assert!(scheduler.skip(at(30)).settled.is_none());
    }

    #[test]
    fn skip_never_credits_focus() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        let skip = scheduler.skip(at(30));
        assert_eq!(skip.from, Phase::Focus);
        assert_eq!(skip.to, Phase::ShortBreak);
        assert_eq!(scheduler.completed_focus_count(), 0);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
        // The skipped countdown can't complete later.
        assert!(scheduler.tick(at(600)).is_none());
    }

    #[test]
    fn skip_from_break_returns_to_focus() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.skip(at(0));
        assert_eq!(scheduler.phase(), Phase::ShortBreak);
        scheduler.skip(at(1));
        assert_eq!(scheduler.phase(), Phase::Focus);
    }

    // Product decision pending: a skip pauses even with auto-continue on.
    #[test]
    fn skip_pauses_even_with_auto_continue() {
        let settings = minute_settings().with_auto_continue(true);
        let mut scheduler = PhaseScheduler::new(settings).unwrap();
        scheduler.start(at(0)).unwrap();
        let skip = scheduler.skip(at(10));
        assert!(!skip.auto_started);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
    }

    // The alternative skip policy, kept behind configuration.
    #[test]
    fn skip_auto_continue_is_opt_in() {
        let settings = minute_settings()
            .with_auto_continue(true)
            .with_skip_behavior(SkipBehavior::AutoContinue);
        let mut scheduler = PhaseScheduler::new(settings).unwrap();
        scheduler.start(at(0)).unwrap();
        let skip = scheduler.skip(at(10));
        assert!(skip.auto_started);
        assert_eq!(scheduler.status(), TimerStatus::Running);
        assert_eq!(scheduler.phase(), Phase::ShortBreak);
    }

    #[test]
    fn auto_continue_starts_next_phase_on_completion() {
        let settings = minute_settings().with_auto_continue(true);
        let mut scheduler = PhaseScheduler::new(settings).unwrap();
        scheduler.start(at(0)).unwrap();
        let done = scheduler.tick(at(60)).unwrap();
        assert!(done.auto_started);
        assert_eq!(scheduler.phase(), Phase::ShortBreak);
        assert_eq!(scheduler.end_instant(), Some(at(120)));
    }

    #[test]
    fn explicit_complete_credits_focus() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        assert!(scheduler.complete(at(0)).is_err());
        scheduler.start(at(0)).unwrap();
        let done = scheduler.complete(at(5)).unwrap();
        assert_eq!(done.completed_focus_count, 1);
        assert_eq!(scheduler.phase(), Phase::ShortBreak);
    }

    #[test]
    fn cadence_through_scheduler_two_rounds() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        let mut now = 0;
        let mut phases = Vec::new();
        for _ in 0..4 {
            let len = scheduler.target().as_secs() as i64;
            scheduler.start(at(now)).unwrap();
            now += len;
            phases.push(scheduler.tick(at(now)).unwrap().next);
        }
        assert_eq!(
            phases,
            vec![Phase::ShortBreak, Phase::Focus, Phase::LongBreak, Phase::Focus]
        );
    }

    #[test]
    fn stale_scheduled_tick_is_ignored() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        let generation = scheduler.generation();
        scheduler.reset();
        scheduler.start(at(10)).unwrap();
        assert!(scheduler.tick_scheduled(generation, at(100)).is_none());
        assert!(scheduler.tick_scheduled(scheduler.generation(), at(100)).is_some());
    }

    #[test]
    fn reset_clears_count_and_phase() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        scheduler.tick(at(60)).unwrap();
        scheduler.reset();
        assert_eq!(scheduler.completed_focus_count(), 0);
        assert_eq!(scheduler.phase(), Phase::Focus);
        assert_eq!(scheduler.status(), TimerStatus::Idle);
    }

    #[test]
    fn reconfigure_keeps_live_target() {
        let mut scheduler = PhaseScheduler::new(minute_settings()).unwrap();
        scheduler.start(at(0)).unwrap();
        scheduler
            .reconfigure(PhaseSettings::from_minutes(50, 10, 30, 4))
            .unwrap();
        assert_eq!(scheduler.target(), Duration::from_secs(60));
        scheduler.tick(at(60)).unwrap();
        assert_eq!(scheduler.target(), Duration::from_secs(10 * 60));
    }
}
