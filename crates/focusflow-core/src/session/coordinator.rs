//! Session coordinator.
//!
//! Ties the focus cycle, the run timer and the energy economy together. It
//! is the only component that reads the [`Clock`]; everything below it gets
//! `now` passed in. After every call that touches state it writes both
//! snapshots and then hands the resulting events to the [`EventBus`], in
//! that order and before returning.
//!
//! Misuse of the state machines (pausing an idle timer, starting a running
//! phase) is logged at `warn` and turned into a no-op.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::record::{ActivityRecord, ActivityRecorder};
use super::snapshot::{RunningSnapshot, SessionSnapshot, SnapshotSink};
use crate::clock::Clock;
use crate::energy::{FlowEvent, RewardEconomy};
use crate::error::{ConfigError, TimerError};
use crate::events::{Event, EventBus};
use crate::timer::{IntervalTimer, Phase, PhaseCompletion, PhaseScheduler, PhaseSettings, TimerMode, TimerStatus};

/// Runs shorter than this earn nothing by default.
pub const DEFAULT_MIN_RUN_CREDIT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub phases: PhaseSettings,
    pub run_target: Duration,
    pub min_run_credit: Duration,
    pub game_entry_cost: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            phases: PhaseSettings::default(),
            run_target: Duration::from_secs(20 * 60),
            min_run_credit: DEFAULT_MIN_RUN_CREDIT,
            game_entry_cost: 1,
        }
    }
}

impl SessionSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.phases.validate()?;
        if self.run_target.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "run.target_minutes".into(),
                message: "duration must be positive".into(),
            });
        }
        if self.game_entry_cost == 0 {
            return Err(ConfigError::InvalidValue {
                key: "game.entry_cost".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

/// Everything needed to pick a session back up in a new process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub scheduler: PhaseScheduler,
    pub run: IntervalTimer,
    #[serde(default)]
    pub run_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_target_announced: bool,
    /// Entry was paid for and the game has not finished yet.
    #[serde(default)]
    pub game_in_progress: bool,
}

impl SessionState {
    /// Nothing worth saving: both timers idle, the cycle at its first Focus
    /// phase and no paid game open.
    pub fn is_pristine(&self) -> bool {
        let scheduler = &self.scheduler;
        scheduler.status() == TimerStatus::Idle
            && scheduler.phase() == Phase::Focus
            && scheduler.completed_focus_count() == 0
            && self.run.status() == TimerStatus::Idle
            && !self.game_in_progress
    }
}

/// Generations captured when a periodic callback was scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken {
    focus: u64,
    run: u64,
}

/// Result of asking to enter the gated game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GameEntry {
    Granted { balance: u64 },
    Locked { cost: u64, balance: u64 },
}

pub struct SessionCoordinator {
    clock: Arc<dyn Clock>,
    settings: SessionSettings,
    state: SessionState,
    economy: RewardEconomy,
    bus: EventBus,
    snapshots: Option<Box<dyn SnapshotSink>>,
    recorder: Option<Box<dyn ActivityRecorder>>,
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCoordinator")
            .field("settings", &self.settings)
            .field("state", &self.state)
            .field("economy", &self.economy)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl SessionCoordinator {
    pub fn new(
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
        economy: RewardEconomy,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;
        let scheduler = PhaseScheduler::new(settings.phases.clone())?;
        Ok(Self {
            clock,
            settings,
            state: SessionState {
                scheduler,
                run: IntervalTimer::new(),
                run_started_at: None,
                run_target_announced: false,
                game_in_progress: false,
            },
            economy,
            bus: EventBus::new(),
            snapshots: None,
            recorder: None,
        })
    }

    pub fn with_snapshots(mut self, sink: Box<dyn SnapshotSink>) -> Self {
        self.snapshots = Some(sink);
        self
    }

    pub fn with_recorder(mut self, recorder: Box<dyn ActivityRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Continue from a state saved by an earlier process. Current settings
    /// win over the ones stored with the state.
    pub fn restore(&mut self, mut state: SessionState) -> Result<(), ConfigError> {
        state.scheduler.reconfigure(self.settings.phases.clone())?;
        self.state = state;
        self.publish(Vec::new());
        Ok(())
    }

    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.bus.subscribe(subscriber);
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn scheduler(&self) -> &PhaseScheduler {
        &self.state.scheduler
    }

    pub fn run_timer(&self) -> &IntervalTimer {
        &self.state.run
    }

    pub fn economy(&self) -> &RewardEconomy {
        &self.economy
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn focus_remaining(&self) -> Duration {
        self.state.scheduler.remaining(self.clock.now())
    }

    pub fn run_elapsed(&self) -> Duration {
        self.state.run.elapsed(self.clock.now())
    }

    pub fn session_snapshot(&self) -> SessionSnapshot {
        SessionSnapshot::from_scheduler(&self.state.scheduler)
    }

    pub fn running_snapshot(&self) -> RunningSnapshot {
        RunningSnapshot::from_timer(&self.state.run)
    }

    pub fn tick_token(&self) -> TickToken {
        TickToken {
            focus: self.state.scheduler.generation(),
            run: self.state.run.generation(),
        }
    }

    // ── Focus cycle ──────────────────────────────────────────────────

    /// Start the current phase, or resume it if paused.
    pub fn start_focus(&mut self) -> Option<Event> {
        let now = self.clock.now();
        let was_paused = self.state.scheduler.status() == TimerStatus::Paused;
        if let Err(e) = self.state.scheduler.start(now) {
            self.misuse(e);
            return None;
        }
        let event = if was_paused {
            self.resumed_event(now)
        } else {
            let scheduler = &self.state.scheduler;
            Event::TimerStarted {
                phase: scheduler.phase(),
                duration_secs: scheduler.target().as_secs(),
                end_instant: scheduler.end_instant(),
                at: now,
            }
        };
        self.publish_one(event)
    }

    /// Pause the current phase. A countdown that already reached zero is
    /// completed first; the pause then applies to the phase that follows,
    /// if it was started.
    pub fn pause_focus(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = self.settle_focus(now);
        if !events.is_empty() && !self.state.scheduler.is_running() {
            return self.publish(events);
        }
        if let Err(e) = self.state.scheduler.pause(now) {
            self.misuse(e);
            return Vec::new();
        }
        events.push(Event::TimerPaused {
            phase: self.state.scheduler.phase(),
            remaining_secs: self.state.scheduler.remaining(now).as_secs(),
            at: now,
        });
        self.publish(events)
    }

    pub fn resume_focus(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let events = self.settle_focus(now);
        if !events.is_empty() {
            // Nothing left paused to resume.
            return self.publish(events);
        }
        if let Err(e) = self.state.scheduler.resume(now) {
            self.misuse(e);
            return Vec::new();
        }
        let event = self.resumed_event(now);
        self.publish(vec![event])
    }

    /// Move on without credit. A phase whose countdown already reached zero
    /// is credited as completed instead.
    pub fn skip_phase(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        let skip = self.state.scheduler.skip(now);
        let events = match skip.settled {
            Some(completion) => self.on_phase_completed(completion),
            None => vec![Event::PhaseSkipped {
                from: skip.from,
                to: skip.to,
                auto_started: skip.auto_started,
                at: now,
            }],
        };
        self.publish(events)
    }

    /// Mark the current phase done before its countdown runs out.
    pub fn complete_phase(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        match self.state.scheduler.complete(now) {
            Ok(completion) => {
                let events = self.on_phase_completed(completion);
                self.publish(events)
            }
            Err(e) => {
                self.misuse(e);
                Vec::new()
            }
        }
    }

    pub fn reset_focus(&mut self) -> Option<Event> {
        let now = self.clock.now();
        self.state.scheduler.reset();
        self.publish_one(Event::PhaseReset { at: now })
    }

    /// Complete a countdown that reached zero with no tick to notice it.
    /// Returns the completion events, unpublished.
    fn settle_focus(&mut self, now: DateTime<Utc>) -> Vec<Event> {
        match self.state.scheduler.settle(now) {
            Some(completion) => self.on_phase_completed(completion),
            None => Vec::new(),
        }
    }

    /// Periodic observation. Detects a finished countdown and the run target.
    pub fn tick(&mut self) -> Vec<Event> {
        let token = self.tick_token();
        self.tick_scheduled(token)
    }

    /// [`tick`](Self::tick) for a callback scheduled earlier; parts whose
    /// timer has been stopped or reset since `token` was taken are skipped.
    pub fn tick_scheduled(&mut self, token: TickToken) -> Vec<Event> {
        let now = self.clock.now();
        let mut events = Vec::new();

        if let Some(completion) = self.state.scheduler.tick_scheduled(token.focus, now) {
            events.extend(self.on_phase_completed(completion));
        }

        if token.run == self.state.run.generation() {
            if let Some(event) = self.check_run_target(now) {
                events.push(event);
            }
        }

        if events.is_empty() {
            return events;
        }
        self.publish(events)
    }

    // ── Run ──────────────────────────────────────────────────────────

    pub fn start_run(&mut self) -> Option<Event> {
        let now = self.clock.now();
        if let Err(e) = self.state.run.start(TimerMode::CountUp, now) {
            self.misuse(e);
            return None;
        }
        self.state.run_started_at = Some(now);
        self.state.run_target_announced = false;
        self.publish_one(Event::RunStarted { at: now })
    }

    pub fn pause_run(&mut self) -> Option<Event> {
        let now = self.clock.now();
        match self.state.run.pause(now) {
            Ok(elapsed) => self.publish_one(Event::RunPaused {
                elapsed_secs: elapsed.as_secs(),
                at: now,
            }),
            Err(e) => {
                self.misuse(e);
                None
            }
        }
    }

    pub fn resume_run(&mut self) -> Option<Event> {
        let now = self.clock.now();
        if let Err(e) = self.state.run.resume(now) {
            self.misuse(e);
            return None;
        }
        let elapsed_secs = self.state.run.elapsed(now).as_secs();
        self.publish_one(Event::RunResumed {
            elapsed_secs,
            at: now,
        })
    }

    /// Finish the run. Runs that reach the minimum length earn energy and
    /// are recorded; shorter ones are dropped.
    pub fn stop_run(&mut self) -> Vec<Event> {
        let now = self.clock.now();
        if self.state.run.status() == TimerStatus::Idle {
            self.misuse(TimerError::InvalidState {
                operation: "stop",
                status: TimerStatus::Idle,
            });
            return Vec::new();
        }

        let elapsed = self.state.run.stop(now);
        let started_at = self.state.run_started_at.take().unwrap_or(now);
        self.state.run_target_announced = false;

        let credited = elapsed >= self.settings.min_run_credit;
        let mut events = vec![Event::RunStopped {
            elapsed_secs: elapsed.as_secs(),
            credited,
            at: now,
        }];

        if credited {
            let minutes = u32::try_from(elapsed.as_secs() / 60).unwrap_or(u32::MAX);
            info!(minutes, "run completed");
            events.extend(self.credit(FlowEvent::RunCompleted { minutes }, now));
            self.record(
                now,
                ActivityRecord::Run {
                    started_at,
                    duration_secs: elapsed.as_secs(),
                },
            );
        } else {
            debug!(secs = elapsed.as_secs(), "run too short to credit");
        }

        self.publish(events)
    }

    /// Throw the run away without credit.
    pub fn reset_run(&mut self) -> Option<Event> {
        let now = self.clock.now();
        self.state.run.reset();
        self.state.run_started_at = None;
        self.state.run_target_announced = false;
        self.publish_one(Event::RunReset { at: now })
    }

    // ── Energy and the gated game ────────────────────────────────────

    /// Spend energy directly. `false` leaves the balance untouched.
    pub fn spend_energy(&mut self, cost: u64) -> bool {
        let now = self.clock.now();
        if !self.economy.try_spend(cost) {
            return false;
        }
        let balance = self.economy.balance();
        self.publish(vec![Event::EnergySpent {
            amount: cost,
            balance,
            at: now,
        }]);
        true
    }

    pub fn refund_energy(&mut self, amount: u64) -> u64 {
        let now = self.clock.now();
        let balance = self.economy.refund(amount);
        self.publish(vec![Event::EnergyRefunded {
            amount,
            balance,
            at: now,
        }]);
        balance
    }

    /// Pay the entry cost for the game. Asking again while a paid game is
    /// still open does not charge twice.
    pub fn enter_game(&mut self) -> GameEntry {
        let now = self.clock.now();
        let cost = self.settings.game_entry_cost;

        if self.state.game_in_progress {
            return GameEntry::Granted {
                balance: self.economy.balance(),
            };
        }

        if self.economy.try_spend(cost) {
            self.state.game_in_progress = true;
            let balance = self.economy.balance();
            self.publish(vec![Event::EnergySpent {
                amount: cost,
                balance,
                at: now,
            }]);
            GameEntry::Granted { balance }
        } else {
            let balance = self.economy.balance();
            info!(cost, balance, "game locked");
            self.publish(vec![Event::GameLocked { cost, balance, at: now }]);
            GameEntry::Locked { cost, balance }
        }
    }

    /// Refund a paid entry for a game that never got going.
    pub fn abort_game(&mut self) -> Option<Event> {
        if !self.state.game_in_progress {
            warn!("abort requested with no paid game open");
            return None;
        }
        let now = self.clock.now();
        self.state.game_in_progress = false;
        let amount = self.settings.game_entry_cost;
        let balance = self.economy.refund(amount);
        self.publish_one(Event::EnergyRefunded {
            amount,
            balance,
            at: now,
        })
    }

    pub fn finish_game(&mut self, score: u32, seconds: u32) -> Vec<Event> {
        if !self.state.game_in_progress {
            warn!("finish requested with no paid game open");
            return Vec::new();
        }
        let now = self.clock.now();
        self.state.game_in_progress = false;

        let mut events = vec![Event::GameFinished { score, seconds, at: now }];
        events.extend(self.credit(FlowEvent::GameFinished { score, seconds }, now));
        self.record(now, ActivityRecord::Game { score, seconds });
        self.publish(events)
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn on_phase_completed(&mut self, completion: PhaseCompletion) -> Vec<Event> {
        info!(
            phase = ?completion.completed,
            next = ?completion.next,
            count = completion.completed_focus_count,
            "phase completed"
        );
        let mut events = vec![Event::PhaseCompleted {
            phase: completion.completed,
            next: completion.next,
            completed_focus_count: completion.completed_focus_count,
            auto_started: completion.auto_started,
            at: completion.at,
        }];

        if completion.completed == Phase::Focus {
            let flow = FlowEvent::FocusCompleted {
                focus_minutes: completion.focus_minutes,
                rest_minutes: completion.rest_minutes,
            };
            events.extend(self.credit(flow, completion.at));
            self.record(
                completion.at,
                ActivityRecord::Pomodoro {
                    focus_minutes: completion.focus_minutes,
                    rest_minutes: completion.rest_minutes,
                },
            );
        }
        events
    }

    fn check_run_target(&mut self, now: DateTime<Utc>) -> Option<Event> {
        let run = &self.state.run;
        if !run.is_running() || self.state.run_target_announced {
            return None;
        }
        if run.elapsed(now) < self.settings.run_target {
            return None;
        }
        self.state.run_target_announced = true;
        info!("run target reached");
        Some(Event::RunTargetReached {
            target_secs: self.settings.run_target.as_secs(),
            at: now,
        })
    }

    fn credit(&mut self, flow: FlowEvent, at: DateTime<Utc>) -> Option<Event> {
        let amount = self.economy.apply_gain(&flow);
        (amount > 0).then(|| Event::EnergyGained {
            source: flow,
            amount,
            balance: self.economy.balance(),
            at,
        })
    }

    fn record(&self, at: DateTime<Utc>, activity: ActivityRecord) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(at, &activity) {
                warn!(error = %e, ?activity, "failed to record activity");
            }
        }
    }

    fn resumed_event(&self, now: DateTime<Utc>) -> Event {
        Event::TimerResumed {
            phase: self.state.scheduler.phase(),
            remaining_secs: self.state.scheduler.remaining(now).as_secs(),
            at: now,
        }
    }

    fn misuse(&self, error: TimerError) {
        warn!(%error, "ignored session command");
    }

    fn publish_one(&mut self, event: Event) -> Option<Event> {
        self.publish(vec![event]).pop()
    }

    /// Write both snapshots, then notify subscribers.
    fn publish(&mut self, events: Vec<Event>) -> Vec<Event> {
        if let Some(sink) = &self.snapshots {
            if let Err(e) = sink.write_session(&SessionSnapshot::from_scheduler(&self.state.scheduler)) {
                warn!(error = %e, "failed to write session snapshot");
            }
            if let Err(e) = sink.write_running(&RunningSnapshot::from_timer(&self.state.run)) {
                warn!(error = %e, "failed to write running snapshot");
            }
        }
        for event in &events {
            self.bus.publish(event);
        }
        events
    }
}
