use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusflow_core::{format_mmss, Phase, SessionCoordinator, TimerStatus};
use serde::Serialize;

use super::session::{print_event_or, print_events, print_events_or, print_json, Session};

#[derive(Subcommand)]
pub enum FocusAction {
    /// Start the current phase (resumes if paused)
    Start,
    /// Pause the running phase
    Pause,
    /// Resume a paused phase
    Resume,
    /// Move on to the next phase without credit
    Skip,
    /// Mark the current phase done now
    Complete,
    /// Back to an idle first focus phase
    Reset,
    /// Print the focus cycle state as JSON
    Status,
    /// Follow the countdown until interrupted
    Watch {
        /// Seconds between updates
        #[arg(long, default_value = "1")]
        interval: u64,
    },
}

#[derive(Serialize)]
struct FocusStatus {
    phase: Phase,
    status: TimerStatus,
    remaining_secs: u64,
    remaining: String,
    completed_focus_count: u32,
    end_instant: Option<DateTime<Utc>>,
    /// Fraction of the live countdown already elapsed; absent while idle.
    progress: Option<f64>,
}

impl FocusStatus {
    fn of(coordinator: &SessionCoordinator) -> Self {
        let scheduler = coordinator.scheduler();
        let remaining = coordinator.focus_remaining();
        Self {
            phase: scheduler.phase(),
            status: scheduler.status(),
            remaining_secs: remaining.as_secs(),
            remaining: format_mmss(remaining),
            completed_focus_count: scheduler.completed_focus_count(),
            end_instant: scheduler.end_instant(),
            progress: scheduler
                .timer()
                .progress(coordinator.now())
                .filter(|_| scheduler.status() != TimerStatus::Idle),
        }
    }
}

pub fn run(action: FocusAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    session.catch_up()?;
    let coordinator = session.coordinator();

    match action {
        FocusAction::Start => {
            let event = coordinator.start_focus();
            print_event_or(event, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Pause => {
            let events = coordinator.pause_focus();
            print_events_or(&events, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Resume => {
            let events = coordinator.resume_focus();
            print_events_or(&events, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Skip => {
            let events = coordinator.skip_phase();
            print_events_or(&events, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Complete => {
            let events = coordinator.complete_phase();
            print_events_or(&events, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Reset => {
            let event = coordinator.reset_focus();
            print_event_or(event, || FocusStatus::of(coordinator))?;
        }
        FocusAction::Status => {
            print_json(&FocusStatus::of(coordinator))?;
        }
        FocusAction::Watch { interval } => {
            watch(&mut session, Duration::from_secs(interval.max(1)))?;
        }
    }

    session.save()?;
    Ok(())
}

/// Tick on a fixed interval, printing a countdown line to stderr and any
/// events as JSON to stdout. Stops on Ctrl-C or once nothing is running.
fn watch(session: &mut Session, every: Duration) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let mut ticker = tokio::time::interval(every);
        loop {
            let token = session.coordinator().tick_token();
            tokio::select! {
                _ = ticker.tick() => {}
                _ = tokio::signal::ctrl_c() => break,
            }

            let events = session.coordinator().tick_scheduled(token);
            if !events.is_empty() {
                eprintln!();
                print_events(&events)?;
                session.save()?;
            }

            let status = FocusStatus::of(session.coordinator());
            if status.status != TimerStatus::Running {
                break;
            }
            eprint!("\r{} {}   ", status.phase.label(), status.remaining);
        }
        eprintln!();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
