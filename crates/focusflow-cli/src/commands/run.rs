use chrono::{DateTime, Utc};
use clap::Subcommand;
use focusflow_core::{format_mmss, SessionCoordinator, TimerStatus};
use serde::Serialize;

use super::session::{print_event_or, print_events_or, print_json, Session};

#[derive(Subcommand)]
pub enum RunAction {
    /// Start a new run
    Start,
    /// Pause the run
    Pause,
    /// Resume a paused run
    Resume,
    /// Finish the run and collect energy
    Stop,
    /// Discard the run without credit
    Reset,
    /// Print the run state as JSON
    Status,
}

#[derive(Serialize)]
struct RunStatus {
    status: TimerStatus,
    elapsed_secs: u64,
    elapsed: String,
    target_secs: u64,
    started_at: Option<DateTime<Utc>>,
}

impl RunStatus {
    fn of(coordinator: &SessionCoordinator) -> Self {
        let elapsed = coordinator.run_elapsed();
        Self {
            status: coordinator.run_timer().status(),
            elapsed_secs: elapsed.as_secs(),
            elapsed: format_mmss(elapsed),
            target_secs: coordinator.settings().run_target.as_secs(),
            started_at: coordinator.state().run_started_at,
        }
    }
}

pub fn run(action: RunAction) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open()?;
    session.catch_up()?;
    let coordinator = session.coordinator();

    match action {
        RunAction::Start => {
            let event = coordinator.start_run();
            print_event_or(event, || RunStatus::of(coordinator))?;
        }
        RunAction::Pause => {
            let event = coordinator.pause_run();
            print_event_or(event, || RunStatus::of(coordinator))?;
        }
        RunAction::Resume => {
            let event = coordinator.resume_run();
            print_event_or(event, || RunStatus::of(coordinator))?;
        }
        RunAction::Stop => {
            let events = coordinator.stop_run();
            print_events_or(&events, || RunStatus::of(coordinator))?;
        }
        RunAction::Reset => {
            let event = coordinator.reset_run();
            print_event_or(event, || RunStatus::of(coordinator))?;
        }
        RunAction::Status => {
            print_json(&RunStatus::of(coordinator))?;
        }
    }

    session.save()?;
    Ok(())
}
