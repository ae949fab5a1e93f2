//! Loads the coordinator for one CLI invocation and saves it afterwards.

use std::error::Error;
use std::rc::Rc;
use std::sync::Arc;

use focusflow_core::{
    Config, Database, Event, RewardEconomy, SessionCoordinator, SessionState, SnapshotStore,
    SystemClock,
};
use serde::Serialize;
use tracing::warn;

const STATE_KEY: &str = "session_state";

pub struct Session {
    db: Rc<Database>,
    coordinator: SessionCoordinator,
}

impl Session {
    /// Open config, history and snapshots, restore the saved state and
    /// catch up on anything that finished while no process was watching.
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        let db = Rc::new(Database::open()?);

        let economy = RewardEconomy::with_store(config.reward_rules(), Box::new(Rc::clone(&db)));
        let mut coordinator =
            SessionCoordinator::new(config.session_settings(), Arc::new(SystemClock), economy)?
                .with_snapshots(Box::new(SnapshotStore::open_default()?))
                .with_recorder(Box::new(Rc::clone(&db)));

        if let Some(state) = load_state(&db) {
            if let Err(e) = coordinator.restore(state) {
                warn!(error = %e, "discarding saved session state");
            }
        }

        Ok(Self { db, coordinator })
    }

    pub fn coordinator(&mut self) -> &mut SessionCoordinator {
        &mut self.coordinator
    }

    /// Tick once and print whatever completed since the last invocation.
    pub fn catch_up(&mut self) -> Result<(), Box<dyn Error>> {
        print_events(&self.coordinator.tick())
    }

    /// Persist the state for the next invocation. A pristine state is
    /// dropped instead, so a fully reset session leaves nothing behind.
    pub fn save(&self) -> Result<(), Box<dyn Error>> {
        let state = self.coordinator.state();
        if state.is_pristine() {
            self.db.kv_delete(STATE_KEY)?;
        } else {
            self.db.kv_set(STATE_KEY, &serde_json::to_string(state)?)?;
        }
        Ok(())
    }
}

fn load_state(db: &Database) -> Option<SessionState> {
    let json = match db.kv_get(STATE_KEY) {
        Ok(json) => json?,
        Err(e) => {
            warn!(error = %e, "failed to read session state");
            return None;
        }
    };
    match serde_json::from_str(&json) {
        Ok(state) => Some(state),
        Err(e) => {
            warn!(error = %e, "saved session state is unreadable");
            None
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_events(events: &[Event]) -> Result<(), Box<dyn Error>> {
    for event in events {
        print_json(event)?;
    }
    Ok(())
}

/// Print the events, or the fallback when the command changed nothing.
pub fn print_events_or<T: Serialize>(
    events: &[Event],
    fallback: impl FnOnce() -> T,
) -> Result<(), Box<dyn Error>> {
    if events.is_empty() {
        print_json(&fallback())
    } else {
        print_events(events)
    }
}

/// Print the event, or the fallback when the command changed nothing.
pub fn print_event_or<T: Serialize>(
    event: Option<Event>,
    fallback: impl FnOnce() -> T,
) -> Result<(), Box<dyn Error>> {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&fallback()),
    }
}
