use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::energy::FlowEvent;
use crate::timer::Phase;

/// Every state change in the session engine produces an Event.
/// The CLI prints them; subscribers on the [`EventBus`] react to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        duration_secs: u64,
        end_instant: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerResumed {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    PhaseCompleted {
        phase: Phase,
        next: Phase,
        completed_focus_count: u32,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    PhaseSkipped {
        from: Phase,
        to: Phase,
        auto_started: bool,
        at: DateTime<Utc>,
    },
    PhaseReset {
        at: DateTime<Utc>,
    },
    RunStarted {
        at: DateTime<Utc>,
    },
    RunPaused {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    RunResumed {
        elapsed_secs: u64,
        at: DateTime<Utc>,
    },
    /// Run finished. `credited` is false when it was too short to count.
    RunStopped {
        elapsed_secs: u64,
        credited: bool,
        at: DateTime<Utc>,
    },
    /// Emitted once per run when its elapsed time first reaches the
    /// configured target. The run keeps going.
    RunTargetReached {
        target_secs: u64,
        at: DateTime<Utc>,
    },
    RunReset {
        at: DateTime<Utc>,
    },
    EnergyGained {
        source: FlowEvent,
        amount: u64,
        balance: u64,
        at: DateTime<Utc>,
    },
    EnergySpent {
        amount: u64,
        balance: u64,
        at: DateTime<Utc>,
    },
    EnergyRefunded {
        amount: u64,
        balance: u64,
        at: DateTime<Utc>,
    },
    /// A gated entry was refused for lack of energy.
    GameLocked {
        cost: u64,
        balance: u64,
        at: DateTime<Utc>,
    },
    GameFinished {
        score: u32,
        seconds: u32,
        at: DateTime<Utc>,
    },
}

type Subscriber = Box<dyn FnMut(&Event)>;

/// Synchronous observer list.
///
/// [`publish`](Self::publish) hands the event to every subscriber, in
/// subscription order, before it returns. Each state change is published
/// once; there is no queue and no redelivery.
#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Subscriber>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, subscriber: F)
    where
        F: FnMut(&Event) + 'static,
    {
        self.subscribers.push(Box::new(subscriber));
    }

    pub fn publish(&mut self, event: &Event) {
        for subscriber in &mut self.subscribers {
            subscriber(event);
        }
    }
}
