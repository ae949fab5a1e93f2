//! # FocusFlow Core Library
//!
//! This library provides the core logic for the FocusFlow focus session
//! engine. Every operation is available through the standalone CLI binary;
//! any other front end is a thin layer over the same core library.
//!
//! ## Architecture
//!
//! - **Timers**: Anchor-based state machines. Elapsed time is derived from
//!   a recorded start instant, never accumulated from ticks, so the caller
//!   only needs to invoke `tick()` to observe completion
//! - **Energy**: A balance earned by completing focus phases and runs, and
//!   spent to enter a gated game
//! - **Session**: The coordinator that wires timers and energy together and
//!   publishes snapshots for out-of-process readers
//! - **Storage**: SQLite-based activity history and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`PhaseScheduler`]: Focus / break cycle
//! - [`IntervalTimer`]: Pausable count-up or countdown timer
//! - [`RewardEconomy`]: Energy ledger plus reward rules
//! - [`SessionCoordinator`]: Single entry point for every user command
//! - [`Database`]: Activity history and key-value state
//! - [`Config`]: Application configuration management

pub mod clock;
pub mod energy;
pub mod error;
pub mod events;
pub mod session;
pub mod storage;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use energy::{BalanceStore, EnergyLedger, FlowEvent, RewardEconomy, RewardRules};
pub use error::{ConfigError, CoreError, DatabaseError, TimerError};
pub use events::{Event, EventBus};
pub use session::{
    ActivityRecord, ActivityRecorder, GameEntry, MemorySnapshots, RecordedActivity, RunPhase,
    RunningSnapshot, SessionCoordinator, SessionSettings, SessionSnapshot, SessionState,
    SnapshotPhase, SnapshotSink, SnapshotStore, TickToken,
};
pub use storage::{data_dir, Config, Database, Stats};
pub use timer::{
    format_mmss, IntervalTimer, Phase, PhaseCompletion, PhaseScheduler, PhaseSettings, PhaseSkip,
    SkipBehavior, TimerMode, TimerState, TimerStatus,
};
