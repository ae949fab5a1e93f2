mod interval;
mod phase;
mod scheduler;

pub use interval::{format_mmss, IntervalTimer, TimerMode, TimerState, TimerStatus, MIN_COUNTDOWN};
pub use phase::{Phase, PhaseSettings, SkipBehavior};
pub use scheduler::{PhaseCompletion, PhaseScheduler, PhaseSkip};
