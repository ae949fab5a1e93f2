//! Session orchestration: the coordinator plus what it publishes.

mod coordinator;
mod record;
mod snapshot;

pub use coordinator::{
    GameEntry, SessionCoordinator, SessionSettings, SessionState, TickToken,
    DEFAULT_MIN_RUN_CREDIT,
};
pub use record::{ActivityRecord, ActivityRecorder, RecordedActivity};
pub use snapshot::{
    MemorySnapshots, RunPhase, RunningSnapshot, SessionSnapshot, SnapshotPhase, SnapshotSink,
    SnapshotStore,
};
