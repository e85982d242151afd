//! Outbound supervisor events.
//!
//! The [`SupervisoryLoop`](super::supervisor::SupervisoryLoop) emits these
//! through the [`EventSink`](super::ports::EventSink) port.  Adapters on the
//! other side decide what to do with them: log to serial, append to the
//! log file, record them in a test.

use crate::diagnostics::StatusReport;
use crate::error::{FatalCondition, LoopFailure};
use crate::health::HealthReport;
use crate::sensors::Sample;

#[derive(Debug, Clone, PartialEq)]
pub enum SupervisorEvent {
    /// The loop is about to run its first cycle.
    Started { watchdog_enabled: bool },

    /// A sample made it to the broker.
    ReadingPublished { cycle: u64, sample: Sample },

    /// A cycle failed; `consecutive` of `limit` towards a restart.
    CycleFailed {
        cycle: u64,
        failure: LoopFailure,
        consecutive: u32,
        limit: u32,
    },

    /// WiFi was down at cycle start and came back.
    NetworkRestored,

    /// Periodic statistics.
    Summary(StatusReport),

    /// The periodic health check found problems.
    HealthDegraded(HealthReport),

    /// The consecutive-failure threshold was reached.
    RestartEscalation(FatalCondition),

    /// The loop left and released its collaborators.
    Stopped { cycles: u64 },
}
