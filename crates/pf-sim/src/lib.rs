//! Adaptive time stepping for transient nonlinear solves.
//!
//! Provides:
//! - Bounded, strictly positive time step size
//! - Step-halving retry loop around an external nonlinear solve
//! - Output schedule synchronization (land steps on requested times)
//! - Steady-state detection
//! - Macro time-step driver with snapshots and restart checkpoints

pub mod adaptive;
pub mod error;
pub mod model;
pub mod observe;
pub mod schedule;
pub mod sim;
pub mod steady;
pub mod step_size;

// Re-exports for public API
pub use adaptive::{AdaptiveStepController, StepOutcome};
pub use error::{SimError, SimResult};
pub use model::{INVALID_TIME, MemorySink, NullSink, SnapshotSink, SolutionState, StepSolver};
pub use observe::{NullObserver, Observer, RecordingObserver, SimEvent, TracingObserver};
pub use schedule::{OutputRequest, OutputSchedule, SyncOutcome, synchronize};
pub use sim::{RunOutcome, SimOptions, SimRecord, StepBounds, run_sim};
pub use steady::{SteadyCheck, SteadyStateDetector, unsteadiness};
pub use step_size::TimeStepSize;
