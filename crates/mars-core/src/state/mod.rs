//! Per-warrior and scheduler-level state.

/// Warrior identity and task queue.
pub mod warrior;

pub use warrior::Warrior;

/// Scheduler lifecycle state machine.
pub mod run_state;

pub use run_state::SchedulerState;
