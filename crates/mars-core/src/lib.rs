//! Core of a Memory Array Redcode Simulator following ICWS'94 semantics.
//!
//! The crate holds the circular core, the address-mode and opcode engine,
//! warrior task queues and the round-robin scheduler. Assembling Redcode
//! source into a [`Program`] is the job of the `redcode` crate.

/// Simulator configuration.
pub mod config;
pub use config::{
    MarsConfig, DEFAULT_CORE_SIZE, DEFAULT_MAX_CYCLES, DEFAULT_MAX_LENGTH, DEFAULT_MAX_PROCESSES,
    DEFAULT_MIN_DISTANCE, DEFAULT_PLACEMENT_ATTEMPTS,
};

/// Error and runtime fault taxonomy.
pub mod fault;
pub use fault::{CoreError, TaskFault};

/// Opcodes, modifiers, address modes and instructions.
pub mod instruction;
pub use instruction::{AddressMode, Field, Instruction, Modifier, Opcode, Operand, OPCODES};

/// Circular instruction store.
pub mod memory;
pub use memory::{fold, CellView, MemoryCore};

/// Linked programs.
pub mod program;
pub use program::Program;

/// Operand resolution and opcode execution.
pub mod execute;
pub use execute::{execute, ExecuteOutcome};

/// Warrior and scheduler state.
pub mod state;
pub use state::{SchedulerState, Warrior};

/// Per-warrior execution counters.
pub mod diag;
pub use diag::WarriorStats;

/// Run outcomes, trace hooks and cancellation.
pub mod api;
pub use api::{CancellationToken, HaltReason, RunOutcome, StepReport, TraceEvent, TraceSink};

/// Core listings for inspection.
pub mod disasm;
pub use disasm::{listing, listing_around, ListingRow};

/// Placement and the cycle loop.
pub mod scheduler;
pub use scheduler::Scheduler;

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
#[cfg(test)]
use tracing_subscriber as _;
