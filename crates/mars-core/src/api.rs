//! Host-facing contracts: run outcomes, trace hooks and cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::TaskFault;

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum HaltReason {
    /// Every warrior's task queue is empty.
    AllDead,
    /// The cycle budget was used up.
    CycleLimit,
    /// Exactly one of several warriors is still alive.
    LastSurvivor(u32),
    /// Program counters landed on breakpoints; the hit addresses, ascending.
    Breakpoint(Vec<usize>),
    /// The cancellation token was triggered.
    Interrupted,
}

/// Summary of one scheduler cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepReport {
    /// Cycle counter after the step.
    pub cycle: u64,
    /// Number of instructions executed, one per live warrior.
    pub executed: usize,
    /// Pids whose last task ended during this cycle.
    pub died: Vec<u32>,
    /// Breakpoint addresses now holding a program counter.
    pub breakpoints_hit: Vec<usize>,
}

/// Aggregated outcome from running cycles until a halt condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Cycles completed during this run call.
    pub cycles_run: u64,
    /// Why the run stopped.
    pub halt: HaltReason,
}

/// Structured events delivered to a [`TraceSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TraceEvent {
    /// One instruction executed.
    Executed {
        /// Cycle during which the instruction ran.
        cycle: u64,
        /// Owning warrior.
        pid: u32,
        /// Absolute address of the instruction.
        address: usize,
        /// Instruction text as it was before executing.
        instruction: String,
        /// The warrior's absolute program counters after the step.
        program_counters: Vec<usize>,
    },
    /// A task ended through a runtime fault.
    TaskEnded {
        /// Cycle during which the task ended.
        cycle: u64,
        /// Owning warrior.
        pid: u32,
        /// Absolute address of the faulting instruction.
        address: usize,
        /// Fault classification.
        fault: TaskFault,
    },
}

/// Sink trait for execution trace hooks.
///
/// The scheduler behaves identically with or without a sink attached.
pub trait TraceSink {
    /// Receives one trace event.
    fn on_event(&mut self, event: &TraceEvent);
}

impl<F> TraceSink for F
where
    F: FnMut(&TraceEvent),
{
    fn on_event(&mut self, event: &TraceEvent) {
        self(event);
    }
}

/// Cloneable flag that asks a running scheduler to stop between cycles.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates an untriggered token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation; observed after the current cycle completes.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Clears a previous request so the token can be reused.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
