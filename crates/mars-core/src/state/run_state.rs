use crate::HaltReason;

/// Scheduler lifecycle: `Idle -> Placed -> Running -> Halted`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum SchedulerState {
    /// No warrior is loaded.
    #[default]
    Idle,
    /// Warriors are loaded and no cycle has run yet.
    Placed,
    /// At least one cycle has run and no halt condition was met.
    Running,
    /// The last run stopped for the given reason.
    Halted(HaltReason),
}

impl SchedulerState {
    /// Returns the halt reason, if this state is halted.
    #[must_use]
    pub const fn halt_reason(&self) -> Option<&HaltReason> {
        match self {
            Self::Halted(reason) => Some(reason),
            Self::Idle | Self::Placed | Self::Running => None,
        }
    }
}
