use thiserror::Error;

/// Runtime faults that end a single thread.
///
/// These are ordinary game semantics, not errors: the executing task is
/// simply not requeued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum TaskFault {
    /// The thread executed a `DAT` instruction.
    ExecutedDat,
    /// `DIV` or `MOD` used a zero divisor.
    DivisionByZero,
}

impl TaskFault {
    /// Short stable label used in logs and trace output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExecutedDat => "executed DAT",
            Self::DivisionByZero => "division by zero",
        }
    }
}

/// Error taxonomy for the simulator core.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum CoreError {
    /// A raw memory access bypassed `fold` and landed outside the core.
    #[error("address {address} is outside of core memory (size {size})")]
    OutOfRange {
        /// Offending absolute address.
        address: i64,
        /// Core size at the time of the access.
        size: usize,
    },
    /// No collision-free base address was found for a warrior.
    #[error("no room to place warrior '{name}' after {attempts} attempts")]
    PlacementFailed {
        /// Warrior name.
        name: String,
        /// Attempts made before giving up.
        attempts: usize,
    },
    /// Program is longer than the configured maximum length.
    #[error("program of warrior '{name}' has {length} instructions, at most {max_length} are allowed")]
    ProgramTooLong {
        /// Warrior name.
        name: String,
        /// Actual program length.
        length: usize,
        /// Configured limit.
        max_length: usize,
    },
    /// Program contains no instructions.
    #[error("program of warrior '{name}' is empty")]
    EmptyProgram {
        /// Warrior name.
        name: String,
    },
    /// Configuration values are inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// No warrior is registered under this pid.
    #[error("unknown warrior pid {0}")]
    UnknownWarrior(u32),
}

#[cfg(test)]
mod tests {
    use super::{CoreError, TaskFault};

    #[test]
    fn out_of_range_message_names_address_and_size() {
        let err = CoreError::OutOfRange {
            address: -3,
            size: 8000,
        };
        assert_eq!(
            err.to_string(),
            "address -3 is outside of core memory (size 8000)"
        );
    }

    #[test]
    fn task_fault_labels_are_stable() {
        assert_eq!(TaskFault::ExecutedDat.label(), "executed DAT");
        assert_eq!(TaskFault::DivisionByZero.label(), "division by zero");
    }
}
