//! Per-warrior execution counters.

use crate::TaskFault;

/// Saturating execution counters for one warrior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct WarriorStats {
    /// Instructions executed.
    pub instructions: u64,
    /// Tasks ended by executing `DAT`.
    pub dat_deaths: u64,
    /// Tasks ended by a zero divisor.
    pub division_deaths: u64,
    /// `SPL` spawns that were queued.
    pub spawns: u64,
    /// `SPL` spawns discarded by the task ceiling.
    pub dropped_spawns: u64,
}

impl WarriorStats {
    /// Creates zeroed counters.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            instructions: 0,
            dat_deaths: 0,
            division_deaths: 0,
            spawns: 0,
            dropped_spawns: 0,
        }
    }

    /// Counts one executed instruction.
    pub fn record_instruction(&mut self) {
        self.instructions = self.instructions.saturating_add(1);
    }

    /// Counts one task ended by `fault`.
    pub fn record_fault(&mut self, fault: TaskFault) {
        match fault {
            TaskFault::ExecutedDat => self.dat_deaths = self.dat_deaths.saturating_add(1),
            TaskFault::DivisionByZero => {
                self.division_deaths = self.division_deaths.saturating_add(1);
            }
        }
    }

    /// Counts the outcome of one `SPL`.
    pub fn record_spawn(&mut self, dropped: bool) {
        if dropped {
            self.dropped_spawns = self.dropped_spawns.saturating_add(1);
        } else {
            self.spawns = self.spawns.saturating_add(1);
        }
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::WarriorStats;
    use crate::TaskFault;

    #[test]
    fn faults_are_counted_by_kind() {
        let mut stats = WarriorStats::new();
        stats.record_fault(TaskFault::ExecutedDat);
        stats.record_fault(TaskFault::DivisionByZero);
        stats.record_fault(TaskFault::ExecutedDat);
        assert_eq!(stats.dat_deaths, 2);
        assert_eq!(stats.division_deaths, 1);
    }

    #[test]
    fn counters_saturate() {
        let mut stats = WarriorStats {
            instructions: u64::MAX,
            ..WarriorStats::new()
        };
        stats.record_instruction();
        assert_eq!(stats.instructions, u64::MAX);
        stats.reset();
        assert_eq!(stats, WarriorStats::default());
    }

    #[test]
    fn spawns_split_by_outcome() {
        let mut stats = WarriorStats::new();
        stats.record_spawn(false);
        stats.record_spawn(true);
        assert_eq!((stats.spawns, stats.dropped_spawns), (1, 1));
    }
}
