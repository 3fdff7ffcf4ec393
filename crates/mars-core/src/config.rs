use crate::CoreError;

/// Default number of core cells.
pub const DEFAULT_CORE_SIZE: usize = 8000;
/// Default cycle budget of a full run.
pub const DEFAULT_MAX_CYCLES: u64 = 80_000;
/// Default per-warrior task ceiling.
pub const DEFAULT_MAX_PROCESSES: usize = 8000;
/// Default longest accepted program.
pub const DEFAULT_MAX_LENGTH: usize = 100;
/// Default minimum gap between two warriors.
pub const DEFAULT_MIN_DISTANCE: usize = 100;
/// Default number of random placement attempts.
pub const DEFAULT_PLACEMENT_ATTEMPTS: usize = 1000;

/// Simulator configuration shared by the assembler and the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct MarsConfig {
    /// Number of cells in the circular core.
    pub core_size: usize,
    /// Cycle budget used by [`crate::Scheduler::run_to_completion`].
    pub max_cycles: u64,
    /// Maximum number of queued tasks per warrior.
    pub max_processes: usize,
    /// Maximum number of instructions in one program.
    pub max_length: usize,
    /// Minimum number of free cells between two warriors.
    pub min_distance: usize,
    /// Read limit, published to Redcode as `READLIMIT`.
    pub read_limit: usize,
    /// Write limit, published to Redcode as `WRITELIMIT`.
    pub write_limit: usize,
    /// Random placement attempts before a load fails.
    pub placement_attempts: usize,
    /// Halt a multi-warrior run once a single warrior remains.
    pub stop_on_last_survivor: bool,
    /// Seed for placement; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for MarsConfig {
    fn default() -> Self {
        Self {
            core_size: DEFAULT_CORE_SIZE,
            max_cycles: DEFAULT_MAX_CYCLES,
            max_processes: DEFAULT_MAX_PROCESSES,
            max_length: DEFAULT_MAX_LENGTH,
            min_distance: DEFAULT_MIN_DISTANCE,
            read_limit: DEFAULT_CORE_SIZE,
            write_limit: DEFAULT_CORE_SIZE,
            placement_attempts: DEFAULT_PLACEMENT_ATTEMPTS,
            stop_on_last_survivor: false,
            seed: None,
        }
    }
}

impl MarsConfig {
    /// Default configuration with a different core size; the limits follow it.
    #[must_use]
    pub fn with_core_size(core_size: usize) -> Self {
        Self {
            core_size,
            read_limit: core_size,
            write_limit: core_size,
            ..Self::default()
        }
    }

    /// Checks that the values can drive a simulation.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] for a zero core size, program
    /// length or process limit, and for a program length larger than the core.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.core_size == 0 {
            return Err(CoreError::InvalidConfig("core size must be positive".into()));
        }
        if self.max_length == 0 {
            return Err(CoreError::InvalidConfig(
                "max length must be positive".into(),
            ));
        }
        if self.max_processes == 0 {
            return Err(CoreError::InvalidConfig(
                "max processes must be positive".into(),
            ));
        }
        if self.max_length > self.core_size {
            return Err(CoreError::InvalidConfig(format!(
                "max length {} exceeds core size {}",
                self.max_length, self.core_size
            )));
        }
        Ok(())
    }

    /// Numeric settings exposed to Redcode sources as predefined constants.
    #[must_use]
    pub fn predefined_constants(&self) -> Vec<(&'static str, String)> {
        vec![
            ("CORESIZE", self.core_size.to_string()),
            ("PSPACESIZE", "0".to_string()),
            ("VERSION", "100".to_string()),
            ("WARRIORS", "1".to_string()),
            ("MAXPROCESSES", self.max_processes.to_string()),
            ("MAXCYCLES", self.max_cycles.to_string()),
            ("MAXLENGTH", self.max_length.to_string()),
            ("MINDISTANCE", self.min_distance.to_string()),
            ("READLIMIT", self.read_limit.to_string()),
            ("WRITELIMIT", self.write_limit.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_settings() {
        let config = MarsConfig::default();
        assert_eq!(config.core_size, 8000);
        assert_eq!(config.max_cycles, 80_000);
        assert_eq!(config.max_processes, 8000);
        assert_eq!(config.max_length, 100);
        assert_eq!(config.min_distance, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_core_is_rejected() {
        let config = MarsConfig::with_core_size(0);
        assert!(matches!(config.validate(), Err(CoreError::InvalidConfig(_))));
    }

    #[test]
    fn program_longer_than_core_is_rejected() {
        let mut config = MarsConfig::with_core_size(50);
        config.max_length = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn predefined_constants_follow_settings() {
        let config = MarsConfig::with_core_size(800);
        let constants = config.predefined_constants();
        assert!(constants.contains(&("CORESIZE", "800".to_string())));
        assert!(constants.contains(&("READLIMIT", "800".to_string())));
        assert_eq!(constants.len(), 10);
    }
}
