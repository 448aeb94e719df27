//! # Configuration
//!
//! World and scheduler settings. Every field has a default, so an empty
//! TOML document is a valid configuration.
//!
//! ```toml
//! [scheduler]
//! workers = 4
//! fault_policy = "fail_fast"
//! ```

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// What the scheduler does when a system invocation faults.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Stop the faulting system for this tick and let the others finish.
    /// The tick succeeds and its report lists the faults.
    #[default]
    Isolate,
    /// Stop everything at the next entity boundary and fail the tick.
    FailFast,
}

/// Scheduler settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads per tick. `None` uses the hardware concurrency.
    /// The effective count never exceeds the number of systems.
    pub workers: Option<usize>,
    /// Fault handling.
    pub fault_policy: FaultPolicy,
}

impl SchedulerConfig {
    /// Single worker: every system runs on the calling thread.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            workers: Some(1),
            fault_policy: FaultPolicy::Isolate,
        }
    }

    /// Hardware concurrency, first fault fails the tick.
    #[must_use]
    pub const fn fail_fast() -> Self {
        Self {
            workers: None,
            fault_policy: FaultPolicy::FailFast,
        }
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Sets the fault policy.
    #[must_use]
    pub const fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    /// Worker count after applying the hardware default.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if `workers` is zero.
    pub fn resolved_workers(&self) -> EcsResult<usize> {
        match self.workers {
            Some(0) => Err(EcsError::InvalidConfig(
                "scheduler.workers must be at least 1".into(),
            )),
            Some(n) => Ok(n),
            None => Ok(hardware_workers()),
        }
    }
}

/// Hardware concurrency, or 1 if it cannot be determined.
pub(crate) fn hardware_workers() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Top-level world settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Tick scheduler.
    pub scheduler: SchedulerConfig,
}

impl WorldConfig {
    /// Sequential, isolating configuration.
    #[must_use]
    pub const fn sequential() -> Self {
        Self {
            scheduler: SchedulerConfig::sequential(),
        }
    }

    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] on a syntax error, an unknown
    /// value or a zero worker count.
    pub fn from_toml_str(source: &str) -> EcsResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| EcsError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the settings without building anything.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if a value is out of range.
    pub fn validate(&self) -> EcsResult<()> {
        self.scheduler.resolved_workers().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_is_default() {
        let config = WorldConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorldConfig::default());
        assert_eq!(config.scheduler.fault_policy, FaultPolicy::Isolate);
        assert_eq!(config.scheduler.workers, None);
    }

    #[test]
    fn test_parse_scheduler_section() {
        let config = WorldConfig::from_toml_str(
            r#"
            [scheduler]
            workers = 3
            fault_policy = "fail_fast"
            "#,
        )
        .unwrap();
        assert_eq!(
            config.scheduler,
            SchedulerConfig::fail_fast().with_workers(3)
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            WorldConfig::from_toml_str("[scheduler]\nworkers = 0"),
            Err(EcsError::InvalidConfig(_))
        ));
        assert!(matches!(
            WorldConfig::from_toml_str("[scheduler]\nfault_policy = \"retry\""),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_presets() {
        assert_eq!(SchedulerConfig::sequential().resolved_workers().unwrap(), 1);
        assert!(SchedulerConfig::default().resolved_workers().unwrap() >= 1);
    }
}
