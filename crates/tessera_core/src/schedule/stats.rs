//! Tick reports and rolling timing statistics.

use std::time::Duration;

use crate::ecs::{EntityId, SystemId};
use crate::error::SystemError;

/// A fault raised by one system during a tick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickFault {
    /// Faulting system.
    pub system: SystemId,
    /// Its name.
    pub name: &'static str,
    /// Entity being processed.
    pub entity: EntityId,
    /// What went wrong.
    pub error: SystemError,
}

/// Outcome of one completed tick.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    /// Tick number, starting at 1.
    pub tick: u64,
    /// Systems that were started.
    pub systems_run: usize,
    /// Total system invocations (one per system per entity).
    pub invocations: u64,
    /// Faults raised under the isolate policy, in no particular order.
    pub faults: Vec<TickFault>,
    /// Wall-clock duration of the tick.
    pub elapsed: Duration,
}

impl TickReport {
    /// Checks if every invocation succeeded.
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug)]
pub struct TickStats {
    /// Minimum tick duration observed.
    pub min_tick_us: u64,
    /// Maximum tick duration observed.
    pub max_tick_us: u64,
    /// Average tick duration (rolling).
    pub avg_tick_us: u64,
    /// Ticks that raised at least one fault.
    pub faulted_ticks: u64,
    /// Total ticks measured.
    pub total_ticks: u64,
}

impl Default for TickStats {
    fn default() -> Self {
        Self {
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            avg_tick_us: 0,
            faulted_ticks: 0,
            total_ticks: 0,
        }
    }
}

impl TickStats {
    /// Records one tick.
    pub fn record(&mut self, elapsed: Duration, faulted: bool) {
        #[allow(clippy::cast_possible_truncation)]
        let duration_us = elapsed.as_micros() as u64;

        self.min_tick_us = self.min_tick_us.min(duration_us);
        self.max_tick_us = self.max_tick_us.max(duration_us);

        // Rolling average, seeded by the first sample
        self.avg_tick_us = if self.total_ticks == 0 {
            duration_us
        } else {
            (self.avg_tick_us * 15 + duration_us) / 16
        };
        self.total_ticks += 1;

        if faulted {
            self.faulted_ticks += 1;
        }
    }
}
