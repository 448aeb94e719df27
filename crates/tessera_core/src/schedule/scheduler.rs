//! Bounded worker-pool dispatch of one tick.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::{bounded, unbounded};

use super::stats::{TickFault, TickReport, TickStats};
use crate::config::{hardware_workers, FaultPolicy, SchedulerConfig};
use crate::ecs::{EntityStore, MembershipIndex, SystemRegistry, SystemSlot};
use crate::error::{EcsError, EcsResult, SystemError};

/// Result of running one system over its members.
struct JobOutcome {
    invocations: u64,
    fault: Option<TickFault>,
}

/// Runs ticks and keeps timing statistics.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    workers: usize,
    tick: u64,
    stats: TickStats,
}

impl Scheduler {
    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the worker count is zero.
    pub fn new(config: SchedulerConfig) -> EcsResult<Self> {
        let workers = config.resolved_workers()?;
        Ok(Self::with_workers(config, workers))
    }

    fn with_workers(config: SchedulerConfig, workers: usize) -> Self {
        Self {
            config,
            workers,
            tick: 0,
            stats: TickStats::default(),
        }
    }

    /// Configured worker ceiling.
    #[inline]
    #[must_use]
    pub const fn workers(&self) -> usize {
        self.workers
    }

    /// Active fault policy.
    #[inline]
    #[must_use]
    pub const fn fault_policy(&self) -> FaultPolicy {
        self.config.fault_policy
    }

    /// Number of ticks started so far.
    #[inline]
    #[must_use]
    pub const fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Rolling timing statistics.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &TickStats {
        &self.stats
    }

    /// Resets statistics.
    pub fn reset_stats(&mut self) {
        self.stats = TickStats::default();
    }

    /// Runs every system once over its current members and joins.
    ///
    /// # Errors
    ///
    /// Under [`FaultPolicy::FailFast`], returns [`EcsError::SystemFault`]
    /// for the first fault observed. Under [`FaultPolicy::Isolate`] faults
    /// are only reported.
    pub fn run(
        &mut self,
        systems: &mut SystemRegistry,
        index: &MembershipIndex,
        store: &EntityStore,
    ) -> EcsResult<TickReport> {
        self.tick += 1;
        let tick = self.tick;
        let policy = self.config.fault_policy;
        let start = Instant::now();

        let jobs: Vec<&mut SystemSlot> = systems.slots_mut().collect();
        let workers = self.workers.min(jobs.len()).max(1);
        let abort = AtomicBool::new(false);

        let outcomes: Vec<JobOutcome> = if workers == 1 {
            let mut outcomes = Vec::with_capacity(jobs.len());
            for slot in jobs {
                if abort.load(Ordering::Acquire) {
                    break;
                }
                outcomes.push(run_job(slot, index, store, policy, &abort));
            }
            outcomes
        } else {
            let (job_tx, job_rx) = bounded::<&mut SystemSlot>(workers);
            let (outcome_tx, outcome_rx) = unbounded::<JobOutcome>();

            std::thread::scope(|scope| {
                for _ in 0..workers {
                    let job_rx = job_rx.clone();
                    let outcome_tx = outcome_tx.clone();
                    let abort = &abort;
                    scope.spawn(move || {
                        for slot in job_rx.iter() {
                            if abort.load(Ordering::Acquire) {
                                continue;
                            }
                            let outcome = run_job(slot, index, store, policy, abort);
                            if outcome_tx.send(outcome).is_err() {
                                break;
                            }
                        }
                    });
                }

                for slot in jobs {
                    if abort.load(Ordering::Acquire) || job_tx.send(slot).is_err() {
                        break;
                    }
                }
                drop(job_tx);
            });

            outcome_rx.try_iter().collect()
        };

        let elapsed = start.elapsed();
        let mut report = TickReport {
            tick,
            systems_run: outcomes.len(),
            invocations: 0,
            faults: Vec::new(),
            elapsed,
        };
        for outcome in outcomes {
            report.invocations += outcome.invocations;
            report.faults.extend(outcome.fault);
        }
        self.stats.record(elapsed, !report.faults.is_empty());

        tracing::debug!(
            tick,
            workers,
            systems = report.systems_run,
            invocations = report.invocations,
            faults = report.faults.len(),
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "tick complete"
        );

        if policy == FaultPolicy::FailFast && !report.faults.is_empty() {
            let fault = report.faults.swap_remove(0);
            return Err(EcsError::SystemFault {
                tick,
                id: fault.system,
                system: fault.name,
                entity: fault.entity,
                source: fault.error,
            });
        }
        Ok(report)
    }
}

impl Default for Scheduler {
    /// Hardware concurrency, isolating faults.
    fn default() -> Self {
        Self::with_workers(SchedulerConfig::default(), hardware_workers())
    }
}

/// Runs one system over its members, stopping at its first fault.
fn run_job(
    slot: &mut SystemSlot,
    index: &MembershipIndex,
    store: &EntityStore,
    policy: FaultPolicy,
    abort: &AtomicBool,
) -> JobOutcome {
    let mut invocations = 0;

    for entity in index.members(slot.entry) {
        if policy == FaultPolicy::FailFast && abort.load(Ordering::Acquire) {
            break;
        }
        let Some(record) = store.get(entity) else {
            continue;
        };

        invocations += 1;
        let runner = &mut slot.runner;
        let result = panic::catch_unwind(AssertUnwindSafe(|| runner.run_entity(entity, record)))
            .unwrap_or_else(|payload| Err(SystemError::Panicked(panic_message(&*payload))));

        if let Err(error) = result {
            let name = slot.runner.name();
            tracing::warn!(system = name, id = %slot.id, %entity, %error, "system fault");
            if policy == FaultPolicy::FailFast {
                abort.store(true, Ordering::Release);
            }
            return JobOutcome {
                invocations,
                fault: Some(TickFault {
                    system: slot.id,
                    name,
                    entity,
                    error,
                }),
            };
        }
    }

    JobOutcome {
        invocations,
        fault: None,
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_workers_rejected() {
        let config = SchedulerConfig::default().with_workers(0);
        assert!(matches!(Scheduler::new(config), Err(EcsError::InvalidConfig(_))));
    }

    #[test]
    fn test_empty_tick() {
        let mut scheduler = Scheduler::new(SchedulerConfig::sequential()).unwrap();
        let mut systems = SystemRegistry::new();
        let index = MembershipIndex::new();
        let store = EntityStore::new();

        let report = scheduler.run(&mut systems, &index, &store).unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(report.systems_run, 0);
        assert!(report.is_clean());
        assert_eq!(scheduler.stats().total_ticks, 1);
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&7u8), "non-string panic payload");
    }
}
