//! # Tick Scheduling
//!
//! One tick runs every registered system over its matched entities on a
//! bounded worker pool and joins before returning.
//!
//! ## Threading Model
//!
//! ```text
//! tick(&mut World) ──► job channel (bounded, one job per system)
//!                          │
//!              ┌───────────┼───────────┐
//!              ▼           ▼           ▼
//!          worker 0    worker 1 …  worker N-1     N = min(workers, systems)
//!              │           │           │
//!              └──── outcome channel ──┘ ──► TickReport
//! ```
//!
//! With a single worker (or a single system) everything runs on the
//! calling thread and no thread is spawned.

mod scheduler;
mod stats;

pub use scheduler::Scheduler;
pub use stats::{TickFault, TickReport, TickStats};
