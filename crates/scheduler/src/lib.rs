//! Auto-roll deadline scheduling.
//!
//! At most one pending auto-roll exists per duel. Scheduling replaces the
//! pending task, cancelling removes it, and the [`AutoRollWorker`] fires
//! due tasks at least once.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod queue;
pub mod worker;

pub use error::{Result, SchedulerError};
pub use memory::{DEFAULT_RETRY_DELAY, InMemoryScheduler, ScheduledTask};
pub use postgres::PostgresScheduler;
pub use queue::{AutoRollHandler, AutoRollScheduler, ClaimedTask, TaskQueue};
pub use worker::{AutoRollWorker, WorkerConfig};
