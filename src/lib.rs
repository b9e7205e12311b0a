/*!
 * txgate
 * Coordination layer between a host process and an embedded, single-threaded
 * transactional engine reached through a foreign-function boundary.
 *
 * Two subsystems carry the real complexity:
 * - signal relay: one monitor task per monitored OS signal, optional user
 *   override channels, and a bounded joint shutdown of monitors + engine
 * - transaction boundary: user callbacks run under the engine's retry-driving
 *   call, with restart/rollback expressed as structured control transfer that
 *   must never unwind through the foreign frame
 */

pub mod config;
pub mod core;
pub mod engine;
pub mod lifecycle;
pub mod shutdown;
pub mod signals;
pub mod txn;

// Re-export public API
pub use crate::config::{Config, TimeoutPolicy};
pub use crate::core::errors::{CoordError, CoordResult};
pub use crate::core::types::SessionToken;
pub use crate::engine::{Engine, EngineStatus, TxnStatus};
pub use crate::lifecycle::{Lifecycle, Runtime};
pub use crate::shutdown::{ShutdownCause, ShutdownCoordinator};
pub use crate::signals::{Signal, SignalError, SignalResult, SignalStats};
pub use crate::txn::{restart, rollback, Connection};
