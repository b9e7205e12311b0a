/*!
 * Signals Module
 * Per-signal monitor tasks relaying OS signals to the engine or to
 * user-installed override channels
 */

mod monitor;
mod notifier;
mod registry;
pub mod os;
pub mod types;

// Re-export public API
pub use monitor::Monitor;
pub use notifier::EngineNotifier;
pub use registry::{MonitorChannels, SignalRegistry, SignalState};
pub use types::{Signal, SignalError, SignalResult, SignalStats, MONITORED};
