/*!
 * Coordination Errors
 * Top-level error taxonomy for lifecycle, shutdown, and protected calls
 */

use crate::signals::{Signal, SignalError};
use thiserror::Error;

/// Crate-level operation result
pub type CoordResult<T> = Result<T, CoordError>;

/// Coordination errors surfaced to embedders
#[derive(Error, Debug)]
pub enum CoordError {
    /// Invalid configuration value (timeout policy code, zero wait, ...)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Shutdown called more times than init: a resource-accounting bug in the caller
    #[error("Shutdown called with no outstanding init (reference count underflow)")]
    ShutdownUnderflow,

    /// The engine has already been rundown; the operation cannot proceed
    #[error("Engine already shut down")]
    EngineDown,

    /// Engine startup failed
    #[error("Engine startup failed: code {code}: {message}")]
    StartupFailed { code: i32, message: String },

    /// Engine reported a non-sentinel failure status
    #[error("Engine error {code}: {message}")]
    EngineError { code: i32, message: String },

    /// Engine rundown did not complete within its bound
    #[error("Shutdown incomplete: {0}")]
    ShutdownIncomplete(String),

    /// A monitor did not confirm OS registration within the acknowledgement wait
    #[error("Monitor for {0} did not acknowledge registration in time")]
    AckTimeout(Signal),

    /// Engine-reported transaction deadline expired under the raise-failure policy
    #[error("Engine transaction deadline expired")]
    EngineTimeout,

    /// Signal subsystem failure
    #[error(transparent)]
    Signal(#[from] SignalError),
}
