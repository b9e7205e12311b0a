/*!
 * Engine Boundary
 * The foreign transactional engine as seen from this crate
 *
 * Value marshalling, call-table parsing, and parameter-block construction all
 * live on the far side of this trait; the coordination layer only ever drives
 * the four entry points below.
 */

use crate::core::types::SessionToken;
use crate::signals::Signal;
use crate::txn::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status produced by an engine entry point.
///
/// The sentinel variants are the small fixed set the engine and this layer
/// both recognize as having special meaning; everything else arrives as
/// `Error` with the engine's diagnostic text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineStatus {
    /// Operation completed
    Ok,
    /// Engine postponed handling (signal arrived at a non-interruptible point)
    Deferred,
    /// Transaction attempt must be retried from scratch
    Restart,
    /// Transaction aborted; nothing committed
    Rollback,
    /// Engine-driven transaction deadline expired
    Timeout,
    /// Engine has already been torn down; no further calls will succeed
    AlreadyDown,
    /// Any other engine failure
    Error { code: i32, message: String },
}

impl EngineStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, EngineStatus::Ok)
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStatus::Ok => write!(f, "ok"),
            EngineStatus::Deferred => write!(f, "deferred"),
            EngineStatus::Restart => write!(f, "restart"),
            EngineStatus::Rollback => write!(f, "rollback"),
            EngineStatus::Timeout => write!(f, "timeout"),
            EngineStatus::AlreadyDown => write!(f, "already-down"),
            EngineStatus::Error { code, message } => write!(f, "error {}: {}", code, message),
        }
    }
}

/// Status the boundary adapter hands back to the engine for one callback
/// attempt. This is the tagged result that replaces unwinding through the
/// foreign frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxnStatus {
    /// Attempt succeeded; engine should commit
    Ok,
    /// Callback requested a retry from scratch
    Restart,
    /// Callback requested an abort
    Rollback,
}

/// Per-attempt callback the engine drives. Invoked zero or more times by
/// [`Engine::transaction_call`], once per attempt, each time with the fresh
/// nesting token the engine assigned for that attempt.
pub type AttemptCallback<'a> = &'a mut dyn FnMut(&mut Connection, SessionToken) -> TxnStatus;

/// The external transactional engine.
///
/// All methods are synchronous: the engine is a single-threaded native
/// library and every entry point blocks its caller until the engine returns.
/// `signal_dispatch` and `transaction_call` may be issued concurrently from
/// multiple connections; `startup`/`rundown` are serialized by the lifecycle
/// layer.
pub trait Engine: Send + Sync {
    /// Bring the engine up. Called exactly once per 0→1 lifecycle transition.
    fn startup(&self) -> EngineStatus;

    /// Tear the engine down and flush state. Called once per 1→0 transition,
    /// and again harmlessly if a fatal path already ran it down.
    fn rundown(&self) -> EngineStatus;

    /// Hand one signal occurrence to the engine. May block while the engine
    /// services the signal; for a process-fatal signal the engine's handler
    /// may never return at all.
    fn signal_dispatch(&self, conn: &mut Connection, signal: Signal) -> EngineStatus;

    /// Run one protected transactional call. The engine invokes `callback`
    /// once per attempt (zero times if it fails before the first attempt),
    /// interpreting the returned [`TxnStatus`] to drive its retry/rollback
    /// protocol. `restore_list` names the caller-local values the engine
    /// restores to their entry state on each restart.
    fn transaction_call(
        &self,
        conn: &mut Connection,
        name: &str,
        restore_list: &[String],
        callback: AttemptCallback<'_>,
    ) -> EngineStatus;
}
