/*!
 * Transaction Boundary Adapter
 * Runs a user callback under the engine's retry-driving call, translating
 * control transfer into the explicit status codes the engine understands
 *
 * An unstructured unwind through the foreign-call frame is undefined
 * behavior, so every callback outcome is converted to a tagged status before
 * returning through that frame. Non-sentinel failures are stowed in the call
 * context, a rollback-equivalent status lets the engine unwind its own state,
 * and the original payload is re-raised intact once the outer call returns.
 */

use super::connection::Connection;
use super::flow::TxnFlow;
use crate::config::TimeoutPolicy;
use crate::core::errors::{CoordError, CoordResult};
use crate::core::types::SessionToken;
use crate::engine::{Engine, EngineStatus, TxnStatus};
use log::{debug, warn};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Per-protected-call context. Lives exactly for the duration of one
/// [`run_protected`]; the captured slot carries a non-sentinel failure
/// inertly across the foreign frame.
struct CallContext {
    captured: Option<Box<dyn Any + Send + 'static>>,
}

/// Run `callback` under the engine's transaction call.
///
/// Returns `Ok(true)` on commit, `Ok(false)` on engine-reported rollback.
/// A non-sentinel failure raised by the callback is re-raised here, after
/// the foreign call has fully returned, with its payload identity intact.
pub(crate) fn run_protected<F>(
    engine: &dyn Engine,
    conn: &mut Connection,
    name: &str,
    restore_list: &[String],
    mut callback: F,
) -> CoordResult<bool>
where
    F: FnMut(&mut Connection),
{
    let mut context = CallContext { captured: None };

    let status = {
        let context = &mut context;
        let mut attempt = move |conn: &mut Connection, token: SessionToken| -> TxnStatus {
            // The engine assigns a fresh token per nesting level; the prior
            // token must be visible again on every exit path so later reuse
            // of this connection observes its original context
            let prior = conn.swap_token(token);
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(conn)));
            conn.swap_token(prior);

            match outcome {
                Ok(()) => TxnStatus::Ok,
                Err(payload) => match payload.downcast::<TxnFlow>() {
                    Ok(flow) => match *flow {
                        TxnFlow::Restart => {
                            debug!("Callback for '{}' requested restart", name);
                            TxnStatus::Restart
                        }
                        TxnFlow::Rollback => {
                            debug!("Callback for '{}' requested rollback", name);
                            TxnStatus::Rollback
                        }
                    },
                    Err(other) => {
                        // Cannot cross the foreign frame as an unwind; carry
                        // it and let the engine roll its own state back
                        context.captured = Some(other);
                        TxnStatus::Rollback
                    }
                },
            }
        };
        engine.transaction_call(conn, name, restore_list, &mut attempt)
    };

    if let Some(payload) = context.captured.take() {
        warn!(
            "Re-raising failure carried across the transaction boundary for '{}'",
            name
        );
        panic::resume_unwind(payload);
    }

    match status {
        EngineStatus::Ok => Ok(true),
        EngineStatus::Rollback => Ok(false),
        EngineStatus::Timeout => match conn.timeout_policy() {
            TimeoutPolicy::Commit => Ok(true),
            TimeoutPolicy::Rollback => Ok(false),
            TimeoutPolicy::RaiseError => Err(CoordError::EngineTimeout),
        },
        EngineStatus::AlreadyDown => Err(CoordError::EngineDown),
        EngineStatus::Error { code, message } => Err(CoordError::EngineError { code, message }),
        status @ (EngineStatus::Deferred | EngineStatus::Restart) => Err(CoordError::EngineError {
            code: -1,
            message: format!("engine returned unexpected sentinel {} from transaction call", status),
        }),
    }
}
