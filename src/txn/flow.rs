/*!
 * Transaction Control Transfer
 * The two sentinel intents a callback may raise, and how they travel
 *
 * Restart and rollback are expressed as panic payloads so they can cut
 * through arbitrary user call depth, but they are always intercepted by the
 * boundary adapter before they would unwind through the engine's foreign
 * frame, and converted there into explicit status codes.
 */

use std::panic;

/// Sentinel control-transfer intents. Interpreted only by the boundary
/// adapter; any other panic payload is carried across the boundary and
/// re-raised on the near side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxnFlow {
    Restart,
    Rollback,
}

/// Request that the engine retry the current transaction callback from
/// scratch.
///
/// Callable only from within a running transaction callback; anywhere else
/// the control transfer propagates as an ordinary panic.
pub fn restart() -> ! {
    panic::panic_any(TxnFlow::Restart)
}

/// Request that the engine abort the current transaction. The protected call
/// returns `Ok(false)` and nothing from the callback is committed.
///
/// Callable only from within a running transaction callback; anywhere else
/// the control transfer propagates as an ordinary panic.
pub fn rollback() -> ! {
    panic::panic_any(TxnFlow::Rollback)
}
