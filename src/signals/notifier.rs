/*!
 * Engine Notifier
 * Synchronously hands one signal occurrence to the engine and interprets
 * the three recognized outcomes
 */

use super::registry::SignalRegistry;
use super::types::{Signal, SignalError, SignalResult};
use crate::engine::{Engine, EngineStatus};
use crate::shutdown::{ShutdownCause, ShutdownCoordinator};
use crate::txn::Connection;
use log::{debug, info, warn};
use std::sync::Arc;

/// Relays signal occurrences into the engine on behalf of monitors and of
/// user code that intercepted a signal via an override channel.
pub struct EngineNotifier {
    engine: Arc<dyn Engine>,
    registry: Arc<SignalRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
}

impl EngineNotifier {
    pub fn new(
        engine: Arc<dyn Engine>,
        registry: Arc<SignalRegistry>,
        coordinator: Arc<ShutdownCoordinator>,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            registry,
            coordinator,
        })
    }

    /// Hand one occurrence of `signal` to the engine. Blocks until the engine
    /// returns; for a process-fatal signal the engine's handler may never
    /// return at all.
    ///
    /// Returns `Ok(true)` when the engine deferred handling to a safer point
    /// (not an error), `Ok(false)` when it serviced the signal. If the engine
    /// reports it has already been torn down, shutdown of all monitors is
    /// triggered without blocking the caller and [`SignalError::EngineDown`]
    /// is returned.
    pub fn dispatch(&self, conn: &mut Connection, signal: Signal) -> SignalResult<bool> {
        debug!("Dispatching {} to engine", signal);
        match self.engine.signal_dispatch(conn, signal) {
            EngineStatus::Ok => Ok(false),
            EngineStatus::Deferred => {
                debug!("Engine deferred handling of {}", signal);
                Ok(true)
            }
            EngineStatus::AlreadyDown => {
                info!(
                    "Engine reported rundown during dispatch of {}; stopping monitors",
                    signal
                );
                self.registry.mark_down();
                self.coordinator.trigger(ShutdownCause::Fatal);
                Err(SignalError::EngineDown)
            }
            EngineStatus::Error { code, message } => {
                warn!("Dispatch of {} failed: {}: {}", signal, code, message);
                Err(SignalError::Dispatch {
                    signal,
                    code,
                    message,
                })
            }
            other => Err(SignalError::Dispatch {
                signal,
                code: -1,
                message: format!("unexpected sentinel status {}", other),
            }),
        }
    }
}
