/*!
 * Lifecycle Counter
 * Reentrant init/shutdown reference counting around the shared engine handle
 *
 * Engine startup runs only on the 0→1 transition and teardown only on 1→0.
 * Init does not return until every monitor has confirmed it is receiving,
 * closing the window where a signal could arrive before anyone is waiting.
 */

use crate::config::Config;
use crate::core::errors::{CoordError, CoordResult};
use crate::engine::{Engine, EngineStatus};
use crate::shutdown::{ShutdownCause, ShutdownCoordinator};
use crate::signals::{
    EngineNotifier, Monitor, Signal, SignalRegistry, SignalStats, MONITORED,
};
use crate::txn::{run_protected, Connection};
use log::{info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

/// Everything a running instance shares between its handles and its tasks.
struct Shared {
    engine: Arc<dyn Engine>,
    registry: Arc<SignalRegistry>,
    coordinator: Arc<ShutdownCoordinator>,
    notifier: Arc<EngineNotifier>,
}

/// Handle to a running coordination instance. Cheap to clone; every
/// outstanding `init` call holds one.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Allocate a fresh per-context connection with its own scratch space
    /// and no open transaction.
    pub fn new_connection(&self) -> Connection {
        Connection::new()
    }

    /// Install `tx` as the override channel for each listed signal. While
    /// installed, deliveries of those signals go to `tx` (non-blocking, an
    /// occurrence is dropped if the receiver is not keeping up) instead of
    /// the engine.
    pub fn signal_notify(
        &self,
        tx: &mpsc::Sender<Signal>,
        signals: &[Signal],
    ) -> CoordResult<()> {
        if self.is_down() {
            return Err(CoordError::EngineDown);
        }
        self.shared.registry.install_override(tx, signals);
        Ok(())
    }

    /// Remove any override for each listed signal, restoring internal relay
    /// to the engine.
    pub fn signal_reset(&self, signals: &[Signal]) -> CoordResult<()> {
        if self.is_down() {
            return Err(CoordError::EngineDown);
        }
        self.shared.registry.remove_override(signals);
        Ok(())
    }

    /// Explicitly hand a signal to the engine, typically from a context that
    /// intercepted it via an override channel. Blocks until the engine
    /// returns. `Ok(true)` means the engine deferred handling.
    pub fn notify_engine(&self, conn: &mut Connection, signal: Signal) -> CoordResult<bool> {
        if self.is_down() {
            return Err(CoordError::EngineDown);
        }
        self.shared
            .notifier
            .dispatch(conn, signal)
            .map_err(|err| match err {
                crate::signals::SignalError::EngineDown => CoordError::EngineDown,
                other => CoordError::Signal(other),
            })
    }

    /// Inject one occurrence of `signal` as if the OS had delivered it.
    /// The OS forwarding tasks and synthetic test delivery share this path.
    /// Returns whether the occurrence was accepted (a pending identical
    /// occurrence may absorb it).
    pub fn deliver(&self, signal: Signal) -> bool {
        self.shared.registry.deliver(signal)
    }

    /// Run `callback` as a protected transactional call. Blocks the caller
    /// for the full duration of the engine call, which may invoke `callback`
    /// several times (once per retry attempt).
    ///
    /// Returns `Ok(true)` on commit and `Ok(false)` on rollback. Restart and
    /// rollback requests raised inside the callback never escape; any other
    /// failure raised inside the callback is re-raised here with its
    /// identity intact.
    pub fn transaction<F>(
        &self,
        conn: &mut Connection,
        name: &str,
        restore_list: &[String],
        callback: F,
    ) -> CoordResult<bool>
    where
        F: FnMut(&mut Connection),
    {
        if self.is_down() {
            return Err(CoordError::EngineDown);
        }
        run_protected(self.shared.engine.as_ref(), conn, name, restore_list, callback)
    }

    /// True once teardown has begun; operational calls will fail with
    /// [`CoordError::EngineDown`] rather than hang.
    pub fn is_down(&self) -> bool {
        self.shared.registry.is_down() || self.shared.coordinator.is_complete()
    }

    /// Registry observability snapshot.
    pub fn signal_stats(&self) -> SignalStats {
        self.shared.registry.stats()
    }
}

struct CounterState {
    count: u32,
    shared: Option<Arc<Shared>>,
}

/// Reference-counted lifecycle for one engine instance.
pub struct Lifecycle {
    engine: Arc<dyn Engine>,
    config: Config,
    state: Mutex<CounterState>,
}

impl Lifecycle {
    pub fn new(engine: Arc<dyn Engine>, config: Config) -> Self {
        Self {
            engine,
            config,
            state: Mutex::new(CounterState {
                count: 0,
                shared: None,
            }),
        }
    }

    /// Bring the instance up, or join an already-running one.
    ///
    /// The first call performs engine startup, spawns one monitor per
    /// monitored signal, and waits for every monitor to confirm it is
    /// receiving before returning. Nested calls return the existing handle.
    pub async fn init(&self) -> CoordResult<Runtime> {
        let mut state = self.state.lock().await;

        if state.count > 0 {
            if let Some(shared) = state.shared.clone() {
                state.count += 1;
                info!("Joined running instance (count now {})", state.count);
                return Ok(Runtime { shared });
            }
        }

        self.config.validate()?;

        let engine = self.engine.clone();
        let startup = tokio::task::spawn_blocking(move || engine.startup())
            .await
            .map_err(|join_err| CoordError::StartupFailed {
                code: -1,
                message: format!("startup task failed: {}", join_err),
            })?;
        match startup {
            EngineStatus::Ok => {}
            EngineStatus::Error { code, message } => {
                return Err(CoordError::StartupFailed { code, message });
            }
            status => {
                return Err(CoordError::StartupFailed {
                    code: -1,
                    message: format!("engine startup returned {}", status),
                });
            }
        }

        let (registry, finished_rx) = SignalRegistry::new();
        let coordinator = ShutdownCoordinator::new(
            registry.clone(),
            self.engine.clone(),
            self.config.clone(),
            finished_rx,
        );
        let notifier = EngineNotifier::new(self.engine.clone(), registry.clone(), coordinator.clone());

        let mut acks = Vec::with_capacity(MONITORED.len());
        for &signal in MONITORED {
            let channels = registry.register(signal);
            let (ack_tx, ack_rx) = oneshot::channel();
            Monitor::spawn(channels, notifier.clone(), ack_tx);
            acks.push((signal, ack_rx));
        }

        for (signal, ack_rx) in acks {
            match tokio::time::timeout(self.config.signal_ack_wait, ack_rx).await {
                Ok(Ok(())) => {}
                _ => {
                    warn!("Monitor for {} never acknowledged; aborting init", signal);
                    // Best-effort teardown of whatever did come up
                    if let Err(err) = coordinator.run(ShutdownCause::Normal).await {
                        warn!("Teardown after failed init was incomplete: {}", err);
                    }
                    return Err(CoordError::AckTimeout(signal));
                }
            }
        }

        if self.config.bind_os_signals {
            crate::signals::os::spawn_binders(registry.clone());
        }

        let shared = Arc::new(Shared {
            engine: self.engine.clone(),
            registry,
            coordinator,
            notifier,
        });
        state.shared = Some(shared.clone());
        state.count = 1;
        info!("Instance initialized; {} monitors running", MONITORED.len());
        Ok(Runtime { shared })
    }

    /// Release one init reference. Tears the instance down only when the
    /// last reference is released. Calling shutdown more times than init is
    /// a resource-accounting bug and fails loudly.
    pub async fn shutdown(&self, runtime: Runtime) -> CoordResult<()> {
        let mut state = self.state.lock().await;
        if state.count == 0 {
            return Err(CoordError::ShutdownUnderflow);
        }
        state.count -= 1;
        if state.count > 0 {
            info!("Released one reference (count now {})", state.count);
            drop(runtime);
            return Ok(());
        }

        let shared = state.shared.take();
        drop(runtime);
        match shared {
            Some(shared) => shared.coordinator.run(ShutdownCause::Normal).await,
            None => Ok(()),
        }
    }

    /// Unconditional teardown regardless of outstanding init calls. Used
    /// when a fatal signal means the process cannot continue; idempotent
    /// against concurrent ordinary shutdowns.
    pub async fn shutdown_hard(&self, runtime: Runtime) -> CoordResult<()> {
        let mut state = self.state.lock().await;
        // Force the count to 1 and release it: teardown happens now no
        // matter how many holders remain
        state.count = 0;
        let shared = state.shared.take().unwrap_or_else(|| runtime.shared.clone());
        drop(runtime);
        shared.coordinator.run(ShutdownCause::Fatal).await
    }
}
