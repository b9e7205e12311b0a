/*!
 * Shutdown Coordinator
 * Joint, timeout-bounded teardown of the engine and every per-signal monitor
 *
 * Callable any number of times (idempotent) and safely from inside a
 * monitor's own call stack: triggering is non-blocking, and a monitor that is
 * mid-handler is counted as quiesced rather than waited on, because a fatal
 * signal's engine handler never returns control.
 */

use crate::config::Config;
use crate::core::errors::{CoordError, CoordResult};
use crate::engine::{Engine, EngineStatus};
use crate::signals::{Signal, SignalRegistry};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// What initiated this shutdown sequence. Fatal-signal paths get the short
/// engine-rundown bound: the engine's internal lock is likely already held by
/// the signal machinery and a long wait would only delay process exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownCause {
    Normal,
    Fatal,
}

pub struct ShutdownCoordinator {
    registry: Arc<SignalRegistry>,
    engine: Arc<dyn Engine>,
    config: Config,
    /// Serializes shutdown sequences; only one runs to completion
    sequence: Mutex<()>,
    completed: AtomicBool,
    /// Monitors report their exit here; the watcher re-evaluates completion
    /// on every report rather than polling
    finished_rx: Mutex<mpsc::Receiver<Signal>>,
}

impl ShutdownCoordinator {
    pub fn new(
        registry: Arc<SignalRegistry>,
        engine: Arc<dyn Engine>,
        config: Config,
        finished_rx: mpsc::Receiver<Signal>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            engine,
            config,
            sequence: Mutex::new(()),
            completed: AtomicBool::new(false),
            finished_rx: Mutex::new(finished_rx),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// Fire-and-forget shutdown, safe to call from inside a monitor's own
    /// dispatch path. Stop requests go out immediately; the full sequence
    /// runs on a spawned task when a runtime is available.
    pub fn trigger(self: &Arc<Self>, cause: ShutdownCause) {
        self.registry.mark_down();
        self.registry.request_stop_all();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move {
                    if let Err(err) = this.run(cause).await {
                        warn!("Triggered shutdown finished incompletely: {}", err);
                    }
                });
            }
            Err(_) => {
                warn!("Shutdown triggered outside the runtime; monitors stopped, engine rundown deferred to lifecycle shutdown");
            }
        }
    }

    /// Run the full sequence: stop every monitor, wait (bounded) for them to
    /// quiesce, and concurrently run the engine down (bounded by the short or
    /// long wait depending on `cause`). Returns immediately when a previous
    /// sequence already completed.
    pub async fn run(&self, cause: ShutdownCause) -> CoordResult<()> {
        if self.is_complete() {
            return Ok(());
        }
        let _guard = self.sequence.lock().await;
        if self.is_complete() {
            return Ok(());
        }

        info!("Shutdown sequence starting (cause: {:?})", cause);
        self.registry.mark_down();
        self.registry.request_stop_all();

        let (_, rundown) = tokio::join!(self.quiesce_monitors(), self.rundown_engine(cause));

        self.completed.store(true, Ordering::SeqCst);
        info!("Shutdown sequence complete");
        rundown
    }

    /// Wait for every monitor to report done-or-servicing, re-scanning on
    /// each completion event. Expiry of the bound is advisory: the process is
    /// exiting regardless, so a stuck monitor is logged and left behind.
    async fn quiesce_monitors(&self) {
        let wait = self.config.monitor_shutdown_wait;
        let watch = async {
            let mut finished_rx = self.finished_rx.lock().await;
            while !self.registry.all_quiesced() {
                match finished_rx.recv().await {
                    Some(signal) => debug!("Monitor for {} reported completion", signal),
                    None => break,
                }
            }
        };
        if tokio::time::timeout(wait, watch).await.is_err() {
            warn!(
                "Some monitors did not quiesce within {:?}; proceeding with shutdown",
                wait
            );
        }
    }

    async fn rundown_engine(&self, cause: ShutdownCause) -> CoordResult<()> {
        let wait = match cause {
            ShutdownCause::Fatal => self.config.rundown_wait_short,
            ShutdownCause::Normal => self.config.rundown_wait_long,
        };
        let engine = self.engine.clone();
        let rundown = tokio::task::spawn_blocking(move || engine.rundown());

        match tokio::time::timeout(wait, rundown).await {
            Err(_) => Err(CoordError::ShutdownIncomplete(format!(
                "engine rundown exceeded {:?}",
                wait
            ))),
            Ok(Err(join_err)) => Err(CoordError::ShutdownIncomplete(format!(
                "engine rundown task failed: {}",
                join_err
            ))),
            Ok(Ok(EngineStatus::Ok)) | Ok(Ok(EngineStatus::AlreadyDown)) => Ok(()),
            Ok(Ok(status)) => Err(CoordError::ShutdownIncomplete(format!(
                "engine rundown returned {}",
                status
            ))),
        }
    }
}
