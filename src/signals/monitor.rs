/*!
 * Per-Signal Monitor
 * One task per monitored signal: waits for a delivery or a stop request,
 * whichever comes first, and relays deliveries to the override channel or
 * the engine
 */

use super::notifier::EngineNotifier;
use super::registry::{MonitorChannels, SignalState};
use super::types::{Signal, SignalError};
use crate::txn::Connection;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// What one serviced delivery means for the monitor's loop.
enum Serviced {
    Continue,
    Exit,
}

/// Marks the monitor done and reports its exit on the finished channel.
/// Runs on drop, so a monitor that dies unwinding still counts as quiesced
/// and the shutdown coordinator never waits out its full bound on it.
struct ExitReport {
    state: Arc<SignalState>,
    finished_tx: mpsc::Sender<Signal>,
}

impl Drop for ExitReport {
    fn drop(&mut self) {
        let signal = self.state.signal();
        self.state.mark_done();
        let _ = self.finished_tx.try_send(signal);
        info!("Monitor for {} exited", signal);
    }
}

/// Dedicated relay task for exactly one monitored signal.
pub struct Monitor {
    state: Arc<SignalState>,
    notifier: Arc<EngineNotifier>,
    /// Engine session context for this monitor's dispatches. Absent only
    /// while a dispatch is in flight on a blocking thread.
    conn: Option<Connection>,
}

impl Monitor {
    /// Spawn the monitor task. `ack_tx` fires once the monitor is receiving,
    /// closing the window in which a delivery could arrive with no one
    /// waiting for it.
    pub fn spawn(
        channels: MonitorChannels,
        notifier: Arc<EngineNotifier>,
        ack_tx: oneshot::Sender<()>,
    ) -> JoinHandle<()> {
        let MonitorChannels {
            state,
            deliver_rx,
            stop_rx,
            finished_tx,
        } = channels;
        let monitor = Monitor {
            state,
            notifier,
            conn: Some(Connection::new()),
        };
        tokio::spawn(monitor.run(deliver_rx, stop_rx, finished_tx, ack_tx))
    }

    async fn run(
        mut self,
        mut deliver_rx: mpsc::Receiver<Signal>,
        mut stop_rx: mpsc::Receiver<()>,
        finished_tx: mpsc::Sender<Signal>,
        ack_tx: oneshot::Sender<()>,
    ) {
        let signal = self.state.signal();
        let _report = ExitReport {
            state: self.state.clone(),
            finished_tx,
        };
        let _ = ack_tx.send(());
        debug!("Monitor for {} running", signal);

        loop {
            tokio::select! {
                biased;
                _ = stop_rx.recv() => {
                    debug!("Monitor for {} received stop request", signal);
                    break;
                }
                delivery = deliver_rx.recv() => match delivery {
                    Some(signal) => match self.service(signal).await {
                        Serviced::Continue => {}
                        Serviced::Exit => break,
                    },
                    // All delivery senders dropped; nothing left to relay
                    None => break,
                }
            }
        }
    }

    /// Handle one delivery: relay to the override channel when one is
    /// installed, otherwise dispatch to the engine.
    async fn service(&mut self, signal: Signal) -> Serviced {
        self.state.set_servicing(true);

        if let Some(override_tx) = self.state.override_channel() {
            // Never block the monitor on a slow consumer; an occurrence the
            // user is not ready for is dropped, matching OS semantics.
            if override_tx.try_send(signal).is_err() {
                debug!("Override channel for {} not receiving; dropped", signal);
            }
            self.state.set_servicing(false);
            return Serviced::Continue;
        }

        let outcome = self.dispatch_blocking(signal).await;
        self.state.set_servicing(false);

        match outcome {
            Ok(true) => {
                // Deferred: the engine will pick the signal up at a safe
                // point; the monitor just returns to waiting
                debug!("Engine deferred {}; monitor resumes waiting", signal);
                Serviced::Continue
            }
            Ok(false) => Serviced::Continue,
            Err(SignalError::EngineDown) => {
                // Notifier already triggered coordinated shutdown
                info!("Monitor for {} exiting: engine already down", signal);
                Serviced::Exit
            }
            Err(err) => {
                // An unexpected status from the engine leaves the relay in an
                // unknown state; this monitor cannot continue
                panic!("monitor for {} cannot continue: {}", signal, err);
            }
        }
    }

    /// Run the synchronous engine dispatch off the async workers. If the
    /// engine's handler never returns (fatal signal), this future never
    /// resolves and the monitor stays parked in the servicing state, which
    /// the shutdown coordinator deliberately treats as ignorable.
    async fn dispatch_blocking(&mut self, signal: Signal) -> Result<bool, SignalError> {
        let notifier = self.notifier.clone();
        let mut conn = self.conn.take().unwrap_or_default();
        let joined = tokio::task::spawn_blocking(move || {
            let outcome = notifier.dispatch(&mut conn, signal);
            (conn, outcome)
        })
        .await;

        match joined {
            Ok((conn, outcome)) => {
                self.conn = Some(conn);
                outcome
            }
            Err(join_err) if join_err.is_panic() => {
                std::panic::resume_unwind(join_err.into_panic())
            }
            Err(join_err) => {
                warn!("Dispatch task for {} cancelled: {}", signal, join_err);
                Err(SignalError::EngineDown)
            }
        }
    }
}
