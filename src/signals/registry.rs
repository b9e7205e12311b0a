/*!
 * Signal Registry
 * Per-signal state records and the channels that connect monitors to the
 * delivery sources and the shutdown coordinator
 */

use super::types::{Signal, SignalStats, MONITORED};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, warn};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Delivery channel depth. Must be at least 2 so a burst of identical
/// signals is not lost while one occurrence is being serviced; beyond that,
/// pending identical signals collapse exactly as OS delivery does.
const DELIVERY_DEPTH: usize = 4;

/// One monitored signal's state record.
pub struct SignalState {
    signal: Signal,
    /// User-override channel; absent means "relay internally to the engine".
    /// Guarded so install/remove cannot race with the monitor's read.
    override_tx: Mutex<Option<mpsc::Sender<Signal>>>,
    /// True while this signal's handler logic is actively running
    servicing: AtomicBool,
    /// True once the monitor has exited
    shutdown_done: AtomicBool,
    deliver_tx: mpsc::Sender<Signal>,
    stop_tx: mpsc::Sender<()>,
}

impl SignalState {
    pub fn signal(&self) -> Signal {
        self.signal
    }

    pub fn set_servicing(&self, on: bool) {
        self.servicing.store(on, Ordering::SeqCst);
    }

    pub fn is_servicing(&self) -> bool {
        self.servicing.load(Ordering::SeqCst)
    }

    pub fn mark_done(&self) {
        self.shutdown_done.store(true, Ordering::SeqCst);
    }

    pub fn is_done(&self) -> bool {
        self.shutdown_done.load(Ordering::SeqCst)
    }

    /// Clone the currently installed override sender, if any.
    pub fn override_channel(&self) -> Option<mpsc::Sender<Signal>> {
        self.override_tx.lock().clone()
    }

    fn install_override(&self, tx: mpsc::Sender<Signal>) {
        *self.override_tx.lock() = Some(tx);
    }

    fn remove_override(&self) -> bool {
        self.override_tx.lock().take().is_some()
    }
}

/// Channel ends handed to a freshly spawned monitor.
pub struct MonitorChannels {
    pub state: Arc<SignalState>,
    pub deliver_rx: mpsc::Receiver<Signal>,
    pub stop_rx: mpsc::Receiver<()>,
    pub finished_tx: mpsc::Sender<Signal>,
}

/// Static map from each monitored signal to its state record.
pub struct SignalRegistry {
    states: DashMap<Signal, Arc<SignalState>, RandomState>,
    finished_tx: mpsc::Sender<Signal>,
    /// Set once teardown begins; operational entry points check it so a
    /// context racing shutdown sees a typed failure instead of a hang.
    down: AtomicBool,
}

impl SignalRegistry {
    /// Build the registry and the completion channel the shutdown
    /// coordinator watches. The receiver goes to the coordinator.
    pub fn new() -> (Arc<Self>, mpsc::Receiver<Signal>) {
        // Every monitor reports exit exactly once, so capacity for the full
        // set means no report is ever dropped.
        let (finished_tx, finished_rx) = mpsc::channel(MONITORED.len());
        let registry = Arc::new(Self {
            states: DashMap::with_hasher(RandomState::new()),
            finished_tx,
            down: AtomicBool::new(false),
        });
        (registry, finished_rx)
    }

    /// Create the state record and channels for one monitor.
    pub fn register(&self, signal: Signal) -> MonitorChannels {
        let (deliver_tx, deliver_rx) = mpsc::channel(DELIVERY_DEPTH);
        // At-most-once stop request
        let (stop_tx, stop_rx) = mpsc::channel(1);
        let state = Arc::new(SignalState {
            signal,
            override_tx: Mutex::new(None),
            servicing: AtomicBool::new(false),
            shutdown_done: AtomicBool::new(false),
            deliver_tx,
            stop_tx,
        });
        self.states.insert(signal, state.clone());
        debug!("Registered signal state for {}", signal);
        MonitorChannels {
            state,
            deliver_rx,
            stop_rx,
            finished_tx: self.finished_tx.clone(),
        }
    }

    pub fn state(&self, signal: Signal) -> Option<Arc<SignalState>> {
        self.states.get(&signal).map(|entry| entry.value().clone())
    }

    /// Hand one signal occurrence to its monitor. Never blocks; returns
    /// whether the occurrence was accepted. A full channel means an
    /// identical signal is already pending, which matches OS collapsing
    /// of pending signals.
    pub fn deliver(&self, signal: Signal) -> bool {
        let Some(state) = self.state(signal) else {
            warn!("Delivery of {} before its monitor registered", signal);
            return false;
        };
        match state.deliver_tx.try_send(signal) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!("Delivery of {} collapsed into pending occurrence", signal);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!("Delivery of {} after its monitor exited", signal);
                false
            }
        }
    }

    /// Install a user-override channel for each listed signal.
    pub fn install_override(&self, tx: &mpsc::Sender<Signal>, signals: &[Signal]) {
        for &signal in signals {
            if let Some(state) = self.state(signal) {
                state.install_override(tx.clone());
                debug!("Override installed for {}", signal);
            }
        }
    }

    /// Remove any user override for each listed signal, restoring internal
    /// relay to the engine.
    pub fn remove_override(&self, signals: &[Signal]) {
        for &signal in signals {
            if let Some(state) = self.state(signal) {
                if state.remove_override() {
                    debug!("Override removed for {}", signal);
                }
            }
        }
    }

    /// Non-blocking stop request to every monitor.
    pub fn request_stop_all(&self) {
        for entry in self.states.iter() {
            let _ = entry.value().stop_tx.try_send(());
        }
    }

    /// True when every monitor has either exited or is actively servicing a
    /// handler. A servicing monitor counts as quiesced: a fatal signal's
    /// engine handler never returns, and waiting on it would block shutdown
    /// indefinitely.
    pub fn all_quiesced(&self) -> bool {
        self.states
            .iter()
            .all(|entry| entry.value().is_done() || entry.value().is_servicing())
    }

    pub fn mark_down(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> SignalStats {
        let mut stats = SignalStats {
            monitored: 0,
            overridden: 0,
            servicing: 0,
            shutdown_done: 0,
        };
        for entry in self.states.iter() {
            let state = entry.value();
            stats.monitored += 1;
            if state.override_channel().is_some() {
                stats.overridden += 1;
            }
            if state.is_servicing() {
                stats.servicing += 1;
            }
            if state.is_done() {
                stats.shutdown_done += 1;
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivery_is_buffered_and_collapsing() {
        let (registry, _finished_rx) = SignalRegistry::new();
        let mut channels = registry.register(Signal::SIGUSR1);

        for _ in 0..DELIVERY_DEPTH {
            assert!(registry.deliver(Signal::SIGUSR1));
        }
        // Burst beyond depth collapses, silently
        assert!(!registry.deliver(Signal::SIGUSR1));

        for _ in 0..DELIVERY_DEPTH {
            assert_eq!(channels.deliver_rx.try_recv().unwrap(), Signal::SIGUSR1);
        }
    }

    #[test]
    fn quiesced_treats_servicing_as_done() {
        let (registry, _finished_rx) = SignalRegistry::new();
        let a = registry.register(Signal::SIGINT).state;
        let b = registry.register(Signal::SIGTERM).state;

        assert!(!registry.all_quiesced());
        a.mark_done();
        b.set_servicing(true);
        assert!(registry.all_quiesced());
    }

    #[test]
    fn override_install_and_remove() {
        let (registry, _finished_rx) = SignalRegistry::new();
        let state = registry.register(Signal::SIGHUP).state;
        let (tx, _rx) = mpsc::channel(1);

        registry.install_override(&tx, &[Signal::SIGHUP]);
        assert!(state.override_channel().is_some());

        registry.remove_override(&[Signal::SIGHUP]);
        assert!(state.override_channel().is_none());
    }
}
