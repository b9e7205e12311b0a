/*!
 * OS Signal Forwarding
 * Optional binding of real OS signal delivery into the registry
 *
 * The registry's `deliver` entry point is the single injection path for
 * signal occurrences; these tasks forward kernel deliveries into it. Hardware
 * fault signals (SIGBUS, SIGFPE) cannot be routed through the async delivery
 * facility and are left to the engine's own handlers.
 */

use super::registry::SignalRegistry;
use super::types::Signal;
use log::warn;
use std::sync::Arc;

impl Signal {
    /// Whether this signal can be observed through the async OS delivery
    /// facility and forwarded by [`spawn_binders`].
    pub fn os_forwardable(&self) -> bool {
        !matches!(self, Signal::SIGBUS | Signal::SIGFPE)
    }
}

/// Spawn one forwarding task per forwardable monitored signal.
#[cfg(unix)]
pub fn spawn_binders(registry: Arc<SignalRegistry>) {
    use super::types::{SignalError, MONITORED};
    use log::debug;
    use tokio::signal::unix::{signal, SignalKind};

    for &sig in MONITORED {
        if !sig.os_forwardable() {
            debug!("Not binding {}: handled by the engine directly", sig);
            continue;
        }
        let kind = SignalKind::from_raw(sig.number() as i32);
        let mut stream = match signal(kind) {
            Ok(stream) => stream,
            Err(err) => {
                let err = SignalError::RegistrationFailed(sig, err.to_string());
                warn!("Skipping OS binding: {}", err);
                continue;
            }
        };
        let registry = registry.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                if registry.is_down() {
                    break;
                }
                registry.deliver(sig);
            }
        });
    }
}

#[cfg(not(unix))]
pub fn spawn_binders(_registry: Arc<SignalRegistry>) {
    warn!("OS signal forwarding is only available on unix targets");
}
