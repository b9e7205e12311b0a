/*!
 * Signal Types
 * The monitored signal set and signal-subsystem result types
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Signal subsystem result
pub type SignalResult<T> = Result<T, SignalError>;

/// Signal subsystem errors
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum SignalError {
    #[error("Signal number {0} is not in the monitored set")]
    Unmonitored(u32),

    #[error("Dispatch of {signal} failed: engine status {code}: {message}")]
    Dispatch {
        signal: Signal,
        code: i32,
        message: String,
    },

    #[error("Monitor registration failed for {0}: {1}")]
    RegistrationFailed(Signal, String),

    #[error("Engine already shut down")]
    EngineDown,
}

/// The signals this layer monitors on the engine's behalf.
///
/// One monitor task runs per variant between init and shutdown. The engine
/// expects callers to relay exactly these; anything else is left to the
/// process's own disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Signal {
    /// Hangup detected on controlling terminal
    SIGHUP = 1,
    /// Interrupt from keyboard (Ctrl+C)
    SIGINT = 2,
    /// Quit from keyboard (Ctrl+\)
    SIGQUIT = 3,
    /// Abort signal
    SIGABRT = 6,
    /// Bus error (bad memory access)
    SIGBUS = 7,
    /// Floating-point exception
    SIGFPE = 8,
    /// User-defined signal 1
    SIGUSR1 = 10,
    /// User-defined signal 2
    SIGUSR2 = 12,
    /// Timer signal
    SIGALRM = 14,
    /// Termination signal
    SIGTERM = 15,
    /// Continue if stopped
    SIGCONT = 18,
    /// Stop typed at terminal (Ctrl+Z)
    SIGTSTP = 20,
    /// Terminal input for background process
    SIGTTIN = 21,
    /// Terminal output for background process
    SIGTTOU = 22,
}

/// Every monitored signal, in delivery-registration order.
pub const MONITORED: &[Signal] = &[
    Signal::SIGHUP,
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGABRT,
    Signal::SIGBUS,
    Signal::SIGFPE,
    Signal::SIGUSR1,
    Signal::SIGUSR2,
    Signal::SIGALRM,
    Signal::SIGTERM,
    Signal::SIGCONT,
    Signal::SIGTSTP,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

impl Signal {
    /// Convert from signal number
    pub fn from_number(n: u32) -> SignalResult<Self> {
        match n {
            1 => Ok(Signal::SIGHUP),
            2 => Ok(Signal::SIGINT),
            3 => Ok(Signal::SIGQUIT),
            6 => Ok(Signal::SIGABRT),
            7 => Ok(Signal::SIGBUS),
            8 => Ok(Signal::SIGFPE),
            10 => Ok(Signal::SIGUSR1),
            12 => Ok(Signal::SIGUSR2),
            14 => Ok(Signal::SIGALRM),
            15 => Ok(Signal::SIGTERM),
            18 => Ok(Signal::SIGCONT),
            20 => Ok(Signal::SIGTSTP),
            21 => Ok(Signal::SIGTTIN),
            22 => Ok(Signal::SIGTTOU),
            _ => Err(SignalError::Unmonitored(n)),
        }
    }

    /// Get signal number
    pub fn number(&self) -> u32 {
        *self as u32
    }

    /// Check if the engine's handler for this signal is process-fatal
    /// (does not return control to the monitor that dispatched it)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Signal::SIGINT
                | Signal::SIGQUIT
                | Signal::SIGABRT
                | Signal::SIGBUS
                | Signal::SIGFPE
                | Signal::SIGTERM
        )
    }

    /// Get human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Signal::SIGHUP => "Hangup",
            Signal::SIGINT => "Interrupt",
            Signal::SIGQUIT => "Quit",
            Signal::SIGABRT => "Aborted",
            Signal::SIGBUS => "Bus error",
            Signal::SIGFPE => "Floating point exception",
            Signal::SIGUSR1 => "User defined signal 1",
            Signal::SIGUSR2 => "User defined signal 2",
            Signal::SIGALRM => "Alarm clock",
            Signal::SIGTERM => "Terminated",
            Signal::SIGCONT => "Continued",
            Signal::SIGTSTP => "Stopped",
            Signal::SIGTTIN => "Stopped (tty input)",
            Signal::SIGTTOU => "Stopped (tty output)",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.number())
    }
}

/// Registry observability snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalStats {
    pub monitored: usize,
    pub overridden: usize,
    pub servicing: usize,
    pub shutdown_done: usize,
}
