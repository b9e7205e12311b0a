/*!
 * Connections
 * Per-execution-context engine session handles
 */

use crate::config::TimeoutPolicy;
use crate::core::types::SessionToken;
use serde::{Deserialize, Serialize};

/// A per-execution-context engine session handle.
///
/// Holds the session token identifying the transaction nesting context
/// currently active for this context, scratch space for engine-produced
/// error text, and the per-connection engine-deadline policy.
///
/// A connection is owned by exactly one execution context at a time. It is
/// deliberately not `Clone`: sharing happens only through the explicit
/// [`Connection::clone_handle`], which copies the token value into a fresh
/// connection with independent scratch space.
#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    token: SessionToken,
    /// Engine-produced diagnostic text from the most recent failed call
    scratch: String,
    timeout_policy: TimeoutPolicy,
}

impl Connection {
    /// Fresh connection outside any transaction.
    pub fn new() -> Self {
        Self {
            token: SessionToken::NONE,
            scratch: String::new(),
            timeout_policy: TimeoutPolicy::default(),
        }
    }

    /// Clone this connection so a *different* execution context can
    /// participate in the *same* open transaction. Discouraged but supported.
    ///
    /// The clone starts with a copy of the current token value and empty
    /// scratch space, so concurrent use of the clone cannot corrupt this
    /// connection's pending error text.
    ///
    /// # Hazard
    ///
    /// A clone carrying a stale token, used after the transaction level that
    /// issued the token has ended, fails reproducibly at the engine boundary;
    /// it is not a guaranteed-safe feature.
    pub fn clone_handle(&self) -> Self {
        Self {
            token: self.token,
            scratch: String::new(),
            timeout_policy: self.timeout_policy,
        }
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Swap the active token, returning the prior one. Used by the boundary
    /// adapter around each callback attempt.
    pub(crate) fn swap_token(&mut self, token: SessionToken) -> SessionToken {
        std::mem::replace(&mut self.token, token)
    }

    /// Engine-produced diagnostic text from the most recent failed call.
    pub fn error_text(&self) -> &str {
        &self.scratch
    }

    /// Record engine diagnostic text. Intended for [`crate::Engine`]
    /// implementations.
    pub fn set_error_text(&mut self, text: impl Into<String>) {
        self.scratch = text.into();
    }

    pub fn clear_error_text(&mut self) {
        self.scratch.clear();
    }

    pub fn timeout_policy(&self) -> TimeoutPolicy {
        self.timeout_policy
    }

    /// Set what a protected call reports when the engine's own transaction
    /// deadline expires. Defaults to [`TimeoutPolicy::RaiseError`].
    pub fn set_timeout_policy(&mut self, policy: TimeoutPolicy) {
        self.timeout_policy = policy;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}
