/*!
 * Session Tokens
 * Opaque identifiers for engine-side transaction nesting contexts
 */

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque engine-side transaction nesting token.
///
/// The engine assigns a fresh token per nesting level of a protected call.
/// A connection outside any transaction carries [`SessionToken::NONE`].
/// Token values have no meaning to this crate beyond equality; they are
/// handed back to the engine on every call made under the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Sentinel for "no transaction open on this connection".
    pub const NONE: SessionToken = SessionToken(0);

    pub const fn new(raw: u64) -> Self {
        SessionToken(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    /// True when the token identifies an open transaction context.
    pub fn in_transaction(self) -> bool {
        self != Self::NONE
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.in_transaction() {
            write!(f, "token({})", self.0)
        } else {
            write!(f, "token(none)")
        }
    }
}
