/*!
 * Core Types
 * Crate-wide primitive types and the top-level error taxonomy
 */

pub mod errors;
pub mod types;

pub use errors::{CoordError, CoordResult};
pub use types::SessionToken;
