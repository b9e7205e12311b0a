/*!
 * Transactions Module
 * Connections, sentinel control transfer, and the boundary adapter
 */

mod adapter;
mod connection;
mod flow;

pub(crate) use adapter::run_protected;

// Re-export public API
pub use connection::Connection;
pub use flow::{restart, rollback};
