//! eventcast: notification orchestration core.
//!
//! The library surface re-exports the subsystem crates; the binary in
//! `main.rs` wires them together from configuration.

pub mod cli;
pub mod config;

pub use eventcast_delivery as delivery;
pub use eventcast_orchestrator as orchestrator;
pub use eventcast_store as store;
