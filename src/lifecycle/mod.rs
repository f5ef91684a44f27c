//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → ticker, refresh loop, HTTP server stop
//! ```
//!
//! # Design Decisions
//! - In-flight provider calls are bounded by their own timeout, not cancelled

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
