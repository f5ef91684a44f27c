//! Discovery refresh pipeline.
//!
//! # Data Flow
//! ```text
//! triggers.rs (timer, config watcher, SIGHUP)
//!     → RefreshCommand queue
//!     → engine.rs
//!         reconfigure: load config → build provider client
//!         recompute:   zones × rules → records → target groups
//!     → store.rs (atomic snapshot swap)
//!     → HTTP surface reads documents by path
//! ```
//!
//! # Design Decisions
//! - Refresh work is serialized through one queue consumer
//! - Readers never wait for provider I/O; they only read the last snapshot
//! - Last completed refresh wins

pub mod document;
pub mod engine;
pub mod store;
pub mod triggers;

pub use document::{DocumentSet, SdConfig};
pub use engine::{build_documents, RefreshError, Refresher};
pub use store::{DocumentStore, Snapshot};
pub use triggers::{RefreshCommand, RefreshLoop};
