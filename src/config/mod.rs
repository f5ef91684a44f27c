//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (YAML/JSON/TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → published with its provider client in the document store
//!
//! On change:
//!     watcher.rs detects a write
//!     → refresh queue receives a reload command
//!     → loader.rs loads new config
//!     → whole snapshot replaced, old one keeps serving on failure
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use schema::{Config, ProviderConfig, RuleConfig};
