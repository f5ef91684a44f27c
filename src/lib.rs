//! DNS-backed Prometheus HTTP service discovery.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod provider;

pub use config::Config;
pub use discovery::DocumentStore;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
