//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that rule paths can be served next to the health endpoint
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Regex syntax is not checked here; a broken filter only degrades the
//!   refresh cycle that uses it

use thiserror::Error;

use crate::config::schema::Config;

/// Path reserved for liveness probes.
pub const HEALTH_PATH: &str = "/healthz";

/// A single semantic problem found in a loaded config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("rule #{index}: path {path:?} must start with '/'")]
    RelativePath { index: usize, path: String },

    #[error("rule #{index}: path /healthz is reserved")]
    ReservedPath { index: usize },

    #[error("provider.type must not be empty")]
    MissingProviderType,
}

/// Check a parsed config for semantic errors.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.provider.kind.trim().is_empty() {
        errors.push(ValidationError::MissingProviderType);
    }

    for (index, rule) in config.rules.iter().enumerate() {
        if !rule.path.starts_with('/') {
            errors.push(ValidationError::RelativePath {
                index,
                path: rule.path.clone(),
            });
        } else if rule.path == HEALTH_PATH {
            errors.push(ValidationError::ReservedPath { index });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
