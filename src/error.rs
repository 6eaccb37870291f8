//=====================================================
// File: error.rs
//=====================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Error taxonomy for the module loader
// Objective: Separate fatal configuration and namespace failures from the
//            recoverable cycle and fetch failures reported per record
//=====================================================

use thiserror::Error;

use crate::symbol::ResourceId;

/// Fatal configuration problems, raised synchronously during setup or resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid version configuration parameter: {0}")]
    InvalidVersion(String),
    #[error("invalid version qualifier: {0}")]
    InvalidQualifier(String),
    #[error("context URL '{path}' must end with \"{separator}\"")]
    ContextSeparator { path: String, separator: char },
    #[error("path variable '{0}' is reserved")]
    ReservedVariable(String),
    #[error("path variable substitution for '{0}' does not terminate")]
    PathVariableCycle(String),
    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),
    #[error("manifest error: {0}")]
    Manifest(String),
}

/// Writes rejected by a [`crate::namespace::Namespace`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamespaceError {
    #[error("Namespace conflict: {0}")]
    Conflict(String),
    #[error("Namespace {0} is sealed")]
    Sealed(String),
}

/// A dependency cycle found on the live traversal stack.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Cyclical dependency: {}", render_cycle(.cycle))]
pub struct CycleError {
    pub cycle: Vec<ResourceId>,
}

fn render_cycle(cycle: &[ResourceId]) -> String {
    cycle
        .iter()
        .map(ResourceId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Failures reported by a fetch collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("resource '{0}' could not be located")]
    NotFound(ResourceId),
    #[error("fetch of '{0}' timed out")]
    TimedOut(ResourceId),
    #[error("fetch of '{id}' failed: {reason}")]
    Failed { id: ResourceId, reason: String },
}

/// Umbrella error for loader operations.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Namespace(#[from] NamespaceError),
    #[error(transparent)]
    Cycle(#[from] CycleError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_error_lists_members_in_order() {
        let err = CycleError {
            cycle: vec![
                ResourceId::from("/app/a.js"),
                ResourceId::from("/app/b.js"),
                ResourceId::from("/app/a.js"),
            ],
        };
        assert_eq!(
            err.to_string(),
            "Cyclical dependency: /app/a.js -> /app/b.js -> /app/a.js"
        );
    }

    #[test]
    fn namespace_conflict_message_names_path() {
        let err = LoaderError::from(NamespaceError::Conflict("core.util".into()));
        assert_eq!(err.to_string(), "Namespace conflict: core.util");
    }
}
