//! Error types for the Veil engine
//!
//! Each concern gets its own enum. Glue code (CLI, service transports) wraps
//! these in `anyhow` with context; the library itself never panics on bad
//! input.

use std::path::PathBuf;
use thiserror::Error;

/// Failures while loading or interpreting a profile document
#[derive(Error, Debug)]
pub enum ProfileError {
    /// The profile file could not be read
    #[error("Failed to read profile from {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The profile text is not a valid JSON document
    #[error("Failed to parse profile document")]
    Parse {
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but its root is not a map
    #[error("Profile root must be an object, found {found}")]
    NotAnObject { found: &'static str },

    /// A typed view over a profile section is missing a required field
    #[error("Profile section '{section}' is missing required field '{field}'")]
    MissingField {
        section: &'static str,
        field: &'static str,
    },

    /// A typed view over a profile section has a malformed field
    #[error("Profile section '{section}' has invalid field '{field}': {reason}")]
    InvalidField {
        section: &'static str,
        field: &'static str,
        reason: String,
    },
}

/// Failures while building a hook registry
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Hook codename must not be empty")]
    EmptyCodename,

    #[error("Hook codename '{0}' must be lowercase snake_case")]
    InvalidCodename(String),

    #[error("Hook codename '{0}' is already registered")]
    DuplicateCodename(String),
}

/// Failures inside the embedded JavaScript runtime
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    /// The wrapped hook body failed to parse or did not evaluate to a function
    #[error("compile error: {0}")]
    Compile(String),

    /// The hook threw while running, or a drained job rejected
    #[error("uncaught exception: {0}")]
    Execution(String),

    /// A value could not be converted between Rust and JavaScript
    #[error("value conversion failed: {0}")]
    Marshal(String),
}

/// Failures surfaced by the profile manager
#[derive(Error, Debug)]
pub enum ManagerError {
    /// No profile path was configured; the feature stays off for the process
    #[error("No profile configured.\n\nSet one with:\n  veil --profile <path>\nor the VEIL_PROFILE environment variable")]
    ConfigurationAbsent,

    /// Initialization already ran (successfully or not)
    #[error("Profile manager was already initialized")]
    AlreadyInitialized,

    #[error(transparent)]
    Profile(#[from] ProfileError),
}

impl ProfileError {
    /// Log load failures at the level the manager treats them
    pub fn log_load_failure(&self) {
        match self {
            ProfileError::Io { path, .. } => {
                tracing::error!(path = %path.display(), error = %self, "Profile unreadable, evasions disabled");
            }
            ProfileError::Parse { source } => {
                tracing::error!(line = source.line(), column = source.column(), error = %self, "Profile invalid, evasions disabled");
            }
            _ => {
                tracing::error!(error = %self, "Profile rejected, evasions disabled");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_error_messages() {
        assert_eq!(
            RegistryError::DuplicateCodename("webgl".into()).to_string(),
            "Hook codename 'webgl' is already registered"
        );
        assert_eq!(
            RegistryError::EmptyCodename.to_string(),
            "Hook codename must not be empty"
        );
    }

    #[test]
    fn test_manager_error_wraps_profile_error() {
        let err: ManagerError = ProfileError::NotAnObject { found: "array" }.into();
        assert!(err.to_string().contains("found array"));
    }
}
