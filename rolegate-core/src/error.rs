//! Error types for rolegate.
//!
//! Every failure in the authorization core is a deterministic function of its
//! input: a malformed role definition, a misused registry, an assignment that
//! breaks a store invariant, an unknown permission string or a misconfigured
//! object graph. None of them are retried internally.
//!
//! A denied permission is **not** an error. `has_permission` returns
//! `Ok(false)` for that case.
//!
//! # Examples
//!
//! ```rust
//! use rolegate_core::error::{Error, Result};
//!
//! fn lookup(name: &str) -> Result<()> {
//!     Err(Error::NotFound(name.to_string()))
//! }
//!
//! assert!(lookup("teacher").is_err());
//! ```

use thiserror::Error;

/// Result type alias for rolegate operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for rolegate operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A role definition failed validation at registration time.
    #[error("Invalid role definition '{role}': {reason}")]
    InvalidDefinition {
        /// Name of the offending role.
        role: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A role with the same class name is already registered.
    #[error("Role '{0}' is already registered")]
    AlreadyRegistered(String),

    /// The requested role is not registered.
    #[error("Role '{0}' is not a registered role")]
    NotFound(String),

    /// The target given to an operation does not fit the role's target types.
    #[error("Role '{role}' cannot be used with {target}")]
    RoleTargetMismatch {
        /// Class name of the role.
        role: String,
        /// Description of the offending target (or its absence).
        target: String,
    },

    /// An assignment would break a uniqueness rule.
    #[error("Uniqueness violation: {0}")]
    UniquenessViolation(String),

    /// `assign_permission` matched no assignment.
    #[error("No matching assignment: {0}")]
    NoMatchingAssignment(String),

    /// The permission string is not known to the catalog.
    #[error("Unknown permission '{0}'")]
    UnknownPermission(String),

    /// The host declared a parent field that does not resolve on an instance.
    #[error("Parent field '{field}' was not found on {target}")]
    ParentFieldMissing {
        /// Declared parent field name.
        field: String,
        /// Target the field was looked up on.
        target: String,
    },

    /// The caller combined arguments that are mutually exclusive.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// More than one subject holds a unique role on the queried target.
    #[error("Multiple unique role holders found: {0}")]
    MultipleUniqueHolders(String),

    /// Configuration error (invalid settings, unreadable file, etc.).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// JSON serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input/output error from the underlying system.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a persistent store implementation.
    #[error("Store error: {0}")]
    Store(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidDefinition`].
    pub fn invalid_definition(role: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidDefinition {
            role: role.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`Error::RoleTargetMismatch`].
    pub fn role_target_mismatch(role: impl Into<String>, target: impl Into<String>) -> Self {
        Error::RoleTargetMismatch {
            role: role.into(),
            target: target.into(),
        }
    }

    /// Assignment-time contract violations, surfaced to the caller as-is.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            Error::RoleTargetMismatch { .. }
                | Error::UniquenessViolation(_)
                | Error::NoMatchingAssignment(_)
        )
    }

    /// Host or startup misconfiguration. Never recovered automatically.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidDefinition { .. }
                | Error::ParentFieldMissing { .. }
                | Error::Configuration(_)
        )
    }
}
