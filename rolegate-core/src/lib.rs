//! # rolegate core
//!
//! Identities, role definitions and provider traits shared by the rolegate
//! authorization engine.
//!
//! This crate holds the leaves of the system:
//! - [`registry::RoleRegistry`]: validates and stores role definitions
//! - [`catalog::PermissionCatalog`]: which permissions exist per target type
//! - [`graph::ObjectGraph`]: how target objects relate to their parents
//! - [`config`]: engine settings and the bootstrap document
//!
//! ## API Stability
//!
//! **Current Status: EXPERIMENTAL (v0.x.x)**. Minor version bumps may include
//! breaking changes until 1.0.0.

#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod graph;
pub mod ids;
pub mod registry;
pub mod role;

pub use error::{Error, Result};

/// Common imports for rolegate core
pub mod prelude {
    pub use crate::catalog::{Permission, PermissionCatalog, PermissionId, StaticCatalog};
    pub use crate::config::{
        AssignmentConfig, AuthorizationConfig, CacheConfig, EngineConfig, TargetTypeConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::graph::{FlatGraph, ObjectGraph, StaticObjectGraph};
    pub use crate::ids::{SubjectId, TargetRef, TargetType};
    pub use crate::registry::RoleRegistry;
    pub use crate::role::{GrantList, GrantMode, Role, RoleDraft, RoleName, RoleScope, TargetTypes};
}
