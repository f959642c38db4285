//! # rolegate - object-scoped role-based authorization
//!
//! Roles are granted to subjects globally or on individual objects, and
//! permission checks walk from the queried object up its parent chain until
//! a role decides.
//!
//! This crate re-exports the constituent crates:
//! - `rolegate-core`: identities, role definitions, catalog and graph providers
//! - `rolegate-engine`: assignment store, decision cache and the authorizer

pub use rolegate_core as core;
pub use rolegate_engine as engine;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::core::prelude::*;
    pub use crate::engine::prelude::*;
}
