//! # rolegate engine
//!
//! Runtime half of rolegate: the assignment store, the decision cache and
//! the resolution walk, tied together by [`Authorizer`].
//!
//! ```no_run
//! use rolegate_core::prelude::*;
//! use rolegate_engine::prelude::*;
//!
//! # fn main() -> rolegate_core::Result<()> {
//! let catalog = StaticCatalog::builder()
//!     .target_type("auth.user", &["add_user", "change_user", "delete_user"])
//!     .build()?;
//!
//! let authz = Authorizer::builder()
//!     .with_catalog(catalog)
//!     .with_role(
//!         RoleDraft::new("Teacher")
//!             .label("Teacher")
//!             .target_types(["auth.user"])
//!             .deny(["delete_user"]),
//!     )
//!     .build()?;
//!
//! let john = SubjectId::new("john");
//! let bob = TargetRef::new("auth.user", "bob");
//! authz.assign_role(&john, "teacher", Some(&bob))?;
//! assert!(authz.has_permission(&john, "change_user", Some(&bob))?);
//! assert!(!authz.has_permission(&john, "delete_user", Some(&bob))?);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod authorizer;
pub mod cache;
pub mod resolver;
pub mod store;

pub use authorizer::{Authorizer, AuthorizerBuilder, TargetPermissions};
pub use resolver::{CheckOptions, Decision, DecisionSource};

/// Common imports for rolegate engine
pub mod prelude {
    pub use crate::authorizer::{Authorizer, AuthorizerBuilder, TargetPermissions};
    pub use crate::cache::{CacheStats, DecisionCache};
    pub use crate::resolver::{CheckOptions, Decision, DecisionSource};
    pub use crate::store::{
        AssignmentFilter, AssignmentId, AssignmentStore, MemoryAssignmentStore, PermissionGrants,
        RoleAssignment, TargetFilter,
    };
}
