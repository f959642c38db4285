//! Role registry
//!
//! Holds every validated [`Role`] in registration order. The registry is
//! written during startup and then only read; `cleanup` exists for
//! reconfiguration and test reset and must not race with live queries.

use crate::catalog::PermissionCatalog;
use crate::error::{Error, Result};
use crate::role::{Role, RoleDraft, RoleName};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Registry of validated role definitions
pub struct RoleRegistry {
    catalog: Arc<dyn PermissionCatalog>,
    roles: RwLock<Vec<Arc<Role>>>,
}

impl RoleRegistry {
    /// Create an empty registry validating against `catalog`
    pub fn new(catalog: Arc<dyn PermissionCatalog>) -> Self {
        Self {
            catalog,
            roles: RwLock::new(Vec::new()),
        }
    }

    /// The catalog definitions are validated against
    pub fn catalog(&self) -> &Arc<dyn PermissionCatalog> {
        &self.catalog
    }

    /// Validate and register a role definition.
    ///
    /// The role's rank is its registration index.
    pub fn register(&self, draft: &RoleDraft) -> Result<Arc<Role>> {
        let mut roles = self.roles.write();
        let class_name = draft.class_name();

        if let Some(existing) = roles.iter().find(|r| r.class_name() == class_name) {
            if existing.draft() == draft {
                return Err(Error::AlreadyRegistered(format!(
                    "{} (identical definition)",
                    class_name
                )));
            }
            return Err(Error::AlreadyRegistered(class_name));
        }

        let role = Arc::new(draft.validate(self.catalog.as_ref(), roles.len())?);
        info!(
            role = %role.class_name(),
            rank = role.rank(),
            all_models = role.is_all_models(),
            "Role registered"
        );
        roles.push(role.clone());
        Ok(role)
    }

    /// Find a role by class name or by definition
    pub fn lookup<R: RoleName + ?Sized>(&self, role: &R) -> Result<Arc<Role>> {
        let class_name = role.class_name();
        let roles = self.roles.read();
        let found = roles
            .iter()
            .find(|r| r.class_name() == class_name.as_ref())
            .filter(|r| role.definition().is_none_or(|draft| r.draft() == draft));

        found
            .cloned()
            .ok_or_else(|| Error::NotFound(class_name.into_owned()))
    }

    /// All roles in registration order
    pub fn roles(&self) -> Vec<Arc<Role>> {
        self.roles.read().clone()
    }

    /// Number of registered roles
    pub fn len(&self) -> usize {
        self.roles.read().len()
    }

    /// Whether no role is registered
    pub fn is_empty(&self) -> bool {
        self.roles.read().is_empty()
    }

    /// Forget every definition
    pub fn cleanup(&self) {
        let mut roles = self.roles.write();
        debug!(count = roles.len(), "Clearing role registry");
        roles.clear();
    }
}

impl std::fmt::Debug for RoleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoleRegistry")
            .field("roles", &*self.roles.read())
            .finish_non_exhaustive()
    }
}
