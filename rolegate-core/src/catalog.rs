//! Permission catalog: which permissions exist, and which target type owns each

use crate::error::{Error, Result};
use crate::ids::TargetType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Internal id of a permission, stable for the lifetime of a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(pub u32);

impl fmt::Display for PermissionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A permission known to the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Internal id
    pub id: PermissionId,
    /// Permission string callers use, e.g. `"delete_user"`
    pub name: String,
    /// Target type the permission belongs to
    pub target_type: TargetType,
}

/// Provider of the permission catalog, supplied by the host application.
pub trait PermissionCatalog: Send + Sync {
    /// All target types the host knows about.
    fn target_types(&self) -> Vec<TargetType>;

    /// Whether `target_type` is a valid target type identifier.
    fn has_target_type(&self, target_type: &TargetType) -> bool {
        self.target_types().contains(target_type)
    }

    /// Every permission belonging to `target_type`. Unknown types have none.
    fn permissions_for(&self, target_type: &TargetType) -> Vec<Permission>;

    /// Resolve a permission string, failing with [`Error::UnknownPermission`].
    fn resolve_permission(&self, name: &str) -> Result<Permission>;

    /// Reverse lookup of an internal id.
    fn permission_by_id(&self, id: PermissionId) -> Option<Permission>;
}

/// In-memory catalog built once at configuration time.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    target_types: Vec<TargetType>,
    by_type: HashMap<TargetType, Vec<PermissionId>>,
    permissions: Vec<Permission>,
    by_name: HashMap<String, PermissionId>,
}

impl StaticCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a catalog builder
    pub fn builder() -> StaticCatalogBuilder {
        StaticCatalogBuilder::default()
    }

    /// Add a target type and the permissions it owns.
    ///
    /// Permission strings are global: the same string cannot belong to two types.
    pub fn add_target_type<I, S>(
        &mut self,
        target_type: impl Into<TargetType>,
        permissions: I,
    ) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let target_type = target_type.into();
        if self.by_type.contains_key(&target_type) {
            return Err(Error::Configuration(format!(
                "Duplicate target type: {}",
                target_type
            )));
        }

        let mut ids = Vec::new();
        for name in permissions {
            let name = name.into();
            if name.is_empty() {
                return Err(Error::Configuration(format!(
                    "Empty permission name for target type {}",
                    target_type
                )));
            }
            if self.by_name.contains_key(&name) {
                return Err(Error::Configuration(format!(
                    "Duplicate permission: {}",
                    name
                )));
            }

            let id = PermissionId(self.permissions.len() as u32);
            self.by_name.insert(name.clone(), id);
            self.permissions.push(Permission {
                id,
                name,
                target_type: target_type.clone(),
            });
            ids.push(id);
        }

        self.target_types.push(target_type.clone());
        self.by_type.insert(target_type, ids);
        Ok(())
    }

    /// Number of permissions across all target types
    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    /// Whether the catalog holds no permissions
    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

impl PermissionCatalog for StaticCatalog {
    fn target_types(&self) -> Vec<TargetType> {
        self.target_types.clone()
    }

    fn has_target_type(&self, target_type: &TargetType) -> bool {
        self.by_type.contains_key(target_type)
    }

    fn permissions_for(&self, target_type: &TargetType) -> Vec<Permission> {
        self.by_type
            .get(target_type)
            .map(|ids| {
                ids.iter()
                    .map(|id| self.permissions[id.0 as usize].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn resolve_permission(&self, name: &str) -> Result<Permission> {
        self.by_name
            .get(name)
            .map(|id| self.permissions[id.0 as usize].clone())
            .ok_or_else(|| Error::UnknownPermission(name.to_string()))
    }

    fn permission_by_id(&self, id: PermissionId) -> Option<Permission> {
        self.permissions.get(id.0 as usize).cloned()
    }
}

/// Builder for [`StaticCatalog`]
#[derive(Debug, Default)]
pub struct StaticCatalogBuilder {
    target_types: Vec<(TargetType, Vec<String>)>,
}

impl StaticCatalogBuilder {
    /// Declare a target type with its permissions
    pub fn target_type(mut self, target_type: &str, permissions: &[&str]) -> Self {
        self.target_types.push((
            TargetType::new(target_type),
            permissions.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// Build the catalog, rejecting duplicate types or permission strings
    pub fn build(self) -> Result<StaticCatalog> {
        let mut catalog = StaticCatalog::new();
        for (target_type, permissions) in self.target_types {
            catalog.add_target_type(target_type, permissions)?;
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> StaticCatalog {
        StaticCatalog::builder()
            .target_type("auth.user", &["add_user", "change_user", "delete_user"])
            .target_type("library.book", &["view_book", "review"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_permission() {
        let catalog = catalog();
        let perm = catalog.resolve_permission("review").unwrap();
        assert_eq!(perm.name, "review");
        assert_eq!(perm.target_type, TargetType::new("library.book"));
        assert_eq!(catalog.permission_by_id(perm.id), Some(perm));

        match catalog.resolve_permission("launch_rockets") {
            Err(Error::UnknownPermission(name)) => assert_eq!(name, "launch_rockets"),
            other => panic!("Expected UnknownPermission, got: {:?}", other),
        }
    }

    #[test]
    fn test_permissions_for_type() {
        let catalog = catalog();
        let names: Vec<String> = catalog
            .permissions_for(&TargetType::new("auth.user"))
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["add_user", "change_user", "delete_user"]);
        assert!(catalog.permissions_for(&TargetType::new("nope")).is_empty());
        assert!(catalog.has_target_type(&TargetType::new("library.book")));
        assert_eq!(catalog.len(), 5);
    }

    #[test]
    fn test_duplicates_rejected() {
        let result = StaticCatalog::builder()
            .target_type("a", &["x"])
            .target_type("b", &["x"])
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));

        let result = StaticCatalog::builder()
            .target_type("a", &["x"])
            .target_type("a", &["y"])
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
