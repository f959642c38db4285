//! Configuration types for rolegate

use crate::catalog::StaticCatalog;
use crate::error::{Error, Result};
use crate::graph::StaticObjectGraph;
use crate::ids::{SubjectId, TargetRef};
use crate::role::RoleDraft;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Resolution engine settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default for `has_permission`'s persistent mode
    pub persistent: bool,
    /// Emit one audit event per permission decision
    pub audit_enabled: bool,
    /// Decision cache settings
    pub cache: CacheConfig,
}

/// Decision cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Memoize per (subject, target) role grants
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// A target type with its permissions and object-graph options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetTypeConfig {
    /// Type tag
    pub name: String,
    /// Permission strings owned by the type
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Names of the fields pointing at parent objects
    #[serde(default)]
    pub parent_fields: Vec<String>,
    /// Whether a subject may hold only one role on an object of this type
    #[serde(default)]
    pub one_role_per_subject: bool,
}

/// Role assignment replayed at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentConfig {
    /// Subject receiving the role
    pub subject: SubjectId,
    /// Role name
    pub role: String,
    /// Target object, absent for global roles
    #[serde(default)]
    pub target: Option<TargetRef>,
}

/// Complete bootstrap document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Engine settings
    pub engine: EngineConfig,
    /// Target types known to the host
    pub target_types: Vec<TargetTypeConfig>,
    /// Role definitions, registered in this order
    pub roles: Vec<RoleDraft>,
    /// Assignments replayed after registration
    pub assignments: Vec<AssignmentConfig>,
}

impl AuthorizationConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: AuthorizationConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), content).map_err(|e| {
            Error::Configuration(format!("Failed to write config file: {}", e))
        })?;
        Ok(())
    }

    /// Validate cross references inside the document
    pub fn validate(&self) -> Result<()> {
        let mut type_names = HashSet::new();
        for target_type in &self.target_types {
            if !type_names.insert(target_type.name.as_str()) {
                return Err(Error::Configuration(format!(
                    "Duplicate target type: {}",
                    target_type.name
                )));
            }
        }

        let mut role_names = HashSet::new();
        for role in &self.roles {
            if !role_names.insert(role.class_name()) {
                return Err(Error::Configuration(format!(
                    "Duplicate role name: {}",
                    role.name
                )));
            }
        }

        for assignment in &self.assignments {
            if !role_names.contains(&assignment.role.to_lowercase()) {
                return Err(Error::Configuration(format!(
                    "Assignment for '{}' references non-existent role '{}'",
                    assignment.subject, assignment.role
                )));
            }
            if let Some(target) = &assignment.target
                && !type_names.contains(target.target_type.as_str())
            {
                return Err(Error::Configuration(format!(
                    "Assignment for '{}' references unknown target type '{}'",
                    assignment.subject, target.target_type
                )));
            }
        }

        Ok(())
    }

    /// Build the permission catalog described by `target_types`
    pub fn build_catalog(&self) -> Result<StaticCatalog> {
        let mut catalog = StaticCatalog::new();
        for target_type in &self.target_types {
            catalog.add_target_type(
                target_type.name.as_str(),
                target_type.permissions.iter().cloned(),
            )?;
        }
        Ok(catalog)
    }

    /// Build an object graph carrying the per-type declarations.
    ///
    /// Instance links are the host's business and are added afterwards.
    pub fn build_graph(&self) -> StaticObjectGraph {
        let graph = StaticObjectGraph::new();
        for target_type in &self.target_types {
            graph
                .declare_parents(target_type.name.as_str(), target_type.parent_fields.iter().cloned())
                .set_one_role_per_subject(target_type.name.as_str(), target_type.one_role_per_subject);
        }
        graph
    }

    /// Create a small configuration for development
    pub fn development() -> Self {
        Self {
            engine: EngineConfig {
                persistent: false,
                audit_enabled: true,
                cache: CacheConfig { enabled: true },
            },
            target_types: vec![
                TargetTypeConfig {
                    name: "library.library".to_string(),
                    permissions: vec!["manage_library".to_string()],
                    parent_fields: Vec::new(),
                    one_role_per_subject: true,
                },
                TargetTypeConfig {
                    name: "library.book".to_string(),
                    permissions: vec!["view_book".to_string(), "review".to_string()],
                    parent_fields: vec!["library".to_string()],
                    one_role_per_subject: false,
                },
            ],
            roles: vec![
                RoleDraft::new("LibraryOwner")
                    .label("Library owner")
                    .target_types(["library.library"])
                    .deny(Vec::<String>::new())
                    .unique(true)
                    .inherit_deny(["review"]),
                RoleDraft::new("Reviewer")
                    .label("Reviewer")
                    .target_types(["library.book"])
                    .allow(["review"])
                    .inherit_allow(["review"]),
            ],
            assignments: vec![AssignmentConfig {
                subject: SubjectId::new("developer"),
                role: "libraryowner".to_string(),
                target: Some(TargetRef::new("library.library", "central")),
            }],
        }
    }
}
