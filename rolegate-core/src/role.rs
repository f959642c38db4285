//! Role definitions
//!
//! A role is described by a [`RoleDraft`] (the shape a host writes in code or
//! in a configuration file) and becomes a [`Role`] once the registry has
//! validated it. The validated form is a closed sum type over the two kinds
//! of role:
//!
//! - [`RoleScope::AllModels`]: not bound to any target type. Always assigned
//!   globally, always inherit-capable, never unique, and carries no default
//!   grants of its own, only inherited ones.
//! - [`RoleScope::Scoped`]: bound to an explicit, non-empty list of target
//!   types, with an `allow` or `deny` list materialized at assignment time and
//!   an optional inherit list.
//!
//! # Example
//!
//! ```rust
//! use rolegate_core::role::RoleDraft;
//!
//! let teacher = RoleDraft::new("Teacher")
//!     .label("Teacher")
//!     .target_types(["auth.user"])
//!     .deny(["delete_user"]);
//!
//! let coordinator = RoleDraft::new("Coordinator")
//!     .label("Coordinator")
//!     .all_models()
//!     .inherit_deny(["change_user"]);
//! # let _ = (teacher, coordinator);
//! ```

use crate::catalog::PermissionCatalog;
use crate::error::{Error, Result};
use crate::ids::TargetType;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::warn;

/// Target types a role applies to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetTypes {
    /// Not bound to a target type; assigned globally only
    AllModels,
    /// Bound to the listed target types
    Only(Vec<TargetType>),
}

/// How a permission list is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantMode {
    /// Only listed permissions are granted
    Allow,
    /// Everything except the listed permissions is granted
    Deny,
}

/// A validated allow or deny list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantList {
    /// Interpretation of `permissions`
    pub mode: GrantMode,
    /// Permission strings, all known to the catalog
    pub permissions: Vec<String>,
}

impl GrantList {
    /// The grant this list implies for `permission`
    pub fn decides(&self, permission: &str) -> bool {
        let listed = self.permissions.iter().any(|p| p == permission);
        match self.mode {
            GrantMode::Allow => listed,
            GrantMode::Deny => !listed,
        }
    }

    fn empty_deny() -> Self {
        Self {
            mode: GrantMode::Deny,
            permissions: Vec::new(),
        }
    }
}

/// Unvalidated role description.
///
/// Every field except `name` is optional here so that validation, not the
/// type system, reports what is missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    /// Role name; its lowercase form becomes the class name
    pub name: String,
    /// Human-readable label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Target types the role applies to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_types: Option<TargetTypes>,
    /// Allow list (mutually exclusive with `deny`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow: Option<Vec<String>>,
    /// Deny list (mutually exclusive with `allow`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deny: Option<Vec<String>>,
    /// Whether decisions propagate to descendant targets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit: Option<bool>,
    /// Inherited allow list (mutually exclusive with `inherit_deny`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_allow: Option<Vec<String>>,
    /// Inherited deny list (mutually exclusive with `inherit_allow`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_deny: Option<Vec<String>>,
    /// At most one subject may hold the role per target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<bool>,
}

impl RoleDraft {
    /// Start describing a role
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the human-readable label
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Bind the role to explicit target types
    pub fn target_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<TargetType>,
    {
        self.target_types = Some(TargetTypes::Only(types.into_iter().map(Into::into).collect()));
        self
    }

    /// Make the role global (`AllModels`)
    pub fn all_models(mut self) -> Self {
        self.target_types = Some(TargetTypes::AllModels);
        self
    }

    /// Grant only the listed permissions
    pub fn allow<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Grant everything except the listed permissions
    pub fn deny<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.deny = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Turn inheritance on or off
    pub fn inherit(mut self, inherit: bool) -> Self {
        self.inherit = Some(inherit);
        self
    }

    /// Inherited decisions grant only the listed permissions (implies `inherit`)
    pub fn inherit_allow<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherit.get_or_insert(true);
        self.inherit_allow = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Inherited decisions grant all but the listed permissions (implies `inherit`)
    pub fn inherit_deny<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inherit.get_or_insert(true);
        self.inherit_deny = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Mark the role unique per target
    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = Some(unique);
        self
    }

    /// Class name the role is registered under
    pub fn class_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Validate against the catalog and freeze into a [`Role`] with `rank`.
    pub fn validate(&self, catalog: &dyn PermissionCatalog, rank: usize) -> Result<Role> {
        let class_name = self.class_name();
        if class_name.trim().is_empty() {
            return Err(Error::invalid_definition(&self.name, "role name is empty"));
        }

        let label = match &self.label {
            Some(label) if !label.trim().is_empty() => label.clone(),
            _ => {
                return Err(Error::invalid_definition(
                    &class_name,
                    "provide a label for the role",
                ));
            }
        };

        let scope = match &self.target_types {
            Some(TargetTypes::AllModels) => {
                if self.allow.is_some() || self.deny.is_some() || self.unique == Some(true) {
                    warn!(
                        role = %class_name,
                        "AllModels role ignores allow/deny and unique settings"
                    );
                }
                let inherit = validate_exclusive(
                    &class_name,
                    catalog,
                    ("inherit_allow", self.inherit_allow.as_ref()),
                    ("inherit_deny", self.inherit_deny.as_ref()),
                )?;
                RoleScope::AllModels { inherit }
            }
            Some(TargetTypes::Only(types)) => {
                let target_types = validate_target_types(&class_name, catalog, types)?;
                let grants = validate_exclusive(
                    &class_name,
                    catalog,
                    ("allow", self.allow.as_ref()),
                    ("deny", self.deny.as_ref()),
                )?;
                let inherit = if self.inherit.unwrap_or(false) {
                    Some(validate_exclusive(
                        &class_name,
                        catalog,
                        ("inherit_allow", self.inherit_allow.as_ref()),
                        ("inherit_deny", self.inherit_deny.as_ref()),
                    )?)
                } else {
                    None
                };
                RoleScope::Scoped {
                    target_types,
                    grants,
                    inherit,
                    unique: self.unique.unwrap_or(false),
                }
            }
            None => {
                return Err(Error::invalid_definition(
                    &class_name,
                    "provide target types (a list or AllModels)",
                ));
            }
        };

        Ok(Role {
            class_name,
            label,
            rank,
            scope,
            draft: self.clone(),
        })
    }
}

fn validate_target_types(
    role: &str,
    catalog: &dyn PermissionCatalog,
    types: &[TargetType],
) -> Result<Vec<TargetType>> {
    if types.is_empty() {
        return Err(Error::invalid_definition(role, "target type list is empty"));
    }

    let mut valid: Vec<TargetType> = Vec::with_capacity(types.len());
    for target_type in types {
        if !catalog.has_target_type(target_type) {
            return Err(Error::invalid_definition(
                role,
                format!("'{}' is not a known target type", target_type),
            ));
        }
        if !valid.contains(target_type) {
            valid.push(target_type.clone());
        }
    }
    Ok(valid)
}

fn validate_exclusive(
    role: &str,
    catalog: &dyn PermissionCatalog,
    (allow_field, allow): (&str, Option<&Vec<String>>),
    (deny_field, deny): (&str, Option<&Vec<String>>),
) -> Result<GrantList> {
    let (mode, permissions) = match (allow, deny) {
        (Some(list), None) => (GrantMode::Allow, list),
        (None, Some(list)) => (GrantMode::Deny, list),
        _ => {
            return Err(Error::invalid_definition(
                role,
                format!("provide either '{}' or '{}'", allow_field, deny_field),
            ));
        }
    };

    for permission in permissions {
        if catalog.resolve_permission(permission).is_err() {
            return Err(Error::invalid_definition(
                role,
                format!("'{}' does not exist in the permission catalog", permission),
            ));
        }
    }

    Ok(GrantList {
        mode,
        permissions: permissions.clone(),
    })
}

/// Validated shape of a role
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleScope {
    /// Global role; only inherited decisions
    AllModels {
        /// Inherited allow or deny list
        inherit: GrantList,
    },
    /// Role bound to explicit target types
    Scoped {
        /// Target types, deduplicated, in declaration order
        target_types: Vec<TargetType>,
        /// Default grants materialized at assignment time
        grants: GrantList,
        /// Inherited decisions, when inheritance is on
        inherit: Option<GrantList>,
        /// At most one subject per target
        unique: bool,
    },
}

/// A registered, immutable role definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    class_name: String,
    label: String,
    rank: usize,
    scope: RoleScope,
    draft: RoleDraft,
}

impl Role {
    /// Unique registry key (lowercased name)
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Human-readable label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registration index; lower ranks win ties on the same target
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Validated shape
    pub fn scope(&self) -> &RoleScope {
        &self.scope
    }

    /// The draft this role was registered from
    pub fn draft(&self) -> &RoleDraft {
        &self.draft
    }

    /// Whether this is an `AllModels` role
    pub fn is_all_models(&self) -> bool {
        matches!(self.scope, RoleScope::AllModels { .. })
    }

    /// Explicit target types, `None` for `AllModels`
    pub fn target_types(&self) -> Option<&[TargetType]> {
        match &self.scope {
            RoleScope::AllModels { .. } => None,
            RoleScope::Scoped { target_types, .. } => Some(target_types),
        }
    }

    /// Whether the role may be used with objects of `target_type`
    pub fn accepts(&self, target_type: &TargetType) -> bool {
        match &self.scope {
            RoleScope::AllModels { .. } => true,
            RoleScope::Scoped { target_types, .. } => target_types.contains(target_type),
        }
    }

    /// Mode used to materialize default grants
    pub fn mode(&self) -> GrantMode {
        match &self.scope {
            RoleScope::AllModels { .. } => GrantMode::Deny,
            RoleScope::Scoped { grants, .. } => grants.mode,
        }
    }

    /// Default grant for `permission` at assignment time
    pub fn default_grant(&self, permission: &str) -> bool {
        match &self.scope {
            RoleScope::AllModels { .. } => GrantList::empty_deny().decides(permission),
            RoleScope::Scoped { grants, .. } => grants.decides(permission),
        }
    }

    /// Whether decisions of this role propagate to descendant targets
    pub fn inherits(&self) -> bool {
        self.inherit_grants().is_some()
    }

    /// The inherit list, when inheritance is on
    pub fn inherit_grants(&self) -> Option<&GrantList> {
        match &self.scope {
            RoleScope::AllModels { inherit } => Some(inherit),
            RoleScope::Scoped { inherit, .. } => inherit.as_ref(),
        }
    }

    /// Inherited decision for `permission`; `None` when the role does not inherit
    pub fn inherit_decision(&self, permission: &str) -> Option<bool> {
        self.inherit_grants().map(|list| list.decides(permission))
    }

    /// Whether at most one subject may hold this role per target
    pub fn is_unique(&self) -> bool {
        matches!(self.scope, RoleScope::Scoped { unique: true, .. })
    }
}

/// Anything a role can be looked up by: a class name or a definition.
pub trait RoleName {
    /// Class name to search for
    fn class_name(&self) -> Cow<'_, str>;

    /// Definition that must match the registered one, when looking up by definition
    fn definition(&self) -> Option<&RoleDraft> {
        None
    }
}

impl RoleName for str {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_lowercase())
    }
}

impl RoleName for String {
    fn class_name(&self) -> Cow<'_, str> {
        self.as_str().class_name()
    }
}

impl RoleName for RoleDraft {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Owned(RoleDraft::class_name(self))
    }

    fn definition(&self) -> Option<&RoleDraft> {
        Some(self)
    }
}

impl RoleName for Role {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.class_name)
    }

    fn definition(&self) -> Option<&RoleDraft> {
        Some(&self.draft)
    }
}

impl RoleName for Arc<Role> {
    fn class_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(&self.class_name)
    }

    fn definition(&self) -> Option<&RoleDraft> {
        Some(&self.draft)
    }
}
