//! Authorizer: the decision query API over registry, store, cache and graph

use crate::cache::{CacheEntry, CacheKey, CacheStats, DecisionCache, RoleGrants};
use crate::resolver::{CheckOptions, Decision, DecisionSource, Resolver, check_arguments};
use crate::store::{
    AssignmentFilter, AssignmentStore, MemoryAssignmentStore, PermissionGrants, RoleAssignment,
    TargetFilter,
};
use parking_lot::RwLock;
use rolegate_core::catalog::PermissionCatalog;
use rolegate_core::config::{AssignmentConfig, AuthorizationConfig, EngineConfig};
use rolegate_core::error::{Error, Result};
use rolegate_core::graph::{FlatGraph, ObjectGraph};
use rolegate_core::ids::{SubjectId, TargetRef, TargetType, describe_target};
use rolegate_core::registry::RoleRegistry;
use rolegate_core::role::{Role, RoleDraft};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Effective grants of one assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPermissions {
    /// Target of the assignment; `None` for a global one
    pub target: Option<TargetRef>,
    /// `(permission, granted)` pairs, overrides applied
    pub permissions: Vec<(String, bool)>,
}

/// Role-based, object-scoped authorizer
pub struct Authorizer<S = MemoryAssignmentStore>
where
    S: AssignmentStore,
{
    registry: Arc<RoleRegistry>,
    catalog: Arc<dyn PermissionCatalog>,
    graph: Arc<dyn ObjectGraph>,
    store: RwLock<S>,
    cache: DecisionCache,
    config: EngineConfig,
}

impl Authorizer<MemoryAssignmentStore> {
    /// Create a new authorizer builder
    pub fn builder() -> AuthorizerBuilder {
        AuthorizerBuilder::new()
    }
}

impl<S: AssignmentStore> Authorizer<S> {
    /// Engine settings in effect
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The role registry.
    ///
    /// Cached entries carry role ranks; clearing the registry through this
    /// handle leaves them stale. Use [`Authorizer::reset_roles`] instead.
    pub fn registry(&self) -> &Arc<RoleRegistry> {
        &self.registry
    }

    /// The permission catalog
    pub fn catalog(&self) -> &Arc<dyn PermissionCatalog> {
        &self.catalog
    }

    /// Register one more role. Only valid at configuration time.
    pub fn register_role(&self, draft: &RoleDraft) -> Result<Arc<Role>> {
        let role = self.registry.register(draft)?;
        self.cache.clear();
        Ok(role)
    }

    /// Forget every role definition and every cached decision.
    ///
    /// Stored assignments are kept; their roles must be registered again
    /// before the next query touches them.
    pub fn reset_roles(&self) {
        self.registry.cleanup();
        self.cache.clear();
    }

    /// Drop every cached decision
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Decision cache counters
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Whether `subject` holds any role (or `role`), optionally on `target`
    pub fn has_role(
        &self,
        subject: &SubjectId,
        role: Option<&str>,
        target: Option<&TargetRef>,
    ) -> Result<bool> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target.map(|t| &t.target_type))?;

        let filter = self
            .filter(role.as_deref(), TargetFilter::object_or_any(target))
            .subject(subject);
        Ok(!self.store.read().find(&filter)?.is_empty())
    }

    /// Whether `subject` has `permission` on `target`, with configured defaults
    pub fn has_permission(
        &self,
        subject: &SubjectId,
        permission: &str,
        target: Option<&TargetRef>,
    ) -> Result<bool> {
        self.has_permission_with(subject, permission, target, CheckOptions::default())
    }

    /// Whether `subject` has `permission` on `target`
    pub fn has_permission_with(
        &self,
        subject: &SubjectId,
        permission: &str,
        target: Option<&TargetRef>,
        options: CheckOptions,
    ) -> Result<bool> {
        Ok(self.decide(subject, permission, target, options)?.granted)
    }

    /// Full resolution outcome for a permission check
    pub fn decide(
        &self,
        subject: &SubjectId,
        permission: &str,
        target: Option<&TargetRef>,
        options: CheckOptions,
    ) -> Result<Decision> {
        check_arguments(target, &options)?;
        let permission = self.catalog.resolve_permission(permission)?;
        let persistent = options.persistent.unwrap_or(self.config.persistent);

        let store = self.store.read();
        let resolver = Resolver {
            registry: &self.registry,
            graph: self.graph.as_ref(),
        };
        let decision = resolver.resolve(&permission, target, persistent, |level| {
            self.entry_for(&*store, subject, level, options.any_object)
        })?;
        drop(store);

        if self.config.audit_enabled {
            let level = describe_target(decision.level.as_ref());
            let role = decision.role.as_deref().unwrap_or("-");
            if decision.granted {
                info!(
                    subject = %subject,
                    permission = %permission.name,
                    target = %describe_target(target),
                    level = %level,
                    role = role,
                    persistent,
                    "Permission granted"
                );
            } else {
                let default_deny = decision.source == DecisionSource::Default;
                warn!(
                    subject = %subject,
                    permission = %permission.name,
                    target = %describe_target(target),
                    level = %level,
                    role = role,
                    persistent,
                    default_deny,
                    "Permission denied"
                );
            }
        }

        Ok(decision)
    }

    /// Roles `subject` holds, in ranking order; `target` restricts to one object
    pub fn get_roles(&self, subject: &SubjectId, target: Option<&TargetRef>) -> Result<Vec<Arc<Role>>> {
        let filter = AssignmentFilter::new()
            .subject(subject)
            .target(TargetFilter::object_or_any(target));
        let rows = self.store.read().find(&filter)?;

        let mut seen = HashSet::new();
        let mut roles = Vec::new();
        for row in rows {
            if seen.insert(row.role.clone()) {
                roles.push(self.registry.lookup(row.role.as_str())?);
            }
        }
        roles.sort_by_key(|role| role.rank());
        Ok(roles)
    }

    /// Highest-ranked role `subject` holds, optionally on `target`
    pub fn get_role(&self, subject: &SubjectId, target: Option<&TargetRef>) -> Result<Option<Arc<Role>>> {
        Ok(self.get_roles(subject, target)?.into_iter().next())
    }

    /// Distinct subjects holding `role` (or any role), optionally on `target`
    pub fn get_users(&self, role: Option<&str>, target: Option<&TargetRef>) -> Result<Vec<SubjectId>> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target.map(|t| &t.target_type))?;

        let filter = self.filter(role.as_deref(), TargetFilter::object_or_any(target));
        let rows = self.store.read().find(&filter)?;
        Ok(distinct(rows.into_iter().map(|row| row.subject)))
    }

    /// The single subject holding a unique role on the filter.
    ///
    /// Fails with `MultipleUniqueHolders` when more than one subject matches.
    pub fn get_user(&self, role: Option<&str>, target: Option<&TargetRef>) -> Result<Option<SubjectId>> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target.map(|t| &t.target_type))?;

        let filter = self.filter(role.as_deref(), TargetFilter::object_or_any(target));
        let rows = self.store.read().find(&filter)?;

        let mut holders = Vec::new();
        for row in rows {
            if self.registry.lookup(row.role.as_str())?.is_unique() {
                holders.push(row.subject);
            }
        }
        let mut holders = distinct(holders);

        match holders.len() {
            0 => Ok(None),
            1 => Ok(holders.pop()),
            _ => Err(Error::MultipleUniqueHolders(format!(
                "{} subjects hold a unique role on {}; use get_users instead",
                holders.len(),
                describe_target(target)
            ))),
        }
    }

    /// Distinct targets on which `subject` holds `role` (or any role)
    pub fn get_objects(
        &self,
        subject: &SubjectId,
        role: Option<&str>,
        target_type: Option<&TargetType>,
    ) -> Result<Vec<TargetRef>> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target_type)?;

        let target_filter = target_type.map_or(TargetFilter::Any, |t| TargetFilter::Type(t.clone()));
        let filter = self.filter(role.as_deref(), target_filter).subject(subject);
        let rows = self.store.read().find(&filter)?;
        Ok(distinct(rows.into_iter().filter_map(|row| row.target)))
    }

    /// Effective `(permission, granted)` pairs of `subject`'s `role`
    /// assignments, one group per assignment target.
    ///
    /// Without `target` every assignment of the role is reported, in
    /// assignment order.
    pub fn get_permissions(
        &self,
        subject: &SubjectId,
        role: &str,
        target: Option<&TargetRef>,
    ) -> Result<Vec<TargetPermissions>> {
        let role = self.registry.lookup(role)?;
        let filter = self
            .filter(Some(role.as_ref()), TargetFilter::object_or_any(target))
            .subject(subject);
        let rows = self.store.read().find(&filter)?;

        let mut groups = Vec::with_capacity(rows.len());
        for row in rows {
            let permissions = row
                .grants
                .effective()
                .into_iter()
                .filter_map(|(id, granted)| {
                    self.catalog
                        .permission_by_id(id)
                        .map(|permission| (permission.name, granted))
                })
                .collect();
            groups.push(TargetPermissions {
                target: row.target,
                permissions,
            });
        }
        Ok(groups)
    }

    // ---------------------------------------------------------------------
    // Mutations
    // ---------------------------------------------------------------------

    /// Give `role` to one subject, optionally on `target`
    pub fn assign_role(&self, subject: &SubjectId, role: &str, target: Option<&TargetRef>) -> Result<()> {
        self.assign_roles(std::slice::from_ref(subject), role, target)
    }

    /// Give `role` to every subject in `subjects`, optionally on `target`.
    ///
    /// All checks run before any row is written.
    pub fn assign_roles(&self, subjects: &[SubjectId], role: &str, target: Option<&TargetRef>) -> Result<()> {
        let role = self.registry.lookup(role)?;
        match (target, role.is_all_models()) {
            (None, false) => {
                return Err(Error::role_target_mismatch(
                    role.class_name(),
                    "no target (the role must be assigned on an object)",
                ));
            }
            (Some(target), true) => {
                return Err(Error::role_target_mismatch(
                    role.class_name(),
                    format!("{} (the role must be assigned globally)", target),
                ));
            }
            (Some(target), false) if !role.accepts(&target.target_type) => {
                return Err(Error::role_target_mismatch(role.class_name(), target.to_string()));
            }
            _ => {}
        }

        let grants = self.materialize(&role);
        let unique_subjects = distinct(subjects.iter().cloned());

        let mut store = self.store.write();

        if let Some(target) = target
            && self.graph.one_role_per_subject(&target.target_type)
        {
            for subject in &unique_subjects {
                let filter = AssignmentFilter::new()
                    .subject(subject)
                    .target(TargetFilter::Object(target.clone()));
                if !store.find(&filter)?.is_empty() {
                    return Err(Error::UniquenessViolation(format!(
                        "{} already has a role on {}",
                        subject, target
                    )));
                }
            }
        }

        if role.is_unique() {
            if subjects.len() > 1 {
                return Err(Error::UniquenessViolation(format!(
                    "multiple subjects given for unique role '{}'",
                    role.class_name()
                )));
            }
            let filter = self.filter(Some(role.as_ref()), TargetFilter::object_or_global(target));
            if !store.find(&filter)?.is_empty() {
                return Err(Error::UniquenessViolation(format!(
                    "{} already has a '{}' and the role is unique",
                    describe_target(target),
                    role.class_name()
                )));
            }
        }

        let filter = self
            .filter(Some(role.as_ref()), TargetFilter::object_or_global(target))
            .subjects(&unique_subjects);
        if let Some(existing) = store.find(&filter)?.first() {
            return Err(Error::UniquenessViolation(format!("{} already exists", existing)));
        }

        for subject in unique_subjects {
            let assignment =
                RoleAssignment::new(subject.clone(), role.class_name(), target.cloned(), grants.clone());
            store.insert(assignment)?;
            self.cache.invalidate(&subject, target);
            info!(
                subject = %subject,
                role = %role.class_name(),
                target = %describe_target(target),
                "Role assigned"
            );
        }

        Ok(())
    }

    /// Remove roles from one subject; `None` filters match everything
    pub fn remove_role(&self, subject: &SubjectId, role: Option<&str>, target: Option<&TargetRef>) -> Result<usize> {
        self.remove_roles(std::slice::from_ref(subject), role, target)
    }

    /// Remove roles from `subjects`; `None` filters match everything
    pub fn remove_roles(
        &self,
        subjects: &[SubjectId],
        role: Option<&str>,
        target: Option<&TargetRef>,
    ) -> Result<usize> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target.map(|t| &t.target_type))?;

        let filter = self
            .filter(role.as_deref(), TargetFilter::object_or_any(target))
            .subjects(subjects);
        self.remove_matching(&filter)
    }

    /// Remove every assignment of `role` (or of any role), optionally on `target`
    pub fn remove_all(&self, role: Option<&str>, target: Option<&TargetRef>) -> Result<usize> {
        let role = self.lookup_optional(role)?;
        ensure_compatible(role.as_deref(), target.map(|t| &t.target_type))?;

        let filter = self.filter(role.as_deref(), TargetFilter::object_or_any(target));
        self.remove_matching(&filter)
    }

    /// Host notification that `target` was deleted; drops every assignment on it
    pub fn remove_target(&self, target: &TargetRef) -> Result<usize> {
        let filter = AssignmentFilter::new().target(TargetFilter::Object(target.clone()));
        self.remove_matching(&filter)
    }

    /// Override one permission on matching assignments of `role`.
    ///
    /// Without `target` every assignment of the role held by `subject` is
    /// affected. Returns how many assignments were updated.
    pub fn assign_permission(
        &self,
        subject: &SubjectId,
        role: &str,
        permission: &str,
        granted: bool,
        target: Option<&TargetRef>,
    ) -> Result<usize> {
        let role = self.registry.lookup(role)?;
        let permission = self.catalog.resolve_permission(permission)?;

        let mut store = self.store.write();
        let filter = self
            .filter(Some(role.as_ref()), TargetFilter::object_or_any(target))
            .subject(subject);
        let rows = store.find(&filter)?;
        if rows.is_empty() {
            return Err(Error::NoMatchingAssignment(format!(
                "{} holds no '{}' on {}",
                subject,
                role.class_name(),
                target.map_or_else(|| "any target".to_string(), |t| t.to_string())
            )));
        }

        for row in &rows {
            store.set_override(row.id, permission.id, granted)?;
            self.cache.invalidate(&row.subject, row.target.as_ref());
        }

        info!(
            subject = %subject,
            role = %role.class_name(),
            permission = %permission.name,
            granted,
            affected = rows.len(),
            "Permission override assigned"
        );
        Ok(rows.len())
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn lookup_optional(&self, role: Option<&str>) -> Result<Option<Arc<Role>>> {
        role.map(|name| self.registry.lookup(name)).transpose()
    }

    fn filter(&self, role: Option<&Role>, target: TargetFilter) -> AssignmentFilter {
        let filter = AssignmentFilter::new().target(target);
        match role {
            Some(role) => filter.role(role.class_name()),
            None => filter,
        }
    }

    fn remove_matching(&self, filter: &AssignmentFilter) -> Result<usize> {
        let mut store = self.store.write();
        let rows = store.find(filter)?;

        for row in &rows {
            self.cache.invalidate(&row.subject, row.target.as_ref());
        }
        let ids: Vec<_> = rows.iter().map(|row| row.id).collect();
        let removed = store.delete(&ids)?;

        if removed > 0 {
            info!(removed, "Role assignments removed");
        }
        Ok(removed)
    }

    /// Default grants of `role` over every permission of its target types
    fn materialize(&self, role: &Role) -> PermissionGrants {
        let Some(target_types) = role.target_types() else {
            return PermissionGrants::default();
        };

        let mut defaults = Vec::new();
        for target_type in target_types {
            for permission in self.catalog.permissions_for(target_type) {
                defaults.push((permission.id, role.default_grant(&permission.name)));
            }
        }
        PermissionGrants::from_defaults(defaults)
    }

    /// Ranked role grants held by `subject` at one level
    fn entry_for(
        &self,
        store: &S,
        subject: &SubjectId,
        level: Option<&TargetRef>,
        any_object: bool,
    ) -> Result<CacheEntry> {
        let key = CacheKey::new(subject, level, any_object);
        self.cache.get_or_load(key, || {
            let target = if any_object && level.is_none() {
                TargetFilter::Any
            } else {
                TargetFilter::object_or_global(level)
            };
            let rows = store.find(&AssignmentFilter::new().subject(subject).target(target))?;
            debug!(
                subject = %subject,
                level = %describe_target(level),
                rows = rows.len(),
                "Loaded role grants from store"
            );

            let mut entry = Vec::with_capacity(rows.len());
            for row in rows {
                let rank = self.registry.lookup(row.role.as_str())?.rank();
                entry.push(RoleGrants {
                    role: row.role,
                    rank,
                    grants: row.grants.effective(),
                });
            }
            entry.sort_by_key(|grants| grants.rank);
            Ok(entry)
        })
    }
}

impl<S: AssignmentStore> std::fmt::Debug for Authorizer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authorizer")
            .field("registry", &self.registry)
            .field("config", &self.config)
            .field("cache", &self.cache.stats())
            .finish_non_exhaustive()
    }
}

fn ensure_compatible(role: Option<&Role>, target_type: Option<&TargetType>) -> Result<()> {
    if let (Some(role), Some(target_type)) = (role, target_type)
        && !role.accepts(target_type)
    {
        return Err(Error::role_target_mismatch(
            role.class_name(),
            format!("objects of type {}", target_type),
        ));
    }
    Ok(())
}

fn distinct<T, I>(items: I) -> Vec<T>
where
    T: Clone + Eq + std::hash::Hash,
    I: IntoIterator<Item = T>,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

/// Builder for [`Authorizer`]
pub struct AuthorizerBuilder {
    catalog: Option<Arc<dyn PermissionCatalog>>,
    graph: Option<Arc<dyn ObjectGraph>>,
    registry: Option<Arc<RoleRegistry>>,
    roles: Vec<RoleDraft>,
    assignments: Vec<AssignmentConfig>,
    document: Option<AuthorizationConfig>,
    config: EngineConfig,
}

impl AuthorizerBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            catalog: None,
            graph: None,
            registry: None,
            roles: Vec::new(),
            assignments: Vec::new(),
            document: None,
            config: EngineConfig::default(),
        }
    }

    /// Use `catalog` as permission catalog
    pub fn with_catalog<C>(self, catalog: C) -> Self
    where
        C: PermissionCatalog + 'static,
    {
        self.with_shared_catalog(Arc::new(catalog))
    }

    /// Use a shared permission catalog
    pub fn with_shared_catalog(mut self, catalog: Arc<dyn PermissionCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Use `graph` as object-graph provider
    pub fn with_graph<G>(self, graph: G) -> Self
    where
        G: ObjectGraph + 'static,
    {
        self.with_shared_graph(Arc::new(graph))
    }

    /// Use a shared object-graph provider
    pub fn with_shared_graph(mut self, graph: Arc<dyn ObjectGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Reuse an existing registry (its catalog wins over `with_catalog`)
    pub fn with_registry(mut self, registry: Arc<RoleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a role at build time
    pub fn with_role(mut self, draft: RoleDraft) -> Self {
        self.roles.push(draft);
        self
    }

    /// Replay an assignment at build time
    pub fn with_assignment(mut self, assignment: AssignmentConfig) -> Self {
        self.assignments.push(assignment);
        self
    }

    /// Replace the engine settings
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Bootstrap from a full configuration document.
    ///
    /// Explicit catalog and graph settings take precedence over the ones
    /// the document describes.
    pub fn with_document(mut self, document: AuthorizationConfig) -> Self {
        self.document = Some(document);
        self
    }

    /// Default for persistent mode
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.config.persistent = persistent;
        self
    }

    /// Enable audit logging of every decision
    pub fn with_audit_logging(mut self, enabled: bool) -> Self {
        self.config.audit_enabled = enabled;
        self
    }

    /// Enable or disable the decision cache
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.config.cache.enabled = enabled;
        self
    }

    /// Build an authorizer over the in-memory store
    pub fn build(self) -> Result<Authorizer<MemoryAssignmentStore>> {
        self.build_with_store(MemoryAssignmentStore::new())
    }

    /// Build an authorizer over a host-supplied store
    pub fn build_with_store<S: AssignmentStore>(mut self, store: S) -> Result<Authorizer<S>> {
        if let Some(document) = self.document.take() {
            document.validate()?;
            if self.catalog.is_none() && self.registry.is_none() {
                self.catalog = Some(Arc::new(document.build_catalog()?));
            }
            if self.graph.is_none() {
                self.graph = Some(Arc::new(document.build_graph()));
            }
            self.config = document.engine;
            let mut roles = document.roles;
            roles.append(&mut self.roles);
            self.roles = roles;
            let mut assignments = document.assignments;
            assignments.append(&mut self.assignments);
            self.assignments = assignments;
        }

        let registry = match self.registry {
            Some(registry) => registry,
            None => {
                let catalog = self.catalog.ok_or_else(|| {
                    Error::Configuration("a permission catalog is required".to_string())
                })?;
                Arc::new(RoleRegistry::new(catalog))
            }
        };
        for draft in &self.roles {
            registry.register(draft)?;
        }

        let authorizer = Authorizer {
            catalog: registry.catalog().clone(),
            registry,
            graph: self.graph.unwrap_or_else(|| Arc::new(FlatGraph)),
            store: RwLock::new(store),
            cache: DecisionCache::new(self.config.cache.enabled),
            config: self.config,
        };

        for assignment in &self.assignments {
            authorizer.assign_role(
                &assignment.subject,
                &assignment.role,
                assignment.target.as_ref(),
            )?;
        }

        debug!(
            roles = authorizer.registry.len(),
            persistent = authorizer.config.persistent,
            cache = authorizer.cache.is_enabled(),
            "Authorizer built"
        );
        Ok(authorizer)
    }
}

impl Default for AuthorizerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rolegate_core::catalog::StaticCatalog;
    use rolegate_core::graph::StaticObjectGraph;

    fn catalog() -> StaticCatalog {
        StaticCatalog::builder()
            .target_type("auth.user", &["add_user", "change_user", "delete_user"])
            .target_type("library.library", &["manage_library"])
            .build()
            .unwrap()
    }

    fn authorizer() -> Authorizer {
        let graph = StaticObjectGraph::new();
        graph.set_one_role_per_subject("library.library", true);

        Authorizer::builder()
            .with_catalog(catalog())
            .with_graph(graph)
            .with_role(
                RoleDraft::new("Advisor")
                    .label("Advisor")
                    .target_types(["auth.user"])
                    .deny(Vec::<String>::new())
                    .unique(true),
            )
            .with_role(
                RoleDraft::new("Teacher")
                    .label("Teacher")
                    .target_types(["auth.user"])
                    .deny(["delete_user"]),
            )
            .with_role(
                RoleDraft::new("Secretary")
                    .label("Secretary")
                    .target_types(["auth.user"])
                    .allow(["delete_user"]),
            )
            .with_role(
                RoleDraft::new("Librarian")
                    .label("Librarian")
                    .target_types(["library.library"])
                    .allow(["manage_library"]),
            )
            .with_role(
                RoleDraft::new("Coordinator")
                    .label("Coordinator")
                    .all_models()
                    .inherit_deny(["change_user"]),
            )
            .build()
            .unwrap()
    }

    fn user(id: &str) -> TargetRef {
        TargetRef::new("auth.user", id)
    }

    fn subject(id: &str) -> SubjectId {
        SubjectId::new(id)
    }

    #[test]
    fn test_materialized_grants() {
        let authz = authorizer();
        authz.assign_role(&subject("john"), "teacher", Some(&user("bob"))).unwrap();

        let groups = authz
            .get_permissions(&subject("john"), "teacher", Some(&user("bob")))
            .unwrap();
        assert_eq!(
            groups,
            vec![TargetPermissions {
                target: Some(user("bob")),
                permissions: vec![
                    ("add_user".to_string(), true),
                    ("change_user".to_string(), true),
                    ("delete_user".to_string(), false),
                ],
            }]
        );
    }

    #[test]
    fn test_permissions_grouped_per_target() {
        let authz = authorizer();
        let john = subject("john");
        authz.assign_role(&john, "teacher", Some(&user("bob"))).unwrap();
        authz.assign_role(&john, "teacher", Some(&user("julie"))).unwrap();
        authz
            .assign_permission(&john, "teacher", "delete_user", true, Some(&user("julie")))
            .unwrap();

        let groups = authz.get_permissions(&john, "teacher", None).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].target, Some(user("bob")));
        assert!(groups[0].permissions.contains(&("delete_user".to_string(), false)));
        assert_eq!(groups[1].target, Some(user("julie")));
        assert!(groups[1].permissions.contains(&("delete_user".to_string(), true)));
    }

    #[test]
    fn test_reset_roles_drops_cached_ranks() {
        let authz = authorizer();
        let john = subject("john");
        let bob = user("bob");
        authz.assign_role(&john, "teacher", Some(&bob)).unwrap();
        authz.assign_role(&john, "advisor", Some(&bob)).unwrap();

        // Advisor outranks Teacher and allows delete_user
        assert!(authz.has_permission(&john, "delete_user", Some(&bob)).unwrap());
        assert!(authz.cache_stats().entries > 0);

        authz.reset_roles();
        assert!(authz.registry().is_empty());
        assert_eq!(authz.cache_stats().entries, 0);

        for draft in [
            RoleDraft::new("Teacher")
                .label("Teacher")
                .target_types(["auth.user"])
                .deny(["delete_user"]),
            RoleDraft::new("Advisor")
                .label("Advisor")
                .target_types(["auth.user"])
                .deny(Vec::<String>::new())
                .unique(true),
        ] {
            authz.register_role(&draft).unwrap();
        }

        let decision = authz
            .decide(&john, "delete_user", Some(&bob), CheckOptions::new())
            .unwrap();
        assert!(!decision.granted);
        assert_eq!(decision.role.as_deref(), Some("teacher"));
    }

    #[test]
    fn test_target_mismatch() {
        let authz = authorizer();
        let john = subject("john");

        let cases = vec![
            authz.assign_role(&john, "teacher", None),
            authz.assign_role(&john, "coordinator", Some(&user("bob"))),
            authz.assign_role(&john, "teacher", Some(&TargetRef::new("library.library", "1"))),
        ];
        for result in cases {
            assert!(matches!(result, Err(Error::RoleTargetMismatch { .. })));
        }

        assert!(matches!(
            authz.has_role(&john, Some("teacher"), Some(&TargetRef::new("library.library", "1"))),
            Err(Error::RoleTargetMismatch { .. })
        ));
    }

    #[test]
    fn test_unique_role() {
        let authz = authorizer();
        let (john, mike) = (subject("john"), subject("mike"));

        authz.assign_role(&john, "advisor", Some(&user("bob"))).unwrap();
        authz.assign_role(&john, "advisor", Some(&user("julie"))).unwrap();

        assert!(matches!(
            authz.assign_roles(&[john.clone(), mike.clone()], "advisor", Some(&user("julie"))),
            Err(Error::UniquenessViolation(_))
        ));
        assert!(matches!(
            authz.assign_role(&mike, "advisor", Some(&user("bob"))),
            Err(Error::UniquenessViolation(_))
        ));
        assert_eq!(authz.get_users(Some("advisor"), None).unwrap(), vec![john.clone()]);
        assert_eq!(authz.get_user(Some("advisor"), Some(&user("bob"))).unwrap(), Some(john));
        assert_eq!(authz.get_user(Some("advisor"), Some(&user("mike"))).unwrap(), None);
    }

    #[test]
    fn test_multiple_unique_holders() {
        let authz = authorizer();
        authz.assign_role(&subject("john"), "advisor", Some(&user("bob"))).unwrap();
        authz.assign_role(&subject("mike"), "advisor", Some(&user("julie"))).unwrap();

        assert!(matches!(
            authz.get_user(Some("advisor"), None),
            Err(Error::MultipleUniqueHolders(_))
        ));
    }

    #[test]
    fn test_one_role_per_subject_target() {
        let authz = authorizer();
        let john = subject("john");
        let central = TargetRef::new("library.library", "central");

        authz.assign_role(&john, "librarian", Some(&central)).unwrap();
        // Librarian is the only role on that type, so a second assignment of
        // it is rejected by the per-type flag before the duplicate check.
        match authz.assign_role(&john, "librarian", Some(&central)) {
            Err(Error::UniquenessViolation(msg)) => assert!(msg.contains("already has a role")),
            other => panic!("Expected UniquenessViolation, got: {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_assignment_rejected() {
        let authz = authorizer();
        let john = subject("john");
        authz.assign_role(&john, "teacher", Some(&user("bob"))).unwrap();
        assert!(matches!(
            authz.assign_role(&john, "teacher", Some(&user("bob"))),
            Err(Error::UniquenessViolation(_))
        ));
        authz.assign_roles(&[john.clone(), john.clone()], "teacher", Some(&user("julie"))).unwrap();
        assert_eq!(authz.get_objects(&john, Some("teacher"), None).unwrap().len(), 2);
    }

    #[test]
    fn test_assign_permission_requires_assignment() {
        let authz = authorizer();
        assert!(matches!(
            authz.assign_permission(&subject("mike"), "secretary", "add_user", false, None),
            Err(Error::NoMatchingAssignment(_))
        ));
        assert!(matches!(
            authz.assign_permission(&subject("mike"), "secretary", "fly", false, None),
            Err(Error::UnknownPermission(_))
        ));
    }

    #[test]
    fn test_roles_and_objects_queries() {
        let authz = authorizer();
        let john = subject("john");
        authz.assign_role(&john, "coordinator", None).unwrap();
        authz.assign_role(&john, "teacher", Some(&user("bob"))).unwrap();
        authz.assign_role(&john, "advisor", Some(&user("bob"))).unwrap();

        let names: Vec<String> = authz
            .get_roles(&john, None)
            .unwrap()
            .iter()
            .map(|r| r.class_name().to_string())
            .collect();
        assert_eq!(names, vec!["advisor", "teacher", "coordinator"]);
        assert_eq!(
            authz.get_role(&john, Some(&user("bob"))).unwrap().unwrap().class_name(),
            "advisor"
        );

        assert!(authz.has_role(&john, None, None).unwrap());
        assert!(authz.has_role(&john, Some("coordinator"), None).unwrap());
        assert!(!authz.has_role(&john, Some("secretary"), None).unwrap());
        assert!(!authz.has_role(&john, None, Some(&user("julie"))).unwrap());

        assert_eq!(
            authz
                .get_objects(&john, None, Some(&TargetType::new("auth.user")))
                .unwrap(),
            vec![user("bob")]
        );
    }

    #[test]
    fn test_builder_requires_catalog() {
        assert!(matches!(
            Authorizer::builder().build(),
            Err(Error::Configuration(_))
        ));
    }
}
