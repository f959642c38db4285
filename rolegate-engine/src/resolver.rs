//! Resolution engine: the breadth-first walk behind `has_permission`
//!
//! The walk starts at the queried target (or at the global level), reads the
//! ranked role grants held there, and climbs the parent graph level by level
//! until a decision is found:
//!
//! 1. For each role at the level, in rank order, an explicit grant is the
//!    candidate; otherwise an inheriting role yields its inherited decision;
//!    otherwise the role has no opinion.
//! 2. Non-persistent mode returns the first candidate found.
//! 3. Persistent mode returns only on `true`; a `false` keeps the walk going.
//! 4. Once the object chain is exhausted, one final pass over the subject's
//!    global (`AllModels`) roles runs.
//! 5. An exhausted walk is a denial.

use crate::cache::CacheEntry;
use rolegate_core::catalog::Permission;
use rolegate_core::error::{Error, Result};
use rolegate_core::graph::ObjectGraph;
use rolegate_core::ids::TargetRef;
use rolegate_core::registry::RoleRegistry;
use std::collections::VecDeque;

/// Per-call options for a permission check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Consider the subject's roles on any object when no target is given
    pub any_object: bool,
    /// Override the configured persistent mode
    pub persistent: Option<bool>,
}

impl CheckOptions {
    /// Options using the configured defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable the any-object fallback
    pub fn any_object(mut self) -> Self {
        self.any_object = true;
        self
    }

    /// Force persistent or non-persistent mode
    pub fn persistent(mut self, persistent: bool) -> Self {
        self.persistent = Some(persistent);
        self
    }
}

/// Where a decision came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionSource {
    /// A materialized or overridden grant of the assignment
    Explicit,
    /// The role's inherit list
    Inherited,
    /// Nothing decided; default deny
    Default,
}

/// Outcome of one resolution walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Final answer
    pub granted: bool,
    /// How it was reached
    pub source: DecisionSource,
    /// Role that decided, if any
    pub role: Option<String>,
    /// Level that decided; `None` for the global level or a default deny
    pub level: Option<TargetRef>,
}

impl Decision {
    fn default_deny() -> Self {
        Self {
            granted: false,
            source: DecisionSource::Default,
            role: None,
            level: None,
        }
    }
}

/// Borrowed collaborators of one walk
pub(crate) struct Resolver<'a> {
    pub registry: &'a RoleRegistry,
    pub graph: &'a dyn ObjectGraph,
}

impl Resolver<'_> {
    /// Run the walk. `entry_for` returns the ranked role grants held at a level.
    pub fn resolve<F>(
        &self,
        permission: &Permission,
        target: Option<&TargetRef>,
        persistent: bool,
        mut entry_for: F,
    ) -> Result<Decision>
    where
        F: FnMut(Option<&TargetRef>) -> Result<CacheEntry>,
    {
        let mut queue: VecDeque<Option<TargetRef>> = VecDeque::new();
        queue.push_back(target.cloned());
        let mut global_pass_pending = target.is_some();
        let mut last_denial: Option<Decision> = None;

        while let Some(current) = queue.pop_front() {
            let entry = entry_for(current.as_ref())?;

            for role_grants in entry.iter() {
                let candidate = match role_grants.grant(permission.id) {
                    Some(granted) => Some((granted, DecisionSource::Explicit)),
                    None => self
                        .registry
                        .lookup(role_grants.role.as_str())?
                        .inherit_decision(&permission.name)
                        .map(|granted| (granted, DecisionSource::Inherited)),
                };

                let Some((granted, source)) = candidate else {
                    continue;
                };

                let decision = Decision {
                    granted,
                    source,
                    role: Some(role_grants.role.clone()),
                    level: current.clone(),
                };
                if granted || !persistent {
                    return Ok(decision);
                }
                last_denial.get_or_insert(decision);
            }

            if let Some(current) = &current {
                for parent in self.graph.parents_of(current)? {
                    queue.push_back(Some(parent));
                }
            }

            if queue.is_empty() && global_pass_pending {
                global_pass_pending = false;
                queue.push_back(None);
            }
        }

        Ok(last_denial
            .map(|decision| Decision {
                granted: false,
                ..decision
            })
            .unwrap_or_else(Decision::default_deny))
    }
}

/// Reject option combinations that cannot be honoured together
pub(crate) fn check_arguments(target: Option<&TargetRef>, options: &CheckOptions) -> Result<()> {
    if options.any_object && target.is_some() {
        return Err(Error::InvalidArguments(
            "a target and the any-object fallback cannot be combined".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::RoleGrants;
    use rolegate_core::catalog::{PermissionCatalog, StaticCatalog};
    use rolegate_core::graph::StaticObjectGraph;
    use rolegate_core::role::RoleDraft;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Fixture {
        registry: RoleRegistry,
        graph: StaticObjectGraph,
        catalog: Arc<StaticCatalog>,
        paragraph: TargetRef,
        chapter: TargetRef,
        book: TargetRef,
    }

    fn fixture() -> Fixture {
        let catalog = Arc::new(
            StaticCatalog::builder()
                .target_type("book", &["view_book", "review"])
                .target_type("chapter", &["view_chapter"])
                .target_type("paragraph", &["view_paragraph"])
                .build()
                .unwrap(),
        );
        let registry = RoleRegistry::new(catalog.clone());
        registry
            .register(
                &RoleDraft::new("Reviewer")
                    .label("Reviewer")
                    .target_types(["book"])
                    .allow(["review"])
                    .inherit_allow(["review"]),
            )
            .unwrap();
        registry
            .register(
                &RoleDraft::new("Author")
                    .label("Author")
                    .target_types(["book", "chapter", "paragraph"])
                    .deny(["review"]),
            )
            .unwrap();
        registry
            .register(
                &RoleDraft::new("Coordinator")
                    .label("Coordinator")
                    .all_models()
                    .inherit_allow(["review"]),
            )
            .unwrap();

        let graph = StaticObjectGraph::new();
        graph.declare_parents("paragraph", ["chapter"]);
        graph.declare_parents("chapter", ["book"]);
        let paragraph = TargetRef::new("paragraph", "1");
        let chapter = TargetRef::new("chapter", "1");
        let book = TargetRef::new("book", "1");
        graph.link(&paragraph, "chapter", &chapter);
        graph.link(&chapter, "book", &book);

        Fixture {
            registry,
            graph,
            catalog,
            paragraph,
            chapter,
            book,
        }
    }

    fn levels(
        entries: Vec<(Option<TargetRef>, Vec<RoleGrants>)>,
    ) -> HashMap<Option<TargetRef>, CacheEntry> {
        entries
            .into_iter()
            .map(|(level, grants)| (level, grants.into()))
            .collect()
    }

    fn role(role: &str, rank: usize, grants: Vec<(u32, bool)>) -> RoleGrants {
        RoleGrants {
            role: role.to_string(),
            rank,
            grants: grants
                .into_iter()
                .map(|(id, granted)| (rolegate_core::catalog::PermissionId(id), granted))
                .collect(),
        }
    }

    fn run(
        fx: &Fixture,
        permission: &str,
        target: Option<&TargetRef>,
        persistent: bool,
        table: &HashMap<Option<TargetRef>, CacheEntry>,
        visited: &mut Vec<Option<TargetRef>>,
    ) -> Decision {
        let resolver = Resolver {
            registry: &fx.registry,
            graph: &fx.graph,
        };
        let permission = fx.catalog.resolve_permission(permission).unwrap();
        resolver
            .resolve(&permission, target, persistent, |level| {
                visited.push(level.cloned());
                Ok(table.get(&level.cloned()).cloned().unwrap_or_else(|| Vec::<RoleGrants>::new().into()))
            })
            .unwrap()
    }

    #[test]
    fn test_walk_is_breadth_first_then_global() {
        let fx = fixture();
        let table = levels(vec![]);
        let mut visited = Vec::new();

        let decision = run(&fx, "review", Some(&fx.paragraph), false, &table, &mut visited);

        assert!(!decision.granted);
        assert_eq!(decision.source, DecisionSource::Default);
        assert_eq!(
            visited,
            vec![
                Some(fx.paragraph.clone()),
                Some(fx.chapter.clone()),
                Some(fx.book.clone()),
                None
            ]
        );
    }

    #[test]
    fn test_inherited_grant_from_ancestor() {
        let fx = fixture();
        // review is PermissionId(1); materialized on the book only
        let table = levels(vec![(
            Some(fx.book.clone()),
            vec![role("reviewer", 0, vec![(0, false), (1, true)])],
        )]);
        let mut visited = Vec::new();

        let decision = run(&fx, "review", Some(&fx.paragraph), false, &table, &mut visited);
        assert!(decision.granted);
        assert_eq!(decision.source, DecisionSource::Explicit);
        assert_eq!(decision.level, Some(fx.book.clone()));

        // view_paragraph has no grant on the book; the inherit list decides
        let mut visited = Vec::new();
        let decision = run(&fx, "view_paragraph", Some(&fx.paragraph), false, &table, &mut visited);
        assert!(!decision.granted);
        assert_eq!(decision.source, DecisionSource::Inherited);
    }

    #[test]
    fn test_non_persistent_stops_at_first_opinion() {
        let fx = fixture();
        let table = levels(vec![
            (
                Some(fx.chapter.clone()),
                vec![role("author", 1, vec![(1, false)])],
            ),
            (None, vec![role("coordinator", 2, vec![])]),
        ]);

        let mut visited = Vec::new();
        let decision = run(&fx, "review", Some(&fx.paragraph), false, &table, &mut visited);
        assert!(!decision.granted);
        assert_eq!(decision.role.as_deref(), Some("author"));
        assert_eq!(visited.len(), 2);

        let mut visited = Vec::new();
        let decision = run(&fx, "review", Some(&fx.paragraph), true, &table, &mut visited);
        assert!(decision.granted);
        assert_eq!(decision.role.as_deref(), Some("coordinator"));
        assert_eq!(decision.level, None);
        assert_eq!(visited.len(), 4);
    }

    #[test]
    fn test_persistent_true_is_final() {
        let fx = fixture();
        let table = levels(vec![
            (
                Some(fx.chapter.clone()),
                vec![role("author", 1, vec![(1, true)])],
            ),
            (
                Some(fx.book.clone()),
                vec![role("author", 1, vec![(1, false)])],
            ),
        ]);

        let mut visited = Vec::new();
        let decision = run(&fx, "review", Some(&fx.paragraph), true, &table, &mut visited);
        assert!(decision.granted);
        assert_eq!(decision.level, Some(fx.chapter.clone()));
        assert_eq!(visited.len(), 2);
    }

    #[test]
    fn test_rank_breaks_ties_on_same_level() {
        let fx = fixture();
        let table = levels(vec![(
            Some(fx.book.clone()),
            vec![
                role("reviewer", 0, vec![(1, true)]),
                role("author", 1, vec![(1, false)]),
            ],
        )]);

        let mut visited = Vec::new();
        let decision = run(&fx, "review", Some(&fx.book), false, &table, &mut visited);
        assert!(decision.granted);
        assert_eq!(decision.role.as_deref(), Some("reviewer"));
    }

    #[test]
    fn test_role_without_opinion_is_skipped() {
        let fx = fixture();
        // author has no grant for view_book recorded and does not inherit
        let table = levels(vec![
            (Some(fx.book.clone()), vec![role("author", 1, vec![(1, false)])]),
            (None, vec![role("coordinator", 2, vec![])]),
        ]);

        let mut visited = Vec::new();
        let decision = run(&fx, "view_book", Some(&fx.book), false, &table, &mut visited);
        assert!(!decision.granted);
        assert_eq!(decision.role.as_deref(), Some("coordinator"));
        assert_eq!(decision.source, DecisionSource::Inherited);
    }

    #[test]
    fn test_nearer_parent_decides_before_deeper_ancestor() {
        let catalog = Arc::new(
            StaticCatalog::builder()
                .target_type("leaf", &["open"])
                .target_type("left", &["fold"])
                .target_type("right", &["close"])
                .target_type("top", &["lift"])
                .build()
                .unwrap(),
        );
        let registry = RoleRegistry::new(catalog.clone());
        registry
            .register(
                &RoleDraft::new("Keeper")
                    .label("Keeper")
                    .target_types(["right"])
                    .allow(["close"])
                    .inherit_deny(["open"]),
            )
            .unwrap();
        registry
            .register(
                &RoleDraft::new("Patron")
                    .label("Patron")
                    .target_types(["top"])
                    .allow(["lift"])
                    .inherit_allow(["open"]),
            )
            .unwrap();

        // leaf -> {left, right}, left -> top
        let graph = StaticObjectGraph::new();
        graph.declare_parents("leaf", ["left", "right"]);
        graph.declare_parents("left", ["top"]);
        let leaf = TargetRef::new("leaf", "1");
        let left = TargetRef::new("left", "1");
        let right = TargetRef::new("right", "1");
        let top = TargetRef::new("top", "1");
        graph.link(&leaf, "left", &left);
        graph.link(&leaf, "right", &right);
        graph.link(&left, "top", &top);

        let table = levels(vec![
            (Some(right.clone()), vec![role("keeper", 0, vec![])]),
            (Some(top.clone()), vec![role("patron", 1, vec![])]),
        ]);
        let resolver = Resolver {
            registry: &registry,
            graph: &graph,
        };
        let open = catalog.resolve_permission("open").unwrap();
        let walk = |persistent: bool| {
            let mut visited = Vec::new();
            let decision = resolver
                .resolve(&open, Some(&leaf), persistent, |level| {
                    visited.push(level.cloned());
                    Ok(table
                        .get(&level.cloned())
                        .cloned()
                        .unwrap_or_else(|| Vec::<RoleGrants>::new().into()))
                })
                .unwrap();
            (decision, visited)
        };

        // right sits one level up, top two; right decides first
        let (decision, visited) = walk(false);
        assert!(!decision.granted);
        assert_eq!(decision.source, DecisionSource::Inherited);
        assert_eq!(decision.role.as_deref(), Some("keeper"));
        assert_eq!(decision.level, Some(right.clone()));
        assert_eq!(
            visited,
            vec![Some(leaf.clone()), Some(left.clone()), Some(right.clone())]
        );

        // persistent mode keeps going and finds the grant on top
        let (decision, visited) = walk(true);
        assert!(decision.granted);
        assert_eq!(decision.role.as_deref(), Some("patron"));
        assert_eq!(decision.level, Some(top.clone()));
        assert_eq!(
            visited,
            vec![Some(leaf), Some(left), Some(right), Some(top)]
        );
    }

    #[test]
    fn test_any_object_with_target_is_rejected() {
        let target = TargetRef::new("book", "1");
        assert!(matches!(
            check_arguments(Some(&target), &CheckOptions::new().any_object()),
            Err(Error::InvalidArguments(_))
        ));
        assert!(check_arguments(None, &CheckOptions::new().any_object()).is_ok());
        assert!(check_arguments(Some(&target), &CheckOptions::new().persistent(true)).is_ok());
    }
}
