//! Assignment store: which subject holds which role, optionally on a target
//!
//! [`AssignmentStore`] is the seam to the host's persistence layer. The
//! bundled [`MemoryAssignmentStore`] keeps rows in insertion order and
//! enforces the (subject, role, target) uniqueness invariant itself.

use chrono::{DateTime, Utc};
use rolegate_core::catalog::PermissionId;
use rolegate_core::error::{Error, Result};
use rolegate_core::ids::{SubjectId, TargetRef, TargetType, describe_target};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use uuid::Uuid;

/// Row id of an assignment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(Uuid);

impl AssignmentId {
    /// Fresh random id
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Grants owned by one assignment.
///
/// `defaults` is materialized once from the role's allow/deny list;
/// `overrides` holds explicit values set later and always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGrants {
    defaults: BTreeMap<PermissionId, bool>,
    overrides: BTreeMap<PermissionId, bool>,
}

impl PermissionGrants {
    /// Grants built from materialized defaults
    pub fn from_defaults(defaults: impl IntoIterator<Item = (PermissionId, bool)>) -> Self {
        Self {
            defaults: defaults.into_iter().collect(),
            overrides: BTreeMap::new(),
        }
    }

    /// Effective grant for `permission`, if one is recorded
    pub fn get(&self, permission: PermissionId) -> Option<bool> {
        self.overrides
            .get(&permission)
            .or_else(|| self.defaults.get(&permission))
            .copied()
    }

    /// Record an explicit override
    pub fn set_override(&mut self, permission: PermissionId, granted: bool) {
        self.overrides.insert(permission, granted);
    }

    /// Every recorded grant with overrides applied, ordered by permission id
    pub fn effective(&self) -> Vec<(PermissionId, bool)> {
        let mut merged = self.defaults.clone();
        merged.extend(self.overrides.iter().map(|(id, granted)| (*id, *granted)));
        merged.into_iter().collect()
    }

    /// Whether no grant is recorded at all
    pub fn is_empty(&self) -> bool {
        self.defaults.is_empty() && self.overrides.is_empty()
    }
}

/// The fact that a subject holds a role, optionally scoped to a target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Row id
    pub id: AssignmentId,
    /// Subject holding the role
    pub subject: SubjectId,
    /// Class name of the role
    pub role: String,
    /// Target object; `None` for global assignments
    pub target: Option<TargetRef>,
    /// Materialized grants plus overrides
    pub grants: PermissionGrants,
    /// Creation time
    pub assigned_at: DateTime<Utc>,
}

impl RoleAssignment {
    /// New assignment row with a fresh id
    pub fn new(
        subject: SubjectId,
        role: impl Into<String>,
        target: Option<TargetRef>,
        grants: PermissionGrants,
    ) -> Self {
        Self {
            id: AssignmentId::new(),
            subject,
            role: role.into(),
            target,
            grants,
            assigned_at: Utc::now(),
        }
    }

    fn key(&self) -> AssignmentKey {
        AssignmentKey {
            subject: self.subject.clone(),
            role: self.role.clone(),
            target: self.target.clone(),
        }
    }
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} is {}", self.subject, self.role)?;
        if let Some(target) = &self.target {
            write!(f, " of {}", target)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct AssignmentKey {
    subject: SubjectId,
    role: String,
    target: Option<TargetRef>,
}

/// Filter on the target dimension
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetFilter {
    /// No filter
    #[default]
    Any,
    /// Only global assignments
    Global,
    /// Only assignments on this object
    Object(TargetRef),
    /// Only assignments on objects of this type
    Type(TargetType),
}

impl TargetFilter {
    /// `Object` when a target is given, `Any` otherwise
    pub fn object_or_any(target: Option<&TargetRef>) -> Self {
        target.map_or(TargetFilter::Any, |t| TargetFilter::Object(t.clone()))
    }

    /// `Object` when a target is given, `Global` otherwise
    pub fn object_or_global(target: Option<&TargetRef>) -> Self {
        target.map_or(TargetFilter::Global, |t| TargetFilter::Object(t.clone()))
    }

    fn matches(&self, target: Option<&TargetRef>) -> bool {
        match self {
            TargetFilter::Any => true,
            TargetFilter::Global => target.is_none(),
            TargetFilter::Object(wanted) => target == Some(wanted),
            TargetFilter::Type(wanted) => target.is_some_and(|t| &t.target_type == wanted),
        }
    }
}

/// Query over assignments; every omitted dimension matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentFilter {
    /// Subjects to match
    pub subjects: Option<Vec<SubjectId>>,
    /// Role class name to match
    pub role: Option<String>,
    /// Target dimension
    pub target: TargetFilter,
}

impl AssignmentFilter {
    /// Match everything
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one subject
    pub fn subject(mut self, subject: &SubjectId) -> Self {
        self.subjects = Some(vec![subject.clone()]);
        self
    }

    /// Restrict to a set of subjects
    pub fn subjects(mut self, subjects: &[SubjectId]) -> Self {
        self.subjects = Some(subjects.to_vec());
        self
    }

    /// Restrict to a role class name
    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Restrict the target dimension
    pub fn target(mut self, target: TargetFilter) -> Self {
        self.target = target;
        self
    }

    /// Whether `assignment` passes the filter
    pub fn matches(&self, assignment: &RoleAssignment) -> bool {
        self.subjects
            .as_ref()
            .is_none_or(|subjects| subjects.contains(&assignment.subject))
            && self.role.as_ref().is_none_or(|role| role == &assignment.role)
            && self.target.matches(assignment.target.as_ref())
    }
}

/// Persistent store of assignments, supplied by the host or in-memory.
///
/// Readers take `&self` and writers `&mut self`; the engine serializes
/// writers against readers and invalidates its cache inside the same
/// critical section.
pub trait AssignmentStore: Send + Sync {
    /// Insert a row, failing with `UniquenessViolation` when
    /// (subject, role, target) already exists.
    fn insert(&mut self, assignment: RoleAssignment) -> Result<()>;

    /// Rows matching `filter`, in insertion order.
    fn find(&self, filter: &AssignmentFilter) -> Result<Vec<RoleAssignment>>;

    /// Delete rows by id, returning how many were removed.
    fn delete(&mut self, ids: &[AssignmentId]) -> Result<usize>;

    /// Override one permission grant of one row.
    fn set_override(&mut self, id: AssignmentId, permission: PermissionId, granted: bool)
    -> Result<()>;

    /// Total number of rows.
    fn len(&self) -> usize;

    /// Whether the store holds no rows.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory assignment store
#[derive(Debug, Default)]
pub struct MemoryAssignmentStore {
    rows: BTreeMap<u64, RoleAssignment>,
    by_id: HashMap<AssignmentId, u64>,
    keys: HashMap<AssignmentKey, u64>,
    next_seq: u64,
}

impl MemoryAssignmentStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl AssignmentStore for MemoryAssignmentStore {
    fn insert(&mut self, assignment: RoleAssignment) -> Result<()> {
        let key = assignment.key();
        if self.keys.contains_key(&key) {
            return Err(Error::UniquenessViolation(format!(
                "{} already holds '{}' on {}",
                assignment.subject,
                assignment.role,
                describe_target(assignment.target.as_ref())
            )));
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.keys.insert(key, seq);
        self.by_id.insert(assignment.id, seq);
        self.rows.insert(seq, assignment);
        Ok(())
    }

    fn find(&self, filter: &AssignmentFilter) -> Result<Vec<RoleAssignment>> {
        Ok(self
            .rows
            .values()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect())
    }

    fn delete(&mut self, ids: &[AssignmentId]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            if let Some(seq) = self.by_id.remove(id)
                && let Some(row) = self.rows.remove(&seq)
            {
                self.keys.remove(&row.key());
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn set_override(
        &mut self,
        id: AssignmentId,
        permission: PermissionId,
        granted: bool,
    ) -> Result<()> {
        let row = self
            .by_id
            .get(&id)
            .and_then(|seq| self.rows.get_mut(seq))
            .ok_or_else(|| Error::Store(format!("assignment {} does not exist", id)))?;
        row.grants.set_override(permission, granted);
        Ok(())
    }

    fn len(&self) -> usize {
        self.rows.len()
    }
}
