//! Object-graph provider: parents of a target and per-type assignment options

use crate::error::{Error, Result};
use crate::ids::{TargetRef, TargetType};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Capability interface the host implements over its own objects.
///
/// The parent graph must be finite and acyclic; cycles are not detected.
pub trait ObjectGraph: Send + Sync {
    /// Ordered parents of `target`.
    ///
    /// Fails with [`Error::ParentFieldMissing`] when a declared parent field
    /// does not resolve on the instance.
    fn parents_of(&self, target: &TargetRef) -> Result<Vec<TargetRef>>;

    /// Whether a subject may hold at most one role on objects of this type.
    fn one_role_per_subject(&self, _target_type: &TargetType) -> bool {
        false
    }
}

/// Graph with no parents and no per-type options.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatGraph;

impl ObjectGraph for FlatGraph {
    fn parents_of(&self, _target: &TargetRef) -> Result<Vec<TargetRef>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Default)]
struct TypeOptions {
    parent_fields: Vec<String>,
    one_role_per_subject: bool,
}

/// In-memory object graph.
///
/// Each target type declares the names of its parent fields; each instance
/// then records which object every field points to. Resolving a declared
/// field that an instance never set fails with `ParentFieldMissing`.
#[derive(Debug, Default)]
pub struct StaticObjectGraph {
    types: RwLock<HashMap<TargetType, TypeOptions>>,
    links: RwLock<HashMap<TargetRef, HashMap<String, TargetRef>>>,
}

impl StaticObjectGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the parent fields of a target type, in lookup order
    pub fn declare_parents<I, S>(&self, target_type: impl Into<TargetType>, fields: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut types = self.types.write();
        let options = types.entry(target_type.into()).or_default();
        options.parent_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Mark a target type as accepting one role per subject
    pub fn set_one_role_per_subject(&self, target_type: impl Into<TargetType>, enabled: bool) -> &Self {
        let mut types = self.types.write();
        types.entry(target_type.into()).or_default().one_role_per_subject = enabled;
        self
    }

    /// Point `field` of `child` at `parent`
    pub fn link(&self, child: &TargetRef, field: &str, parent: &TargetRef) -> &Self {
        self.links
            .write()
            .entry(child.clone())
            .or_default()
            .insert(field.to_string(), parent.clone());
        self
    }

    /// Forget every link of a deleted object
    pub fn forget(&self, target: &TargetRef) {
        self.links.write().remove(target);
    }
}

impl ObjectGraph for StaticObjectGraph {
    fn parents_of(&self, target: &TargetRef) -> Result<Vec<TargetRef>> {
        let types = self.types.read();
        let Some(options) = types.get(&target.target_type) else {
            return Ok(Vec::new());
        };

        let links = self.links.read();
        let fields = links.get(target);
        let mut parents = Vec::with_capacity(options.parent_fields.len());
        for field in &options.parent_fields {
            match fields.and_then(|f| f.get(field)) {
                Some(parent) => parents.push(parent.clone()),
                None => {
                    return Err(Error::ParentFieldMissing {
                        field: field.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
        Ok(parents)
    }

    fn one_role_per_subject(&self, target_type: &TargetType) -> bool {
        self.types
            .read()
            .get(target_type)
            .is_some_and(|options| options.one_role_per_subject)
    }
}
