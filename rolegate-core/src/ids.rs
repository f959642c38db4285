//! Opaque identities for subjects and target objects

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a subject (user, service account, ...) supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(String);

impl SubjectId {
    /// Create a new subject identity
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SubjectId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SubjectId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type tag of a target object, e.g. `"library.book"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetType(String);

impl TargetType {
    /// Create a new target type tag
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the raw tag
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TargetType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for TargetType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A target object, identified by its type tag and an id unique within that type.
///
/// Global assignments have no target at all (`Option<TargetRef>::None`), so
/// "type and id both null" is never representable half-way.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetRef {
    /// Type tag of the object
    pub target_type: TargetType,
    /// Id of the object within its type
    pub id: String,
}

impl TargetRef {
    /// Create a new target reference
    pub fn new(target_type: impl Into<TargetType>, id: impl Into<String>) -> Self {
        Self {
            target_type: target_type.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.target_type, self.id)
    }
}

/// Render an optional target for log fields and error messages.
pub fn describe_target(target: Option<&TargetRef>) -> String {
    match target {
        Some(target) => target.to_string(),
        None => "<global>".to_string(),
    }
}
