//! Job document model and normalization.
//!
//! A job arrives as loosely-typed YAML (strings, lists, or small mappings
//! for each field) and is normalized exactly once into an [`Operation`]:
//! resolved flags plus tagged ownership/permission change descriptors.
//! Nothing downstream ever re-inspects the raw document forms.

pub mod flags;
pub mod ownership;
pub mod permissions;

pub use flags::{FlagSet, FlagSpec};
pub use ownership::{GroupSpec, OwnershipChange, OwnershipSpec};
pub use permissions::{PermissionChange, PermissionSpec};

use serde::Deserialize;

use crate::error::Result;

/// Top-level job document: a `jobs` list.
#[derive(Debug, Clone, Deserialize)]
pub struct JobDocument {
    pub jobs: Vec<JobSpec>,
}

/// One declared unit of work, straight from the document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobSpec {
    #[serde(default)]
    pub ownership: Option<OwnershipSpec>,
    #[serde(default)]
    pub permissions: Option<PermissionSpec>,
    #[serde(default)]
    pub flags: Option<FlagSpec>,
    /// Kept loosely typed so non-string entries can be rejected as a
    /// validation error rather than a parse error.
    #[serde(default)]
    pub targets: Vec<serde_yaml::Value>,
}

/// A job's resolved form. Immutable once built.
#[derive(Debug, Clone)]
pub struct Operation {
    pub flags: FlagSet,
    pub ownership: Option<OwnershipChange>,
    pub permissions: Option<PermissionChange>,
}

impl Operation {
    /// Normalize a job's declarations. Flag, ownership and permission
    /// errors surface here, before any target is touched.
    pub fn from_spec(spec: &JobSpec) -> Result<Self> {
        let flags = match &spec.flags {
            Some(declared) => flags::resolve(&declared.tokens())?,
            None => FlagSet::default(),
        };
        let ownership = match &spec.ownership {
            Some(declared) => ownership::normalize(declared)?,
            None => None,
        };
        let permissions = match &spec.permissions {
            Some(declared) => permissions::normalize(declared)?,
            None => None,
        };
        Ok(Self {
            flags,
            ownership,
            permissions,
        })
    }

    /// True when the job requests no change at all.
    pub fn is_empty(&self) -> bool {
        self.ownership.is_none() && self.permissions.is_none()
    }
}
