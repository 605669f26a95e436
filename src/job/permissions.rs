//! Permission declaration normalization.
//!
//! Permission changes are chmod-syntax clauses (symbolic or octal) or a
//! reference path. Clauses are validated here, against the grammar only:
//! the engine never reinterprets mode bits itself, that stays with
//! `chmod`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Raw permission declaration from the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PermissionSpec {
    Literal(String),
    List(Vec<String>),
    Structured { reference: PathBuf },
}

/// Canonical permission change descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionChange {
    /// Validated chmod clauses, joined with commas on the command line.
    Clauses(Vec<String>),
    /// Mimic another file's mode: `chmod --reference`.
    Reference { path: PathBuf },
}

impl PermissionChange {
    /// The value argument handed to `chmod`.
    pub fn command_argument(&self) -> String {
        match self {
            PermissionChange::Clauses(clauses) => clauses.join(","),
            PermissionChange::Reference { path } => {
                format!("--reference={}", path.display())
            }
        }
    }
}

static SYMBOLIC_CLAUSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[ugoa]*([-+=]([rwxXst]*|[ugo]))+$").unwrap());
static OCTAL_CLAUSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-+=]?[0-7]+$").unwrap());

fn clause_is_valid(clause: &str) -> bool {
    SYMBOLIC_CLAUSE.is_match(clause) || OCTAL_CLAUSE.is_match(clause)
}

/// Normalize a raw declaration. Returns `None` when no clause survives
/// filtering.
pub fn normalize(spec: &PermissionSpec) -> Result<Option<PermissionChange>> {
    let text = match spec {
        PermissionSpec::Structured { reference } => {
            return Ok(Some(validated_reference(reference)?));
        }
        PermissionSpec::Literal(text) => {
            let text = text.trim();
            if text.starts_with('/') {
                return Ok(Some(validated_reference(Path::new(text))?));
            }
            text.to_string()
        }
        PermissionSpec::List(clauses) => clauses.join(","),
    };

    let clauses: Vec<String> = text
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect();
    if clauses.is_empty() {
        return Ok(None);
    }

    let invalid: Vec<String> = clauses
        .iter()
        .filter(|c| !clause_is_valid(c))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(Error::InvalidPermissionSyntax(invalid));
    }

    Ok(Some(PermissionChange::Clauses(clauses)))
}

fn validated_reference(path: &Path) -> Result<PermissionChange> {
    if !path.is_absolute() {
        return Err(Error::InvalidPermissionSyntax(vec![format!(
            "reference path must be absolute: {}",
            path.display()
        )]));
    }
    if std::fs::metadata(path).is_err() {
        return Err(Error::MissingPermissionReference(path.to_path_buf()));
    }
    Ok(PermissionChange::Reference {
        path: path.to_path_buf(),
    })
}
