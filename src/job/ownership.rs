//! Ownership declaration normalization.
//!
//! An ownership declaration comes in as `owner[:group]` text, a structured
//! `{owner, group, reference}` mapping, or a reference path. It resolves to
//! a tagged [`OwnershipChange`] that also pins down which change command
//! applies: `chown` for anything carrying an owner (including references),
//! `chgrp` for group-only changes.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Raw ownership declaration from the document.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OwnershipSpec {
    Literal(String),
    Structured {
        #[serde(default)]
        owner: Option<String>,
        #[serde(default)]
        group: Option<String>,
        #[serde(default)]
        reference: Option<PathBuf>,
    },
}

/// Group component of an owner-carrying change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupSpec {
    Named(String),
    /// `*` or a trailing colon: use the owner's login group.
    OwnersDefault,
}

/// Canonical ownership change descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OwnershipChange {
    /// Owner, optionally with a group: applied with `chown`.
    OwnerGroup {
        owner: String,
        group: Option<GroupSpec>,
    },
    /// Group only: applied with `chgrp`.
    GroupOnly { group: String },
    /// Mimic another file's owner and group: `chown --reference`.
    Reference { path: PathBuf },
}

impl OwnershipChange {
    /// Whether this change carries an owner component. Group-only changes
    /// leave the owner untouched, so the oracle skips owner comparison.
    pub fn changes_owner(&self) -> bool {
        !matches!(self, OwnershipChange::GroupOnly { .. })
    }

    /// The value argument handed to the change command.
    pub fn command_argument(&self) -> String {
        match self {
            OwnershipChange::OwnerGroup { owner, group } => match group {
                None => owner.clone(),
                Some(GroupSpec::Named(name)) => format!("{owner}:{name}"),
                Some(GroupSpec::OwnersDefault) => format!("{owner}:"),
            },
            OwnershipChange::GroupOnly { group } => group.clone(),
            OwnershipChange::Reference { path } => {
                format!("--reference={}", path.display())
            }
        }
    }
}

/// Normalize a raw declaration. Returns `None` when the declaration
/// requests nothing (empty owner and group).
pub fn normalize(spec: &OwnershipSpec) -> Result<Option<OwnershipChange>> {
    match spec {
        OwnershipSpec::Structured {
            owner,
            group,
            reference,
        } => {
            let owner = owner.as_deref().map(str::trim).filter(|s| !s.is_empty());
            let group = group.as_deref().map(str::trim).filter(|s| !s.is_empty());
            if let Some(path) = reference {
                if owner.is_some() || group.is_some() {
                    return Err(Error::InvalidOwnershipSyntax(
                        "reference cannot be combined with owner or group".to_string(),
                    ));
                }
                return Ok(Some(validated_reference(path)?));
            }
            build_change(owner, group)
        }
        OwnershipSpec::Literal(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Ok(None);
            }
            if text.starts_with('/') {
                return Ok(Some(validated_reference(Path::new(text))?));
            }
            if text.matches(':').count() > 1 {
                return Err(Error::InvalidOwnershipSyntax(format!(
                    "too many colons in {text:?}"
                )));
            }
            match text.split_once(':') {
                None => build_change(Some(text), None),
                Some((owner_part, group_part)) => {
                    let owner = Some(owner_part.trim()).filter(|s| !s.is_empty());
                    let group_part = group_part.trim();
                    if group_part.is_empty() {
                        // `name:` asks for the owner's default group.
                        match owner {
                            Some(owner) => build_change(Some(owner), Some("*")),
                            None => Ok(None),
                        }
                    } else {
                        build_change(owner, Some(group_part))
                    }
                }
            }
        }
    }
}

fn build_change(owner: Option<&str>, group: Option<&str>) -> Result<Option<OwnershipChange>> {
    match (owner, group) {
        (None, None) => Ok(None),
        (Some(owner), group) => {
            validate_owner(owner)?;
            let group = match group {
                None => None,
                Some("*") => Some(GroupSpec::OwnersDefault),
                Some(name) => {
                    validate_group(name)?;
                    Some(GroupSpec::Named(name.to_string()))
                }
            };
            Ok(Some(OwnershipChange::OwnerGroup {
                owner: owner.to_string(),
                group,
            }))
        }
        (None, Some("*")) => Err(Error::InvalidOwnershipSyntax(
            "group `*` requires an owner to take the default group from".to_string(),
        )),
        (None, Some(group)) => {
            validate_group(group)?;
            Ok(Some(OwnershipChange::GroupOnly {
                group: group.to_string(),
            }))
        }
    }
}

fn validated_reference(path: &Path) -> Result<OwnershipChange> {
    if !path.is_absolute() {
        return Err(Error::InvalidOwnershipSyntax(format!(
            "reference path must be absolute: {}",
            path.display()
        )));
    }
    if std::fs::metadata(path).is_err() {
        return Err(Error::MissingOwnershipReference(path.to_path_buf()));
    }
    Ok(OwnershipChange::Reference {
        path: path.to_path_buf(),
    })
}

fn numeric_id(token: &str) -> Option<i64> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        token.parse().ok()
    } else {
        None
    }
}

fn validate_owner(token: &str) -> Result<()> {
    if let Some(id) = numeric_id(token) {
        if id < 0 {
            return Err(Error::InvalidOwnershipSyntax(format!(
                "negative owner id {token}"
            )));
        }
        return Ok(());
    }
    match nix::unistd::User::from_name(token) {
        Ok(Some(_)) => Ok(()),
        _ => Err(Error::UnknownOwner(token.to_string())),
    }
}

fn validate_group(token: &str) -> Result<()> {
    if let Some(id) = numeric_id(token) {
        if id < 0 {
            return Err(Error::InvalidOwnershipSyntax(format!(
                "negative group id {token}"
            )));
        }
        return Ok(());
    }
    match nix::unistd::Group::from_name(token) {
        Ok(Some(_)) => Ok(()),
        _ => Err(Error::UnknownGroup(token.to_string())),
    }
}
