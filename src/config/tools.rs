//! Discovery of the external change commands.
//!
//! The engine drives `chown`, `chgrp`, `chmod` and `find`; their locations
//! are resolved once at startup by scanning `PATH`, so later invocations
//! use absolute program paths.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CHOWN: &str = "chown";
pub const CHGRP: &str = "chgrp";
pub const CHMOD: &str = "chmod";
pub const FIND: &str = "find";

#[derive(Debug, Clone)]
pub struct Toolchain {
    pub chown: PathBuf,
    pub chgrp: PathBuf,
    pub chmod: PathBuf,
    pub find: PathBuf,
}

impl Toolchain {
    /// Resolve all required tools, failing on the first one missing.
    pub fn discover() -> Result<Self> {
        Ok(Self {
            chown: find_on_path(CHOWN)?,
            chgrp: find_on_path(CHGRP)?,
            chmod: find_on_path(CHMOD)?,
            find: find_on_path(FIND)?,
        })
    }

    /// A toolchain whose entries are bare command names. Used with the
    /// mock runner, which matches on file name only.
    pub fn unresolved() -> Self {
        Self {
            chown: PathBuf::from(CHOWN),
            chgrp: PathBuf::from(CHGRP),
            chmod: PathBuf::from(CHMOD),
            find: PathBuf::from(FIND),
        }
    }
}

fn find_on_path(name: &str) -> Result<PathBuf> {
    let path_var =
        std::env::var_os("PATH").ok_or_else(|| Error::ToolNotFound(name.to_string()))?;
    for dir in std::env::split_paths(&path_var) {
        let candidate = dir.join(name);
        if is_executable(&candidate) {
            tracing::debug!("resolved {name} -> {}", candidate.display());
            return Ok(candidate);
        }
    }
    Err(Error::ToolNotFound(name.to_string()))
}

fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_a_ubiquitous_tool() {
        // `find` exists on any Unix box the tests run on.
        let path = find_on_path("find").unwrap();
        assert!(path.is_absolute());
    }

    #[test]
    fn missing_tool_is_reported_by_name() {
        let err = find_on_path("treekeeper-no-such-tool").unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(name) if name == "treekeeper-no-such-tool"));
    }
}
