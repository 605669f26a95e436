//! Target list validation and materialization.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Validate the declared target entries and, with `create` set, create
/// missing ones as directories. Validation failures are collected and
/// reported as whole sets.
///
/// Created directories get mode 0750 and the invoking user's ownership;
/// the requested ownership/permission changes reach them through the
/// normal passes afterwards.
pub fn materialize(targets: &[serde_yaml::Value], create: bool) -> Result<Vec<PathBuf>> {
    let mut invalid: Vec<String> = Vec::new();
    let mut relative: Vec<String> = Vec::new();
    let mut paths: Vec<PathBuf> = Vec::new();

    for entry in targets {
        let text = match entry {
            serde_yaml::Value::String(s) if !s.trim().is_empty() => s.trim(),
            other => {
                invalid.push(describe_value(other));
                continue;
            }
        };
        let path = Path::new(text);
        if !path.is_absolute() {
            relative.push(text.to_string());
            continue;
        }
        paths.push(path.to_path_buf());
    }

    if !invalid.is_empty() {
        return Err(Error::InvalidTarget(invalid));
    }
    if !relative.is_empty() {
        return Err(Error::TargetNotAbsolutePath(relative));
    }

    let missing: Vec<PathBuf> = paths
        .iter()
        .filter(|p| std::fs::symlink_metadata(p).is_err())
        .cloned()
        .collect();

    if !missing.is_empty() {
        if !create {
            return Err(Error::MissingTargets(missing));
        }
        for path in &missing {
            create_directory(path)?;
        }
    }

    Ok(paths)
}

fn create_directory(path: &Path) -> Result<()> {
    use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
    tracing::info!("creating missing target directory {}", path.display());
    let wrap = |source: std::io::Error| Error::CreateTarget {
        path: path.to_path_buf(),
        source,
    };
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o750)
        .create(path)
        .map_err(wrap)?;
    // DirBuilder's mode is filtered through the umask; pin it down.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o750)).map_err(wrap)
}

fn describe_value(value: &serde_yaml::Value) -> String {
    match value {
        serde_yaml::Value::String(s) => format!("{s:?}"),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| "<unrepresentable>".to_string()),
    }
}
