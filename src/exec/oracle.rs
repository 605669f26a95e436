//! The necessity oracle.
//!
//! Instead of reimplementing chown/chmod semantics to predict what a
//! target would look like after a change, the oracle applies the job's
//! actual change commands to one scratch file and one scratch directory,
//! then stats those to learn the wanted owner/group/mode per file type.
//! Real targets whose current attributes already match are dropped from
//! the corresponding pass.
//!
//! The scratch objects are owned by `tempfile` guards, so they are removed
//! on every exit path, including probe failure.

use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;

use crate::config::Toolchain;
use crate::error::{Error, Result};
use crate::exec::{change_command, Category};
use crate::job::Operation;
use crate::subprocess::SubprocessManager;

/// Wanted post-change attributes for one file type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WantedAttrs {
    pub uid: u32,
    pub gid: u32,
    pub mode: u32,
}

impl WantedAttrs {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
            mode: meta.mode() & 0o7777,
        }
    }

    /// Rendering compared between wanted and current state, and shown in
    /// debug logs.
    pub fn mode_string(&self) -> String {
        format!("{:04o}", self.mode)
    }
}

/// Per-category subsets of targets that actually need their pass.
#[derive(Debug, Default)]
pub struct CategorySubsets {
    pub ownership: Vec<PathBuf>,
    pub permissions: Vec<PathBuf>,
}

impl CategorySubsets {
    /// Forced mode: every target lands in every requested category.
    pub fn forced(operation: &Operation, targets: &[PathBuf]) -> Self {
        Self {
            ownership: if operation.ownership.is_some() {
                targets.to_vec()
            } else {
                Vec::new()
            },
            permissions: if operation.permissions.is_some() {
                targets.to_vec()
            } else {
                Vec::new()
            },
        }
    }
}

/// Probe the wanted state on scratch objects and compare every target
/// against it.
pub async fn filter_targets(
    operation: &Operation,
    targets: &[PathBuf],
    tools: &Toolchain,
    subprocess: &SubprocessManager,
) -> Result<CategorySubsets> {
    let scratch_file = tempfile::NamedTempFile::new()?;
    let scratch_dir = tempfile::tempdir()?;
    let scratch_paths = [
        scratch_file.path().to_path_buf(),
        scratch_dir.path().to_path_buf(),
    ];

    for category in [Category::Ownership, Category::Permissions] {
        if let Some(cmd) = change_command(operation, category, tools, &scratch_paths) {
            let tool = cmd.program.clone();
            let output = subprocess.runner().run(cmd).await?;
            if !output.status.success() {
                return Err(Error::OracleProbeFailed {
                    tool: tool.display().to_string(),
                    code: output.status.code(),
                });
            }
        }
    }

    let wanted_file = WantedAttrs::from_metadata(&std::fs::metadata(scratch_file.path())?);
    let wanted_dir = WantedAttrs::from_metadata(&std::fs::metadata(scratch_dir.path())?);
    tracing::debug!(
        "wanted state: file {}:{} mode {}, dir {}:{} mode {}",
        wanted_file.uid,
        wanted_file.gid,
        wanted_file.mode_string(),
        wanted_dir.uid,
        wanted_dir.gid,
        wanted_dir.mode_string()
    );

    let mut subsets = CategorySubsets::default();
    for target in targets {
        let meta = stat_target(target, operation.flags.deref);
        let meta = match meta {
            Some(meta) => meta,
            None => {
                // Target vanished between materialization and now; let the
                // passes deal with it.
                tracing::debug!("could not stat {}, keeping it in all passes", target.display());
                if operation.ownership.is_some() {
                    subsets.ownership.push(target.clone());
                }
                if operation.permissions.is_some() {
                    subsets.permissions.push(target.clone());
                }
                continue;
            }
        };

        // Symlinks and regular files share the file pattern; only real
        // directories compare against the directory pattern.
        let wanted = if meta.is_dir() { wanted_dir } else { wanted_file };

        if let Some(change) = &operation.ownership {
            let owner_differs = change.changes_owner() && meta.uid() != wanted.uid;
            let group_differs = meta.gid() != wanted.gid;
            if owner_differs || group_differs {
                subsets.ownership.push(target.clone());
            }
        }
        if operation.permissions.is_some() {
            let current = WantedAttrs::from_metadata(&meta);
            if current.mode_string() != wanted.mode_string() {
                subsets.permissions.push(target.clone());
            }
        }
    }

    tracing::debug!(
        "necessity filter kept {}/{} for ownership, {}/{} for permissions",
        subsets.ownership.len(),
        targets.len(),
        subsets.permissions.len(),
        targets.len()
    );
    Ok(subsets)
}

fn stat_target(path: &std::path::Path, deref: bool) -> Option<std::fs::Metadata> {
    if deref {
        // A dangling symlink still has link metadata to compare.
        std::fs::metadata(path)
            .or_else(|_| std::fs::symlink_metadata(path))
            .ok()
    } else {
        std::fs::symlink_metadata(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobSpec;

    fn operation(yaml: &str) -> Operation {
        let spec: JobSpec = serde_yaml::from_str(yaml).unwrap();
        Operation::from_spec(&spec).unwrap()
    }

    #[test]
    fn forced_subsets_cover_every_requested_category() {
        let op = operation(r#"{ownership: "0:0", permissions: "0750"}"#);
        let targets = vec![PathBuf::from("/a"), PathBuf::from("/b")];
        let subsets = CategorySubsets::forced(&op, &targets);
        assert_eq!(subsets.ownership, targets);
        assert_eq!(subsets.permissions, targets);
    }

    #[test]
    fn forced_subsets_skip_unrequested_categories() {
        let op = operation(r#"{permissions: "0750"}"#);
        let targets = vec![PathBuf::from("/a")];
        let subsets = CategorySubsets::forced(&op, &targets);
        assert!(subsets.ownership.is_empty());
        assert_eq!(subsets.permissions, targets);
    }

    #[tokio::test]
    async fn probe_failure_surfaces_as_fatal_and_cleans_up() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("chown").returns_exit_code(1).finish();

        let op = operation(r#"{ownership: "0:0"}"#);
        let err = filter_targets(&op, &[], &Toolchain::unresolved(), &subprocess)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::OracleProbeFailed { code: 1, .. }));

        // The scratch paths the probe ran against must be gone again.
        let probe_calls = mock.calls_to("chown");
        assert_eq!(probe_calls.len(), 1);
        for path in probe_calls[0].args.iter().skip(3) {
            assert!(
                std::fs::symlink_metadata(path).is_err(),
                "scratch object {path} survived"
            );
        }
    }

    #[tokio::test]
    async fn matching_targets_are_filtered_out() {
        // Ask for the mode the scratch objects already have: with a mocked
        // (no-op) chmod the wanted state equals the current state, so
        // nothing needs the pass.
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("chmod").returns_exit_code(0).finish();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        std::fs::set_permissions(
            &file,
            std::os::unix::fs::PermissionsExt::from_mode(0o600),
        )
        .unwrap();

        let op = operation(r#"{permissions: "0600"}"#);
        let subsets = filter_targets(
            &op,
            &[file.clone()],
            &Toolchain::unresolved(),
            &subprocess,
        )
        .await
        .unwrap();

        // Scratch file mode (0600 by tempfile default) matches the target.
        assert!(subsets.permissions.is_empty());
        assert!(subsets.ownership.is_empty());
    }

    #[tokio::test]
    async fn mismatched_targets_stay_in_their_category() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("chmod").returns_exit_code(0).finish();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();
        std::fs::set_permissions(
            &file,
            std::os::unix::fs::PermissionsExt::from_mode(0o644),
        )
        .unwrap();

        let op = operation(r#"{permissions: "0600"}"#);
        let subsets = filter_targets(
            &op,
            &[file.clone()],
            &Toolchain::unresolved(),
            &subprocess,
        )
        .await
        .unwrap();

        // Target is 0644, scratch file is 0600: permission pass needed.
        assert_eq!(subsets.permissions, vec![file]);
    }

    #[tokio::test]
    async fn directories_compare_against_the_directory_pattern() {
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("chmod").returns_exit_code(0).finish();

        // tempfile scratch: file 0600, dir 0700. A 0700 target directory
        // matches the dir pattern even though it differs from the file one.
        let dir = tempfile::tempdir().unwrap();
        let subdir = dir.path().join("d");
        std::fs::create_dir(&subdir).unwrap();
        std::fs::set_permissions(
            &subdir,
            std::os::unix::fs::PermissionsExt::from_mode(0o700),
        )
        .unwrap();

        let op = operation(r#"{permissions: "u+rwX"}"#);
        let subsets = filter_targets(
            &op,
            &[subdir.clone()],
            &Toolchain::unresolved(),
            &subprocess,
        )
        .await
        .unwrap();
        assert!(subsets.permissions.is_empty());
    }

    #[tokio::test]
    async fn group_only_change_skips_owner_comparison() {
        // No probe command runs for a group change against our own gid, so
        // the scratch gid equals the target gid and owner uid differences
        // are ignored entirely.
        let (subprocess, mock) = SubprocessManager::mock();
        mock.expect_command("chgrp").returns_exit_code(0).finish();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f");
        std::fs::write(&file, b"x").unwrap();

        let gid = nix::unistd::getegid().as_raw();
        let op = operation(&format!(r#"{{ownership: ":{gid}"}}"#));
        let subsets = filter_targets(
            &op,
            &[file.clone()],
            &Toolchain::unresolved(),
            &subprocess,
        )
        .await
        .unwrap();
        assert!(subsets.ownership.is_empty());
    }
}
