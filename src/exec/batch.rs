//! Bounded-parallel batched execution of one change category.
//!
//! Two stages: `find` enumerates the target subset (NUL-delimited so
//! arbitrary file names survive), then the change command runs over the
//! stream in `batch_size` chunks with at most `parallelism` invocations in
//! flight. The pass reports success only after every batch has been
//! join-waited.

use futures::future::join_all;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

use crate::config::{Settings, Toolchain};
use crate::error::{Error, Result};
use crate::exec::{change_command, Category};
use crate::job::Operation;
use crate::subprocess::{ProcessCommandBuilder, SubprocessManager};

pub struct BatchExecutor<'a> {
    pub settings: &'a Settings,
    pub tools: &'a Toolchain,
    pub subprocess: &'a SubprocessManager,
}

impl BatchExecutor<'_> {
    /// Run one category's enumeration+mutation pipeline over its filtered
    /// target subset.
    pub async fn run_category(
        &self,
        operation: &Operation,
        category: Category,
        targets: &[PathBuf],
    ) -> Result<()> {
        if targets.is_empty() {
            return Ok(());
        }

        let paths = self.enumerate(operation, targets).await?;
        if paths.is_empty() {
            tracing::debug!("{} pass: nothing enumerated", category.label());
            return Ok(());
        }
        tracing::debug!(
            "{} pass: {} path(s) in {} batch(es)",
            category.label(),
            paths.len(),
            paths.len().div_ceil(self.settings.batch_size)
        );

        self.mutate(operation, category, &paths).await
    }

    /// Stage one: walk the target roots with `find`, excluding broken
    /// symlinks. A `norecurse` flag bounds the traversal depth to the
    /// roots themselves.
    async fn enumerate(&self, operation: &Operation, targets: &[PathBuf]) -> Result<Vec<PathBuf>> {
        let mut builder = ProcessCommandBuilder::new(&self.tools.find).paths(targets);
        if !operation.flags.recurse {
            builder = builder.args(["-maxdepth", "0"]);
        }
        let cmd = builder.args(["!", "-xtype", "l", "-print0"]).build();

        let output = self.subprocess.runner().run(cmd).await?;
        if !output.status.success() {
            return Err(Error::EnumerationFailed {
                code: output.status.code(),
            });
        }

        Ok(split_nul_stream(&output.stdout))
    }

    /// Stage two: the change command over ordered batches, at most
    /// `parallelism` in flight.
    async fn mutate(
        &self,
        operation: &Operation,
        category: Category,
        paths: &[PathBuf],
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.settings.parallelism));
        let mut futures = Vec::new();
        let mut tool = String::new();

        for chunk in paths.chunks(self.settings.batch_size) {
            let cmd = match change_command(operation, category, self.tools, chunk) {
                Some(cmd) => cmd,
                None => return Ok(()),
            };
            tool = cmd
                .program
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();

            if self.settings.dry_run {
                tracing::info!("dry run, would execute: {}", cmd.display());
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let runner = self.subprocess.runner();
            futures.push(async move {
                let _permit = semaphore.acquire().await.unwrap();
                match runner.run(cmd).await {
                    Ok(output) if output.status.success() => Ok(()),
                    Ok(output) => Err(BatchFailure::Exit(output.status.code())),
                    Err(e) => Err(BatchFailure::Spawn(e)),
                }
            });
        }

        let mut exit_codes = Vec::new();
        for result in join_all(futures).await {
            match result {
                Ok(()) => {}
                Err(BatchFailure::Spawn(e)) => return Err(Error::Process(e)),
                Err(BatchFailure::Exit(code)) => exit_codes.push(code),
            }
        }
        if let Some(first) = exit_codes.first() {
            return Err(Error::MutationFailed {
                tool,
                failures: exit_codes.len(),
                code: *first,
            });
        }
        Ok(())
    }
}

enum BatchFailure {
    Spawn(crate::subprocess::ProcessError),
    Exit(i32),
}

fn split_nul_stream(bytes: &[u8]) -> Vec<PathBuf> {
    use std::ffi::OsString;
    use std::os::unix::ffi::OsStringExt;

    bytes
        .split(|b| *b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(|chunk| PathBuf::from(OsString::from_vec(chunk.to_vec())))
        .collect()
}
