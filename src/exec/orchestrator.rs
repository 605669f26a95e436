//! Job sequencing and outcome classification.
//!
//! Jobs run strictly one after another. Each job resolves to a tagged
//! outcome; a failed job aborts the run with a job-numbered diagnostic,
//! while skips are logged and the run continues.

use std::path::PathBuf;

use crate::config::{Settings, Toolchain};
use crate::error::{Error, Result};
use crate::exec::oracle::{self, CategorySubsets};
use crate::exec::targets;
use crate::exec::{BatchExecutor, Category};
use crate::job::{JobDocument, JobSpec, Operation};
use crate::subprocess::SubprocessManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The job declared no targets.
    NoTargets,
    /// The job declared neither an ownership nor a permission change.
    NoChanges,
}

impl SkipReason {
    fn describe(&self) -> &'static str {
        match self {
            SkipReason::NoTargets => "no targets declared",
            SkipReason::NoChanges => "no changes requested",
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct JobStats {
    pub targets: usize,
    pub ownership_targets: usize,
    pub permission_targets: usize,
    /// Execution failures swallowed because of reduced privileges.
    pub suppressed_failures: usize,
}

#[derive(Debug)]
pub enum JobOutcome {
    Skipped(SkipReason),
    Succeeded(JobStats),
    Failed(Error),
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
}

pub struct Orchestrator {
    settings: Settings,
    tools: Toolchain,
    subprocess: SubprocessManager,
}

impl Orchestrator {
    pub fn new(settings: Settings, tools: Toolchain, subprocess: SubprocessManager) -> Self {
        Self {
            settings,
            tools,
            subprocess,
        }
    }

    /// Process every job in order. The first failed job aborts the run;
    /// skipped jobs do not affect the overall result.
    pub async fn run(&self, document: &JobDocument) -> Result<RunSummary> {
        let mut summary = RunSummary {
            total: document.jobs.len(),
            ..RunSummary::default()
        };

        for (index, spec) in document.jobs.iter().enumerate() {
            let number = index + 1;
            match self.process_job(spec).await {
                JobOutcome::Skipped(reason) => {
                    tracing::info!("job {number}: skipped ({})", reason.describe());
                    summary.skipped += 1;
                }
                JobOutcome::Succeeded(stats) => {
                    tracing::info!(
                        "job {number}: done ({} target(s), ownership on {}, permissions on {})",
                        stats.targets,
                        stats.ownership_targets,
                        stats.permission_targets
                    );
                    if stats.suppressed_failures > 0 {
                        tracing::warn!(
                            "job {number}: {} failure(s) suppressed in reduced-privilege mode",
                            stats.suppressed_failures
                        );
                    }
                    summary.succeeded += 1;
                }
                JobOutcome::Failed(error) => {
                    return Err(error.for_job(number));
                }
            }
        }

        Ok(summary)
    }

    /// One job: build the operation, materialize targets, filter through
    /// the oracle unless forced, then run the two category passes.
    pub async fn process_job(&self, spec: &JobSpec) -> JobOutcome {
        let operation = match Operation::from_spec(spec) {
            Ok(op) => op,
            Err(e) => return JobOutcome::Failed(e),
        };
        if operation.is_empty() {
            return JobOutcome::Skipped(SkipReason::NoChanges);
        }

        let targets = match targets::materialize(&spec.targets, operation.flags.create) {
            Ok(paths) => paths,
            Err(e) => return JobOutcome::Failed(e),
        };
        if targets.is_empty() {
            return JobOutcome::Skipped(SkipReason::NoTargets);
        }

        let mut stats = JobStats {
            targets: targets.len(),
            ..JobStats::default()
        };

        let subsets = match self.subsets_for(&operation, &targets).await {
            Ok(subsets) => subsets,
            Err(e) if e.is_execution() && self.settings.reduced_privileges => {
                tracing::warn!("necessity probe failed without privileges ({e}), applying to all targets");
                stats.suppressed_failures += 1;
                CategorySubsets::forced(&operation, &targets)
            }
            Err(e) => return JobOutcome::Failed(e),
        };
        stats.ownership_targets = subsets.ownership.len();
        stats.permission_targets = subsets.permissions.len();

        let executor = BatchExecutor {
            settings: &self.settings,
            tools: &self.tools,
            subprocess: &self.subprocess,
        };

        // The two category passes are independent: attempt both even when
        // the first fails.
        let mut first_error: Option<Error> = None;
        for (category, subset) in [
            (Category::Ownership, &subsets.ownership),
            (Category::Permissions, &subsets.permissions),
        ] {
            match executor.run_category(&operation, category, subset).await {
                Ok(()) => {}
                Err(e) if self.settings.reduced_privileges => {
                    tracing::warn!(
                        "{} pass failed without privileges, suppressed: {e}",
                        category.label()
                    );
                    stats.suppressed_failures += 1;
                }
                Err(e) => {
                    tracing::error!("{} pass failed: {e}", category.label());
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }
        if let Some(error) = first_error {
            return JobOutcome::Failed(error);
        }

        JobOutcome::Succeeded(stats)
    }

    async fn subsets_for(
        &self,
        operation: &Operation,
        targets: &[PathBuf],
    ) -> Result<CategorySubsets> {
        if operation.flags.forced {
            tracing::debug!("forced flag set, skipping the necessity check");
            return Ok(CategorySubsets::forced(operation, targets));
        }
        oracle::filter_targets(operation, targets, &self.tools, &self.subprocess).await
    }
}
