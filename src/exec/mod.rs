//! Job execution: target materialization, necessity filtering, and the
//! batched change-command pipeline.

pub mod batch;
pub mod oracle;
pub mod orchestrator;
pub mod targets;

pub use batch::BatchExecutor;
pub use orchestrator::{JobOutcome, Orchestrator, RunSummary, SkipReason};

use std::path::Path;

use crate::config::Toolchain;
use crate::job::{Operation, OwnershipChange};
use crate::subprocess::{ProcessCommand, ProcessCommandBuilder};

/// The two change categories, processed independently end-to-end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Ownership,
    Permissions,
}

impl Category {
    pub fn label(&self) -> &'static str {
        match self {
            Category::Ownership => "ownership",
            Category::Permissions => "permissions",
        }
    }
}

/// Build the change command for one category over the given paths.
///
/// The oracle probes scratch objects and the batch executor mutates real
/// targets through this same constructor, so predicted and applied
/// attributes cannot drift apart. Returns `None` when the operation does
/// not request the category.
pub fn change_command<P: AsRef<Path>>(
    operation: &Operation,
    category: Category,
    tools: &Toolchain,
    paths: &[P],
) -> Option<ProcessCommand> {
    let flags = &operation.flags;
    match category {
        Category::Ownership => {
            let change = operation.ownership.as_ref()?;
            let tool = match change {
                OwnershipChange::GroupOnly { .. } => &tools.chgrp,
                _ => &tools.chown,
            };
            let mut builder = ProcessCommandBuilder::new(tool)
                .arg(flags.verbosity_flag())
                .arg("--preserve-root");
            if !flags.deref {
                builder = builder.arg("--no-dereference");
            }
            if flags.traverse {
                builder = builder.arg("-H");
            }
            Some(
                builder
                    .arg(&change.command_argument())
                    .paths(paths)
                    .build(),
            )
        }
        Category::Permissions => {
            let change = operation.permissions.as_ref()?;
            Some(
                ProcessCommandBuilder::new(&tools.chmod)
                    .arg(flags.verbosity_flag())
                    .arg("--preserve-root")
                    .arg(&change.command_argument())
                    .paths(paths)
                    .build(),
            )
        }
    }
}
