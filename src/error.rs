use std::path::PathBuf;
use thiserror::Error;

/// Error taxonomy for the job engine.
///
/// Configuration and validation variants abort the whole run; execution
/// variants abort it unless reduced-privilege suppression is active.
#[derive(Error, Debug)]
pub enum Error {
    #[error("unknown flag(s): {}", .0.join(", "))]
    InvalidFlag(Vec<String>),

    #[error("duplicate flag declaration(s): {}", .0.join(", "))]
    DuplicateFlag(Vec<String>),

    #[error("invalid ownership declaration: {0}")]
    InvalidOwnershipSyntax(String),

    #[error("ownership reference file does not exist: {}", .0.display())]
    MissingOwnershipReference(PathBuf),

    #[error("unknown owner: {0}")]
    UnknownOwner(String),

    #[error("unknown group: {0}")]
    UnknownGroup(String),

    #[error("invalid permission clause(s): {}", .0.join(", "))]
    InvalidPermissionSyntax(Vec<String>),

    #[error("permission reference file does not exist: {}", .0.display())]
    MissingPermissionReference(PathBuf),

    #[error("invalid target(s): {}", .0.join(", "))]
    InvalidTarget(Vec<String>),

    #[error("target(s) not absolute: {}", .0.join(", "))]
    TargetNotAbsolutePath(Vec<String>),

    #[error("target(s) missing and create flag not set: {}", join_paths(.0))]
    MissingTargets(Vec<PathBuf>),

    #[error("failed to create target directory {}: {source}", .path.display())]
    CreateTarget {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("probe of wanted attributes failed: {tool} exited with code {code}")]
    OracleProbeFailed { tool: String, code: i32 },

    #[error("target enumeration failed: find exited with code {code}")]
    EnumerationFailed { code: i32 },

    #[error("{tool} pass failed: {failures} batch(es) exited nonzero, first code {code}")]
    MutationFailed {
        tool: String,
        failures: usize,
        code: i32,
    },

    #[error("required tool not found on PATH: {0}")]
    ToolNotFound(String),

    #[error("no job source configured: pass --jobs, --jobs-file or --jobs-url")]
    NoJobSource,

    #[error("invalid configuration value for {name}: {value}")]
    InvalidSetting { name: String, value: String },

    #[error("failed to fetch job document from {url}: {source}")]
    Fetch {
        url: String,
        source: reqwest::Error,
    },

    #[error("job {number}: {source}")]
    Job {
        number: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("subprocess error: {0}")]
    Process(#[from] crate::subprocess::ProcessError),
}

fn join_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Attach the 1-based job number the error surfaced in.
    pub fn for_job(self, number: usize) -> Self {
        match self {
            Error::Job { .. } => self,
            other => Error::Job {
                number,
                source: Box::new(other),
            },
        }
    }

    /// True for errors caused by the job document or environment rather
    /// than by executing change commands.
    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Job { source, .. } => source.is_configuration(),
            Error::OracleProbeFailed { .. }
            | Error::EnumerationFailed { .. }
            | Error::MutationFailed { .. }
            | Error::Process(_) => false,
            _ => true,
        }
    }

    /// True for failures of the probe/enumeration/mutation pipeline, the
    /// kind suppressed when running without full privileges.
    pub fn is_execution(&self) -> bool {
        match self {
            Error::Job { source, .. } => source.is_execution(),
            Error::OracleProbeFailed { .. }
            | Error::EnumerationFailed { .. }
            | Error::MutationFailed { .. }
            | Error::Process(_) => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
