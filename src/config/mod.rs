//! Runtime settings for the engine.
//!
//! Everything the executor and orchestrator need to know about their
//! environment lives in one [`Settings`] value built at startup and passed
//! down explicitly. There is no process-global configuration.

pub mod loader;
pub mod tools;

pub use loader::{JobSource, load_job_document};
pub use tools::Toolchain;

use crate::error::{Error, Result};

pub const DEFAULT_PARALLELISM: usize = 4;
pub const MIN_PARALLELISM: usize = 1;
pub const MAX_PARALLELISM: usize = 32;

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 1000;

pub const ENV_PARALLELISM: &str = "TREEKEEPER_PARALLELISM";
pub const ENV_BATCH_SIZE: &str = "TREEKEEPER_BATCH_SIZE";
pub const ENV_DRY_RUN: &str = "TREEKEEPER_DRY_RUN";
pub const ENV_UNPRIVILEGED: &str = "TREEKEEPER_UNPRIVILEGED";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Maximum number of change-command batches in flight at once.
    pub parallelism: usize,
    /// Maximum number of paths handed to one change-command invocation.
    pub batch_size: usize,
    /// Validate and probe, but never invoke a change command on a real
    /// target.
    pub dry_run: bool,
    /// Running without full privileges: change-command failures are
    /// expected noise and get suppressed instead of aborting the run.
    pub reduced_privileges: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            parallelism: DEFAULT_PARALLELISM,
            batch_size: DEFAULT_BATCH_SIZE,
            dry_run: false,
            reduced_privileges: false,
        }
    }
}

impl Settings {
    /// Build settings from the process environment. Out-of-range numeric
    /// values clamp to the documented bounds; unparsable values are a
    /// configuration error.
    pub fn from_env() -> Result<Self> {
        let mut settings = Settings::default();

        if let Some(value) = read_env(ENV_PARALLELISM)? {
            settings.parallelism = clamp_setting(
                ENV_PARALLELISM,
                parse_usize(ENV_PARALLELISM, &value)?,
                MIN_PARALLELISM,
                MAX_PARALLELISM,
            );
        }
        if let Some(value) = read_env(ENV_BATCH_SIZE)? {
            settings.batch_size = clamp_setting(
                ENV_BATCH_SIZE,
                parse_usize(ENV_BATCH_SIZE, &value)?,
                MIN_BATCH_SIZE,
                MAX_BATCH_SIZE,
            );
        }
        if let Some(value) = read_env(ENV_DRY_RUN)? {
            settings.dry_run = parse_bool(ENV_DRY_RUN, &value)?;
        }
        if let Some(value) = read_env(ENV_UNPRIVILEGED)? {
            settings.reduced_privileges = parse_bool(ENV_UNPRIVILEGED, &value)?;
        }

        Ok(settings)
    }
}

fn read_env(name: &str) -> Result<Option<String>> {
    match std::env::var(name) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(std::env::VarError::NotUnicode(_)) => Err(Error::InvalidSetting {
            name: name.to_string(),
            value: "<non-unicode>".to_string(),
        }),
    }
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value.trim().parse().map_err(|_| Error::InvalidSetting {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::InvalidSetting {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn clamp_setting(name: &str, value: usize, min: usize, max: usize) -> usize {
    let clamped = value.clamp(min, max);
    if clamped != value {
        tracing::warn!("{name}={value} out of range, clamped to {clamped}");
    }
    clamped
}
