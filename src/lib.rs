//! # Treekeeper
//!
//! Applies bulk ownership and permission jobs to filesystem trees,
//! idempotently and in parallel. Jobs are declared in a YAML document and
//! executed by driving the standard change commands (`chown`, `chgrp`,
//! `chmod`) over `find`-enumerated targets; a necessity check against
//! scratch probe objects keeps already-correct targets untouched.
//!
//! ## Modules
//!
//! - `config` - runtime settings, job-document loading, tool discovery
//! - `job` - job document model and normalization (flags, ownership,
//!   permissions)
//! - `exec` - target materialization, necessity filtering, batched
//!   execution and job orchestration
//! - `subprocess` - unified subprocess abstraction layer for testing
pub mod config;
pub mod error;
pub mod exec;
pub mod job;
pub mod subprocess;

pub use error::{Error, Result};
