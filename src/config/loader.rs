//! Job document loading.
//!
//! The document can arrive inline (env var or CLI argument), from a local
//! file, or from a URL. Whichever way it arrives, it is YAML with a
//! top-level `jobs` list.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::job::JobDocument;

pub const ENV_JOBS: &str = "TREEKEEPER_JOBS";
pub const ENV_JOBS_FILE: &str = "TREEKEEPER_JOBS_FILE";
pub const ENV_JOBS_URL: &str = "TREEKEEPER_JOBS_URL";

#[derive(Debug, Clone)]
pub enum JobSource {
    Inline(String),
    File(PathBuf),
    Url(String),
}

impl JobSource {
    /// Pick the job source from CLI arguments, falling back to the
    /// environment. Inline text wins over a file, a file over a URL.
    pub fn resolve(
        inline: Option<String>,
        file: Option<PathBuf>,
        url: Option<String>,
    ) -> Result<Self> {
        if let Some(text) = inline {
            return Ok(JobSource::Inline(text));
        }
        if let Some(path) = file {
            return Ok(JobSource::File(path));
        }
        if let Some(url) = url {
            return Ok(JobSource::Url(url));
        }
        if let Ok(text) = std::env::var(ENV_JOBS) {
            if !text.trim().is_empty() {
                return Ok(JobSource::Inline(text));
            }
        }
        if let Ok(path) = std::env::var(ENV_JOBS_FILE) {
            if !path.trim().is_empty() {
                return Ok(JobSource::File(PathBuf::from(path)));
            }
        }
        if let Ok(url) = std::env::var(ENV_JOBS_URL) {
            if !url.trim().is_empty() {
                return Ok(JobSource::Url(url));
            }
        }
        Err(Error::NoJobSource)
    }
}

/// Fetch and parse the job document from the given source.
pub async fn load_job_document(source: &JobSource) -> Result<JobDocument> {
    let text = match source {
        JobSource::Inline(text) => text.clone(),
        JobSource::File(path) => {
            tracing::debug!("reading job document from {}", path.display());
            tokio::fs::read_to_string(path).await?
        }
        JobSource::Url(url) => {
            tracing::debug!("fetching job document from {url}");
            let response = reqwest::get(url).await.map_err(|e| Error::Fetch {
                url: url.clone(),
                source: e,
            })?;
            let response = response.error_for_status().map_err(|e| Error::Fetch {
                url: url.clone(),
                source: e,
            })?;
            response.text().await.map_err(|e| Error::Fetch {
                url: url.clone(),
                source: e,
            })?
        }
    };

    let document: JobDocument = serde_yaml::from_str(&text)?;
    tracing::debug!("loaded {} job(s)", document.jobs.len());
    Ok(document)
}
