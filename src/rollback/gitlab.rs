// ABOUTME: GitLab API client for locating and downloading a pipeline's archive job artifacts.
// ABOUTME: Authenticates with the job token inside pipelines or a private token for manual runs.

use super::{Result, RollbackError, io_error};
use crate::context::GitLabAccess;
use crate::types::RunId;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const ARTIFACTS_FILE: &str = "pipeline-artifacts.zip";

/// Source of a past pipeline's archive job artifacts.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Download the artifacts zip of the pipeline's archive job into `dest`.
    async fn download_archive_artifacts(&self, pipeline: &RunId, dest: &Path) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: String,
}

/// Most recent successful job whose name mentions "archive".
pub fn select_archive_job(jobs: &[Job]) -> Option<&Job> {
    jobs.iter()
        .filter(|job| job.name.to_lowercase().contains("archive") && job.status == "success")
        .max_by_key(|job| job.id)
}

pub struct GitLabClient {
    client: reqwest::Client,
    access: GitLabAccess,
}

impl GitLabClient {
    pub fn new(access: GitLabAccess) -> Self {
        Self {
            client: reqwest::Client::new(),
            access,
        }
    }

    fn project_url(&self) -> String {
        format!(
            "{}/projects/{}",
            self.access.api_url,
            urlencoding::encode(&self.access.project_id)
        )
    }

    async fn get(&self, url: &str, operation: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(self.access.token.header_name(), self.access.token.value())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(RollbackError::GitLab {
                operation: operation.to_string(),
                message: format!("{status}: {}", body.trim()),
            });
        }
        Ok(response)
    }

    pub async fn pipeline_jobs(&self, pipeline: &RunId) -> Result<Vec<Job>> {
        let url = format!(
            "{}/pipelines/{pipeline}/jobs?per_page=100",
            self.project_url()
        );
        tracing::info!("fetching jobs from pipeline {pipeline}");
        let jobs: Vec<Job> = self.get(&url, "pipeline job listing").await?.json().await?;
        Ok(jobs)
    }
}

#[async_trait]
impl ArtifactStore for GitLabClient {
    async fn download_archive_artifacts(&self, pipeline: &RunId, dest: &Path) -> Result<PathBuf> {
        let jobs = self.pipeline_jobs(pipeline).await?;
        let job = select_archive_job(&jobs)
            .ok_or_else(|| RollbackError::NoArchiveJob(pipeline.to_string()))?;
        tracing::info!("found archive job {} (#{})", job.name, job.id);

        let url = format!("{}/jobs/{}/artifacts", self.project_url(), job.id);
        let bytes = self.get(&url, "artifact download").await?.bytes().await?;

        tokio::fs::create_dir_all(dest).await.map_err(io_error(dest))?;
        let path = dest.join(ARTIFACTS_FILE);
        tokio::fs::write(&path, &bytes).await.map_err(io_error(&path))?;
        tracing::debug!("downloaded {} bytes of artifacts to {}", bytes.len(), path.display());
        Ok(path)
    }
}
