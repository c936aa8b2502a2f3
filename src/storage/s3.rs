// ABOUTME: S3-compatible storage backend driven through the aws command line client.
// ABOUTME: Remote transfers stage through a per-transfer temp directory that is always removed.

use super::error::{
    ForeignHandleSnafu, ForeignUrlSnafu, IoSnafu, MetadataSnafu, MissingCredentialsSnafu,
    RemoteSnafu, Result, SpawnSnafu, TransferSnafu,
};
use super::{
    BundleHandle, BundleStorage, ObjectMetadata, StorageBackend, transfer_tempdir,
};
use crate::config::{S3Config, StorageKind};
use crate::context::RunContext;
use crate::ssh::RemoteHost;
use crate::types::RunId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::process::Output;
use tokio::process::Command;

pub struct S3Storage {
    config: S3Config,
    access_key: String,
    secret_key: String,
    transfer_dir: PathBuf,
}

impl std::fmt::Debug for S3Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Storage")
            .field("bucket", &self.config.bucket_name)
            .field("region", &self.config.region)
            .field("endpoint_url", &self.config.endpoint_url)
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct HeadObject {
    content_length: u64,
    #[serde(default)]
    last_modified: Option<String>,
}

fn command_summary(out: &Output) -> String {
    let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
    if !stderr.is_empty() {
        return stderr;
    }
    let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
    if !stdout.is_empty() {
        return stdout;
    }
    format!("status {}", out.status)
}

fn is_not_found(message: &str) -> bool {
    message.contains("404") || message.contains("Not Found") || message.contains("NoSuchKey")
}

impl S3Storage {
    /// Fails when either credential variable named in the config is unset.
    pub fn new(config: &S3Config, ctx: &RunContext, transfer_dir: PathBuf) -> Result<Self> {
        let access_key = ctx
            .var(&config.access_key_env)
            .context(MissingCredentialsSnafu {
                var: config.access_key_env.as_str(),
            })?
            .to_string();
        let secret_key = ctx
            .var(&config.secret_key_env)
            .context(MissingCredentialsSnafu {
                var: config.secret_key_env.as_str(),
            })?
            .to_string();

        Ok(Self {
            config: config.clone(),
            access_key,
            secret_key,
            transfer_dir,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.config.bucket_name
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.cli);
        cmd.env("AWS_ACCESS_KEY_ID", &self.access_key)
            .env("AWS_SECRET_ACCESS_KEY", &self.secret_key)
            .arg("--region")
            .arg(&self.config.region);
        if let Some(endpoint) = self
            .config
            .endpoint_url
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            cmd.arg("--endpoint-url").arg(endpoint);
        }
        cmd
    }

    async fn run(&self, mut cmd: Command) -> Result<Output> {
        cmd.output().await.context(SpawnSnafu {
            program: self.config.cli.as_str(),
        })
    }

    async fn copy(&self, operation: &'static str, from: &str, to: &str, location: &str) -> Result<()> {
        let mut cmd = self.command();
        cmd.arg("s3").arg("cp").arg("--only-show-errors").arg(from).arg(to);
        tracing::debug!("{operation}: {from} -> {to}");
        let out = self.run(cmd).await?;
        if !out.status.success() {
            return TransferSnafu {
                operation,
                location,
                message: command_summary(&out),
            }
            .fail();
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    fn bundle_key(&self, run_id: &RunId, filename: &str) -> String {
        format!("{}{run_id}/{filename}", self.config.prefix)
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://{}/{key}", self.config.bucket_name)
    }

    fn key_from_url(&self, url: &str) -> Result<String> {
        let prefix = format!("s3://{}/", self.config.bucket_name);
        url.strip_prefix(&prefix)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .context(ForeignUrlSnafu {
                url,
                backend: prefix.as_str(),
            })
    }

    async fn store_bundle(&self, local: &Path, key: &str) -> Result<BundleStorage> {
        let url = self.upload_file(local, key).await?;
        Ok(BundleStorage::S3 {
            bucket: self.config.bucket_name.clone(),
            key: key.to_string(),
            url,
        })
    }

    async fn download_to_server(
        &self,
        host: &dyn RemoteHost,
        bundle: &BundleHandle,
        remote_path: &str,
    ) -> Result<()> {
        let BundleStorage::S3 { key, .. } = &bundle.storage else {
            return ForeignHandleSnafu {
                bundle: bundle.bundle_filename.clone(),
                found: bundle.storage.kind().to_string(),
                expected: self.kind().to_string(),
            }
            .fail();
        };

        let temp = transfer_tempdir(&self.transfer_dir, "s3-download-")?;
        let staged = temp.path().join(&bundle.bundle_filename);
        self.download_file(key, &staged).await?;
        host.upload(&staged, remote_path)
            .await
            .context(RemoteSnafu { host: host.host() })?;

        if let Err(e) = temp.close() {
            tracing::warn!("failed to remove transfer temp dir: {e}");
        }
        Ok(())
    }

    async fn upload_file(&self, local: &Path, key: &str) -> Result<String> {
        let url = self.object_url(key);
        let from = local.display().to_string();
        self.copy("upload", &from, &url, &url).await?;
        tracing::info!("uploaded {from} to {url}");
        Ok(url)
    }

    async fn download_file(&self, key: &str, local: &Path) -> Result<()> {
        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .context(IoSnafu { path: parent })?;
        }
        let url = self.object_url(key);
        self.copy("download", &url, &local.display().to_string(), &url)
            .await
    }

    async fn get_metadata(&self, key: &str) -> Result<ObjectMetadata> {
        let mut cmd = self.command();
        cmd.arg("s3api")
            .arg("head-object")
            .arg("--bucket")
            .arg(&self.config.bucket_name)
            .arg("--key")
            .arg(key)
            .arg("--output")
            .arg("json");
        let out = self.run(cmd).await?;
        let location = self.object_url(key);

        if !out.status.success() {
            let message = command_summary(&out);
            if is_not_found(&message) {
                return Ok(ObjectMetadata::Absent);
            }
            return MetadataSnafu { location, message }.fail();
        }

        let head: HeadObject = serde_json::from_slice(&out.stdout).map_err(|e| {
            MetadataSnafu {
                location: location.clone(),
                message: e.to_string(),
            }
            .build()
        })?;
        let modified = head
            .last_modified
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(ObjectMetadata::Present {
            size: head.content_length,
            modified,
        })
    }
}
