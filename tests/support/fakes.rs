// ABOUTME: In-process fakes for the seams the pipeline talks through.
// ABOUTME: A scripted SSH host, a directory-backed durable store, and a GitLab artifact store.

use async_trait::async_trait;
use parking_lot::Mutex;
use ppmdeploy::config::{ServerConfig, SshSettings, StorageKind};
use ppmdeploy::credentials::Credentials;
use ppmdeploy::rollback::{ArtifactStore, RollbackError};
use ppmdeploy::ssh::{CommandOutput, HostConnector, RemoteHost};
use ppmdeploy::storage::{
    BundleHandle, BundleStorage, ObjectMetadata, StorageBackend, StorageError,
};
use ppmdeploy::types::RunId;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// Remote host
// =============================================================================

/// Shared record of everything done to the fake host.
#[derive(Default)]
pub struct HostLog {
    pub commands: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
    pub connects: Mutex<Vec<String>>,
    pub disconnects: Mutex<usize>,
    /// Commands containing this text exit non-zero.
    pub fail_on: Mutex<Option<String>>,
}

impl HostLog {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().clone()
    }

    pub fn fail_on(&self, needle: &str) {
        *self.fail_on.lock() = Some(needle.to_string());
    }
}

pub struct FakeHost {
    name: String,
    log: Arc<HostLog>,
}

#[async_trait]
impl RemoteHost for FakeHost {
    fn host(&self) -> &str {
        &self.name
    }

    async fn exec(&self, command: &str) -> ppmdeploy::ssh::Result<CommandOutput> {
        self.log.commands.lock().push(command.to_string());
        let fails = self
            .log
            .fail_on
            .lock()
            .as_deref()
            .is_some_and(|needle| command.contains(needle));
        Ok(if fails {
            CommandOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "permission denied".to_string(),
            }
        } else {
            CommandOutput {
                exit_code: 0,
                stdout: "ok\n".to_string(),
                stderr: String::new(),
            }
        })
    }

    async fn upload(&self, _local: &Path, remote: &str) -> ppmdeploy::ssh::Result<()> {
        self.log.uploads.lock().push(remote.to_string());
        Ok(())
    }

    async fn download(&self, remote: &str, local: &Path) -> ppmdeploy::ssh::Result<()> {
        self.log.downloads.lock().push(remote.to_string());
        if let Some(parent) = local.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(local, format!("<bundle remote=\"{remote}\"/>")).unwrap();
        Ok(())
    }

    async fn disconnect(&self) -> ppmdeploy::ssh::Result<()> {
        *self.log.disconnects.lock() += 1;
        Ok(())
    }
}

/// Hands out [`FakeHost`]s that all write to one [`HostLog`].
#[derive(Default)]
pub struct FakeConnector {
    pub log: Arc<HostLog>,
}

#[async_trait]
impl HostConnector for FakeConnector {
    async fn connect(
        &self,
        server: &ServerConfig,
        credentials: &Credentials,
        _settings: &SshSettings,
    ) -> ppmdeploy::ssh::Result<Box<dyn RemoteHost>> {
        self.log
            .connects
            .lock()
            .push(format!("{}@{}", credentials.username, server.name));
        Ok(Box::new(FakeHost {
            name: server.ssh_host.clone().unwrap_or_default(),
            log: self.log.clone(),
        }))
    }
}

// =============================================================================
// Durable storage
// =============================================================================

/// Object storage kept in a local directory, reporting itself as S3.
pub struct DirStorage {
    root: PathBuf,
    /// Uploads fail with this message when set.
    pub fail_uploads: Mutex<Option<String>>,
}

impl DirStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            fail_uploads: Mutex::new(None),
        }
    }

    pub fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.object_path(key).is_file()
    }

    fn copy(&self, from: &Path, to: &Path) -> ppmdeploy::storage::Result<()> {
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::copy(from, to)
            .map(|_| ())
            .map_err(|e| StorageError::Transfer {
                operation: "copy",
                location: from.display().to_string(),
                message: format!("NoSuchKey: {e}"),
            })
    }
}

#[async_trait]
impl StorageBackend for DirStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    fn bundle_key(&self, run_id: &RunId, filename: &str) -> String {
        format!("bundles/{run_id}/{filename}")
    }

    fn object_url(&self, key: &str) -> String {
        format!("s3://fake-bucket/{key}")
    }

    fn key_from_url(&self, url: &str) -> ppmdeploy::storage::Result<String> {
        url.strip_prefix("s3://fake-bucket/")
            .map(str::to_string)
            .ok_or_else(|| StorageError::ForeignUrl {
                url: url.to_string(),
                backend: "s3://fake-bucket/".to_string(),
            })
    }

    async fn store_bundle(
        &self,
        local: &Path,
        key: &str,
    ) -> ppmdeploy::storage::Result<BundleStorage> {
        self.upload_file(local, key).await?;
        Ok(BundleStorage::S3 {
            bucket: "fake-bucket".to_string(),
            key: key.to_string(),
            url: self.object_url(key),
        })
    }

    async fn download_to_server(
        &self,
        host: &dyn RemoteHost,
        bundle: &BundleHandle,
        remote_path: &str,
    ) -> ppmdeploy::storage::Result<()> {
        let BundleStorage::S3 { key, .. } = &bundle.storage else {
            return Err(StorageError::ForeignHandle {
                bundle: bundle.bundle_filename.clone(),
                found: bundle.storage.kind().to_string(),
                expected: "s3".to_string(),
            });
        };
        host.upload(&self.object_path(key), remote_path)
            .await
            .map_err(|source| StorageError::Remote {
                host: host.host().to_string(),
                source,
            })
    }

    async fn upload_file(&self, local: &Path, key: &str) -> ppmdeploy::storage::Result<String> {
        if let Some(message) = self.fail_uploads.lock().clone() {
            return Err(StorageError::Transfer {
                operation: "upload",
                location: self.object_url(key),
                message,
            });
        }
        self.copy(local, &self.object_path(key))?;
        Ok(self.object_url(key))
    }

    async fn download_file(&self, key: &str, local: &Path) -> ppmdeploy::storage::Result<()> {
        self.copy(&self.object_path(key), local)
    }

    async fn get_metadata(&self, key: &str) -> ppmdeploy::storage::Result<ObjectMetadata> {
        Ok(match std::fs::metadata(self.object_path(key)) {
            Ok(meta) => ObjectMetadata::Present {
                size: meta.len(),
                modified: None,
            },
            Err(_) => ObjectMetadata::Absent,
        })
    }
}

// =============================================================================
// Pipeline artifacts
// =============================================================================

/// Artifact store serving a zip of the given workspace files, or refusing.
pub struct FakeArtifacts {
    /// `(entry name, local file)` pairs packed into the artifacts zip.
    entries: Vec<(String, PathBuf)>,
    pub requests: Mutex<Vec<String>>,
}

impl FakeArtifacts {
    /// Store with no archive job for any pipeline.
    pub fn unavailable() -> Self {
        Self {
            entries: Vec::new(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn serving(entries: Vec<(String, PathBuf)>) -> Self {
        Self {
            entries,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifacts {
    async fn download_archive_artifacts(
        &self,
        pipeline: &RunId,
        dest: &Path,
    ) -> ppmdeploy::rollback::Result<PathBuf> {
        self.requests.lock().push(pipeline.to_string());
        if self.entries.is_empty() {
            return Err(RollbackError::NoArchiveJob(pipeline.to_string()));
        }

        std::fs::create_dir_all(dest).unwrap();
        let path = dest.join("pipeline-artifacts.zip");
        let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (name, file) in &self.entries {
            zip.start_file(name.as_str(), zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(&std::fs::read(file).unwrap()).unwrap();
        }
        zip.finish().unwrap();
        Ok(path)
    }
}
