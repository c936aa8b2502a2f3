// ABOUTME: Local storage backend for mock and development runs.
// ABOUTME: Keys are paths relative to the workspace root; files already on disk are used in place.

use super::error::{ForeignHandleSnafu, IoSnafu, RemoteSnafu, Result, TransferSnafu};
use super::{BundleHandle, BundleStorage, ObjectMetadata, StorageBackend};
use crate::config::{Layout, StorageKind};
use crate::ssh::RemoteHost;
use crate::types::RunId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use snafu::ResultExt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct LocalStorage {
    layout: Layout,
}

impl LocalStorage {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.layout.resolve(key)
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

async fn copy_file(from: &Path, to: &Path) -> Result<()> {
    if same_file(from, to) {
        return Ok(());
    }
    if let Some(parent) = to.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context(IoSnafu { path: parent })?;
    }
    tokio::fs::copy(from, to).await.map_err(|e| {
        TransferSnafu {
            operation: "copy",
            location: from.display().to_string(),
            message: e.to_string(),
        }
        .build()
    })?;
    Ok(())
}

#[async_trait]
impl StorageBackend for LocalStorage {
    fn kind(&self) -> StorageKind {
        StorageKind::Local
    }

    fn bundle_key(&self, _run_id: &RunId, filename: &str) -> String {
        format!("{}/{filename}", self.layout.bundle_dir_name())
    }

    fn object_url(&self, key: &str) -> String {
        self.path_for(key).display().to_string()
    }

    fn key_from_url(&self, url: &str) -> Result<String> {
        let path = Path::new(url);
        let relative = path.strip_prefix(self.layout.root()).unwrap_or(path);
        Ok(relative.display().to_string())
    }

    async fn store_bundle(&self, local: &Path, key: &str) -> Result<BundleStorage> {
        copy_file(local, &self.path_for(key)).await?;
        Ok(BundleStorage::Local)
    }

    async fn download_to_server(
        &self,
        host: &dyn RemoteHost,
        bundle: &BundleHandle,
        remote_path: &str,
    ) -> Result<()> {
        if bundle.storage != BundleStorage::Local {
            return ForeignHandleSnafu {
                bundle: bundle.bundle_filename.clone(),
                found: bundle.storage.kind().to_string(),
                expected: self.kind().to_string(),
            }
            .fail();
        }
        let local = self.layout.resolve(&bundle.local_path);
        host.upload(&local, remote_path)
            .await
            .context(RemoteSnafu { host: host.host() })
    }

    async fn upload_file(&self, local: &Path, key: &str) -> Result<String> {
        let dest = self.path_for(key);
        copy_file(local, &dest).await?;
        Ok(dest.display().to_string())
    }

    async fn download_file(&self, key: &str, local: &Path) -> Result<()> {
        let source = self.path_for(key);
        if !source.exists() {
            return TransferSnafu {
                operation: "download",
                location: source.display().to_string(),
                message: "file does not exist",
            }
            .fail();
        }
        copy_file(&source, local).await
    }

    async fn get_metadata(&self, key: &str) -> Result<ObjectMetadata> {
        let path = self.path_for(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) => Ok(ObjectMetadata::Present {
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ObjectMetadata::Absent),
            Err(source) => Err(source).context(IoSnafu { path }),
        }
    }
}
