// ABOUTME: Runs kMigrator scripts as local child processes (mock mode).
// ABOUTME: Extracted bundles are located from script output, falling back to the newest matching file.

use super::error::{ExecutorError, Result};
use super::{ExecutionMode, Executor, ExtractRequest, ImportRequest, parse_bundle_path};
use crate::config::Layout;
use crate::credentials::CredentialResolver;
use crate::storage::{BundleHandle, BundleStorage};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use std::time::SystemTime;
use tokio::process::Command;

pub struct LocalExecutor {
    layout: Layout,
    credentials: CredentialResolver,
}

impl LocalExecutor {
    pub fn new(layout: Layout, credentials: CredentialResolver) -> Self {
        Self {
            layout,
            credentials,
        }
    }

    async fn run_script(&self, script: &str, args: &[&str], operation: &str) -> Result<Output> {
        let output = Command::new("bash")
            .arg(script)
            .args(args)
            .current_dir(self.layout.root())
            .output()
            .await
            .map_err(|source| ExecutorError::Spawn {
                program: format!("bash {script}"),
                source,
            })?;

        for line in String::from_utf8_lossy(&output.stdout).lines() {
            tracing::debug!("{operation}: {line}");
        }

        if !output.status.success() {
            return Err(ExecutorError::CommandFailed {
                operation: operation.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }

    /// Newest `KMIGRATOR_EXTRACT_<id>_*.xml` in the bundle directory.
    fn newest_bundle(&self, entity_id: &str) -> Result<Option<PathBuf>> {
        let dir = self.layout.bundle_dir();
        let prefix = format!("KMIGRATOR_EXTRACT_{entity_id}_");
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(ExecutorError::Io { path: dir, source }),
        };

        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in entries {
            let entry = entry.map_err(|source| ExecutorError::Io {
                path: dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !(name.starts_with(&prefix) && name.ends_with(".xml")) {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
                newest = Some((modified, entry.path()));
            }
        }
        Ok(newest.map(|(_, path)| path))
    }
}

fn handle_for(path: PathBuf) -> BundleHandle {
    let bundle_filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    BundleHandle {
        bundle_filename,
        local_path: path,
        storage: BundleStorage::Local,
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Local
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BundleHandle> {
        let creds = self.credentials.application(request.server)?;
        let mut args = vec![
            "-username",
            creds.username.as_str(),
            "-password",
            creds.password(),
            "-url",
            request.url,
            "-action",
            "Bundle",
            "-entityId",
            request.entity_id,
        ];
        if let Some(reference_code) = request.reference_code {
            args.extend(["-referenceCode", reference_code]);
        }

        tracing::info!(
            "extracting entity {} ({}) from {} (local)",
            request.entity_id,
            request.reference_code.unwrap_or("ALL"),
            request.url
        );
        let label = format!("kMigrator extract of entity {}", request.entity_id);
        let output = self.run_script(request.script, &args, &label).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if let Some(path) = parse_bundle_path(&stdout) {
            return Ok(handle_for(PathBuf::from(path)));
        }

        tracing::debug!("no bundle marker in output, searching bundle directory");
        match self.newest_bundle(request.entity_id)? {
            Some(path) => Ok(handle_for(path)),
            None => Err(ExecutorError::BundleNotFound {
                entity_id: request.entity_id.to_string(),
                pattern: self
                    .layout
                    .bundle_dir()
                    .join(format!("KMIGRATOR_EXTRACT_{}_*.xml", request.entity_id))
                    .display()
                    .to_string(),
            }),
        }
    }

    async fn import_bundle(&self, request: &ImportRequest<'_>) -> Result<()> {
        let local = self.layout.resolve(&request.bundle.local_path);
        if !local.exists() {
            return Err(ExecutorError::BundleMissing(local));
        }

        let creds = self.credentials.application(request.server)?;
        let filename = request.bundle.local_path.display().to_string();
        let args = [
            "-username",
            creds.username.as_str(),
            "-password",
            creds.password(),
            "-url",
            request.url,
            "-action",
            "import",
            "-filename",
            filename.as_str(),
            "-i18n",
            request.i18n.as_str(),
            "-refdata",
            request.refdata.as_str(),
            "-flags",
            request.flags.as_str(),
        ];

        tracing::info!("importing {} to {} (local)", request.bundle.bundle_filename, request.url);
        let label = format!("kMigrator import of {}", request.bundle.bundle_filename);
        self.run_script(request.script, &args, &label).await?;
        Ok(())
    }
}
