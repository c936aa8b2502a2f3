// ABOUTME: Runs kMigrator on the server's SSH host with bundles moved through the storage backend.
// ABOUTME: The per-run remote working directory is removed on success and on failure.

use super::error::{ExecutorError, Result};
use super::{ExecutionMode, Executor, ExecutorDeps, ExtractRequest, ImportRequest};
use crate::config::ServerConfig;
use crate::diagnostics::Warning;
use crate::ssh::{RemoteHost, shell_quote};
use crate::storage::{BundleHandle, BundleStorage};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct RemoteExecutor {
    deps: ExecutorDeps,
}

fn remote_error(
    operation: &str,
    host: &dyn RemoteHost,
) -> impl FnOnce(crate::ssh::Error) -> ExecutorError + use<> {
    let operation = operation.to_string();
    let host = host.host().to_string();
    move |source| ExecutorError::Remote {
        operation,
        host,
        source,
    }
}

/// `KMIGRATOR_EXTRACT_<id>[_<ref>]_<timestamp>.xml`
pub fn bundle_filename(entity_id: &str, reference_code: Option<&str>, timestamp: &str) -> String {
    match reference_code {
        Some(reference_code) => {
            format!("KMIGRATOR_EXTRACT_{entity_id}_{reference_code}_{timestamp}.xml")
        }
        None => format!("KMIGRATOR_EXTRACT_{entity_id}_{timestamp}.xml"),
    }
}

impl RemoteExecutor {
    pub fn new(deps: ExecutorDeps) -> Self {
        Self { deps }
    }

    /// Remote working directory for this run.
    pub fn remote_dir(&self) -> String {
        format!("/tmp/ppm-bundles-{}", self.deps.run_id)
    }

    async fn connect(&self, server: &ServerConfig) -> Result<Box<dyn RemoteHost>> {
        let creds = self.deps.credentials.ssh(server)?;
        self.deps
            .connector
            .connect(server, &creds, &self.deps.ssh)
            .await
            .map_err(|source| ExecutorError::Remote {
                operation: "connect".to_string(),
                host: server
                    .ssh_host
                    .clone()
                    .unwrap_or_else(|| server.name.clone()),
                source,
            })
    }

    /// Remove the working directory and close the session; failures become warnings.
    async fn finish(&self, host: Box<dyn RemoteHost>) {
        let dir = self.remote_dir();
        match host.exec(&format!("rm -rf {}", shell_quote(&dir))).await {
            Ok(output) if output.success() => {
                tracing::debug!("removed {dir} on {}", host.host());
            }
            Ok(output) => self.deps.diagnostics.warn(Warning::remote_cleanup(format!(
                "failed to remove {dir} on {} (exit {}): {}",
                host.host(),
                output.exit_code,
                output.stderr.trim()
            ))),
            Err(e) => self.deps.diagnostics.warn(Warning::remote_cleanup(format!(
                "failed to remove {dir} on {}: {e}",
                host.host()
            ))),
        }

        if let Err(e) = host.disconnect().await {
            self.deps.diagnostics.warn(Warning::ssh_disconnect(format!(
                "failed to disconnect from {}: {e}",
                host.host()
            )));
        }
    }

    async fn extract_on(
        &self,
        host: &dyn RemoteHost,
        request: &ExtractRequest<'_>,
    ) -> Result<BundleHandle> {
        let creds = self.deps.credentials.application(request.server)?;
        let dir = self.remote_dir();
        let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S").to_string();
        let filename = bundle_filename(request.entity_id, request.reference_code, &timestamp);
        let remote_file = format!("{dir}/{filename}");

        host.exec_checked(&format!("mkdir -p {}", shell_quote(&dir)), "mkdir")
            .await
            .map_err(remote_error("mkdir", host))?;

        let mut command = format!(
            "{} -username {} -password {} -url {} -action Bundle -entityId {}",
            shell_quote(request.script),
            shell_quote(&creds.username),
            shell_quote(creds.password()),
            shell_quote(request.url),
            shell_quote(request.entity_id),
        );
        if let Some(reference_code) = request.reference_code {
            command.push_str(&format!(" -referenceCode {}", shell_quote(reference_code)));
        }
        command.push_str(&format!(" -filename {}", shell_quote(&remote_file)));

        let label = format!("kMigrator extract of entity {}", request.entity_id);
        let output = host
            .exec_checked(&command, &label)
            .await
            .map_err(remote_error("extract", host))?;
        for line in output.stdout.lines() {
            tracing::debug!("{label}: {line}");
        }

        let local_dir = self.deps.layout.bundle_dir();
        let local_path = local_dir.join(&filename);
        tokio::fs::create_dir_all(&local_dir)
            .await
            .map_err(|source| ExecutorError::Io {
                path: local_dir.clone(),
                source,
            })?;
        host.download(&remote_file, &local_path)
            .await
            .map_err(remote_error("download", host))?;

        let key = self.deps.storage.bundle_key(&self.deps.run_id, &filename);
        let storage = self.deps.storage.store_bundle(&local_path, &key).await?;

        Ok(BundleHandle {
            bundle_filename: filename.clone(),
            local_path: PathBuf::from(self.deps.layout.bundle_dir_name()).join(&filename),
            storage,
        })
    }

    async fn import_on(&self, host: &dyn RemoteHost, request: &ImportRequest<'_>) -> Result<()> {
        let creds = self.deps.credentials.application(request.server)?;
        let dir = self.remote_dir();
        let remote_file = format!("{dir}/{}", request.bundle.bundle_filename);

        host.exec_checked(&format!("mkdir -p {}", shell_quote(&dir)), "mkdir")
            .await
            .map_err(remote_error("mkdir", host))?;

        match &request.bundle.storage {
            BundleStorage::Local => {
                let local = self.deps.layout.resolve(&request.bundle.local_path);
                if !local.exists() {
                    return Err(ExecutorError::BundleMissing(local));
                }
                host.upload(&local, &remote_file)
                    .await
                    .map_err(remote_error("upload", host))?;
            }
            BundleStorage::S3 { .. } => {
                self.deps
                    .storage
                    .download_to_server(host, request.bundle, &remote_file)
                    .await?;
            }
        }

        let command = format!(
            "{} -username {} -password {} -url {} -action import -filename {} -i18n {} -refdata {} -flags {}",
            shell_quote(request.script),
            shell_quote(&creds.username),
            shell_quote(creds.password()),
            shell_quote(request.url),
            shell_quote(&remote_file),
            request.i18n.as_str(),
            request.refdata.as_str(),
            request.flags.as_str(),
        );
        let label = format!("kMigrator import of {}", request.bundle.bundle_filename);
        let output = host
            .exec_checked(&command, &label)
            .await
            .map_err(remote_error("import", host))?;
        for line in output.stdout.lines() {
            tracing::debug!("{label}: {line}");
        }
        Ok(())
    }
}

#[async_trait]
impl Executor for RemoteExecutor {
    fn mode(&self) -> ExecutionMode {
        ExecutionMode::Remote
    }

    async fn extract(&self, request: &ExtractRequest<'_>) -> Result<BundleHandle> {
        let host = self.connect(request.server).await?;
        tracing::info!(
            "extracting entity {} ({}) from {} (remote via {})",
            request.entity_id,
            request.reference_code.unwrap_or("ALL"),
            request.url,
            host.host()
        );
        let result = self.extract_on(host.as_ref(), request).await;
        self.finish(host).await;
        result
    }

    async fn import_bundle(&self, request: &ImportRequest<'_>) -> Result<()> {
        let host = self.connect(request.server).await?;
        tracing::info!(
            "importing {} to {} (remote via {})",
            request.bundle.bundle_filename,
            request.url,
            host.host()
        );
        let result = self.import_on(host.as_ref(), request).await;
        self.finish(host).await;
        result
    }
}
