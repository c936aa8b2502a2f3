// ABOUTME: Diagnostics accumulator for non-fatal warnings during deployment.
// ABOUTME: Collects warnings that shouldn't fail a deployment but should be shown to users.

use parking_lot::Mutex;

/// Collects non-fatal warnings during deployment operations.
///
/// Shared between the orchestrator, executors and the rollback resolver, so
/// recording a warning only needs `&self`.
#[derive(Default)]
pub struct Diagnostics {
    warnings: Mutex<Vec<Warning>>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.lock().push(warning);
    }

    /// Snapshot of all collected warnings.
    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings.lock().clone()
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.lock().is_empty()
    }
}

/// A non-fatal warning collected during deployment.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Remote working directory could not be removed.
    pub fn remote_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::RemoteCleanup,
            message: message.into(),
        }
    }

    /// Durable snapshot could not be created.
    pub fn snapshot_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SnapshotFailed,
            message: message.into(),
        }
    }

    /// Local temporary files could not be removed.
    pub fn temp_cleanup(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::TempCleanup,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::SshDisconnect,
            message: message.into(),
        }
    }
}

/// Categories of warnings that can occur during deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// `rm -rf` of the remote working directory failed.
    RemoteCleanup,
    /// Snapshot upload failed; the pipeline artifact remains the only rollback source.
    SnapshotFailed,
    /// Local temp directory removal failed.
    TempCleanup,
    /// Failed to cleanly disconnect SSH session.
    SshDisconnect,
}
