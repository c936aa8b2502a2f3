// ABOUTME: Deployment phase markers for the type state pattern.
// ABOUTME: A phase can only run on a deployment that completed the phase before it.

use std::path::PathBuf;

/// Bundles extracted and metadata written.
/// Available actions: `import()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Extracted;

/// Bundles imported into the target server.
/// Available actions: `archive()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Imported;

/// Archive, evidence and rollback manifest written; bundles removed.
#[derive(Debug, Clone)]
pub struct Archived {
    pub archive_path: PathBuf,
    pub evidence_path: PathBuf,
    pub manifest_path: PathBuf,
    /// Durable snapshot prefix, when one was uploaded.
    pub snapshot_url: Option<String>,
}
