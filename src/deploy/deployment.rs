// ABOUTME: Generic deployment struct parameterized by phase marker.
// ABOUTME: Carries the BOM and the metadata every later phase reads.

use super::metadata::DeploymentMetadata;
use super::state::Archived;
use crate::bom::{Bom, DeploymentKind};
use std::path::{Path, PathBuf};

/// A deployment in progress, parameterized by the last phase it completed.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) bom: Bom,
    pub(crate) bom_file: PathBuf,
    pub(crate) metadata: DeploymentMetadata,
    pub(crate) state: S,
}

impl<S> Deployment<S> {
    pub(crate) fn new(bom: Bom, bom_file: PathBuf, metadata: DeploymentMetadata, state: S) -> Self {
        Deployment {
            bom,
            bom_file,
            metadata,
            state,
        }
    }

    pub(crate) fn transition<T>(self, state: T) -> Deployment<T> {
        Deployment {
            bom: self.bom,
            bom_file: self.bom_file,
            metadata: self.metadata,
            state,
        }
    }

    pub fn bom(&self) -> &Bom {
        &self.bom
    }

    pub fn bom_file(&self) -> &Path {
        &self.bom_file
    }

    pub fn metadata(&self) -> &DeploymentMetadata {
        &self.metadata
    }

    pub fn kind(&self) -> DeploymentKind {
        self.metadata.deployment_type
    }
}

impl Deployment<Archived> {
    pub fn archive_path(&self) -> &Path {
        &self.state.archive_path
    }

    pub fn evidence_path(&self) -> &Path {
        &self.state.evidence_path
    }

    pub fn manifest_path(&self) -> &Path {
        &self.state.manifest_path
    }

    pub fn snapshot_url(&self) -> Option<&str> {
        self.state.snapshot_url.as_deref()
    }
}
