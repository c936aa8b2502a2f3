// ABOUTME: Storage error types with SNAFU pattern.
// ABOUTME: Every failure names the operation and the exact location involved.

use crate::error::ErrorKind;
use snafu::Snafu;
use std::path::PathBuf;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    #[snafu(display("S3 credentials not set: environment variable {var} is missing or empty"))]
    MissingCredentials { var: String },

    #[snafu(display("{operation} failed for {location}: {message}"))]
    Transfer {
        operation: &'static str,
        location: String,
        message: String,
    },

    #[snafu(display("failed to run {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("I/O error at {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[snafu(display("transfer with {host} failed: {source}"))]
    Remote {
        host: String,
        source: crate::ssh::Error,
    },

    #[snafu(display("{url} does not belong to the {backend} backend"))]
    ForeignUrl { url: String, backend: String },

    #[snafu(display(
        "bundle {bundle} is stored in {found} mode but the active backend is {expected}"
    ))]
    ForeignHandle {
        bundle: String,
        found: String,
        expected: String,
    },

    #[snafu(display("object metadata for {location} could not be read: {message}"))]
    Metadata { location: String, message: String },
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::MissingCredentials { .. } | StorageError::ForeignHandle { .. } => {
                ErrorKind::Configuration
            }
            _ => ErrorKind::Transport,
        }
    }
}

pub type Result<T> = std::result::Result<T, StorageError>;
