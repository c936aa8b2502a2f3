// ABOUTME: Pipeline run identifiers and rollback references.
// ABOUTME: Run ids namespace storage keys, remote working dirs and snapshot paths.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunIdError {
    #[error("run id cannot be empty")]
    Empty,

    #[error("run id exceeds maximum length of 64 characters")]
    TooLong,

    #[error("invalid character in run id: '{0}'")]
    InvalidChar(char),
}

/// Identifier of one pipeline run (`CI_PIPELINE_ID`, or `local` outside CI).
///
/// Restricted to characters that are safe inside shell commands and object keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RunId(String);

impl RunId {
    pub const LOCAL: &'static str = "local";

    pub fn new(value: &str) -> Result<Self, RunIdError> {
        if value.is_empty() {
            return Err(RunIdError::Empty);
        }

        if value.len() > 64 {
            return Err(RunIdError::TooLong);
        }

        if let Some(c) = value
            .chars()
            .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
        {
            return Err(RunIdError::InvalidChar(c));
        }

        Ok(Self(value.to_string()))
    }

    pub fn local() -> Self {
        Self(Self::LOCAL.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RunId {
    type Error = RunIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RunId::new(&value)
    }
}

impl From<RunId> for String {
    fn from(id: RunId) -> Self {
        id.0
    }
}

/// Where a rollback should look for the archive of a past deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackReference {
    /// Archives left in the local workspace by a previous `deploy`.
    Local,
    /// A prior pipeline run, resolved through pipeline artifacts or a storage snapshot.
    Pipeline(RunId),
}

impl RollbackReference {
    pub fn parse(value: &str) -> Result<Self, RunIdError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case(RunId::LOCAL) {
            return Ok(RollbackReference::Local);
        }
        RunId::new(value).map(RollbackReference::Pipeline)
    }
}

impl fmt::Display for RollbackReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RollbackReference::Local => write!(f, "{}", RunId::LOCAL),
            RollbackReference::Pipeline(id) => write!(f, "{id}"),
        }
    }
}
