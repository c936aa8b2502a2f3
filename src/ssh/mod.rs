// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Password authentication with known_hosts verification, plus the host traits executors use.

mod client;
mod error;
mod host;

pub use client::{CommandOutput, HostKeyPolicy, Session, SessionConfig, shell_quote};
pub use error::{Error, Result};
pub use host::{HostConnector, RemoteHost, SshConnector};
