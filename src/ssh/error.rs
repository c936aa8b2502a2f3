// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, command, and transfer failures.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed for {user}@{host}: password rejected")]
    AuthenticationFailed { user: String, host: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("{label} failed on {host} (exit {exit_code}): {stderr}")]
    NonZeroExit {
        label: String,
        host: String,
        exit_code: u32,
        stderr: String,
    },

    #[error("file transfer failed: {0}")]
    Transfer(String),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
