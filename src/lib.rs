// ABOUTME: Library root for ppmdeploy - exposes the deployment pipeline for the binary and tests.
// ABOUTME: The main binary is in main.rs.

pub mod archive;
pub mod bom;
pub mod config;
pub mod context;
pub mod credentials;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod executor;
pub mod flags;
pub mod governance;
pub mod output;
pub mod rollback;
pub mod ssh;
pub mod storage;
pub mod types;
