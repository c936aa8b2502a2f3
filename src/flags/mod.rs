// ABOUTME: Compiles a profile's boolean options into kMigrator's positional Y/N flag string.
// ABOUTME: Dependency checks run first and report every unmet requirement at once.

mod profile;
mod schema;

pub use profile::{Profile, ProfileEntity};
pub use schema::{FlagDefinition, FlagDependency, FlagSchema, builtin_dependencies};

use crate::config::Layout;
use crate::types::FlagString;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlagError {
    #[error("profile '{name}' not found (expected: {})", .path.display())]
    UnknownProfile { name: String, path: PathBuf },

    #[error("malformed flag schema: {0}")]
    MalformedSchema(String),

    #[error("malformed profile '{name}': {reason}")]
    MalformedProfile { name: String, reason: String },

    #[error("flag dependency validation failed:\n  - {}", .0.join("\n  - "))]
    UnmetDependencies(Vec<String>),

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Every dependency the profile violates, one message per rule.
pub fn unmet_dependencies(profile: &Profile, schema: &FlagSchema) -> Vec<String> {
    schema
        .dependencies()
        .iter()
        .filter(|dep| profile.is_enabled(&dep.flag) && !profile.is_enabled(&dep.requires))
        .map(|dep| format!("{}: '{}' requires '{}'", dep.message, dep.flag, dep.requires))
        .collect()
}

/// Compile the flag string for a profile. Never returns a partial string.
pub fn compile(profile: &Profile, schema: &FlagSchema) -> Result<FlagString, FlagError> {
    let unmet = unmet_dependencies(profile, schema);
    if !unmet.is_empty() {
        return Err(FlagError::UnmetDependencies(unmet));
    }

    for key in profile.flags.keys() {
        if !schema.flags().iter().any(|f| &f.key == key) {
            tracing::debug!("profile '{}' sets unknown flag '{key}'", profile.name);
        }
    }

    Ok(FlagString::from_bits(
        schema.flags().iter().map(|f| profile.is_enabled(&f.key)),
    ))
}

/// Load the schema and named profile from the workspace and compile them.
pub fn compile_profile(layout: &Layout, profile_name: &str) -> Result<FlagString, FlagError> {
    let profile = Profile::load(layout, profile_name)?;
    let schema = FlagSchema::load(&layout.flag_schema_file())?;
    let flags = compile(&profile, &schema)?;
    tracing::debug!("compiled flags for profile '{profile_name}': {flags}");
    Ok(flags)
}
