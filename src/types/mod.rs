// ABOUTME: Validated domain types shared across the crate.
// ABOUTME: Run identifiers, rollback references, and kMigrator flag strings.

mod flag_string;
mod run_id;

pub use flag_string::{FlagString, FlagStringError};
pub use run_id::{RollbackReference, RunId, RunIdError};
