// ABOUTME: Deployment orchestration using the type state pattern.
// ABOUTME: Extract, import and archive run in order; each phase consumes the previous one.

mod deployment;
mod metadata;
mod orchestrator;
mod state;
mod transitions;

pub use deployment::Deployment;
pub use metadata::DeploymentMetadata;
pub use orchestrator::{Orchestrator, load_bom, validate};
pub use state::{Archived, Extracted, Imported};
