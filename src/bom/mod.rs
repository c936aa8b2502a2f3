// ABOUTME: Bill of Materials: the declarative manifest that drives one deployment.
// ABOUTME: Parsing runs structural schema checks before building the typed value.

mod schema;

pub use schema::check_schema;

use crate::config::{deserialize_scalar_string, deserialize_scalar_string_option};
use crate::types::{RollbackReference, RunIdError};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Deployment category: whole-configuration baseline or per-entity functional change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentKind {
    Baseline,
    Functional,
}

impl DeploymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentKind::Baseline => "baseline",
            DeploymentKind::Functional => "functional",
        }
    }

    /// Category implied by a profile name when the BOM does not declare one.
    pub fn infer_from_profile(profile: &str) -> Self {
        if profile.to_lowercase().contains("baseline") {
            DeploymentKind::Baseline
        } else {
            DeploymentKind::Functional
        }
    }

    /// kMigrator `-i18n` mode used when importing this kind of deployment.
    pub fn i18n_mode(&self) -> I18nMode {
        match self {
            DeploymentKind::Baseline => I18nMode::None,
            DeploymentKind::Functional => I18nMode::Charset,
        }
    }
}

impl fmt::Display for DeploymentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// kMigrator `-i18n` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum I18nMode {
    None,
    Charset,
}

impl I18nMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            I18nMode::None => "none",
            I18nMode::Charset => "charset",
        }
    }
}

/// kMigrator `-refdata` argument.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefdataMode {
    #[default]
    NoChange,
}

impl RefdataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefdataMode::NoChange => "nochange",
        }
    }
}

/// One functional entity to migrate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "deserialize_scalar_string")]
    pub entity_id: String,
    #[serde(deserialize_with = "deserialize_scalar_string")]
    pub reference_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bom {
    #[serde(deserialize_with = "deserialize_scalar_string")]
    pub version: String,
    pub profile: String,
    pub source_server: String,
    pub target_server: String,
    pub created_by: String,
    #[serde(default)]
    pub category: Option<DeploymentKind>,
    #[serde(default, deserialize_with = "deserialize_scalar_string_option")]
    pub change_request: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub entities: Option<NonEmpty<Entity>>,
    #[serde(default, deserialize_with = "deserialize_scalar_string_option")]
    pub rollback_pipeline_id: Option<String>,
}

/// Why a BOM could not be turned into a typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomErrors(pub Vec<String>);

impl Bom {
    /// Parse BOM text, reporting every schema problem found.
    pub fn parse(yaml: &str) -> Result<Self, BomErrors> {
        if yaml.trim().is_empty() {
            return Err(BomErrors(vec!["BOM file is empty".to_string()]));
        }

        let value: serde_yaml::Value = serde_yaml::from_str(yaml)
            .map_err(|e| BomErrors(vec![format!("YAML syntax error: {e}")]))?;

        if value.is_null() {
            return Err(BomErrors(vec!["BOM file is empty".to_string()]));
        }

        let errors = check_schema(&value);
        if !errors.is_empty() {
            return Err(BomErrors(errors));
        }

        serde_yaml::from_value(value)
            .map_err(|e| BomErrors(vec![format!("Schema validation failed: {e}")]))
    }

    pub fn load(path: &Path) -> Result<Self, BomErrors> {
        if !path.exists() {
            return Err(BomErrors(vec![format!("File not found: {}", path.display())]));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| BomErrors(vec![format!("Failed to read {}: {e}", path.display())]))?;
        Self::parse(&content)
    }

    /// Declared category, or the one implied by the profile name.
    pub fn kind(&self) -> DeploymentKind {
        self.category
            .unwrap_or_else(|| DeploymentKind::infer_from_profile(&self.profile))
    }

    /// Parsed `rollback_pipeline_id`, if the BOM carries one.
    pub fn rollback_reference(&self) -> Option<Result<RollbackReference, RunIdError>> {
        self.rollback_pipeline_id
            .as_deref()
            .map(RollbackReference::parse)
    }

    /// Change request used in archive and evidence names.
    pub fn change_request_or_baseline(&self) -> &str {
        self.change_request.as_deref().unwrap_or("baseline")
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().flat_map(|e| e.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNCTIONAL: &str = r#"
version: "1.2.0"
profile: functional-cr
source_server: dev-ppm
target_server: test-ppm
created_by: alice
change_request: CR-1001
entities:
  - entity_id: 9
    reference_code: WF_ONBOARD
"#;

    #[test]
    fn parses_functional_bom_with_numeric_entity_id() {
        let bom = Bom::parse(FUNCTIONAL).unwrap();
        assert_eq!(bom.kind(), DeploymentKind::Functional);
        let entity = bom.entities().next().unwrap();
        assert_eq!(entity.entity_id, "9");
        assert_eq!(entity.reference_code, "WF_ONBOARD");
    }

    #[test]
    fn numeric_rollback_pipeline_id_becomes_reference() {
        let yaml = format!("{FUNCTIONAL}rollback_pipeline_id: 4242\n");
        let bom = Bom::parse(&yaml).unwrap();
        let reference = bom.rollback_reference().unwrap().unwrap();
        assert_eq!(reference.to_string(), "4242");
    }

    #[test]
    fn category_is_inferred_from_profile_name() {
        assert_eq!(
            DeploymentKind::infer_from_profile("Baseline-Full"),
            DeploymentKind::Baseline
        );
        assert_eq!(
            DeploymentKind::infer_from_profile("functional-cr"),
            DeploymentKind::Functional
        );
    }

    #[test]
    fn empty_document_is_rejected() {
        assert_eq!(
            Bom::parse("").unwrap_err(),
            BomErrors(vec!["BOM file is empty".to_string()])
        );
    }
}
