// ABOUTME: Governance engine deciding whether a BOM may be deployed.
// ABOUTME: Schema errors short-circuit; otherwise all enabled rules run and accumulate errors.

mod rules;

pub use rules::{
    BranchClass, BranchEnvironmentRule, BranchMapping, EnvTypeRule, PromotionOrderRule,
    RulesConfig, ToggleRule, check_rules,
};

use crate::bom::{Bom, BomErrors};
use crate::config::Layout;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;

/// Outcome of validating one BOM: valid when no errors were reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(Error::Validation(self.errors))
        }
    }
}

/// Inputs the governance engine evaluates a BOM against.
pub struct Governance<'a> {
    pub layout: &'a Layout,
    pub env_types: HashMap<String, String>,
    pub rules: &'a RulesConfig,
}

impl Governance<'_> {
    /// Validate a BOM file: schema, then profile existence, then rules.
    pub fn validate_file(&self, path: &Path, branch: Option<&str>) -> ValidationReport {
        match Bom::load(path) {
            Ok(bom) => self.validate(&bom, branch),
            Err(BomErrors(errors)) => ValidationReport { errors },
        }
    }

    /// Validate an already-parsed BOM.
    pub fn validate(&self, bom: &Bom, branch: Option<&str>) -> ValidationReport {
        let profile_path = self.layout.profile_file(&bom.profile);
        if !profile_path.exists() {
            return ValidationReport {
                errors: vec![format!(
                    "Profile not found: {} (expected: {})",
                    bom.profile,
                    profile_path.display()
                )],
            };
        }

        let errors = check_rules(bom, &self.env_types, self.rules, branch);
        if !errors.is_empty() {
            tracing::debug!("governance rules rejected BOM with {} error(s)", errors.len());
        }
        ValidationReport { errors }
    }
}
