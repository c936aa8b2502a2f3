// ABOUTME: Governance rule set loaded from config/rules.yaml and evaluated against a BOM.
// ABOUTME: Every enabled rule runs and contributes its own error messages.

use crate::bom::Bom;
use crate::error::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// All governance rules; each is off unless `enabled: true`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub deployment_promotion_order: PromotionOrderRule,
    pub require_prod_rollback: EnvTypeRule,
    pub require_prod_change_request: EnvTypeRule,
    pub prevent_same_server: ToggleRule,
    pub require_branch_environment_match: BranchEnvironmentRule,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromotionOrderRule {
    pub enabled: bool,
    /// Environment types in promotion order, e.g. `[dev, test, prod]`.
    pub sequence: Vec<String>,
    pub message: Option<String>,
}

/// A rule that applies when the target environment type is in `applies_to`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvTypeRule {
    pub enabled: bool,
    pub applies_to: Vec<String>,
    pub message: Option<String>,
}

impl Default for EnvTypeRule {
    fn default() -> Self {
        Self {
            enabled: false,
            applies_to: vec!["prod".to_string()],
            message: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToggleRule {
    pub enabled: bool,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BranchEnvironmentRule {
    pub enabled: bool,
    pub mappings: HashMap<BranchClass, BranchMapping>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BranchMapping {
    pub allowed_env_types: Vec<String>,
}

/// Branch families recognised by the branch/environment rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchClass {
    Feature,
    Develop,
    Main,
}

impl BranchClass {
    pub fn classify(branch: &str) -> Option<Self> {
        if branch.starts_with("feature/") {
            Some(BranchClass::Feature)
        } else if branch == "develop" {
            Some(BranchClass::Develop)
        } else if branch == "main" {
            Some(BranchClass::Main)
        } else {
            None
        }
    }
}

impl RulesConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load rules; a missing file means no rules are enforced.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("no rules file at {}, governance rules disabled", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

fn message_or<'a>(message: &'a Option<String>, default: &'a str) -> &'a str {
    message.as_deref().unwrap_or(default)
}

/// Evaluate every enabled rule and return the accumulated errors in rule order.
///
/// `env_types` maps server names to environment types. Servers absent from the
/// map have no environment type, which never satisfies an env-type condition.
pub fn check_rules(
    bom: &Bom,
    env_types: &HashMap<String, String>,
    rules: &RulesConfig,
    branch: Option<&str>,
) -> Vec<String> {
    let mut errors = Vec::new();

    let source = bom.source_server.as_str();
    let target = bom.target_server.as_str();
    let source_env = env_types.get(source).map(String::as_str);
    let target_env = env_types.get(target).map(String::as_str);

    let rule = &rules.deployment_promotion_order;
    if rule.enabled
        && let (Some(src), Some(tgt)) = (source_env, target_env)
    {
        let position = |env: &str| rule.sequence.iter().position(|s| s == env);
        if let (Some(src_idx), Some(tgt_idx)) = (position(src), position(tgt))
            && tgt_idx != src_idx + 1
        {
            let message = message_or(&rule.message, "Invalid deployment order");
            if tgt_idx <= src_idx {
                errors.push(format!("{message} ({src} to {tgt})"));
            } else {
                let next = &rule.sequence[src_idx + 1];
                errors.push(format!(
                    "{message} - Must deploy to {next} next ({src} to {tgt})"
                ));
            }
        }
    }

    let applies = |rule: &EnvTypeRule| {
        rule.enabled && target_env.is_some_and(|env| rule.applies_to.iter().any(|a| a == env))
    };

    let rule = &rules.require_prod_rollback;
    if applies(rule) && bom.rollback_pipeline_id.is_none() {
        errors.push(message_or(&rule.message, "Rollback pipeline ID required").to_string());
    }

    let rule = &rules.require_prod_change_request;
    if applies(rule) && bom.change_request.is_none() {
        errors.push(message_or(&rule.message, "Change request required").to_string());
    }

    let rule = &rules.prevent_same_server;
    if rule.enabled && !source.is_empty() && source == target {
        errors.push(message_or(&rule.message, "Source and target must differ").to_string());
    }

    let rule = &rules.require_branch_environment_match;
    if rule.enabled
        && let Some(branch) = branch
        && let Some(mapping) = BranchClass::classify(branch).and_then(|c| rule.mappings.get(&c))
        && !target_env.is_some_and(|env| mapping.allowed_env_types.iter().any(|a| a == env))
    {
        let message = message_or(&rule.message, "Environment mismatch");
        errors.push(format!(
            "{message}\n    Branch: {branch} (allows: {})\n    BOM target_server: {target} (env_type: {})",
            mapping.allowed_env_types.join(", "),
            target_env.unwrap_or("unknown"),
        ));
    }

    errors
}
