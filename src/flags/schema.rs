// ABOUTME: Flag schema: ordered positions of the kMigrator import flags and their dependencies.
// ABOUTME: Loaded from config/flag-schema.yaml and checked for structural consistency.

use super::FlagError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One position in the flag string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDefinition {
    pub position: u32,
    pub key: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `flag` may only be enabled when `requires` is enabled too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagDependency {
    pub flag: String,
    pub requires: String,
    pub message: String,
}

impl FlagDependency {
    pub fn new(flag: &str, requires: &str, message: &str) -> Self {
        Self {
            flag: flag.to_string(),
            requires: requires.to_string(),
            message: message.to_string(),
        }
    }
}

/// Dependencies enforced when the schema file declares none.
pub fn builtin_dependencies() -> Vec<FlagDependency> {
    vec![
        FlagDependency::new(
            "replace_portfolio_type",
            "replace_module",
            "Portfolio type replacement requires module replacement",
        ),
        FlagDependency::new(
            "replace_chatbot_intent",
            "replace_report_type",
            "Chatbot intent replacement requires report type replacement",
        ),
    ]
}

#[derive(Deserialize)]
struct SchemaFile {
    #[serde(default)]
    flag_schema: Vec<FlagDefinition>,
    #[serde(default)]
    dependencies: Option<Vec<FlagDependency>>,
}

/// Validated flag schema, sorted by position.
#[derive(Debug, Clone)]
pub struct FlagSchema {
    flags: Vec<FlagDefinition>,
    dependencies: Vec<FlagDependency>,
}

impl FlagSchema {
    /// Build a schema. `None` dependencies selects the built-in rules.
    pub fn new(
        mut flags: Vec<FlagDefinition>,
        dependencies: Option<Vec<FlagDependency>>,
    ) -> Result<Self, FlagError> {
        if flags.is_empty() {
            return Err(FlagError::MalformedSchema("schema defines no flags".to_string()));
        }

        let mut positions = HashSet::new();
        let mut keys = HashSet::new();
        for flag in &flags {
            if !positions.insert(flag.position) {
                return Err(FlagError::MalformedSchema(format!(
                    "duplicate position {}",
                    flag.position
                )));
            }
            if !keys.insert(flag.key.as_str()) {
                return Err(FlagError::MalformedSchema(format!(
                    "duplicate key '{}'",
                    flag.key
                )));
            }
        }

        let declared = dependencies.is_some();
        let dependencies = dependencies.unwrap_or_else(builtin_dependencies);
        if declared {
            for dep in &dependencies {
                for key in [&dep.flag, &dep.requires] {
                    if !keys.contains(key.as_str()) {
                        return Err(FlagError::MalformedSchema(format!(
                            "dependency references unknown flag '{key}'"
                        )));
                    }
                }
            }
        }

        flags.sort_by_key(|f| f.position);
        Ok(Self {
            flags,
            dependencies,
        })
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, FlagError> {
        let file: SchemaFile = serde_yaml::from_str(yaml)
            .map_err(|e| FlagError::MalformedSchema(e.to_string()))?;
        Self::new(file.flag_schema, file.dependencies)
    }

    pub fn load(path: &Path) -> Result<Self, FlagError> {
        let content = std::fs::read_to_string(path).map_err(|source| FlagError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Flag definitions in position order.
    pub fn flags(&self) -> &[FlagDefinition] {
        &self.flags
    }

    pub fn dependencies(&self) -> &[FlagDependency] {
        &self.dependencies
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}
