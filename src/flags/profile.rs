// ABOUTME: Deployment profiles: named flag sets stored under profiles/<name>.yaml.
// ABOUTME: Baseline profiles also list the entity types they migrate.

use super::FlagError;
use crate::config::{Layout, deserialize_scalar_string};
use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProfileEntity {
    #[serde(deserialize_with = "deserialize_scalar_string")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Profile {
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub flags: HashMap<String, bool>,
    #[serde(default)]
    pub entities: Vec<ProfileEntity>,
}

impl Profile {
    pub fn from_yaml(name: &str, yaml: &str) -> Result<Self, FlagError> {
        let mut profile: Profile =
            serde_yaml::from_str(yaml).map_err(|e| FlagError::MalformedProfile {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        profile.name = name.to_string();
        Ok(profile)
    }

    pub fn load(layout: &Layout, name: &str) -> Result<Self, FlagError> {
        let path = layout.profile_file(name);
        if !path.exists() {
            return Err(FlagError::UnknownProfile {
                name: name.to_string(),
                path,
            });
        }
        let content = std::fs::read_to_string(&path).map_err(|source| FlagError::Io {
            path: path.clone(),
            source,
        })?;
        Self::from_yaml(name, &content)
    }

    /// Whether the profile enables a flag; unset flags are off.
    pub fn is_enabled(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }
}
