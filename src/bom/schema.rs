// ABOUTME: Structural validation of a BOM document before typed parsing.
// ABOUTME: Reports every missing or malformed field so operators can fix them in one pass.

use super::DeploymentKind;
use serde_yaml::{Mapping, Value};

const REQUIRED: [&str; 5] = [
    "version",
    "profile",
    "source_server",
    "target_server",
    "created_by",
];

fn field<'a>(map: &'a Mapping, key: &str) -> Option<&'a Value> {
    map.get(key).filter(|v| !v.is_null())
}

/// Scalar rendered as text; YAML numbers count as identifiers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn require_text(map: &Mapping, key: &str, errors: &mut Vec<String>) -> Option<String> {
    match field(map, key) {
        None => {
            errors.push(format!("Missing required field: {key}"));
            None
        }
        Some(value) => match scalar_text(value) {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => {
                errors.push(format!("Field '{key}' must be a non-empty string"));
                None
            }
        },
    }
}

/// Validate BOM structure, returning all problems in document order.
pub fn check_schema(value: &Value) -> Vec<String> {
    let Some(map) = value.as_mapping() else {
        return vec!["BOM must be a YAML mapping".to_string()];
    };

    let mut errors = Vec::new();
    let mut profile = None;

    for key in REQUIRED {
        let text = require_text(map, key, &mut errors);
        match key {
            "version" => {
                if let Some(version) = text
                    && semver::Version::parse(&version).is_err()
                {
                    errors.push(format!(
                        "Invalid version '{version}': expected semantic version X.Y.Z"
                    ));
                }
            }
            "profile" => profile = text,
            _ => {}
        }
    }

    let kind = match field(map, "category") {
        Some(value) => match value.as_str() {
            Some("baseline") => Some(DeploymentKind::Baseline),
            Some("functional") => Some(DeploymentKind::Functional),
            _ => {
                errors.push(format!(
                    "Invalid category: {} (must be 'baseline' or 'functional')",
                    scalar_text(value).unwrap_or_else(|| "<non-scalar>".to_string())
                ));
                None
            }
        },
        None => profile.as_deref().map(DeploymentKind::infer_from_profile),
    };

    match kind {
        Some(DeploymentKind::Functional) => check_functional(map, &mut errors),
        Some(DeploymentKind::Baseline) => {
            require_text(map, "description", &mut errors);
        }
        None => {}
    }

    errors
}

fn check_functional(map: &Mapping, errors: &mut Vec<String>) {
    require_text(map, "change_request", errors);

    let is_rollback = field(map, "rollback_pipeline_id").is_some();
    let Some(entities) = field(map, "entities") else {
        if !is_rollback {
            errors.push("Missing required field: entities".to_string());
        }
        return;
    };

    let Some(items) = entities.as_sequence() else {
        errors.push("Field 'entities' must be a list".to_string());
        return;
    };

    if items.is_empty() {
        errors.push("Field 'entities' must contain at least one entity".to_string());
        return;
    }

    for (index, item) in items.iter().enumerate() {
        let Some(entity) = item.as_mapping() else {
            errors.push(format!("entities[{index}]: must be a mapping"));
            continue;
        };
        for key in ["entity_id", "reference_code"] {
            let mut entity_errors = Vec::new();
            require_text(entity, key, &mut entity_errors);
            errors.extend(
                entity_errors
                    .into_iter()
                    .map(|e| format!("entities[{index}]: {e}")),
            );
        }
    }
}
