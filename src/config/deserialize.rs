// ABOUTME: Custom serde deserializers for config and BOM types.
// ABOUTME: Accepts identifiers written either as YAML numbers or strings.

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Deserialize an identifier that YAML may have parsed as a number (`entity_id: 9`).
pub fn deserialize_scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(i) => Ok(i.to_string()),
        Scalar::Float(f) => Ok(f.to_string()),
        Scalar::Text(s) => Ok(s),
    }
}

/// Optional variant of [`deserialize_scalar_string`].
pub fn deserialize_scalar_string_option<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(opt.map(|scalar| match scalar {
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Text(s) => s,
    }))
}
