use std::path::Path;

use serde_json::{Map, Value};

use crate::events::sanitize_payload;

pub const RECEIPT_SCHEMA_VERSION: u64 = 1;

/// Record of one provider call, with image bodies stripped.
pub fn build_receipt(
    provider: &str,
    model: Option<&str>,
    provider_request: &Map<String, Value>,
    provider_response: &Map<String, Value>,
    warnings: &[String],
    artifact_path: &Path,
) -> Value {
    let mut root = Map::new();
    root.insert(
        "schema_version".to_string(),
        Value::Number(RECEIPT_SCHEMA_VERSION.into()),
    );
    root.insert("provider".to_string(), Value::String(provider.to_string()));
    root.insert(
        "model".to_string(),
        model
            .map(|value| Value::String(value.to_string()))
            .unwrap_or(Value::Null),
    );
    root.insert(
        "provider_request".to_string(),
        sanitize_payload(&Value::Object(provider_request.clone())),
    );
    root.insert(
        "provider_response".to_string(),
        sanitize_payload(&Value::Object(provider_response.clone())),
    );
    root.insert(
        "warnings".to_string(),
        Value::Array(warnings.iter().cloned().map(Value::String).collect()),
    );
    root.insert(
        "artifact_path".to_string(),
        Value::String(artifact_path.to_string_lossy().to_string()),
    );
    Value::Object(root)
}

pub fn write_receipt(path: &Path, payload: &Value) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(payload)?)?;
    Ok(())
}
