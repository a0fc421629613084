//! Rendering result records for stdout.

use serde_json::Value;

/// Output format for result records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Text,
}

/// Fields shown first in text mode, in this order.
const LEADING_FIELDS: [&str; 5] = ["message", "error", "session_id", "device_id", "next_action"];

/// Whether a record reports success.
pub fn is_success(record: &Value) -> bool {
    record.get("success").and_then(Value::as_bool).unwrap_or(false)
}

pub fn render(record: &Value, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            serde_json::to_string_pretty(record).unwrap_or_else(|_| record.to_string())
        }
        OutputFormat::Text => render_text(record),
    }
}

fn render_text(record: &Value) -> String {
    let mut out = String::from(if is_success(record) {
        "[OK] Success"
    } else {
        "[ERROR] Failed"
    });

    let Some(fields) = record.as_object() else {
        out.push('\n');
        out.push_str(&record.to_string());
        return out;
    };

    let leading = LEADING_FIELDS
        .iter()
        .filter_map(|key| fields.get(*key).map(|v| (*key, v)));
    let rest = fields
        .iter()
        .filter(|(key, _)| key.as_str() != "success" && !LEADING_FIELDS.contains(&key.as_str()))
        .map(|(key, v)| (key.as_str(), v));

    for (key, value) in leading.chain(rest) {
        match value {
            Value::Null => continue,
            Value::String(s) => out.push_str(&format!("\n  {}: {}", key, s)),
            Value::Array(items) if items.iter().all(Value::is_object) && !items.is_empty() => {
                out.push_str(&format!("\n  {}:", key));
                for item in items {
                    out.push_str(&format!("\n    - {}", item));
                }
            }
            other => out.push_str(&format!("\n  {}: {}", key, other)),
        }
    }
    out
}
