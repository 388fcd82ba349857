use serde_json::Value;
use uuid::Uuid;

/// Foreign-key fields arrive from the intake form as numbers, numeric
/// strings, empty strings, or null. All of those normalize to
/// integer-or-null; anything else is rejected.
pub fn coerce_int_or_null(field: &str, value: Option<&Value>) -> Result<Option<i32>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(Some)
            .ok_or_else(|| format!("{field} is not a valid integer")),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            trimmed
                .parse::<i32>()
                .map(Some)
                .map_err(|_| format!("{field} is not a valid integer"))
        }
        Some(other) => Err(format!("{field} must be an integer or null, got {other}")),
    }
}

/// Personnel references use UUIDs; the form sends them as strings and may
/// leave them empty.
pub fn coerce_uuid_or_null(field: &str, value: Option<&Value>) -> Result<Option<Uuid>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            Uuid::parse_str(trimmed)
                .map(Some)
                .map_err(|_| format!("{field} is not a valid id"))
        }
        Some(other) => Err(format!("{field} must be an id or null, got {other}")),
    }
}

/// Multi-selects submit arrays with null holes; drop the holes and coerce
/// the survivors. A missing or null field is an empty selection.
pub fn coerce_int_array(field: &str, value: Option<&Value>) -> Result<Vec<i32>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if item.is_null() {
                    continue;
                }
                if let Some(id) = coerce_int_or_null(field, Some(item))? {
                    out.push(id);
                }
            }
            Ok(out)
        }
        Some(other) => Err(format!("{field} must be an array, got {other}")),
    }
}

pub fn coerce_uuid_array(field: &str, value: Option<&Value>) -> Result<Vec<Uuid>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                if item.is_null() {
                    continue;
                }
                if let Some(id) = coerce_uuid_or_null(field, Some(item))? {
                    out.push(id);
                }
            }
            Ok(out)
        }
        Some(other) => Err(format!("{field} must be an array, got {other}")),
    }
}
