use serde_json::{Map, Value};

// ── Error types ────────────────────────────────────────────

/// Field-level validation errors produced by `Schema::load`.
///
/// Messages are grouped per field. Nested schemas nest their own errors
/// under the field name; schema-wide messages go under `_schema`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationErrors {
    fields: Map<String, Value>,
}

pub const SCHEMA_KEY: &str = "_schema";

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors holding a single message for one field.
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    /// Append a message to a field.
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        let entry = self
            .fields
            .entry(field.into())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(messages) => messages.push(Value::String(message.into())),
            // A nested error map already lives here; keep it and record the
            // message at the schema level of that map.
            Value::Object(nested) => {
                let list = nested
                    .entry(SCHEMA_KEY)
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(messages) = list {
                    messages.push(Value::String(message.into()));
                }
            }
            other => *other = Value::Array(vec![Value::String(message.into())]),
        }
    }

    /// Nest the errors of a sub-schema under a field.
    pub fn nest(&mut self, field: impl Into<String>, errors: ValidationErrors) {
        if !errors.is_empty() {
            self.fields.insert(field.into(), errors.into_value());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    /// `Ok(value)` when no error was recorded.
    pub fn into_result<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} invalid field(s)", self.fields.len())
    }
}

impl std::error::Error for ValidationErrors {}

// ── garde integration ──────────────────────────────────────

/// Convert a garde report into field errors, keyed by the garde path.
pub fn from_garde_report(report: &garde::Report) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    for (path, error) in report.iter() {
        let field = {
            let s = path.to_string();
            if s.is_empty() { SCHEMA_KEY.to_string() } else { s }
        };
        errors.add(field, error.message().to_string());
    }
    errors
}

/// Convert a serde deserialization failure into field errors.
///
/// Missing fields are reported under the field name, everything else
/// under `_schema`.
pub fn from_serde_error(err: &serde_json::Error) -> ValidationErrors {
    let text = err.to_string();
    if let Some(rest) = text.strip_prefix("missing field `") {
        if let Some(end) = rest.find('`') {
            return ValidationErrors::single(&rest[..end], "Missing data for required field.");
        }
    }
    if let Some(rest) = text.strip_prefix("unknown field `") {
        if let Some(end) = rest.find('`') {
            return ValidationErrors::single(&rest[..end], "Unknown field.");
        }
    }
    let message = match text.find(" at line ") {
        Some(pos) => text[..pos].to_string(),
        None => text,
    };
    ValidationErrors::single(SCHEMA_KEY, message)
}

// Re-export garde::Validate for convenience.
pub use garde::Validate;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn messages_accumulate_per_field() {
        let mut errors = ValidationErrors::new();
        errors.add("name", "Missing data for required field.");
        errors.add("name", "Not a valid string.");
        assert_eq!(
            errors.into_value(),
            json!({"name": ["Missing data for required field.", "Not a valid string."]})
        );
    }

    #[test]
    fn nested_errors() {
        let mut errors = ValidationErrors::new();
        errors.nest("a", ValidationErrors::single("b", "Not a valid integer."));
        errors.nest("c", ValidationErrors::new());
        assert_eq!(errors.into_value(), json!({"a": {"b": ["Not a valid integer."]}}));
    }

    #[test]
    fn serde_missing_field() {
        #[derive(Debug, serde::Deserialize)]
        #[allow(dead_code)]
        struct Item {
            name: String,
        }
        let err = serde_json::from_value::<Item>(json!({})).unwrap_err();
        let errors = from_serde_error(&err);
        assert_eq!(
            errors.into_value(),
            json!({"name": ["Missing data for required field."]})
        );
    }
}
