use std::borrow::Cow;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use super::{Schema, SchemaError, Unknown, FIELD_MARKER};
use crate::validation::{ValidationErrors, SCHEMA_KEY};

const MISSING: &str = "Missing data for required field.";
const UNKNOWN: &str = "Unknown field.";
const NULL: &str = "Field may not be null.";

#[derive(Clone)]
pub enum FieldKind {
    String,
    Integer,
    Number,
    Boolean,
    Uuid,
    /// Any JSON value, passed through untouched.
    Raw,
    Dict,
    List(Box<Field>),
    Nested(Arc<dyn Schema>),
    /// Uploaded file. `format` documents the content encoding (`binary`,
    /// `base64`).
    Upload { format: String },
    /// A field type registered on the API by name.
    Custom(String),
}

/// One field of a [`Fields`] schema.
#[derive(Clone)]
pub struct Field {
    kind: FieldKind,
    required: bool,
    allow_none: bool,
    load_only: bool,
    dump_only: bool,
    load_default: Option<Value>,
    description: Option<String>,
    minimum: Option<f64>,
    maximum: Option<f64>,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            required: false,
            allow_none: false,
            load_only: false,
            dump_only: false,
            load_default: None,
            description: None,
            minimum: None,
            maximum: None,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn uuid() -> Self {
        Self::new(FieldKind::Uuid)
    }

    pub fn raw() -> Self {
        Self::new(FieldKind::Raw)
    }

    pub fn dict() -> Self {
        Self::new(FieldKind::Dict)
    }

    pub fn list(item: Field) -> Self {
        Self::new(FieldKind::List(Box::new(item)))
    }

    pub fn nested(schema: impl Schema) -> Self {
        Self::new(FieldKind::Nested(Arc::new(schema)))
    }

    pub fn upload() -> Self {
        Self::new(FieldKind::Upload {
            format: "binary".to_string(),
        })
    }

    pub fn custom(name: impl Into<String>) -> Self {
        Self::new(FieldKind::Custom(name.into()))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allow_none(mut self) -> Self {
        self.allow_none = true;
        self
    }

    pub fn load_only(mut self) -> Self {
        self.load_only = true;
        self
    }

    pub fn dump_only(mut self) -> Self {
        self.dump_only = true;
        self
    }

    pub fn load_default(mut self, value: impl Into<Value>) -> Self {
        self.load_default = Some(value.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Inclusive bounds for numeric fields.
    pub fn range(mut self, minimum: Option<f64>, maximum: Option<f64>) -> Self {
        self.minimum = minimum;
        self.maximum = maximum;
        self
    }

    /// Encoding documented for an upload field.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        if let FieldKind::Upload { format: ref mut f } = self.kind {
            *f = format.into();
        }
        self
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    fn json_schema(&self, defs: &mut Map<String, Value>) -> Value {
        let mut schema = match self.kind {
            FieldKind::String => json!({"type": "string"}),
            FieldKind::Integer => json!({"type": "integer"}),
            FieldKind::Number => json!({"type": "number"}),
            FieldKind::Boolean => json!({"type": "boolean"}),
            FieldKind::Uuid => json!({"type": "string", "format": "uuid"}),
            FieldKind::Raw => json!({}),
            FieldKind::Dict => json!({"type": "object"}),
            FieldKind::List(ref item) => json!({"type": "array", "items": item.json_schema(defs)}),
            FieldKind::Nested(ref nested) => nested_json_schema(nested.as_ref(), defs),
            FieldKind::Upload { ref format } => json!({FIELD_MARKER: "upload", "format": format}),
            FieldKind::Custom(ref name) => json!({FIELD_MARKER: name}),
        };
        if let Value::Object(ref mut obj) = schema {
            if self.dump_only {
                obj.insert("readOnly".into(), Value::Bool(true));
            }
            if self.load_only {
                obj.insert("writeOnly".into(), Value::Bool(true));
            }
            if let Some(ref default) = self.load_default {
                obj.insert("default".into(), default.clone());
            }
            if let Some(minimum) = self.minimum {
                obj.insert("minimum".into(), number(minimum));
            }
            if let Some(maximum) = self.maximum {
                obj.insert("maximum".into(), number(maximum));
            }
            if let Some(ref description) = self.description {
                obj.insert("description".into(), Value::String(description.clone()));
            }
        }
        schema
    }

    fn deserialize(&self, value: Value, unknown: Unknown) -> Result<Value, ValidationErrors> {
        let invalid = |msg: &str| ValidationErrors::single(SCHEMA_KEY, msg);
        if value.is_null() {
            return if self.allow_none {
                Ok(Value::Null)
            } else {
                Err(invalid(NULL))
            };
        }
        let loaded = match self.kind {
            FieldKind::String => match value {
                Value::String(_) => value,
                _ => return Err(invalid("Not a valid string.")),
            },
            FieldKind::Integer => coerce_integer(&value).ok_or_else(|| invalid("Not a valid integer."))?,
            FieldKind::Number => coerce_number(&value).ok_or_else(|| invalid("Not a valid number."))?,
            FieldKind::Boolean => coerce_boolean(&value).ok_or_else(|| invalid("Not a valid boolean."))?,
            FieldKind::Uuid => value
                .as_str()
                .and_then(|s| uuid::Uuid::parse_str(s).ok())
                .map(|u| Value::String(u.to_string()))
                .ok_or_else(|| invalid("Not a valid UUID."))?,
            FieldKind::Raw | FieldKind::Custom(_) => value,
            FieldKind::Dict => match value {
                Value::Object(_) => value,
                _ => return Err(invalid("Not a valid mapping type.")),
            },
            FieldKind::Upload { .. } => match value {
                Value::Object(_) => value,
                _ => return Err(invalid("Not a valid file.")),
            },
            FieldKind::List(ref item) => {
                let Value::Array(items) = value else {
                    return Err(invalid("Not a valid list."));
                };
                let mut loaded = Vec::with_capacity(items.len());
                let mut errors = ValidationErrors::new();
                for (index, element) in items.into_iter().enumerate() {
                    match item.deserialize(element, unknown) {
                        Ok(v) => loaded.push(v),
                        Err(e) => attach(&mut errors, &index.to_string(), e),
                    }
                }
                errors.into_result(Value::Array(loaded))?
            }
            FieldKind::Nested(ref nested) => nested.load(value, unknown)?,
        };
        self.check_range(&loaded)?;
        Ok(loaded)
    }

    fn check_range(&self, value: &Value) -> Result<(), ValidationErrors> {
        let Some(n) = value.as_f64() else {
            return Ok(());
        };
        let below = self.minimum.is_some_and(|min| n < min);
        let above = self.maximum.is_some_and(|max| n > max);
        if !below && !above {
            return Ok(());
        }
        let message = match (self.minimum, self.maximum) {
            (Some(min), Some(max)) => format!(
                "Must be greater than or equal to {} and less than or equal to {}.",
                number(min),
                number(max)
            ),
            (Some(min), None) => format!("Must be greater than or equal to {}.", number(min)),
            (None, Some(max)) => format!("Must be less than or equal to {}.", number(max)),
            (None, None) => return Ok(()),
        };
        Err(ValidationErrors::single(SCHEMA_KEY, message))
    }

    fn serialize(&self, value: &Value) -> Result<Value, SchemaError> {
        match self.kind {
            FieldKind::Nested(ref nested) if !value.is_null() => nested.dump(value),
            FieldKind::List(ref item) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|v| item.serialize(v))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
                other => Ok(other.clone()),
            },
            _ => Ok(value.clone()),
        }
    }
}

fn nested_json_schema(schema: &dyn Schema, defs: &mut Map<String, Value>) -> Value {
    let mut nested = schema.json_schema();
    if let Some(obj) = nested.as_object_mut() {
        obj.remove("$schema");
        if let Some(Value::Object(inner_defs)) = obj.remove("$defs") {
            for (name, def) in inner_defs {
                defs.entry(name).or_insert(def);
            }
        }
    }
    match schema.name() {
        Some(name) => {
            let name = name.into_owned();
            defs.entry(name.clone()).or_insert(nested);
            json!({"$ref": format!("#/$defs/{name}")})
        }
        None => nested,
    }
}

fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(value.clone())
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| Value::from(f as i64))
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(number),
        _ => None,
    }
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(Value::Bool(false)),
            Some(1) => Some(Value::Bool(true)),
            _ => None,
        },
        Value::String(s) => match s.to_lowercase().as_str() {
            "true" | "t" | "1" | "yes" | "y" | "on" => Some(Value::Bool(true)),
            "false" | "f" | "0" | "no" | "n" | "off" => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Schema declared as an ordered mapping of field name to [`Field`].
///
/// ```
/// use apiary_core::schema::{Field, Fields};
///
/// let item = Fields::new()
///     .named("Item")
///     .field("item_id", Field::integer().dump_only())
///     .field("field", Field::integer().required());
/// ```
#[derive(Clone, Default)]
pub struct Fields {
    name: Option<String>,
    fields: Vec<(String, Field)>,
}

impl Fields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give the schema a component name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        let name = name.into();
        self.fields.retain(|(n, _)| *n != name);
        self.fields.push((name, field));
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }
}

impl<const N: usize> From<[(&str, Field); N]> for Fields {
    fn from(fields: [(&str, Field); N]) -> Self {
        fields
            .into_iter()
            .fold(Fields::new(), |acc, (name, field)| acc.field(name, field))
    }
}

impl Schema for Fields {
    fn name(&self) -> Option<Cow<'_, str>> {
        self.name.as_deref().map(Cow::Borrowed)
    }

    fn json_schema(&self) -> Value {
        let mut defs = Map::new();
        let mut properties = Map::new();
        let mut required = Vec::new();
        for (name, field) in &self.fields {
            properties.insert(name.clone(), field.json_schema(&mut defs));
            if field.required && !field.dump_only {
                required.push(Value::String(name.clone()));
            }
        }
        let mut schema = Map::new();
        schema.insert("type".into(), Value::String("object".into()));
        schema.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            schema.insert("required".into(), Value::Array(required));
        }
        if !defs.is_empty() {
            schema.insert("$defs".into(), Value::Object(defs));
        }
        Value::Object(schema)
    }

    fn load(&self, data: Value, unknown: Unknown) -> Result<Value, ValidationErrors> {
        let Value::Object(mut input) = data else {
            return Err(ValidationErrors::single(SCHEMA_KEY, "Invalid input type."));
        };
        let mut errors = ValidationErrors::new();
        let mut loaded = Map::new();

        for (name, field) in &self.fields {
            if field.dump_only {
                continue;
            }
            match input.remove(name) {
                Some(value) => match field.deserialize(value, unknown) {
                    Ok(v) => {
                        loaded.insert(name.clone(), v);
                    }
                    Err(e) => attach(&mut errors, name, e),
                },
                None => {
                    if let Some(ref default) = field.load_default {
                        loaded.insert(name.clone(), default.clone());
                    } else if field.required {
                        errors.add(name.clone(), MISSING);
                    }
                }
            }
        }

        if unknown == Unknown::Raise {
            for key in input.keys() {
                errors.add(key.clone(), UNKNOWN);
            }
        }

        errors.into_result(Value::Object(loaded))
    }

    fn dump(&self, data: &Value) -> Result<Value, SchemaError> {
        let Value::Object(input) = data else {
            return Err(SchemaError::Dump(format!("expected an object, got {data}")));
        };
        let mut dumped = Map::new();
        for (name, field) in &self.fields {
            if field.load_only {
                continue;
            }
            if let Some(value) = input.get(name) {
                dumped.insert(name.clone(), field.serialize(value)?);
            }
        }
        Ok(Value::Object(dumped))
    }
}

/// Scalar errors come back keyed `_schema`; move them under the field name.
/// Nested schema errors stay nested.
fn attach(errors: &mut ValidationErrors, field: &str, field_errors: ValidationErrors) {
    match field_errors.get(SCHEMA_KEY) {
        Some(Value::Array(messages)) if field_errors.len() == 1 => {
            for message in messages {
                if let Some(text) = message.as_str() {
                    errors.add(field.to_string(), text.to_string());
                }
            }
        }
        _ => errors.nest(field.to_string(), field_errors),
    }
}

impl Fields {
    /// Whether the named field is declared as a list.
    pub fn is_list(&self, name: &str) -> bool {
        matches!(self.get(name).map(Field::kind), Some(FieldKind::List(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_schema() -> Fields {
        Fields::new()
            .named("Item")
            .field("field", Field::integer().required())
            .field("item_id", Field::integer().dump_only())
    }

    #[test]
    fn load_skips_dump_only_and_rejects_unknown() {
        let schema = item_schema();
        assert_eq!(
            schema.load(json!({"field": 0}), Unknown::Raise).unwrap(),
            json!({"field": 0})
        );
        let errors = schema
            .load(json!({"field": 0, "item_id": 3}), Unknown::Raise)
            .unwrap_err();
        assert_eq!(errors.into_value(), json!({"item_id": ["Unknown field."]}));
        assert_eq!(
            schema
                .load(json!({"field": 0, "other": 1}), Unknown::Exclude)
                .unwrap(),
            json!({"field": 0})
        );
    }

    #[test]
    fn load_coerces_and_reports() {
        let schema = Fields::new()
            .field("page", Field::integer().load_default(1).range(Some(1.0), None))
            .field("flag", Field::boolean());
        assert_eq!(
            schema.load(json!({"page": "3", "flag": "true"}), Unknown::Raise).unwrap(),
            json!({"page": 3, "flag": true})
        );
        assert_eq!(
            schema.load(json!({}), Unknown::Raise).unwrap(),
            json!({"page": 1})
        );
        let errors = schema.load(json!({"page": 0}), Unknown::Raise).unwrap_err();
        assert_eq!(
            errors.into_value(),
            json!({"page": ["Must be greater than or equal to 1."]})
        );
        let errors = schema.load(json!({"page": "x"}), Unknown::Raise).unwrap_err();
        assert_eq!(errors.into_value(), json!({"page": ["Not a valid integer."]}));
    }

    #[test]
    fn nested_errors_and_defs() {
        let schema = Fields::new().field("item", Field::nested(item_schema()));
        let errors = schema
            .load(json!({"item": {}}), Unknown::Raise)
            .unwrap_err();
        assert_eq!(
            errors.into_value(),
            json!({"item": {"field": ["Missing data for required field."]}})
        );
        let json_schema = schema.json_schema();
        assert_eq!(json_schema["properties"]["item"]["$ref"], "#/$defs/Item");
        assert_eq!(json_schema["$defs"]["Item"]["required"], json!(["field"]));
    }

    #[test]
    fn dump_keeps_declared_fields() {
        let schema = item_schema().field("secret", Field::string().load_only());
        let dumped = schema
            .dump(&json!({"field": 1, "item_id": 2, "secret": "x", "extra": true}))
            .unwrap();
        assert_eq!(dumped, json!({"field": 1, "item_id": 2}));
    }
}
