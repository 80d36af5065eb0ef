//! Schema resolution.
//!
//! A [`SchemaRef`] is what decorators accept: a schema value, a reference
//! to a named component, or a literal JSON schema. Only loading and dumping
//! need an actual [`Schema`]; documentation works with all three shapes.

mod fields;

use std::borrow::Cow;
use std::marker::PhantomData;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::validation::{self, ValidationErrors};

pub use fields::{Field, FieldKind, Fields};

/// JSON schema key marking a field whose documented type is resolved by the
/// spec builder (uploads and registered custom fields).
pub const FIELD_MARKER: &str = "x-apiary-field";

/// What to do with input keys that no field declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unknown {
    /// Report every unknown key as an error.
    Raise,
    /// Silently drop unknown keys.
    Exclude,
}

/// A (de)serialization schema.
pub trait Schema: Send + Sync + 'static {
    /// Component name. `None` keeps the schema inline in the document.
    fn name(&self) -> Option<Cow<'_, str>> {
        None
    }

    /// JSON schema describing the loaded (and dumped) data.
    ///
    /// Named sub-schemas may be placed under `$defs` and referenced with
    /// `#/$defs/Name`; `Spec` promotes them to components.
    fn json_schema(&self) -> Value;

    /// Deserialize and validate incoming data.
    fn load(&self, data: Value, unknown: Unknown) -> Result<Value, ValidationErrors>;

    /// Serialize outgoing data.
    fn dump(&self, data: &Value) -> Result<Value, SchemaError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A reference or literal JSON schema was used where loading or dumping
    /// is required.
    NotAnInstance(String),
    /// Outgoing data does not fit the schema.
    Dump(String),
}

impl std::fmt::Display for SchemaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaError::NotAnInstance(what) => {
                write!(f, "{what} is not a schema instance and cannot load or dump data")
            }
            SchemaError::Dump(msg) => write!(f, "Dump error: {msg}"),
        }
    }
}

impl std::error::Error for SchemaError {}

/// Failure of [`SchemaRef::load`].
#[derive(Debug)]
pub enum LoadError {
    Invalid(ValidationErrors),
    Schema(SchemaError),
}

// ── Typed schemas ──────────────────────────────────────────

/// Schema backed by a Rust type through serde and schemars.
///
/// `SchemaOf::<T>::validated()` also runs `garde` validation on load.
pub struct SchemaOf<T> {
    validate: Option<fn(&T) -> Result<(), garde::Report>>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> SchemaOf<T>
where
    T: Serialize + DeserializeOwned + JsonSchema + 'static,
{
    pub fn new() -> Self {
        Self {
            validate: None,
            _marker: PhantomData,
        }
    }
}

impl<T> SchemaOf<T>
where
    T: Serialize + DeserializeOwned + JsonSchema + garde::Validate + 'static,
    T::Context: Default,
{
    pub fn validated() -> Self {
        Self {
            validate: Some(|value: &T| value.validate()),
            _marker: PhantomData,
        }
    }
}

impl<T> Default for SchemaOf<T>
where
    T: Serialize + DeserializeOwned + JsonSchema + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Schema for SchemaOf<T>
where
    T: Serialize + DeserializeOwned + JsonSchema + 'static,
{
    fn name(&self) -> Option<Cow<'_, str>> {
        Some(T::schema_name())
    }

    fn json_schema(&self) -> Value {
        serde_json::to_value(schemars::schema_for!(T)).unwrap_or_else(|_| json!({"type": "object"}))
    }

    fn load(&self, data: Value, _unknown: Unknown) -> Result<Value, ValidationErrors> {
        let typed: T = serde_json::from_value(data).map_err(|e| validation::from_serde_error(&e))?;
        if let Some(validate) = self.validate {
            validate(&typed).map_err(|report| validation::from_garde_report(&report))?;
        }
        serde_json::to_value(&typed)
            .map_err(|e| ValidationErrors::single(validation::SCHEMA_KEY, e.to_string()))
    }

    fn dump(&self, data: &Value) -> Result<Value, SchemaError> {
        let typed: T =
            serde_json::from_value(data.clone()).map_err(|e| SchemaError::Dump(e.to_string()))?;
        serde_json::to_value(&typed).map_err(|e| SchemaError::Dump(e.to_string()))
    }
}

// ── Schema references ──────────────────────────────────────

/// Normalized schema argument of the decorators.
#[derive(Clone)]
pub enum SchemaRef {
    /// A schema used for one object.
    Instance(Arc<dyn Schema>),
    /// A schema used for a list of objects.
    Many(Arc<dyn Schema>),
    /// Name of a schema component, documentation only.
    Reference(String),
    /// Literal JSON schema, documentation only.
    Inline(Value),
}

impl SchemaRef {
    pub fn new(schema: impl Schema) -> Self {
        SchemaRef::Instance(Arc::new(schema))
    }

    /// Schema of a Rust type.
    pub fn of<T>() -> Self
    where
        T: Serialize + DeserializeOwned + JsonSchema + 'static,
    {
        SchemaRef::new(SchemaOf::<T>::new())
    }

    /// Same schema applied to a list of items.
    pub fn many(self) -> Self {
        match self {
            SchemaRef::Instance(schema) => SchemaRef::Many(schema),
            other => other,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, SchemaRef::Many(_))
    }

    /// The schema instance, failing for references and literal schemas.
    pub fn instance(&self) -> Result<&Arc<dyn Schema>, SchemaError> {
        match self {
            SchemaRef::Instance(schema) | SchemaRef::Many(schema) => Ok(schema),
            SchemaRef::Reference(name) => {
                Err(SchemaError::NotAnInstance(format!("reference \"{name}\"")))
            }
            SchemaRef::Inline(_) => Err(SchemaError::NotAnInstance("inline JSON schema".into())),
        }
    }

    /// JSON schema with component references left in `#/$defs/` form.
    pub fn json_schema(&self) -> Value {
        match self {
            SchemaRef::Instance(schema) => schema.json_schema(),
            SchemaRef::Many(schema) => json!({"type": "array", "items": schema.json_schema()}),
            SchemaRef::Reference(name) => json!({"$ref": format!("#/$defs/{name}")}),
            SchemaRef::Inline(value) => value.clone(),
        }
    }

    pub fn load(&self, data: Value, unknown: Unknown) -> Result<Value, LoadError> {
        let schema = self.instance().map_err(LoadError::Schema)?;
        if !self.is_many() {
            return schema.load(data, unknown).map_err(LoadError::Invalid);
        }
        let Value::Array(items) = data else {
            return Err(LoadError::Invalid(ValidationErrors::single(
                validation::SCHEMA_KEY,
                "Invalid input type.",
            )));
        };
        let mut loaded = Vec::with_capacity(items.len());
        let mut errors = ValidationErrors::new();
        for (index, item) in items.into_iter().enumerate() {
            match schema.load(item, unknown) {
                Ok(value) => loaded.push(value),
                Err(e) => errors.nest(index.to_string(), e),
            }
        }
        errors.into_result(Value::Array(loaded)).map_err(LoadError::Invalid)
    }

    pub fn dump(&self, data: &Value) -> Result<Value, SchemaError> {
        let schema = self.instance()?;
        if !self.is_many() {
            return schema.dump(data);
        }
        match data {
            Value::Array(items) => items
                .iter()
                .map(|item| schema.dump(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(SchemaError::Dump("expected a list".into())),
        }
    }
}

impl std::fmt::Debug for SchemaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SchemaRef::Instance(schema) => {
                write!(f, "Instance({})", schema.name().unwrap_or(Cow::Borrowed("<inline>")))
            }
            SchemaRef::Many(schema) => {
                write!(f, "Many({})", schema.name().unwrap_or(Cow::Borrowed("<inline>")))
            }
            SchemaRef::Reference(name) => write!(f, "Reference({name})"),
            SchemaRef::Inline(value) => write!(f, "Inline({value})"),
        }
    }
}

impl<S: Schema> From<S> for SchemaRef {
    fn from(schema: S) -> Self {
        SchemaRef::new(schema)
    }
}

impl From<Arc<dyn Schema>> for SchemaRef {
    fn from(schema: Arc<dyn Schema>) -> Self {
        SchemaRef::Instance(schema)
    }
}

impl From<&str> for SchemaRef {
    fn from(name: &str) -> Self {
        SchemaRef::Reference(name.to_string())
    }
}

impl From<String> for SchemaRef {
    fn from(name: String) -> Self {
        SchemaRef::Reference(name)
    }
}

impl From<Value> for SchemaRef {
    fn from(schema: Value) -> Self {
        SchemaRef::Inline(schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, serde::Deserialize, JsonSchema, garde::Validate)]
    struct Pet {
        #[garde(length(min = 1))]
        name: String,
        #[garde(skip)]
        age: Option<u32>,
    }

    #[test]
    fn typed_schema_loads_and_validates() {
        let schema = SchemaOf::<Pet>::validated();
        let loaded = schema.load(json!({"name": "Rex"}), Unknown::Raise).unwrap();
        assert_eq!(loaded, json!({"name": "Rex", "age": null}));

        let err = schema.load(json!({"name": ""}), Unknown::Raise).unwrap_err();
        assert!(err.get("name").is_some());

        let err = schema.load(json!({}), Unknown::Raise).unwrap_err();
        assert_eq!(err.into_value(), json!({"name": ["Missing data for required field."]}));
    }

    #[test]
    fn typed_schema_is_named() {
        let schema = SchemaOf::<Pet>::new();
        assert_eq!(schema.name().as_deref(), Some("Pet"));
        assert_eq!(schema.json_schema()["type"], "object");
    }

    #[test]
    fn references_cannot_dump() {
        let reference = SchemaRef::from("Pet");
        assert!(matches!(
            reference.dump(&json!({})),
            Err(SchemaError::NotAnInstance(_))
        ));
        let inline = SchemaRef::from(json!({"type": "object"}));
        assert!(inline.instance().is_err());
    }

    #[test]
    fn many_loads_each_item() {
        let schema = SchemaRef::of::<Pet>().many();
        let err = schema
            .load(json!([{"name": "a"}, {}]), Unknown::Raise)
            .unwrap_err();
        match err {
            LoadError::Invalid(errors) => {
                assert_eq!(
                    errors.into_value(),
                    json!({"1": {"name": ["Missing data for required field."]}})
                );
            }
            LoadError::Schema(e) => panic!("unexpected {e}"),
        }
    }
}
